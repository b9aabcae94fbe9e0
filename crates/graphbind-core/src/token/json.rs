use super::{Token, TokenBuffer, TokenWriter};
use crate::errors::{BindError, Result};
use crate::value::Value;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Number};

/// Flatten a JSON tree into a replayable token buffer
pub fn json_to_tokens(value: &serde_json::Value) -> TokenBuffer {
    let mut buffer = TokenBuffer::new();
    push_json(&mut buffer, value);
    buffer
}

fn push_json(buffer: &mut TokenBuffer, value: &serde_json::Value) {
    match value {
        serde_json::Value::Null => buffer.push(Token::Null),
        serde_json::Value::Bool(b) => buffer.push(Token::Bool(*b)),
        serde_json::Value::Number(n) => buffer.push(number_token(n)),
        serde_json::Value::String(s) => buffer.push(Token::String(s.clone())),
        serde_json::Value::Array(items) => {
            buffer.push(Token::StartArray);
            for item in items {
                push_json(buffer, item);
            }
            buffer.push(Token::EndArray);
        }
        serde_json::Value::Object(map) => {
            buffer.push(Token::StartObject);
            for (key, item) in map {
                buffer.push(Token::FieldName(key.clone()));
                push_json(buffer, item);
            }
            buffer.push(Token::EndObject);
        }
    }
}

fn number_token(n: &Number) -> Token {
    if let Some(v) = n.as_i64() {
        match i32::try_from(v) {
            Ok(small) => Token::Int(small),
            Err(_) => Token::Long(v),
        }
    } else if let Some(v) = n.as_f64() {
        Token::Double(v)
    } else {
        Token::String(n.to_string())
    }
}

/// Write a JSON tree as tokens
pub fn write_json(writer: &mut dyn TokenWriter, value: &serde_json::Value) -> Result<()> {
    for token in json_to_tokens(value).tokens() {
        writer.write_token(token)?;
    }
    Ok(())
}

enum Frame {
    Object {
        map: Map<String, serde_json::Value>,
        pending: Option<String>,
    },
    Array(Vec<serde_json::Value>),
}

/// Token sink that assembles a `serde_json::Value`
#[derive(Default)]
pub struct JsonWriter {
    stack: Vec<Frame>,
    root: Option<serde_json::Value>,
}

impl JsonWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The completed document
    pub fn finish(self) -> Result<serde_json::Value> {
        if !self.stack.is_empty() {
            return Err(BindError::Stream("unterminated object or array".into()));
        }
        Ok(self.root.unwrap_or(serde_json::Value::Null))
    }

    fn emit(&mut self, value: serde_json::Value) -> Result<()> {
        match self.stack.last_mut() {
            None => {
                if self.root.is_some() {
                    return Err(BindError::Stream("more than one root value written".into()));
                }
                self.root = Some(value);
                Ok(())
            }
            Some(Frame::Array(items)) => {
                items.push(value);
                Ok(())
            }
            Some(Frame::Object { map, pending }) => match pending.take() {
                Some(key) => {
                    map.insert(key, value);
                    Ok(())
                }
                None => Err(BindError::Stream("value written without a field name".into())),
            },
        }
    }
}

impl TokenWriter for JsonWriter {
    fn write_start_object(&mut self) -> Result<()> {
        self.stack.push(Frame::Object {
            map: Map::new(),
            pending: None,
        });
        Ok(())
    }

    fn write_end_object(&mut self) -> Result<()> {
        match self.stack.pop() {
            Some(Frame::Object { map, pending: None }) => self.emit(serde_json::Value::Object(map)),
            Some(Frame::Object { pending: Some(key), .. }) => Err(BindError::Stream(format!(
                "field `{}` has no value",
                key
            ))),
            _ => Err(BindError::Stream("end-object without matching start".into())),
        }
    }

    fn write_start_array(&mut self) -> Result<()> {
        self.stack.push(Frame::Array(Vec::new()));
        Ok(())
    }

    fn write_end_array(&mut self) -> Result<()> {
        match self.stack.pop() {
            Some(Frame::Array(items)) => self.emit(serde_json::Value::Array(items)),
            _ => Err(BindError::Stream("end-array without matching start".into())),
        }
    }

    fn write_field_name(&mut self, name: &str) -> Result<()> {
        match self.stack.last_mut() {
            Some(Frame::Object { pending, .. }) if pending.is_none() => {
                *pending = Some(name.to_string());
                Ok(())
            }
            _ => Err(BindError::Stream(format!(
                "field name `{}` outside of an object",
                name
            ))),
        }
    }

    fn write_string(&mut self, value: &str) -> Result<()> {
        self.emit(serde_json::Value::String(value.to_string()))
    }

    fn write_int(&mut self, value: i32) -> Result<()> {
        self.emit(serde_json::Value::from(value))
    }

    fn write_long(&mut self, value: i64) -> Result<()> {
        self.emit(serde_json::Value::from(value))
    }

    fn write_double(&mut self, value: f64) -> Result<()> {
        match Number::from_f64(value) {
            Some(n) => self.emit(serde_json::Value::Number(n)),
            None => self.emit(serde_json::Value::Null),
        }
    }

    fn write_bool(&mut self, value: bool) -> Result<()> {
        self.emit(serde_json::Value::Bool(value))
    }

    fn write_null(&mut self) -> Result<()> {
        self.emit(serde_json::Value::Null)
    }

    fn write_embedded(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Bytes(bytes) => self.write_string(&STANDARD.encode(bytes)),
            Value::Tree(tree) => self.emit(tree.clone()),
            Value::String(s) | Value::Enum(s) => self.write_string(s),
            Value::Int(v) => self.write_int(*v),
            Value::Long(v) => self.write_long(*v),
            Value::Double(v) => self.write_double(*v),
            Value::Bool(v) => self.write_bool(*v),
            Value::Null => self.write_null(),
            other => Err(BindError::Stream(format!(
                "cannot embed {} value in a JSON document",
                other.kind_name()
            ))),
        }
    }
}
