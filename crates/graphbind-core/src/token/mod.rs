//! Token stream boundary.
//!
//! Binders pull tokens through [`TokenReader`] and push them through
//! [`TokenWriter`]. A binder is entered with the cursor on the first token of
//! its value and returns with the cursor on the token after that value.

mod buffer;
mod json;

pub use buffer::{BufferReader, ChainedReader, TokenBuffer};
pub use json::{json_to_tokens, write_json, JsonWriter};

use crate::errors::{BindError, Result};
use crate::value::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    FieldName(String),
    String(String),
    Int(i32),
    Long(i64),
    Double(f64),
    Bool(bool),
    Null,
    /// Opaque value handed over by the stream as-is
    Embedded(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    FieldName,
    String,
    Int,
    Long,
    Double,
    Bool,
    Null,
    Embedded,
}

impl Token {
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::StartObject => TokenKind::StartObject,
            Token::EndObject => TokenKind::EndObject,
            Token::StartArray => TokenKind::StartArray,
            Token::EndArray => TokenKind::EndArray,
            Token::FieldName(_) => TokenKind::FieldName,
            Token::String(_) => TokenKind::String,
            Token::Int(_) => TokenKind::Int,
            Token::Long(_) => TokenKind::Long,
            Token::Double(_) => TokenKind::Double,
            Token::Bool(_) => TokenKind::Bool,
            Token::Null => TokenKind::Null,
            Token::Embedded(_) => TokenKind::Embedded,
        }
    }
}

impl TokenKind {
    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            TokenKind::String
                | TokenKind::Int
                | TokenKind::Long
                | TokenKind::Double
                | TokenKind::Bool
                | TokenKind::Embedded
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::StartObject => "start-object",
            TokenKind::EndObject => "end-object",
            TokenKind::StartArray => "start-array",
            TokenKind::EndArray => "end-array",
            TokenKind::FieldName => "field-name",
            TokenKind::String => "string",
            TokenKind::Int => "int",
            TokenKind::Long => "long",
            TokenKind::Double => "double",
            TokenKind::Bool => "boolean",
            TokenKind::Null => "null",
            TokenKind::Embedded => "embedded",
        };
        f.write_str(name)
    }
}

/// Cursor over a token stream
pub trait TokenReader {
    /// Token under the cursor, `None` once the stream is exhausted
    fn current(&self) -> Option<&Token>;

    /// Move the cursor to the next token
    fn advance(&mut self) -> Result<()>;

    fn current_kind(&self) -> Option<TokenKind> {
        self.current().map(Token::kind)
    }

    /// Skip the value under the cursor, including any nested structure
    fn skip_value(&mut self) -> Result<()> {
        let mut depth = 0usize;
        loop {
            match self.current_kind() {
                None => return Err(BindError::Stream("unexpected end of input".into())),
                Some(TokenKind::StartObject | TokenKind::StartArray) => depth += 1,
                Some(TokenKind::EndObject | TokenKind::EndArray) => {
                    if depth == 0 {
                        return Err(BindError::Stream(
                            "unbalanced end token while skipping value".into(),
                        ));
                    }
                    depth -= 1;
                }
                Some(TokenKind::FieldName) if depth == 0 => {
                    return Err(BindError::Stream(
                        "field name where a value was expected".into(),
                    ));
                }
                Some(_) => {}
            }
            self.advance()?;
            if depth == 0 {
                return Ok(());
            }
        }
    }

    /// Read the field name under the cursor and advance to its value
    fn expect_field_name(&mut self) -> Result<String> {
        match self.current() {
            Some(Token::FieldName(name)) => {
                let name = name.clone();
                self.advance()?;
                Ok(name)
            }
            other => Err(BindError::mismatch(
                "field name",
                other.map(Token::kind),
            )),
        }
    }

    /// Consume a structural token of the given kind
    fn expect(&mut self, kind: TokenKind) -> Result<()> {
        match self.current_kind() {
            Some(found) if found == kind => self.advance(),
            other => Err(BindError::mismatch(kind, other)),
        }
    }
}

/// Sink for encoded tokens
pub trait TokenWriter {
    fn write_start_object(&mut self) -> Result<()>;
    fn write_end_object(&mut self) -> Result<()>;
    fn write_start_array(&mut self) -> Result<()>;
    fn write_end_array(&mut self) -> Result<()>;
    fn write_field_name(&mut self, name: &str) -> Result<()>;
    fn write_string(&mut self, value: &str) -> Result<()>;
    fn write_int(&mut self, value: i32) -> Result<()>;
    fn write_long(&mut self, value: i64) -> Result<()>;
    fn write_double(&mut self, value: f64) -> Result<()>;
    fn write_bool(&mut self, value: bool) -> Result<()>;
    fn write_null(&mut self) -> Result<()>;
    fn write_embedded(&mut self, value: &Value) -> Result<()>;

    /// Replay a single token
    fn write_token(&mut self, token: &Token) -> Result<()> {
        match token {
            Token::StartObject => self.write_start_object(),
            Token::EndObject => self.write_end_object(),
            Token::StartArray => self.write_start_array(),
            Token::EndArray => self.write_end_array(),
            Token::FieldName(name) => self.write_field_name(name),
            Token::String(s) => self.write_string(s),
            Token::Int(v) => self.write_int(*v),
            Token::Long(v) => self.write_long(*v),
            Token::Double(v) => self.write_double(*v),
            Token::Bool(v) => self.write_bool(*v),
            Token::Null => self.write_null(),
            Token::Embedded(v) => self.write_embedded(v),
        }
    }
}

/// Copy the value under the reader's cursor into `writer`, leaving the cursor after it
pub fn copy_value(reader: &mut dyn TokenReader, writer: &mut dyn TokenWriter) -> Result<()> {
    let mut depth = 0usize;
    loop {
        let Some(token) = reader.current() else {
            return Err(BindError::Stream("unexpected end of input".into()));
        };
        match token.kind() {
            TokenKind::StartObject | TokenKind::StartArray => depth += 1,
            TokenKind::EndObject | TokenKind::EndArray => {
                if depth == 0 {
                    return Err(BindError::Stream(
                        "unbalanced end token while copying value".into(),
                    ));
                }
                depth -= 1;
            }
            _ => {}
        }
        writer.write_token(token)?;
        reader.advance()?;
        if depth == 0 {
            return Ok(());
        }
    }
}
