use crate::config::ReadOptions;
use crate::errors::{BindError, Result};
use crate::token::{copy_value, JsonWriter, Token, TokenKind, TokenReader};
use crate::types::{ScalarKind, TypeDescriptor};
use crate::value::Value;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Read a scalar token, applying the coercions the options allow
pub(crate) fn read_scalar(
    kind: ScalarKind,
    options: &ReadOptions,
    reader: &mut dyn TokenReader,
) -> Result<Value> {
    let value = match reader.current() {
        Some(token) => convert_scalar(kind, token, options)?,
        None => return Err(BindError::mismatch(kind, None)),
    };
    reader.advance()?;
    Ok(value)
}

fn convert_scalar(kind: ScalarKind, token: &Token, options: &ReadOptions) -> Result<Value> {
    let coerce = options.allow_scalar_coercion;
    let value = match (kind, token) {
        (_, Token::Null) => Value::Null,
        (_, Token::Embedded(value)) => value.clone(),

        (ScalarKind::Bool, Token::Bool(b)) => Value::Bool(*b),
        (ScalarKind::Bool, Token::Int(v)) if coerce => match v {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            _ => return Err(BindError::invalid_value(kind, format!("{} is not 0 or 1", v))),
        },
        (ScalarKind::Bool, Token::String(s)) if coerce => match s.trim() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => return Err(BindError::invalid_value(kind, format!("`{}` is not a boolean", s))),
        },

        (ScalarKind::Int, Token::Int(v)) => Value::Int(*v),
        (ScalarKind::Int, Token::Long(v)) => Value::Int(
            i32::try_from(*v)
                .map_err(|_| BindError::invalid_value(kind, format!("{} is out of range", v)))?,
        ),
        (ScalarKind::Int, Token::Double(v)) if options.accept_float_as_int => {
            Value::Int(truncate(*v, i32::MIN as f64, i32::MAX as f64, kind)? as i32)
        }
        (ScalarKind::Int, Token::String(s)) if coerce => Value::Int(parse_text(s, kind)?),

        (ScalarKind::Long, Token::Int(v)) => Value::Long(i64::from(*v)),
        (ScalarKind::Long, Token::Long(v)) => Value::Long(*v),
        (ScalarKind::Long, Token::Double(v)) if options.accept_float_as_int => {
            Value::Long(truncate(*v, i64::MIN as f64, i64::MAX as f64, kind)? as i64)
        }
        (ScalarKind::Long, Token::String(s)) if coerce => Value::Long(parse_text(s, kind)?),

        (ScalarKind::Double, Token::Int(v)) => Value::Double(f64::from(*v)),
        (ScalarKind::Double, Token::Long(v)) => Value::Double(*v as f64),
        (ScalarKind::Double, Token::Double(v)) => Value::Double(*v),
        (ScalarKind::Double, Token::String(s)) if coerce => Value::Double(parse_text(s, kind)?),

        (ScalarKind::String, Token::String(s)) => Value::String(s.clone()),
        (ScalarKind::String, Token::Int(v)) if coerce => Value::String(v.to_string()),
        (ScalarKind::String, Token::Long(v)) if coerce => Value::String(v.to_string()),
        (ScalarKind::String, Token::Double(v)) if coerce => Value::String(v.to_string()),
        (ScalarKind::String, Token::Bool(v)) if coerce => Value::String(v.to_string()),

        (ScalarKind::Char, Token::String(s)) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Value::String(c.to_string()),
                _ => {
                    return Err(BindError::invalid_value(
                        kind,
                        format!("`{}` is not a single character", s),
                    ))
                }
            }
        }

        (ScalarKind::Bytes, Token::String(s)) => Value::Bytes(
            STANDARD
                .decode(s)
                .map_err(|e| BindError::invalid_value(kind, e.to_string()))?,
        ),

        (_, other) => return Err(BindError::mismatch(kind, Some(other.kind()))),
    };
    Ok(value)
}

fn truncate(value: f64, min: f64, max: f64, kind: ScalarKind) -> Result<f64> {
    if value.is_finite() && value >= min && value <= max {
        Ok(value.trunc())
    } else {
        Err(BindError::invalid_value(kind, format!("{} is out of range", value)))
    }
}

fn parse_text<T: std::str::FromStr>(text: &str, kind: ScalarKind) -> Result<T> {
    text.trim()
        .parse()
        .map_err(|_| BindError::invalid_value(kind, format!("cannot parse `{}`", text)))
}

/// Read the value under the cursor as an untyped JSON node
pub(crate) fn read_tree(reader: &mut dyn TokenReader) -> Result<serde_json::Value> {
    let mut writer = JsonWriter::new();
    copy_value(reader, &mut writer)?;
    writer.finish()
}

/// Natural mapping: objects become string-keyed maps, arrays become lists
pub(crate) fn read_any(reader: &mut dyn TokenReader) -> Result<Value> {
    match reader.current_kind() {
        Some(TokenKind::StartObject) => {
            reader.advance()?;
            let mut entries = Vec::new();
            while reader.current_kind() != Some(TokenKind::EndObject) {
                let name = reader.expect_field_name()?;
                let value = read_any(reader).map_err(|e| e.at_field(&name))?;
                entries.push((Value::String(name), value));
            }
            reader.advance()?;
            Ok(Value::Map(entries))
        }
        Some(TokenKind::StartArray) => {
            reader.advance()?;
            let mut items = Vec::new();
            while reader.current_kind() != Some(TokenKind::EndArray) {
                if reader.current().is_none() {
                    return Err(BindError::Stream("unterminated array".into()));
                }
                let value = read_any(reader).map_err(|e| e.at_index(items.len()))?;
                items.push(value);
            }
            reader.advance()?;
            Ok(Value::List(items))
        }
        _ => {
            let value = match reader.current() {
                Some(Token::String(s)) => Value::String(s.clone()),
                Some(Token::Int(v)) => Value::Int(*v),
                Some(Token::Long(v)) => Value::Long(*v),
                Some(Token::Double(v)) => Value::Double(*v),
                Some(Token::Bool(v)) => Value::Bool(*v),
                Some(Token::Null) => Value::Null,
                Some(Token::Embedded(value)) => value.clone(),
                other => return Err(BindError::mismatch("any", other.map(Token::kind))),
            };
            reader.advance()?;
            Ok(value)
        }
    }
}

/// Reads enum variants by name or by ordinal
#[derive(Debug)]
pub struct EnumReader {
    ty: TypeDescriptor,
    variants: Vec<String>,
}

impl EnumReader {
    pub fn new(ty: TypeDescriptor, variants: Vec<String>) -> Self {
        Self { ty, variants }
    }

    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    pub fn read(&self, options: &ReadOptions, reader: &mut dyn TokenReader) -> Result<Value> {
        let found = match reader.current() {
            Some(Token::String(name)) => self.variants.iter().find(|v| *v == name).cloned(),
            Some(Token::Int(ordinal)) => usize::try_from(*ordinal)
                .ok()
                .and_then(|i| self.variants.get(i))
                .cloned(),
            other => return Err(BindError::mismatch(&self.ty, other.map(Token::kind))),
        };
        let raw = reader.current().cloned();
        reader.advance()?;

        match found {
            Some(variant) => Ok(Value::Enum(variant)),
            None if options.read_unknown_enum_values_as_null => Ok(Value::Null),
            None => Err(BindError::invalid_value(
                &self.ty,
                format!(
                    "{:?} is not one of the variants {:?}",
                    raw.unwrap_or(Token::Null),
                    self.variants
                ),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{json_to_tokens, BufferReader};
    use serde_json::json;

    fn reader(value: serde_json::Value) -> BufferReader {
        json_to_tokens(&value).into_reader()
    }

    fn read(kind: ScalarKind, value: serde_json::Value) -> Result<Value> {
        read_scalar(kind, &ReadOptions::default(), &mut reader(value))
    }

    #[test]
    fn test_exact_scalars() {
        assert_eq!(read(ScalarKind::Int, json!(7)).unwrap(), Value::Int(7));
        assert_eq!(read(ScalarKind::Long, json!(7)).unwrap(), Value::Long(7));
        assert_eq!(read(ScalarKind::Double, json!(2)).unwrap(), Value::Double(2.0));
        assert_eq!(read(ScalarKind::Bool, json!(true)).unwrap(), Value::Bool(true));
        assert_eq!(read(ScalarKind::String, json!("x")).unwrap(), Value::from("x"));
    }

    #[test]
    fn test_coercions_follow_options() {
        assert_eq!(read(ScalarKind::Int, json!("42")).unwrap(), Value::Int(42));
        assert_eq!(read(ScalarKind::Int, json!(3.9)).unwrap(), Value::Int(3));
        assert_eq!(read(ScalarKind::String, json!(5)).unwrap(), Value::from("5"));
        assert_eq!(read(ScalarKind::Bool, json!("false")).unwrap(), Value::Bool(false));

        let strict = ReadOptions {
            allow_scalar_coercion: false,
            accept_float_as_int: false,
            ..ReadOptions::default()
        };
        let err = read_scalar(ScalarKind::Int, &strict, &mut reader(json!("42"))).unwrap_err();
        assert!(matches!(err, BindError::Mismatch { .. }));
        assert!(read_scalar(ScalarKind::Int, &strict, &mut reader(json!(3.5))).is_err());
    }

    #[test]
    fn test_out_of_range_int() {
        let err = read(ScalarKind::Int, json!(5_000_000_000i64)).unwrap_err();
        assert!(matches!(err, BindError::InvalidValue { .. }));
    }

    #[test]
    fn test_char_and_bytes() {
        assert_eq!(read(ScalarKind::Char, json!("q")).unwrap(), Value::from("q"));
        assert!(read(ScalarKind::Char, json!("qq")).is_err());
        assert_eq!(
            read(ScalarKind::Bytes, json!("aGk=")).unwrap(),
            Value::Bytes(b"hi".to_vec())
        );
    }

    #[test]
    fn test_object_token_is_mismatch() {
        let err = read(ScalarKind::String, json!({})).unwrap_err();
        assert_eq!(err.to_string(), "cannot read `string` from start-object token at $");
    }

    #[test]
    fn test_read_any_natural_mapping() {
        let value = read_any(&mut reader(json!({"a": [1, "b"], "c": null}))).unwrap();
        assert_eq!(
            value,
            Value::Map(vec![
                (
                    Value::from("a"),
                    Value::List(vec![Value::Int(1), Value::from("b")])
                ),
                (Value::from("c"), Value::Null),
            ])
        );
    }

    #[test]
    fn test_read_tree_leaves_cursor_after_value() {
        let mut tokens = json_to_tokens(&json!({"x": [1, 2]}));
        tokens.push(Token::Bool(true));
        let mut reader = tokens.into_reader();

        assert_eq!(read_tree(&mut reader).unwrap(), json!({"x": [1, 2]}));
        assert_eq!(reader.current(), Some(&Token::Bool(true)));
    }

    #[test]
    fn test_enum_by_name_and_ordinal() {
        let colors = EnumReader::new(
            TypeDescriptor::named("Color"),
            vec!["RED".into(), "GREEN".into()],
        );
        let options = ReadOptions::default();
        assert_eq!(
            colors.read(&options, &mut reader(json!("GREEN"))).unwrap(),
            Value::Enum("GREEN".into())
        );
        assert_eq!(
            colors.read(&options, &mut reader(json!(0))).unwrap(),
            Value::Enum("RED".into())
        );
        assert!(colors.read(&options, &mut reader(json!("BLUE"))).is_err());

        let lenient = ReadOptions {
            read_unknown_enum_values_as_null: true,
            ..ReadOptions::default()
        };
        assert_eq!(colors.read(&lenient, &mut reader(json!("BLUE"))).unwrap(), Value::Null);
    }
}
