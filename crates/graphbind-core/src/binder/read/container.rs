use super::ValueBinding;
use crate::context::DecodeContext;
use crate::errors::{BindError, Result};
use crate::introspect::Introspector;
use crate::token::{TokenKind, TokenReader};
use crate::types::{ScalarKind, TypeDescriptor, TypeKind};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Array,
    List,
    /// Equal elements are kept once, first occurrence wins
    Set,
}

/// Reads arrays, lists and sets element by element
#[derive(Debug)]
pub struct CollectionReader {
    ty: TypeDescriptor,
    kind: CollectionKind,
    element: ValueBinding,
}

impl CollectionReader {
    pub fn new(ty: TypeDescriptor, element: ValueBinding) -> Self {
        let kind = match ty.kind() {
            TypeKind::Set(_) => CollectionKind::Set,
            TypeKind::Array(_) => CollectionKind::Array,
            _ => CollectionKind::List,
        };
        Self { ty, kind, element }
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    pub fn element(&self) -> &ValueBinding {
        &self.element
    }

    pub fn read(&self, ctx: &mut DecodeContext<'_>, reader: &mut dyn TokenReader) -> Result<Value> {
        if reader.current_kind() != Some(TokenKind::StartArray) {
            if ctx.read_options().accept_single_value_as_array && reader.current().is_some() {
                let value = self.element.read(ctx, reader).map_err(|e| e.at_index(0))?;
                return Ok(Value::List(vec![value]));
            }
            return Err(BindError::mismatch(&self.ty, reader.current_kind()));
        }
        reader.advance()?;

        let mut items = Vec::new();
        let mut index = 0;
        loop {
            match reader.current_kind() {
                Some(TokenKind::EndArray) => break,
                None => return Err(BindError::Stream("unterminated array".into())),
                Some(_) => {}
            }
            let value = self
                .element
                .read(ctx, reader)
                .map_err(|e| e.at_index(index))?;
            if self.kind != CollectionKind::Set || !items.contains(&value) {
                items.push(value);
            }
            index += 1;
        }
        reader.advance()?;
        Ok(Value::List(items))
    }
}

/// Turns a field name back into a typed map key
#[derive(Debug, Clone, PartialEq)]
pub enum KeyDecoder {
    String,
    Char,
    Int,
    Long,
    Double,
    Bool,
    Enum(Vec<String>),
}

impl KeyDecoder {
    pub fn for_type(ty: &TypeDescriptor, introspector: &dyn Introspector) -> Result<Self> {
        let decoder = match ty.kind() {
            TypeKind::Scalar(ScalarKind::String) | TypeKind::Tree | TypeKind::Any => {
                KeyDecoder::String
            }
            TypeKind::Scalar(ScalarKind::Char) => KeyDecoder::Char,
            TypeKind::Scalar(ScalarKind::Int) => KeyDecoder::Int,
            TypeKind::Scalar(ScalarKind::Long) => KeyDecoder::Long,
            TypeKind::Scalar(ScalarKind::Double) => KeyDecoder::Double,
            TypeKind::Scalar(ScalarKind::Bool) => KeyDecoder::Bool,
            TypeKind::Named { .. } => {
                let variants = introspector
                    .describe(ty)
                    .and_then(|meta| meta.variants().map(<[String]>::to_vec))
                    .ok_or_else(|| {
                        BindError::definition(ty, "map keys must be scalars or enums")
                    })?;
                KeyDecoder::Enum(variants)
            }
            _ => return Err(BindError::definition(ty, "map keys must be scalars or enums")),
        };
        Ok(decoder)
    }

    pub fn decode(&self, name: &str) -> Result<Value> {
        let invalid = |what: &str| BindError::invalid_value(what, format!("bad map key `{}`", name));
        let key = match self {
            KeyDecoder::String => Value::String(name.to_string()),
            KeyDecoder::Char => {
                let mut chars = name.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Value::String(c.to_string()),
                    _ => return Err(invalid("char")),
                }
            }
            KeyDecoder::Int => Value::Int(name.parse().map_err(|_| invalid("int"))?),
            KeyDecoder::Long => Value::Long(name.parse().map_err(|_| invalid("long"))?),
            KeyDecoder::Double => Value::Double(name.parse().map_err(|_| invalid("double"))?),
            KeyDecoder::Bool => Value::Bool(name.parse().map_err(|_| invalid("bool"))?),
            KeyDecoder::Enum(variants) => {
                if !variants.iter().any(|v| v == name) {
                    return Err(invalid("enum"));
                }
                Value::Enum(name.to_string())
            }
        };
        Ok(key)
    }
}

/// Reads an object as ordered key/value pairs
#[derive(Debug)]
pub struct MapReader {
    ty: TypeDescriptor,
    key: KeyDecoder,
    value: ValueBinding,
}

impl MapReader {
    pub fn new(ty: TypeDescriptor, key: KeyDecoder, value: ValueBinding) -> Self {
        Self { ty, key, value }
    }

    pub fn value(&self) -> &ValueBinding {
        &self.value
    }

    pub fn read(&self, ctx: &mut DecodeContext<'_>, reader: &mut dyn TokenReader) -> Result<Value> {
        if reader.current_kind() != Some(TokenKind::StartObject) {
            return Err(BindError::mismatch(&self.ty, reader.current_kind()));
        }
        reader.advance()?;

        let mut entries = Vec::new();
        while reader.current_kind() != Some(TokenKind::EndObject) {
            let name = reader.expect_field_name()?;
            let key = self.key.decode(&name).map_err(|e| e.at_field(&name))?;
            let value = self
                .value
                .read(ctx, reader)
                .map_err(|e| e.at_field(&name))?;
            entries.push((key, value));
        }
        reader.advance()?;
        Ok(Value::Map(entries))
    }
}
