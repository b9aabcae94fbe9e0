mod bean;
mod container;

pub use bean::BeanWriter;
pub use container::{CollectionWriter, MapWriter};

use super::{BinderId, CustomWriter, PropertyDescriptor};
use crate::context::EncodeContext;
use crate::errors::{BindError, Result};
use crate::polymorphic::PolymorphicResolver;
use crate::token::{write_json, TokenWriter};
use crate::types::{ScalarKind, TypeDescriptor};
use crate::value::Value;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Property of a write binder
pub type WriteProperty = PropertyDescriptor<Arc<WriteBinding>>;

/// Use-site handle to a write binder.
///
/// Values whose runtime type differs from the declared one are written by the
/// runtime type's binder, looked up once per type and cached here.
pub struct WriteBinding {
    binder: BinderId,
    declared: Option<Arc<str>>,
    resolver: Option<Arc<PolymorphicResolver>>,
    dynamic: Mutex<FxHashMap<Arc<str>, BinderId>>,
}

impl WriteBinding {
    pub fn new(binder: BinderId, declared: &TypeDescriptor) -> Self {
        Self {
            binder,
            declared: declared.raw_name().map(Arc::from),
            resolver: None,
            dynamic: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<PolymorphicResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn binder_id(&self) -> BinderId {
        self.binder
    }

    pub fn resolver(&self) -> Option<&Arc<PolymorphicResolver>> {
        self.resolver.as_ref()
    }

    /// Binder id for a value: the declared one, or the runtime subtype's
    pub fn binder_for(&self, ctx: &EncodeContext<'_>, value: &Value) -> Result<BinderId> {
        let (Value::Object(id), Some(declared)) = (value, &self.declared) else {
            return Ok(self.binder);
        };
        let actual = ctx.instance(*id)?.type_name_arc();
        if actual == declared {
            return Ok(self.binder);
        }

        let cached = self
            .dynamic
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(actual)
            .copied();
        if let Some(binder) = cached {
            return Ok(binder);
        }
        let binder = ctx
            .mapper()
            .write_provider()
            .resolve(&TypeDescriptor::named(actual.clone()))?;
        self.dynamic
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(actual.clone(), binder);
        Ok(binder)
    }

    /// Write one value. Nulls and back references write null.
    pub fn write(
        &self,
        ctx: &mut EncodeContext<'_>,
        writer: &mut dyn TokenWriter,
        value: &Value,
    ) -> Result<()> {
        if matches!(value, Value::Null | Value::BackRef(_)) {
            return writer.write_null();
        }
        if let Some(resolver) = &self.resolver {
            return resolver.write(ctx, writer, value);
        }
        let id = self.binder_for(ctx, value)?;
        ctx.binder(id)?.write(ctx, writer, value)
    }
}

impl fmt::Debug for WriteBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteBinding")
            .field("binder", &self.binder)
            .field("declared", &self.declared)
            .field("polymorphic", &self.resolver.is_some())
            .finish()
    }
}

/// Compiled write strategy for one type
pub enum WriteBinder {
    Scalar(ScalarKind),
    Tree,
    Any,
    Collection(CollectionWriter),
    Map(MapWriter),
    Enum(TypeDescriptor),
    Bean(BeanWriter),
    Custom(Arc<dyn CustomWriter>),
}

impl WriteBinder {
    pub fn write(
        &self,
        ctx: &mut EncodeContext<'_>,
        writer: &mut dyn TokenWriter,
        value: &Value,
    ) -> Result<()> {
        match self {
            WriteBinder::Scalar(kind) => write_scalar(*kind, writer, value),
            WriteBinder::Tree | WriteBinder::Any => write_natural(ctx, writer, value),
            WriteBinder::Collection(collection) => collection.write(ctx, writer, value),
            WriteBinder::Map(map) => map.write(ctx, writer, value),
            WriteBinder::Enum(ty) => match value {
                Value::Null => writer.write_null(),
                Value::Enum(variant) | Value::String(variant) => writer.write_string(variant),
                other => Err(unwritable(ty, other)),
            },
            WriteBinder::Bean(bean) => bean.write(ctx, writer, value),
            WriteBinder::Custom(custom) => custom.write(ctx, writer, value),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            WriteBinder::Scalar(_) => "scalar",
            WriteBinder::Tree => "tree",
            WriteBinder::Any => "any",
            WriteBinder::Collection(_) => "collection",
            WriteBinder::Map(_) => "map",
            WriteBinder::Enum(_) => "enum",
            WriteBinder::Bean(_) => "bean",
            WriteBinder::Custom(_) => "custom",
        }
    }

    pub fn as_bean(&self) -> Option<&BeanWriter> {
        match self {
            WriteBinder::Bean(bean) => Some(bean),
            _ => None,
        }
    }
}

impl fmt::Debug for WriteBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteBinder::Scalar(kind) => write!(f, "WriteBinder::Scalar({})", kind),
            WriteBinder::Bean(bean) => write!(f, "WriteBinder::Bean({})", bean.type_name()),
            other => write!(f, "WriteBinder::{}", other.kind_name()),
        }
    }
}

fn unwritable(ty: impl fmt::Display, value: &Value) -> BindError {
    BindError::invalid_value(ty, format!("cannot write a {} value", value.kind_name()))
}

pub(crate) fn write_scalar(kind: ScalarKind, writer: &mut dyn TokenWriter, value: &Value) -> Result<()> {
    match value {
        Value::Null | Value::BackRef(_) => writer.write_null(),
        Value::Bool(v) => writer.write_bool(*v),
        Value::Int(v) => writer.write_int(*v),
        Value::Long(v) => writer.write_long(*v),
        Value::Double(v) => writer.write_double(*v),
        Value::String(s) | Value::Enum(s) => writer.write_string(s),
        Value::Bytes(bytes) => writer.write_string(&STANDARD.encode(bytes)),
        Value::Tree(node) => write_json(writer, node),
        other => Err(unwritable(kind, other)),
    }
}

/// Write any value by its own shape; objects go through their runtime type's binder
pub(crate) fn write_natural(
    ctx: &mut EncodeContext<'_>,
    writer: &mut dyn TokenWriter,
    value: &Value,
) -> Result<()> {
    match value {
        Value::List(items) => {
            writer.write_start_array()?;
            for (index, item) in items.iter().enumerate() {
                write_natural(ctx, writer, item).map_err(|e| e.at_index(index))?;
            }
            writer.write_end_array()
        }
        Value::Map(entries) => {
            writer.write_start_object()?;
            for (key, item) in entries {
                let name = key_text(key)?;
                writer.write_field_name(&name)?;
                write_natural(ctx, writer, item).map_err(|e| e.at_field(&name))?;
            }
            writer.write_end_object()
        }
        Value::Object(id) => {
            let type_name = ctx.instance(*id)?.type_name_arc().clone();
            let binder = ctx
                .mapper()
                .write_provider()
                .binder(&TypeDescriptor::named(type_name))?;
            binder.write(ctx, writer, value)
        }
        Value::Tree(node) => write_json(writer, node),
        Value::Bytes(bytes) => writer.write_string(&STANDARD.encode(bytes)),
        other => write_scalar(ScalarKind::String, writer, other),
    }
}

/// Field name for a map key
pub(crate) fn key_text(key: &Value) -> Result<String> {
    match key {
        Value::String(s) | Value::Enum(s) => Ok(s.clone()),
        Value::Int(v) => Ok(v.to_string()),
        Value::Long(v) => Ok(v.to_string()),
        Value::Double(v) => Ok(v.to_string()),
        Value::Bool(v) => Ok(v.to_string()),
        other => Err(BindError::invalid_value(
            "map key",
            format!("a {} value cannot be a field name", other.kind_name()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::JsonWriter;
    use serde_json::json;

    fn scalar(kind: ScalarKind, value: &Value) -> Result<serde_json::Value> {
        let mut writer = JsonWriter::new();
        write_scalar(kind, &mut writer, value)?;
        writer.finish()
    }

    #[test]
    fn test_write_scalars() {
        assert_eq!(scalar(ScalarKind::Int, &Value::Int(4)).unwrap(), json!(4));
        assert_eq!(scalar(ScalarKind::String, &Value::from("x")).unwrap(), json!("x"));
        assert_eq!(
            scalar(ScalarKind::Bytes, &Value::Bytes(b"hi".to_vec())).unwrap(),
            json!("aGk=")
        );
        assert_eq!(scalar(ScalarKind::Int, &Value::Null).unwrap(), json!(null));
        assert!(scalar(ScalarKind::Int, &Value::List(vec![])).is_err());
    }

    #[test]
    fn test_key_text() {
        assert_eq!(key_text(&Value::Int(3)).unwrap(), "3");
        assert_eq!(key_text(&Value::Enum("RED".into())).unwrap(), "RED");
        assert!(key_text(&Value::Null).is_err());
    }
}
