mod bean;
mod container;
mod scalar;

pub use bean::{AbstractReader, BeanReader};
pub use container::{CollectionKind, CollectionReader, KeyDecoder, MapReader};
pub use scalar::EnumReader;

use super::{BinderId, CustomReader, PropertyDescriptor};
use crate::context::DecodeContext;
use crate::errors::Result;
use crate::polymorphic::PolymorphicResolver;
use crate::token::{TokenKind, TokenReader};
use crate::types::ScalarKind;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Property of a read binder
pub type ReadProperty = PropertyDescriptor<ValueBinding>;

/// Use-site handle to a read binder: the binder id plus an optional
/// polymorphic resolver that picks a concrete binder per value
#[derive(Clone)]
pub struct ValueBinding {
    binder: BinderId,
    resolver: Option<Arc<PolymorphicResolver>>,
}

impl ValueBinding {
    pub fn new(binder: BinderId) -> Self {
        Self {
            binder,
            resolver: None,
        }
    }

    pub fn with_resolver(binder: BinderId, resolver: Arc<PolymorphicResolver>) -> Self {
        Self {
            binder,
            resolver: Some(resolver),
        }
    }

    pub fn binder_id(&self) -> BinderId {
        self.binder
    }

    pub fn resolver(&self) -> Option<&Arc<PolymorphicResolver>> {
        self.resolver.as_ref()
    }

    /// Read one value. A null token always reads as [`Value::Null`].
    pub fn read(&self, ctx: &mut DecodeContext<'_>, reader: &mut dyn TokenReader) -> Result<Value> {
        if reader.current_kind() == Some(TokenKind::Null) {
            reader.advance()?;
            return Ok(Value::Null);
        }
        match &self.resolver {
            Some(resolver) => resolver.read(ctx, reader, self.binder),
            None => ctx.binder(self.binder)?.read(ctx, reader),
        }
    }
}

impl fmt::Debug for ValueBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueBinding")
            .field("binder", &self.binder)
            .field("polymorphic", &self.resolver.is_some())
            .finish()
    }
}

/// Compiled read strategy for one type
pub enum ReadBinder {
    Scalar(ScalarKind),
    Tree,
    Any,
    Collection(CollectionReader),
    Map(MapReader),
    Enum(EnumReader),
    Bean(BeanReader),
    /// Placeholder for an abstract type without a usable creator
    Abstract(AbstractReader),
    Custom(Arc<dyn CustomReader>),
}

impl ReadBinder {
    pub fn read(&self, ctx: &mut DecodeContext<'_>, reader: &mut dyn TokenReader) -> Result<Value> {
        match self {
            ReadBinder::Scalar(kind) => scalar::read_scalar(*kind, ctx.read_options(), reader),
            ReadBinder::Tree => scalar::read_tree(reader).map(Value::Tree),
            ReadBinder::Any => scalar::read_any(reader),
            ReadBinder::Collection(collection) => collection.read(ctx, reader),
            ReadBinder::Map(map) => map.read(ctx, reader),
            ReadBinder::Enum(variants) => variants.read(ctx.read_options(), reader),
            ReadBinder::Bean(bean) => bean.read(ctx, reader),
            ReadBinder::Abstract(placeholder) => placeholder.read(reader),
            ReadBinder::Custom(custom) => custom.read(ctx, reader),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ReadBinder::Scalar(_) => "scalar",
            ReadBinder::Tree => "tree",
            ReadBinder::Any => "any",
            ReadBinder::Collection(_) => "collection",
            ReadBinder::Map(_) => "map",
            ReadBinder::Enum(_) => "enum",
            ReadBinder::Bean(_) => "bean",
            ReadBinder::Abstract(_) => "abstract",
            ReadBinder::Custom(_) => "custom",
        }
    }

    pub fn as_bean(&self) -> Option<&BeanReader> {
        match self {
            ReadBinder::Bean(bean) => Some(bean),
            _ => None,
        }
    }

    /// Back-reference property declared under a reference name
    pub fn back_reference(&self, reference: &str) -> Option<&ReadProperty> {
        let candidates = match self {
            ReadBinder::Bean(bean) => bean.back_references(),
            ReadBinder::Abstract(placeholder) => placeholder.back_references(),
            _ => return None,
        };
        candidates.iter().find(|p| {
            matches!(p.role(), crate::introspect::ReferenceRole::Back(name) if name == reference)
        })
    }
}

impl fmt::Debug for ReadBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadBinder::Scalar(kind) => write!(f, "ReadBinder::Scalar({})", kind),
            ReadBinder::Bean(bean) => write!(f, "ReadBinder::Bean({})", bean.type_name()),
            other => write!(f, "ReadBinder::{}", other.kind_name()),
        }
    }
}
