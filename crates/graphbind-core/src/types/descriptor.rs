use crate::binder::{CustomReader, CustomWriter};
use crate::introspect::PolymorphicConfig;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Scalar shapes with a fixed token mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    Int,
    Long,
    Double,
    String,
    Char,
    /// Base64 text on the wire
    Bytes,
}

impl ScalarKind {
    pub fn name(self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int => "int",
            ScalarKind::Long => "long",
            ScalarKind::Double => "double",
            ScalarKind::String => "string",
            ScalarKind::Char => "char",
            ScalarKind::Bytes => "bytes",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Structural identity of a type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Scalar(ScalarKind),
    /// Untyped document node
    Tree,
    /// Natural mapping: objects become maps, arrays become lists
    Any,
    Array(TypeDescriptor),
    List(TypeDescriptor),
    Set(TypeDescriptor),
    Map {
        key: TypeDescriptor,
        value: TypeDescriptor,
    },
    /// A nominal type described by the introspector
    Named {
        name: Arc<str>,
        params: Vec<TypeDescriptor>,
    },
}

/// Explicit binder override attached at a use site
#[derive(Clone, Default)]
pub struct ValueHandler {
    pub reader: Option<Arc<dyn CustomReader>>,
    pub writer: Option<Arc<dyn CustomWriter>>,
}

impl fmt::Debug for ValueHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueHandler")
            .field("reader", &self.reader.is_some())
            .field("writer", &self.writer.is_some())
            .finish()
    }
}

struct TypeInner {
    kind: TypeKind,
    value_handler: Option<ValueHandler>,
    type_handler: Option<Arc<PolymorphicConfig>>,
}

/// Immutable, cheaply clonable type identity used as the binder cache key.
///
/// Attached handlers do not take part in equality or hashing; descriptors
/// that carry them are never published to a binder cache.
#[derive(Clone)]
pub struct TypeDescriptor {
    inner: Arc<TypeInner>,
}

impl TypeDescriptor {
    pub fn new(kind: TypeKind) -> Self {
        Self {
            inner: Arc::new(TypeInner {
                kind,
                value_handler: None,
                type_handler: None,
            }),
        }
    }

    pub fn scalar(kind: ScalarKind) -> Self {
        Self::new(TypeKind::Scalar(kind))
    }

    pub fn string() -> Self {
        Self::scalar(ScalarKind::String)
    }

    pub fn int() -> Self {
        Self::scalar(ScalarKind::Int)
    }

    pub fn long() -> Self {
        Self::scalar(ScalarKind::Long)
    }

    pub fn double() -> Self {
        Self::scalar(ScalarKind::Double)
    }

    pub fn boolean() -> Self {
        Self::scalar(ScalarKind::Bool)
    }

    pub fn bytes() -> Self {
        Self::scalar(ScalarKind::Bytes)
    }

    pub fn tree() -> Self {
        Self::new(TypeKind::Tree)
    }

    pub fn any() -> Self {
        Self::new(TypeKind::Any)
    }

    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self::new(TypeKind::Named {
            name: name.into(),
            params: Vec::new(),
        })
    }

    pub fn generic(name: impl Into<Arc<str>>, params: Vec<TypeDescriptor>) -> Self {
        Self::new(TypeKind::Named {
            name: name.into(),
            params,
        })
    }

    pub fn array(element: TypeDescriptor) -> Self {
        Self::new(TypeKind::Array(element))
    }

    pub fn list(element: TypeDescriptor) -> Self {
        Self::new(TypeKind::List(element))
    }

    pub fn set(element: TypeDescriptor) -> Self {
        Self::new(TypeKind::Set(element))
    }

    pub fn map(key: TypeDescriptor, value: TypeDescriptor) -> Self {
        Self::new(TypeKind::Map { key, value })
    }

    /// Fixed table of well-known scalar and node type names
    pub fn well_known(name: &str) -> Option<TypeKind> {
        let kind = match name {
            "bool" | "boolean" => TypeKind::Scalar(ScalarKind::Bool),
            "int" | "i32" | "integer" => TypeKind::Scalar(ScalarKind::Int),
            "long" | "i64" => TypeKind::Scalar(ScalarKind::Long),
            "double" | "f64" | "float" | "number" => TypeKind::Scalar(ScalarKind::Double),
            "string" | "str" | "String" => TypeKind::Scalar(ScalarKind::String),
            "char" => TypeKind::Scalar(ScalarKind::Char),
            "bytes" | "binary" => TypeKind::Scalar(ScalarKind::Bytes),
            "json" | "tree" | "node" => TypeKind::Tree,
            "any" | "object" => TypeKind::Any,
            _ => return None,
        };
        Some(kind)
    }

    pub fn kind(&self) -> &TypeKind {
        &self.inner.kind
    }

    /// Raw name of a nominal type
    pub fn raw_name(&self) -> Option<&str> {
        match &self.inner.kind {
            TypeKind::Named { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn params(&self) -> &[TypeDescriptor] {
        match &self.inner.kind {
            TypeKind::Named { params, .. } => params,
            _ => &[],
        }
    }

    /// Element type of arrays, lists and sets; value type of maps
    pub fn content_type(&self) -> Option<&TypeDescriptor> {
        match &self.inner.kind {
            TypeKind::Array(element) | TypeKind::List(element) | TypeKind::Set(element) => {
                Some(element)
            }
            TypeKind::Map { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn key_type(&self) -> Option<&TypeDescriptor> {
        match &self.inner.kind {
            TypeKind::Map { key, .. } => Some(key),
            _ => None,
        }
    }

    pub fn is_container(&self) -> bool {
        self.content_type().is_some()
    }

    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match &self.inner.kind {
            TypeKind::Scalar(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn value_handler(&self) -> Option<&ValueHandler> {
        self.inner.value_handler.as_ref()
    }

    pub fn type_handler(&self) -> Option<&Arc<PolymorphicConfig>> {
        self.inner.type_handler.as_ref()
    }

    /// Copy of this descriptor with an explicit binder override attached
    pub fn with_value_handler(&self, handler: ValueHandler) -> Self {
        Self {
            inner: Arc::new(TypeInner {
                kind: self.inner.kind.clone(),
                value_handler: Some(handler),
                type_handler: self.inner.type_handler.clone(),
            }),
        }
    }

    /// Copy of this descriptor with a use-site polymorphic configuration attached
    pub fn with_type_handler(&self, config: Arc<PolymorphicConfig>) -> Self {
        Self {
            inner: Arc::new(TypeInner {
                kind: self.inner.kind.clone(),
                value_handler: self.inner.value_handler.clone(),
                type_handler: Some(config),
            }),
        }
    }

    /// Copy without the use-site polymorphic configuration
    pub fn without_type_handler(&self) -> Self {
        if self.inner.type_handler.is_none() {
            return self.clone();
        }
        Self {
            inner: Arc::new(TypeInner {
                kind: self.inner.kind.clone(),
                value_handler: self.inner.value_handler.clone(),
                type_handler: None,
            }),
        }
    }

    /// Copy of a container descriptor with its content type replaced
    pub fn with_content_type(&self, content: TypeDescriptor) -> Self {
        let kind = match &self.inner.kind {
            TypeKind::Array(_) => TypeKind::Array(content),
            TypeKind::List(_) => TypeKind::List(content),
            TypeKind::Set(_) => TypeKind::Set(content),
            TypeKind::Map { key, .. } => TypeKind::Map {
                key: key.clone(),
                value: content,
            },
            other => other.clone(),
        };
        Self {
            inner: Arc::new(TypeInner {
                kind,
                value_handler: self.inner.value_handler.clone(),
                type_handler: self.inner.type_handler.clone(),
            }),
        }
    }

    /// Whether this descriptor or any nested one carries attached handlers
    pub fn has_handlers(&self) -> bool {
        if self.inner.value_handler.is_some() || self.inner.type_handler.is_some() {
            return true;
        }
        match &self.inner.kind {
            TypeKind::Array(t) | TypeKind::List(t) | TypeKind::Set(t) => t.has_handlers(),
            TypeKind::Map { key, value } => key.has_handlers() || value.has_handlers(),
            TypeKind::Named { params, .. } => params.iter().any(TypeDescriptor::has_handlers),
            _ => false,
        }
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner.kind == other.inner.kind
    }
}

impl Eq for TypeDescriptor {}

impl Hash for TypeDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.kind.hash(state);
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.kind {
            TypeKind::Scalar(kind) => write!(f, "{}", kind),
            TypeKind::Tree => write!(f, "json"),
            TypeKind::Any => write!(f, "any"),
            TypeKind::Array(element) => write!(f, "{}[]", element),
            TypeKind::List(element) => write!(f, "list<{}>", element),
            TypeKind::Set(element) => write!(f, "set<{}>", element),
            TypeKind::Map { key, value } => write!(f, "map<{}, {}>", key, value),
            TypeKind::Named { name, params } => {
                write!(f, "{}", name)?;
                if !params.is_empty() {
                    write!(f, "<")?;
                    for (i, param) in params.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", param)?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeDescriptor({})", self)
    }
}
