use std::fmt;
use thiserror::Error;

use crate::token::TokenKind;

/// One step in the path from the root value to the failure location
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

/// Location of a failure inside the value being read or written, rendered as `$.children[0].name`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn prepend(&mut self, segment: PathSegment) {
        self.segments.insert(0, segment);
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for segment in &self.segments {
            match segment {
                PathSegment::Field(name) => write!(f, ".{}", name)?,
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

/// Coarse classification of a [`BindError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Building a binder failed; the binder is never published
    Construction,
    /// The token stream did not fit the target type
    Read,
    /// A creator or setter failed
    Instantiation,
    /// Encoding a value failed
    Write,
    /// Token stream, configuration or IO failures
    Environment,
}

#[derive(Debug, Error)]
pub enum BindError {
    #[error("invalid definition for type `{ty}`: {message}")]
    InvalidDefinition { ty: String, message: String },

    #[error("cannot read `{expected}` from {found} at {path}")]
    Mismatch {
        expected: String,
        found: String,
        path: FieldPath,
    },

    #[error("unrecognized field `{name}` for type `{ty}` at {path} (known fields: {known:?})")]
    UnrecognizedProperty {
        ty: String,
        name: String,
        known: Vec<String>,
        path: FieldPath,
    },

    #[error("invalid value for `{ty}` at {path}: {message}")]
    InvalidValue {
        ty: String,
        message: String,
        path: FieldPath,
    },

    #[error("null is not allowed for property `{property}` at {path}")]
    InvalidNull { property: String, path: FieldPath },

    #[error("missing type id property `{property}` for polymorphic type `{base}` at {path}")]
    MissingTypeId {
        base: String,
        property: String,
        path: FieldPath,
    },

    #[error("unknown type id `{id}` for polymorphic type `{base}` at {path}")]
    UnknownTypeId {
        base: String,
        id: String,
        path: FieldPath,
    },

    #[error("reference error at {path}: {message}")]
    Reference { message: String, path: FieldPath },

    #[error("cannot instantiate `{ty}` at {path}: {message}")]
    Instantiation {
        ty: String,
        message: String,
        path: FieldPath,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },

    #[error("cannot write `{ty}` at {path}: {message}")]
    Cycle {
        ty: String,
        message: String,
        path: FieldPath,
    },

    #[error("token stream error: {0}")]
    Stream(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, BindError>;

impl BindError {
    pub fn definition(ty: impl fmt::Display, message: impl Into<String>) -> Self {
        BindError::InvalidDefinition {
            ty: ty.to_string(),
            message: message.into(),
        }
    }

    pub fn mismatch(expected: impl fmt::Display, found: Option<TokenKind>) -> Self {
        BindError::Mismatch {
            expected: expected.to_string(),
            found: match found {
                Some(kind) => format!("{} token", kind),
                None => "end of input".to_string(),
            },
            path: FieldPath::new(),
        }
    }

    pub fn invalid_value(ty: impl fmt::Display, message: impl Into<String>) -> Self {
        BindError::InvalidValue {
            ty: ty.to_string(),
            message: message.into(),
            path: FieldPath::new(),
        }
    }

    pub fn reference(message: impl Into<String>) -> Self {
        BindError::Reference {
            message: message.into(),
            path: FieldPath::new(),
        }
    }

    pub fn instantiation(ty: impl fmt::Display, message: impl Into<String>) -> Self {
        BindError::Instantiation {
            ty: ty.to_string(),
            message: message.into(),
            path: FieldPath::new(),
            source: None,
        }
    }

    /// Convert a failure raised by a creator or setter closure.
    ///
    /// A `BindError` carried inside the `anyhow::Error` is recovered as-is;
    /// anything else is reported through its root cause.
    pub fn from_user(ty: impl fmt::Display, err: anyhow::Error) -> Self {
        match err.downcast::<BindError>() {
            Ok(bind) => bind,
            Err(other) => BindError::Instantiation {
                ty: ty.to_string(),
                message: other.root_cause().to_string(),
                path: FieldPath::new(),
                source: Some(other.into()),
            },
        }
    }

    /// Prepend a path step while the error unwinds through nested binders.
    /// Stream-level failures pass through unchanged.
    pub fn at(mut self, segment: PathSegment) -> Self {
        if let Some(path) = self.path_mut() {
            path.prepend(segment);
        }
        self
    }

    pub fn at_field(self, name: &str) -> Self {
        self.at(PathSegment::Field(name.to_string()))
    }

    pub fn at_index(self, index: usize) -> Self {
        self.at(PathSegment::Index(index))
    }

    pub fn path(&self) -> Option<&FieldPath> {
        match self {
            BindError::Mismatch { path, .. }
            | BindError::UnrecognizedProperty { path, .. }
            | BindError::InvalidValue { path, .. }
            | BindError::InvalidNull { path, .. }
            | BindError::MissingTypeId { path, .. }
            | BindError::UnknownTypeId { path, .. }
            | BindError::Reference { path, .. }
            | BindError::Instantiation { path, .. }
            | BindError::Cycle { path, .. } => Some(path),
            _ => None,
        }
    }

    fn path_mut(&mut self) -> Option<&mut FieldPath> {
        match self {
            BindError::Mismatch { path, .. }
            | BindError::UnrecognizedProperty { path, .. }
            | BindError::InvalidValue { path, .. }
            | BindError::InvalidNull { path, .. }
            | BindError::MissingTypeId { path, .. }
            | BindError::UnknownTypeId { path, .. }
            | BindError::Reference { path, .. }
            | BindError::Instantiation { path, .. }
            | BindError::Cycle { path, .. } => Some(path),
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            BindError::InvalidDefinition { .. } => ErrorCategory::Construction,
            BindError::Mismatch { .. }
            | BindError::UnrecognizedProperty { .. }
            | BindError::InvalidValue { .. }
            | BindError::InvalidNull { .. }
            | BindError::MissingTypeId { .. }
            | BindError::UnknownTypeId { .. }
            | BindError::Reference { .. } => ErrorCategory::Read,
            BindError::Instantiation { .. } => ErrorCategory::Instantiation,
            BindError::Cycle { .. } => ErrorCategory::Write,
            BindError::Stream(_)
            | BindError::Config(_)
            | BindError::Io(_)
            | BindError::Json(_)
            | BindError::Yaml(_) => ErrorCategory::Environment,
        }
    }
}
