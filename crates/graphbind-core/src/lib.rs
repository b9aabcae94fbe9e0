pub mod binder;
pub mod config;
pub mod context;
pub mod errors;
pub mod factory;
pub mod introspect;
pub mod mapper;
pub mod polymorphic;
pub mod problems;
pub mod provider;
pub mod token;
pub mod types;
pub mod value;

pub use binder::{BinderId, CustomReader, CustomWriter, ReadBinder, WriteBinder};
pub use config::{DefaultInclusion, MapperConfig, ReadOptions, SelfReferences, WriteOptions};
pub use context::{DecodeContext, EncodeContext};
pub use errors::{BindError, ErrorCategory, FieldPath, PathSegment, Result};
pub use introspect::{
    Accessor, CreatorArgs, CreatorCandidate, CreatorParam, Inclusion, Introspector,
    NameTransform, NullPolicy, PolymorphicConfig, PropertyMeta, SchemaFile, TypeIdInclusion,
    TypeMeta, TypeRegistry,
};
pub use mapper::{Mapper, MapperStats, ReadOutcome};
pub use polymorphic::PolymorphicResolver;
pub use problems::{
    CollectingProblemHandler, LoggingProblemHandler, Problem, ProblemHandler, ProblemResolution,
};
pub use token::{Token, TokenKind, TokenReader, TokenWriter};
pub use types::{ScalarKind, TypeDescriptor, TypeKind};
pub use value::{Document, Instance, ObjectGraph, ObjectId, Value};
