//! Metadata oracle consulted while binders are built.
//!
//! The engine never inspects values to learn about types. Everything it
//! knows about a nominal type (properties, creators, polymorphism, overrides)
//! comes from an [`Introspector`].

mod meta;
mod registry;
mod schema;

pub use meta::{
    Accessor, CreatorArgs, CreatorCandidate, CreatorFn, CreatorMode, CreatorParam, Getter,
    Inclusion, NameTransform, NullPolicy, PolymorphicConfig, PropertyMeta, ReferenceRole, Setter,
    TypeIdInclusion, TypeMeta, TypeShape,
};
pub use registry::TypeRegistry;
pub use schema::{
    CreatorSchema, PolymorphicSchema, PropertySchema, SchemaFile, TypeSchema,
};

use crate::types::TypeDescriptor;
use std::sync::Arc;

/// Source of type metadata. Implementations must be pure: the same
/// descriptor always yields the same answer.
pub trait Introspector: Send + Sync {
    /// Metadata for a nominal type, `None` if the type is unknown
    fn describe(&self, ty: &TypeDescriptor) -> Option<Arc<TypeMeta>>;

    /// Whether a value of type `source` may stand where `target` is declared
    fn is_assignable(&self, target: &str, source: &str) -> bool;

    /// Concrete types assignable to `base`, excluding `base` itself
    fn find_subtypes(&self, base: &str) -> Vec<Arc<str>>;
}
