mod creators;
mod read;
mod write;

pub use read::ReadFactory;
pub use write::WriteFactory;

use crate::errors::{BindError, Result};
use crate::introspect::{Introspector, PolymorphicConfig, TypeMeta};
use crate::types::TypeDescriptor;
use std::sync::Arc;

/// Declared type of a property with its use-site polymorphism applied.
/// For containers the configuration goes to the element or map value type.
fn use_site_type(ty: &TypeDescriptor, type_info: Option<&Arc<PolymorphicConfig>>) -> TypeDescriptor {
    let Some(config) = type_info else {
        return ty.clone();
    };
    match ty.content_type() {
        Some(content) => ty.with_content_type(content.with_type_handler(config.clone())),
        None => ty.with_type_handler(config.clone()),
    }
}

/// Polymorphic configuration in effect where `ty` is used
fn polymorphic_config(
    introspector: &dyn Introspector,
    ty: &TypeDescriptor,
) -> Option<Arc<PolymorphicConfig>> {
    if let Some(config) = ty.type_handler() {
        return Some(config.clone());
    }
    if ty.value_handler().is_some() || ty.raw_name().is_none() {
        return None;
    }
    introspector
        .describe(ty)
        .and_then(|meta| meta.polymorphic.clone())
}

fn describe(introspector: &dyn Introspector, ty: &TypeDescriptor) -> Result<Arc<TypeMeta>> {
    introspector
        .describe(ty)
        .ok_or_else(|| BindError::definition(ty, "type is not known to the introspector"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeKind;

    #[test]
    fn test_use_site_type_targets_container_content() {
        let config = Arc::new(PolymorphicConfig::property("type"));
        let list = TypeDescriptor::list(TypeDescriptor::named("Shape"));
        let applied = use_site_type(&list, Some(&config));

        assert!(applied.type_handler().is_none());
        let TypeKind::List(element) = applied.kind() else {
            panic!("expected a list");
        };
        assert!(element.type_handler().is_some());
        assert_eq!(applied, list);
    }

    #[test]
    fn test_use_site_type_without_config_is_unchanged() {
        let ty = TypeDescriptor::named("Shape");
        assert!(!use_site_type(&ty, None).has_handlers());
    }
}
