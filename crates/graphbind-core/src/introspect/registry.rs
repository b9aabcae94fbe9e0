use super::{Introspector, TypeMeta};
use crate::errors::{BindError, Result};
use crate::types::{TypeDescriptor, TypeKind};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use tracing::debug;

/// In-memory [`Introspector`] populated by registration
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: FxHashMap<Arc<str>, Arc<TypeMeta>>,
    order: Vec<Arc<str>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type; registering the same name twice is an error
    pub fn register(&mut self, meta: TypeMeta) -> Result<()> {
        if self.types.contains_key(&meta.name) {
            return Err(BindError::definition(
                &meta.name,
                "type is already registered",
            ));
        }
        debug!(ty = %meta.name, properties = meta.properties.len(), "registered type");
        self.order.push(meta.name.clone());
        self.types.insert(meta.name.clone(), Arc::new(meta));
        Ok(())
    }

    /// Builder-style registration
    pub fn with(mut self, meta: TypeMeta) -> Result<Self> {
        self.register(meta)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<TypeMeta>> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Registered type names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|name| &**name)
    }
}

impl Introspector for TypeRegistry {
    fn describe(&self, ty: &TypeDescriptor) -> Option<Arc<TypeMeta>> {
        let TypeKind::Named { name, params } = ty.kind() else {
            return None;
        };
        let meta = self.types.get(name)?;
        if meta.type_params.is_empty() {
            return Some(meta.clone());
        }

        // Unbound parameters read and write as `any`
        let bindings: FxHashMap<&str, TypeDescriptor> = meta
            .type_params
            .iter()
            .enumerate()
            .map(|(i, param)| {
                let bound = params.get(i).cloned().unwrap_or_else(TypeDescriptor::any);
                (param.as_str(), bound)
            })
            .collect();

        let mut specialized = TypeMeta::clone(meta);
        for property in &mut specialized.properties {
            property.ty = substitute(&property.ty, &bindings);
        }
        for creator in &mut specialized.creators {
            for param in &mut creator.params {
                param.ty = substitute(&param.ty, &bindings);
            }
        }
        if let Some(catch_all) = &specialized.catch_all {
            specialized.catch_all = Some(substitute(catch_all, &bindings));
        }
        specialized.type_params.clear();
        Some(Arc::new(specialized))
    }

    fn is_assignable(&self, target: &str, source: &str) -> bool {
        if target == source {
            return true;
        }
        let mut seen = FxHashSet::default();
        let mut stack = vec![source];
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            let Some(meta) = self.types.get(current) else {
                continue;
            };
            for supertype in &meta.supertypes {
                if &**supertype == target {
                    return true;
                }
                stack.push(supertype);
            }
        }
        false
    }

    fn find_subtypes(&self, base: &str) -> Vec<Arc<str>> {
        self.order
            .iter()
            .filter(|name| &***name != base)
            .filter(|name| self.types.get(*name).is_some_and(|meta| !meta.is_abstract))
            .filter(|name| self.is_assignable(base, name))
            .cloned()
            .collect()
    }
}

fn substitute(ty: &TypeDescriptor, bindings: &FxHashMap<&str, TypeDescriptor>) -> TypeDescriptor {
    let replaced = match ty.kind() {
        TypeKind::Named { name, params } if params.is_empty() => match bindings.get(&**name) {
            Some(bound) => bound.clone(),
            None => return ty.clone(),
        },
        TypeKind::Named { name, params } => TypeDescriptor::generic(
            name.clone(),
            params.iter().map(|p| substitute(p, bindings)).collect(),
        ),
        TypeKind::Map { key, value } => {
            TypeDescriptor::map(substitute(key, bindings), substitute(value, bindings))
        }
        TypeKind::Array(_) | TypeKind::List(_) | TypeKind::Set(_) => {
            let Some(content) = ty.content_type() else {
                return ty.clone();
            };
            return ty.with_content_type(substitute(content, bindings));
        }
        _ => return ty.clone(),
    };

    let mut replaced = replaced;
    if let Some(handler) = ty.value_handler() {
        replaced = replaced.with_value_handler(handler.clone());
    }
    if let Some(config) = ty.type_handler() {
        replaced = replaced.with_type_handler(config.clone());
    }
    replaced
}
