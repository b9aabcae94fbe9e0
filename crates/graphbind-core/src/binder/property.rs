use super::BinderId;
use crate::errors::{BindError, Result};
use crate::introspect::{Accessor, Inclusion, NameTransform, NullPolicy, PropertyMeta, ReferenceRole};
use crate::types::TypeDescriptor;
use crate::value::{Instance, Value};
use rustc_hash::FxHashMap;

/// Back-reference target linked to a forward property at resolution time
#[derive(Debug, Clone)]
pub struct ManagedLink {
    /// Name of the back-reference property on the target type
    pub back_property: String,
    pub accessor: Accessor,
}

/// One logical property of a binder.
///
/// Descriptors are copy-on-modify: attaching a binding, an index or a
/// managed link returns a new descriptor and leaves the original untouched.
#[derive(Debug, Clone)]
pub struct PropertyDescriptor<B> {
    name: String,
    ty: TypeDescriptor,
    index: Option<usize>,
    accessor: Accessor,
    aliases: Vec<String>,
    role: ReferenceRole,
    injection_id: Option<String>,
    null_policy: NullPolicy,
    include: Inclusion,
    unwrap: Option<NameTransform>,
    binding: Option<B>,
    reference_target: Option<BinderId>,
    managed: Option<ManagedLink>,
}

impl<B: Clone> PropertyDescriptor<B> {
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        let name = name.into();
        Self {
            accessor: Accessor::Field(name.clone()),
            name,
            ty,
            index: None,
            aliases: Vec::new(),
            role: ReferenceRole::Plain,
            injection_id: None,
            null_policy: NullPolicy::Set,
            include: Inclusion::Default,
            unwrap: None,
            binding: None,
            reference_target: None,
            managed: None,
        }
    }

    pub fn from_meta(meta: &PropertyMeta) -> Self {
        Self {
            name: meta.name.clone(),
            ty: meta.ty.clone(),
            index: None,
            accessor: meta.accessor.clone(),
            aliases: meta.aliases.clone(),
            role: meta.role.clone(),
            injection_id: meta.injection_id.clone(),
            null_policy: meta.null_policy,
            include: meta.include.clone(),
            unwrap: meta.unwrap.clone(),
            binding: None,
            reference_target: None,
            managed: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &TypeDescriptor {
        &self.ty
    }

    /// Stable position assigned by the builder
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn accessor(&self) -> &Accessor {
        &self.accessor
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn role(&self) -> &ReferenceRole {
        &self.role
    }

    pub fn injection_id(&self) -> Option<&str> {
        self.injection_id.as_deref()
    }

    pub fn null_policy(&self) -> NullPolicy {
        self.null_policy
    }

    pub fn include(&self) -> &Inclusion {
        &self.include
    }

    pub fn unwrap(&self) -> Option<&NameTransform> {
        self.unwrap.as_ref()
    }

    pub fn binding(&self) -> Result<&B> {
        self.binding.as_ref().ok_or_else(|| {
            BindError::definition(&self.ty, format!("property `{}` has no binder", self.name))
        })
    }

    pub fn has_binding(&self) -> bool {
        self.binding.is_some()
    }

    pub fn reference_target(&self) -> Option<BinderId> {
        self.reference_target
    }

    pub fn managed(&self) -> Option<&ManagedLink> {
        self.managed.as_ref()
    }

    pub fn with_binding(&self, binding: B) -> Self {
        let mut copy = self.clone();
        copy.binding = Some(binding);
        copy
    }

    pub(crate) fn with_index(&self, index: usize) -> Self {
        let mut copy = self.clone();
        copy.index = Some(index);
        copy
    }

    pub fn with_reference_target(&self, target: BinderId) -> Self {
        let mut copy = self.clone();
        copy.reference_target = Some(target);
        copy
    }

    pub fn with_managed(&self, link: ManagedLink) -> Self {
        let mut copy = self.clone();
        copy.managed = Some(link);
        copy
    }

    pub fn with_name(&self, name: impl Into<String>) -> Self {
        let mut copy = self.clone();
        copy.name = name.into();
        copy
    }

    pub fn get_value(&self, instance: &Instance) -> Value {
        self.accessor.get(instance)
    }

    pub fn set_value(&self, instance: &mut Instance, value: Value) -> Result<()> {
        self.accessor
            .set(instance, value)
            .map_err(|e| BindError::from_user(instance.type_name(), e))
    }
}

/// Name lookup over a binder's properties, including aliases
#[derive(Debug, Clone)]
pub struct PropertyMap<B> {
    entries: Vec<PropertyDescriptor<B>>,
    lookup: FxHashMap<String, usize>,
}

impl<B: Clone> PropertyMap<B> {
    pub fn new(entries: Vec<PropertyDescriptor<B>>) -> Result<Self> {
        let mut lookup = FxHashMap::default();
        for (position, entry) in entries.iter().enumerate() {
            for name in std::iter::once(entry.name()).chain(entry.aliases().iter().map(String::as_str)) {
                if lookup.insert(name.to_string(), position).is_some() {
                    return Err(BindError::definition(
                        entry.ty(),
                        format!("name `{}` is claimed by more than one property", name),
                    ));
                }
            }
        }
        Ok(Self { entries, lookup })
    }

    pub fn get(&self, name: &str) -> Option<&PropertyDescriptor<B>> {
        self.lookup.get(name).map(|&position| &self.entries[position])
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.lookup.get(name).copied()
    }

    pub fn at(&self, position: usize) -> Option<&PropertyDescriptor<B>> {
        self.entries.get(position)
    }

    /// Swap in a modified copy of the descriptor at `position`
    pub(crate) fn replace(&mut self, position: usize, descriptor: PropertyDescriptor<B>) {
        if let Some(slot) = self.entries.get_mut(position) {
            *slot = descriptor;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyDescriptor<B>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Declared names, sorted, for diagnostics
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.iter().map(|e| e.name.clone()).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Plain = PropertyDescriptor<()>;

    #[test]
    fn test_copy_on_modify_leaves_original() {
        let original = Plain::new("name", TypeDescriptor::string());
        let bound = original.with_binding(()).with_index(3);

        assert!(!original.has_binding());
        assert_eq!(original.index(), None);
        assert!(bound.has_binding());
        assert_eq!(bound.index(), Some(3));
    }

    #[test]
    fn test_map_resolves_aliases() {
        let meta = PropertyMeta::new("name", TypeDescriptor::string()).alias("label");
        let map = PropertyMap::new(vec![Plain::from_meta(&meta)]).unwrap();

        assert_eq!(map.get("label").map(|p| p.name()), Some("name"));
        assert_eq!(map.position("name"), Some(0));
        assert!(map.get("title").is_none());
    }

    #[test]
    fn test_alias_collision_is_rejected() {
        let a = PropertyMeta::new("a", TypeDescriptor::int()).alias("b");
        let b = PropertyMeta::new("b", TypeDescriptor::int());
        let result = PropertyMap::new(vec![Plain::from_meta(&a), Plain::from_meta(&b)]);
        assert!(matches!(result, Err(BindError::InvalidDefinition { .. })));
    }

    #[test]
    fn test_missing_binding_is_definition_error() {
        let property = Plain::new("x", TypeDescriptor::int());
        assert!(property.binding().is_err());
    }
}
