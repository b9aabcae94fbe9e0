use super::{CreatorDescriptor, CreatorSet, PropertyDescriptor};
use crate::errors::{BindError, Result};
use crate::types::TypeDescriptor;
use indexmap::IndexMap;
use rustc_hash::FxHashSet;

/// Mutable scratch space for one bean type under construction
#[derive(Debug)]
pub struct BinderBuilder<B> {
    ty: TypeDescriptor,
    properties: IndexMap<String, PropertyDescriptor<B>>,
    back_references: Vec<PropertyDescriptor<B>>,
    injectables: Vec<PropertyDescriptor<B>>,
    creators: CreatorSet,
    catch_all: Option<B>,
    ignorable: FxHashSet<String>,
    ignore_unknown: bool,
}

/// Frozen output of [`BinderBuilder::build`]
#[derive(Debug)]
pub struct BuiltBean<B> {
    pub ty: TypeDescriptor,
    /// Indexed properties in declaration order
    pub properties: Vec<PropertyDescriptor<B>>,
    pub back_references: Vec<PropertyDescriptor<B>>,
    pub injectables: Vec<PropertyDescriptor<B>>,
    pub creators: CreatorSet,
    pub catch_all: Option<B>,
    pub ignorable: FxHashSet<String>,
    pub ignore_unknown: bool,
}

impl<B: Clone> BinderBuilder<B> {
    pub fn new(ty: TypeDescriptor) -> Self {
        Self {
            ty,
            properties: IndexMap::new(),
            back_references: Vec::new(),
            injectables: Vec::new(),
            creators: CreatorSet::new(),
            catch_all: None,
            ignorable: FxHashSet::default(),
            ignore_unknown: false,
        }
    }

    pub fn ty(&self) -> &TypeDescriptor {
        &self.ty
    }

    /// Add a property; a second property with the same name is an error
    pub fn add_property(&mut self, property: PropertyDescriptor<B>) -> Result<()> {
        if self.has_property(property.name()) {
            return Err(self.duplicate(property.name()));
        }
        self.properties.insert(property.name().to_string(), property);
        Ok(())
    }

    /// Replace a property of the same name, returning the previous one
    pub fn replace_property(
        &mut self,
        property: PropertyDescriptor<B>,
    ) -> Option<PropertyDescriptor<B>> {
        self.properties
            .insert(property.name().to_string(), property)
    }

    pub fn remove_property(&mut self, name: &str) -> Option<PropertyDescriptor<B>> {
        self.properties.shift_remove(name)
    }

    /// Add the reciprocal end of a managed reference
    pub fn add_reference_property(&mut self, property: PropertyDescriptor<B>) -> Result<()> {
        if self.has_property(property.name()) {
            return Err(self.duplicate(property.name()));
        }
        self.back_references.push(property);
        Ok(())
    }

    /// Add a property filled from injected values
    pub fn add_injectable(&mut self, property: PropertyDescriptor<B>) -> Result<()> {
        if self.has_property(property.name()) {
            return Err(self.duplicate(property.name()));
        }
        self.injectables.push(property);
        Ok(())
    }

    pub fn add_creator(&mut self, creator: CreatorDescriptor) -> Result<()> {
        self.creators.add(&self.ty, creator)
    }

    pub fn has_creators(&self) -> bool {
        !self.creators.is_empty()
    }

    pub fn set_catch_all(&mut self, binding: B) {
        self.catch_all = Some(binding);
    }

    pub fn add_ignorable(&mut self, name: impl Into<String>) {
        self.ignorable.insert(name.into());
    }

    pub fn set_ignore_unknown(&mut self) {
        self.ignore_unknown = true;
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
            || self.back_references.iter().any(|p| p.name() == name)
            || self.injectables.iter().any(|p| p.name() == name)
    }

    /// Assign stable indices and freeze.
    ///
    /// Regular properties come first in declaration order, then injectables,
    /// then back references. A descriptor that already carries an index keeps it.
    pub fn build(self) -> Result<BuiltBean<B>> {
        let mut next = 0usize;
        let mut taken = FxHashSet::default();
        let mut assign = |property: PropertyDescriptor<B>| -> Result<PropertyDescriptor<B>> {
            let property = match property.index() {
                Some(_) => property,
                None => {
                    while taken.contains(&next) {
                        next += 1;
                    }
                    property.with_index(next)
                }
            };
            let index = property.index().unwrap_or_default();
            if !taken.insert(index) {
                return Err(BindError::definition(
                    property.ty(),
                    format!("property index {} assigned twice", index),
                ));
            }
            Ok(property)
        };

        let properties = self
            .properties
            .into_values()
            .map(&mut assign)
            .collect::<Result<Vec<_>>>()?;
        let injectables = self
            .injectables
            .into_iter()
            .map(&mut assign)
            .collect::<Result<Vec<_>>>()?;
        let back_references = self
            .back_references
            .into_iter()
            .map(&mut assign)
            .collect::<Result<Vec<_>>>()?;

        Ok(BuiltBean {
            ty: self.ty,
            properties,
            back_references,
            injectables,
            creators: self.creators,
            catch_all: self.catch_all,
            ignorable: self.ignorable,
            ignore_unknown: self.ignore_unknown,
        })
    }

    fn duplicate(&self, name: &str) -> BindError {
        BindError::definition(&self.ty, format!("duplicate property `{}`", name))
    }
}
