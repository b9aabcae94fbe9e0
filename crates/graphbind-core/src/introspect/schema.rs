//! Declarative type definitions loaded from YAML or JSON.
//!
//! A schema describes data-only types: every bean stores its properties in
//! named field slots, and creators declared here assemble an [`Instance`]
//! from their arguments.

use super::{
    CreatorArgs, CreatorCandidate, CreatorParam, Inclusion, NameTransform, NullPolicy,
    PolymorphicConfig, PropertyMeta, TypeIdInclusion, TypeMeta, TypeRegistry,
};
use crate::errors::{BindError, Result};
use crate::types::TypeDescriptor;
use crate::value::{Instance, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaFile {
    #[serde(default)]
    pub types: Vec<TypeSchema>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeSchema {
    pub name: String,

    #[serde(default)]
    pub type_params: Vec<String>,

    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,

    #[serde(default)]
    pub extends: Vec<String>,

    /// Variant names; the type is an enumeration when present
    #[serde(default, rename = "enum")]
    pub variants: Option<Vec<String>>,

    #[serde(default)]
    pub properties: Vec<PropertySchema>,

    /// Value type of the catch-all bag
    #[serde(default)]
    pub catch_all: Option<String>,

    #[serde(default)]
    pub ignorable: Vec<String>,

    #[serde(default)]
    pub ignore_unknown: bool,

    #[serde(default)]
    pub polymorphic: Option<PolymorphicSchema>,

    #[serde(default)]
    pub creator: Option<CreatorSchema>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NullPolicySchema {
    #[default]
    Set,
    Skip,
    Fail,
    AsEmpty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IncludeSchema {
    Always,
    NonNull,
    NonEmpty,
    NonDefault,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnwrapSchema {
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySchema {
    pub name: String,

    #[serde(rename = "type")]
    pub ty: String,

    /// Field slot, defaults to the property name
    #[serde(default)]
    pub slot: Option<String>,

    #[serde(default)]
    pub aliases: Vec<String>,

    #[serde(default)]
    pub forward: Option<String>,

    #[serde(default)]
    pub back: Option<String>,

    #[serde(default)]
    pub inject: Option<String>,

    #[serde(default)]
    pub unwrap: Option<UnwrapSchema>,

    #[serde(default)]
    pub null_policy: NullPolicySchema,

    #[serde(default)]
    pub include: Option<IncludeSchema>,

    /// Sentinel for `include: nonDefault`
    #[serde(default)]
    pub default_value: Option<serde_json::Value>,

    #[serde(default)]
    pub type_info: Option<PolymorphicSchema>,

    #[serde(default)]
    pub ignored: bool,

    #[serde(default)]
    pub read_only: bool,

    #[serde(default)]
    pub write_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InclusionSchema {
    #[default]
    Property,
    WrapperObject,
    WrapperArray,
    ExternalProperty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolymorphicSchema {
    #[serde(default)]
    pub inclusion: InclusionSchema,

    #[serde(default = "default_type_property")]
    pub property: String,

    /// Tag to type expression; discovered from `extends` when empty
    #[serde(default)]
    pub subtypes: IndexMap<String, String>,

    #[serde(default)]
    pub default_impl: Option<String>,

    #[serde(default)]
    pub visible: bool,
}

fn default_type_property() -> String {
    "type".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegatingSchema {
    #[serde(rename = "type")]
    pub ty: String,
    /// Field slot receiving the delegate value
    pub field: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorSchema {
    /// Property names bound as creator arguments, in order
    #[serde(default)]
    pub properties: Option<Vec<String>>,

    #[serde(default)]
    pub delegating: Option<DelegatingSchema>,

    /// Field slot receiving a bare string token
    #[serde(default)]
    pub from_string: Option<String>,

    /// Field slot receiving a bare integer token
    #[serde(default)]
    pub from_int: Option<String>,

    /// Keep a zero-argument constructor next to the declared creators
    #[serde(default)]
    pub default_constructor: bool,
}

impl SchemaFile {
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a schema, choosing the format by extension
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }

    pub fn register_into(&self, registry: &mut TypeRegistry) -> Result<()> {
        for ty in &self.types {
            registry.register(ty.to_meta()?)?;
        }
        Ok(())
    }

    pub fn into_registry(self) -> Result<TypeRegistry> {
        let mut registry = TypeRegistry::new();
        self.register_into(&mut registry)?;
        Ok(registry)
    }
}

impl TypeSchema {
    pub fn to_meta(&self) -> Result<TypeMeta> {
        let mut meta = match &self.variants {
            Some(variants) => TypeMeta::enumeration(self.name.as_str(), variants.iter().cloned()),
            None => TypeMeta::bean(self.name.as_str()),
        };
        meta.is_abstract = self.is_abstract;
        meta.type_params = self.type_params.clone();
        meta.supertypes = self.extends.iter().map(|s| Arc::from(s.as_str())).collect();
        meta.ignorable = self.ignorable.clone();
        meta.ignore_unknown = self.ignore_unknown;

        for property in &self.properties {
            meta.properties.push(property.to_meta()?);
        }
        if let Some(catch_all) = &self.catch_all {
            meta.catch_all = Some(TypeDescriptor::parse(catch_all)?);
        }
        if let Some(polymorphic) = &self.polymorphic {
            meta.polymorphic = Some(Arc::new(polymorphic.to_config()?));
        }
        if let Some(creator) = &self.creator {
            meta.creators = creator.to_candidates(&self.name, &meta.properties)?;
        }
        Ok(meta)
    }
}

impl PropertySchema {
    pub fn to_meta(&self) -> Result<PropertyMeta> {
        let mut meta = PropertyMeta::new(self.name.as_str(), TypeDescriptor::parse(&self.ty)?);
        if let Some(slot) = &self.slot {
            meta = meta.slot(slot.as_str());
        }
        meta.aliases = self.aliases.clone();
        match (&self.forward, &self.back) {
            (Some(_), Some(_)) => {
                return Err(BindError::definition(
                    &self.name,
                    "property cannot be both a forward and a back reference",
                ))
            }
            (Some(forward), None) => meta = meta.forward(forward.as_str()),
            (None, Some(back)) => meta = meta.back(back.as_str()),
            (None, None) => {}
        }
        meta.injection_id = self.inject.clone();
        meta.unwrap = self
            .unwrap
            .as_ref()
            .map(|u| NameTransform::new(u.prefix.as_str(), u.suffix.as_str()));
        meta.null_policy = match self.null_policy {
            NullPolicySchema::Set => NullPolicy::Set,
            NullPolicySchema::Skip => NullPolicy::Skip,
            NullPolicySchema::Fail => NullPolicy::Fail,
            NullPolicySchema::AsEmpty => NullPolicy::AsEmpty,
        };
        meta.include = match self.include {
            None => Inclusion::Default,
            Some(IncludeSchema::Always) => Inclusion::Always,
            Some(IncludeSchema::NonNull) => Inclusion::NonNull,
            Some(IncludeSchema::NonEmpty) => Inclusion::NonEmpty,
            Some(IncludeSchema::NonDefault) => Inclusion::NonDefault(
                self.default_value
                    .as_ref()
                    .map(json_to_value)
                    .unwrap_or(Value::Null),
            ),
        };
        if let Some(type_info) = &self.type_info {
            meta.type_info = Some(Arc::new(type_info.to_config()?));
        }
        meta.ignored = self.ignored;
        meta.deserialize = !self.read_only;
        meta.serialize = !self.write_only;
        Ok(meta)
    }
}

impl PolymorphicSchema {
    pub fn to_config(&self) -> Result<PolymorphicConfig> {
        let inclusion = match self.inclusion {
            InclusionSchema::Property => TypeIdInclusion::Property,
            InclusionSchema::WrapperObject => TypeIdInclusion::WrapperObject,
            InclusionSchema::WrapperArray => TypeIdInclusion::WrapperArray,
            InclusionSchema::ExternalProperty => TypeIdInclusion::ExternalProperty,
        };
        let mut config = PolymorphicConfig::new(inclusion, self.property.as_str());
        for (tag, ty) in &self.subtypes {
            config.subtypes.push((tag.clone(), TypeDescriptor::parse(ty)?));
        }
        if let Some(default_impl) = &self.default_impl {
            config.default_impl = Some(TypeDescriptor::parse(default_impl)?);
        }
        config.visible = self.visible;
        Ok(config)
    }
}

impl CreatorSchema {
    fn to_candidates(
        &self,
        type_name: &str,
        properties: &[PropertyMeta],
    ) -> Result<Vec<CreatorCandidate>> {
        let type_name: Arc<str> = Arc::from(type_name);
        let mut candidates = Vec::new();

        if let Some(names) = &self.properties {
            let mut params = Vec::with_capacity(names.len());
            let mut slots = Vec::with_capacity(names.len());
            for name in names {
                let property = properties.iter().find(|p| &p.name == name).ok_or_else(|| {
                    BindError::definition(
                        &type_name,
                        format!("creator argument `{}` has no matching property", name),
                    )
                })?;
                params.push(match &property.injection_id {
                    Some(id) => CreatorParam::injected(id.as_str(), property.ty.clone()),
                    None => CreatorParam::named(name.as_str(), property.ty.clone()),
                });
                slots.push(field_slot(property));
            }
            let ty = type_name.clone();
            candidates.push(CreatorCandidate::properties(params, move |mut args| {
                let mut instance = Instance::new(ty.clone());
                for (i, slot) in slots.iter().enumerate() {
                    instance.set(slot.as_str(), args.take(i));
                }
                Ok(instance)
            }));
        }

        if let Some(delegating) = &self.delegating {
            let ty = type_name.clone();
            let field = delegating.field.clone();
            candidates.push(CreatorCandidate::delegating(
                TypeDescriptor::parse(&delegating.ty)?,
                move |mut args| Ok(Instance::new(ty.clone()).with(field.as_str(), args.take(0))),
            ));
        }

        for (slot, param_ty) in [
            (&self.from_string, TypeDescriptor::string()),
            (&self.from_int, TypeDescriptor::int()),
        ] {
            if let Some(field) = slot {
                let ty = type_name.clone();
                let field = field.clone();
                candidates.push(
                    CreatorCandidate::new(vec![CreatorParam::unnamed(param_ty)], move |mut args| {
                        Ok(Instance::new(ty.clone()).with(field.as_str(), args.take(0)))
                    })
                    .explicit(),
                );
            }
        }

        if self.default_constructor {
            let ty = type_name.clone();
            candidates.push(CreatorCandidate::default_ctor(move |_| {
                Ok(Instance::new(ty.clone()))
            }));
        }
        Ok(candidates)
    }
}

fn field_slot(property: &PropertyMeta) -> String {
    match &property.accessor {
        super::Accessor::Field(slot) => slot.clone(),
        super::Accessor::Method { .. } => property.name.clone(),
    }
}

/// Scalars map to scalar values; arrays and objects stay as trees
fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(v) => match i32::try_from(v) {
                Ok(small) => Value::Int(small),
                Err(_) => Value::Long(v),
            },
            None => Value::Double(n.as_f64().unwrap_or_default()),
        },
        serde_json::Value::String(s) => Value::String(s.clone()),
        other => Value::Tree(other.clone()),
    }
}
