use crate::binder::{CustomReader, CustomWriter};
use crate::types::TypeDescriptor;
use crate::value::{Instance, ObjectGraph, Value};
use std::fmt;
use std::sync::Arc;

/// Getter closure of a method accessor
pub type Getter = Arc<dyn Fn(&Instance) -> Value + Send + Sync>;

/// Setter closure of a method accessor
pub type Setter = Arc<dyn Fn(&mut Instance, Value) -> anyhow::Result<()> + Send + Sync>;

/// Constructor or factory function
pub type CreatorFn = Arc<dyn Fn(CreatorArgs<'_>) -> anyhow::Result<Instance> + Send + Sync>;

/// How a property value is fetched from and stored into an instance
#[derive(Clone)]
pub enum Accessor {
    /// Direct field slot
    Field(String),
    Method {
        getter: Getter,
        setter: Option<Setter>,
    },
}

impl Accessor {
    pub fn get(&self, instance: &Instance) -> Value {
        match self {
            Accessor::Field(slot) => instance.get(slot).cloned().unwrap_or(Value::Null),
            Accessor::Method { getter, .. } => getter(instance),
        }
    }

    pub fn set(&self, instance: &mut Instance, value: Value) -> anyhow::Result<()> {
        match self {
            Accessor::Field(slot) => {
                instance.set(slot.clone(), value);
                Ok(())
            }
            Accessor::Method {
                setter: Some(setter),
                ..
            } => setter(instance, value),
            Accessor::Method { setter: None, .. } => {
                anyhow::bail!("property of `{}` has no setter", instance.type_name())
            }
        }
    }

    pub fn can_set(&self) -> bool {
        !matches!(self, Accessor::Method { setter: None, .. })
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Accessor::Field(slot) => write!(f, "Field({})", slot),
            Accessor::Method { setter, .. } => {
                write!(f, "Method(setter: {})", setter.is_some())
            }
        }
    }
}

/// Role of a property in a bidirectional edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceRole {
    Plain,
    /// Owning side, read and written normally
    Forward(String),
    /// Reciprocal side, set by the engine and never written
    Back(String),
}

/// What happens when a property reads a null token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullPolicy {
    #[default]
    Set,
    Skip,
    Fail,
    /// Substitute the empty value of the declared type
    AsEmpty,
}

/// When a property is written
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Inclusion {
    /// Follow the mapper's default inclusion
    #[default]
    Default,
    Always,
    NonNull,
    NonEmpty,
    /// Skip null and values equal to the sentinel
    NonDefault(Value),
}

/// Prefix and suffix applied to the field names of an unwrapped child
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameTransform {
    pub prefix: String,
    pub suffix: String,
}

impl NameTransform {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    pub fn apply(&self, name: &str) -> String {
        format!("{}{}{}", self.prefix, name, self.suffix)
    }

    /// Inverse of [`NameTransform::apply`], `None` if the name does not match
    pub fn strip<'a>(&self, name: &'a str) -> Option<&'a str> {
        name.strip_prefix(self.prefix.as_str())?
            .strip_suffix(self.suffix.as_str())
    }
}

/// Where a polymorphic type id is carried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeIdInclusion {
    /// A field inside the value's own object
    Property,
    /// `{"tag": value}`
    WrapperObject,
    /// `["tag", value]`
    WrapperArray,
    /// A sibling field of the owning property
    ExternalProperty,
}

/// Polymorphic handling for a base type or a single use site
#[derive(Debug, Clone)]
pub struct PolymorphicConfig {
    pub inclusion: TypeIdInclusion,
    /// Name of the type id field
    pub property: String,
    /// Explicit tag table; discovered subtypes are tagged by type name when empty
    pub subtypes: Vec<(String, TypeDescriptor)>,
    pub default_impl: Option<TypeDescriptor>,
    /// Pass the type id field on to the concrete binder
    pub visible: bool,
}

impl PolymorphicConfig {
    pub fn new(inclusion: TypeIdInclusion, property: impl Into<String>) -> Self {
        Self {
            inclusion,
            property: property.into(),
            subtypes: Vec::new(),
            default_impl: None,
            visible: false,
        }
    }

    /// Embedded `"type"` field
    pub fn property(name: impl Into<String>) -> Self {
        Self::new(TypeIdInclusion::Property, name)
    }

    pub fn subtype(mut self, tag: impl Into<String>, ty: TypeDescriptor) -> Self {
        self.subtypes.push((tag.into(), ty));
        self
    }

    pub fn default_impl(mut self, ty: TypeDescriptor) -> Self {
        self.default_impl = Some(ty);
        self
    }

    pub fn visible(mut self) -> Self {
        self.visible = true;
        self
    }
}

/// Metadata for one logical property
#[derive(Debug, Clone)]
pub struct PropertyMeta {
    pub name: String,
    pub ty: TypeDescriptor,
    pub accessor: Accessor,
    /// Alternate names accepted on read
    pub aliases: Vec<String>,
    pub role: ReferenceRole,
    /// Filled from caller-supplied values, never from the stream
    pub injection_id: Option<String>,
    pub unwrap: Option<NameTransform>,
    pub null_policy: NullPolicy,
    pub include: Inclusion,
    /// Use-site polymorphism, applied to the element type of containers
    pub type_info: Option<Arc<PolymorphicConfig>>,
    pub ignored: bool,
    pub serialize: bool,
    pub deserialize: bool,
}

impl PropertyMeta {
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        let name = name.into();
        Self {
            accessor: Accessor::Field(name.clone()),
            name,
            ty,
            aliases: Vec::new(),
            role: ReferenceRole::Plain,
            injection_id: None,
            unwrap: None,
            null_policy: NullPolicy::Set,
            include: Inclusion::Default,
            type_info: None,
            ignored: false,
            serialize: true,
            deserialize: true,
        }
    }

    /// Store the value in a differently named field slot
    pub fn slot(mut self, slot: impl Into<String>) -> Self {
        self.accessor = Accessor::Field(slot.into());
        self
    }

    pub fn accessor(mut self, accessor: Accessor) -> Self {
        self.accessor = accessor;
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn forward(mut self, reference: impl Into<String>) -> Self {
        self.role = ReferenceRole::Forward(reference.into());
        self
    }

    pub fn back(mut self, reference: impl Into<String>) -> Self {
        self.role = ReferenceRole::Back(reference.into());
        self
    }

    pub fn inject(mut self, id: impl Into<String>) -> Self {
        self.injection_id = Some(id.into());
        self
    }

    pub fn unwrapped(mut self, transform: NameTransform) -> Self {
        self.unwrap = Some(transform);
        self
    }

    pub fn null_policy(mut self, policy: NullPolicy) -> Self {
        self.null_policy = policy;
        self
    }

    pub fn include(mut self, include: Inclusion) -> Self {
        self.include = include;
        self
    }

    pub fn type_info(mut self, config: PolymorphicConfig) -> Self {
        self.type_info = Some(Arc::new(config));
        self
    }

    pub fn ignored(mut self) -> Self {
        self.ignored = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.deserialize = false;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.serialize = false;
        self
    }
}

/// A creator parameter
#[derive(Debug, Clone)]
pub struct CreatorParam {
    pub name: Option<String>,
    pub ty: TypeDescriptor,
    pub injection_id: Option<String>,
}

impl CreatorParam {
    pub fn named(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: Some(name.into()),
            ty,
            injection_id: None,
        }
    }

    pub fn unnamed(ty: TypeDescriptor) -> Self {
        Self {
            name: None,
            ty,
            injection_id: None,
        }
    }

    pub fn injected(id: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: None,
            ty,
            injection_id: Some(id.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatorMode {
    /// Shape decided by the factory heuristics
    Auto,
    Delegating,
    Properties,
}

/// Arguments handed to a creator
pub struct CreatorArgs<'a> {
    values: Vec<Value>,
    graph: &'a ObjectGraph,
}

impl<'a> CreatorArgs<'a> {
    pub fn new(values: Vec<Value>, graph: &'a ObjectGraph) -> Self {
        Self { values, graph }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> &Value {
        static NULL: Value = Value::Null;
        self.values.get(index).unwrap_or(&NULL)
    }

    /// Move an argument out, leaving null behind
    pub fn take(&mut self, index: usize) -> Value {
        self.values
            .get_mut(index)
            .map(std::mem::take)
            .unwrap_or(Value::Null)
    }

    /// Graph owning any instances referenced by the arguments
    pub fn graph(&self) -> &'a ObjectGraph {
        self.graph
    }
}

/// A constructor or factory function the factory may adopt
#[derive(Clone)]
pub struct CreatorCandidate {
    pub params: Vec<CreatorParam>,
    pub mode: CreatorMode,
    /// Explicitly marked as a creator
    pub explicit: bool,
    /// Visible to auto-detection
    pub visible: bool,
    pub func: CreatorFn,
}

impl CreatorCandidate {
    pub fn new(
        params: Vec<CreatorParam>,
        func: impl Fn(CreatorArgs<'_>) -> anyhow::Result<Instance> + Send + Sync + 'static,
    ) -> Self {
        Self {
            params,
            mode: CreatorMode::Auto,
            explicit: false,
            visible: true,
            func: Arc::new(func),
        }
    }

    /// Zero-argument constructor
    pub fn default_ctor(
        func: impl Fn(CreatorArgs<'_>) -> anyhow::Result<Instance> + Send + Sync + 'static,
    ) -> Self {
        Self::new(Vec::new(), func)
    }

    /// Explicit property-based creator
    pub fn properties(
        params: Vec<CreatorParam>,
        func: impl Fn(CreatorArgs<'_>) -> anyhow::Result<Instance> + Send + Sync + 'static,
    ) -> Self {
        let mut candidate = Self::new(params, func);
        candidate.mode = CreatorMode::Properties;
        candidate.explicit = true;
        candidate
    }

    /// Explicit delegating creator over a single value
    pub fn delegating(
        ty: TypeDescriptor,
        func: impl Fn(CreatorArgs<'_>) -> anyhow::Result<Instance> + Send + Sync + 'static,
    ) -> Self {
        let mut candidate = Self::new(vec![CreatorParam::unnamed(ty)], func);
        candidate.mode = CreatorMode::Delegating;
        candidate.explicit = true;
        candidate
    }

    pub fn explicit(mut self) -> Self {
        self.explicit = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

impl fmt::Debug for CreatorCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreatorCandidate")
            .field("params", &self.params)
            .field("mode", &self.mode)
            .field("explicit", &self.explicit)
            .field("visible", &self.visible)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeShape {
    Bean,
    Enum(Vec<String>),
}

/// Everything the engine needs to know about a nominal type
#[derive(Clone)]
pub struct TypeMeta {
    pub name: Arc<str>,
    pub shape: TypeShape,
    /// Names of generic parameters, substituted on describe
    pub type_params: Vec<String>,
    pub is_abstract: bool,
    pub supertypes: Vec<Arc<str>>,
    pub properties: Vec<PropertyMeta>,
    pub creators: Vec<CreatorCandidate>,
    /// Value type of the catch-all bag
    pub catch_all: Option<TypeDescriptor>,
    pub ignorable: Vec<String>,
    pub ignore_unknown: bool,
    pub polymorphic: Option<Arc<PolymorphicConfig>>,
    pub reader_override: Option<Arc<dyn CustomReader>>,
    pub writer_override: Option<Arc<dyn CustomWriter>>,
}

impl TypeMeta {
    pub fn bean(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            shape: TypeShape::Bean,
            type_params: Vec::new(),
            is_abstract: false,
            supertypes: Vec::new(),
            properties: Vec::new(),
            creators: Vec::new(),
            catch_all: None,
            ignorable: Vec::new(),
            ignore_unknown: false,
            polymorphic: None,
            reader_override: None,
            writer_override: None,
        }
    }

    pub fn enumeration<I, S>(name: impl Into<Arc<str>>, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut meta = Self::bean(name);
        meta.shape = TypeShape::Enum(variants.into_iter().map(Into::into).collect());
        meta
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn type_param(mut self, name: impl Into<String>) -> Self {
        self.type_params.push(name.into());
        self
    }

    pub fn extends(mut self, supertype: impl Into<Arc<str>>) -> Self {
        self.supertypes.push(supertype.into());
        self
    }

    pub fn property(mut self, property: PropertyMeta) -> Self {
        self.properties.push(property);
        self
    }

    pub fn creator(mut self, creator: CreatorCandidate) -> Self {
        self.creators.push(creator);
        self
    }

    pub fn catch_all(mut self, value_type: TypeDescriptor) -> Self {
        self.catch_all = Some(value_type);
        self
    }

    pub fn ignorable(mut self, name: impl Into<String>) -> Self {
        self.ignorable.push(name.into());
        self
    }

    pub fn ignore_unknown(mut self) -> Self {
        self.ignore_unknown = true;
        self
    }

    pub fn polymorphic(mut self, config: PolymorphicConfig) -> Self {
        self.polymorphic = Some(Arc::new(config));
        self
    }

    pub fn reader(mut self, reader: Arc<dyn CustomReader>) -> Self {
        self.reader_override = Some(reader);
        self
    }

    pub fn writer(mut self, writer: Arc<dyn CustomWriter>) -> Self {
        self.writer_override = Some(writer);
        self
    }

    pub fn find_property(&self, name: &str) -> Option<&PropertyMeta> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn variants(&self) -> Option<&[String]> {
        match &self.shape {
            TypeShape::Enum(variants) => Some(variants),
            TypeShape::Bean => None,
        }
    }
}

impl fmt::Debug for TypeMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeMeta")
            .field("name", &self.name)
            .field("shape", &self.shape)
            .field("is_abstract", &self.is_abstract)
            .field("supertypes", &self.supertypes)
            .field("properties", &self.properties)
            .field("creators", &self.creators.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_transform_round_trip() {
        let transform = NameTransform::new("home_", "");
        assert_eq!(transform.apply("city"), "home_city");
        assert_eq!(transform.strip("home_city"), Some("city"));
        assert_eq!(transform.strip("work_city"), None);
    }

    #[test]
    fn test_field_accessor() {
        let accessor = Accessor::Field("n".into());
        let mut instance = Instance::new("T");
        accessor.set(&mut instance, Value::Int(3)).unwrap();
        assert_eq!(accessor.get(&instance), Value::Int(3));
        assert_eq!(Accessor::Field("missing".into()).get(&instance), Value::Null);
    }

    #[test]
    fn test_method_accessor_without_setter_fails() {
        let getter: Getter = Arc::new(|_| Value::Int(1));
        let accessor = Accessor::Method {
            getter,
            setter: None,
        };
        let mut instance = Instance::new("T");
        assert!(!accessor.can_set());
        assert!(accessor.set(&mut instance, Value::Null).is_err());
    }

    #[test]
    fn test_creator_args_take() {
        let graph = ObjectGraph::new();
        let mut args = CreatorArgs::new(vec![Value::Int(1)], &graph);
        assert_eq!(args.take(0), Value::Int(1));
        assert_eq!(args.get(0), &Value::Null);
        assert_eq!(args.get(5), &Value::Null);
    }
}
