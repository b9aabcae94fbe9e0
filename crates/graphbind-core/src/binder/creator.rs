use super::ValueBinding;
use crate::errors::{BindError, Result};
use crate::introspect::{CreatorArgs, CreatorFn};
use crate::token::TokenKind;
use crate::types::{ScalarKind, TypeDescriptor};
use crate::value::{Instance, ObjectGraph, Value};
use rustc_hash::FxHashMap;
use std::fmt;

/// Shape of an adopted creator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CreatorKind {
    Default,
    Delegating,
    FromString,
    FromInt,
    FromLong,
    FromDouble,
    FromBool,
    Properties,
}

impl CreatorKind {
    /// Scalar creator kind for a single-argument creator of this type
    pub fn for_scalar(ty: &TypeDescriptor) -> Option<CreatorKind> {
        match ty.scalar_kind()? {
            ScalarKind::String => Some(CreatorKind::FromString),
            ScalarKind::Int => Some(CreatorKind::FromInt),
            ScalarKind::Long => Some(CreatorKind::FromLong),
            ScalarKind::Double => Some(CreatorKind::FromDouble),
            ScalarKind::Bool => Some(CreatorKind::FromBool),
            ScalarKind::Char | ScalarKind::Bytes => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreatorParamDescriptor {
    pub name: Option<String>,
    pub ty: TypeDescriptor,
    pub injection_id: Option<String>,
    pub binding: Option<ValueBinding>,
}

/// An adopted constructor or factory function
#[derive(Clone)]
pub struct CreatorDescriptor {
    kind: CreatorKind,
    params: Vec<CreatorParamDescriptor>,
    lookup: FxHashMap<String, usize>,
    func: CreatorFn,
    explicit: bool,
}

impl CreatorDescriptor {
    pub fn new(
        kind: CreatorKind,
        params: Vec<CreatorParamDescriptor>,
        func: CreatorFn,
        explicit: bool,
    ) -> Self {
        let lookup = params
            .iter()
            .enumerate()
            .filter(|(_, p)| p.injection_id.is_none())
            .filter_map(|(i, p)| p.name.clone().map(|name| (name, i)))
            .collect();
        Self {
            kind,
            params,
            lookup,
            func,
            explicit,
        }
    }

    pub fn kind(&self) -> CreatorKind {
        self.kind
    }

    pub fn params(&self) -> &[CreatorParamDescriptor] {
        &self.params
    }

    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    /// Argument position fed by the named stream field
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.lookup.get(name).copied()
    }

    pub fn call(&self, ty: &str, graph: &ObjectGraph, values: Vec<Value>) -> Result<Instance> {
        (self.func)(CreatorArgs::new(values, graph)).map_err(|e| BindError::from_user(ty, e))
    }
}

impl fmt::Debug for CreatorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreatorDescriptor")
            .field("kind", &self.kind)
            .field("params", &self.params)
            .field("explicit", &self.explicit)
            .finish()
    }
}

/// Creator chosen for an object-start token
#[derive(Debug, Clone, Copy)]
pub enum ObjectCreator<'a> {
    Properties(&'a CreatorDescriptor),
    Delegating(&'a CreatorDescriptor),
    Default(&'a CreatorDescriptor),
}

/// At most one creator of each shape
#[derive(Debug, Clone, Default)]
pub struct CreatorSet {
    default: Option<CreatorDescriptor>,
    delegating: Option<CreatorDescriptor>,
    from_string: Option<CreatorDescriptor>,
    from_int: Option<CreatorDescriptor>,
    from_long: Option<CreatorDescriptor>,
    from_double: Option<CreatorDescriptor>,
    from_bool: Option<CreatorDescriptor>,
    property_based: Option<CreatorDescriptor>,
}

impl CreatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a creator. An explicit creator replaces an implicit one of the
    /// same shape; two creators of the same shape and explicitness conflict.
    pub fn add(&mut self, ty: &TypeDescriptor, creator: CreatorDescriptor) -> Result<()> {
        let slot = self.slot_mut(creator.kind);
        match slot.as_ref() {
            Some(existing) if existing.explicit == creator.explicit => {
                Err(BindError::definition(
                    ty,
                    format!("conflicting {:?} creators", creator.kind),
                ))
            }
            Some(existing) if existing.explicit => Ok(()),
            _ => {
                *slot = Some(creator);
                Ok(())
            }
        }
    }

    fn slot_mut(&mut self, kind: CreatorKind) -> &mut Option<CreatorDescriptor> {
        match kind {
            CreatorKind::Default => &mut self.default,
            CreatorKind::Delegating => &mut self.delegating,
            CreatorKind::FromString => &mut self.from_string,
            CreatorKind::FromInt => &mut self.from_int,
            CreatorKind::FromLong => &mut self.from_long,
            CreatorKind::FromDouble => &mut self.from_double,
            CreatorKind::FromBool => &mut self.from_bool,
            CreatorKind::Properties => &mut self.property_based,
        }
    }

    pub fn get(&self, kind: CreatorKind) -> Option<&CreatorDescriptor> {
        match kind {
            CreatorKind::Default => self.default.as_ref(),
            CreatorKind::Delegating => self.delegating.as_ref(),
            CreatorKind::FromString => self.from_string.as_ref(),
            CreatorKind::FromInt => self.from_int.as_ref(),
            CreatorKind::FromLong => self.from_long.as_ref(),
            CreatorKind::FromDouble => self.from_double.as_ref(),
            CreatorKind::FromBool => self.from_bool.as_ref(),
            CreatorKind::Properties => self.property_based.as_ref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.default.is_none()
            && self.delegating.is_none()
            && self.from_string.is_none()
            && self.from_int.is_none()
            && self.from_long.is_none()
            && self.from_double.is_none()
            && self.from_bool.is_none()
            && self.property_based.is_none()
    }

    pub fn delegating(&self) -> Option<&CreatorDescriptor> {
        self.delegating.as_ref()
    }

    pub fn property_based(&self) -> Option<&CreatorDescriptor> {
        self.property_based.as_ref()
    }

    /// Priority: explicit property-based, delegating, implicit property-based, default
    pub fn object_creator(&self) -> Option<ObjectCreator<'_>> {
        match (&self.property_based, &self.delegating) {
            (Some(props), _) if props.explicit => Some(ObjectCreator::Properties(props)),
            (_, Some(delegating)) => Some(ObjectCreator::Delegating(delegating)),
            (Some(props), None) => Some(ObjectCreator::Properties(props)),
            (None, None) => self.default.as_ref().map(ObjectCreator::Default),
        }
    }

    /// Scalar creator accepting the token, widening integers where needed
    pub fn scalar_creator(&self, token: TokenKind) -> Option<&CreatorDescriptor> {
        match token {
            TokenKind::String => self.from_string.as_ref(),
            TokenKind::Int => self
                .from_int
                .as_ref()
                .or(self.from_long.as_ref())
                .or(self.from_double.as_ref()),
            TokenKind::Long => self.from_long.as_ref().or(self.from_double.as_ref()),
            TokenKind::Double => self.from_double.as_ref(),
            TokenKind::Bool => self.from_bool.as_ref(),
            _ => None,
        }
    }
}

/// Positional buffer for property-based creator arguments
#[derive(Debug, Clone)]
pub struct PropertyValueBuffer {
    values: Vec<Option<Value>>,
    missing: usize,
}

impl PropertyValueBuffer {
    pub fn new(creator: &CreatorDescriptor) -> Self {
        Self {
            values: vec![None; creator.params().len()],
            missing: creator.params().len(),
        }
    }

    pub fn set(&mut self, index: usize, value: Value) {
        if let Some(slot) = self.values.get_mut(index) {
            if slot.is_none() {
                self.missing -= 1;
            }
            *slot = Some(value);
        }
    }

    pub fn is_set(&self, index: usize) -> bool {
        matches!(self.values.get(index), Some(Some(_)))
    }

    pub fn is_complete(&self) -> bool {
        self.missing == 0
    }

    /// Names of arguments not yet seen
    pub fn missing_names(&self, creator: &CreatorDescriptor) -> Vec<String> {
        self.values
            .iter()
            .zip(creator.params())
            .filter(|(value, _)| value.is_none())
            .map(|(_, param)| param.name.clone().unwrap_or_else(|| param.ty.to_string()))
            .collect()
    }

    /// Arguments in order, missing ones replaced by the type default
    pub fn into_values(self, creator: &CreatorDescriptor) -> Vec<Value> {
        self.values
            .into_iter()
            .zip(creator.params())
            .map(|(value, param)| value.unwrap_or_else(|| default_value(&param.ty)))
            .collect()
    }
}

/// Value used for an argument that never appeared in the stream
pub fn default_value(ty: &TypeDescriptor) -> Value {
    match ty.scalar_kind() {
        Some(ScalarKind::Bool) => Value::Bool(false),
        Some(ScalarKind::Int) => Value::Int(0),
        Some(ScalarKind::Long) => Value::Long(0),
        Some(ScalarKind::Double) => Value::Double(0.0),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::CreatorCandidate;

    fn creator(kind: CreatorKind, explicit: bool, names: &[&str]) -> CreatorDescriptor {
        let params = names
            .iter()
            .map(|name| CreatorParamDescriptor {
                name: Some(name.to_string()),
                ty: TypeDescriptor::int(),
                injection_id: None,
                binding: None,
            })
            .collect();
        let func = CreatorCandidate::default_ctor(|_| Ok(Instance::new("T"))).func;
        CreatorDescriptor::new(kind, params, func, explicit)
    }

    #[test]
    fn test_explicit_replaces_implicit() {
        let ty = TypeDescriptor::named("T");
        let mut set = CreatorSet::new();
        set.add(&ty, creator(CreatorKind::Properties, false, &["a"])).unwrap();
        set.add(&ty, creator(CreatorKind::Properties, true, &["b"])).unwrap();
        set.add(&ty, creator(CreatorKind::Properties, false, &["c"])).unwrap();

        let chosen = set.property_based().unwrap();
        assert!(chosen.is_explicit());
        assert_eq!(chosen.param_index("b"), Some(0));
    }

    #[test]
    fn test_same_explicitness_conflicts() {
        let ty = TypeDescriptor::named("T");
        let mut set = CreatorSet::new();
        set.add(&ty, creator(CreatorKind::FromString, true, &[])).unwrap();
        assert!(set.add(&ty, creator(CreatorKind::FromString, true, &[])).is_err());
    }

    #[test]
    fn test_object_creator_priority() {
        let ty = TypeDescriptor::named("T");
        let mut set = CreatorSet::new();
        set.add(&ty, creator(CreatorKind::Default, false, &[])).unwrap();
        assert!(matches!(set.object_creator(), Some(ObjectCreator::Default(_))));

        set.add(&ty, creator(CreatorKind::Properties, false, &["a"])).unwrap();
        assert!(matches!(set.object_creator(), Some(ObjectCreator::Properties(_))));

        set.add(&ty, creator(CreatorKind::Delegating, true, &["v"])).unwrap();
        assert!(matches!(set.object_creator(), Some(ObjectCreator::Delegating(_))));

        set.add(&ty, creator(CreatorKind::Properties, true, &["a"])).unwrap();
        assert!(matches!(set.object_creator(), Some(ObjectCreator::Properties(_))));
    }

    #[test]
    fn test_int_token_widens_to_long_creator() {
        let ty = TypeDescriptor::named("T");
        let mut set = CreatorSet::new();
        set.add(&ty, creator(CreatorKind::FromLong, true, &[])).unwrap();

        let chosen = set.scalar_creator(TokenKind::Int).unwrap();
        assert_eq!(chosen.kind(), CreatorKind::FromLong);
        assert!(set.scalar_creator(TokenKind::String).is_none());
    }

    #[test]
    fn test_buffer_defaults_missing_arguments() {
        let creator = creator(CreatorKind::Properties, true, &["x", "y"]);
        let mut buffer = PropertyValueBuffer::new(&creator);
        buffer.set(1, Value::Int(7));

        assert!(!buffer.is_complete());
        assert_eq!(buffer.missing_names(&creator), vec!["x".to_string()]);
        assert_eq!(
            buffer.into_values(&creator),
            vec![Value::Int(0), Value::Int(7)]
        );
    }
}
