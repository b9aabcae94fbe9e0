//! Bean reading.
//!
//! An object moves through four states: nothing built yet, creator arguments
//! accumulating, instance created with fields still streaming in, done.
//! Fields that arrive before the instance exists are captured as raw tokens
//! and replayed once it does, so field order on the wire never matters.

use super::{ReadProperty, ValueBinding};
use crate::binder::{
    default_value, BinderId, BuiltBean, CreatorDescriptor, CreatorKind, CreatorSet,
    ManagedLink, ObjectCreator, PropertyMap, PropertyValueBuffer,
};
use crate::context::DecodeContext;
use crate::errors::{BindError, FieldPath, Result};
use crate::introspect::{NullPolicy, ReferenceRole, TypeIdInclusion};
use crate::problems::ProblemResolution;
use crate::token::{copy_value, ChainedReader, Token, TokenBuffer, TokenKind, TokenReader};
use crate::types::{ScalarKind, TypeDescriptor, TypeKind};
use crate::value::{ObjectId, Value};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{trace, warn};

#[derive(Default)]
struct ExternalSlot {
    tag: Option<String>,
    value: Option<TokenBuffer>,
}

/// Scratch state for one object
#[derive(Default)]
struct ObjectState {
    external: FxHashMap<usize, ExternalSlot>,
    unwrapped: Vec<(String, TokenBuffer)>,
}

/// Compiled read strategy for a bean type
pub struct BeanReader {
    ty: TypeDescriptor,
    type_name: Arc<str>,
    properties: PropertyMap<ValueBinding>,
    unwrapped: Vec<ReadProperty>,
    back_references: Vec<ReadProperty>,
    injectables: Vec<ReadProperty>,
    creators: CreatorSet,
    catch_all: Option<ValueBinding>,
    ignorable: FxHashSet<String>,
    ignore_unknown: bool,
    /// Type id field name to the position of the property it types
    external_ids: FxHashMap<String, usize>,
    /// Readers for runtime subtypes produced by this type's creators
    subtypes: Mutex<FxHashMap<Arc<str>, BinderId>>,
}

impl BeanReader {
    pub fn new(built: BuiltBean<ValueBinding>) -> Result<Self> {
        let type_name: Arc<str> = built
            .ty
            .raw_name()
            .ok_or_else(|| BindError::definition(&built.ty, "beans must be nominal types"))?
            .into();

        let (unwrapped, regular): (Vec<_>, Vec<_>) = built
            .properties
            .into_iter()
            .partition(|p| p.unwrap().is_some());
        let properties = PropertyMap::new(regular)?;

        let mut external_ids = FxHashMap::default();
        for (position, property) in properties.iter().enumerate() {
            let Some(resolver) = property.binding()?.resolver() else {
                continue;
            };
            if resolver.inclusion() != TypeIdInclusion::ExternalProperty {
                continue;
            }
            let tag = resolver.property_name().to_string();
            if properties.get(&tag).is_some() || external_ids.insert(tag.clone(), position).is_some() {
                return Err(BindError::definition(
                    &built.ty,
                    format!("type id field `{}` clashes with another field", tag),
                ));
            }
        }

        Ok(Self {
            ty: built.ty,
            type_name,
            properties,
            unwrapped,
            back_references: built.back_references,
            injectables: built.injectables,
            creators: built.creators,
            catch_all: built.catch_all,
            ignorable: built.ignorable,
            ignore_unknown: built.ignore_unknown,
            external_ids,
            subtypes: Mutex::new(FxHashMap::default()),
        })
    }

    pub fn ty(&self) -> &TypeDescriptor {
        &self.ty
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn properties(&self) -> &PropertyMap<ValueBinding> {
        &self.properties
    }

    pub fn back_references(&self) -> &[ReadProperty] {
        &self.back_references
    }

    pub fn creators(&self) -> &CreatorSet {
        &self.creators
    }

    /// Attach the back-reference link of a forward property
    pub(crate) fn link(&mut self, position: usize, link: ManagedLink) {
        if let Some(property) = self.properties.at(position) {
            let linked = property.with_managed(link);
            self.properties.replace(position, linked);
        }
    }

    pub fn read(&self, ctx: &mut DecodeContext<'_>, reader: &mut dyn TokenReader) -> Result<Value> {
        let lenient = ctx.take_lenient_unknown();
        match reader.current_kind() {
            Some(TokenKind::StartObject) => self.read_object(ctx, reader, lenient),
            Some(TokenKind::StartArray) => match self.creators.delegating() {
                Some(creator) => self.read_delegating(ctx, reader, creator),
                None => Err(BindError::mismatch(&self.ty, Some(TokenKind::StartArray))),
            },
            Some(TokenKind::Embedded) => {
                let value = match reader.current() {
                    Some(Token::Embedded(value)) => value.clone(),
                    _ => Value::Null,
                };
                reader.advance()?;
                Ok(value)
            }
            Some(kind) if kind.is_scalar() => self.read_from_scalar(ctx, reader, kind),
            other => Err(BindError::mismatch(&self.ty, other)),
        }
    }

    fn read_object(
        &self,
        ctx: &mut DecodeContext<'_>,
        reader: &mut dyn TokenReader,
        lenient: bool,
    ) -> Result<Value> {
        match self.creators.object_creator() {
            Some(ObjectCreator::Delegating(creator)) => self.read_delegating(ctx, reader, creator),
            Some(ObjectCreator::Properties(creator)) => {
                reader.advance()?;
                self.read_with_creator(ctx, reader, creator, lenient)
            }
            Some(ObjectCreator::Default(creator)) => {
                reader.advance()?;
                let id = self.instantiate(ctx, creator, Vec::new())?;
                self.continue_members(ctx, reader, id, lenient)
            }
            None => Err(BindError::instantiation(
                &self.type_name,
                "no creator accepts an object",
            )),
        }
    }

    fn read_from_scalar(
        &self,
        ctx: &mut DecodeContext<'_>,
        reader: &mut dyn TokenReader,
        kind: TokenKind,
    ) -> Result<Value> {
        if let Some(creator) = self.creators.scalar_creator(kind) {
            let argument = match reader.current() {
                Some(token) => scalar_argument(creator.kind(), token),
                None => None,
            }
            .ok_or_else(|| BindError::mismatch(&self.ty, Some(kind)))?;
            reader.advance()?;
            let id = self.instantiate(ctx, creator, vec![argument])?;
            self.inject(ctx, id)?;
            return Ok(Value::Object(id));
        }
        match self.creators.delegating() {
            Some(creator) => self.read_delegating(ctx, reader, creator),
            None => Err(BindError::mismatch(&self.ty, Some(kind))),
        }
    }

    /// Bind the whole subtree to the delegate type, then call the creator once
    fn read_delegating(
        &self,
        ctx: &mut DecodeContext<'_>,
        reader: &mut dyn TokenReader,
        creator: &CreatorDescriptor,
    ) -> Result<Value> {
        let binding = creator
            .params()
            .first()
            .and_then(|param| param.binding.as_ref())
            .ok_or_else(|| {
                BindError::definition(&self.ty, "delegating creator has no argument binder")
            })?;
        let delegate = binding.read(ctx, reader)?;
        let id = self.instantiate(ctx, creator, vec![delegate])?;
        self.inject(ctx, id)?;
        Ok(Value::Object(id))
    }

    /// Cursor is just inside the object
    fn read_with_creator(
        &self,
        ctx: &mut DecodeContext<'_>,
        reader: &mut dyn TokenReader,
        creator: &CreatorDescriptor,
        lenient: bool,
    ) -> Result<Value> {
        let mut arguments = PropertyValueBuffer::new(creator);
        for (index, param) in creator.params().iter().enumerate() {
            if let Some(key) = &param.injection_id {
                arguments.set(index, ctx.injectable(key)?);
            }
        }
        let mut pending = TokenBuffer::new();

        loop {
            if arguments.is_complete() {
                let id = self.instantiate(ctx, creator, arguments.into_values(creator))?;
                let mut rest = ChainedReader::new(pending, reader);
                return self.continue_members(ctx, &mut rest, id, lenient);
            }
            match reader.current_kind() {
                Some(TokenKind::EndObject) => break,
                Some(TokenKind::FieldName) => {}
                other => return Err(BindError::mismatch("field name", other)),
            }
            let name = reader.expect_field_name()?;
            let argument = creator
                .param_index(&name)
                .and_then(|index| Some((index, creator.params().get(index)?.binding.as_ref()?)));
            match argument {
                Some((index, binding)) => {
                    let value = binding.read(ctx, reader).map_err(|e| e.at_field(&name))?;
                    arguments.set(index, value);
                }
                None => {
                    pending.push(Token::FieldName(name));
                    copy_value(reader, &mut pending)?;
                }
            }
        }

        let missing = arguments.missing_names(creator);
        if ctx.read_options().fail_on_missing_creator_properties {
            return Err(BindError::instantiation(
                &self.type_name,
                format!("missing creator properties: {}", missing.join(", ")),
            ));
        }
        warn!(
            ty = %self.type_name,
            missing = ?missing,
            "calling creator with default values for missing properties"
        );
        ctx.record_defaulted(missing.len());

        let id = self.instantiate(ctx, creator, arguments.into_values(creator))?;
        reader.advance()?;
        pending.push(Token::EndObject);
        let mut rest = pending.into_reader();
        self.continue_members(ctx, &mut rest, id, lenient)
    }

    fn instantiate(
        &self,
        ctx: &mut DecodeContext<'_>,
        creator: &CreatorDescriptor,
        arguments: Vec<Value>,
    ) -> Result<ObjectId> {
        let instance = creator.call(&self.type_name, ctx.graph(), arguments)?;
        if instance.type_name() != &*self.type_name
            && !ctx
                .mapper()
                .introspector()
                .is_assignable(&self.type_name, instance.type_name())
        {
            return Err(BindError::instantiation(
                &self.type_name,
                format!("creator produced unrelated type `{}`", instance.type_name()),
            ));
        }
        Ok(ctx.insert(instance))
    }

    /// Stream the remaining fields, switching to the runtime subtype's reader
    /// when the creator produced one
    fn continue_members(
        &self,
        ctx: &mut DecodeContext<'_>,
        reader: &mut dyn TokenReader,
        id: ObjectId,
        lenient: bool,
    ) -> Result<Value> {
        let actual = ctx.graph()[id].type_name_arc().clone();
        if actual != self.type_name {
            let binder = self.subtype_reader(ctx, &actual)?;
            if let Some(bean) = binder.as_bean() {
                return bean.read_members(ctx, reader, id, lenient);
            }
        }
        self.read_members(ctx, reader, id, lenient)
    }

    fn subtype_reader(
        &self,
        ctx: &DecodeContext<'_>,
        actual: &Arc<str>,
    ) -> Result<Arc<super::ReadBinder>> {
        let cached = self
            .subtypes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(actual)
            .copied();
        let id = match cached {
            Some(id) => id,
            None => {
                let id = ctx
                    .mapper()
                    .read_provider()
                    .resolve(&TypeDescriptor::named(actual.clone()))?;
                trace!(base = %self.type_name, subtype = %actual, "caching subtype reader");
                *self
                    .subtypes
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .entry(actual.clone())
                    .or_insert(id)
            }
        };
        ctx.binder(id)
    }

    /// Read fields into an existing instance until the end of the object
    pub(crate) fn read_members(
        &self,
        ctx: &mut DecodeContext<'_>,
        reader: &mut dyn TokenReader,
        id: ObjectId,
        lenient: bool,
    ) -> Result<Value> {
        let mut state = ObjectState::default();
        loop {
            match reader.current_kind() {
                Some(TokenKind::EndObject) => {
                    reader.advance()?;
                    break;
                }
                Some(TokenKind::FieldName) => {}
                other => return Err(BindError::mismatch("field name", other)),
            }
            let name = reader.expect_field_name()?;
            self.read_member(ctx, reader, id, &name, lenient, &mut state)?;
        }
        self.complete(ctx, id, state)?;
        Ok(Value::Object(id))
    }

    fn read_member(
        &self,
        ctx: &mut DecodeContext<'_>,
        reader: &mut dyn TokenReader,
        id: ObjectId,
        name: &str,
        lenient: bool,
        state: &mut ObjectState,
    ) -> Result<()> {
        if let Some(&position) = self.external_ids.get(name) {
            let tag = TokenBuffer::capture(reader)?.as_scalar_text().ok_or_else(|| {
                BindError::invalid_value(&self.type_name, "type id must be a scalar")
                    .at_field(name)
            })?;
            state.external.entry(position).or_default().tag = Some(tag);
            return Ok(());
        }

        if let (Some(position), Some(property)) =
            (self.properties.position(name), self.properties.get(name))
        {
            let binding = property.binding()?;
            let external = binding
                .resolver()
                .is_some_and(|r| r.inclusion() == TypeIdInclusion::ExternalProperty);
            if external {
                state.external.entry(position).or_default().value =
                    Some(TokenBuffer::capture(reader)?);
                return Ok(());
            }
            let value = binding.read(ctx, reader).map_err(|e| e.at_field(name))?;
            return self
                .assign(ctx, id, property, value)
                .map_err(|e| e.at_field(name));
        }

        if self.ignorable.contains(name) {
            return reader.skip_value();
        }
        if !self.unwrapped.is_empty() {
            state
                .unwrapped
                .push((name.to_string(), TokenBuffer::capture(reader)?));
            return Ok(());
        }
        self.unknown_member(ctx, reader, id, name, lenient)
    }

    fn unknown_member(
        &self,
        ctx: &mut DecodeContext<'_>,
        reader: &mut dyn TokenReader,
        id: ObjectId,
        name: &str,
        lenient: bool,
    ) -> Result<()> {
        if let Some(catch_all) = &self.catch_all {
            let value = catch_all.read(ctx, reader).map_err(|e| e.at_field(name))?;
            ctx.graph_mut()[id].set_extra(name, value);
            return Ok(());
        }

        let options = ctx.read_options();
        if self.ignore_unknown || options.ignore_unknown || lenient {
            return reader.skip_value();
        }

        let handlers = ctx.mapper().problem_handlers();
        if !handlers.is_empty() {
            let captured = TokenBuffer::capture(reader)?;
            for handler in handlers {
                match handler.unknown_property(&self.ty, name, &captured)? {
                    ProblemResolution::Unhandled => continue,
                    ProblemResolution::Handled => return Ok(()),
                    ProblemResolution::Value(value) => {
                        ctx.graph_mut()[id].set_extra(name, value);
                        return Ok(());
                    }
                }
            }
            if options.fail_on_unknown_properties {
                return Err(self.unrecognized(name));
            }
            return Ok(());
        }

        if options.fail_on_unknown_properties {
            return Err(self.unrecognized(name));
        }
        reader.skip_value()
    }

    fn unrecognized(&self, name: &str) -> BindError {
        BindError::UnrecognizedProperty {
            ty: self.type_name.to_string(),
            name: name.to_string(),
            known: self.properties.names(),
            path: FieldPath::new(),
        }
    }

    /// Store a decoded value, honoring the null policy and linking back references
    fn assign(
        &self,
        ctx: &mut DecodeContext<'_>,
        id: ObjectId,
        property: &ReadProperty,
        value: Value,
    ) -> Result<()> {
        let value = match (value, property.null_policy()) {
            (Value::Null, NullPolicy::Skip) => return Ok(()),
            (Value::Null, NullPolicy::Fail) => {
                return Err(BindError::InvalidNull {
                    property: property.name().to_string(),
                    path: FieldPath::new(),
                })
            }
            (Value::Null, NullPolicy::AsEmpty) => empty_value(property.ty()),
            (value, _) => value,
        };

        let children = match property.role() {
            ReferenceRole::Forward(_) => child_objects(&value),
            _ => Vec::new(),
        };
        property.set_value(&mut ctx.graph_mut()[id], value)?;
        if children.is_empty() {
            return Ok(());
        }

        let link = property.managed().ok_or_else(|| {
            BindError::reference(format!(
                "forward reference `{}` of `{}` has no matching back reference",
                property.name(),
                self.type_name
            ))
        })?;
        for child in children {
            let instance = &mut ctx.graph_mut()[child];
            let child_type = instance.type_name_arc().clone();
            link.accessor
                .set(instance, Value::BackRef(id))
                .map_err(|e| BindError::from_user(child_type, e))?;
        }
        Ok(())
    }

    /// End of object: external type ids, unwrapped children, injected values
    fn complete(&self, ctx: &mut DecodeContext<'_>, id: ObjectId, state: ObjectState) -> Result<()> {
        let mut external: Vec<_> = state.external.into_iter().collect();
        external.sort_by_key(|(position, _)| *position);
        for (position, slot) in external {
            let Some(property) = self.properties.at(position) else {
                continue;
            };
            let Some(resolver) = property.binding()?.resolver() else {
                continue;
            };
            let value = match (slot.tag, slot.value) {
                (Some(tag), Some(buffer)) => {
                    resolver.read_with_tag(ctx, &mut buffer.into_reader(), &tag)
                }
                (None, Some(buffer)) => resolver.read_untagged(ctx, &mut buffer.into_reader()),
                (_, None) => continue,
            }
            .map_err(|e| e.at_field(property.name()))?;
            self.assign(ctx, id, property, value)
                .map_err(|e| e.at_field(property.name()))?;
        }

        if !state.unwrapped.is_empty() {
            self.replay_unwrapped(ctx, id, state.unwrapped)?;
        }
        self.inject(ctx, id)
    }

    /// Feed buffered fields to each unwrapped child as if they were its own object
    fn replay_unwrapped(
        &self,
        ctx: &mut DecodeContext<'_>,
        id: ObjectId,
        fields: Vec<(String, TokenBuffer)>,
    ) -> Result<()> {
        let mut claimed = vec![false; fields.len()];
        for property in &self.unwrapped {
            let Some(transform) = property.unwrap() else {
                continue;
            };
            let mut tokens = TokenBuffer::new();
            tokens.push(Token::StartObject);
            for (index, (name, value)) in fields.iter().enumerate() {
                if let Some(inner) = transform.strip(name) {
                    tokens.push(Token::FieldName(inner.to_string()));
                    tokens.append(value);
                    claimed[index] = true;
                }
            }
            tokens.push(Token::EndObject);

            ctx.set_lenient_unknown(true);
            let value = property.binding()?.read(ctx, &mut tokens.into_reader());
            ctx.set_lenient_unknown(false);
            let value = value.map_err(|e| e.at_field(property.name()))?;
            self.assign(ctx, id, property, value)
                .map_err(|e| e.at_field(property.name()))?;
        }

        for ((name, value), claimed) in fields.into_iter().zip(claimed) {
            if !claimed {
                self.unknown_member(ctx, &mut value.into_reader(), id, &name, false)?;
            }
        }
        Ok(())
    }

    fn inject(&self, ctx: &mut DecodeContext<'_>, id: ObjectId) -> Result<()> {
        for property in &self.injectables {
            let Some(key) = property.injection_id() else {
                continue;
            };
            let value = ctx.injectable(key)?;
            property.set_value(&mut ctx.graph_mut()[id], value)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for BeanReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeanReader")
            .field("type_name", &self.type_name)
            .field("properties", &self.properties.names())
            .field("unwrapped", &self.unwrapped.len())
            .field("creators", &self.creators)
            .finish_non_exhaustive()
    }
}

/// Placeholder for abstract types: fails on use unless a polymorphic
/// resolver picks a concrete binder first
#[derive(Debug)]
pub struct AbstractReader {
    ty: TypeDescriptor,
    back_references: Vec<ReadProperty>,
}

impl AbstractReader {
    pub fn new(ty: TypeDescriptor, back_references: Vec<ReadProperty>) -> Self {
        Self {
            ty,
            back_references,
        }
    }

    pub fn back_references(&self) -> &[ReadProperty] {
        &self.back_references
    }

    pub fn read(&self, reader: &mut dyn TokenReader) -> Result<Value> {
        Err(BindError::instantiation(
            &self.ty,
            format!(
                "abstract type requires type information (found {})",
                reader
                    .current_kind()
                    .map_or_else(|| "end of input".to_string(), |k| format!("{} token", k))
            ),
        ))
    }
}

/// Convert a scalar token into the argument type of a scalar creator
fn scalar_argument(kind: CreatorKind, token: &Token) -> Option<Value> {
    let value = match (kind, token) {
        (CreatorKind::FromString, Token::String(s)) => Value::String(s.clone()),
        (CreatorKind::FromInt, Token::Int(v)) => Value::Int(*v),
        (CreatorKind::FromLong, Token::Int(v)) => Value::Long(i64::from(*v)),
        (CreatorKind::FromLong, Token::Long(v)) => Value::Long(*v),
        (CreatorKind::FromDouble, Token::Int(v)) => Value::Double(f64::from(*v)),
        (CreatorKind::FromDouble, Token::Long(v)) => Value::Double(*v as f64),
        (CreatorKind::FromDouble, Token::Double(v)) => Value::Double(*v),
        (CreatorKind::FromBool, Token::Bool(v)) => Value::Bool(*v),
        _ => return None,
    };
    Some(value)
}

/// Value substituted for null under [`NullPolicy::AsEmpty`]
fn empty_value(ty: &TypeDescriptor) -> Value {
    match ty.kind() {
        TypeKind::Array(_) | TypeKind::List(_) | TypeKind::Set(_) => Value::List(Vec::new()),
        TypeKind::Map { .. } => Value::Map(Vec::new()),
        TypeKind::Scalar(ScalarKind::String) => Value::String(String::new()),
        TypeKind::Scalar(ScalarKind::Bytes) => Value::Bytes(Vec::new()),
        TypeKind::Tree => Value::Tree(serde_json::Value::Object(serde_json::Map::new())),
        _ => default_value(ty),
    }
}

/// Object handles directly inside a value: itself, list elements or map values
fn child_objects(value: &Value) -> Vec<ObjectId> {
    match value {
        Value::Object(id) => vec![*id],
        Value::List(items) => items.iter().filter_map(Value::as_object).collect(),
        Value::Map(entries) => entries.iter().filter_map(|(_, v)| v.as_object()).collect(),
        _ => Vec::new(),
    }
}
