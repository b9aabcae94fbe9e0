//! Runtime dispatch from a base type to its concrete subtypes.
//!
//! A resolver is attached to a use site (a property, a container element or a
//! root binding) and picks a concrete binder per value from a type id. The
//! tag tables are fixed at construction; the concrete binders are resolved
//! lazily on first use and cached per resolver.

use crate::binder::{BinderId, WriteBinder};
use crate::context::{DecodeContext, EncodeContext};
use crate::errors::{BindError, FieldPath, Result};
use crate::introspect::{Introspector, PolymorphicConfig, TypeIdInclusion};
use crate::token::{copy_value, ChainedReader, Token, TokenBuffer, TokenKind, TokenReader, TokenWriter};
use crate::types::TypeDescriptor;
use crate::value::Value;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, trace};

pub struct PolymorphicResolver {
    base: TypeDescriptor,
    base_name: String,
    config: Arc<PolymorphicConfig>,
    by_tag: FxHashMap<String, TypeDescriptor>,
    by_type: FxHashMap<Arc<str>, String>,
    read_binders: Mutex<FxHashMap<String, BinderId>>,
    write_binders: Mutex<FxHashMap<Arc<str>, BinderId>>,
}

impl PolymorphicResolver {
    /// Build the tag tables for `base`.
    ///
    /// Without an explicit subtype table every concrete subtype known to the
    /// introspector is tagged with its type name, and so is the base itself
    /// when it can be instantiated.
    pub fn new(
        base: &TypeDescriptor,
        config: Arc<PolymorphicConfig>,
        introspector: &dyn Introspector,
    ) -> Result<Self> {
        let base = base.without_type_handler();
        let base_name = base
            .raw_name()
            .map_or_else(|| base.to_string(), str::to_string);

        let subtypes: Vec<(String, TypeDescriptor)> = if config.subtypes.is_empty() {
            let mut found: Vec<(String, TypeDescriptor)> = introspector
                .find_subtypes(&base_name)
                .into_iter()
                .map(|name| (name.to_string(), TypeDescriptor::named(name)))
                .collect();
            if introspector
                .describe(&base)
                .is_some_and(|meta| !meta.is_abstract)
            {
                found.insert(0, (base_name.clone(), base.clone()));
            }
            found
        } else {
            config.subtypes.clone()
        };

        let mut by_tag = FxHashMap::default();
        let mut by_type = FxHashMap::default();
        for (tag, ty) in subtypes {
            let name: Arc<str> = ty
                .raw_name()
                .ok_or_else(|| BindError::definition(&base, format!("subtype `{}` is not nominal", ty)))?
                .into();
            if !introspector.is_assignable(&base_name, &name) {
                return Err(BindError::definition(
                    &base,
                    format!("`{}` is not a subtype", name),
                ));
            }
            if by_tag.insert(tag.clone(), ty).is_some() {
                return Err(BindError::definition(
                    &base,
                    format!("type id `{}` is used twice", tag),
                ));
            }
            by_type.entry(name).or_insert(tag);
        }
        if let Some(default) = &config.default_impl {
            let assignable = default
                .raw_name()
                .is_some_and(|name| introspector.is_assignable(&base_name, name));
            if !assignable {
                return Err(BindError::definition(
                    &base,
                    format!("default implementation `{}` is not a subtype", default),
                ));
            }
        }

        debug!(base = %base_name, subtypes = by_tag.len(), inclusion = ?config.inclusion, "built polymorphic resolver");
        Ok(Self {
            base,
            base_name,
            config,
            by_tag,
            by_type,
            read_binders: Mutex::new(FxHashMap::default()),
            write_binders: Mutex::new(FxHashMap::default()),
        })
    }

    pub fn base(&self) -> &TypeDescriptor {
        &self.base
    }

    pub fn inclusion(&self) -> TypeIdInclusion {
        self.config.inclusion
    }

    /// Name of the type id field
    pub fn property_name(&self) -> &str {
        &self.config.property
    }

    /// Registered type ids in no particular order
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.by_tag.keys().map(String::as_str)
    }

    /// Type id written for a runtime type
    pub fn type_id_for(&self, type_name: &str) -> Result<&str> {
        self.by_type
            .get(type_name)
            .map(String::as_str)
            .ok_or_else(|| {
                BindError::invalid_value(
                    &self.base_name,
                    format!("runtime type `{}` has no registered type id", type_name),
                )
            })
    }

    // Read side

    /// Read one value whose concrete type is carried in the stream
    pub fn read(
        &self,
        ctx: &mut DecodeContext<'_>,
        reader: &mut dyn TokenReader,
        base_binder: BinderId,
    ) -> Result<Value> {
        match self.config.inclusion {
            TypeIdInclusion::WrapperObject => {
                if reader.current_kind() != Some(TokenKind::StartObject) {
                    return self.read_untagged(ctx, reader);
                }
                reader.advance()?;
                let tag = reader.expect_field_name()?;
                let value = self.read_with_tag(ctx, reader, &tag)?;
                reader.expect(TokenKind::EndObject)?;
                Ok(value)
            }
            TypeIdInclusion::WrapperArray => {
                if reader.current_kind() != Some(TokenKind::StartArray) {
                    return self.read_untagged(ctx, reader);
                }
                reader.advance()?;
                let tag = match reader.current() {
                    Some(Token::String(tag)) => tag.clone(),
                    other => {
                        return Err(BindError::mismatch("type id", other.map(Token::kind)))
                    }
                };
                reader.advance()?;
                let value = self.read_with_tag(ctx, reader, &tag)?;
                reader.expect(TokenKind::EndArray)?;
                Ok(value)
            }
            TypeIdInclusion::Property | TypeIdInclusion::ExternalProperty => {
                self.read_embedded(ctx, reader, base_binder)
            }
        }
    }

    /// Buffer fields until the type id field shows up, then hand the whole
    /// object to the concrete binder
    fn read_embedded(
        &self,
        ctx: &mut DecodeContext<'_>,
        reader: &mut dyn TokenReader,
        base_binder: BinderId,
    ) -> Result<Value> {
        if reader.current_kind() != Some(TokenKind::StartObject) {
            return ctx.binder(base_binder)?.read(ctx, reader);
        }
        reader.advance()?;

        let mut buffer = TokenBuffer::new();
        buffer.push(Token::StartObject);
        loop {
            match reader.current_kind() {
                Some(TokenKind::EndObject) => break,
                Some(TokenKind::FieldName) => {}
                other => return Err(BindError::mismatch("field name", other)),
            }
            let name = reader.expect_field_name()?;
            if name == self.config.property {
                let tag = TokenBuffer::capture(reader)?.as_scalar_text().ok_or_else(|| {
                    BindError::invalid_value(&self.base_name, "type id must be a scalar")
                        .at_field(&name)
                })?;
                if self.config.visible {
                    buffer.push(Token::FieldName(name));
                    buffer.push(Token::String(tag.clone()));
                }
                let mut rest = ChainedReader::new(buffer, reader);
                return self.read_with_tag(ctx, &mut rest, &tag);
            }
            buffer.push(Token::FieldName(name));
            copy_value(reader, &mut buffer)?;
        }

        reader.advance()?;
        buffer.push(Token::EndObject);
        self.read_untagged(ctx, &mut buffer.into_reader())
    }

    /// Read a value whose type id is already known
    pub fn read_with_tag(
        &self,
        ctx: &mut DecodeContext<'_>,
        reader: &mut dyn TokenReader,
        tag: &str,
    ) -> Result<Value> {
        if reader.current_kind() == Some(TokenKind::Null) {
            reader.advance()?;
            return Ok(Value::Null);
        }
        let id = match self.reader_for_tag(ctx, tag)? {
            Some(id) => id,
            None => match &self.config.default_impl {
                Some(default) => ctx.mapper().read_provider().resolve(default)?,
                None => {
                    return Err(BindError::UnknownTypeId {
                        base: self.base_name.clone(),
                        id: tag.to_string(),
                        path: FieldPath::new(),
                    })
                }
            },
        };
        ctx.binder(id)?.read(ctx, reader)
    }

    /// Read a value that arrived without a type id
    pub fn read_untagged(
        &self,
        ctx: &mut DecodeContext<'_>,
        reader: &mut dyn TokenReader,
    ) -> Result<Value> {
        if reader.current_kind() == Some(TokenKind::Null) {
            reader.advance()?;
            return Ok(Value::Null);
        }
        match &self.config.default_impl {
            Some(default) => {
                trace!(base = %self.base_name, default = %default, "no type id, using default implementation");
                let id = ctx.mapper().read_provider().resolve(default)?;
                ctx.binder(id)?.read(ctx, reader)
            }
            None => Err(BindError::MissingTypeId {
                base: self.base_name.clone(),
                property: self.config.property.clone(),
                path: FieldPath::new(),
            }),
        }
    }

    fn reader_for_tag(&self, ctx: &DecodeContext<'_>, tag: &str) -> Result<Option<BinderId>> {
        if let Some(id) = self
            .read_binders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(tag)
        {
            return Ok(Some(*id));
        }
        let Some(ty) = self.by_tag.get(tag) else {
            return Ok(None);
        };
        let id = ctx.mapper().read_provider().resolve(ty)?;
        self.read_binders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tag.to_string(), id);
        Ok(Some(id))
    }

    // Write side

    /// Write a value together with its type id
    pub fn write(
        &self,
        ctx: &mut EncodeContext<'_>,
        writer: &mut dyn TokenWriter,
        value: &Value,
    ) -> Result<()> {
        let Value::Object(id) = value else {
            return crate::binder::write::write_natural(ctx, writer, value);
        };
        let type_name = ctx.instance(*id)?.type_name_arc().clone();
        let tag = self.type_id_for(&type_name)?;
        let binder = self.writer_for(ctx, &type_name)?;

        match self.config.inclusion {
            TypeIdInclusion::Property => match binder.as_bean() {
                Some(bean) => bean.write_with_type_id(
                    ctx,
                    writer,
                    value,
                    Some((self.config.property.as_str(), tag)),
                ),
                None => write_wrapper_array(ctx, writer, &binder, value, tag),
            },
            TypeIdInclusion::WrapperObject => {
                writer.write_start_object()?;
                writer.write_field_name(tag)?;
                binder.write(ctx, writer, value)?;
                writer.write_end_object()
            }
            TypeIdInclusion::WrapperArray => write_wrapper_array(ctx, writer, &binder, value, tag),
            TypeIdInclusion::ExternalProperty => binder.write(ctx, writer, value),
        }
    }

    /// Write a value through its concrete binder without any type id
    pub fn write_value_only(
        &self,
        ctx: &mut EncodeContext<'_>,
        writer: &mut dyn TokenWriter,
        value: &Value,
    ) -> Result<()> {
        let Value::Object(id) = value else {
            return crate::binder::write::write_natural(ctx, writer, value);
        };
        let type_name = ctx.instance(*id)?.type_name_arc().clone();
        self.writer_for(ctx, &type_name)?.write(ctx, writer, value)
    }

    fn writer_for(&self, ctx: &EncodeContext<'_>, type_name: &Arc<str>) -> Result<Arc<WriteBinder>> {
        let cached = self
            .write_binders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(type_name)
            .copied();
        let id = match cached {
            Some(id) => id,
            None => {
                let id = ctx
                    .mapper()
                    .write_provider()
                    .resolve(&TypeDescriptor::named(type_name.clone()))?;
                self.write_binders
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(type_name.clone(), id);
                id
            }
        };
        ctx.binder(id)
    }
}

fn write_wrapper_array(
    ctx: &mut EncodeContext<'_>,
    writer: &mut dyn TokenWriter,
    binder: &WriteBinder,
    value: &Value,
    tag: &str,
) -> Result<()> {
    writer.write_start_array()?;
    writer.write_string(tag)?;
    binder.write(ctx, writer, value)?;
    writer.write_end_array()
}

impl fmt::Debug for PolymorphicResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolymorphicResolver")
            .field("base", &self.base_name)
            .field("inclusion", &self.config.inclusion)
            .field("property", &self.config.property)
            .field("subtypes", &self.by_tag.len())
            .finish()
    }
}
