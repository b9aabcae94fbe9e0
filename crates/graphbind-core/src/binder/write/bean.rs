use super::{unwritable, write_natural, WriteBinding, WriteProperty};
use crate::config::{DefaultInclusion, SelfReferences};
use crate::context::EncodeContext;
use crate::errors::{BindError, FieldPath, Result};
use crate::introspect::{Inclusion, NameTransform, TypeIdInclusion};
use crate::token::TokenWriter;
use crate::types::TypeDescriptor;
use crate::value::{Instance, Value};
use std::sync::Arc;

/// Compiled write strategy for a bean type
#[derive(Debug)]
pub struct BeanWriter {
    ty: TypeDescriptor,
    type_name: Arc<str>,
    properties: Vec<WriteProperty>,
    catch_all: Option<Arc<WriteBinding>>,
}

impl BeanWriter {
    pub fn new(
        ty: TypeDescriptor,
        properties: Vec<WriteProperty>,
        catch_all: Option<Arc<WriteBinding>>,
    ) -> Result<Self> {
        let type_name: Arc<str> = ty
            .raw_name()
            .ok_or_else(|| BindError::definition(&ty, "beans must be nominal types"))?
            .into();
        Ok(Self {
            ty,
            type_name,
            properties,
            catch_all,
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn properties(&self) -> &[WriteProperty] {
        &self.properties
    }

    pub fn write(
        &self,
        ctx: &mut EncodeContext<'_>,
        writer: &mut dyn TokenWriter,
        value: &Value,
    ) -> Result<()> {
        self.write_with_type_id(ctx, writer, value, None)
    }

    /// Write the bean as an object, optionally led by a `(field, tag)` type id
    pub fn write_with_type_id(
        &self,
        ctx: &mut EncodeContext<'_>,
        writer: &mut dyn TokenWriter,
        value: &Value,
        type_id: Option<(&str, &str)>,
    ) -> Result<()> {
        let id = match value {
            Value::Null | Value::BackRef(_) => return writer.write_null(),
            Value::Object(id) => *id,
            other => return Err(unwritable(&self.ty, other)),
        };
        let instance = ctx.instance(id)?;
        if !ctx.enter(id) {
            return match ctx.write_options().self_references {
                SelfReferences::WriteNull => writer.write_null(),
                SelfReferences::Fail => Err(BindError::Cycle {
                    ty: self.type_name.to_string(),
                    message: "value refers to itself".to_string(),
                    path: FieldPath::new(),
                }),
            };
        }

        let result = writer.write_start_object().and_then(|()| {
            if let Some((field, tag)) = type_id {
                writer.write_field_name(field)?;
                writer.write_string(tag)?;
            }
            self.write_fields(ctx, writer, instance)?;
            writer.write_end_object()
        });
        ctx.leave();
        result
    }

    fn write_fields(
        &self,
        ctx: &mut EncodeContext<'_>,
        writer: &mut dyn TokenWriter,
        instance: &Instance,
    ) -> Result<()> {
        let default = ctx.write_options().default_inclusion;
        for property in &self.properties {
            let value = property.get_value(instance);
            if matches!(value, Value::BackRef(_)) || !included(property.include(), default, &value) {
                continue;
            }
            let binding = property.binding()?;

            if let Some(transform) = property.unwrap() {
                // An absent unwrapped child contributes no fields
                if value.is_null() {
                    continue;
                }
                if !matches!(value, Value::Object(_)) {
                    return Err(BindError::invalid_value(
                        &self.type_name,
                        format!("unwrapped property `{}` must hold a bean", property.name()),
                    ));
                }
                let mut renaming = RenamingWriter::new(writer, transform);
                binding
                    .write(ctx, &mut renaming, &value)
                    .map_err(|e| e.at_field(property.name()))?;
                continue;
            }

            let external = binding
                .resolver()
                .filter(|r| r.inclusion() == TypeIdInclusion::ExternalProperty);
            if let (Some(resolver), Value::Object(id)) = (external, &value) {
                let tag = resolver.type_id_for(ctx.instance(*id)?.type_name())?;
                writer.write_field_name(property.name())?;
                resolver
                    .write_value_only(ctx, writer, &value)
                    .map_err(|e| e.at_field(property.name()))?;
                writer.write_field_name(resolver.property_name())?;
                writer.write_string(tag)?;
                continue;
            }

            writer.write_field_name(property.name())?;
            binding
                .write(ctx, writer, &value)
                .map_err(|e| e.at_field(property.name()))?;
        }

        for (name, value) in instance.extras() {
            writer.write_field_name(name)?;
            match &self.catch_all {
                Some(binding) => binding.write(ctx, writer, value),
                None => write_natural(ctx, writer, value),
            }
            .map_err(|e| e.at_field(name))?;
        }
        Ok(())
    }
}

fn included(include: &Inclusion, default: DefaultInclusion, value: &Value) -> bool {
    match include {
        Inclusion::Always => true,
        Inclusion::NonNull => !value.is_null(),
        Inclusion::NonEmpty => !value.is_empty(),
        Inclusion::NonDefault(sentinel) => !value.is_null() && value != sentinel,
        Inclusion::Default => match default {
            DefaultInclusion::Always => true,
            DefaultInclusion::NonNull => !value.is_null(),
            DefaultInclusion::NonEmpty => !value.is_empty(),
        },
    }
}

/// Writes a child bean's fields straight into the enclosing object, renamed
struct RenamingWriter<'w> {
    inner: &'w mut dyn TokenWriter,
    transform: &'w NameTransform,
    depth: usize,
}

impl<'w> RenamingWriter<'w> {
    fn new(inner: &'w mut dyn TokenWriter, transform: &'w NameTransform) -> Self {
        Self {
            inner,
            transform,
            depth: 0,
        }
    }
}

impl TokenWriter for RenamingWriter<'_> {
    fn write_start_object(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth == 1 {
            return Ok(());
        }
        self.inner.write_start_object()
    }

    fn write_end_object(&mut self) -> Result<()> {
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 {
            return Ok(());
        }
        self.inner.write_end_object()
    }

    fn write_start_array(&mut self) -> Result<()> {
        self.depth += 1;
        self.inner.write_start_array()
    }

    fn write_end_array(&mut self) -> Result<()> {
        self.depth = self.depth.saturating_sub(1);
        self.inner.write_end_array()
    }

    fn write_field_name(&mut self, name: &str) -> Result<()> {
        if self.depth == 1 {
            return self.inner.write_field_name(&self.transform.apply(name));
        }
        self.inner.write_field_name(name)
    }

    fn write_string(&mut self, value: &str) -> Result<()> {
        self.inner.write_string(value)
    }

    fn write_int(&mut self, value: i32) -> Result<()> {
        self.inner.write_int(value)
    }

    fn write_long(&mut self, value: i64) -> Result<()> {
        self.inner.write_long(value)
    }

    fn write_double(&mut self, value: f64) -> Result<()> {
        self.inner.write_double(value)
    }

    fn write_bool(&mut self, value: bool) -> Result<()> {
        self.inner.write_bool(value)
    }

    fn write_null(&mut self) -> Result<()> {
        self.inner.write_null()
    }

    fn write_embedded(&mut self, value: &Value) -> Result<()> {
        self.inner.write_embedded(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{JsonWriter, TokenBuffer};
    use serde_json::json;

    #[test]
    fn test_inclusion_rules() {
        let empty = Value::List(vec![]);
        assert!(included(&Inclusion::Always, DefaultInclusion::NonNull, &Value::Null));
        assert!(!included(&Inclusion::NonNull, DefaultInclusion::Always, &Value::Null));
        assert!(!included(&Inclusion::NonEmpty, DefaultInclusion::Always, &empty));
        assert!(included(&Inclusion::Default, DefaultInclusion::NonNull, &empty));
        assert!(!included(&Inclusion::Default, DefaultInclusion::NonEmpty, &empty));

        let zero = Inclusion::NonDefault(Value::Int(0));
        assert!(!included(&zero, DefaultInclusion::Always, &Value::Int(0)));
        assert!(included(&zero, DefaultInclusion::Always, &Value::Int(1)));
    }

    #[test]
    fn test_renaming_writer_flattens_outer_object() {
        let transform = NameTransform::new("home_", "");
        let mut out = JsonWriter::new();
        out.write_start_object().unwrap();
        out.write_field_name("name").unwrap();
        out.write_string("Ann").unwrap();
        {
            let mut renaming = RenamingWriter::new(&mut out, &transform);
            renaming.write_start_object().unwrap();
            renaming.write_field_name("city").unwrap();
            renaming.write_string("Oslo").unwrap();
            renaming.write_field_name("tags").unwrap();
            renaming.write_start_object().unwrap();
            renaming.write_field_name("zip").unwrap();
            renaming.write_int(150).unwrap();
            renaming.write_end_object().unwrap();
            renaming.write_end_object().unwrap();
        }
        out.write_end_object().unwrap();

        assert_eq!(
            out.finish().unwrap(),
            json!({"name": "Ann", "home_city": "Oslo", "home_tags": {"zip": 150}})
        );
    }

    #[test]
    fn test_renaming_writer_leaves_nested_arrays_alone() {
        let transform = NameTransform::new("", "_x");
        let mut buffer = TokenBuffer::new();
        let mut renaming = RenamingWriter::new(&mut buffer, &transform);
        renaming.write_start_object().unwrap();
        renaming.write_field_name("a").unwrap();
        renaming.write_start_array().unwrap();
        renaming.write_int(1).unwrap();
        renaming.write_end_array().unwrap();
        renaming.write_end_object().unwrap();

        assert_eq!(buffer.len(), 4);
    }
}
