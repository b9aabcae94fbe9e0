use super::{key_text, unwritable, WriteBinding};
use crate::context::EncodeContext;
use crate::errors::Result;
use crate::token::TokenWriter;
use crate::types::TypeDescriptor;
use crate::value::Value;
use std::sync::Arc;

/// Writes arrays, lists and sets
#[derive(Debug)]
pub struct CollectionWriter {
    ty: TypeDescriptor,
    element: Arc<WriteBinding>,
}

impl CollectionWriter {
    pub fn new(ty: TypeDescriptor, element: Arc<WriteBinding>) -> Self {
        Self { ty, element }
    }

    pub fn element(&self) -> &WriteBinding {
        &self.element
    }

    pub fn write(
        &self,
        ctx: &mut EncodeContext<'_>,
        writer: &mut dyn TokenWriter,
        value: &Value,
    ) -> Result<()> {
        let items = match value {
            Value::Null => return writer.write_null(),
            Value::List(items) => items,
            other => return Err(unwritable(&self.ty, other)),
        };
        writer.write_start_array()?;
        for (index, item) in items.iter().enumerate() {
            self.element
                .write(ctx, writer, item)
                .map_err(|e| e.at_index(index))?;
        }
        writer.write_end_array()
    }
}

/// Writes key/value pairs as an object, keys rendered as field names
#[derive(Debug)]
pub struct MapWriter {
    ty: TypeDescriptor,
    value: Arc<WriteBinding>,
}

impl MapWriter {
    pub fn new(ty: TypeDescriptor, value: Arc<WriteBinding>) -> Self {
        Self { ty, value }
    }

    pub fn write(
        &self,
        ctx: &mut EncodeContext<'_>,
        writer: &mut dyn TokenWriter,
        value: &Value,
    ) -> Result<()> {
        let entries = match value {
            Value::Null => return writer.write_null(),
            Value::Map(entries) => entries,
            other => return Err(unwritable(&self.ty, other)),
        };
        writer.write_start_object()?;
        for (key, item) in entries {
            let name = key_text(key)?;
            writer.write_field_name(&name)?;
            self.value
                .write(ctx, writer, item)
                .map_err(|e| e.at_field(&name))?;
        }
        writer.write_end_object()
    }
}
