use super::{describe, polymorphic_config, use_site_type};
use crate::binder::write::{BeanWriter, CollectionWriter, MapWriter};
use crate::binder::{WriteBinder, WriteBinding, WriteProperty};
use crate::errors::Result;
use crate::introspect::{Introspector, ReferenceRole, TypeShape};
use crate::polymorphic::PolymorphicResolver;
use crate::provider::{BinderFactory, BinderTable, ConstructionSession};
use crate::types::{TypeDescriptor, TypeKind};
use std::sync::Arc;

/// Builds write binders from introspected metadata
pub struct WriteFactory {
    introspector: Arc<dyn Introspector>,
}

impl WriteFactory {
    pub fn new(introspector: Arc<dyn Introspector>) -> Self {
        Self { introspector }
    }

    fn build_named(
        &self,
        session: &mut ConstructionSession<'_, Self>,
        ty: &TypeDescriptor,
    ) -> Result<WriteBinder> {
        let meta = describe(self.introspector.as_ref(), ty)?;
        if let Some(writer) = &meta.writer_override {
            return Ok(WriteBinder::Custom(writer.clone()));
        }
        if let TypeShape::Enum(_) = meta.shape {
            return Ok(WriteBinder::Enum(ty.clone()));
        }

        let mut properties = Vec::with_capacity(meta.properties.len());
        for property in &meta.properties {
            let skipped = property.ignored
                || !property.serialize
                || property.injection_id.is_some()
                || matches!(property.role, ReferenceRole::Back(_));
            if skipped {
                continue;
            }
            let binding = session.bind(&use_site_type(&property.ty, property.type_info.as_ref()))?;
            properties.push(WriteProperty::from_meta(property).with_binding(binding));
        }
        let catch_all = match &meta.catch_all {
            Some(value_type) => Some(session.bind(value_type)?),
            None => None,
        };
        Ok(WriteBinder::Bean(BeanWriter::new(ty.clone(), properties, catch_all)?))
    }
}

impl BinderFactory for WriteFactory {
    type Binder = WriteBinder;
    type Binding = Arc<WriteBinding>;
    type Resolution = ();

    fn build(
        &self,
        session: &mut ConstructionSession<'_, Self>,
        ty: &TypeDescriptor,
    ) -> Result<WriteBinder> {
        if let Some(writer) = ty.value_handler().and_then(|h| h.writer.clone()) {
            return Ok(WriteBinder::Custom(writer));
        }
        match ty.kind() {
            TypeKind::Scalar(kind) => Ok(WriteBinder::Scalar(*kind)),
            TypeKind::Tree => Ok(WriteBinder::Tree),
            TypeKind::Any => Ok(WriteBinder::Any),
            TypeKind::Array(element) | TypeKind::List(element) | TypeKind::Set(element) => {
                let element = session.bind(element)?;
                Ok(WriteBinder::Collection(CollectionWriter::new(ty.clone(), element)))
            }
            TypeKind::Map { value, .. } => {
                let value = session.bind(value)?;
                Ok(WriteBinder::Map(MapWriter::new(ty.clone(), value)))
            }
            TypeKind::Named { .. } => self.build_named(session, ty),
        }
    }

    fn bind(
        &self,
        session: &mut ConstructionSession<'_, Self>,
        ty: &TypeDescriptor,
    ) -> Result<Arc<WriteBinding>> {
        let config = polymorphic_config(self.introspector.as_ref(), ty);
        let binding = WriteBinding::new(session.resolve(&ty.without_type_handler())?, ty);
        let binding = match config {
            Some(config) => binding.with_resolver(Arc::new(PolymorphicResolver::new(
                ty,
                config,
                self.introspector.as_ref(),
            )?)),
            None => binding,
        };
        Ok(Arc::new(binding))
    }

    fn plan_resolution(
        &self,
        _binder: &WriteBinder,
        _table: &BinderTable<'_, WriteBinder>,
    ) -> Result<Option<()>> {
        Ok(None)
    }

    fn apply_resolution(&self, _binder: &mut WriteBinder, _resolution: ()) {}
}
