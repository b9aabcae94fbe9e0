use super::{creators, describe, polymorphic_config, use_site_type};
use crate::binder::read::{
    AbstractReader, BeanReader, CollectionReader, EnumReader, KeyDecoder, MapReader,
};
use crate::binder::{
    BinderBuilder, CreatorDescriptor, CreatorKind, CreatorParamDescriptor, ManagedLink,
    ReadBinder, ReadProperty, ValueBinding,
};
use crate::errors::{BindError, Result};
use crate::introspect::{CreatorCandidate, Introspector, ReferenceRole, TypeMeta, TypeShape};
use crate::polymorphic::PolymorphicResolver;
use crate::provider::{BinderFactory, BinderTable, ConstructionSession};
use crate::types::{TypeDescriptor, TypeKind};
use crate::value::Instance;
use std::sync::Arc;
use tracing::debug;

/// Builds read binders from introspected metadata
pub struct ReadFactory {
    introspector: Arc<dyn Introspector>,
}

impl ReadFactory {
    pub fn new(introspector: Arc<dyn Introspector>) -> Self {
        Self { introspector }
    }

    fn build_named(
        &self,
        session: &mut ConstructionSession<'_, Self>,
        ty: &TypeDescriptor,
    ) -> Result<ReadBinder> {
        let meta = describe(self.introspector.as_ref(), ty)?;
        if let Some(reader) = &meta.reader_override {
            return Ok(ReadBinder::Custom(reader.clone()));
        }
        match &meta.shape {
            TypeShape::Enum(variants) => Ok(ReadBinder::Enum(EnumReader::new(
                ty.clone(),
                variants.clone(),
            ))),
            TypeShape::Bean => self.build_bean(session, ty, &meta),
        }
    }

    fn build_bean(
        &self,
        session: &mut ConstructionSession<'_, Self>,
        ty: &TypeDescriptor,
        meta: &TypeMeta,
    ) -> Result<ReadBinder> {
        let mut builder = BinderBuilder::<ValueBinding>::new(ty.clone());

        for property in &meta.properties {
            if property.ignored || !property.deserialize {
                builder.add_ignorable(property.name.clone());
                continue;
            }
            let descriptor = ReadProperty::from_meta(property);
            if property.injection_id.is_some() {
                builder.add_injectable(descriptor)?;
                continue;
            }
            if let ReferenceRole::Back(_) = property.role {
                builder.add_reference_property(descriptor)?;
                continue;
            }

            let binding = session.bind(&use_site_type(&property.ty, property.type_info.as_ref()))?;
            let mut descriptor = descriptor.with_binding(binding);
            if let ReferenceRole::Forward(_) = property.role {
                let target = property.ty.content_type().unwrap_or(&property.ty);
                let target = session.resolve(&target.without_type_handler())?;
                descriptor = descriptor.with_reference_target(target);
            }
            builder.add_property(descriptor)?;
        }

        if let Some(value_type) = &meta.catch_all {
            builder.set_catch_all(session.bind(value_type)?);
        }
        for name in &meta.ignorable {
            builder.add_ignorable(name.clone());
        }
        if meta.ignore_unknown {
            builder.set_ignore_unknown();
        }

        for (kind, candidate) in creators::adopt(ty, &meta.creators)? {
            let creator = self.creator(session, meta, kind, candidate)?;
            builder.add_creator(creator)?;
        }

        if !builder.has_creators() {
            if meta.is_abstract {
                debug!(ty = %ty, "abstract type without creators, using placeholder");
                let built = builder.build()?;
                return Ok(ReadBinder::Abstract(AbstractReader::new(
                    ty.clone(),
                    built.back_references,
                )));
            }
            let name = meta.name.clone();
            let func = CreatorCandidate::default_ctor(move |_| Ok(Instance::new(name.clone()))).func;
            builder.add_creator(CreatorDescriptor::new(CreatorKind::Default, Vec::new(), func, false))?;
        }

        Ok(ReadBinder::Bean(BeanReader::new(builder.build()?)?))
    }

    fn creator(
        &self,
        session: &mut ConstructionSession<'_, Self>,
        meta: &TypeMeta,
        kind: CreatorKind,
        candidate: &CreatorCandidate,
    ) -> Result<CreatorDescriptor> {
        let mut params = Vec::with_capacity(candidate.params.len());
        for param in &candidate.params {
            let binding = match &param.injection_id {
                Some(_) => None,
                None => {
                    let type_info = param
                        .name
                        .as_deref()
                        .and_then(|name| meta.find_property(name))
                        .and_then(|property| property.type_info.as_ref());
                    Some(session.bind(&use_site_type(&param.ty, type_info))?)
                }
            };
            params.push(CreatorParamDescriptor {
                name: param.name.clone(),
                ty: param.ty.clone(),
                injection_id: param.injection_id.clone(),
                binding,
            });
        }
        Ok(CreatorDescriptor::new(
            kind,
            params,
            candidate.func.clone(),
            candidate.explicit,
        ))
    }
}

impl BinderFactory for ReadFactory {
    type Binder = ReadBinder;
    type Binding = ValueBinding;
    /// Forward properties to link: `(property position, back-reference link)`
    type Resolution = Vec<(usize, ManagedLink)>;

    fn build(
        &self,
        session: &mut ConstructionSession<'_, Self>,
        ty: &TypeDescriptor,
    ) -> Result<ReadBinder> {
        if let Some(reader) = ty.value_handler().and_then(|h| h.reader.clone()) {
            return Ok(ReadBinder::Custom(reader));
        }
        match ty.kind() {
            TypeKind::Scalar(kind) => Ok(ReadBinder::Scalar(*kind)),
            TypeKind::Tree => Ok(ReadBinder::Tree),
            TypeKind::Any => Ok(ReadBinder::Any),
            TypeKind::Array(element) | TypeKind::List(element) | TypeKind::Set(element) => {
                let element = session.bind(element)?;
                Ok(ReadBinder::Collection(CollectionReader::new(ty.clone(), element)))
            }
            TypeKind::Map { key, value } => {
                let key = KeyDecoder::for_type(key, self.introspector.as_ref())?;
                let value = session.bind(value)?;
                Ok(ReadBinder::Map(MapReader::new(ty.clone(), key, value)))
            }
            TypeKind::Named { .. } => self.build_named(session, ty),
        }
    }

    fn bind(
        &self,
        session: &mut ConstructionSession<'_, Self>,
        ty: &TypeDescriptor,
    ) -> Result<ValueBinding> {
        let config = polymorphic_config(self.introspector.as_ref(), ty);
        let binder = session.resolve(&ty.without_type_handler())?;
        match config {
            Some(config) => {
                let resolver = PolymorphicResolver::new(ty, config, self.introspector.as_ref())?;
                Ok(ValueBinding::with_resolver(binder, Arc::new(resolver)))
            }
            None => Ok(ValueBinding::new(binder)),
        }
    }

    fn plan_resolution(
        &self,
        binder: &ReadBinder,
        table: &BinderTable<'_, ReadBinder>,
    ) -> Result<Option<Self::Resolution>> {
        let Some(bean) = binder.as_bean() else {
            return Ok(None);
        };

        let mut links = Vec::new();
        for (position, property) in bean.properties().iter().enumerate() {
            let (ReferenceRole::Forward(reference), Some(target)) =
                (property.role(), property.reference_target())
            else {
                continue;
            };
            let target = table.get(target).ok_or_else(|| {
                BindError::definition(
                    bean.type_name(),
                    format!("reference target of `{}` was never built", property.name()),
                )
            })?;
            // A missing back reference surfaces when a child is actually assigned
            let Some(back) = target.back_reference(reference) else {
                continue;
            };
            let assignable = back
                .ty()
                .raw_name()
                .is_some_and(|name| self.introspector.is_assignable(name, bean.type_name()));
            if !assignable {
                return Err(BindError::definition(
                    bean.type_name(),
                    format!(
                        "back reference `{}` of type `{}` cannot hold a `{}`",
                        back.name(),
                        back.ty(),
                        bean.type_name()
                    ),
                ));
            }
            links.push((
                position,
                ManagedLink {
                    back_property: back.name().to_string(),
                    accessor: back.accessor().clone(),
                },
            ));
        }
        Ok((!links.is_empty()).then_some(links))
    }

    fn apply_resolution(&self, binder: &mut ReadBinder, links: Self::Resolution) {
        if let ReadBinder::Bean(bean) = binder {
            for (position, link) in links {
                bean.link(position, link);
            }
        }
    }
}
