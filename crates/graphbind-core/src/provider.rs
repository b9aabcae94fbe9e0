//! Process-wide binder cache.
//!
//! Binders live in an append-only slot arena and are addressed by
//! [`BinderId`]. Construction is serialized by a single mutex: a session
//! allocates a slot and registers it as in progress *before* the factory
//! recurses into nested types, so a self-referential type sees its own id.
//! Slots are filled and published only when the outermost call completes;
//! until then nothing built by the session is reachable from the cache.

use crate::binder::BinderId;
use crate::errors::{BindError, Result};
use crate::types::TypeDescriptor;
use dashmap::DashMap;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, trace};

/// Strategy used by a [`BinderProvider`] to build binders
pub trait BinderFactory: Send + Sync + Sized {
    type Binder: Send + Sync;
    /// Use-site handle to a binder, e.g. a binder id plus a polymorphic resolver
    type Binding: Clone + Send + Sync;
    /// Links computed once every binder of a session exists
    type Resolution;

    fn build(
        &self,
        session: &mut ConstructionSession<'_, Self>,
        ty: &TypeDescriptor,
    ) -> Result<Self::Binder>;

    fn bind(
        &self,
        session: &mut ConstructionSession<'_, Self>,
        ty: &TypeDescriptor,
    ) -> Result<Self::Binding>;

    /// Inspect a freshly built binder against every binder visible to the session
    fn plan_resolution(
        &self,
        binder: &Self::Binder,
        table: &BinderTable<'_, Self::Binder>,
    ) -> Result<Option<Self::Resolution>>;

    fn apply_resolution(&self, binder: &mut Self::Binder, resolution: Self::Resolution);
}

struct BuiltBinder<B> {
    id: BinderId,
    ty: TypeDescriptor,
    cacheable: bool,
    binder: B,
}

struct ConstructionState<B> {
    in_progress: FxHashMap<TypeDescriptor, BinderId>,
    built: Vec<BuiltBinder<B>>,
}

impl<B> Default for ConstructionState<B> {
    fn default() -> Self {
        Self {
            in_progress: FxHashMap::default(),
            built: Vec::new(),
        }
    }
}

/// Lookup over binders built in the current session and already published ones
pub struct BinderTable<'a, B> {
    pending: FxHashMap<BinderId, &'a B>,
    published: &'a [Option<Arc<B>>],
}

impl<'a, B> BinderTable<'a, B> {
    pub fn get(&self, id: BinderId) -> Option<&'a B> {
        self.pending.get(&id).copied().or_else(|| {
            self.published
                .get(id.index())
                .and_then(|slot| slot.as_deref())
        })
    }
}

pub struct BinderProvider<F: BinderFactory> {
    factory: F,
    published: DashMap<TypeDescriptor, BinderId>,
    bindings: DashMap<TypeDescriptor, F::Binding>,
    slots: RwLock<Vec<Option<Arc<F::Binder>>>>,
    construction: Mutex<ConstructionState<F::Binder>>,
}

impl<F: BinderFactory> BinderProvider<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            published: DashMap::new(),
            bindings: DashMap::new(),
            slots: RwLock::new(Vec::new()),
            construction: Mutex::new(ConstructionState::default()),
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Binder id for a type, building it (and everything it needs) on a miss
    pub fn resolve(&self, ty: &TypeDescriptor) -> Result<BinderId> {
        if !ty.has_handlers() {
            if let Some(id) = self.published.get(ty).map(|entry| *entry) {
                trace!(ty = %ty, id = %id, "binder cache hit");
                return Ok(id);
            }
        }
        let mut session = self.session();
        let result = session.resolve(ty);
        session.finish(result)
    }

    /// Use-site binding for a type
    pub fn binding(&self, ty: &TypeDescriptor) -> Result<F::Binding> {
        let cacheable = !ty.has_handlers();
        if cacheable {
            if let Some(binding) = self.bindings.get(ty) {
                return Ok(binding.clone());
            }
        }
        let mut session = self.session();
        let result = session.bind(ty);
        let binding = session.finish(result)?;
        if cacheable {
            self.bindings
                .entry(ty.clone())
                .or_insert_with(|| binding.clone());
        }
        Ok(binding)
    }

    /// Published binder behind an id
    pub fn get(&self, id: BinderId) -> Option<Arc<F::Binder>> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id.index())
            .and_then(Clone::clone)
    }

    /// Resolve and fetch in one step
    pub fn binder(&self, ty: &TypeDescriptor) -> Result<Arc<F::Binder>> {
        let id = self.resolve(ty)?;
        self.get(id)
            .ok_or_else(|| BindError::definition(ty, format!("binder {} is not published", id)))
    }

    /// Number of binders published so far
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|slot| slot.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_published(&self, ty: &TypeDescriptor) -> bool {
        self.published.contains_key(ty)
    }

    /// Entries left in the in-progress table; zero whenever no construction runs
    pub fn in_progress_len(&self) -> usize {
        self.lock_construction().in_progress.len()
    }

    fn lock_construction(&self) -> MutexGuard<'_, ConstructionState<F::Binder>> {
        self.construction
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn session(&self) -> ConstructionSession<'_, F> {
        let state = self.lock_construction();
        let base = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        ConstructionSession {
            provider: self,
            state,
            base,
        }
    }

    fn allocate_slot(&self) -> BinderId {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        slots.push(None);
        BinderId::from_index(slots.len() - 1)
    }
}

/// Exclusive access to binder construction for one outermost call
pub struct ConstructionSession<'p, F: BinderFactory> {
    provider: &'p BinderProvider<F>,
    state: MutexGuard<'p, ConstructionState<F::Binder>>,
    base: usize,
}

impl<'p, F: BinderFactory> ConstructionSession<'p, F> {
    /// Binder id for a type: published, in progress, or freshly built
    pub fn resolve(&mut self, ty: &TypeDescriptor) -> Result<BinderId> {
        let cacheable = !ty.has_handlers();
        if cacheable {
            if let Some(id) = self.provider.published.get(ty) {
                return Ok(*id);
            }
            if let Some(&id) = self.state.in_progress.get(ty) {
                trace!(ty = %ty, id = %id, "binder in progress");
                return Ok(id);
            }
        }

        let id = self.provider.allocate_slot();
        if cacheable {
            self.state.in_progress.insert(ty.clone(), id);
        }
        debug!(ty = %ty, id = %id, "building binder");

        let provider = self.provider;
        let binder = provider.factory.build(self, ty)?;
        self.state.built.push(BuiltBinder {
            id,
            ty: ty.clone(),
            cacheable,
            binder,
        });
        Ok(id)
    }

    pub fn bind(&mut self, ty: &TypeDescriptor) -> Result<F::Binding> {
        let provider = self.provider;
        provider.factory.bind(self, ty)
    }

    fn finish<T>(mut self, result: Result<T>) -> Result<T> {
        match result.and_then(|value| self.publish().map(|()| value)) {
            Ok(value) => Ok(value),
            Err(err) => {
                self.abort();
                Err(err)
            }
        }
    }

    fn publish(&mut self) -> Result<()> {
        let built = std::mem::take(&mut self.state.built);
        if built.is_empty() {
            return Ok(());
        }
        let factory = &self.provider.factory;

        let plans = {
            let slots = self
                .provider
                .slots
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            let table = BinderTable {
                pending: built.iter().map(|b| (b.id, &b.binder)).collect(),
                published: slots.as_slice(),
            };
            built
                .iter()
                .map(|b| factory.plan_resolution(&b.binder, &table))
                .collect::<Result<Vec<_>>>()?
        };

        let count = built.len();
        let mut slots = self
            .provider
            .slots
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for (mut entry, plan) in built.into_iter().zip(plans) {
            if let Some(plan) = plan {
                factory.apply_resolution(&mut entry.binder, plan);
            }
            if let Some(slot) = slots.get_mut(entry.id.index()) {
                *slot = Some(Arc::new(entry.binder));
            }
            if entry.cacheable {
                self.provider.published.entry(entry.ty).or_insert(entry.id);
            }
        }
        drop(slots);

        self.state.in_progress.clear();
        debug!(binders = count, "published binders");
        Ok(())
    }

    fn abort(&mut self) {
        self.state.in_progress.clear();
        self.state.built.clear();
        self.provider
            .slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .truncate(self.base);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeKind;

    /// Toy factory: a binder is the list of child ids of a named type
    struct GraphFactory {
        edges: FxHashMap<&'static str, Vec<&'static str>>,
    }

    #[derive(Debug)]
    struct Node {
        children: Vec<BinderId>,
        resolved: bool,
    }

    impl BinderFactory for GraphFactory {
        type Binder = Node;
        type Binding = BinderId;
        type Resolution = ();

        fn build(
            &self,
            session: &mut ConstructionSession<'_, Self>,
            ty: &TypeDescriptor,
        ) -> Result<Node> {
            let TypeKind::Named { name, .. } = ty.kind() else {
                return Err(BindError::definition(ty, "not named"));
            };
            let edges = self
                .edges
                .get(&**name)
                .ok_or_else(|| BindError::definition(ty, "unknown"))?;
            let children = edges
                .iter()
                .map(|child| session.resolve(&TypeDescriptor::named(*child)))
                .collect::<Result<Vec<_>>>()?;
            Ok(Node {
                children,
                resolved: false,
            })
        }

        fn bind(
            &self,
            session: &mut ConstructionSession<'_, Self>,
            ty: &TypeDescriptor,
        ) -> Result<BinderId> {
            session.resolve(ty)
        }

        fn plan_resolution(&self, node: &Node, table: &BinderTable<'_, Node>) -> Result<Option<()>> {
            if node.children.iter().all(|id| table.get(*id).is_some()) {
                Ok(Some(()))
            } else {
                Err(BindError::definition("node", "dangling child"))
            }
        }

        fn apply_resolution(&self, node: &mut Node, _: ()) {
            node.resolved = true;
        }
    }

    fn provider(edges: &[(&'static str, &[&'static str])]) -> BinderProvider<GraphFactory> {
        BinderProvider::new(GraphFactory {
            edges: edges.iter().map(|(k, v)| (*k, v.to_vec())).collect(),
        })
    }

    #[test]
    fn test_mutual_recursion_resolves() {
        let provider = provider(&[("A", &["B"]), ("B", &["A", "B"])]);
        let a = provider.resolve(&TypeDescriptor::named("A")).unwrap();
        let b = provider.resolve(&TypeDescriptor::named("B")).unwrap();

        let node_a = provider.get(a).unwrap();
        let node_b = provider.get(b).unwrap();
        assert_eq!(node_a.children, vec![b]);
        assert_eq!(node_b.children, vec![a, b]);
        assert!(node_a.resolved && node_b.resolved);
        assert_eq!(provider.in_progress_len(), 0);
        assert_eq!(provider.len(), 2);
    }

    #[test]
    fn test_same_type_maps_to_same_binder() {
        let provider = provider(&[("A", &[])]);
        let first = provider.resolve(&TypeDescriptor::named("A")).unwrap();
        let second = provider.resolve(&TypeDescriptor::named("A")).unwrap();
        assert_eq!(first, second);
        assert!(provider.is_published(&TypeDescriptor::named("A")));
    }

    #[test]
    fn test_failed_construction_publishes_nothing() {
        let provider = provider(&[("A", &["B", "Missing"]), ("B", &[])]);
        assert!(provider.resolve(&TypeDescriptor::named("A")).is_err());

        assert!(!provider.is_published(&TypeDescriptor::named("A")));
        assert!(!provider.is_published(&TypeDescriptor::named("B")));
        assert_eq!(provider.in_progress_len(), 0);
        assert!(provider.is_empty());

        // The same provider still works afterwards
        let b = provider.resolve(&TypeDescriptor::named("B")).unwrap();
        assert_eq!(b.index(), 0);
    }

    #[test]
    fn test_concurrent_resolution_agrees() {
        use rayon::prelude::*;

        let provider = provider(&[("A", &["B"]), ("B", &["A"])]);
        let ids: Vec<BinderId> = (0..32)
            .into_par_iter()
            .map(|i| {
                let name = if i % 2 == 0 { "A" } else { "B" };
                provider.resolve(&TypeDescriptor::named(name)).unwrap()
            })
            .collect();

        let a = provider.resolve(&TypeDescriptor::named("A")).unwrap();
        assert!(ids.iter().step_by(2).all(|id| *id == a));
        assert_eq!(provider.len(), 2);
    }
}
