use crate::binder::{BinderId, ReadBinder, WriteBinder};
use crate::config::{ReadOptions, WriteOptions};
use crate::errors::{BindError, Result};
use crate::mapper::Mapper;
use crate::value::{Instance, ObjectGraph, ObjectId, Value};
use std::sync::Arc;

/// State of one read call: the graph being built plus transient flags
pub struct DecodeContext<'m> {
    mapper: &'m Mapper,
    graph: ObjectGraph,
    lenient_unknown: bool,
    defaulted_arguments: usize,
}

impl<'m> DecodeContext<'m> {
    pub fn new(mapper: &'m Mapper) -> Self {
        Self {
            mapper,
            graph: ObjectGraph::new(),
            lenient_unknown: false,
            defaulted_arguments: 0,
        }
    }

    pub fn mapper(&self) -> &'m Mapper {
        self.mapper
    }

    pub fn read_options(&self) -> &'m ReadOptions {
        &self.mapper.config().read_options
    }

    pub fn graph(&self) -> &ObjectGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut ObjectGraph {
        &mut self.graph
    }

    pub fn insert(&mut self, instance: Instance) -> ObjectId {
        self.graph.insert(instance)
    }

    /// Published read binder behind an id
    pub fn binder(&self, id: BinderId) -> Result<Arc<ReadBinder>> {
        self.mapper
            .read_provider()
            .get(id)
            .ok_or_else(|| BindError::definition(id, "read binder is not published"))
    }

    /// Caller-supplied value registered under an injection id
    pub fn injectable(&self, id: &str) -> Result<Value> {
        self.mapper.injectable(id).cloned().ok_or_else(|| {
            BindError::Config(format!("no injectable value registered under `{}`", id))
        })
    }

    /// Consume the one-shot flag that makes the next bean skip unknown fields
    pub fn take_lenient_unknown(&mut self) -> bool {
        std::mem::take(&mut self.lenient_unknown)
    }

    pub fn set_lenient_unknown(&mut self, lenient: bool) {
        self.lenient_unknown = lenient;
    }

    pub(crate) fn record_defaulted(&mut self, count: usize) {
        self.defaulted_arguments += count;
    }

    /// Creator arguments filled with type defaults during this call
    pub fn defaulted_arguments(&self) -> usize {
        self.defaulted_arguments
    }

    pub fn into_graph(self) -> ObjectGraph {
        self.graph
    }
}

/// State of one write call: the source graph and the chain of open beans
pub struct EncodeContext<'a> {
    mapper: &'a Mapper,
    graph: &'a ObjectGraph,
    ancestors: Vec<ObjectId>,
}

impl<'a> EncodeContext<'a> {
    pub fn new(mapper: &'a Mapper, graph: &'a ObjectGraph) -> Self {
        Self {
            mapper,
            graph,
            ancestors: Vec::new(),
        }
    }

    pub fn mapper(&self) -> &'a Mapper {
        self.mapper
    }

    pub fn graph(&self) -> &'a ObjectGraph {
        self.graph
    }

    pub fn write_options(&self) -> &'a WriteOptions {
        &self.mapper.config().write_options
    }

    pub fn binder(&self, id: BinderId) -> Result<Arc<WriteBinder>> {
        self.mapper
            .write_provider()
            .get(id)
            .ok_or_else(|| BindError::definition(id, "write binder is not published"))
    }

    pub fn instance(&self, id: ObjectId) -> Result<&'a Instance> {
        self.graph
            .get(id)
            .ok_or_else(|| BindError::reference("object handle does not belong to the graph"))
    }

    /// Open a bean; `false` if it is already being written further up
    pub fn enter(&mut self, id: ObjectId) -> bool {
        if self.ancestors.contains(&id) {
            return false;
        }
        self.ancestors.push(id);
        true
    }

    pub fn leave(&mut self) {
        self.ancestors.pop();
    }

    pub fn depth(&self) -> usize {
        self.ancestors.len()
    }
}
