//! In-memory value graph produced by the read path and consumed by the write path.
//!
//! Every bean value is an [`Instance`] owned by an [`ObjectGraph`] arena.
//! Edges between beans are arena indices: `Value::Object` for the owning
//! direction and `Value::BackRef` for the reciprocal, non-owning direction.

use id_arena::{Arena, Id};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::ops::{Index, IndexMut};
use std::sync::Arc;

/// Arena handle of an [`Instance`]
pub type ObjectId = Id<Instance>;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    Enum(String),
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Tree(serde_json::Value),
    Object(ObjectId),
    BackRef(ObjectId),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Empty strings, containers and null count as empty
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Map(entries) => entries.is_empty(),
            Value::Tree(serde_json::Value::Null) => true,
            _ => false,
        }
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Value::Object(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(i64::from(*v)),
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(f64::from(*v)),
            Value::Long(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Short name of the variant, used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Enum(_) => "enum",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Tree(_) => "tree",
            Value::Object(_) => "object",
            Value::BackRef(_) => "back reference",
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Long(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

/// A bean value: runtime type name plus named field slots
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    type_name: Arc<str>,
    fields: IndexMap<String, Value>,
    extras: IndexMap<String, Value>,
}

impl Instance {
    pub fn new(type_name: impl Into<Arc<str>>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: IndexMap::new(),
            extras: IndexMap::new(),
        }
    }

    /// Builder-style field assignment
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn type_name_arc(&self) -> &Arc<str> {
        &self.type_name
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.shift_remove(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Values captured by a catch-all handler
    pub fn extras(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.extras.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn extra(&self, name: &str) -> Option<&Value> {
        self.extras.get(name)
    }

    pub fn set_extra(&mut self, name: impl Into<String>, value: Value) {
        self.extras.insert(name.into(), value);
    }
}

/// Arena owning every instance reachable from a decoded value
#[derive(Debug, Default, Clone)]
pub struct ObjectGraph {
    arena: Arena<Instance>,
}

impl ObjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, instance: Instance) -> ObjectId {
        self.arena.alloc(instance)
    }

    pub fn get(&self, id: ObjectId) -> Option<&Instance> {
        self.arena.get(id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Instance> {
        self.arena.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &Instance)> {
        self.arena.iter()
    }
}

impl Index<ObjectId> for ObjectGraph {
    type Output = Instance;

    fn index(&self, id: ObjectId) -> &Instance {
        &self.arena[id]
    }
}

impl IndexMut<ObjectId> for ObjectGraph {
    fn index_mut(&mut self, id: ObjectId) -> &mut Instance {
        &mut self.arena[id]
    }
}

/// A decoded root value together with the graph that owns its instances
#[derive(Debug, Default, Clone)]
pub struct Document {
    graph: ObjectGraph,
    root: Value,
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Document {
    pub fn new(graph: ObjectGraph, root: Value) -> Self {
        Self { graph, root }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn graph(&self) -> &ObjectGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut ObjectGraph {
        &mut self.graph
    }

    pub fn into_parts(self) -> (ObjectGraph, Value) {
        (self.graph, self.root)
    }

    /// Instance behind the root value, if the root is a bean
    pub fn root_instance(&self) -> Option<&Instance> {
        self.root.as_object().and_then(|id| self.graph.get(id))
    }

    /// Follow a field chain from the root, e.g. `["children", "0", "name"]`
    pub fn lookup(&self, path: &[&str]) -> Option<&Value> {
        let mut current = &self.root;
        for step in path {
            current = match current {
                Value::Object(id) | Value::BackRef(id) => self.graph.get(*id)?.get(step)?,
                Value::List(items) => items.get(step.parse::<usize>().ok()?)?,
                Value::Map(entries) => entries
                    .iter()
                    .find(|(k, _)| k.as_str() == Some(step))
                    .map(|(_, v)| v)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Structural equality that follows object edges.
    ///
    /// Instances are matched pairwise on first visit, so shared and cyclic
    /// references compare by shape rather than by arena index.
    pub fn structurally_eq(&self, other: &Document) -> bool {
        let mut matched = FxHashMap::default();
        values_eq(self, &self.root, other, &other.root, &mut matched)
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.structurally_eq(other)
    }
}

fn values_eq(
    left: &Document,
    a: &Value,
    right: &Document,
    b: &Value,
    matched: &mut FxHashMap<ObjectId, ObjectId>,
) -> bool {
    match (a, b) {
        (Value::Object(x), Value::Object(y)) | (Value::BackRef(x), Value::BackRef(y)) => {
            if let Some(seen) = matched.get(x) {
                return seen == y;
            }
            matched.insert(*x, *y);
            let (Some(ia), Some(ib)) = (left.graph.get(*x), right.graph.get(*y)) else {
                return false;
            };
            ia.type_name == ib.type_name
                && slots_eq(left, &ia.fields, right, &ib.fields, matched)
                && slots_eq(left, &ia.extras, right, &ib.extras, matched)
        }
        (Value::List(xs), Value::List(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys)
                    .all(|(x, y)| values_eq(left, x, right, y, matched))
        }
        (Value::Map(xs), Value::Map(ys)) => {
            xs.len() == ys.len()
                && xs.iter().zip(ys).all(|((kx, vx), (ky, vy))| {
                    values_eq(left, kx, right, ky, matched) && values_eq(left, vx, right, vy, matched)
                })
        }
        _ => a == b,
    }
}

fn slots_eq(
    left: &Document,
    a: &IndexMap<String, Value>,
    right: &Document,
    b: &IndexMap<String, Value>,
    matched: &mut FxHashMap<ObjectId, ObjectId>,
) -> bool {
    a.len() == b.len()
        && a.iter().all(|(name, va)| match b.get(name) {
            Some(vb) => values_eq(left, va, right, vb, matched),
            None => false,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(child_names: &[&str]) -> Document {
        let mut graph = ObjectGraph::new();
        let parent = graph.insert(Instance::new("Parent"));
        let mut children = Vec::new();
        for name in child_names {
            let child = graph.insert(
                Instance::new("Child")
                    .with("name", *name)
                    .with("parent", Value::BackRef(parent)),
            );
            children.push(Value::Object(child));
        }
        graph[parent].set("children", Value::List(children));
        Document::new(graph, Value::Object(parent))
    }

    #[test]
    fn test_structural_equality_follows_cycles() {
        assert_eq!(family(&["a", "b"]), family(&["a", "b"]));
        assert_ne!(family(&["a", "b"]), family(&["a", "c"]));
        assert_ne!(family(&["a"]), family(&["a", "b"]));
    }

    #[test]
    fn test_lookup_walks_fields_and_indices() {
        let doc = family(&["x", "y"]);
        assert_eq!(
            doc.lookup(&["children", "1", "name"]),
            Some(&Value::String("y".into()))
        );
        let back = doc.lookup(&["children", "0", "parent"]).unwrap();
        assert_eq!(back, &Value::BackRef(doc.root().as_object().unwrap()));
    }

    #[test]
    fn test_empty_values() {
        assert!(Value::Null.is_empty());
        assert!(Value::List(vec![]).is_empty());
        assert!(Value::String(String::new()).is_empty());
        assert!(!Value::Int(0).is_empty());
    }

    #[test]
    fn test_extras_are_separate_from_fields() {
        let mut instance = Instance::new("Bag").with("declared", 1);
        instance.set_extra("dynamic", Value::Bool(true));

        assert_eq!(instance.fields().count(), 1);
        assert_eq!(instance.extra("dynamic"), Some(&Value::Bool(true)));
        assert!(instance.get("dynamic").is_none());
    }
}
