//! Detachment: deep copies of live object graphs.
//!
//! # Responsibility
//! - Copy a live object and everything reachable from it into a plain value.
//! - Preserve shared references and cycles of the source graph.
//!
//! # Invariants
//! - A `DetachedObject` holds no handle, connection or live object; it is
//!   `Send + Sync` and stays readable after its source store closes.
//! - Each source object is copied once per detach call; repeated references
//!   resolve to the same detached node.
//! - Nodes are numbered in breadth-first discovery order from the root, so
//!   detaching a detached graph reproduces it exactly.

use crate::error::{StoreError, StoreResult};
use crate::model::id::ObjectId;
use crate::model::schema::PropertyKind;
use crate::model::value::Value;
use crate::store::{ObjectRef, Results};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::hash::Hash;

/// Index of a node inside one `DetachedObject`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Property value read from a detachment source.
pub enum Field<N> {
    Value(Value),
    List(Vec<Value>),
    One(Option<N>),
    Many(Vec<N>),
}

/// Object graph that can be walked by `detach`.
pub trait Detachable: Clone {
    /// Identity of a source object within one walk.
    type Identity: Eq + Hash;
    type Error;

    fn identity(&self) -> Self::Identity;

    fn source_id(&self) -> ObjectId;

    /// Declared properties with their current values, in declaration order.
    fn fields(&self) -> Result<Vec<(String, Field<Self>)>, Self::Error>;
}

/// Property value of a detached node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "of", rename_all = "snake_case")]
pub enum DetachedField {
    Value(Value),
    List(Vec<Value>),
    One(Option<NodeId>),
    Many(Vec<NodeId>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetachedNode {
    id: ObjectId,
    fields: Vec<(String, DetachedField)>,
}

impl DetachedNode {
    fn new(id: ObjectId) -> Self {
        Self {
            id,
            fields: Vec::new(),
        }
    }

    pub fn object_id(&self) -> &ObjectId {
        &self.id
    }

    pub fn kind(&self) -> &str {
        &self.id.kind
    }

    pub fn key(&self) -> &str {
        &self.id.key
    }

    /// Fields in the order they were read or set.
    pub fn fields(&self) -> &[(String, DetachedField)] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&DetachedField> {
        self.fields
            .iter()
            .find(|(field_name, _)| field_name == name)
            .map(|(_, field)| field)
    }

    fn put(&mut self, name: &str, field: DetachedField) {
        match self.fields.iter_mut().find(|(field_name, _)| field_name == name) {
            Some((_, existing)) => *existing = field,
            None => self.fields.push((name.to_string(), field)),
        }
    }
}

/// Free-standing copy of an object graph.
///
/// Nodes live in an arena; relationships are `NodeId` indices, so cycles need
/// no shared ownership.
///
/// Deserialization rejects graphs whose root or links name missing nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDetachedObject")]
pub struct DetachedObject {
    nodes: Vec<DetachedNode>,
    root: NodeId,
}

#[derive(Deserialize)]
struct RawDetachedObject {
    nodes: Vec<DetachedNode>,
    root: NodeId,
}

impl TryFrom<RawDetachedObject> for DetachedObject {
    type Error = StoreError;

    fn try_from(raw: RawDetachedObject) -> StoreResult<Self> {
        let graph = Self {
            nodes: raw.nodes,
            root: raw.root,
        };
        graph.check_links()?;
        Ok(graph)
    }
}

impl DetachedObject {
    /// New graph with one empty root object.
    pub fn new(kind: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            nodes: vec![DetachedNode::new(ObjectId::new(kind, key))],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn root_ref(&self) -> DetachedRef<'_> {
        self.node_ref(self.root)
    }

    pub fn kind(&self) -> &str {
        self.node(self.root).kind()
    }

    pub fn key(&self) -> &str {
        self.node(self.root).key()
    }

    pub fn nodes(&self) -> &[DetachedNode] {
        &self.nodes
    }

    /// # Panics
    /// Panics when `id` does not belong to this graph.
    pub fn node(&self, id: NodeId) -> &DetachedNode {
        &self.nodes[id.0]
    }

    /// # Panics
    /// Panics when `id` does not belong to this graph.
    pub fn node_ref(&self, id: NodeId) -> DetachedRef<'_> {
        assert!(id.0 < self.nodes.len(), "node {} is not in this graph", id.0);
        DetachedRef { graph: self, id }
    }

    /// Finds the node copied from `kind[key]`.
    pub fn find(&self, kind: &str, key: &str) -> Option<DetachedRef<'_>> {
        self.nodes
            .iter()
            .position(|node| node.id.kind == kind && node.id.key == key)
            .map(|index| DetachedRef {
                graph: self,
                id: NodeId(index),
            })
    }

    /// Adds an unlinked node to the arena.
    pub fn add_node(&mut self, kind: impl Into<String>, key: impl Into<String>) -> NodeId {
        self.nodes.push(DetachedNode::new(ObjectId::new(kind, key)));
        NodeId(self.nodes.len() - 1)
    }

    pub fn set(&mut self, node: NodeId, name: &str, value: impl Into<Value>) {
        self.nodes[node.0].put(name, DetachedField::Value(value.into()));
    }

    pub fn set_values(&mut self, node: NodeId, name: &str, values: Vec<Value>) {
        self.nodes[node.0].put(name, DetachedField::List(values));
    }

    pub fn set_link(&mut self, node: NodeId, name: &str, target: Option<NodeId>) {
        self.nodes[node.0].put(name, DetachedField::One(target));
    }

    /// Appends to a to-many field, creating it when absent.
    pub fn push_link(&mut self, node: NodeId, name: &str, target: NodeId) {
        let entry = &mut self.nodes[node.0];
        match entry.fields.iter_mut().find(|(field_name, _)| field_name == name) {
            Some((_, DetachedField::Many(targets))) => targets.push(target),
            _ => entry.put(name, DetachedField::Many(vec![target])),
        }
    }

    /// Fails when the root or any relationship names a node outside the arena.
    ///
    /// Ids taken from another graph can leave dangling links behind.
    pub fn check_links(&self) -> StoreResult<()> {
        let len = self.nodes.len();
        let dangling = |id: &NodeId| id.0 >= len;
        if dangling(&self.root) {
            return Err(StoreError::InvalidData(format!(
                "root node {} is not in a graph of {len} nodes",
                self.root.0
            )));
        }
        for node in &self.nodes {
            for (name, field) in &node.fields {
                let bad = match field {
                    DetachedField::One(target) => target.iter().find(|id| dangling(*id)),
                    DetachedField::Many(targets) => targets.iter().find(|id| dangling(*id)),
                    DetachedField::Value(_) | DetachedField::List(_) => None,
                };
                if let Some(id) = bad {
                    return Err(StoreError::InvalidData(format!(
                        "{}.{name} links to node {} outside a graph of {len} nodes",
                        node.id, id.0
                    )));
                }
            }
        }
        Ok(())
    }

    /// Copies the part of this graph reachable from the root.
    ///
    /// # Panics
    /// Panics when `check_links` would fail.
    pub fn detached(&self) -> DetachedObject {
        match detach(&self.root_ref()) {
            Ok(copy) => copy,
            Err(never) => match never {},
        }
    }
}

/// Read view of one node inside a `DetachedObject`.
#[derive(Debug, Clone, Copy)]
pub struct DetachedRef<'a> {
    graph: &'a DetachedObject,
    id: NodeId,
}

impl<'a> DetachedRef<'a> {
    pub fn node_id(&self) -> NodeId {
        self.id
    }

    pub fn object_id(&self) -> &'a ObjectId {
        &self.graph.node(self.id).id
    }

    pub fn kind(&self) -> &'a str {
        self.graph.node(self.id).kind()
    }

    pub fn key(&self) -> &'a str {
        self.graph.node(self.id).key()
    }

    pub fn field(&self, name: &str) -> Option<&'a DetachedField> {
        self.graph.node(self.id).field(name)
    }

    pub fn get(&self, name: &str) -> Option<&'a Value> {
        match self.field(name)? {
            DetachedField::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn values(&self, name: &str) -> Option<&'a [Value]> {
        match self.field(name)? {
            DetachedField::List(values) => Some(values.as_slice()),
            _ => None,
        }
    }

    pub fn link(&self, name: &str) -> Option<DetachedRef<'a>> {
        match self.field(name)? {
            DetachedField::One(Some(target)) => Some(self.graph.node_ref(*target)),
            _ => None,
        }
    }

    pub fn links(&self, name: &str) -> Vec<DetachedRef<'a>> {
        match self.field(name) {
            Some(DetachedField::Many(targets)) => targets
                .iter()
                .map(|target| self.graph.node_ref(*target))
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl Detachable for DetachedRef<'_> {
    type Identity = NodeId;
    type Error = Infallible;

    fn identity(&self) -> NodeId {
        self.id
    }

    fn source_id(&self) -> ObjectId {
        self.graph.node(self.id).id.clone()
    }

    fn fields(&self) -> Result<Vec<(String, Field<Self>)>, Infallible> {
        let fields = self
            .graph
            .node(self.id)
            .fields
            .iter()
            .map(|(name, field)| {
                let field = match field {
                    DetachedField::Value(value) => Field::Value(value.clone()),
                    DetachedField::List(values) => Field::List(values.clone()),
                    DetachedField::One(target) => {
                        Field::One(target.map(|target| self.graph.node_ref(target)))
                    }
                    DetachedField::Many(targets) => Field::Many(
                        targets
                            .iter()
                            .map(|target| self.graph.node_ref(*target))
                            .collect(),
                    ),
                };
                (name.clone(), field)
            })
            .collect();
        Ok(fields)
    }
}

impl Detachable for ObjectRef {
    type Identity = ObjectId;
    type Error = StoreError;

    fn identity(&self) -> ObjectId {
        self.id().clone()
    }

    fn source_id(&self) -> ObjectId {
        self.id().clone()
    }

    fn fields(&self) -> StoreResult<Vec<(String, Field<Self>)>> {
        let schema = self.schema()?;
        let mut fields = Vec::with_capacity(schema.properties().len());
        for property in schema.properties() {
            let name = property.name.as_str();
            let field = match &property.kind {
                PropertyKind::Value(_) => Field::Value(self.get(name)?),
                PropertyKind::List(_) => Field::List(self.values(name)?),
                PropertyKind::ToOne(_) => Field::One(self.link(name)?),
                PropertyKind::ToMany(_) => Field::Many(self.links(name)?),
            };
            fields.push((property.name.clone(), field));
        }
        Ok(fields)
    }
}

impl ObjectRef {
    /// Deep copy of this object and everything reachable from it.
    pub fn detached(&self) -> StoreResult<DetachedObject> {
        detach(self)
    }
}

impl Results {
    /// Detaches every current member, each as its own graph.
    pub fn detached(&self) -> StoreResult<Vec<DetachedObject>> {
        detach_all(&self.to_vec()?)
    }
}

/// Detaches each source independently.
pub fn detach_all<'a, N>(sources: impl IntoIterator<Item = &'a N>) -> Result<Vec<DetachedObject>, N::Error>
where
    N: Detachable + 'a,
{
    sources.into_iter().map(detach).collect()
}

/// Copies `root` and everything reachable from it into a `DetachedObject`.
///
/// Sources are visited breadth-first with an explicit work list; an identity
/// map turns repeated references and cycles into shared node indices.
pub fn detach<N: Detachable>(root: &N) -> Result<DetachedObject, N::Error> {
    let mut walk = Walk {
        nodes: Vec::new(),
        seen: HashMap::new(),
        pending: VecDeque::new(),
    };
    let root = walk.claim(root);

    while let Some((target, source)) = walk.pending.pop_front() {
        for (name, field) in source.fields()? {
            let field = match field {
                Field::Value(value) => DetachedField::Value(value),
                Field::List(values) => DetachedField::List(values),
                Field::One(child) => DetachedField::One(child.map(|child| walk.claim(&child))),
                Field::Many(children) => {
                    DetachedField::Many(children.iter().map(|child| walk.claim(child)).collect())
                }
            };
            walk.nodes[target.0].fields.push((name, field));
        }
    }

    Ok(DetachedObject {
        nodes: walk.nodes,
        root,
    })
}

struct Walk<N: Detachable> {
    nodes: Vec<DetachedNode>,
    seen: HashMap<N::Identity, NodeId>,
    pending: VecDeque<(NodeId, N)>,
}

impl<N: Detachable> Walk<N> {
    /// Returns the node for `source`, allocating and queueing it on first sight.
    fn claim(&mut self, source: &N) -> NodeId {
        match self.seen.entry(source.identity()) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let id = NodeId(self.nodes.len());
                self.nodes.push(DetachedNode::new(source.source_id()));
                entry.insert(id);
                self.pending.push_back((id, source.clone()));
                id
            }
        }
    }
}
