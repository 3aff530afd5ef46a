//! The assembly graph: blocks as nodes, contacts as edges.

use std::collections::BTreeMap;

use nalgebra::{Matrix4, Point3};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::block::Block;
use crate::error::{AssemblyError, AssemblyResult};
use crate::interface::Interface;

/// Identifier of a node in an [`Assembly`].
pub type NodeId = usize;

/// Caller-defined attributes attached to nodes and edges.
pub type Attributes = BTreeMap<String, Value>;

/// A block in the assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub block: Block,

    /// Boundary condition marker: supports are fixed in place.
    #[serde(default)]
    pub is_support: bool,

    #[serde(default)]
    pub attributes: Attributes,
}

/// Contact between two blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Contact polygons, in detection order.
    #[serde(default)]
    pub interfaces: Vec<Interface>,

    #[serde(default)]
    pub attributes: Attributes,
}

/// Canonical key of the unordered pair `{a, b}`.
#[inline]
pub fn edge_key(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// A graph of blocks and their contact interfaces.
///
/// Every edge joins two distinct existing nodes, and each unordered pair has
/// at most one edge; multiple contacts between the same two blocks live in
/// that edge's interface list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "AssemblyData", try_from = "AssemblyData")]
pub struct Assembly {
    nodes: BTreeMap<NodeId, Node>,
    edges: BTreeMap<(NodeId, NodeId), Edge>,
    next_id: NodeId,
}

impl Assembly {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a block and return its node id. Ids are never reused.
    pub fn add_block(&mut self, block: Block, is_support: bool) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                block,
                is_support,
                attributes: Attributes::new(),
            },
        );
        id
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn block(&self, id: NodeId) -> Option<&Block> {
        self.nodes.get(&id).map(|n| &n.block)
    }

    /// Node ids in ascending order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.nodes.iter().map(|(&id, node)| (id, node))
    }

    /// Blocks in ascending node id order.
    pub fn blocks(&self) -> impl Iterator<Item = (NodeId, &Block)> + '_ {
        self.nodes.iter().map(|(&id, node)| (id, &node.block))
    }

    /// Vertex-average centroid of every block, in ascending node id order.
    pub fn centroids(&self) -> Vec<(NodeId, Point3<f64>)> {
        self.blocks().map(|(id, b)| (id, b.centroid())).collect()
    }

    // ------------------------------------------------------------------------
    // Supports and attributes
    // ------------------------------------------------------------------------

    pub fn is_support(&self, id: NodeId) -> bool {
        self.nodes.get(&id).is_some_and(|n| n.is_support)
    }

    /// Ids of all support nodes, ascending.
    pub fn supports(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.is_support)
            .map(|(&id, _)| id)
            .collect()
    }

    pub fn set_support(&mut self, id: NodeId, is_support: bool) -> AssemblyResult<()> {
        self.require_node_mut(id)?.is_support = is_support;
        Ok(())
    }

    pub fn clear_supports(&mut self) {
        for node in self.nodes.values_mut() {
            node.is_support = false;
        }
    }

    pub fn set_attribute(
        &mut self,
        id: NodeId,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> AssemblyResult<()> {
        self.require_node_mut(id)?
            .attributes
            .insert(key.into(), value.into());
        Ok(())
    }

    pub fn attribute(&self, id: NodeId, key: &str) -> Option<&Value> {
        self.nodes.get(&id).and_then(|n| n.attributes.get(key))
    }

    fn require_node_mut(&mut self, id: NodeId) -> AssemblyResult<&mut Node> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| AssemblyError::consistency(format!("node {} does not exist", id)))
    }

    fn require_pair(&self, a: NodeId, b: NodeId) -> AssemblyResult<(NodeId, NodeId)> {
        if a == b {
            return Err(AssemblyError::consistency(format!(
                "cannot connect node {} to itself",
                a
            )));
        }
        for id in [a, b] {
            if !self.nodes.contains_key(&id) {
                return Err(AssemblyError::consistency(format!(
                    "node {} does not exist",
                    id
                )));
            }
        }
        Ok(edge_key(a, b))
    }

    // ------------------------------------------------------------------------
    // Edges and interfaces
    // ------------------------------------------------------------------------

    pub fn has_edge(&self, a: NodeId, b: NodeId) -> bool {
        self.edges.contains_key(&edge_key(a, b))
    }

    pub fn edge(&self, a: NodeId, b: NodeId) -> Option<&Edge> {
        self.edges.get(&edge_key(a, b))
    }

    pub fn edge_mut(&mut self, a: NodeId, b: NodeId) -> Option<&mut Edge> {
        self.edges.get_mut(&edge_key(a, b))
    }

    /// Edges keyed by `(smaller id, larger id)`, in ascending key order.
    pub fn edges(&self) -> impl Iterator<Item = ((NodeId, NodeId), &Edge)> + '_ {
        self.edges.iter().map(|(&key, edge)| (key, edge))
    }

    /// Interfaces on edge `{a, b}`; empty if there is no edge.
    pub fn interfaces(&self, a: NodeId, b: NodeId) -> &[Interface] {
        self.edges
            .get(&edge_key(a, b))
            .map(|e| e.interfaces.as_slice())
            .unwrap_or(&[])
    }

    /// Nodes sharing an edge with `id`, ascending.
    pub fn neighbors(&self, id: NodeId) -> Vec<NodeId> {
        let mut result: Vec<NodeId> = self
            .edges
            .keys()
            .filter_map(|&(u, v)| {
                if u == id {
                    Some(v)
                } else if v == id {
                    Some(u)
                } else {
                    None
                }
            })
            .collect();
        result.sort_unstable();
        result
    }

    /// Append interfaces to edge `{a, b}`, creating the edge if needed.
    ///
    /// # Errors
    /// [`AssemblyError::Consistency`] if either node is missing or `a == b`.
    pub fn attach_interfaces(
        &mut self,
        a: NodeId,
        b: NodeId,
        interfaces: Vec<Interface>,
    ) -> AssemblyResult<()> {
        let key = self.require_pair(a, b)?;
        self.edges
            .entry(key)
            .or_default()
            .interfaces
            .extend(interfaces);
        Ok(())
    }

    /// Replace the interface list of edge `{a, b}`, creating the edge if needed.
    pub fn replace_interfaces(
        &mut self,
        a: NodeId,
        b: NodeId,
        interfaces: Vec<Interface>,
    ) -> AssemblyResult<()> {
        let key = self.require_pair(a, b)?;
        self.edges.entry(key).or_default().interfaces = interfaces;
        Ok(())
    }

    pub fn remove_edge(&mut self, a: NodeId, b: NodeId) -> Option<Edge> {
        self.edges.remove(&edge_key(a, b))
    }

    /// Remove every edge, keeping the blocks.
    pub fn clear_interfaces(&mut self) {
        self.edges.clear();
    }

    /// Total number of interfaces across all edges.
    pub fn interface_count(&self) -> usize {
        self.edges.values().map(|e| e.interfaces.len()).sum()
    }

    /// Total number of interface corner points across all edges.
    pub fn interface_point_count(&self) -> usize {
        self.edges
            .values()
            .flat_map(|e| &e.interfaces)
            .map(|i| i.points.len())
            .sum()
    }

    // ------------------------------------------------------------------------
    // Transformations
    // ------------------------------------------------------------------------

    /// Transform every block in place.
    ///
    /// Interfaces are left as they are; re-run detection to refresh them.
    pub fn transform(&mut self, matrix: &Matrix4<f64>) {
        for node in self.nodes.values_mut() {
            node.block.transform(matrix);
        }
    }

    /// Transformed copy of the assembly.
    pub fn transformed(&self, matrix: &Matrix4<f64>) -> Self {
        let mut assembly = self.clone();
        assembly.transform(matrix);
        assembly
    }
}

// ============================================================================
// Serialized form
// ============================================================================

/// A node with its id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub node: Node,
}

/// An edge with its endpoint ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub u: NodeId,
    pub v: NodeId,
    pub edge: Edge,
}

/// Flat serialized representation of an [`Assembly`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssemblyData {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub edges: Vec<EdgeRecord>,
}

impl From<Assembly> for AssemblyData {
    fn from(assembly: Assembly) -> Self {
        Self {
            nodes: assembly
                .nodes
                .into_iter()
                .map(|(id, node)| NodeRecord { id, node })
                .collect(),
            edges: assembly
                .edges
                .into_iter()
                .map(|((u, v), edge)| EdgeRecord { u, v, edge })
                .collect(),
        }
    }
}

impl TryFrom<AssemblyData> for Assembly {
    type Error = AssemblyError;

    fn try_from(data: AssemblyData) -> AssemblyResult<Self> {
        let mut nodes = BTreeMap::new();
        for record in data.nodes {
            if nodes.insert(record.id, record.node).is_some() {
                return Err(AssemblyError::consistency(format!(
                    "duplicate node id {}",
                    record.id
                )));
            }
        }

        let next_id = nodes.keys().next_back().map_or(0, |&id| id + 1);
        let mut assembly = Self {
            nodes,
            edges: BTreeMap::new(),
            next_id,
        };

        for record in data.edges {
            let key = assembly.require_pair(record.u, record.v)?;
            if assembly.edges.insert(key, record.edge).is_some() {
                return Err(AssemblyError::consistency(format!(
                    "duplicate edge ({}, {})",
                    key.0, key.1
                )));
            }
        }

        Ok(assembly)
    }
}
