// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph state: nodes, their ports and the edges between them.

use crate::node::{Node, NodeId};
use crate::port::{PortError, PortKey, PortModel};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// DFS state of a node in [`GraphModel::topological_order`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// The mutable state every command operates on
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphModel {
    nodes: IndexMap<NodeId, Node>,
    acyclic: bool,
    extra: IndexMap<String, Value>,
}

impl GraphModel {
    /// Create an empty model
    pub fn new(acyclic: bool) -> Self {
        Self {
            nodes: IndexMap::new(),
            acyclic,
            extra: IndexMap::new(),
        }
    }

    /// Whether cycle-forming connections are refused
    pub fn acyclic(&self) -> bool {
        self.acyclic
    }

    pub(crate) fn set_acyclic(&mut self, acyclic: bool) {
        self.acyclic = acyclic;
    }

    pub(crate) fn insert_node(&mut self, node: Node, index: Option<usize>) {
        let id = node.id;
        match index {
            Some(index) if index < self.nodes.len() => {
                self.nodes.shift_insert(index, id, node);
            }
            _ => {
                self.nodes.insert(id, node);
            }
        }
    }

    pub(crate) fn take_node(&mut self, node_id: NodeId) -> Option<(usize, Node)> {
        self.nodes
            .shift_remove_full(&node_id)
            .map(|(index, _, node)| (index, node))
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.extra.clear();
    }

    /// Graph-level session fields this crate does not interpret
    pub fn extra(&self) -> &IndexMap<String, Value> {
        &self.extra
    }

    pub(crate) fn set_extra(&mut self, extra: IndexMap<String, Value>) {
        self.extra = extra;
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    pub(crate) fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Get all nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Look up a port
    pub fn port(&self, key: &PortKey) -> Option<&PortModel> {
        self.node(key.node)?.port(key.direction, &key.name)
    }

    pub(crate) fn port_mut(&mut self, key: &PortKey) -> Option<&mut PortModel> {
        self.node_mut(key.node)?.port_mut(key.direction, &key.name)
    }

    /// Peers of a port as keys; empty for unknown ports
    pub fn connected_ports(&self, key: &PortKey) -> Vec<PortKey> {
        self.port(key).map(|p| p.peers().collect()).unwrap_or_default()
    }

    /// Whether the edge `a`-`b` exists
    pub fn is_connected(&self, a: &PortKey, b: &PortKey) -> bool {
        self.port(a).is_some_and(|p| p.is_connected_to(b.node, &b.name))
    }

    /// Add the edge to both ports.
    ///
    /// Returns `false` without touching anything if either port is missing
    /// or the edge already exists.
    pub(crate) fn link(&mut self, a: &PortKey, b: &PortKey) -> bool {
        if self.port(a).is_none() || self.port(b).is_none() || self.is_connected(a, b) {
            return false;
        }
        if let Some(port) = self.port_mut(a) {
            port.add_connection(b.node, &b.name);
        }
        if let Some(port) = self.port_mut(b) {
            port.add_connection(a.node, &a.name);
        }
        true
    }

    /// Remove the edge from both ports. Returns `false` if it did not exist.
    pub(crate) fn unlink(&mut self, a: &PortKey, b: &PortKey) -> bool {
        if !self.is_connected(a, b) {
            return false;
        }
        if let Some(port) = self.port_mut(a) {
            port.remove_connection(b.node, &b.name);
        }
        if let Some(port) = self.port_mut(b) {
            port.remove_connection(a.node, &a.name);
        }
        true
    }

    /// Constraint check for a candidate edge, both directions
    pub fn connection_allowed(&self, source: &PortKey, target: &PortKey) -> bool {
        let (Some(source_node), Some(target_node)) = (self.node(source.node), self.node(target.node)) else {
            return false;
        };
        let source_rules = source_node.constraints();
        let target_rules = target_node.constraints();

        let accepted = target_rules.accepts(
            target.direction,
            &target.name,
            &source_node.node_type,
            source.direction,
            &source.name,
        ) && source_rules.accepts(
            source.direction,
            &source.name,
            &target_node.node_type,
            target.direction,
            &target.name,
        );
        if !accepted {
            return false;
        }

        let rejected = target_rules.rejects(
            target.direction,
            &target.name,
            &source_node.node_type,
            source.direction,
            &source.name,
        ) || source_rules.rejects(
            source.direction,
            &source.name,
            &target_node.node_type,
            target.direction,
            &target.name,
        );
        !rejected
    }

    /// Whether adding `source`-`target` would close a directed cycle.
    ///
    /// Walks from the target node in the direction data flows through the
    /// candidate edge. Reaching the source node means a cycle; so does an
    /// edge between two ports of the same node.
    pub fn would_create_cycle(&self, source: &PortKey, target: &PortKey) -> bool {
        if source.node == target.node {
            return true;
        }
        // Downstream from an input target, upstream from an output target
        let follow = target.direction.opposite();

        let mut visited = HashSet::new();
        let mut pending = vec![target.node];
        while let Some(node_id) = pending.pop() {
            if !visited.insert(node_id) {
                continue;
            }
            let Some(node) = self.node(node_id) else {
                continue;
            };
            for port in node.ports().filter(|p| p.direction == follow) {
                for peer in port.connected_ports.keys() {
                    if *peer == source.node {
                        return true;
                    }
                    pending.push(*peer);
                }
            }
        }
        false
    }

    /// Whether the graph currently contains a directed cycle
    pub fn has_cycle(&self) -> bool {
        self.topological_order().is_err()
    }

    /// Get nodes in topological order (sources first)
    pub fn topological_order(&self) -> Result<Vec<NodeId>, CycleError> {
        let mut marks: HashMap<NodeId, Mark> = HashMap::new();
        let mut order = Vec::with_capacity(self.nodes.len());
        // (node, exiting): a node is pushed once to enter and once to exit
        let mut stack: Vec<(NodeId, bool)> = Vec::new();

        for root in self.nodes.keys() {
            if marks.contains_key(root) {
                continue;
            }
            stack.push((*root, false));

            while let Some((node_id, exiting)) = stack.pop() {
                if exiting {
                    marks.insert(node_id, Mark::Done);
                    order.push(node_id);
                    continue;
                }
                if marks.contains_key(&node_id) {
                    continue;
                }
                marks.insert(node_id, Mark::InProgress);
                stack.push((node_id, true));

                // Visit all nodes feeding this node's inputs, first port first
                let Some(node) = self.node(node_id) else {
                    continue;
                };
                let upstream: Vec<NodeId> = node
                    .inputs()
                    .flat_map(|port| port.connected_ports.keys().copied())
                    .collect();
                for upstream_id in upstream.into_iter().rev() {
                    match marks.get(&upstream_id) {
                        Some(Mark::InProgress) => return Err(CycleError),
                        Some(Mark::Done) => {}
                        None => stack.push((upstream_id, false)),
                    }
                }
            }
        }

        Ok(order)
    }

    /// Edges whose two sides disagree, or single-connection ports holding
    /// more than one edge
    pub fn integrity_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        for node in self.nodes() {
            for port in node.ports() {
                let key = PortKey::new(node.id, port.name.clone(), port.direction);
                if !port.multi_connection && port.connection_count() > 1 {
                    violations.push(format!("{key} is single-connection but has {} edges", port.connection_count()));
                }
                for peer in port.peers() {
                    match self.port(&peer) {
                        None => violations.push(format!("{key} lists missing port {peer}")),
                        Some(peer_port) if !peer_port.is_connected_to(key.node, &key.name) => {
                            violations.push(format!("{key} lists {peer} but not the reverse"));
                        }
                        Some(_) => {}
                    }
                }
            }
        }
        violations
    }
}

/// Error raised by graph-level operations
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(PortKey),

    /// A node with this ID already exists
    #[error("Duplicate node: {0}")]
    DuplicateNode(NodeId),

    /// A port with this name already exists on the node
    #[error("Port \"{name}\" already exists on node {node}")]
    DuplicatePort {
        /// Owning node
        node: NodeId,
        /// Port name
        name: String,
    },

    /// Property was never declared on the node
    #[error("Property \"{name}\" not found on node {node}")]
    PropertyNotFound {
        /// Owning node
        node: NodeId,
        /// Property name
        name: String,
    },

    /// Connection protocol refused the change
    #[error(transparent)]
    Port(#[from] PortError),

    /// No template registered for this node type
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// Settings written by an unsupported format version
    #[error("Unsupported settings format version: {0}")]
    UnsupportedFormat(u32),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Session JSON error
    #[error("Session format error: {0}")]
    Json(#[from] serde_json::Error),

    /// Settings parse error
    #[error("Settings parse error: {0}")]
    RonParse(#[from] ron::error::SpannedError),

    /// Settings write error
    #[error("Settings write error: {0}")]
    RonWrite(#[from] ron::Error),
}

/// Error when graph contains a cycle
#[derive(Debug, thiserror::Error)]
#[error("Graph contains a cycle")]
pub struct CycleError;
