// SPDX-License-Identifier: MIT OR Apache-2.0
//! Session snapshots stored as JSON.

use crate::constraint::ConnectionConstraints;
use crate::graph::{GraphError, GraphModel};
use crate::node::{Node, NodeId, NodeRegistry};
use crate::node_graph::NodeGraph;
use crate::port::{PortDirection, PortKey, PortModel};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Peers of one port as written to disk
pub type PortConnections = BTreeMap<NodeId, Vec<String>>;

/// Whole-graph snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    /// Graph-level flags
    #[serde(default)]
    pub graph: GraphRecord,
    /// Nodes in graph order
    #[serde(default)]
    pub nodes: IndexMap<NodeId, NodeRecord>,
    /// Edge list; authoritative when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connections: Option<Vec<ConnectionRecord>>,
}

/// Graph-level flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRecord {
    /// Refuse cycle-forming connections
    #[serde(default = "default_true")]
    pub acyclic: bool,
    /// Presentation fields such as `pipe_style`, kept as-is
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl Default for GraphRecord {
    fn default() -> Self {
        Self {
            acyclic: true,
            extra: IndexMap::new(),
        }
    }
}

/// One node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Node type identifier
    #[serde(rename = "type_")]
    pub node_type: String,
    /// Display name
    pub name: String,
    /// Position
    #[serde(default)]
    pub pos: [f32; 2],
    /// Body color
    #[serde(default = "default_color")]
    pub color: [u8; 4],
    /// Shown
    #[serde(default = "default_true")]
    pub visible: bool,
    /// Disabled
    #[serde(default)]
    pub disabled: bool,
    /// Custom properties
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub custom: IndexMap<String, Value>,
    /// Port layout; taken from the registered template when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<PortLayout>,
    /// Connected input ports
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub input_ports: IndexMap<String, PortConnections>,
    /// Connected output ports
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub output_ports: IndexMap<String, PortConnections>,
    /// Accept/reject rules
    #[serde(default, skip_serializing_if = "ConnectionConstraints::is_empty")]
    pub constraints: ConnectionConstraints,
    /// Presentation fields such as `icon` or `width`, kept as-is
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

fn default_color() -> [u8; 4] {
    crate::node::DEFAULT_NODE_COLOR
}

fn default_true() -> bool {
    true
}

/// Ports of a node in creation order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortLayout {
    /// Input ports
    #[serde(default)]
    pub inputs: Vec<PortRecord>,
    /// Output ports
    #[serde(default)]
    pub outputs: Vec<PortRecord>,
}

/// Static port state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRecord {
    /// Port name
    pub name: String,
    /// Multiple connections allowed
    #[serde(default)]
    pub multi_connection: bool,
    /// Shown
    #[serde(default = "default_true")]
    pub visible: bool,
    /// Locked
    #[serde(default)]
    pub locked: bool,
}

/// One edge, input side first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Input end
    #[serde(rename = "in")]
    pub input: (NodeId, String),
    /// Output end
    #[serde(rename = "out")]
    pub output: (NodeId, String),
}

impl PortRecord {
    fn from_model(port: &PortModel) -> Self {
        Self {
            name: port.name.clone(),
            multi_connection: port.multi_connection,
            visible: port.visible,
            locked: port.locked,
        }
    }

    fn to_model(&self, direction: PortDirection) -> PortModel {
        let mut port = PortModel::new(self.name.clone(), direction, self.multi_connection);
        port.visible = self.visible;
        port.locked = self.locked;
        port
    }
}

impl SessionData {
    /// Edges of the snapshot, from `connections` or else from `input_ports`
    pub fn edges(&self) -> Vec<ConnectionRecord> {
        if let Some(connections) = &self.connections {
            return connections.clone();
        }
        let mut edges = Vec::new();
        for (id, record) in &self.nodes {
            for (port, peers) in &record.input_ports {
                for (peer, names) in peers {
                    for name in names {
                        edges.push(ConnectionRecord {
                            input: (*id, port.clone()),
                            output: (*peer, name.clone()),
                        });
                    }
                }
            }
        }
        edges
    }
}

impl ConnectionRecord {
    /// Input and output port keys
    pub fn keys(&self) -> (PortKey, PortKey) {
        (
            PortKey::input(self.input.0, self.input.1.clone()),
            PortKey::output(self.output.0, self.output.1.clone()),
        )
    }
}

fn connected<'a>(ports: impl Iterator<Item = &'a PortModel>) -> IndexMap<String, PortConnections> {
    ports
        .filter(|p| p.has_connection())
        .map(|p| {
            let peers: PortConnections = p
                .connected_ports
                .iter()
                .map(|(node, names)| (*node, names.iter().cloned().collect()))
                .collect();
            (p.name.clone(), peers)
        })
        .collect()
}

impl NodeRecord {
    fn from_node(node: &Node) -> Self {
        Self {
            node_type: node.node_type.clone(),
            name: node.name.clone(),
            pos: node.position,
            color: node.color,
            visible: node.visible,
            disabled: node.disabled,
            custom: node.properties().clone(),
            ports: Some(PortLayout {
                inputs: node.inputs().map(PortRecord::from_model).collect(),
                outputs: node.outputs().map(PortRecord::from_model).collect(),
            }),
            input_ports: connected(node.inputs()),
            output_ports: connected(node.outputs()),
            constraints: node.constraints().clone(),
            extra: node.extra().clone(),
        }
    }

    fn to_node(&self, id: NodeId, registry: &NodeRegistry) -> Result<Node, GraphError> {
        let mut node = match &self.ports {
            Some(layout) => {
                let mut node = Node::new(self.node_type.clone(), self.name.clone());
                for port in &layout.inputs {
                    node.add_port(port.to_model(PortDirection::Input))?;
                }
                for port in &layout.outputs {
                    node.add_port(port.to_model(PortDirection::Output))?;
                }
                node
            }
            None => {
                let mut node = registry
                    .create_node(&self.node_type)
                    .ok_or_else(|| GraphError::UnknownNodeType(self.node_type.clone()))?;
                node.forget_connections();
                node.name = self.name.clone();
                node
            }
        };
        node.id = id;
        node.position = self.pos;
        node.color = self.color;
        node.visible = self.visible;
        node.disabled = self.disabled;
        for (name, value) in &self.custom {
            node.create_property(name.clone(), value.clone());
        }
        if !self.constraints.is_empty() {
            node.set_constraints(self.constraints.clone());
        }
        node.set_extra(self.extra.clone());
        Ok(node)
    }
}

fn check_port(model: &GraphModel, key: &PortKey) -> Result<(), GraphError> {
    if model.node(key.node).is_none() {
        return Err(GraphError::NodeNotFound(key.node));
    }
    if model.port(key).is_none() {
        return Err(GraphError::PortNotFound(key.clone()));
    }
    Ok(())
}

impl NodeGraph {
    /// Snapshot the graph
    pub fn serialize_session(&self) -> SessionData {
        let nodes = self
            .model
            .nodes()
            .map(|node| (node.id, NodeRecord::from_node(node)))
            .collect();

        let mut connections = Vec::new();
        for node in self.model.nodes() {
            for port in node.inputs() {
                for peer in port.peers() {
                    connections.push(ConnectionRecord {
                        input: (node.id, port.name.clone()),
                        output: (peer.node, peer.name),
                    });
                }
            }
        }

        SessionData {
            graph: GraphRecord {
                acyclic: self.model.acyclic(),
                extra: self.model.extra().clone(),
            },
            nodes,
            connections: Some(connections),
        }
    }

    /// Replace the graph with a snapshot and clear the undo history.
    ///
    /// Edges are replayed through [`NodeGraph::connect_ports`] rules, so a
    /// second edge into a single-connection port replaces the first and
    /// edges refused by constraints or acyclicity are dropped. Port locks
    /// apply after the replay. Nothing is emitted on the change signals.
    ///
    /// On error the current graph is left unchanged.
    pub fn deserialize_session(&mut self, data: &SessionData) -> Result<(), GraphError> {
        let mut model = GraphModel::new(data.graph.acyclic);
        model.set_extra(data.graph.extra.clone());
        let mut locked = Vec::new();
        for (id, record) in &data.nodes {
            let mut node = record.to_node(*id, self.registry())?;
            for key in node.port_keys() {
                if let Some(port) = node.port_mut(key.direction, &key.name) {
                    if port.locked {
                        port.locked = false;
                        locked.push(key);
                    }
                }
            }
            model.insert_node(node, None);
        }

        let edges: Vec<(PortKey, PortKey)> = data.edges().iter().map(ConnectionRecord::keys).collect();
        for (input, output) in &edges {
            check_port(&model, input)?;
            check_port(&model, output)?;
        }

        let previous = std::mem::replace(&mut self.model, model);
        for (input, output) in &edges {
            if let Err(err) = self.connect_inner(output, input, false) {
                self.model = previous;
                return Err(err.into());
            }
        }
        for key in &locked {
            self.set_port_locked(key, true, false, false);
        }

        self.undo_stack.clear();
        tracing::debug!(nodes = self.model.node_count(), edges = edges.len(), "session deserialized");
        Ok(())
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, GraphError> {
        Ok(serde_json::to_string_pretty(&self.serialize_session())?)
    }

    /// Load a JSON snapshot
    pub fn from_json(&mut self, content: &str) -> Result<(), GraphError> {
        let data: SessionData = serde_json::from_str(content)?;
        self.deserialize_session(&data)
    }

    /// Save the session and mark the history clean
    pub fn save_session(&mut self, path: &Path) -> Result<(), GraphError> {
        std::fs::write(path, self.to_json()?)?;
        self.undo_stack.set_clean();
        tracing::info!("Saved session to {:?}", path);
        Ok(())
    }

    /// Load a session file
    pub fn load_session(&mut self, path: &Path) -> Result<(), GraphError> {
        let content = std::fs::read_to_string(path)?;
        self.from_json(&content)?;
        tracing::info!("Loaded session from {:?}", path);
        Ok(())
    }
}
