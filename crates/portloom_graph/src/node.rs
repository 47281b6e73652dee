// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph framework.

use crate::constraint::{ConnectionConstraints, ConstraintMap, PortTypeRule};
use crate::graph::GraphError;
use crate::port::{PortDirection, PortKey, PortModel};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Default node body color
pub const DEFAULT_NODE_COLOR: [u8; 4] = [13, 18, 23, 255];

/// A node instance in the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Node type identifier, matched by connection constraints
    pub node_type: String,
    /// Display name
    pub name: String,
    /// Position in the graph UI
    pub position: [f32; 2],
    /// Body color (RGBA)
    pub color: [u8; 4],
    /// Whether the node is shown
    pub visible: bool,
    /// Whether the node is disabled
    pub disabled: bool,
    inputs: IndexMap<String, PortModel>,
    outputs: IndexMap<String, PortModel>,
    constraints: ConnectionConstraints,
    properties: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    extra: IndexMap<String, Value>,
}

impl Node {
    /// Create a node without ports
    pub fn new(node_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(),
            node_type: node_type.into(),
            name: name.into(),
            position: [0.0, 0.0],
            color: DEFAULT_NODE_COLOR,
            visible: true,
            disabled: false,
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
            constraints: ConnectionConstraints::default(),
            properties: IndexMap::new(),
            extra: IndexMap::new(),
        }
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Set the body color
    pub fn with_color(mut self, color: [u8; 4]) -> Self {
        self.color = color;
        self
    }

    /// Add an input port
    pub fn add_input(&mut self, name: &str, multi_input: bool) -> Result<&mut PortModel, GraphError> {
        self.add_port(PortModel::input(name, multi_input))
    }

    /// Add an output port
    pub fn add_output(&mut self, name: &str, multi_output: bool) -> Result<&mut PortModel, GraphError> {
        self.add_port(PortModel::output(name, multi_output))
    }

    /// Add a port built elsewhere. Names are unique per direction.
    pub fn add_port(&mut self, port: PortModel) -> Result<&mut PortModel, GraphError> {
        let ports = match port.direction {
            PortDirection::Input => &mut self.inputs,
            PortDirection::Output => &mut self.outputs,
        };
        if ports.contains_key(&port.name) {
            return Err(GraphError::DuplicatePort {
                node: self.id,
                name: port.name,
            });
        }
        let entry = ports.entry(port.name.clone());
        Ok(entry.or_insert(port))
    }

    /// Input ports in creation order
    pub fn inputs(&self) -> impl Iterator<Item = &PortModel> {
        self.inputs.values()
    }

    /// Output ports in creation order
    pub fn outputs(&self) -> impl Iterator<Item = &PortModel> {
        self.outputs.values()
    }

    /// Get an input port by name
    pub fn input(&self, name: &str) -> Option<&PortModel> {
        self.inputs.get(name)
    }

    /// Get an output port by name
    pub fn output(&self, name: &str) -> Option<&PortModel> {
        self.outputs.get(name)
    }

    /// Get a port by direction and name
    pub fn port(&self, direction: PortDirection, name: &str) -> Option<&PortModel> {
        match direction {
            PortDirection::Input => self.inputs.get(name),
            PortDirection::Output => self.outputs.get(name),
        }
    }

    pub(crate) fn port_mut(&mut self, direction: PortDirection, name: &str) -> Option<&mut PortModel> {
        match direction {
            PortDirection::Input => self.inputs.get_mut(name),
            PortDirection::Output => self.outputs.get_mut(name),
        }
    }

    pub(crate) fn forget_connections(&mut self) {
        for port in self.inputs.values_mut().chain(self.outputs.values_mut()) {
            port.connected_ports.clear();
        }
    }

    /// Get all ports, inputs first
    pub fn ports(&self) -> impl Iterator<Item = &PortModel> {
        self.inputs.values().chain(self.outputs.values())
    }

    /// Keys of all ports, inputs first
    pub fn port_keys(&self) -> Vec<PortKey> {
        self.ports()
            .map(|p| PortKey::new(self.id, p.name.clone(), p.direction))
            .collect()
    }

    /// Connection constraint tables
    pub fn constraints(&self) -> &ConnectionConstraints {
        &self.constraints
    }

    pub(crate) fn set_constraints(&mut self, constraints: ConnectionConstraints) {
        self.constraints = constraints;
    }

    /// Register an accept rule for one of this node's ports
    pub fn add_accept_port_type(
        &mut self,
        direction: PortDirection,
        port: &str,
        rule: &PortTypeRule,
    ) -> Result<(), GraphError> {
        self.require_port(direction, port)?;
        self.constraints.add_accept(direction, port, rule);
        Ok(())
    }

    /// Register a reject rule for one of this node's ports
    pub fn add_reject_port_type(
        &mut self,
        direction: PortDirection,
        port: &str,
        rule: &PortTypeRule,
    ) -> Result<(), GraphError> {
        self.require_port(direction, port)?;
        self.constraints.add_reject(direction, port, rule);
        Ok(())
    }

    /// Accept rules of a port; empty if none
    pub fn accepted_port_types(&self, direction: PortDirection, port: &str) -> ConstraintMap {
        self.constraints.accepted_port_types(direction, port)
    }

    /// Reject rules of a port; empty if none
    pub fn rejected_port_types(&self, direction: PortDirection, port: &str) -> ConstraintMap {
        self.constraints.rejected_port_types(direction, port)
    }

    fn require_port(&self, direction: PortDirection, port: &str) -> Result<(), GraphError> {
        match self.port(direction, port) {
            Some(_) => Ok(()),
            None => Err(GraphError::PortNotFound(PortKey::new(self.id, port, direction))),
        }
    }

    /// Declare a custom property with its initial value.
    ///
    /// Redeclaring a property replaces its value.
    pub fn create_property(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(name.into(), value.into());
    }

    /// Read a custom property
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// All custom properties in declaration order
    pub fn properties(&self) -> &IndexMap<String, Value> {
        &self.properties
    }

    pub(crate) fn property_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.properties.get_mut(name)
    }

    /// Session fields kept as-is, such as `icon` or `text_color`
    pub fn extra(&self) -> &IndexMap<String, Value> {
        &self.extra
    }

    pub(crate) fn set_extra(&mut self, extra: IndexMap<String, Value>) {
        self.extra = extra;
    }
}

/// Registry of node templates by type ID
pub struct NodeRegistry {
    templates: IndexMap<String, Node>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            templates: IndexMap::new(),
        }
    }

    /// Register a template under its `node_type`. Replaces an earlier one.
    pub fn register(&mut self, template: Node) {
        self.templates.insert(template.node_type.clone(), template);
    }

    /// Get a template by type ID
    pub fn get(&self, type_id: &str) -> Option<&Node> {
        self.templates.get(type_id)
    }

    /// Registered type IDs
    pub fn type_ids(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    /// Instantiate a template with a fresh ID
    pub fn create_node(&self, type_id: &str) -> Option<Node> {
        self.get(type_id).map(|template| {
            let mut node = template.clone();
            node.id = NodeId::new();
            node
        })
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
