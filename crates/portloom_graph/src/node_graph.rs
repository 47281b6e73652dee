// SPDX-License-Identifier: MIT OR Apache-2.0
//! The graph controller.
//!
//! [`NodeGraph`] is the context every port operation runs in. It owns:
//! - The [`GraphModel`] with all nodes and edges
//! - The undo stack all mutations are recorded on
//! - The viewer capability used by the connection protocol
//! - The notification channels the presentation layer subscribes to

use crate::commands::GraphCommand;
use crate::constraint::{ConstraintMap, PortTypeRule};
use crate::graph::{GraphError, GraphModel};
use crate::node::{Node, NodeId, NodeRegistry};
use crate::port::{PortError, PortKey, PortModel};
use crate::settings::GraphSettings;
use crate::signal::{PortConnectionEvent, PropertyChangedEvent, Signal};
use crate::viewer::{GraphViewer, TopologyViewer};
use portloom_history::{HistoryError, UndoStack};
use serde_json::Value;

/// A node graph with undo history and change notifications
pub struct NodeGraph {
    pub(crate) model: GraphModel,
    pub(crate) undo_stack: UndoStack<GraphCommand>,
    pub(crate) viewer: Box<dyn GraphViewer>,
    registry: NodeRegistry,
    /// Emitted as `(input, output)` after a connection is made
    pub port_connected: Signal<PortConnectionEvent>,
    /// Emitted as `(input, output)` after a connection is removed
    pub port_disconnected: Signal<PortConnectionEvent>,
    /// Emitted after a custom node property changes
    pub property_changed: Signal<PropertyChangedEvent>,
}

impl NodeGraph {
    /// Create a graph that answers cycle queries from its own topology
    pub fn new(settings: GraphSettings) -> Self {
        Self::with_viewer(settings, Box::new(TopologyViewer))
    }

    /// Create a graph driven by a presentation layer
    pub fn with_viewer(settings: GraphSettings, viewer: Box<dyn GraphViewer>) -> Self {
        Self {
            model: GraphModel::new(settings.acyclic),
            undo_stack: UndoStack::with_limit(settings.undo_limit),
            viewer,
            registry: NodeRegistry::new(),
            port_connected: Signal::new(),
            port_disconnected: Signal::new(),
            property_changed: Signal::new(),
        }
    }

    /// Replace the viewer
    pub fn set_viewer(&mut self, viewer: Box<dyn GraphViewer>) {
        self.viewer = viewer;
    }

    /// Graph state
    pub fn model(&self) -> &GraphModel {
        &self.model
    }

    /// Undo history
    pub fn undo_stack(&self) -> &UndoStack<GraphCommand> {
        &self.undo_stack
    }

    /// Whether cycle-forming connections are refused
    pub fn acyclic(&self) -> bool {
        self.model.acyclic()
    }

    /// Toggle acyclic mode. Existing edges are kept.
    pub fn set_acyclic(&mut self, acyclic: bool) {
        self.model.set_acyclic(acyclic);
    }

    /// Node templates used by [`NodeGraph::create_node`]
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Register a node template
    pub fn register_node(&mut self, template: Node) {
        tracing::debug!(node_type = %template.node_type, "registered node type");
        self.registry.register(template);
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.model.node(node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.model.nodes()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.model.node_count()
    }

    /// Look up a port's state
    pub fn port_model(&self, key: &PortKey) -> Option<&PortModel> {
        self.model.port(key)
    }

    /// Peers of a port
    pub fn connected_ports(&self, key: &PortKey) -> Vec<PortKey> {
        self.model.connected_ports(key)
    }

    /// Add a node. Connections recorded on `node` are dropped.
    pub fn add_node(&mut self, mut node: Node, push_undo: bool) -> Result<NodeId, GraphError> {
        if self.model.node(node.id).is_some() {
            return Err(GraphError::DuplicateNode(node.id));
        }
        node.forget_connections();
        let id = node.id;
        tracing::debug!(node = %id, node_type = %node.node_type, "add node");
        self.push_command(GraphCommand::add_node(node), push_undo);
        Ok(id)
    }

    /// Instantiate a registered template and add it
    pub fn create_node(&mut self, type_id: &str, push_undo: bool) -> Result<NodeId, GraphError> {
        let node = self
            .registry
            .create_node(type_id)
            .ok_or_else(|| GraphError::UnknownNodeType(type_id.to_owned()))?;
        self.add_node(node, push_undo)
    }

    /// Remove a node after severing all of its edges.
    ///
    /// The node's own ports are unlocked first. A locked peer refuses the
    /// removal before anything changes.
    pub fn remove_node(&mut self, node_id: NodeId, push_undo: bool) -> Result<(), GraphError> {
        let node = self.model.node(node_id).ok_or(GraphError::NodeNotFound(node_id))?;
        let keys = node.port_keys();

        for key in &keys {
            for peer in self.model.connected_ports(key) {
                if peer.node != node_id && self.model.port(&peer).is_some_and(|p| p.locked) {
                    return Err(PortError::DisconnectLocked(peer.name).into());
                }
            }
        }

        if push_undo {
            self.undo_stack.begin_macro("delete node");
        }
        for key in &keys {
            self.set_port_locked(key, false, false, push_undo);
        }
        let pairs: Vec<(PortKey, PortKey)> = keys
            .iter()
            .flat_map(|key| self.model.connected_ports(key).into_iter().map(move |peer| (key.clone(), peer)))
            .collect();
        let severed = self.disconnect_all("disconnect node", pairs, push_undo);
        if severed.is_ok() {
            self.push_command(GraphCommand::remove_node(node_id), push_undo);
        }
        if push_undo {
            self.close_macro();
        }
        let events = severed?;

        tracing::debug!(node = %node_id, "removed node");
        for event in &events {
            self.port_disconnected.emit(event);
        }
        Ok(())
    }

    /// Register an accept rule on a port
    pub fn add_accept_port_type(&mut self, port: &PortKey, rule: &PortTypeRule) -> Result<(), GraphError> {
        self.model
            .node_mut(port.node)
            .ok_or(GraphError::NodeNotFound(port.node))?
            .add_accept_port_type(port.direction, &port.name, rule)
    }

    /// Register a reject rule on a port
    pub fn add_reject_port_type(&mut self, port: &PortKey, rule: &PortTypeRule) -> Result<(), GraphError> {
        self.model
            .node_mut(port.node)
            .ok_or(GraphError::NodeNotFound(port.node))?
            .add_reject_port_type(port.direction, &port.name, rule)
    }

    /// Accept rules of a port; empty when unconstrained or unknown
    pub fn accepted_port_types(&self, port: &PortKey) -> ConstraintMap {
        self.model
            .node(port.node)
            .map(|n| n.accepted_port_types(port.direction, &port.name))
            .unwrap_or_default()
    }

    /// Reject rules of a port; empty when nothing is forbidden or unknown
    pub fn rejected_port_types(&self, port: &PortKey) -> ConstraintMap {
        self.model
            .node(port.node)
            .map(|n| n.rejected_port_types(port.direction, &port.name))
            .unwrap_or_default()
    }

    /// Read a custom node property
    pub fn get_node_property(&self, node_id: NodeId, name: &str) -> Option<&Value> {
        self.model.node(node_id)?.property(name)
    }

    /// Change a declared custom node property.
    ///
    /// Setting the current value again is a no-op and emits nothing.
    pub fn set_node_property(
        &mut self,
        node_id: NodeId,
        name: &str,
        value: Value,
        push_undo: bool,
    ) -> Result<(), GraphError> {
        let node = self.model.node(node_id).ok_or(GraphError::NodeNotFound(node_id))?;
        let old_value = node
            .property(name)
            .ok_or_else(|| GraphError::PropertyNotFound {
                node: node_id,
                name: name.to_owned(),
            })?
            .clone();
        if old_value == value {
            return Ok(());
        }

        self.push_command(
            GraphCommand::SetNodeProperty {
                node_id,
                name: name.to_owned(),
                old_value,
                new_value: value.clone(),
            },
            push_undo,
        );
        self.property_changed.emit(&PropertyChangedEvent {
            node: node_id,
            name: name.to_owned(),
            value,
        });
        Ok(())
    }

    /// Revert the last undo step
    pub fn undo(&mut self) -> Result<(), HistoryError> {
        self.undo_stack.undo(&mut self.model)
    }

    /// Re-apply the last undone step
    pub fn redo(&mut self) -> Result<(), HistoryError> {
        self.undo_stack.redo(&mut self.model)
    }

    /// Whether there are changes since the last save or load
    pub fn is_modified(&self) -> bool {
        !self.undo_stack.is_clean()
    }

    /// Remove all nodes and history
    pub fn clear_session(&mut self) {
        self.model.clear();
        self.undo_stack.clear();
        tracing::debug!("cleared session");
    }

    /// Record `command`, or apply it directly when `push_undo` is off
    pub(crate) fn push_command(&mut self, command: GraphCommand, push_undo: bool) {
        if push_undo {
            self.undo_stack.push(command, &mut self.model);
        } else {
            command.apply(&mut self.model);
        }
    }

    /// Record `commands` as one macro, or apply them directly
    pub(crate) fn run_commands(&mut self, text: &str, push_undo: bool, commands: Vec<GraphCommand>) {
        if push_undo {
            self.undo_stack.begin_macro(text);
            for command in commands {
                self.undo_stack.push(command, &mut self.model);
            }
            self.close_macro();
        } else {
            for command in commands {
                command.apply(&mut self.model);
            }
        }
    }

    pub(crate) fn close_macro(&mut self) {
        if let Err(err) = self.undo_stack.end_macro() {
            tracing::warn!("unbalanced undo macro: {err}");
        }
    }
}

impl Default for NodeGraph {
    fn default() -> Self {
        Self::new(GraphSettings::default())
    }
}

impl std::fmt::Debug for NodeGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeGraph")
            .field("model", &self.model)
            .field("undo_stack", &self.undo_stack)
            .finish_non_exhaustive()
    }
}
