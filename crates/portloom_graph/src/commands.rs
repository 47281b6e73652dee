// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reversible graph commands for the undo stack.

use crate::graph::GraphModel;
use crate::node::{Node, NodeId};
use crate::port::PortKey;
use portloom_history::UndoCommand;
use serde_json::Value;

/// One reversible change to a [`GraphModel`]
#[derive(Debug, Clone, PartialEq)]
pub enum GraphCommand {
    /// Add the edge between two ports
    ConnectPorts {
        /// Port that initiated the connection
        source: PortKey,
        /// Port connected to
        target: PortKey,
        /// Whether the last `redo` created the edge
        applied: bool,
    },
    /// Remove the edge between two ports
    DisconnectPorts {
        /// Port that initiated the disconnection
        source: PortKey,
        /// Port disconnected from
        target: PortKey,
        /// Whether the last `redo` removed the edge
        applied: bool,
    },
    /// Change a port's lock state
    SetPortLocked {
        /// Port to change
        port: PortKey,
        /// New state
        locked: bool,
        /// State before `redo`
        previous: bool,
    },
    /// Change a port's visibility
    SetPortVisible {
        /// Port to change
        port: PortKey,
        /// New state
        visible: bool,
        /// State before `redo`
        previous: bool,
    },
    /// Insert a node
    AddNode {
        /// Node inserted by `redo`
        node: Box<Node>,
    },
    /// Remove a node that no longer has connections
    RemoveNode {
        /// Node to remove
        node_id: NodeId,
        /// Removed node and its position, filled by `redo`
        removed: Option<(usize, Box<Node>)>,
    },
    /// Change a custom node property
    SetNodeProperty {
        /// Owning node
        node_id: NodeId,
        /// Property name
        name: String,
        /// Value before `redo`
        old_value: Value,
        /// Value after `redo`
        new_value: Value,
    },
}

impl GraphCommand {
    /// Connect `source` to `target`
    pub fn connect(source: PortKey, target: PortKey) -> Self {
        Self::ConnectPorts {
            source,
            target,
            applied: false,
        }
    }

    /// Disconnect `source` from `target`
    pub fn disconnect(source: PortKey, target: PortKey) -> Self {
        Self::DisconnectPorts {
            source,
            target,
            applied: false,
        }
    }

    /// Lock or unlock `port`
    pub fn set_locked(port: PortKey, locked: bool) -> Self {
        Self::SetPortLocked {
            port,
            locked,
            previous: !locked,
        }
    }

    /// Show or hide `port`
    pub fn set_visible(port: PortKey, visible: bool) -> Self {
        Self::SetPortVisible {
            port,
            visible,
            previous: !visible,
        }
    }

    /// Add `node`
    pub fn add_node(node: Node) -> Self {
        Self::AddNode {
            node: Box::new(node),
        }
    }

    /// Remove the node `node_id`
    pub fn remove_node(node_id: NodeId) -> Self {
        Self::RemoveNode {
            node_id,
            removed: None,
        }
    }

    /// Apply without recording history
    pub fn apply(mut self, model: &mut GraphModel) {
        self.redo(model);
    }
}

impl UndoCommand for GraphCommand {
    type Target = GraphModel;

    fn text(&self) -> &str {
        match self {
            Self::ConnectPorts { .. } => "connect port",
            Self::DisconnectPorts { .. } => "disconnect port",
            Self::SetPortLocked { locked: true, .. } => "lock port",
            Self::SetPortLocked { locked: false, .. } => "unlock port",
            Self::SetPortVisible { .. } => "port visible",
            Self::AddNode { .. } => "add node",
            Self::RemoveNode { .. } => "remove node",
            Self::SetNodeProperty { .. } => "property changed",
        }
    }

    fn redo(&mut self, model: &mut GraphModel) {
        tracing::trace!(command = self.text(), "redo");
        match self {
            Self::ConnectPorts { source, target, applied } => {
                *applied = model.link(source, target);
            }
            Self::DisconnectPorts { source, target, applied } => {
                *applied = model.unlink(source, target);
            }
            Self::SetPortLocked { port, locked, previous } => {
                if let Some(state) = model.port_mut(port) {
                    *previous = state.locked;
                    state.locked = *locked;
                }
            }
            Self::SetPortVisible { port, visible, previous } => {
                if let Some(state) = model.port_mut(port) {
                    *previous = state.visible;
                    state.visible = *visible;
                }
            }
            Self::AddNode { node } => {
                model.insert_node((**node).clone(), None);
            }
            Self::RemoveNode { node_id, removed } => {
                *removed = model
                    .take_node(*node_id)
                    .map(|(index, node)| (index, Box::new(node)));
            }
            Self::SetNodeProperty { node_id, name, new_value, .. } => {
                if let Some(value) = model.node_mut(*node_id).and_then(|n| n.property_mut(name)) {
                    *value = new_value.clone();
                }
            }
        }
    }

    fn undo(&mut self, model: &mut GraphModel) {
        tracing::trace!(command = self.text(), "undo");
        match self {
            Self::ConnectPorts { source, target, applied } => {
                if *applied {
                    model.unlink(source, target);
                }
            }
            Self::DisconnectPorts { source, target, applied } => {
                if *applied {
                    model.link(source, target);
                }
            }
            Self::SetPortLocked { port, previous, .. } => {
                if let Some(state) = model.port_mut(port) {
                    state.locked = *previous;
                }
            }
            Self::SetPortVisible { port, previous, .. } => {
                if let Some(state) = model.port_mut(port) {
                    state.visible = *previous;
                }
            }
            Self::AddNode { node } => {
                model.take_node(node.id);
            }
            Self::RemoveNode { removed, .. } => {
                if let Some((index, node)) = removed.take() {
                    model.insert_node(*node, Some(index));
                }
            }
            Self::SetNodeProperty { node_id, name, old_value, .. } => {
                if let Some(value) = model.node_mut(*node_id).and_then(|n| n.property_mut(name)) {
                    *value = old_value.clone();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_with_pair() -> (GraphModel, PortKey, PortKey) {
        let mut model = GraphModel::new(false);
        let mut a = Node::new("test.A", "A");
        a.add_output("out", true).unwrap();
        let mut b = Node::new("test.B", "B");
        b.add_input("in", false).unwrap();
        let out = PortKey::output(a.id, "out");
        let input = PortKey::input(b.id, "in");
        model.insert_node(a, None);
        model.insert_node(b, None);
        (model, out, input)
    }

    #[test]
    fn test_connect_undo_restores_state() {
        let (mut model, out, input) = model_with_pair();
        let before = model.clone();

        let mut cmd = GraphCommand::connect(out.clone(), input.clone());
        cmd.redo(&mut model);
        assert!(model.is_connected(&out, &input));
        cmd.undo(&mut model);
        assert_eq!(model, before);
    }

    #[test]
    fn test_redundant_connect_undo_keeps_edge() {
        let (mut model, out, input) = model_with_pair();
        GraphCommand::connect(out.clone(), input.clone()).apply(&mut model);

        // Edge already exists, so undoing this one must not remove it
        let mut cmd = GraphCommand::connect(input.clone(), out.clone());
        cmd.redo(&mut model);
        cmd.undo(&mut model);
        assert!(model.is_connected(&out, &input));
    }

    #[test]
    fn test_disconnect_missing_edge_undo_is_noop() {
        let (mut model, out, input) = model_with_pair();
        let before = model.clone();

        let mut cmd = GraphCommand::disconnect(out, input);
        cmd.redo(&mut model);
        cmd.undo(&mut model);
        assert_eq!(model, before);
    }

    #[test]
    fn test_lock_and_visible() {
        let (mut model, out, _) = model_with_pair();

        let mut lock = GraphCommand::set_locked(out.clone(), true);
        assert_eq!(lock.text(), "lock port");
        lock.redo(&mut model);
        assert!(model.port(&out).unwrap().locked);
        lock.undo(&mut model);
        assert!(!model.port(&out).unwrap().locked);

        let mut hide = GraphCommand::set_visible(out.clone(), false);
        hide.redo(&mut model);
        assert!(!model.port(&out).unwrap().visible);
        hide.undo(&mut model);
        assert!(model.port(&out).unwrap().visible);
    }

    #[test]
    fn test_remove_node_restores_position() {
        let (mut model, out, input) = model_with_pair();
        let before = model.clone();

        let mut cmd = GraphCommand::remove_node(out.node);
        cmd.redo(&mut model);
        assert_eq!(model.node_count(), 1);
        assert!(model.node(input.node).is_some());

        cmd.undo(&mut model);
        assert_eq!(model, before);
        assert_eq!(model.nodes().next().map(|n| n.id), Some(out.node));
    }
}
