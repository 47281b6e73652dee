// SPDX-License-Identifier: MIT OR Apache-2.0
//! The connect/disconnect protocol.
//!
//! Every public call validates first and mutates second, so a
//! [`PortError`] always leaves the graph untouched. Edges are only ever
//! changed through [`GraphCommand`]s, which keep both sides of an edge in
//! sync and make each change undoable.

use crate::commands::GraphCommand;
use crate::constraint::{ConstraintMap, PortTypeRule};
use crate::graph::GraphError;
use crate::node::NodeId;
use crate::node_graph::NodeGraph;
use crate::port::{PortDirection, PortError, PortKey, PortModel};
use crate::signal::PortConnectionEvent;

impl NodeGraph {
    /// Connect `source` to `target`.
    ///
    /// Unknown ports, matching directions and constraint violations are
    /// silently ignored. A single-connection port loses its previous edge.
    pub fn connect_ports(&mut self, source: &PortKey, target: &PortKey, push_undo: bool) -> Result<(), PortError> {
        if let Some(event) = self.connect_inner(source, target, push_undo)? {
            self.port_connected.emit(&event);
        }
        Ok(())
    }

    /// Connect without notifying; returns the event to emit
    pub(crate) fn connect_inner(
        &mut self,
        source: &PortKey,
        target: &PortKey,
        push_undo: bool,
    ) -> Result<Option<PortConnectionEvent>, PortError> {
        let (Some(src), Some(trg)) = (self.model.port(source), self.model.port(target)) else {
            tracing::debug!(%source, %target, "connect skipped: unknown port");
            return Ok(None);
        };
        if src.direction == trg.direction {
            tracing::debug!(%source, %target, "connect skipped: same direction");
            return Ok(None);
        }

        let accept_override = self.viewer.validate_accept_constraint(&self.model, source, target);
        if !accept_override && trg.is_connected_to(source.node, &source.name) {
            return Ok(None);
        }

        if src.locked {
            return Err(PortError::ConnectLocked(src.name.clone()));
        }
        if trg.locked {
            return Err(PortError::ConnectLocked(trg.name.clone()));
        }

        if !self.model.connection_allowed(source, target) {
            tracing::debug!(%source, %target, "connect dropped by port constraints");
            return Ok(None);
        }

        let pre_conn_port = if src.multi_connection { None } else { src.peers().next() };
        let detached_port = if trg.multi_connection { None } else { trg.peers().next() };

        if self.model.acyclic() && self.viewer.would_create_cycle(&self.model, source, target) {
            match pre_conn_port {
                Some(prior) if !accept_override => {
                    tracing::debug!(%source, %target, %prior, "cycle refused, dropping previous connection");
                    self.run_commands(
                        "connect port",
                        push_undo,
                        vec![GraphCommand::disconnect(source.clone(), prior)],
                    );
                }
                _ => tracing::debug!(%source, %target, "cycle refused"),
            }
            return Ok(None);
        }

        let mut commands = Vec::with_capacity(3);
        if let Some(detached) = detached_port {
            commands.push(GraphCommand::disconnect(target.clone(), detached));
        }
        if let Some(prior) = pre_conn_port {
            commands.push(GraphCommand::disconnect(source.clone(), prior));
        }
        commands.push(GraphCommand::connect(source.clone(), target.clone()));
        self.run_commands("connect port", push_undo, commands);

        tracing::debug!(%source, %target, "connected");
        Ok(Some(PortConnectionEvent::from_pair(source, target)))
    }

    /// Remove the edge between `source` and `target`.
    ///
    /// Unknown ports and missing edges are ignored.
    pub fn disconnect_ports(&mut self, source: &PortKey, target: &PortKey, push_undo: bool) -> Result<(), PortError> {
        if let Some(event) = self.disconnect_inner(source, target, push_undo)? {
            self.port_disconnected.emit(&event);
        }
        Ok(())
    }

    /// Disconnect without notifying; returns the event to emit
    pub(crate) fn disconnect_inner(
        &mut self,
        source: &PortKey,
        target: &PortKey,
        push_undo: bool,
    ) -> Result<Option<PortConnectionEvent>, PortError> {
        let (Some(src), Some(trg)) = (self.model.port(source), self.model.port(target)) else {
            return Ok(None);
        };
        if src.locked {
            return Err(PortError::DisconnectLocked(src.name.clone()));
        }
        if trg.locked {
            return Err(PortError::DisconnectLocked(trg.name.clone()));
        }
        if !src.is_connected_to(target.node, &target.name) {
            return Ok(None);
        }

        self.run_commands(
            "disconnect port",
            push_undo,
            vec![GraphCommand::disconnect(source.clone(), target.clone())],
        );
        tracing::debug!(%source, %target, "disconnected");
        Ok(Some(PortConnectionEvent::from_pair(source, target)))
    }

    /// Disconnect `port` from all of its peers as one undo step
    pub fn clear_port_connections(&mut self, port: &PortKey, push_undo: bool) -> Result<(), PortError> {
        let Some(state) = self.model.port(port) else {
            return Ok(());
        };
        if state.locked {
            return Err(PortError::ClearLocked(state.name.clone()));
        }

        let peers: Vec<PortKey> = state.peers().collect();
        if peers.is_empty() {
            return Ok(());
        }
        if let Some(locked) = peers
            .iter()
            .filter_map(|peer| self.model.port(peer))
            .find(|p| p.locked)
        {
            return Err(PortError::DisconnectLocked(locked.name.clone()));
        }

        let text = format!("\"{}\" clear connections", port.name);
        let pairs = peers.into_iter().map(|peer| (port.clone(), peer)).collect();
        for event in &self.disconnect_all(&text, pairs, push_undo)? {
            self.port_disconnected.emit(event);
        }
        Ok(())
    }

    /// Remove several edges as one undo step, without notifying.
    ///
    /// Stops at the first refusal. The step is closed either way and keeps
    /// the edges removed so far.
    pub(crate) fn disconnect_all(
        &mut self,
        text: &str,
        pairs: Vec<(PortKey, PortKey)>,
        push_undo: bool,
    ) -> Result<Vec<PortConnectionEvent>, PortError> {
        if push_undo {
            self.undo_stack.begin_macro(text);
        }
        let mut events = Vec::with_capacity(pairs.len());
        let mut outcome = Ok(());
        for (source, target) in &pairs {
            match self.disconnect_inner(source, target, push_undo) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            }
        }
        if push_undo {
            self.close_macro();
        }
        outcome.map(|()| events)
    }

    /// Lock or unlock `port`, and its direct peers when `connected_ports`
    pub fn set_port_locked(&mut self, port: &PortKey, state: bool, connected_ports: bool, push_undo: bool) {
        let Some(current) = self.model.port(port) else {
            return;
        };
        if current.locked == state {
            return;
        }

        let peers: Vec<PortKey> = if connected_ports { current.peers().collect() } else { Vec::new() };
        let grouped = push_undo && !peers.is_empty();
        if grouped {
            self.undo_stack
                .begin_macro(if state { "lock port" } else { "unlock port" });
        }
        self.push_command(GraphCommand::set_locked(port.clone(), state), push_undo);
        for peer in &peers {
            self.set_port_locked(peer, state, false, push_undo);
        }
        if grouped {
            self.close_macro();
        }
    }

    /// Show or hide `port`
    pub fn set_port_visible(&mut self, port: &PortKey, visible: bool, push_undo: bool) {
        let Some(current) = self.model.port(port) else {
            return;
        };
        if current.visible == visible {
            return;
        }
        self.push_command(GraphCommand::set_visible(port.clone(), visible), push_undo);
    }

    /// Handle for one port, if it exists
    pub fn port(&mut self, key: &PortKey) -> Option<Port<'_>> {
        self.model.port(key)?;
        Some(Port {
            graph: self,
            key: key.clone(),
        })
    }

    /// Handle for an input port
    pub fn input_port(&mut self, node: NodeId, name: &str) -> Option<Port<'_>> {
        self.port(&PortKey::input(node, name))
    }

    /// Handle for an output port
    pub fn output_port(&mut self, node: NodeId, name: &str) -> Option<Port<'_>> {
        self.port(&PortKey::output(node, name))
    }
}

/// A port bound to its graph.
///
/// All mutations are recorded on the graph's undo stack.
#[derive(Debug)]
pub struct Port<'g> {
    graph: &'g mut NodeGraph,
    key: PortKey,
}

impl Port<'_> {
    /// Identity of this port
    pub fn key(&self) -> &PortKey {
        &self.key
    }

    /// Owning node
    pub fn node_id(&self) -> NodeId {
        self.key.node
    }

    /// Port name
    pub fn name(&self) -> &str {
        &self.key.name
    }

    /// Port direction
    pub fn direction(&self) -> PortDirection {
        self.key.direction
    }

    /// Current port state
    pub fn model(&self) -> Option<&PortModel> {
        self.graph.model.port(&self.key)
    }

    /// Whether more than one connection is allowed
    pub fn multi_connection(&self) -> bool {
        self.model().is_some_and(|p| p.multi_connection)
    }

    /// Whether the port is shown
    pub fn visible(&self) -> bool {
        self.model().is_some_and(|p| p.visible)
    }

    /// Whether the port refuses connect/disconnect
    pub fn locked(&self) -> bool {
        self.model().is_some_and(|p| p.locked)
    }

    /// Peers of this port
    pub fn connected_ports(&self) -> Vec<PortKey> {
        self.graph.connected_ports(&self.key)
    }

    /// Connect to `target`
    pub fn connect_to(&mut self, target: &PortKey) -> Result<(), PortError> {
        self.graph.connect_ports(&self.key, target, true)
    }

    /// Disconnect from `target`
    pub fn disconnect_from(&mut self, target: &PortKey) -> Result<(), PortError> {
        self.graph.disconnect_ports(&self.key, target, true)
    }

    /// Disconnect from every peer
    pub fn clear_connections(&mut self) -> Result<(), PortError> {
        self.graph.clear_port_connections(&self.key, true)
    }

    /// Set the lock state, optionally on direct peers too
    pub fn set_locked(&mut self, state: bool, connected_ports: bool) {
        self.graph.set_port_locked(&self.key, state, connected_ports, true);
    }

    /// Lock this port and its direct peers
    pub fn lock(&mut self) {
        self.set_locked(true, true);
    }

    /// Unlock this port and its direct peers
    pub fn unlock(&mut self) {
        self.set_locked(false, true);
    }

    /// Show or hide the port
    pub fn set_visible(&mut self, visible: bool) {
        self.graph.set_port_visible(&self.key, visible, true);
    }

    /// Only allow connections from `node_type`'s `port_type` port `port_name`
    pub fn add_accept_port_type(
        &mut self,
        port_name: &str,
        port_type: PortDirection,
        node_type: &str,
    ) -> Result<(), GraphError> {
        let rule = PortTypeRule::new(port_name, port_type, node_type);
        self.graph.add_accept_port_type(&self.key, &rule)
    }

    /// Forbid connections from `node_type`'s `port_type` port `port_name`
    pub fn add_reject_port_type(
        &mut self,
        port_name: &str,
        port_type: PortDirection,
        node_type: &str,
    ) -> Result<(), GraphError> {
        let rule = PortTypeRule::new(port_name, port_type, node_type);
        self.graph.add_reject_port_type(&self.key, &rule)
    }

    /// Accept rules of this port
    pub fn accepted_port_types(&self) -> ConstraintMap {
        self.graph.accepted_port_types(&self.key)
    }

    /// Reject rules of this port
    pub fn rejected_port_types(&self) -> ConstraintMap {
        self.graph.rejected_port_types(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphModel;
    use crate::node::Node;
    use crate::settings::GraphSettings;
    use crate::viewer::{GraphViewer, NullViewer};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn node(node_type: &str, name: &str, multi_in: bool, multi_out: bool) -> Node {
        let mut node = Node::new(node_type, name);
        node.add_input("in", multi_in).unwrap();
        node.add_output("out", multi_out).unwrap();
        node
    }

    fn add(graph: &mut NodeGraph, node: Node) -> NodeId {
        graph.add_node(node, false).unwrap()
    }

    fn recorder(graph: &mut NodeGraph) -> Rc<RefCell<Vec<(&'static str, PortConnectionEvent)>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        graph.port_connected.connect(move |e| sink.borrow_mut().push(("connected", e.clone())));
        let sink = Rc::clone(&events);
        graph
            .port_disconnected
            .connect(move |e| sink.borrow_mut().push(("disconnected", e.clone())));
        events
    }

    #[test]
    fn test_connect_is_symmetric() {
        let mut graph = NodeGraph::default();
        let a = add(&mut graph, node("test.Pass", "a", false, true));
        let b = add(&mut graph, node("test.Pass", "b", false, true));
        let out = PortKey::output(a, "out");
        let input = PortKey::input(b, "in");

        graph.output_port(a, "out").unwrap().connect_to(&input).unwrap();
        assert_eq!(graph.connected_ports(&out), vec![input.clone()]);
        assert_eq!(graph.connected_ports(&input), vec![out]);
        assert!(graph.model().integrity_violations().is_empty());
        assert_eq!(graph.undo_stack().undo_text(), Some("connect port"));
    }

    #[test]
    fn test_connect_disconnect_round_trip() {
        let mut graph = NodeGraph::default();
        let a = add(&mut graph, node("test.Pass", "a", false, true));
        let b = add(&mut graph, node("test.Pass", "b", false, true));
        let before = graph.model().clone();
        let input = PortKey::input(b, "in");

        let mut port = graph.output_port(a, "out").unwrap();
        port.connect_to(&input).unwrap();
        port.disconnect_from(&input).unwrap();
        assert_eq!(graph.model(), &before);
        assert_eq!(graph.undo_stack().undo_text(), Some("disconnect port"));
    }

    #[test]
    fn test_unknown_or_same_direction_target_is_noop() {
        let mut graph = NodeGraph::default();
        let a = add(&mut graph, node("test.Pass", "a", false, true));
        let b = add(&mut graph, node("test.Pass", "b", false, true));
        let before = graph.model().clone();

        let out = PortKey::output(a, "out");
        graph.connect_ports(&out, &PortKey::input(b, "missing"), true).unwrap();
        graph.connect_ports(&out, &PortKey::output(b, "out"), true).unwrap();
        graph.disconnect_ports(&out, &PortKey::input(b, "in"), true).unwrap();
        assert_eq!(graph.model(), &before);
        assert_eq!(graph.undo_stack().count(), 0);
    }

    #[test]
    fn test_forced_detachment_both_sides() {
        let mut graph = NodeGraph::default();
        let a = add(&mut graph, node("test.Pass", "a", false, false));
        let b = add(&mut graph, node("test.Pass", "b", false, false));
        let c = add(&mut graph, node("test.Pass", "c", false, false));
        let d = add(&mut graph, node("test.Pass", "d", false, false));

        graph.connect_ports(&PortKey::output(a, "out"), &PortKey::input(b, "in"), false).unwrap();
        graph.connect_ports(&PortKey::output(c, "out"), &PortKey::input(d, "in"), false).unwrap();
        let before = graph.model().clone();
        let events = recorder(&mut graph);

        // a.out is single and so is d.in: both lose their previous peer
        graph.connect_ports(&PortKey::output(a, "out"), &PortKey::input(d, "in"), true).unwrap();
        assert_eq!(graph.connected_ports(&PortKey::output(a, "out")), vec![PortKey::input(d, "in")]);
        assert!(graph.connected_ports(&PortKey::input(b, "in")).is_empty());
        assert!(graph.connected_ports(&PortKey::output(c, "out")).is_empty());
        assert!(graph.model().integrity_violations().is_empty());
        assert_eq!(graph.undo_stack().step_len(0), Some(3));
        assert_eq!(events.borrow().len(), 1);

        graph.undo().unwrap();
        assert_eq!(graph.model(), &before);
        graph.redo().unwrap();
        assert!(graph.model().is_connected(&PortKey::output(a, "out"), &PortKey::input(d, "in")));
    }

    #[test]
    fn test_locked_port_refuses_without_mutation() {
        let mut graph = NodeGraph::default();
        let a = add(&mut graph, node("test.Pass", "a", false, true));
        let b = add(&mut graph, node("test.Pass", "b", false, true));
        let out = PortKey::output(a, "out");
        let input = PortKey::input(b, "in");

        graph.set_port_locked(&out, true, true, false);
        let before = graph.model().clone();

        let err = graph.port(&out).unwrap().connect_to(&input).unwrap_err();
        assert_eq!(err, PortError::ConnectLocked("out".into()));
        assert_eq!(graph.model(), &before);
        assert_eq!(graph.undo_stack().count(), 0);

        // Target side is named when only it is locked
        graph.set_port_locked(&out, false, false, false);
        graph.set_port_locked(&input, true, false, false);
        let err = graph.connect_ports(&out, &input, true).unwrap_err();
        assert_eq!(err, PortError::ConnectLocked("in".into()));

        graph.set_port_locked(&input, false, false, false);
        graph.connect_ports(&out, &input, true).unwrap();
        graph.set_port_locked(&input, true, false, false);
        let err = graph.disconnect_ports(&out, &input, true).unwrap_err();
        assert_eq!(err, PortError::DisconnectLocked("in".into()));
        assert!(graph.model().is_connected(&out, &input));
    }

    #[test]
    fn test_accept_rule_drops_other_ports() {
        let mut graph = NodeGraph::default();
        let mut publish = Node::new("publish", "Publish");
        publish.add_output("write", true).unwrap();
        publish.add_output("foo", true).unwrap();
        let publish = add(&mut graph, publish);
        let sink = add(&mut graph, node("test.Sink", "sink", false, true));
        let input = PortKey::input(sink, "in");

        graph
            .port(&input)
            .unwrap()
            .add_accept_port_type("write", PortDirection::Output, "publish")
            .unwrap();
        let events = recorder(&mut graph);

        graph.connect_ports(&PortKey::output(publish, "foo"), &input, true).unwrap();
        assert!(graph.connected_ports(&input).is_empty());
        assert_eq!(graph.undo_stack().count(), 0);

        graph.connect_ports(&PortKey::output(publish, "write"), &input, true).unwrap();
        assert_eq!(graph.connected_ports(&input), vec![PortKey::output(publish, "write")]);
        assert_eq!(events.borrow().len(), 1);
    }

    #[test]
    fn test_reject_rule_both_directions() {
        let mut graph = NodeGraph::default();
        let a = add(&mut graph, node("test.Source", "a", true, true));
        let b = add(&mut graph, node("test.Sink", "b", true, true));
        let out = PortKey::output(a, "out");
        let input = PortKey::input(b, "in");

        // Rule held by the target
        graph
            .add_reject_port_type(&input, &PortTypeRule::new("out", PortDirection::Output, "test.Source"))
            .unwrap();
        graph.connect_ports(&out, &input, true).unwrap();
        graph.connect_ports(&input, &out, true).unwrap();
        assert!(!graph.model().is_connected(&out, &input));

        // Rule held by the source
        let back_out = PortKey::output(b, "out");
        let back_in = PortKey::input(a, "in");
        graph
            .add_reject_port_type(&back_out, &PortTypeRule::new("in", PortDirection::Input, "test.Source"))
            .unwrap();
        graph.connect_ports(&back_out, &back_in, true).unwrap();
        graph.connect_ports(&back_in, &back_out, true).unwrap();
        assert!(!graph.model().is_connected(&back_out, &back_in));
        assert_eq!(graph.undo_stack().count(), 0);
    }

    #[test]
    fn test_cycle_drops_previous_connection() {
        let mut graph = NodeGraph::default();
        let w = add(&mut graph, node("test.Pass", "w", false, true));
        let x = add(&mut graph, node("test.Pass", "x", false, false));
        let y = add(&mut graph, node("test.Pass", "y", false, true));
        graph.connect_ports(&PortKey::output(w, "out"), &PortKey::input(x, "in"), false).unwrap();
        graph.connect_ports(&PortKey::output(x, "out"), &PortKey::input(y, "in"), false).unwrap();
        let events = recorder(&mut graph);

        // x.out -> w.in would close w -> x -> w
        graph.connect_ports(&PortKey::output(x, "out"), &PortKey::input(w, "in"), true).unwrap();
        assert!(!graph.model().is_connected(&PortKey::output(x, "out"), &PortKey::input(y, "in")));
        assert!(!graph.model().is_connected(&PortKey::output(x, "out"), &PortKey::input(w, "in")));
        assert!(graph.model().is_connected(&PortKey::output(w, "out"), &PortKey::input(x, "in")));
        assert!(!graph.model().has_cycle());
        assert_eq!(graph.undo_stack().undo_text(), Some("connect port"));
        assert!(events.borrow().is_empty());

        graph.undo().unwrap();
        assert!(graph.model().is_connected(&PortKey::output(x, "out"), &PortKey::input(y, "in")));
    }

    #[test]
    fn test_cycle_allowed_when_not_acyclic() {
        let settings = GraphSettings {
            acyclic: false,
            ..GraphSettings::default()
        };
        let mut graph = NodeGraph::new(settings);
        let a = add(&mut graph, node("test.Pass", "a", false, true));
        let b = add(&mut graph, node("test.Pass", "b", false, true));
        graph.connect_ports(&PortKey::output(a, "out"), &PortKey::input(b, "in"), true).unwrap();
        graph.connect_ports(&PortKey::output(b, "out"), &PortKey::input(a, "in"), true).unwrap();
        assert!(graph.model().has_cycle());
    }

    struct ForcingViewer;

    impl GraphViewer for ForcingViewer {
        fn validate_accept_constraint(&self, _: &GraphModel, _: &PortKey, _: &PortKey) -> bool {
            true
        }

        fn would_create_cycle(&self, model: &GraphModel, source: &PortKey, target: &PortKey) -> bool {
            model.would_create_cycle(source, target)
        }
    }

    #[test]
    fn test_accept_override_keeps_prior_edge_on_cycle() {
        let mut graph = NodeGraph::with_viewer(GraphSettings::default(), Box::new(ForcingViewer));
        let w = add(&mut graph, node("test.Pass", "w", false, true));
        let x = add(&mut graph, node("test.Pass", "x", false, false));
        let y = add(&mut graph, node("test.Pass", "y", false, true));
        graph.connect_ports(&PortKey::output(w, "out"), &PortKey::input(x, "in"), false).unwrap();
        graph.connect_ports(&PortKey::output(x, "out"), &PortKey::input(y, "in"), false).unwrap();
        let before = graph.model().clone();

        graph.connect_ports(&PortKey::output(x, "out"), &PortKey::input(w, "in"), true).unwrap();
        assert_eq!(graph.model(), &before);
        assert_eq!(graph.undo_stack().count(), 0);
    }

    #[test]
    fn test_null_viewer_never_reports_cycles() {
        let mut graph = NodeGraph::with_viewer(GraphSettings::default(), Box::new(NullViewer));
        let a = add(&mut graph, node("test.Pass", "a", false, true));
        graph.connect_ports(&PortKey::output(a, "out"), &PortKey::input(a, "in"), true).unwrap();
        assert!(graph.model().has_cycle());
    }

    #[test]
    fn test_lock_propagates_one_hop() {
        let mut graph = NodeGraph::default();
        let a = add(&mut graph, node("test.Pass", "a", false, true));
        let b = add(&mut graph, node("test.Pass", "b", false, true));
        let c = add(&mut graph, node("test.Pass", "c", false, true));
        graph.connect_ports(&PortKey::output(a, "out"), &PortKey::input(b, "in"), false).unwrap();
        graph.connect_ports(&PortKey::output(b, "out"), &PortKey::input(c, "in"), false).unwrap();

        graph.output_port(a, "out").unwrap().lock();
        let locked = |graph: &NodeGraph, key: PortKey| graph.port_model(&key).unwrap().locked;
        assert!(locked(&graph, PortKey::output(a, "out")));
        assert!(locked(&graph, PortKey::input(b, "in")));
        assert!(!locked(&graph, PortKey::output(b, "out")));
        assert!(!locked(&graph, PortKey::input(c, "in")));
        assert_eq!(graph.undo_stack().count(), 1);
        assert_eq!(graph.undo_stack().undo_text(), Some("lock port"));

        // Already locked: nothing recorded
        graph.output_port(a, "out").unwrap().lock();
        assert_eq!(graph.undo_stack().count(), 1);

        graph.undo().unwrap();
        assert!(!locked(&graph, PortKey::input(b, "in")));
    }

    #[test]
    fn test_clear_connections_is_one_step() {
        let mut graph = NodeGraph::default();
        let src = add(&mut graph, node("test.Pass", "src", false, true));
        let sinks: Vec<NodeId> = (0..3)
            .map(|i| add(&mut graph, node("test.Pass", &format!("sink{i}"), false, true)))
            .collect();
        let out = PortKey::output(src, "out");
        for sink in &sinks {
            graph.connect_ports(&out, &PortKey::input(*sink, "in"), false).unwrap();
        }
        let before = graph.model().clone();
        let events = recorder(&mut graph);

        graph.port(&out).unwrap().clear_connections().unwrap();
        assert!(graph.connected_ports(&out).is_empty());
        assert_eq!(graph.undo_stack().count(), 1);
        assert_eq!(graph.undo_stack().undo_text(), Some("\"out\" clear connections"));
        assert_eq!(events.borrow().len(), 3);

        graph.undo().unwrap();
        assert_eq!(graph.model(), &before);
    }

    #[test]
    fn test_clear_connections_lock_errors() {
        let mut graph = NodeGraph::default();
        let a = add(&mut graph, node("test.Pass", "a", false, true));
        let b = add(&mut graph, node("test.Pass", "b", false, true));
        let out = PortKey::output(a, "out");
        let input = PortKey::input(b, "in");
        graph.connect_ports(&out, &input, false).unwrap();

        graph.set_port_locked(&out, true, false, false);
        assert_eq!(
            graph.clear_port_connections(&out, true),
            Err(PortError::ClearLocked("out".into()))
        );

        graph.set_port_locked(&out, false, false, false);
        graph.set_port_locked(&input, true, false, false);
        assert_eq!(
            graph.clear_port_connections(&out, true),
            Err(PortError::DisconnectLocked("in".into()))
        );
        assert!(graph.model().is_connected(&out, &input));
        assert_eq!(graph.undo_stack().count(), 0);
    }

    #[test]
    fn test_disconnect_all_reports_refusal() {
        let mut graph = NodeGraph::default();
        let src = add(&mut graph, node("test.Pass", "src", false, true));
        let a = add(&mut graph, node("test.Pass", "a", false, true));
        let b = add(&mut graph, node("test.Pass", "b", false, true));
        let out = PortKey::output(src, "out");
        graph.connect_ports(&out, &PortKey::input(a, "in"), false).unwrap();
        graph.connect_ports(&out, &PortKey::input(b, "in"), false).unwrap();
        graph.set_port_locked(&PortKey::input(b, "in"), true, false, false);

        let pairs = vec![
            (out.clone(), PortKey::input(a, "in")),
            (out.clone(), PortKey::input(b, "in")),
        ];
        let err = graph.disconnect_all("clear", pairs, true).unwrap_err();
        assert_eq!(err, PortError::DisconnectLocked("in".into()));
        assert!(!graph.undo_stack().in_macro());
        assert!(!graph.model().is_connected(&out, &PortKey::input(a, "in")));
        assert!(graph.model().is_connected(&out, &PortKey::input(b, "in")));

        // The partial step stays undoable
        graph.undo().unwrap();
        assert!(graph.model().is_connected(&out, &PortKey::input(a, "in")));
    }

    #[test]
    fn test_notifications_are_input_first() {
        let mut graph = NodeGraph::default();
        let a = add(&mut graph, node("test.Pass", "a", false, true));
        let b = add(&mut graph, node("test.Pass", "b", false, true));
        let out = PortKey::output(a, "out");
        let input = PortKey::input(b, "in");
        let events = recorder(&mut graph);

        // Initiated from the input side
        graph.connect_ports(&input, &out, true).unwrap();
        graph.disconnect_ports(&out, &input, true).unwrap();

        let expected = PortConnectionEvent {
            input: input.clone(),
            output: out.clone(),
        };
        assert_eq!(
            *events.borrow(),
            vec![("connected", expected.clone()), ("disconnected", expected)]
        );
    }

    #[test]
    fn test_visibility() {
        let mut graph = NodeGraph::default();
        let a = add(&mut graph, node("test.Pass", "a", false, true));

        let mut port = graph.input_port(a, "in").unwrap();
        port.set_visible(false);
        port.set_visible(false);
        assert!(!port.visible());
        assert_eq!(graph.undo_stack().count(), 1);
        assert_eq!(graph.undo_stack().undo_text(), Some("port visible"));

        graph.undo().unwrap();
        assert!(graph.port_model(&PortKey::input(a, "in")).unwrap().visible);
    }

    #[test]
    fn test_push_undo_false_bypasses_history() {
        let mut graph = NodeGraph::default();
        let a = add(&mut graph, node("test.Pass", "a", false, true));
        let b = add(&mut graph, node("test.Pass", "b", false, true));
        let out = PortKey::output(a, "out");
        let input = PortKey::input(b, "in");

        graph.connect_ports(&out, &input, false).unwrap();
        graph.set_port_locked(&out, true, true, false);
        graph.set_port_visible(&out, false, false);
        assert!(graph.model().is_connected(&out, &input));
        assert!(graph.port_model(&input).unwrap().locked);
        assert_eq!(graph.undo_stack().count(), 0);
        assert!(!graph.is_modified());
    }
}
