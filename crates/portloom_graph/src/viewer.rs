// SPDX-License-Identifier: MIT OR Apache-2.0
//! Capabilities the presentation layer provides to the connection protocol.

use crate::graph::GraphModel;
use crate::port::PortKey;

/// Queries the connection protocol asks the viewer.
///
/// Both are advisory and must not mutate anything. The defaults describe a
/// graph with no presentation attached.
pub trait GraphViewer {
    /// UI-level override of accept rules, e.g. a user-forced reconnect.
    ///
    /// When `false`, connecting a port already connected to `target` is
    /// skipped, and a cycle-forming request drops the source's previous
    /// single connection.
    fn validate_accept_constraint(&self, _model: &GraphModel, _source: &PortKey, _target: &PortKey) -> bool {
        false
    }

    /// Whether the edge `source`-`target` would close a cycle
    fn would_create_cycle(&self, _model: &GraphModel, _source: &PortKey, _target: &PortKey) -> bool {
        false
    }
}

/// No presentation attached: no overrides, no cycle reports
#[derive(Debug, Clone, Copy, Default)]
pub struct NullViewer;

impl GraphViewer for NullViewer {}

/// Answers cycle queries from the graph topology
#[derive(Debug, Clone, Copy, Default)]
pub struct TopologyViewer;

impl GraphViewer for TopologyViewer {
    fn would_create_cycle(&self, model: &GraphModel, source: &PortKey, target: &PortKey) -> bool {
        model.would_create_cycle(source, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    #[test]
    fn test_null_viewer_reports_nothing() {
        let mut model = GraphModel::new(true);
        let mut node = Node::new("test.Loop", "Loop");
        node.add_input("in", false).unwrap();
        node.add_output("out", true).unwrap();
        let out = PortKey::output(node.id, "out");
        let input = PortKey::input(node.id, "in");
        model.insert_node(node, None);

        assert!(!NullViewer.would_create_cycle(&model, &out, &input));
        assert!(!NullViewer.validate_accept_constraint(&model, &out, &input));
        assert!(TopologyViewer.would_create_cycle(&model, &out, &input));
    }
}
