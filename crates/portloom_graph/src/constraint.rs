// SPDX-License-Identifier: MIT OR Apache-2.0
//! Accept/reject connection constraints.
//!
//! Rules live on the node rather than on each port so sibling ports do not
//! serialize the same data. A node's table is keyed by its own port and
//! lists, per peer node type and peer direction, the peer port names the
//! rule applies to.

use crate::port::PortDirection;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// `{node_type: {port_direction: {port_name}}}` for one port
pub type ConstraintMap = BTreeMap<String, BTreeMap<PortDirection, BTreeSet<String>>>;

/// Rules for every port of a node, keyed by direction then port name
pub type PortRuleTable = BTreeMap<PortDirection, BTreeMap<String, ConstraintMap>>;

/// A peer port description used when registering a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortTypeRule {
    /// Peer port name
    pub port_name: String,
    /// Peer port direction
    pub port_type: PortDirection,
    /// Peer node type
    pub node_type: String,
}

impl PortTypeRule {
    /// Create a new rule
    pub fn new(
        port_name: impl Into<String>,
        port_type: PortDirection,
        node_type: impl Into<String>,
    ) -> Self {
        Self {
            port_name: port_name.into(),
            port_type,
            node_type: node_type.into(),
        }
    }
}

/// Accept and reject tables of one node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConstraints {
    /// Accept rules
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub accept: PortRuleTable,
    /// Reject rules
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub reject: PortRuleTable,
}

fn insert_rule(table: &mut PortRuleTable, direction: PortDirection, port: &str, rule: &PortTypeRule) {
    table
        .entry(direction)
        .or_default()
        .entry(port.to_owned())
        .or_default()
        .entry(rule.node_type.clone())
        .or_default()
        .entry(rule.port_type)
        .or_default()
        .insert(rule.port_name.clone());
}

fn lookup<'a>(table: &'a PortRuleTable, direction: PortDirection, port: &str) -> Option<&'a ConstraintMap> {
    table.get(&direction).and_then(|ports| ports.get(port))
}

impl ConnectionConstraints {
    /// Only ports matching this rule (and other accept rules for the same
    /// node type) may connect to `port`
    pub fn add_accept(&mut self, direction: PortDirection, port: &str, rule: &PortTypeRule) {
        insert_rule(&mut self.accept, direction, port, rule);
    }

    /// Ports matching this rule may not connect to `port`
    pub fn add_reject(&mut self, direction: PortDirection, port: &str, rule: &PortTypeRule) {
        insert_rule(&mut self.reject, direction, port, rule);
    }

    /// Accept rules registered for `port`; empty means unconstrained
    pub fn accepted_port_types(&self, direction: PortDirection, port: &str) -> ConstraintMap {
        lookup(&self.accept, direction, port).cloned().unwrap_or_default()
    }

    /// Reject rules registered for `port`; empty means nothing is forbidden
    pub fn rejected_port_types(&self, direction: PortDirection, port: &str) -> ConstraintMap {
        lookup(&self.reject, direction, port).cloned().unwrap_or_default()
    }

    /// Whether `port` accepts a peer.
    ///
    /// Rules only bind peers of a node type they mention. Once a node type
    /// has rules, the peer name must be listed under the peer direction.
    pub fn accepts(
        &self,
        direction: PortDirection,
        port: &str,
        peer_node_type: &str,
        peer_direction: PortDirection,
        peer_name: &str,
    ) -> bool {
        let by_direction = lookup(&self.accept, direction, port).and_then(|m| m.get(peer_node_type));
        match by_direction {
            Some(by_direction) if !by_direction.is_empty() => by_direction
                .get(&peer_direction)
                .is_some_and(|names| names.contains(peer_name)),
            _ => true,
        }
    }

    /// Whether `port` rejects a peer
    pub fn rejects(
        &self,
        direction: PortDirection,
        port: &str,
        peer_node_type: &str,
        peer_direction: PortDirection,
        peer_name: &str,
    ) -> bool {
        lookup(&self.reject, direction, port)
            .and_then(|m| m.get(peer_node_type))
            .and_then(|by_direction| by_direction.get(&peer_direction))
            .is_some_and(|names| names.contains(peer_name))
    }

    /// Whether no rule is registered at all
    pub fn is_empty(&self) -> bool {
        self.accept.is_empty() && self.reject.is_empty()
    }
}
