// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    #[serde(rename = "in")]
    Input,
    /// Output port
    #[serde(rename = "out")]
    Output,
}

impl PortDirection {
    /// The direction a connected peer must have
    pub fn opposite(self) -> Self {
        match self {
            Self::Input => Self::Output,
            Self::Output => Self::Input,
        }
    }
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("in"),
            Self::Output => f.write_str("out"),
        }
    }
}

/// Identity of a port: owning node, name and direction
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortKey {
    /// Owning node
    pub node: NodeId,
    /// Port name, unique per node and direction
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
}

impl PortKey {
    /// Create a key for an arbitrary port
    pub fn new(node: NodeId, name: impl Into<String>, direction: PortDirection) -> Self {
        Self {
            node,
            name: name.into(),
            direction,
        }
    }

    /// Key for an input port
    pub fn input(node: NodeId, name: impl Into<String>) -> Self {
        Self::new(node, name, PortDirection::Input)
    }

    /// Key for an output port
    pub fn output(node: NodeId, name: impl Into<String>) -> Self {
        Self::new(node, name, PortDirection::Output)
    }
}

impl fmt::Display for PortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.node, self.direction, self.name)
    }
}

/// Connections held by one port, keyed by peer node
pub type ConnectedPorts = BTreeMap<NodeId, BTreeSet<String>>;

/// Plain data held for a port.
///
/// No validation happens here; the connection protocol on
/// [`NodeGraph`](crate::NodeGraph) keeps both sides of an edge in sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortModel {
    /// Port name
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Whether multiple connections are allowed
    pub multi_connection: bool,
    /// Whether the port is shown
    pub visible: bool,
    /// Locked ports refuse connect/disconnect
    pub locked: bool,
    /// Connected peers: node id to peer port names
    pub connected_ports: ConnectedPorts,
}

impl PortModel {
    /// Create a new port
    pub fn new(name: impl Into<String>, direction: PortDirection, multi_connection: bool) -> Self {
        Self {
            name: name.into(),
            direction,
            multi_connection,
            visible: true,
            locked: false,
            connected_ports: ConnectedPorts::new(),
        }
    }

    /// Create a new input port (single connection unless `multi_input`)
    pub fn input(name: impl Into<String>, multi_input: bool) -> Self {
        Self::new(name, PortDirection::Input, multi_input)
    }

    /// Create a new output port
    pub fn output(name: impl Into<String>, multi_output: bool) -> Self {
        Self::new(name, PortDirection::Output, multi_output)
    }

    /// Record a peer. Returns `false` if it was already recorded.
    pub fn add_connection(&mut self, node: NodeId, port_name: &str) -> bool {
        self.connected_ports
            .entry(node)
            .or_default()
            .insert(port_name.to_owned())
    }

    /// Forget a peer. Empty node entries are removed.
    pub fn remove_connection(&mut self, node: NodeId, port_name: &str) -> bool {
        let Some(names) = self.connected_ports.get_mut(&node) else {
            return false;
        };
        let removed = names.remove(port_name);
        if names.is_empty() {
            self.connected_ports.remove(&node);
        }
        removed
    }

    /// Whether any peer is recorded
    pub fn has_connection(&self) -> bool {
        !self.connected_ports.is_empty()
    }

    /// Whether `node`/`port_name` is recorded as a peer
    pub fn is_connected_to(&self, node: NodeId, port_name: &str) -> bool {
        self.connected_ports
            .get(&node)
            .is_some_and(|names| names.contains(port_name))
    }

    /// Number of recorded peers
    pub fn connection_count(&self) -> usize {
        self.connected_ports.values().map(BTreeSet::len).sum()
    }

    /// Peer keys, in node id then port name order
    pub fn peers(&self) -> impl Iterator<Item = PortKey> + '_ {
        let direction = self.direction.opposite();
        self.connected_ports.iter().flat_map(move |(node, names)| {
            names
                .iter()
                .map(move |name| PortKey::new(*node, name.clone(), direction))
        })
    }
}

/// Error raised by the connection protocol.
///
/// Always returned before any state is touched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    /// Connect refused because a port is locked
    #[error("Can't connect port because \"{0}\" is locked.")]
    ConnectLocked(String),

    /// Disconnect refused because a port is locked
    #[error("Can't disconnect port because \"{0}\" is locked.")]
    DisconnectLocked(String),

    /// Clear refused because the port is locked
    #[error("Can't clear connections because port \"{0}\" is locked.")]
    ClearLocked(String),
}
