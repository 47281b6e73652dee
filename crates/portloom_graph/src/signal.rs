// SPDX-License-Identifier: MIT OR Apache-2.0
//! Change notifications emitted by the graph.

use crate::node::NodeId;
use crate::port::{PortDirection, PortKey};
use serde_json::Value;

/// Callback type for signal listeners
pub type SignalCallback<E> = Box<dyn FnMut(&E)>;

/// Handle returned by [`Signal::connect`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(u64);

/// Synchronous fan-out to any number of listeners, in connection order
pub struct Signal<E> {
    slots: Vec<(SlotId, SignalCallback<E>)>,
    next_id: u64,
}

impl<E> Signal<E> {
    /// Create a signal without listeners
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            next_id: 0,
        }
    }

    /// Register a listener
    pub fn connect(&mut self, callback: impl FnMut(&E) + 'static) -> SlotId {
        let id = SlotId(self.next_id);
        self.next_id += 1;
        self.slots.push((id, Box::new(callback)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn disconnect(&mut self, id: SlotId) -> bool {
        let before = self.slots.len();
        self.slots.retain(|(slot, _)| *slot != id);
        self.slots.len() != before
    }

    /// Call every listener with `event`
    pub fn emit(&mut self, event: &E) {
        for (_, callback) in &mut self.slots {
            callback(event);
        }
    }

    /// Number of listeners
    pub fn listener_count(&self) -> usize {
        self.slots.len()
    }
}

impl<E> Default for Signal<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for Signal<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("listeners", &self.slots.len())
            .finish()
    }
}

/// Payload of `port_connected` / `port_disconnected`, always ordered
/// input first regardless of which side initiated the call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortConnectionEvent {
    /// The input side of the edge
    pub input: PortKey,
    /// The output side of the edge
    pub output: PortKey,
}

impl PortConnectionEvent {
    /// Order an edge's two ends
    pub fn from_pair(a: &PortKey, b: &PortKey) -> Self {
        let (input, output) = if a.direction == PortDirection::Input {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        };
        Self { input, output }
    }
}

/// Payload of `property_changed`
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyChangedEvent {
    /// Owning node
    pub node: NodeId,
    /// Property name
    pub name: String,
    /// New value
    pub value: Value,
}
