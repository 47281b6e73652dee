// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node graph core for Portloom.
//!
//! This crate provides the model behind a node-graph editor:
//! - Ports with single or multi connections, lock and visibility state
//! - Accept/reject connection constraints keyed by node type
//! - An undoable connect/disconnect protocol with forced detachment
//! - Acyclic graph enforcement
//! - JSON sessions and RON settings
//!
//! ## Architecture
//!
//! A [`NodeGraph`] owns the [`GraphModel`], the undo stack and the change
//! signals. All mutations go through [`GraphCommand`]s, so every edge is
//! always recorded on both of its ports. Rendering is left to a
//! [`GraphViewer`] implementation.

pub mod commands;
pub mod connection;
pub mod constraint;
pub mod graph;
pub mod node;
pub mod node_graph;
pub mod port;
pub mod session;
pub mod settings;
pub mod signal;
pub mod viewer;

pub use commands::GraphCommand;
pub use connection::Port;
pub use constraint::{ConnectionConstraints, ConstraintMap, PortTypeRule};
pub use graph::{CycleError, GraphError, GraphModel};
pub use node::{Node, NodeId, NodeRegistry};
pub use node_graph::NodeGraph;
pub use port::{PortDirection, PortError, PortKey, PortModel};
pub use session::SessionData;
pub use settings::GraphSettings;
pub use signal::{PortConnectionEvent, PropertyChangedEvent, Signal, SlotId};
pub use viewer::{GraphViewer, NullViewer, TopologyViewer};

pub use portloom_history::{HistoryError, UndoCommand, UndoStack};
