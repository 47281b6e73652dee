// SPDX-License-Identifier: MIT OR Apache-2.0
//! Subcommand implementations.

use std::path::Path;

use anyhow::{bail, Context, Result};
use portloom_graph::{GraphSettings, NodeGraph, SessionData};

fn read_session(session: &Path) -> Result<SessionData> {
    let content = std::fs::read_to_string(session)
        .with_context(|| format!("Failed to load session {}", session.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to load session {}", session.display()))
}

fn load_graph(session: &Path, settings: GraphSettings) -> Result<NodeGraph> {
    let mut graph = NodeGraph::new(settings);
    graph
        .load_session(session)
        .with_context(|| format!("Failed to load session {}", session.display()))?;
    Ok(graph)
}

/// Print a node/port/connection summary
pub fn inspect(session: &Path, json: bool) -> Result<()> {
    let graph = load_graph(session, GraphSettings::default())?;
    let data = graph.serialize_session();
    let connection_count = data.connections.as_ref().map_or(0, Vec::len);

    if json {
        let nodes: Vec<_> = graph
            .nodes()
            .map(|node| {
                serde_json::json!({
                    "id": node.id,
                    "type": node.node_type,
                    "name": node.name,
                    "inputs": node.inputs().map(|p| p.name.as_str()).collect::<Vec<_>>(),
                    "outputs": node.outputs().map(|p| p.name.as_str()).collect::<Vec<_>>(),
                })
            })
            .collect();
        let summary = serde_json::json!({
            "acyclic": graph.acyclic(),
            "nodes": nodes,
            "connections": connection_count,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Session: {}", session.display());
    println!("  acyclic: {}", graph.acyclic());
    println!("  nodes: {}", graph.node_count());
    println!("  connections: {connection_count}");
    for node in graph.nodes() {
        println!();
        println!("{} ({}) [{}]", node.name, node.node_type, node.id);
        for port in node.ports() {
            let mut flags = Vec::new();
            if port.multi_connection {
                flags.push("multi");
            }
            if port.locked {
                flags.push("locked");
            }
            if !port.visible {
                flags.push("hidden");
            }
            println!(
                "  {:<3} {:<16} {:>2} connection(s) {}",
                port.direction.to_string(),
                port.name,
                port.connection_count(),
                flags.join(",")
            );
        }
    }
    Ok(())
}

/// Invariant violations of a graph loaded from `data`.
///
/// Edges of the file that the connect rules refused count as violations.
pub fn violations(graph: &NodeGraph, data: &SessionData) -> Vec<String> {
    let mut found = graph.model().integrity_violations();
    if graph.acyclic() && graph.model().has_cycle() {
        found.push("graph is acyclic but contains a cycle".to_owned());
    }
    for edge in data.edges() {
        let (input, output) = edge.keys();
        if !graph.model().is_connected(&input, &output) {
            found.push(format!("connection {output} -> {input} dropped on load"));
        }
    }
    found
}

/// Verify edge symmetry, single connections and acyclicity
pub fn check(session: &Path, settings: Option<&Path>) -> Result<()> {
    let settings = match settings {
        Some(path) => Some(
            GraphSettings::load(path).with_context(|| format!("Failed to load settings {}", path.display()))?,
        ),
        None => None,
    };

    let mut data = read_session(session)?;
    if let Some(settings) = &settings {
        data.graph.acyclic = settings.acyclic;
    }
    let mut graph = NodeGraph::new(settings.unwrap_or_default());
    graph
        .deserialize_session(&data)
        .with_context(|| format!("Failed to load session {}", session.display()))?;

    let found = violations(&graph, &data);
    if found.is_empty() {
        println!("{}: ok ({} nodes)", session.display(), graph.node_count());
        return Ok(());
    }
    for violation in &found {
        println!("{}: {violation}", session.display());
    }
    bail!("{} violation(s) found", found.len());
}

/// Load a session and write it back in canonical form
pub fn format(session: &Path, output: Option<&Path>) -> Result<()> {
    let mut graph = load_graph(session, GraphSettings::default())?;
    let output = output.unwrap_or(session);
    graph
        .save_session(output)
        .with_context(|| format!("Failed to write session {}", output.display()))?;
    tracing::info!(nodes = graph.node_count(), "formatted {}", output.display());
    Ok(())
}
