//! `memory-cli node` / `memory-cli edge` — ad-hoc graph inspection and mutation.

use clap::Subcommand;
use serde::Serialize;
use uuid::Uuid;

use memory_core::audit::{self, Actor};
use memory_core::graph;
use memory_core::storage::{AuditStore, GraphStore};
use memory_core::types::{Node, Properties};

use crate::config::Stores;
use crate::output::{Output, OutputFormat};

#[derive(Subcommand)]
pub enum NodeCommands {
    /// Create or update a node by `(project, name)`.
    Add {
        project: String,
        label: String,
        name: String,
    },
    /// Fetch a node by `(project, name)`.
    Get { project: String, name: String },
}

#[derive(Subcommand)]
pub enum EdgeCommands {
    /// Create or update an edge between two existing nodes.
    Add {
        project: String,
        source_id: Uuid,
        target_id: Uuid,
        relation: String,
        #[arg(default_value_t = 1.0)]
        weight: f32,
    },
    /// Delete an edge, honoring the constitutive-edge guard.
    Delete {
        project: String,
        edge_id: Uuid,
        #[arg(long)]
        consent: bool,
    },
}

#[derive(Debug, Serialize)]
struct NodeView {
    found: bool,
    node: Option<Node>,
}

impl Output for NodeView {
    fn write_human<W: std::io::Write>(&self, mut writer: W) -> anyhow::Result<()> {
        match &self.node {
            Some(n) => writeln!(writer, "{} ({}) [{}]", n.name, n.label, n.id)?,
            None => writeln!(writer, "not found")?,
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct EdgeAddView {
    edge_id: Uuid,
    status: &'static str,
}

impl Output for EdgeAddView {
    fn write_human<W: std::io::Write>(&self, mut writer: W) -> anyhow::Result<()> {
        writeln!(writer, "edge {} {}", self.edge_id, self.status)?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct DeleteOutcome {
    blocked: bool,
    reason: String,
}

impl Output for DeleteOutcome {
    fn write_human<W: std::io::Write>(&self, mut writer: W) -> anyhow::Result<()> {
        writeln!(writer, "{}", self.reason)?;
        Ok(())
    }
}

pub async fn handle_node(cmd: NodeCommands, stores: &Stores, format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        NodeCommands::Add { project, label, name } => {
            let existing = stores.turso.find_node(&project, &name).await?;
            let node = graph::upsert_node(existing, &project, &label, &name, Properties::new());
            stores.turso.put_node(node.clone()).await?;
            format.print_output(&NodeView { found: true, node: Some(node) })
        }
        NodeCommands::Get { project, name } => {
            let node = stores.turso.find_node(&project, &name).await?;
            format.print_output(&NodeView { found: node.is_some(), node })
        }
    }
}

pub async fn handle_edge(cmd: EdgeCommands, stores: &Stores, format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        EdgeCommands::Add { project, source_id, target_id, relation, weight } => {
            let existing = stores.turso.find_edge(&project, source_id, target_id, &relation).await?;
            let edge = graph::upsert_edge(
                existing,
                &project,
                source_id,
                target_id,
                &relation,
                weight,
                Properties::new(),
            );
            stores.turso.put_edge(edge.clone()).await?;
            format.print_output(&EdgeAddView { edge_id: edge.id, status: "ok" })
        }
        EdgeCommands::Delete { project, edge_id, consent } => {
            let edge = stores
                .turso
                .find_edge_by_id(&project, edge_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("edge {edge_id} not found in project {project}"))?;

            let (entry, result) = audit::attempt_delete(&edge, consent, Actor::Io);
            stores.turso.append(entry.clone()).await?;

            if result.is_ok() {
                stores.turso.delete_edge(&project, edge_id).await?;
            }

            format.print_output(&DeleteOutcome {
                blocked: entry.blocked,
                reason: entry.reason,
            })
        }
    }
}
