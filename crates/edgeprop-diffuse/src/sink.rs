//! Hand-off of final labels to persistence and visualization.
//!
//! A [`LabeledGraph`] packages the topology, the pass-through attributes and
//! the labels. Sinks read it as is; nothing is transformed beyond packaging.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use edgeprop_core::{EdgeAttributes, EdgeId, GraphStore, Instance, StateLabel};
use serde::Serialize;
use tracing::info;

use crate::label::EdgeLabels;

/// One labeled edge, borrowing from the graph and attribute table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabeledEdge<'a> {
    pub id: EdgeId,
    pub u: &'a str,
    pub v: &'a str,
    pub geometry: Option<&'a str>,
    pub state: StateLabel,
}

impl LabeledEdge<'_> {
    #[must_use]
    pub fn to_owned_record(&self) -> OwnedLabeledEdge {
        OwnedLabeledEdge {
            id: self.id,
            u: self.u.to_string(),
            v: self.v.to_string(),
            geometry: self.geometry.map(str::to_string),
            state: self.state,
        }
    }
}

/// Owned form of [`LabeledEdge`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnedLabeledEdge {
    pub id: EdgeId,
    pub u: String,
    pub v: String,
    pub geometry: Option<String>,
    pub state: StateLabel,
}

/// Final labels together with what consumers need to place them.
#[derive(Debug, Clone, Copy)]
pub struct LabeledGraph<'a> {
    pub graph: &'a GraphStore,
    pub attributes: &'a EdgeAttributes,
    pub labels: &'a EdgeLabels,
}

impl<'a> LabeledGraph<'a> {
    /// Labeled edges in edge-id order.
    pub fn edges(&self) -> impl Iterator<Item = LabeledEdge<'a>> + 'a {
        let graph: &'a GraphStore = self.graph;
        let attributes: &'a EdgeAttributes = self.attributes;
        let labels: &'a EdgeLabels = self.labels;
        let geometry = attributes.geometry();
        graph.edges().filter_map(move |id| {
            let (u, v) = graph.endpoint_keys(id)?;
            Some(LabeledEdge {
                id,
                u,
                v,
                geometry: geometry.and_then(|g| g.get(id)).map(String::as_str),
                state: labels.get(id)?,
            })
        })
    }
}

/// A consumer of final labels.
pub trait ResultSink {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Deliver the labels.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying collaborator fails.
    fn publish(&mut self, results: &LabeledGraph<'_>) -> Result<()>;
}

/// Collects labeled edges in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: Vec<OwnedLabeledEdge>,
}

impl ResultSink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn publish(&mut self, results: &LabeledGraph<'_>) -> Result<()> {
        self.records = results.edges().map(|e| e.to_owned_record()).collect();
        Ok(())
    }
}

/// Writes the `state` attribute side file of an instance.
#[derive(Debug)]
pub struct StateAttributeSink {
    instance: Instance,
    written: Option<PathBuf>,
}

impl StateAttributeSink {
    #[must_use]
    pub const fn new(instance: Instance) -> Self {
        Self {
            instance,
            written: None,
        }
    }

    /// Path written by the last successful publish.
    #[must_use]
    pub fn written(&self) -> Option<&std::path::Path> {
        self.written.as_deref()
    }
}

impl ResultSink for StateAttributeSink {
    fn name(&self) -> &'static str {
        "state-attribute"
    }

    fn publish(&mut self, results: &LabeledGraph<'_>) -> Result<()> {
        let path = self.instance.write_column(&results.labels.to_column())?;
        info!(path = %path.display(), edges = results.labels.len(), "state attribute written");
        self.written = Some(path);
        Ok(())
    }
}

/// Writes one JSON object per edge (`id`, `u`, `v`, `geometry`, `state`)
/// for plotting tools.
#[derive(Debug)]
pub struct ProjectionSink<W: Write> {
    writer: W,
}

impl<W: Write> ProjectionSink<W> {
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ResultSink for ProjectionSink<W> {
    fn name(&self) -> &'static str {
        "projection"
    }

    fn publish(&mut self, results: &LabeledGraph<'_>) -> Result<()> {
        let mut rows = 0usize;
        for edge in results.edges() {
            serde_json::to_writer(&mut self.writer, &edge)
                .with_context(|| format!("failed to serialize edge {}", edge.id))?;
            self.writer.write_all(b"\n")?;
            rows += 1;
        }
        self.writer.flush().context("failed to flush projection")?;
        info!(rows, "projection written");
        Ok(())
    }
}
