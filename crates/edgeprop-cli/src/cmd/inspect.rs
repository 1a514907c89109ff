use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use edgeprop_core::{GraphStore, Instance};
use serde::Serialize;

use crate::output::{OutputMode, pretty_kv, render};

/// Arguments for `ep inspect`.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Directory holding the instance files.
    #[arg(long)]
    pub instance_dir: PathBuf,

    /// Instance name; files are `<name>.<ext>`.
    #[arg(long)]
    pub name: String,
}

#[derive(Debug, Serialize, PartialEq)]
struct DegreeStats {
    min: usize,
    max: usize,
    mean: f64,
    isolated: usize,
}

#[derive(Debug, Serialize)]
struct InspectReport {
    instance: String,
    nodes: usize,
    edges: usize,
    self_loops: usize,
    degree: DegreeStats,
    attributes: Vec<&'static str>,
    known_seeds: usize,
    content_hash: String,
}

fn degree_stats(graph: &GraphStore) -> DegreeStats {
    let mut stats = DegreeStats {
        min: usize::MAX,
        max: 0,
        mean: 0.0,
        isolated: 0,
    };
    let mut total = 0usize;
    for node in graph.nodes() {
        let degree = graph.degree(node);
        stats.min = stats.min.min(degree);
        stats.max = stats.max.max(degree);
        if degree == 0 {
            stats.isolated += 1;
        }
        total += degree;
    }
    if graph.node_count() == 0 {
        stats.min = 0;
    } else {
        stats.mean = total as f64 / graph.node_count() as f64;
    }
    stats
}

/// Summarize an instance without running anything.
///
/// # Errors
///
/// Returns an error when the topology or a side file cannot be loaded.
pub fn run_inspect(args: &InspectArgs, output: OutputMode) -> Result<()> {
    let instance = Instance::new(&args.instance_dir, &args.name);
    let graph = instance
        .load_topology()
        .with_context(|| format!("failed to load instance {}", args.name))?;
    let attributes = instance.load_attributes(&graph)?;
    let known = instance.load_seeds(&graph)?;

    let report = InspectReport {
        instance: args.name.clone(),
        nodes: graph.node_count(),
        edges: graph.edge_count(),
        self_loops: graph.self_loop_count(),
        degree: degree_stats(&graph),
        attributes: attributes.attached(),
        known_seeds: known.len(),
        content_hash: graph.content_hash().to_string(),
    };

    render(output, &report, |r, w| {
        pretty_kv(w, "instance", &r.instance)?;
        pretty_kv(w, "nodes", r.nodes.to_string())?;
        pretty_kv(w, "edges", r.edges.to_string())?;
        pretty_kv(w, "self-loops", r.self_loops.to_string())?;
        pretty_kv(
            w,
            "degree",
            format!(
                "min {} / max {} / mean {:.2} ({} isolated)",
                r.degree.min, r.degree.max, r.degree.mean, r.degree.isolated
            ),
        )?;
        let attributes = if r.attributes.is_empty() {
            "-".to_string()
        } else {
            r.attributes.join(", ")
        };
        pretty_kv(w, "attributes", attributes)?;
        pretty_kv(w, "known seeds", r.known_seeds.to_string())?;
        pretty_kv(w, "hash", &r.content_hash)
    })
}
