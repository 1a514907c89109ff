use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use edgeprop_core::instance::convert_edge_list;
use serde::Serialize;

use crate::output::{OutputMode, pretty_kv, render};

/// Arguments for `ep convert`.
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Text edge list, one `u v` pair per line.
    #[arg(long, short)]
    pub input: PathBuf,

    /// Destination topology file (`.epg`).
    #[arg(long, short)]
    pub output: PathBuf,

    /// Node list, one key per line; isolated nodes must be listed here.
    #[arg(long)]
    pub nodes: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ConvertReport {
    output: PathBuf,
    nodes: usize,
    edges: usize,
    self_loops: usize,
    content_hash: String,
}

/// Convert a text edge list into a binary topology file.
///
/// # Errors
///
/// Returns an error when inputs are unreadable or invalid, or the output
/// cannot be written.
pub fn run_convert(args: &ConvertArgs, output: OutputMode) -> Result<()> {
    let graph = convert_edge_list(&args.input, args.nodes.as_deref(), &args.output)
        .with_context(|| format!("failed to convert {}", args.input.display()))?;

    let report = ConvertReport {
        output: args.output.clone(),
        nodes: graph.node_count(),
        edges: graph.edge_count(),
        self_loops: graph.self_loop_count(),
        content_hash: graph.content_hash().to_string(),
    };

    render(output, &report, |r, w| {
        pretty_kv(w, "written", r.output.display().to_string())?;
        pretty_kv(w, "nodes", r.nodes.to_string())?;
        pretty_kv(w, "edges", r.edges.to_string())?;
        pretty_kv(w, "self-loops", r.self_loops.to_string())?;
        pretty_kv(w, "hash", &r.content_hash)
    })
}
