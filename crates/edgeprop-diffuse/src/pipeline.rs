//! End-to-end run: seed → diffuse → extract → publish.

use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;

use edgeprop_core::timing::{StageTimer, StageTiming};
use edgeprop_core::{EdgeAttributes, EdgeId, GraphStore, PropagationConfig, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{info, instrument};

use crate::engine::{DiffusionEngine, DiffusionOptions};
use crate::label::EdgeLabels;
use crate::seed::{SeedInitializer, SeedReport};
use crate::sink::{LabeledGraph, ResultSink};
use crate::state::EdgeStates;

/// What a run did, for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub nodes: usize,
    pub edges: usize,
    pub content_hash: String,
    pub seeds: SeedReport,
    pub rounds: usize,
    pub include_self_twice: bool,
    pub parallel: bool,
    /// Edges per final state, indexed by state.
    pub state_counts: Vec<usize>,
    pub timings: Vec<StageTiming>,
}

/// Outcome of [`propagate`].
#[derive(Debug, Clone)]
pub struct Propagation {
    pub initial: EdgeStates,
    pub final_states: EdgeStates,
    pub labels: EdgeLabels,
    pub summary: RunSummary,
}

/// Inputs of one run beyond the graph and configuration.
#[derive(Debug, Default)]
pub struct RunInputs<'a> {
    /// Known states that override random seeding.
    pub known: BTreeMap<EdgeId, usize>,
    /// Checked at every round barrier.
    pub cancel: Option<&'a AtomicBool>,
}

/// Seed, diffuse and label every edge of `graph`.
///
/// # Errors
///
/// Configuration errors are reported before any seeding. Known seeds for
/// unknown edges are integrity errors. A set `cancel` flag yields
/// [`edgeprop_core::Error::Cancelled`].
#[instrument(skip_all, fields(edges = graph.edge_count(), seed = config.random_seed))]
pub fn propagate(
    graph: &GraphStore,
    config: &PropagationConfig,
    inputs: RunInputs<'_>,
    timer: &mut StageTimer,
) -> Result<Propagation> {
    let initializer = SeedInitializer::from_config(config)?.with_known(inputs.known)?;
    let mut rng = StdRng::seed_from_u64(config.random_seed);

    let (initial, seeds) = timer.time("seed", || initializer.initialize(graph.edge_count(), &mut rng))?;

    let mut engine = DiffusionEngine::new(graph, initial.clone(), DiffusionOptions::from(config))?;
    let parallel = engine.options().parallel;
    timer.time("diffuse", || match inputs.cancel {
        Some(flag) => engine.run_with_cancel(flag),
        None => {
            engine.run();
            Ok(())
        }
    })?;
    let rounds = engine.completed_rounds();
    let final_states = engine.into_states();

    let labels = timer.time("extract", || EdgeLabels::extract(&final_states));

    let summary = RunSummary {
        nodes: graph.node_count(),
        edges: graph.edge_count(),
        content_hash: graph.content_hash().to_string(),
        seeds,
        rounds,
        include_self_twice: config.include_self_twice,
        parallel,
        state_counts: labels.histogram(),
        timings: timer.stages().to_vec(),
    };
    info!(
        rounds,
        seeded = summary.seeds.seeded(),
        states = ?summary.state_counts,
        "propagation complete"
    );

    Ok(Propagation {
        initial,
        final_states,
        labels,
        summary,
    })
}

/// Hand the labels to every sink in order.
///
/// # Errors
///
/// Stops at the first sink that fails.
pub fn publish(
    graph: &GraphStore,
    attributes: &EdgeAttributes,
    labels: &EdgeLabels,
    sinks: &mut [&mut dyn ResultSink],
    timer: &mut StageTimer,
) -> anyhow::Result<()> {
    let results = LabeledGraph {
        graph,
        attributes,
        labels,
    };
    timer.time("sink", || {
        for sink in sinks.iter_mut() {
            sink.publish(&results)
                .map_err(|e| e.context(format!("sink {} failed", sink.name())))?;
        }
        Ok(())
    })
}
