//! Synchronous diffusion rounds.
//!
//! # Update rule
//!
//! For every unlabelled edge `e = (u, v)` in round `r`:
//!
//! ```text
//! incident(e) = neighbors(u) ++ neighbors(v)        (multiset, not deduplicated)
//! m           = mean { prev[f] : f ∈ incident(e) }
//! next[e]     = softmax(m)
//! ```
//!
//! `e` itself sits in the incidence list of both endpoints, so its own
//! previous vector enters the mean twice. [`DiffusionOptions::include_self_twice`]
//! keeps that weighting (the default); turning it off drops one of the two
//! self entries.
//!
//! # Buffers
//!
//! Two flat arenas hold the vectors: `current` (read-only during a round)
//! and `next` (each edge writes only its own row). They swap at the barrier
//! between rounds. Both start as copies of the seeds and seeded rows are
//! never written, so seeded vectors are identical in both buffers for the
//! whole run.
//!
//! Because a round never reads `next`, the per-edge updates are independent
//! and may run on a thread pool (`parallel` feature) with results identical
//! to the sequential order.

use std::sync::atomic::{AtomicBool, Ordering};

use edgeprop_core::{EdgeId, Error, GraphStore, IntegrityError, PropagationConfig, Result};
use fixedbitset::FixedBitSet;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{debug, info, instrument, trace, warn};

use crate::state::EdgeStates;

/// Knobs for a diffusion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffusionOptions {
    /// Exact number of rounds to run; there is no convergence test.
    pub rounds: usize,
    pub include_self_twice: bool,
    pub parallel: bool,
    /// Debug log cadence in rounds; 0 disables progress lines.
    pub progress_every: usize,
}

impl Default for DiffusionOptions {
    fn default() -> Self {
        Self::from(&PropagationConfig::default())
    }
}

impl From<&PropagationConfig> for DiffusionOptions {
    fn from(config: &PropagationConfig) -> Self {
        Self {
            rounds: config.rounds(),
            include_self_twice: config.include_self_twice,
            parallel: config.parallel,
            progress_every: config.progress_every,
        }
    }
}

/// Where an engine is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffusionPhase {
    NotStarted,
    /// `round` rounds have completed and more remain.
    Running { round: usize },
    Converged { rounds: usize },
    /// Aborted at a barrier; the snapshot after `completed_rounds` is valid.
    Cancelled { completed_rounds: usize },
}

/// Runs the fixed number of synchronous rounds over one graph.
#[derive(Debug)]
pub struct DiffusionEngine<'g> {
    graph: &'g GraphStore,
    options: DiffusionOptions,
    states: usize,
    current: Vec<f64>,
    next: Vec<f64>,
    seeded: FixedBitSet,
    completed: usize,
    phase: DiffusionPhase,
}

impl<'g> DiffusionEngine<'g> {
    /// Pair initial states with their graph.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrityError::StateTableMismatch`] when `initial` does not
    /// cover exactly the graph's edges.
    pub fn new(graph: &'g GraphStore, initial: EdgeStates, options: DiffusionOptions) -> Result<Self> {
        if initial.edge_count() != graph.edge_count() {
            return Err(IntegrityError::StateTableMismatch {
                expected: graph.edge_count(),
                actual: initial.edge_count(),
            }
            .into());
        }

        let options = effective_options(options);
        let (states, current, seeded) = initial.into_parts();
        let next = current.clone();

        Ok(Self {
            graph,
            options,
            states,
            current,
            next,
            seeded,
            completed: 0,
            phase: DiffusionPhase::NotStarted,
        })
    }

    #[must_use]
    pub const fn phase(&self) -> DiffusionPhase {
        self.phase
    }

    #[must_use]
    pub const fn completed_rounds(&self) -> usize {
        self.completed
    }

    #[must_use]
    pub const fn options(&self) -> &DiffusionOptions {
        &self.options
    }

    /// The vector of `edge` as of the last completed round.
    #[must_use]
    pub fn vector(&self, edge: EdgeId) -> &[f64] {
        &self.current[edge * self.states..(edge + 1) * self.states]
    }

    /// Run one round, regardless of the configured round count.
    pub fn step(&mut self) {
        let graph = self.graph;
        let k = self.states;
        let include_self_twice = self.options.include_self_twice;
        let prev: &[f64] = &self.current;
        let seeded = &self.seeded;

        for_each_row(&mut self.next, k, self.options.parallel, |edge, out| {
            if !seeded.contains(edge) {
                update_edge(graph, prev, k, edge, include_self_twice, out);
            }
        });

        // Barrier: every row of `next` is complete before the swap.
        std::mem::swap(&mut self.current, &mut self.next);
        self.completed += 1;
        self.phase = if self.completed < self.options.rounds {
            DiffusionPhase::Running {
                round: self.completed,
            }
        } else {
            DiffusionPhase::Converged {
                rounds: self.completed,
            }
        };
        trace!(round = self.completed, "round complete");
    }

    /// Run all remaining rounds.
    #[instrument(skip(self), fields(rounds = self.options.rounds, edges = self.graph.edge_count()))]
    pub fn run(&mut self) {
        self.advance(None);
    }

    /// Run all remaining rounds, checking `cancel` at every barrier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] when `cancel` was set before a round
    /// started. The engine keeps the snapshot of the last completed round.
    pub fn run_with_cancel(&mut self, cancel: &AtomicBool) -> Result<()> {
        if self.advance(Some(cancel)) {
            Ok(())
        } else {
            Err(Error::Cancelled {
                completed_rounds: self.completed,
            })
        }
    }

    /// Round loop shared by [`run`](Self::run) and
    /// [`run_with_cancel`](Self::run_with_cancel). Returns `false` when
    /// stopped by `cancel`.
    fn advance(&mut self, cancel: Option<&AtomicBool>) -> bool {
        let unlabelled = self.graph.edge_count() - self.seeded.count_ones(..);
        info!(
            rounds = self.options.rounds,
            unlabelled,
            parallel = self.options.parallel,
            "diffusion started"
        );

        while self.completed < self.options.rounds {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                self.phase = DiffusionPhase::Cancelled {
                    completed_rounds: self.completed,
                };
                warn!(completed_rounds = self.completed, "diffusion cancelled");
                return false;
            }

            self.step();

            let every = self.options.progress_every;
            if every > 0 && self.completed % every == 0 {
                debug!(
                    round = self.completed,
                    total = self.options.rounds,
                    "diffusion progress"
                );
            }
        }

        self.phase = DiffusionPhase::Converged {
            rounds: self.completed,
        };
        info!(rounds = self.completed, "diffusion finished");
        true
    }

    /// Hand back the authoritative vectors.
    #[must_use]
    pub fn into_states(self) -> EdgeStates {
        EdgeStates::from_parts(self.states, self.current, self.seeded)
    }
}

fn effective_options(mut options: DiffusionOptions) -> DiffusionOptions {
    if options.parallel && !cfg!(feature = "parallel") {
        warn!("parallel rounds requested but the `parallel` feature is disabled; running sequentially");
        options.parallel = false;
    }
    options
}

/// Apply `f` to every `k`-wide row of `rows`, on the rayon pool when
/// `parallel` is set.
#[cfg(feature = "parallel")]
fn for_each_row<F>(rows: &mut [f64], k: usize, parallel: bool, f: F)
where
    F: Fn(EdgeId, &mut [f64]) + Sync + Send,
{
    if k == 0 {
        return;
    }
    if parallel {
        rows.par_chunks_mut(k)
            .enumerate()
            .for_each(|(edge, out)| f(edge, out));
    } else {
        rows.chunks_mut(k)
            .enumerate()
            .for_each(|(edge, out)| f(edge, out));
    }
}

#[cfg(not(feature = "parallel"))]
fn for_each_row<F>(rows: &mut [f64], k: usize, _parallel: bool, f: F)
where
    F: Fn(EdgeId, &mut [f64]),
{
    if k == 0 {
        return;
    }
    rows.chunks_mut(k)
        .enumerate()
        .for_each(|(edge, out)| f(edge, out));
}

/// Compute the round update of one unlabelled edge into `out`.
///
/// Reads only `prev`. `out` has length `k`.
fn update_edge(
    graph: &GraphStore,
    prev: &[f64],
    k: usize,
    edge: EdgeId,
    include_self_twice: bool,
    out: &mut [f64],
) {
    out.fill(0.0);
    let Some((u, v)) = graph.endpoints(edge) else {
        return;
    };

    let mut count = 0usize;
    let mut skip_self = !include_self_twice;
    for node in [u, v] {
        for incident in graph.neighbors(node) {
            if skip_self && incident.edge == edge {
                skip_self = false;
                continue;
            }
            let row = &prev[incident.edge * k..(incident.edge + 1) * k];
            for (acc, x) in out.iter_mut().zip(row) {
                *acc += x;
            }
            count += 1;
        }
    }

    if count > 0 {
        let n = count as f64;
        for acc in out.iter_mut() {
            *acc /= n;
        }
    }
    softmax_in_place(out);
}

/// Softmax with max-subtraction; mathematically equal to
/// `exp(x_k) / Σ exp(x_j)`.
pub fn softmax_in_place(values: &mut [f64]) {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return;
    }
    let mut sum = 0.0;
    for x in values.iter_mut() {
        *x = (*x - max).exp();
        sum += *x;
    }
    for x in values.iter_mut() {
        *x /= sum;
    }
}
