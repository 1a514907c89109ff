//! Initial state assignment.
//!
//! Every edge receives exactly one of three initial states, decided in
//! edge-id order:
//!
//! 1. **Background seed** with probability `percent_zero`: state 0 carries
//!    `1 - alpha`.
//! 2. **Labeled seed** with probability `percent_nonzero`, drawn only when
//!    the background draw failed: one state in `[1, K-1]`, chosen uniformly,
//!    carries `1.0`.
//! 3. **Unlabelled**: the all-zero vector.
//!
//! Known seeds supplied by the caller override the random outcome for their
//! edge. The random draws for that edge still happen, so adding a known seed
//! never shifts the seeding of any other edge.

use std::collections::BTreeMap;

use edgeprop_core::{ConfigError, EdgeId, IntegrityError, PropagationConfig, Result};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::state::EdgeStates;

/// The initial state an edge was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedKind {
    Background,
    Labeled(usize),
    Known(usize),
    Unlabelled,
}

/// Counts of each seed kind after initialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub background: usize,
    pub labeled: usize,
    pub known: usize,
    pub unlabelled: usize,
}

impl SeedReport {
    fn record(&mut self, kind: SeedKind) {
        match kind {
            SeedKind::Background => self.background += 1,
            SeedKind::Labeled(_) => self.labeled += 1,
            SeedKind::Known(_) => self.known += 1,
            SeedKind::Unlabelled => self.unlabelled += 1,
        }
    }

    #[must_use]
    pub const fn seeded(&self) -> usize {
        self.background + self.labeled + self.known
    }
}

/// Assigns initial vectors and seeded flags.
#[derive(Debug, Clone)]
pub struct SeedInitializer {
    states: usize,
    percent_zero: f64,
    percent_nonzero: f64,
    alpha: f64,
    known: BTreeMap<EdgeId, usize>,
}

impl SeedInitializer {
    /// Take seeding parameters from a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration does not validate.
    pub fn from_config(config: &PropagationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            states: config.states,
            percent_zero: config.percent_zero,
            percent_nonzero: config.percent_nonzero,
            alpha: config.alpha,
            known: BTreeMap::new(),
        })
    }

    /// Fix the state of specific edges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SeedStateOutOfRange`] for a state `>= K`.
    pub fn with_known(mut self, known: BTreeMap<EdgeId, usize>) -> Result<Self, ConfigError> {
        if let Some((&edge, &state)) = known.iter().find(|(_, state)| **state >= self.states) {
            return Err(ConfigError::SeedStateOutOfRange {
                edge,
                state,
                states: self.states,
            });
        }
        self.known = known;
        Ok(self)
    }

    /// Decide the seed kind of one edge, consuming randomness in a fixed
    /// order: background draw, then (only if it failed) labeled draw, then
    /// (only if that succeeded) the state index.
    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> SeedKind {
        if rng.gen_bool(self.percent_zero) {
            SeedKind::Background
        } else if rng.gen_bool(self.percent_nonzero) {
            SeedKind::Labeled(rng.gen_range(1..self.states))
        } else {
            SeedKind::Unlabelled
        }
    }

    /// Build initial vectors for `edge_count` edges.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrityError::UnknownEdge`] when a known seed names an edge
    /// id outside `[0, edge_count)`.
    /// Returns [`ConfigError::StateTableTooLarge`] when the vectors for
    /// `edge_count` edges cannot be allocated.
    #[instrument(skip(self, rng), fields(states = self.states, known = self.known.len()))]
    pub fn initialize<R: Rng + ?Sized>(
        &self,
        edge_count: usize,
        rng: &mut R,
    ) -> Result<(EdgeStates, SeedReport)> {
        if let Some((&id, _)) = self.known.range(edge_count..).next() {
            return Err(IntegrityError::UnknownEdge {
                attribute: "seeds",
                id,
            }
            .into());
        }

        let mut table = EdgeStates::zeros(edge_count, self.states)?;
        let mut report = SeedReport::default();

        for edge in 0..edge_count {
            let drawn = self.draw(rng);
            let kind = self
                .known
                .get(&edge)
                .map_or(drawn, |&state| SeedKind::Known(state));

            let vector = table.vector_mut(edge);
            match kind {
                SeedKind::Background => vector[0] = 1.0 - self.alpha,
                SeedKind::Labeled(state) | SeedKind::Known(state) => vector[state] = 1.0,
                SeedKind::Unlabelled => {}
            }
            if kind != SeedKind::Unlabelled {
                table.mark_seeded(edge);
            }
            report.record(kind);
        }

        debug!(
            background = report.background,
            labeled = report.labeled,
            known = report.known,
            unlabelled = report.unlabelled,
            "seeds assigned"
        );
        Ok((table, report))
    }
}
