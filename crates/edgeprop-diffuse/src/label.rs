//! Reduce final vectors to one discrete state per edge.

use edgeprop_core::{AttributeColumn, EdgeAttribute, EdgeId, StateLabel};
use serde::Serialize;

use crate::state::EdgeStates;

/// Index of the largest entry; the lowest index wins ties.
///
/// Returns 0 for an empty slice.
#[must_use]
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &x) in values.iter().enumerate().skip(1) {
        if x > values[best] {
            best = i;
        }
    }
    best
}

/// Final label of every edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeLabels {
    states: usize,
    labels: Vec<StateLabel>,
}

impl EdgeLabels {
    /// Extract `argmax` labels from final vectors.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn extract(table: &EdgeStates) -> Self {
        let labels = table
            .iter()
            // `EdgeStates` never holds more than `MAX_STATES` states.
            .map(|(_, v)| argmax(v) as StateLabel)
            .collect();
        Self {
            states: table.states(),
            labels,
        }
    }

    #[must_use]
    pub fn get(&self, edge: EdgeId) -> Option<StateLabel> {
        self.labels.get(edge).copied()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[StateLabel] {
        &self.labels
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of edges carrying each state, indexed by state.
    #[must_use]
    pub fn histogram(&self) -> Vec<usize> {
        let mut counts = vec![0; self.states];
        for &label in &self.labels {
            if let Some(slot) = counts.get_mut(label as usize) {
                *slot += 1;
            }
        }
        counts
    }

    /// The labels as a `state` attribute column.
    #[must_use]
    pub fn to_column(&self) -> AttributeColumn<StateLabel> {
        AttributeColumn::new(EdgeAttribute::State, self.labels.clone())
    }
}
