//! Flat per-edge state vectors.

use edgeprop_core::{ConfigError, EdgeId, MAX_STATES};
use fixedbitset::FixedBitSet;

/// `K`-dimensional state vectors for every edge, stored row-major in one
/// arena (`values[e * K .. (e + 1) * K]`), plus the seeded flags.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeStates {
    states: usize,
    values: Vec<f64>,
    seeded: FixedBitSet,
}

impl EdgeStates {
    /// All-zero, unseeded vectors for `edge_count` edges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TooManyStates`] when a label could not name
    /// every state, and [`ConfigError::StateTableTooLarge`] when the arena
    /// cannot be addressed as one allocation.
    pub fn zeros(edge_count: usize, states: usize) -> Result<Self, ConfigError> {
        if states > MAX_STATES {
            return Err(ConfigError::TooManyStates {
                states,
                max: MAX_STATES,
            });
        }
        let fits = |len: usize| {
            len.checked_mul(size_of::<f64>())
                .is_some_and(|bytes| isize::try_from(bytes).is_ok())
        };
        let len = edge_count
            .checked_mul(states)
            .filter(|&len| fits(len))
            .ok_or(ConfigError::StateTableTooLarge {
                edges: edge_count,
                states,
            })?;
        Ok(Self {
            states,
            values: vec![0.0; len],
            seeded: FixedBitSet::with_capacity(edge_count),
        })
    }

    pub(crate) const fn from_parts(states: usize, values: Vec<f64>, seeded: FixedBitSet) -> Self {
        Self {
            states,
            values,
            seeded,
        }
    }

    pub(crate) fn into_parts(self) -> (usize, Vec<f64>, FixedBitSet) {
        (self.states, self.values, self.seeded)
    }

    /// Dimension `K` of each vector.
    #[must_use]
    pub const fn states(&self) -> usize {
        self.states
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.seeded.len()
    }

    /// The vector of `edge`.
    ///
    /// # Panics
    ///
    /// Panics if `edge` is out of range.
    #[must_use]
    pub fn vector(&self, edge: EdgeId) -> &[f64] {
        &self.values[edge * self.states..(edge + 1) * self.states]
    }

    pub(crate) fn vector_mut(&mut self, edge: EdgeId) -> &mut [f64] {
        &mut self.values[edge * self.states..(edge + 1) * self.states]
    }

    /// Iterate `(edge, vector)` in edge-id order.
    pub fn iter(&self) -> impl Iterator<Item = (EdgeId, &[f64])> + '_ {
        self.values.chunks_exact(self.states.max(1)).enumerate()
    }

    #[must_use]
    pub fn is_seeded(&self, edge: EdgeId) -> bool {
        self.seeded.contains(edge)
    }

    pub(crate) fn mark_seeded(&mut self, edge: EdgeId) {
        self.seeded.insert(edge);
    }

    #[must_use]
    pub fn seeded_count(&self) -> usize {
        self.seeded.count_ones(..)
    }

    #[must_use]
    pub fn unlabelled_count(&self) -> usize {
        self.edge_count() - self.seeded_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_disjoint() {
        let mut s = EdgeStates::zeros(3, 2).expect("small table");
        s.vector_mut(1).copy_from_slice(&[0.25, 0.75]);
        s.mark_seeded(1);
        assert_eq!(s.vector(0), &[0.0, 0.0]);
        assert_eq!(s.vector(1), &[0.25, 0.75]);
        assert_eq!(s.vector(2), &[0.0, 0.0]);
        assert_eq!(s.seeded_count(), 1);
        assert_eq!(s.unlabelled_count(), 2);
        assert_eq!(s.iter().count(), 3);
    }

    #[test]
    fn oversized_tables_are_refused() {
        let err = EdgeStates::zeros(usize::MAX / 2 + 1, 2).expect_err("overflows usize");
        assert_eq!(
            err,
            ConfigError::StateTableTooLarge {
                edges: usize::MAX / 2 + 1,
                states: 2,
            }
        );
        // Fits in usize but not in an allocation.
        assert!(matches!(
            EdgeStates::zeros(1 << 59, 2),
            Err(ConfigError::StateTableTooLarge { .. })
        ));
        assert!(matches!(
            EdgeStates::zeros(0, 1 << 62),
            Err(ConfigError::TooManyStates { states, .. }) if states == 1 << 62
        ));
    }
}
