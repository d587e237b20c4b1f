//! Hyponymy records and their batch-local indexed form.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An ordered (hypernym, hyponym) pair with a scalar target.
///
/// `distance > 0` marks a true hyponymy relation (the hypernym is an ancestor of
/// the hyponym); `distance <= 0` marks a non-hyponymy relation. The magnitude is
/// a tree-distance style target, not a boolean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyponymyRecord {
    /// The more specific entity ("dog").
    pub hyponym: String,
    /// The more general entity ("animal").
    pub hypernym: String,
    /// Signed tree distance.
    pub distance: f32,
}

impl HyponymyRecord {
    pub fn new(hyponym: impl Into<String>, hypernym: impl Into<String>, distance: f32) -> Self {
        Self {
            hyponym: hyponym.into(),
            hypernym: hypernym.into(),
            distance,
        }
    }

    /// True for an is-a relation, false for a sampled negative.
    pub fn is_hyponymy(&self) -> bool {
        self.distance > 0.0
    }

    /// A direct (parent-child) edge of the taxonomy.
    #[allow(clippy::float_cmp)]
    pub fn is_direct(&self) -> bool {
        self.distance == 1.0
    }

    /// Same pair, different target.
    pub fn with_distance(mut self, distance: f32) -> Self {
        self.distance = distance;
        self
    }
}

impl fmt::Display for HyponymyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.hypernym, self.hyponym, self.distance)
    }
}

/// A hyponymy record re-expressed with batch-local entity indices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexedRelation {
    pub hypernym: usize,
    pub hyponym: usize,
    pub distance: f32,
}

impl IndexedRelation {
    pub fn new(hypernym: usize, hyponym: usize, distance: f32) -> Self {
        Self {
            hypernym,
            hyponym,
            distance,
        }
    }

    pub fn is_hyponymy(&self) -> bool {
        self.distance > 0.0
    }

    /// The same pair with a 1.0 / 0.0 target for entailment-probability training.
    pub fn entailment_target(&self) -> Self {
        let target = if self.is_hyponymy() { 1.0 } else { 0.0 };
        Self::new(self.hypernym, self.hyponym, target)
    }

    /// (hypernym, hyponym, distance)
    pub fn as_tuple(&self) -> (usize, usize, f32) {
        (self.hypernym, self.hyponym, self.distance)
    }
}

impl From<(usize, usize, f32)> for IndexedRelation {
    fn from((hypernym, hyponym, distance): (usize, usize, f32)) -> Self {
        Self::new(hypernym, hyponym, distance)
    }
}
