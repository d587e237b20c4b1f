//! Batch records emitted by the sampler.

use ndarray::{Array2, ArrayView1};
use std::collections::HashMap;
use taxocode_core::{HyponymyRecord, IndexedRelation};

/// Relations re-expressed over a batch's entity index, with their source records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationSet {
    pub indexed: Vec<IndexedRelation>,
    pub raw: Vec<HyponymyRecord>,
}

impl RelationSet {
    #[must_use]
    pub fn len(&self) -> usize {
        self.indexed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indexed.is_empty()
    }

    /// Split into (distance > 0, distance <= 0), preserving order.
    pub fn partition(self) -> (Self, Self) {
        let mut positive = Self::default();
        let mut negative = Self::default();
        for (indexed, raw) in self.indexed.into_iter().zip(self.raw) {
            let side = if indexed.is_hyponymy() {
                &mut positive
            } else {
                &mut negative
            };
            side.indexed.push(indexed);
            side.raw.push(raw);
        }
        (positive, negative)
    }
}

/// One training batch.
///
/// `entities[i]` owns row `i` of `embeddings`; every index in the relation
/// sets is below `entities.len()`.
#[derive(Debug, Clone)]
pub struct Batch {
    pub entities: Vec<String>,
    pub embeddings: Array2<f32>,
    /// All relations, or only the hyponymy ones once split.
    pub hyponymy: RelationSet,
    /// Non-hyponymy relations after [`Batch::split_non_hyponymy`].
    pub non_hyponymy: Option<RelationSet>,
    /// How many trailing entities are random fillers.
    pub filler_entities: usize,
}

impl Batch {
    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Position of `entity` in this batch.
    #[must_use]
    pub fn entity_index(&self, entity: &str) -> Option<usize> {
        self.entities.iter().position(|e| e == entity)
    }

    /// Embedding row of `entity`.
    pub fn embedding(&self, entity: &str) -> Option<ArrayView1<'_, f32>> {
        self.entity_index(entity).map(|i| self.embeddings.row(i))
    }

    /// Entity name lookup table.
    #[must_use]
    pub fn index_map(&self) -> HashMap<&str, usize> {
        self.entities
            .iter()
            .enumerate()
            .map(|(i, e)| (e.as_str(), i))
            .collect()
    }

    /// Move `distance <= 0` relations into `non_hyponymy`.
    ///
    /// A batch that is already split is left alone.
    pub fn split_non_hyponymy(&mut self) {
        if self.non_hyponymy.is_some() {
            return;
        }
        let (positive, negative) = std::mem::take(&mut self.hyponymy).partition();
        self.hyponymy = positive;
        self.non_hyponymy = Some(negative);
    }

    /// All relations, hyponymy first.
    pub fn relations(&self) -> impl Iterator<Item = &IndexedRelation> {
        self.hyponymy
            .indexed
            .iter()
            .chain(self.non_hyponymy.iter().flat_map(|n| n.indexed.iter()))
    }
}
