//! Chunked iteration over a relation source.

use rand::prelude::*;
use taxocode_core::{HyponymyRecord, RelationSource};

/// Yields consecutive chunks of `batch_size` records.
///
/// The last chunk may be shorter. A shuffled loader visits records through a
/// permutation drawn once at construction.
pub struct RelationLoader<'a, S: ?Sized> {
    source: &'a S,
    batch_size: usize,
    order: Option<Vec<usize>>,
    position: usize,
}

impl<'a, S: RelationSource + ?Sized> RelationLoader<'a, S> {
    pub fn new(source: &'a S, batch_size: usize) -> Self {
        Self {
            source,
            batch_size: batch_size.max(1),
            order: None,
            position: 0,
        }
    }

    pub fn shuffled<R: Rng + ?Sized>(source: &'a S, batch_size: usize, rng: &mut R) -> Self {
        let mut order: Vec<usize> = (0..source.total_size()).collect();
        order.shuffle(rng);
        Self {
            order: Some(order),
            ..Self::new(source, batch_size)
        }
    }

    /// Total number of chunks.
    pub fn len(&self) -> usize {
        self.source.total_size().div_ceil(self.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.source.total_size() == 0
    }
}

impl<S: RelationSource + ?Sized> Iterator for RelationLoader<'_, S> {
    type Item = Vec<HyponymyRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let total = self.source.total_size();
        if self.position >= total {
            return None;
        }
        let end = (self.position + self.batch_size).min(total);
        let chunk = match &self.order {
            None => self.source.slice(self.position, end),
            Some(order) => order[self.position..end]
                .iter()
                .flat_map(|&i| self.source.slice(i, i + 1))
                .collect(),
        };
        self.position = end;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self
            .source
            .total_size()
            .saturating_sub(self.position)
            .div_ceil(self.batch_size);
        (left, Some(left))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_xorshift::XorShiftRng;
    use taxocode_core::HyponymyDataset;

    fn dataset(n: usize) -> HyponymyDataset {
        HyponymyDataset::new(
            (0..n)
                .map(|i| HyponymyRecord::new(format!("e{i}"), "root", 1.0))
                .collect(),
        )
    }

    #[test]
    fn test_in_order_chunks() {
        let ds = dataset(5);
        let loader = RelationLoader::new(&ds, 2);
        assert_eq!(loader.len(), 3);
        let chunks: Vec<_> = loader.collect();
        assert_eq!(chunks.iter().map(Vec::len).collect::<Vec<_>>(), vec![2, 2, 1]);
        assert_eq!(chunks[2][0].hyponym, "e4");
    }

    #[test]
    fn test_shuffled_is_a_permutation() {
        let ds = dataset(20);
        let mut rng = XorShiftRng::seed_from_u64(42);
        let mut seen: Vec<String> = RelationLoader::shuffled(&ds, 3, &mut rng)
            .flatten()
            .map(|r| r.hyponym)
            .collect();
        assert_eq!(seen.len(), 20);
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 20);
    }

    #[test]
    fn test_shuffled_is_reproducible() {
        let ds = dataset(20);
        let draw = |seed| {
            let mut rng = XorShiftRng::seed_from_u64(seed);
            RelationLoader::shuffled(&ds, 4, &mut rng).collect::<Vec<_>>()
        };
        assert_eq!(draw(3), draw(3));
    }

    #[test]
    fn test_empty_source() {
        let ds = dataset(0);
        let mut loader = RelationLoader::new(&ds, 4);
        assert!(loader.is_empty());
        assert!(loader.next().is_none());
    }
}
