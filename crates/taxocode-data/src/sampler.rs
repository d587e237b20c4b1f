//! Mini-batch construction over embeddings and hyponymy relations.
//!
//! Each batch is built from one chunk of `B_r` relation records:
//!
//! 1. records with an entity the embedding source cannot encode are dropped
//!    (an empty chunk is skipped, never emitted);
//! 2. with negative sampling on, the taxonomy synthesizes non-hyponymy
//!    records around every surviving pair;
//! 3. the distinct entities of all records get a dense index in first-seen
//!    order (hyponym before hypernym);
//! 4. random vocabulary entities fill the batch up to `B_e`;
//! 5. embeddings are stacked in index order and the records re-expressed as
//!    index triples.
//!
//! Every random draw goes through the caller's RNG, so a seeded RNG yields the
//! same batch sequence.

use crate::balance::{BalanceReport, BatchSizeBalancer};
use crate::batch::{Batch, RelationSet};
use crate::config::SamplerConfig;
use crate::loader::RelationLoader;
use ndarray::Array2;
use rand::prelude::*;
use std::collections::{HashMap, HashSet};
use taxocode_core::{
    EmbeddingSource, Error, HyponymyRecord, IndexedRelation, NegativeSampler, RelationSource,
    Result, Taxonomy,
};

/// Batch sampler borrowing its embedding and relation sources.
pub struct BatchSampler<'a, E: ?Sized, S: ?Sized> {
    embeddings: &'a E,
    relations: &'a S,
    config: SamplerConfig,
    taxonomy: Option<Taxonomy>,
}

impl<'a, E, S> BatchSampler<'a, E, S>
where
    E: EmbeddingSource + ?Sized,
    S: RelationSource + ?Sized,
{
    /// Validate `config` and, with negative sampling on, build the taxonomy
    /// from the direct edges of `relations`.
    pub fn new(embeddings: &'a E, relations: &'a S, config: SamplerConfig) -> Result<Self> {
        config.validate()?;
        let taxonomy = config
            .negative
            .as_ref()
            .map(|_| Taxonomy::build(relations));
        Ok(Self {
            embeddings,
            relations,
            config,
            taxonomy,
        })
    }

    /// Use a prebuilt taxonomy instead of deriving one.
    pub fn with_taxonomy(mut self, taxonomy: Taxonomy) -> Self {
        self.taxonomy = Some(taxonomy);
        self
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn taxonomy(&self) -> Option<&Taxonomy> {
        self.taxonomy.as_ref()
    }

    /// Number of relation records.
    #[must_use]
    pub fn n_relations(&self) -> usize {
        self.relations.total_size()
    }

    /// Entity samples per epoch: `B_e` for every relation chunk.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.config.embedding_batch_size * self.len()
    }

    /// Number of relation chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.n_relations().div_ceil(self.config.hyponymy_batch_size)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.n_relations() == 0
    }

    /// Batch for chunk `idx`.
    ///
    /// A chunk that filters down to nothing is skipped in favour of the next
    /// one; running past the last chunk is [`Error::OutOfRange`].
    ///
    /// # Arguments
    ///
    /// * `idx` - Chunk index in `0..self.len()`
    /// * `rng` - Source of negative and filler draws
    ///
    /// # Complexity
    ///
    /// O(B_r * k + B_e * D) per chunk, with `k` negatives per side and `D`
    /// the embedding width, plus one pass over each skipped chunk.
    pub fn get<R: Rng>(&self, idx: usize, rng: &mut R) -> Result<Batch> {
        let n_chunks = self.len();
        let br = self.config.hyponymy_batch_size;
        for chunk in idx..n_chunks {
            let records = self.relations.slice(chunk * br, (chunk + 1) * br);
            if let Some(batch) = self.build(records, rng)? {
                return Ok(batch);
            }
        }
        Err(Error::OutOfRange {
            index: idx,
            len: n_chunks,
        })
    }

    /// Stream batches over the whole relation source, shuffled if configured.
    pub fn batches<'s, R: Rng>(&'s self, rng: &'s mut R) -> Batches<'s, 'a, E, S, R> {
        let br = self.config.hyponymy_batch_size;
        let loader = if self.config.shuffle {
            RelationLoader::shuffled(self.relations, br, rng)
        } else {
            RelationLoader::new(self.relations, br)
        };
        Batches {
            sampler: self,
            loader,
            rng,
        }
    }

    /// Embedding coverage estimate for the current sizes.
    pub fn balance_report(&self) -> Result<BalanceReport> {
        Ok(BatchSizeBalancer::new(
            self.embeddings.vocabulary_size(),
            self.relations.total_size(),
            &self.config,
        )?
        .report())
    }

    fn is_encodable(&self, record: &HyponymyRecord) -> bool {
        self.embeddings.has_embedding(&record.hyponym)
            && self.embeddings.has_embedding(&record.hypernym)
    }

    /// `None` when no record of the chunk survives filtering.
    fn build<R: Rng>(&self, mut records: Vec<HyponymyRecord>, rng: &mut R) -> Result<Option<Batch>> {
        let fetched = records.len();
        records.retain(|r| self.is_encodable(r));
        if records.is_empty() {
            tracing::warn!(fetched, "skipping relation chunk: no encodable records");
            return Ok(None);
        }

        let negatives = self.sample_negatives(&records, rng)?;
        let n_negatives = negatives.len();
        records.extend(negatives);

        let (mut entities, mut index) = distinct_entities(&records);
        let n_core = entities.len();
        self.fill_entities(&mut entities, &mut index, rng);

        let mut embeddings = Array2::<f32>::zeros((entities.len(), self.embeddings.dim()));
        for (row, entity) in entities.iter().enumerate() {
            embeddings.row_mut(row).assign(&self.embeddings.embedding(entity)?);
        }

        let indexed = records
            .iter()
            .map(|r| {
                IndexedRelation::new(
                    index[r.hypernym.as_str()],
                    index[r.hyponym.as_str()],
                    r.distance,
                )
            })
            .collect();

        let mut batch = Batch {
            filler_entities: entities.len() - n_core,
            entities,
            embeddings,
            hyponymy: RelationSet {
                indexed,
                raw: records,
            },
            non_hyponymy: None,
        };
        if self.config.negative.as_ref().is_some_and(|n| n.split) {
            batch.split_non_hyponymy();
        }

        tracing::debug!(
            entities = batch.len(),
            fillers = batch.filler_entities,
            relations = batch.hyponymy.len(),
            negatives = n_negatives,
            "built batch"
        );
        Ok(Some(batch))
    }

    fn sample_negatives<R: Rng>(
        &self,
        records: &[HyponymyRecord],
        rng: &mut R,
    ) -> Result<Vec<HyponymyRecord>> {
        let (Some(negative), Some(taxonomy)) = (&self.config.negative, &self.taxonomy) else {
            return Ok(Vec::new());
        };
        let size = self.config.negatives_per_side();
        let candidates = negative
            .limit_candidates_within_minibatch
            .then(|| distinct_entities(records).0);
        let candidates = candidates.as_deref();
        let exclude = negative.exclude_reverse_hyponymy;

        let mut out = Vec::new();
        for record in records {
            if negative.target.replaces_hyponym() {
                out.extend(taxonomy.sample_non_hyponyms(
                    &record.hypernym,
                    candidates,
                    size,
                    exclude,
                    &mut *rng,
                )?);
            }
            if negative.target.replaces_hypernym() {
                out.extend(taxonomy.sample_non_hypernyms(
                    &record.hyponym,
                    candidates,
                    size,
                    exclude,
                    &mut *rng,
                )?);
            }
        }

        if let Some(distance) = negative.distance {
            for r in &mut out {
                r.distance = distance;
            }
        }
        out.retain(|r| self.is_encodable(r));
        Ok(out)
    }

    /// Draw distinct vocabulary entities until the batch holds `B_e`.
    fn fill_entities<R: Rng>(
        &self,
        entities: &mut Vec<String>,
        index: &mut HashMap<String, usize>,
        rng: &mut R,
    ) {
        let target = self.config.embedding_batch_size;
        let vocab = self.embeddings.vocabulary_size();
        let mut tried = HashSet::new();
        while entities.len() < target && tried.len() < vocab {
            let i = rng.random_range(0..vocab);
            if !tried.insert(i) {
                continue;
            }
            let Some(entity) = self.embeddings.entity_at_index(i) else {
                continue;
            };
            if !index.contains_key(entity) {
                index.insert(entity.to_string(), entities.len());
                entities.push(entity.to_string());
            }
        }
    }
}

/// Distinct entities of `records` in first-seen order, with their positions.
fn distinct_entities(records: &[HyponymyRecord]) -> (Vec<String>, HashMap<String, usize>) {
    let mut entities = Vec::new();
    let mut index = HashMap::new();
    for r in records {
        for entity in [&r.hyponym, &r.hypernym] {
            if !index.contains_key(entity) {
                index.insert(entity.clone(), entities.len());
                entities.push(entity.clone());
            }
        }
    }
    (entities, index)
}

/// Streaming batches; see [`BatchSampler::batches`].
pub struct Batches<'s, 'a, E: ?Sized, S: ?Sized, R> {
    sampler: &'s BatchSampler<'a, E, S>,
    loader: RelationLoader<'a, S>,
    rng: &'s mut R,
}

impl<E, S, R> Iterator for Batches<'_, '_, E, S, R>
where
    E: EmbeddingSource + ?Sized,
    S: RelationSource + ?Sized,
    R: Rng,
{
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        for records in self.loader.by_ref() {
            match self.sampler.build(records, self.rng) {
                Ok(Some(batch)) => return Some(Ok(batch)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NegativeSamplingConfig, NegativeTarget};
    use rand_xorshift::XorShiftRng;
    use taxocode_core::{EmbeddingStore, HyponymyDataset, TaxonomyKind};

    fn vocabulary(n: usize) -> EmbeddingStore {
        let mut store = EmbeddingStore::new(4);
        for name in ["dog", "cat", "animal"] {
            let seed = name.len() as f32;
            store.insert(name, &[seed, 1.0, 0.0, -seed]).unwrap();
        }
        for i in 0..n - 3 {
            store.insert(format!("w{i}"), &[i as f32, 0.0, 1.0, 0.5]).unwrap();
        }
        store
    }

    fn animals() -> HyponymyDataset {
        HyponymyDataset::from_tuples([("dog", "animal", 3.0), ("cat", "animal", 3.0)])
    }

    #[test]
    fn test_dog_cat_animal_scenario() {
        let store = vocabulary(100);
        let ds = animals();
        let sampler = BatchSampler::new(&store, &ds, SamplerConfig::new(10, 2)).unwrap();
        let mut rng = XorShiftRng::seed_from_u64(42);

        assert_eq!(sampler.len(), 1);
        let batch = sampler.get(0, &mut rng).unwrap();

        assert_eq!(batch.len(), 10);
        assert_eq!(batch.filler_entities, 7);
        assert_eq!(&batch.entities[..3], &["dog", "animal", "cat"].map(String::from));
        assert_eq!(batch.hyponymy.len(), 2);
        let animal = batch.entity_index("animal").unwrap();
        assert!(batch.hyponymy.indexed.iter().all(|r| r.hypernym == animal));
        assert!(batch.non_hyponymy.is_none());
    }

    #[test]
    fn test_sample_counts_per_epoch() {
        let store = vocabulary(100);
        let ds = HyponymyDataset::from_tuples([
            ("dog", "animal", 1.0),
            ("cat", "animal", 1.0),
            ("w0", "animal", 1.0),
            ("w1", "animal", 1.0),
            ("w2", "animal", 1.0),
        ]);
        let sampler = BatchSampler::new(&store, &ds, SamplerConfig::new(16, 2)).unwrap();
        assert_eq!(sampler.n_relations(), 5);
        assert_eq!(sampler.len(), 3);
        // B_e * ceil(5 / 2)
        assert_eq!(sampler.n_samples(), 48);
    }

    #[test]
    fn test_entities_distinct_and_indices_in_range() {
        let store = vocabulary(50);
        let ds = animals();
        let sampler = BatchSampler::new(&store, &ds, SamplerConfig::new(20, 2)).unwrap();
        let mut rng = XorShiftRng::seed_from_u64(1);
        let batch = sampler.get(0, &mut rng).unwrap();

        let unique: HashSet<&String> = batch.entities.iter().collect();
        assert_eq!(unique.len(), batch.len());
        assert!(batch
            .relations()
            .all(|r| r.hypernym < batch.len() && r.hyponym < batch.len()));
    }

    #[test]
    fn test_embeddings_match_source() {
        let store = vocabulary(30);
        let ds = animals();
        let sampler = BatchSampler::new(&store, &ds, SamplerConfig::new(8, 2)).unwrap();
        let mut rng = XorShiftRng::seed_from_u64(5);
        let batch = sampler.get(0, &mut rng).unwrap();

        for (i, entity) in batch.entities.iter().enumerate() {
            assert_eq!(batch.embeddings.row(i), store.embedding(entity).unwrap());
        }
    }

    #[test]
    fn test_small_vocabulary_stops_filling() {
        let store = vocabulary(5);
        let ds = animals();
        let sampler = BatchSampler::new(&store, &ds, SamplerConfig::new(10, 2)).unwrap();
        let mut rng = XorShiftRng::seed_from_u64(9);
        let batch = sampler.get(0, &mut rng).unwrap();
        assert_eq!(batch.len(), 5);
    }

    #[test]
    fn test_unencodable_chunk_is_skipped() {
        let store = vocabulary(20);
        let ds = HyponymyDataset::from_tuples([
            ("wolf", "canine", 1.0),
            ("fox", "canine", 1.0),
            ("dog", "animal", 3.0),
        ]);
        let sampler = BatchSampler::new(&store, &ds, SamplerConfig::new(6, 2)).unwrap();
        let mut rng = XorShiftRng::seed_from_u64(0);

        let batch = sampler.get(0, &mut rng).unwrap();
        assert_eq!(batch.hyponymy.raw, vec![HyponymyRecord::new("dog", "animal", 3.0)]);

        let streamed: Vec<Batch> = sampler.batches(&mut rng).collect::<Result<_>>().unwrap();
        assert_eq!(streamed.len(), 1);
    }

    #[test]
    fn test_get_past_the_end() {
        let store = vocabulary(20);
        let ds = HyponymyDataset::from_tuples([("wolf", "canine", 1.0)]);
        let sampler = BatchSampler::new(&store, &ds, SamplerConfig::new(4, 2)).unwrap();
        let mut rng = XorShiftRng::seed_from_u64(0);
        assert!(matches!(
            sampler.get(0, &mut rng),
            Err(Error::OutOfRange { index: 0, len: 1 })
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let store = vocabulary(20);
        let ds = animals();
        assert!(matches!(
            BatchSampler::new(&store, &ds, SamplerConfig::new(3, 2)),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_seeded_batches_are_reproducible() {
        let store = vocabulary(100);
        let ds = animals();
        let sampler = BatchSampler::new(&store, &ds, SamplerConfig::new(10, 2)).unwrap();
        let draw = |seed| {
            let mut rng = XorShiftRng::seed_from_u64(seed);
            sampler.get(0, &mut rng).unwrap().entities
        };
        assert_eq!(draw(77), draw(77));
    }

    //          animal
    //        /   |    \
    //     dog   cat   bird
    fn taxonomy_dataset() -> HyponymyDataset {
        HyponymyDataset::from_tuples([
            ("dog", "animal", 1.0),
            ("cat", "animal", 1.0),
            ("bird", "animal", 1.0),
            ("dog", "cat", -1.0),
        ])
    }

    fn taxonomy_store() -> EmbeddingStore {
        let mut store = vocabulary(20);
        store.insert("bird", &[0.0; 4]).unwrap();
        store
    }

    #[test]
    fn test_in_batch_negatives_split() {
        let store = taxonomy_store();
        let ds = taxonomy_dataset();
        let config = SamplerConfig::new(12, 3).with_negative(
            NegativeSamplingConfig::default().with_target(NegativeTarget::Hypernym),
        );
        let sampler = BatchSampler::new(&store, &ds, config).unwrap();
        let mut rng = XorShiftRng::seed_from_u64(3);
        let batch = sampler.get(0, &mut rng).unwrap();

        assert_eq!(batch.len(), 12);
        assert!(batch.hyponymy.indexed.iter().all(|r| r.distance > 0.0));
        let negatives = batch.non_hyponymy.as_ref().unwrap();
        assert!(!negatives.is_empty());
        assert!(negatives.indexed.iter().all(|r| r.distance <= 0.0));

        // in-batch candidates only: dog, animal, cat, bird
        let core: HashSet<&str> = ["dog", "cat", "bird", "animal"].into_iter().collect();
        for r in &negatives.raw {
            assert!(core.contains(r.hypernym.as_str()));
            assert_ne!(r.hypernym, "animal");
        }
    }

    #[test]
    fn test_fixed_negative_distance_without_split() {
        let store = taxonomy_store();
        let ds = taxonomy_dataset();
        let config = SamplerConfig::new(16, 2).with_negative(
            NegativeSamplingConfig::default()
                .with_batch_size(4)
                .with_target(NegativeTarget::Both)
                .with_distance(-5.0)
                .with_split(false),
        );
        let sampler = BatchSampler::new(&store, &ds, config).unwrap();
        let mut rng = XorShiftRng::seed_from_u64(8);
        let batch = sampler.get(0, &mut rng).unwrap();

        assert!(batch.non_hyponymy.is_none());
        let negatives: Vec<_> = batch
            .hyponymy
            .indexed
            .iter()
            .filter(|r| !r.is_hyponymy())
            .collect();
        assert!(!negatives.is_empty());
        assert!(negatives.iter().all(|r| r.distance == -5.0));
    }

    #[test]
    fn test_wordnet_negatives_not_supported() {
        let store = vocabulary(20);
        let ds = animals().with_kind(TaxonomyKind::WordNet);
        let config = SamplerConfig::new(10, 2).with_negative(NegativeSamplingConfig::default());
        let sampler = BatchSampler::new(&store, &ds, config).unwrap();
        let mut rng = XorShiftRng::seed_from_u64(0);

        assert!(matches!(sampler.get(0, &mut rng), Err(Error::NotSupported(_))));
        let first = sampler.batches(&mut rng).next();
        assert!(matches!(first, Some(Err(Error::NotSupported(_)))));
    }

    #[test]
    fn test_shuffled_stream_covers_every_record() {
        let store = vocabulary(100);
        let records: Vec<HyponymyRecord> = (0..10)
            .map(|i| HyponymyRecord::new(format!("w{i}"), "animal", 1.0))
            .collect();
        let ds = HyponymyDataset::new(records);
        let config = SamplerConfig::new(12, 3).with_shuffle(true);
        let sampler = BatchSampler::new(&store, &ds, config).unwrap();
        let mut rng = XorShiftRng::seed_from_u64(21);

        let mut seen: Vec<String> = sampler
            .batches(&mut rng)
            .map(|b| b.unwrap())
            .flat_map(|b| b.hyponymy.raw.into_iter().map(|r| r.hyponym))
            .collect();
        seen.sort();
        assert_eq!(seen.len(), 10);
        seen.dedup();
        assert_eq!(seen.len(), 10);
    }

    #[test]
    fn test_balance_report() {
        let store = vocabulary(100);
        let ds = animals();
        let sampler = BatchSampler::new(&store, &ds, SamplerConfig::new(10, 2)).unwrap();
        let report = sampler.balance_report().unwrap();
        assert_eq!(report.n_embeddings, 100);
        assert_eq!(report.n_iterations, 1);
        assert_eq!(report.sampled_per_batch, 6);
    }
}
