#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

//! Training batches of entities, embeddings and hyponymy relations.
//!
//! [`BatchSampler`] turns a relation source and an embedding source into
//! [`Batch`]es that share one dense entity index:
//!
//! ```text
//! chunk:  (dog -> animal, 3)  (cat -> animal, 3)
//!
//! entities:    dog  animal  cat  w17  w4  ...      (B_e total)
//! embeddings:  [B_e x dim], row i = entities[i]
//! relations:   (1, 0, 3.0)  (1, 2, 3.0)            (hypernym, hyponym, distance)
//! ```
//!
//! With [`NegativeSamplingConfig`] set, the taxonomy derived from the direct
//! edges adds non-hyponymy relations (`distance <= 0`) to every chunk.
//!
//! # Example
//!
//! ```rust
//! use taxocode_core::{EmbeddingStore, HyponymyDataset};
//! use taxocode_data::{BatchSampler, SamplerConfig};
//! use rand::SeedableRng;
//! use rand_xorshift::XorShiftRng;
//!
//! let mut store = EmbeddingStore::new(2);
//! for (i, w) in ["dog", "cat", "animal", "car", "tree"].iter().enumerate() {
//!     store.insert(*w, &[i as f32, 1.0]).unwrap();
//! }
//! let ds = HyponymyDataset::from_tuples([("dog", "animal", 1.0), ("cat", "animal", 1.0)]);
//!
//! let sampler = BatchSampler::new(&store, &ds, SamplerConfig::new(4, 2)).unwrap();
//! let mut rng = XorShiftRng::seed_from_u64(0);
//! let batch = sampler.get(0, &mut rng).unwrap();
//! assert_eq!(batch.len(), 4);
//! assert_eq!(batch.hyponymy.len(), 2);
//! ```

mod balance;
mod batch;
mod config;
mod loader;
mod sampler;

pub use balance::{BalanceReport, BatchSizeBalancer, EFFECTIVE_SAMPLE_COEF};
pub use batch::{Batch, RelationSet};
pub use config::{NegativeSamplingConfig, NegativeTarget, SamplerConfig};
pub use loader::RelationLoader;
pub use sampler::{BatchSampler, Batches};
pub use taxocode_core::{Error, Result};
