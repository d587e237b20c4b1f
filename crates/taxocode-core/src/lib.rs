#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::doc_markdown)]

//! Core types for hyponymy-aware code learning.
//!
//! - [`HyponymyRecord`] - an ordered (hypernym, hyponym, distance) relation
//! - [`IndexedRelation`] - the same relation over batch-local entity indices
//! - [`EmbeddingSource`] / [`EmbeddingStore`] - pretrained vectors per entity
//! - [`RelationSource`] / [`HyponymyDataset`] - the knowledge base of is-a pairs
//! - [`RecordFilter`] - include/exclude filtering of records by field
//! - [`Taxonomy`] - read-only oracle for reachability and negative sampling
//!
//! # Sign Convention
//!
//! ```text
//! (hypernym=animal, hyponym=dog,  distance=+2)   true is-a, two steps down
//! (hypernym=dog,    hyponym=cat,  distance=-1)   negative, LCA one step up
//! ```
//!
//! A positive distance is always a true hyponymy relation; zero or negative
//! distances are sampled non-hyponymy relations.
//!
//! # Example
//!
//! ```rust
//! use taxocode_core::{BasicTaxonomy, HyponymyDataset, NegativeSampler};
//! use rand::SeedableRng;
//! use rand_xorshift::XorShiftRng;
//!
//! let ds = HyponymyDataset::from_tuples([
//!     ("mammal", "animal", 1.0),
//!     ("bird", "animal", 1.0),
//!     ("dog", "mammal", 1.0),
//! ]);
//! let taxonomy = BasicTaxonomy::from_source(&ds);
//! assert!(taxonomy.is_ancestor("animal", "dog"));
//!
//! let mut rng = XorShiftRng::seed_from_u64(42);
//! let negatives = taxonomy
//!     .sample_non_hypernyms("dog", None, 1, true, &mut rng)
//!     .unwrap();
//! assert!(negatives.iter().all(|r| r.distance <= 0.0));
//! ```

mod embedding;
mod error;
mod filter;
mod record;
mod relation;
pub mod taxonomy;

pub use embedding::{EmbeddingSource, EmbeddingStore};
pub use error::{Error, Result};
pub use filter::{FieldValues, RecordField, RecordFilter};
pub use record::{HyponymyRecord, IndexedRelation};
pub use relation::{HyponymyDataset, RelationSource, TaxonomyKind};
pub use taxonomy::{BasicTaxonomy, NegativeSampler, Taxonomy, WordNetTaxonomy};
