//! `taxocode` learns discrete codes whose prefix structure mirrors a taxonomy.
//!
//! The workspace splits the work the way a training step flows:
//!
//! - [`taxocode_core`]: hyponymy records, embedding and relation sources, the
//!   taxonomy oracle used for negative sampling
//! - [`taxocode_data`]: batch construction over a shared entity index
//! - [`taxocode_loss`]: soft code length, ancestor probability, LCA length and the
//!   supervised losses built on them
//!
//! ```text
//! HyponymyDataset ─┐
//! EmbeddingStore ──┼─> BatchSampler ─> Batch ─> (encoder) ─> P[N, D, V]
//! Taxonomy ────────┘                     │                     │
//!                                        └── relations ──> HyponymyScoreLoss
//! ```

pub use taxocode_core;
pub use taxocode_data;
pub use taxocode_loss;

pub use taxocode_core::{
    BasicTaxonomy, EmbeddingSource, EmbeddingStore, HyponymyDataset, HyponymyRecord,
    IndexedRelation, NegativeSampler, RecordFilter, RelationSource, Taxonomy, TaxonomyKind,
};
pub use taxocode_data::{
    Batch, BatchSampler, BatchSizeBalancer, NegativeSamplingConfig, NegativeTarget,
    SamplerConfig,
};
pub use taxocode_loss::{
    CodeLengthDiffLoss, CodeLengthLoss, DistanceMetric, EntailmentProbabilityLoss,
    HyponymyScoreLoss, LcaLengthLoss, LossConfig, Reduction,
};
