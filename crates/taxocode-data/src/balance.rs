//! Batch-size balancing diagnostics.
//!
//! Each batch references `B_e` entities, of which `2 * B_r` (plus the
//! negatives, when they are drawn from the whole vocabulary) come from the
//! relation chunk. The remaining slots are random fillers. Sampling uniformly
//! with replacement touches a fraction of about `1 - 1/e` of the vocabulary
//! when the number of draws equals its size, so one epoch references roughly
//!
//! ```text
//! (1 - 1/e) * ceil(N_rel / B_r) * filler_slots
//! ```
//!
//! distinct embeddings. The balancer reports that estimate and the batch
//! sizes that would bring the ratio to 1. It never changes sampling.

use crate::config::SamplerConfig;
use std::fmt;
use taxocode_core::{Error, Result};

/// Expected fraction of a population touched by as many uniform draws.
pub const EFFECTIVE_SAMPLE_COEF: f64 = 1.0 - 1.0 / std::f64::consts::E;

/// Embedding-coverage calculator.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSizeBalancer {
    n_embeddings: usize,
    n_relations: usize,
    embedding_batch_size: usize,
    hyponymy_batch_size: usize,
    non_hyponymy_batch_size: usize,
    non_hyponymy_multiple: usize,
    negatives_from_vocabulary: bool,
}

/// Output of [`BatchSizeBalancer::report`].
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceReport {
    pub n_embeddings: usize,
    pub n_relations: usize,
    pub n_non_hyponymy_relations: usize,
    pub n_iterations: usize,
    /// Filler slots per batch.
    pub sampled_per_batch: usize,
    /// Expected distinct embeddings referenced in one epoch.
    pub embeddings_used_in_epoch: f64,
    /// `embeddings_used_in_epoch / n_embeddings`.
    pub consumption_ratio: f64,
    pub balanced_embedding_batch_size: usize,
    pub balanced_hyponymy_batch_size: usize,
    pub balanced_non_hyponymy_batch_size: usize,
}

impl BatchSizeBalancer {
    pub fn new(n_embeddings: usize, n_relations: usize, config: &SamplerConfig) -> Result<Self> {
        if n_embeddings == 0 {
            return Err(Error::InvalidConfig(
                "balancing needs a non-empty vocabulary".into(),
            ));
        }
        if config.hyponymy_batch_size == 0 {
            return Err(Error::InvalidConfig(
                "`hyponymy_batch_size` must be positive".into(),
            ));
        }
        let negatives_from_vocabulary = config
            .negative
            .as_ref()
            .is_some_and(|n| !n.limit_candidates_within_minibatch);
        Ok(Self {
            n_embeddings,
            n_relations,
            embedding_batch_size: config.embedding_batch_size,
            hyponymy_batch_size: config.hyponymy_batch_size,
            non_hyponymy_batch_size: config.non_hyponymy_batch_size(),
            non_hyponymy_multiple: config.non_hyponymy_multiple(),
            negatives_from_vocabulary,
        })
    }

    /// Entity slots per batch taken by relation entities.
    fn reserved_slots(&self) -> usize {
        let mut reserved = 2 * self.hyponymy_batch_size;
        if self.negatives_from_vocabulary {
            reserved += self.non_hyponymy_batch_size;
        }
        reserved
    }

    /// Entities referenced per relation.
    fn multiplier(&self) -> f64 {
        if self.negatives_from_vocabulary {
            (2 + self.non_hyponymy_multiple) as f64
        } else {
            2.0
        }
    }

    #[must_use]
    pub fn report(&self) -> BalanceReport {
        let coef = EFFECTIVE_SAMPLE_COEF;
        let n_emb = self.n_embeddings as f64;
        let n_rel = self.n_relations as f64;
        let be = self.embedding_batch_size as f64;
        let reserved = self.reserved_slots();

        let n_iterations = self.n_relations.div_ceil(self.hyponymy_batch_size);
        let sampled_per_batch = self.embedding_batch_size.saturating_sub(reserved);

        let embeddings_used_in_epoch = coef * n_iterations as f64 * sampled_per_batch as f64;
        let consumption_ratio = embeddings_used_in_epoch / n_emb;

        let balanced_embedding_batch_size = if n_iterations == 0 {
            self.embedding_batch_size
        } else {
            (n_emb / (coef * n_iterations as f64) + reserved as f64).ceil() as usize
        };
        let balanced_hyponymy_batch_size =
            ((n_rel * be * coef / (n_emb + self.multiplier() * coef * n_rel)).floor() as usize).max(1);

        let report = BalanceReport {
            n_embeddings: self.n_embeddings,
            n_relations: self.n_relations,
            n_non_hyponymy_relations: self.n_relations * self.non_hyponymy_multiple,
            n_iterations,
            sampled_per_batch,
            embeddings_used_in_epoch,
            consumption_ratio,
            balanced_embedding_batch_size,
            balanced_hyponymy_batch_size,
            balanced_non_hyponymy_batch_size: balanced_hyponymy_batch_size * self.non_hyponymy_multiple,
        };
        tracing::info!(
            n_embeddings = report.n_embeddings,
            n_relations = report.n_relations,
            ratio = report.consumption_ratio,
            balanced_embedding_batch_size = report.balanced_embedding_batch_size,
            balanced_hyponymy_batch_size = report.balanced_hyponymy_batch_size,
            "batch size balance"
        );
        report
    }
}

impl fmt::Display for BalanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "hyponymy relations: {}", self.n_relations)?;
        if self.n_non_hyponymy_relations > 0 {
            writeln!(f, "non-hyponymy relations: {}", self.n_non_hyponymy_relations)?;
        }
        writeln!(f, "embeddings: {}", self.n_embeddings)?;
        writeln!(f, "embeddings referenced in epoch: {:.0}", self.embeddings_used_in_epoch)?;
        writeln!(f, "consumption ratio: {:.3}", self.consumption_ratio)?;
        writeln!(f, "balanced `embedding_batch_size`: {}", self.balanced_embedding_batch_size)?;
        write!(f, "balanced `hyponymy_batch_size`: {}", self.balanced_hyponymy_batch_size)?;
        if self.balanced_non_hyponymy_batch_size > 0 {
            write!(
                f,
                "\nbalanced `non_hyponymy_batch_size`: {}",
                self.balanced_non_hyponymy_batch_size
            )?;
        }
        Ok(())
    }
}
