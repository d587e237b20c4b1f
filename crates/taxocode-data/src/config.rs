//! Sampler configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use taxocode_core::{Error, Result};

/// Which side of a hyponymy pair is replaced when synthesizing negatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegativeTarget {
    /// Keep the hypernym, draw non-hyponyms for it.
    #[default]
    Hyponym,
    /// Keep the hyponym, draw non-hypernyms for it.
    Hypernym,
    /// Half of the negatives each way.
    Both,
}

impl NegativeTarget {
    pub fn replaces_hyponym(self) -> bool {
        matches!(self, Self::Hyponym | Self::Both)
    }

    pub fn replaces_hypernym(self) -> bool {
        matches!(self, Self::Hypernym | Self::Both)
    }
}

impl FromStr for NegativeTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hyponym" => Ok(Self::Hyponym),
            "hypernym" => Ok(Self::Hypernym),
            "both" => Ok(Self::Both),
            other => Err(Error::InvalidConfig(format!(
                "`non_hyponymy_relation_target` must be one of hyponym,hypernym,both; got {other}"
            ))),
        }
    }
}

impl fmt::Display for NegativeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hyponym => "hyponym",
            Self::Hypernym => "hypernym",
            Self::Both => "both",
        })
    }
}

/// Negative (non-hyponymy) relation sampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NegativeSamplingConfig {
    /// Negatives per chunk; `None` means one per hyponymy relation.
    pub batch_size: Option<usize>,
    /// Fixed distance for every negative instead of the taxonomy distance.
    pub distance: Option<f32>,
    pub target: NegativeTarget,
    /// Also exclude reverse hyponymy (ancestors) from the candidates.
    pub exclude_reverse_hyponymy: bool,
    /// Draw candidates only from entities of the current chunk.
    pub limit_candidates_within_minibatch: bool,
    /// Split positives and negatives into separate batch fields.
    pub split: bool,
}

impl Default for NegativeSamplingConfig {
    fn default() -> Self {
        Self {
            batch_size: None,
            distance: None,
            target: NegativeTarget::Hyponym,
            exclude_reverse_hyponymy: true,
            limit_candidates_within_minibatch: true,
            split: true,
        }
    }
}

impl NegativeSamplingConfig {
    pub fn with_batch_size(mut self, n: usize) -> Self {
        self.batch_size = Some(n);
        self
    }

    pub fn with_distance(mut self, distance: f32) -> Self {
        self.distance = Some(distance);
        self
    }

    pub fn with_target(mut self, target: NegativeTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_exclude_reverse_hyponymy(mut self, exclude: bool) -> Self {
        self.exclude_reverse_hyponymy = exclude;
        self
    }

    pub fn with_limit_candidates_within_minibatch(mut self, limit: bool) -> Self {
        self.limit_candidates_within_minibatch = limit;
        self
    }

    pub fn with_split(mut self, split: bool) -> Self {
        self.split = split;
        self
    }
}

/// Batch sampler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Entities per batch, `B_e` (default: 256).
    pub embedding_batch_size: usize,
    /// Relation records per chunk, `B_r` (default: 64).
    pub hyponymy_batch_size: usize,
    /// Visit relation records in a random order when streaming.
    pub shuffle: bool,
    /// Negative sampling; `None` disables it.
    pub negative: Option<NegativeSamplingConfig>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            embedding_batch_size: 256,
            hyponymy_batch_size: 64,
            shuffle: false,
            negative: None,
        }
    }
}

impl SamplerConfig {
    pub fn new(embedding_batch_size: usize, hyponymy_batch_size: usize) -> Self {
        Self {
            embedding_batch_size,
            hyponymy_batch_size,
            ..Self::default()
        }
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_negative(mut self, negative: NegativeSamplingConfig) -> Self {
        self.negative = Some(negative);
        self
    }

    /// Negatives per chunk (0 without negative sampling).
    pub fn non_hyponymy_batch_size(&self) -> usize {
        self.negative
            .as_ref()
            .map_or(0, |n| n.batch_size.unwrap_or(self.hyponymy_batch_size))
    }

    /// Negatives per hyponymy relation.
    pub fn non_hyponymy_multiple(&self) -> usize {
        if self.hyponymy_batch_size == 0 {
            return 0;
        }
        self.non_hyponymy_batch_size() / self.hyponymy_batch_size
    }

    /// Negatives requested from each side per relation.
    pub fn negatives_per_side(&self) -> usize {
        match self.negative.as_ref().map(|n| n.target) {
            Some(NegativeTarget::Both) => self.non_hyponymy_multiple() / 2,
            Some(_) => self.non_hyponymy_multiple(),
            None => 0,
        }
    }

    /// Check the batch-size preconditions.
    pub fn validate(&self) -> Result<()> {
        let (be, br) = (self.embedding_batch_size, self.hyponymy_batch_size);
        if be == 0 || br == 0 {
            return Err(Error::InvalidConfig(
                "batch sizes must be positive".into(),
            ));
        }
        if be < 2 * br {
            return Err(Error::InvalidConfig(format!(
                "`embedding_batch_size` ({be}) must be at least twice `hyponymy_batch_size` ({br})"
            )));
        }

        let Some(negative) = &self.negative else {
            return Ok(());
        };
        let nb = self.non_hyponymy_batch_size();
        if nb % br != 0 {
            return Err(Error::InvalidConfig(format!(
                "`non_hyponymy_batch_size` ({nb}) must be a multiple of `hyponymy_batch_size` ({br})"
            )));
        }
        if !negative.limit_candidates_within_minibatch && be < 2 * br + nb {
            return Err(Error::InvalidConfig(format!(
                "`embedding_batch_size` ({be}) must be at least `2*hyponymy_batch_size + non_hyponymy_batch_size` ({})",
                2 * br + nb
            )));
        }
        if negative.target == NegativeTarget::Both && (nb / br) % 2 != 0 {
            return Err(Error::InvalidConfig(format!(
                "with target `both`, `non_hyponymy_batch_size` ({nb}) must be an even multiple of `hyponymy_batch_size` ({br})"
            )));
        }
        Ok(())
    }
}
