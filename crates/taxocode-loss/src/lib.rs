#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_precision_loss)]

//! Soft hyponymy scoring over discrete code distributions.
//!
//! An encoder maps every entity of a batch to a code distribution
//! `P[i, n, v]` of shape `(N, n_digits, n_ary)`. This crate turns those into
//! differentiable proxies for tree quantities ([`scoring`]) and compares them
//! with ground truth through a [`DistanceMetric`] ([`loss`]).
//!
//! ```text
//!   entity i ──encoder──> P[i] : n_digits x n_ary
//!                              │
//!        soft_code_length / ancestor_probability / soft_lca_length
//!                              │
//!                      hyponymy_score(x, y)
//!                              │
//!                   DistanceMetric(pred, target) * scale
//! ```
//!
//! # Example
//!
//! ```rust
//! use ndarray::Array3;
//! use taxocode_core::IndexedRelation;
//! use taxocode_loss::{DistanceMetric, HyponymyScoreLoss, LossConfig};
//!
//! // entity 0 = [1, <stop>], entity 1 = [1, 2, <stop>]
//! let mut probs = Array3::<f32>::zeros((2, 3, 3));
//! for (i, digits) in [[1, 0, 0], [1, 2, 0]].iter().enumerate() {
//!     for (n, &v) in digits.iter().enumerate() {
//!         probs[[i, n, v]] = 1.0;
//!     }
//! }
//!
//! let loss = HyponymyScoreLoss::new(LossConfig::default().with_metric(DistanceMetric::Mse));
//! let value = loss
//!     .compute(probs.view(), &[IndexedRelation::new(0, 1, 1.0)])
//!     .unwrap();
//! assert!(value < 1e-3);
//! ```

mod error;
pub mod loss;
mod metric;
pub mod scoring;

pub use error::{Error, Result};
pub use loss::{
    CodeLengthDiffLoss, CodeLengthLoss, EntailmentProbabilityLoss, HyponymyScoreLoss,
    LcaLengthLoss, LossConfig,
};
pub use metric::{DistanceMetric, Reduction};
pub use scoring::{
    ancestor_probability, hyponymy_score, soft_code_length, soft_lca_length, PROB_EPS,
};
