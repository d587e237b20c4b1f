//! Distance metrics between predicted and ground-truth score vectors.

use crate::error::{Error, Result};
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const STD_EPS: f32 = 1e-6;
const FIT_EPS: f32 = 1e-6;
const COSINE_EPS: f32 = 1e-8;
const PROB_TOLERANCE: f32 = 1e-5;

/// How element-wise losses are folded into a scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reduction {
    #[default]
    Mean,
    Sum,
}

impl Reduction {
    fn apply(self, values: &Array1<f32>) -> f32 {
        match self {
            Self::Mean => values.mean().unwrap_or(0.0),
            Self::Sum => values.sum(),
        }
    }
}

impl FromStr for Reduction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mean" => Ok(Self::Mean),
            "sum" => Ok(Self::Sum),
            other => Err(Error::UnsupportedReduction(other.to_string())),
        }
    }
}

/// Distance between a prediction vector `u` and a target vector `v`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DistanceMetric {
    /// Squared error.
    Mse,
    /// Squared error after dividing each vector by its standard deviation.
    #[default]
    ScaledMse,
    /// Squared error after z-scoring each vector.
    StandardizedMse,
    /// Squared error after fitting `u` to `v` with a least-squares factor.
    ///
    /// Falls back to `ScaledMse` when the fitted factor is not positive.
    AutoscaledMse,
    /// Like `AutoscaledMse`, with the factor floored at 1.
    PositiveAutoscaledMse,
    /// Absolute error.
    Mae,
    /// Absolute error after dividing each vector by its standard deviation.
    ScaledMae,
    /// `1 - cos(u, v)`; whole-vector, ignores the reduction.
    Cosine,
    /// `max(0, u - v)`: only over-prediction is penalised.
    Hinge,
    /// Cross-entropy of probabilities `u` against targets `v` in [0, 1].
    BinaryCrossEntropy,
}

impl DistanceMetric {
    pub const ALL: [Self; 10] = [
        Self::Mse,
        Self::ScaledMse,
        Self::StandardizedMse,
        Self::AutoscaledMse,
        Self::PositiveAutoscaledMse,
        Self::Mae,
        Self::ScaledMae,
        Self::Cosine,
        Self::Hinge,
        Self::BinaryCrossEntropy,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Mse => "mse",
            Self::ScaledMse => "scaled-mse",
            Self::StandardizedMse => "standardized-mse",
            Self::AutoscaledMse => "autoscaled-mse",
            Self::PositiveAutoscaledMse => "positive-autoscaled-mse",
            Self::Mae => "mae",
            Self::ScaledMae => "scaled-mae",
            Self::Cosine => "cosine",
            Self::Hinge => "hinge",
            Self::BinaryCrossEntropy => "binary-cross-entropy",
        }
    }

    /// Distance between `pred` and `target` (same length, non-empty).
    pub fn distance(
        self,
        pred: ArrayView1<'_, f32>,
        target: ArrayView1<'_, f32>,
        reduction: Reduction,
    ) -> Result<f32> {
        if pred.len() != target.len() {
            return Err(Error::ShapeMismatch(format!(
                "prediction has {} values, target {}",
                pred.len(),
                target.len()
            )));
        }
        if pred.is_empty() {
            return Err(Error::EmptyTargets);
        }
        let value = match self {
            Self::Mse => mse(pred, target, reduction),
            Self::ScaledMse => scaled_mse(pred, target, reduction),
            Self::StandardizedMse => mse(
                standardize(pred).view(),
                standardize(target).view(),
                reduction,
            ),
            Self::AutoscaledMse => {
                let scale = fitted_scale(pred, target);
                if scale > 0.0 {
                    mse((&pred * scale).view(), target, reduction)
                } else {
                    scaled_mse(pred, target, reduction)
                }
            }
            Self::PositiveAutoscaledMse => {
                let scale = fitted_scale(pred, target).max(1.0);
                mse((&pred * scale).view(), target, reduction)
            }
            Self::Mae => mae(pred, target, reduction),
            Self::ScaledMae => mae(
                scale_by_std(pred).view(),
                scale_by_std(target).view(),
                reduction,
            ),
            Self::Cosine => cosine_distance(pred, target),
            Self::Hinge => reduction.apply(&(&pred - &target).mapv(|d| d.max(0.0))),
            Self::BinaryCrossEntropy => binary_cross_entropy(pred, target, reduction)?,
        };
        Ok(value)
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DistanceMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| Error::UnsupportedMetric(s.to_string()))
    }
}

fn mse(u: ArrayView1<'_, f32>, v: ArrayView1<'_, f32>, reduction: Reduction) -> f32 {
    reduction.apply(&(&u - &v).mapv(|d| d * d))
}

fn mae(u: ArrayView1<'_, f32>, v: ArrayView1<'_, f32>, reduction: Reduction) -> f32 {
    reduction.apply(&(&u - &v).mapv(f32::abs))
}

fn scaled_mse(u: ArrayView1<'_, f32>, v: ArrayView1<'_, f32>, reduction: Reduction) -> f32 {
    mse(scale_by_std(u).view(), scale_by_std(v).view(), reduction)
}

/// Unbiased standard deviation; 0 for fewer than two values.
fn std_dev(x: ArrayView1<'_, f32>) -> f32 {
    if x.len() < 2 {
        return 0.0;
    }
    x.std(1.0)
}

/// `x / (std + eps)`; a single value is left unscaled.
fn scale_by_std(x: ArrayView1<'_, f32>) -> Array1<f32> {
    if x.len() < 2 {
        return x.to_owned();
    }
    let denom = std_dev(x) + STD_EPS;
    x.mapv(|v| v / denom)
}

/// `(x - mean) / (std + eps)`.
fn standardize(x: ArrayView1<'_, f32>) -> Array1<f32> {
    let mean = x.mean().unwrap_or(0.0);
    let denom = if x.len() < 2 { 1.0 } else { std_dev(x) + STD_EPS };
    x.mapv(|v| (v - mean) / denom)
}

/// Least-squares factor `s` minimising `|s u - v|^2`.
fn fitted_scale(u: ArrayView1<'_, f32>, v: ArrayView1<'_, f32>) -> f32 {
    u.dot(&v) / (u.dot(&u) + FIT_EPS)
}

fn cosine_distance(u: ArrayView1<'_, f32>, v: ArrayView1<'_, f32>) -> f32 {
    let norm_u = u.dot(&u).sqrt().max(COSINE_EPS);
    let norm_v = v.dot(&v).sqrt().max(COSINE_EPS);
    1.0 - u.dot(&v) / (norm_u * norm_v)
}

fn binary_cross_entropy(
    p: ArrayView1<'_, f32>,
    target: ArrayView1<'_, f32>,
    reduction: Reduction,
) -> Result<f32> {
    if let Some(&bad) = target.iter().find(|t| !(0.0..=1.0).contains(*t)) {
        return Err(Error::InvalidTarget(bad));
    }
    if let Some(&bad) = p
        .iter()
        .find(|&&v| !(-PROB_TOLERANCE..=1.0 + PROB_TOLERANCE).contains(&v))
    {
        return Err(Error::InvalidPrediction(bad));
    }
    // rounding in the ancestor recurrence can step just past [0, 1]
    let log = |x: f32| x.clamp(0.0, 1.0).ln().max(-100.0);
    let losses: Array1<f32> = p
        .iter()
        .zip(target.iter())
        .map(|(&p, &t)| -(t * log(p) + (1.0 - t) * log(1.0 - p)))
        .collect();
    Ok(reduction.apply(&losses))
}
