//! Supervised losses over code distributions.
//!
//! | Loss | Target | Prediction |
//! |------|--------|------------|
//! | [`CodeLengthLoss`] | `(entity, depth)` | soft code length |
//! | [`CodeLengthDiffLoss`] | `(hypernym, hyponym, depth difference)` | `L(hyponym) - L(hypernym)` |
//! | [`HyponymyScoreLoss`] | `(hypernym, hyponym, signed distance)` | hyponymy score |
//! | [`LcaLengthLoss`] | `(hypernym, hyponym, LCA depth)` | soft LCA length |
//! | [`EntailmentProbabilityLoss`] | `(hypernym, hyponym, 1 or 0)` | ancestor probability |
//!
//! With `normalize`, predictions are divided by the number of digits and the
//! targets multiplied by `ground_truth_coefficient` before the metric is
//! applied. The metric value is multiplied by `scale`.

use crate::error::{Error, Result};
use crate::metric::{DistanceMetric, Reduction};
use crate::scoring::{
    ancestor_probability, clamp_probabilities, hyponymy_score, soft_code_length, soft_lca_length,
};
use ndarray::{Array1, Array3, ArrayView3, Axis};
use serde::{Deserialize, Serialize};
use taxocode_core::IndexedRelation;

/// Shared loss settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LossConfig {
    /// Multiplier on the final loss.
    pub scale: f32,
    /// Divide predictions by `n_digits` and multiply targets by
    /// `ground_truth_coefficient`.
    pub normalize: bool,
    pub ground_truth_coefficient: f32,
    pub metric: DistanceMetric,
    pub reduction: Reduction,
}

impl Default for LossConfig {
    fn default() -> Self {
        Self {
            scale: 1.0,
            normalize: false,
            ground_truth_coefficient: 1.0,
            metric: DistanceMetric::ScaledMse,
            reduction: Reduction::Mean,
        }
    }
}

impl LossConfig {
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_normalize(mut self, ground_truth_coefficient: f32) -> Self {
        self.normalize = true;
        self.ground_truth_coefficient = ground_truth_coefficient;
        self
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Parse the metric by name; unknown names fail here, not at evaluation.
    pub fn with_metric_name(self, name: &str) -> Result<Self> {
        Ok(self.with_metric(name.parse()?))
    }

    pub fn with_reduction(mut self, reduction: Reduction) -> Self {
        self.reduction = reduction;
        self
    }

    fn finish(&self, mut pred: Array1<f32>, mut target: Array1<f32>, n_digits: usize) -> Result<f32> {
        if self.normalize {
            pred /= n_digits as f32;
            target *= self.ground_truth_coefficient;
        }
        let loss = self
            .metric
            .distance(pred.view(), target.view(), self.reduction)?;
        tracing::trace!(metric = %self.metric, loss, n = pred.len(), "loss");
        Ok(loss * self.scale)
    }
}

fn check_index(index: usize, len: usize) -> Result<usize> {
    if index >= len {
        return Err(Error::IndexOutOfBounds { index, len });
    }
    Ok(index)
}

/// Rows of `probs` for the hypernym and hyponym side of each relation, plus targets.
fn gather_pairs(
    probs: ArrayView3<'_, f32>,
    targets: &[IndexedRelation],
) -> Result<(Array3<f32>, Array3<f32>, Array1<f32>)> {
    if targets.is_empty() {
        return Err(Error::EmptyTargets);
    }
    let n = probs.len_of(Axis(0));
    let x = targets
        .iter()
        .map(|t| check_index(t.hypernym, n))
        .collect::<Result<Vec<_>>>()?;
    let y = targets
        .iter()
        .map(|t| check_index(t.hyponym, n))
        .collect::<Result<Vec<_>>>()?;
    let truth = targets.iter().map(|t| t.distance).collect();
    Ok((probs.select(Axis(0), &x), probs.select(Axis(0), &y), truth))
}

fn n_digits(probs: &ArrayView3<'_, f32>) -> usize {
    probs.len_of(Axis(1))
}

/// Soft code length against a target depth.
#[derive(Debug, Clone, Default)]
pub struct CodeLengthLoss {
    config: LossConfig,
}

impl CodeLengthLoss {
    pub fn new(config: LossConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn scale(&self) -> f32 {
        self.config.scale
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.config.scale = scale;
    }

    pub fn config(&self) -> &LossConfig {
        &self.config
    }

    /// `targets`: `(entity index, depth)`.
    pub fn compute(&self, probs: ArrayView3<'_, f32>, targets: &[(usize, f32)]) -> Result<f32> {
        if targets.is_empty() {
            return Err(Error::EmptyTargets);
        }
        let n = probs.len_of(Axis(0));
        let idx = targets
            .iter()
            .map(|&(i, _)| check_index(i, n))
            .collect::<Result<Vec<_>>>()?;
        let truth = targets.iter().map(|&(_, d)| d).collect();
        let pred = soft_code_length(probs.select(Axis(0), &idx).view())?;
        self.config.finish(pred, truth, n_digits(&probs))
    }
}

/// Difference of code lengths, hyponym minus hypernym.
#[derive(Debug, Clone, Default)]
pub struct CodeLengthDiffLoss {
    config: LossConfig,
}

impl CodeLengthDiffLoss {
    pub fn new(config: LossConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn scale(&self) -> f32 {
        self.config.scale
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.config.scale = scale;
    }

    pub fn config(&self) -> &LossConfig {
        &self.config
    }

    pub fn compute(&self, probs: ArrayView3<'_, f32>, targets: &[IndexedRelation]) -> Result<f32> {
        let (x, y, truth) = gather_pairs(probs, targets)?;
        let pred = soft_code_length(y.view())? - soft_code_length(x.view())?;
        self.config.finish(pred, truth, n_digits(&probs))
    }
}

/// Soft hyponymy score against a signed tree distance.
#[derive(Debug, Clone, Default)]
pub struct HyponymyScoreLoss {
    config: LossConfig,
}

impl HyponymyScoreLoss {
    pub fn new(config: LossConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn scale(&self) -> f32 {
        self.config.scale
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.config.scale = scale;
    }

    pub fn config(&self) -> &LossConfig {
        &self.config
    }

    pub fn compute(&self, probs: ArrayView3<'_, f32>, targets: &[IndexedRelation]) -> Result<f32> {
        let clamped = clamp_probabilities(probs);
        let (x, y, truth) = gather_pairs(clamped.view(), targets)?;
        let pred = hyponymy_score(x.view(), y.view())?;
        self.config.finish(pred, truth, n_digits(&probs))
    }
}

/// Soft LCA length against the depth of the lowest common ancestor.
#[derive(Debug, Clone, Default)]
pub struct LcaLengthLoss {
    config: LossConfig,
}

impl LcaLengthLoss {
    pub fn new(config: LossConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn scale(&self) -> f32 {
        self.config.scale
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.config.scale = scale;
    }

    pub fn config(&self) -> &LossConfig {
        &self.config
    }

    pub fn compute(&self, probs: ArrayView3<'_, f32>, targets: &[IndexedRelation]) -> Result<f32> {
        let clamped = clamp_probabilities(probs);
        let (x, y, truth) = gather_pairs(clamped.view(), targets)?;
        let pred = soft_lca_length(x.view(), y.view())?;
        self.config.finish(pred, truth, n_digits(&probs))
    }
}

/// Ancestor probability against 1 (hyponymy) / 0 (not), by binary cross-entropy.
///
/// Targets are usually built with [`IndexedRelation::entailment_target`].
#[derive(Debug, Clone)]
pub struct EntailmentProbabilityLoss {
    config: LossConfig,
}

impl Default for EntailmentProbabilityLoss {
    fn default() -> Self {
        Self::new(1.0, Reduction::Mean)
    }
}

impl EntailmentProbabilityLoss {
    pub fn new(scale: f32, reduction: Reduction) -> Self {
        Self {
            config: LossConfig {
                scale,
                metric: DistanceMetric::BinaryCrossEntropy,
                reduction,
                ..LossConfig::default()
            },
        }
    }

    /// Weight applied to the cross-entropy.
    #[must_use]
    pub fn scale(&self) -> f32 {
        self.config.scale
    }

    /// Reweight, e.g. when annealing the entailment term during training.
    pub fn set_scale(&mut self, scale: f32) {
        self.config.scale = scale;
    }

    pub fn config(&self) -> &LossConfig {
        &self.config
    }

    pub fn compute(&self, probs: ArrayView3<'_, f32>, targets: &[IndexedRelation]) -> Result<f32> {
        let clamped = clamp_probabilities(probs);
        let (x, y, truth) = gather_pairs(clamped.view(), targets)?;
        let pred = ancestor_probability(x.view(), y.view())?;
        self.config.finish(pred, truth, n_digits(&probs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    const N_ARY: usize = 3;

    fn hard_code(digits: &[usize]) -> Array2<f32> {
        let mut code = Array2::zeros((digits.len(), N_ARY));
        for (n, &v) in digits.iter().enumerate() {
            code[[n, v]] = 1.0;
        }
        code
    }

    //   0: [1, 0, 0]  depth 1
    //   1: [1, 2, 0]  depth 2, child of 0
    //   2: [1, 1, 0]  depth 2, child of 0
    //   3: [2, 0, 0]  depth 1
    fn codes() -> Array3<f32> {
        let rows = [
            hard_code(&[1, 0, 0]),
            hard_code(&[1, 2, 0]),
            hard_code(&[1, 1, 0]),
            hard_code(&[2, 0, 0]),
        ];
        let views: Vec<_> = rows.iter().map(Array2::view).collect();
        ndarray::stack(Axis(0), &views).unwrap()
    }

    fn mse() -> LossConfig {
        LossConfig::default().with_metric(DistanceMetric::Mse)
    }

    #[test]
    fn test_code_length_loss() {
        let probs = codes();
        let loss = CodeLengthLoss::new(mse());
        let exact = loss.compute(probs.view(), &[(0, 1.0), (1, 2.0), (3, 1.0)]).unwrap();
        assert!(exact < 1e-6);

        let off = loss.compute(probs.view(), &[(0, 2.0)]).unwrap();
        assert!((off - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_code_length_normalized() {
        let probs = codes();
        // 2 / 3 digits vs 1.0 * (2/3)
        let loss = CodeLengthLoss::new(mse().with_normalize(1.0 / 3.0));
        let value = loss.compute(probs.view(), &[(1, 2.0)]).unwrap();
        assert!(value < 1e-6);
    }

    #[test]
    fn test_code_length_diff_loss() {
        let probs = codes();
        let loss = CodeLengthDiffLoss::new(mse());
        let targets = [IndexedRelation::new(0, 1, 1.0), IndexedRelation::new(1, 3, -1.0)];
        assert!(loss.compute(probs.view(), &targets).unwrap() < 1e-6);
    }

    #[test]
    fn test_hyponymy_score_loss() {
        let probs = codes();
        let loss = HyponymyScoreLoss::new(mse());
        let targets = [
            IndexedRelation::new(0, 1, 1.0),  // parent -> child
            IndexedRelation::new(1, 2, -1.0), // siblings
            IndexedRelation::new(1, 3, -2.0), // no shared prefix
        ];
        let value = loss.compute(probs.view(), &targets).unwrap();
        assert!(value < 1e-3, "loss = {value}");
    }

    #[test]
    fn test_lca_length_loss() {
        let probs = codes();
        let loss = LcaLengthLoss::new(mse());
        let targets = [IndexedRelation::new(1, 2, 1.0), IndexedRelation::new(0, 3, 0.0)];
        assert!(loss.compute(probs.view(), &targets).unwrap() < 1e-3);
    }

    #[test]
    fn test_entailment_loss() {
        let probs = codes();
        let loss = EntailmentProbabilityLoss::default();
        assert_eq!(loss.config().metric, DistanceMetric::BinaryCrossEntropy);

        let right = [
            IndexedRelation::new(0, 1, 3.0).entailment_target(),
            IndexedRelation::new(1, 2, -1.0).entailment_target(),
        ];
        let wrong = [
            IndexedRelation::new(0, 1, 0.0),
            IndexedRelation::new(1, 2, 1.0),
        ];
        let good = loss.compute(probs.view(), &right).unwrap();
        let bad = loss.compute(probs.view(), &wrong).unwrap();
        assert!(good < 0.01);
        assert!(bad > 5.0);
    }

    #[test]
    fn test_entailment_rejects_non_probability_targets() {
        let probs = codes();
        let loss = EntailmentProbabilityLoss::default();
        let err = loss
            .compute(probs.view(), &[IndexedRelation::new(0, 1, 3.0)])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTarget(_)));
    }

    #[test]
    fn test_cross_entropy_on_lengths_is_rejected() {
        let probs = codes();
        // code lengths are not probabilities
        let loss = CodeLengthLoss::new(
            LossConfig::default().with_metric(DistanceMetric::BinaryCrossEntropy),
        );
        let err = loss.compute(probs.view(), &[(1, 1.0)]).unwrap_err();
        assert!(matches!(err, Error::InvalidPrediction(p) if (p - 2.0).abs() < 1e-4));
    }

    #[test]
    fn test_scale() {
        let probs = codes();
        let mut loss = CodeLengthLoss::new(mse().with_scale(2.0));
        let doubled = loss.compute(probs.view(), &[(0, 2.0)]).unwrap();
        assert!((doubled - 2.0).abs() < 1e-4);
        loss.set_scale(0.0);
        assert_eq!(loss.scale(), 0.0);
        assert_eq!(loss.compute(probs.view(), &[(0, 2.0)]).unwrap(), 0.0);

        let mut entailment = EntailmentProbabilityLoss::new(0.5, Reduction::Sum);
        assert_eq!(entailment.scale(), 0.5);
        entailment.set_scale(3.0);
        assert_eq!(entailment.config().scale, 3.0);
    }

    #[test]
    fn test_bad_targets() {
        let probs = codes();
        let loss = HyponymyScoreLoss::default();
        assert!(matches!(
            loss.compute(probs.view(), &[IndexedRelation::new(0, 9, 1.0)]),
            Err(Error::IndexOutOfBounds { index: 9, len: 4 })
        ));
        assert!(matches!(loss.compute(probs.view(), &[]), Err(Error::EmptyTargets)));
        assert!(matches!(
            CodeLengthLoss::default().compute(probs.view(), &[(4, 1.0)]),
            Err(Error::IndexOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_unknown_metric_fails_at_construction() {
        assert!(matches!(
            LossConfig::default().with_metric_name("batchnorm-mse"),
            Err(Error::UnsupportedMetric(_))
        ));
        let cfg = LossConfig::default().with_metric_name("hinge").unwrap();
        assert_eq!(cfg.metric, DistanceMetric::Hinge);
    }

    #[test]
    fn test_config_serde() {
        let cfg: LossConfig =
            serde_json::from_str(r#"{"metric": "autoscaled-mse", "normalize": true}"#).unwrap();
        assert_eq!(cfg.metric, DistanceMetric::AutoscaledMse);
        assert!(cfg.normalize);
        assert_eq!(cfg.scale, 1.0);
        assert!(serde_json::from_str::<LossConfig>(r#"{"metric": "euclid"}"#).is_err());
    }
}
