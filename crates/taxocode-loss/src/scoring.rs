//! Soft scores over per-digit code distributions.
//!
//! A code batch `P` has shape `(N, n_digits, n_ary)` with `P[i, n, v]` the
//! probability that digit `n` of entity `i` is symbol `v`. Symbol 0 is the
//! terminator: a code stops at the first digit that emits it.
//!
//! # Stopping process
//!
//! Given per-digit stop intensities `t[0..D]`, the code stops at `l` with
//!
//! ```text
//! Pr(L = l) = t[l] * prod_{k<l} (1 - t[k])      l < D
//! Pr(L = D) =        prod_{k<D} (1 - t[k])
//! ```
//!
//! and its soft length is `sum_l l * Pr(L = l)`. The code length uses
//! `t = P[.., 0]`; the LCA length uses the probability that two codes
//! diverge at each digit.
//!
//! # Pair scores
//!
//! For hypernym candidate `x` and hyponym candidate `y`, with
//! `gamma[n] = sum_v Px[n,v] Py[n,v] - Px[n,0] Py[n,0]` the probability that
//! both codes continue with the same symbol:
//!
//! ```text
//! ancestor(x, y) = sum_n Px[n,0] (1 - Py[n,0]) * prod_{k<n} gamma[k]
//! lca(x, y)      = soft length with t[n] = 1 - gamma[n]
//! score(x, y)    = a (Ly - Lx) + (1 - a) (Llca - Lx),   a = ancestor(x, y)
//! ```

use crate::error::{Error, Result};
use ndarray::{Array1, Array3, ArrayView1, ArrayView2, ArrayView3, Axis};

/// Probabilities are clamped to `[PROB_EPS, 1 - PROB_EPS]` before scoring.
pub const PROB_EPS: f32 = 1e-5;

/// Copy of `probs` clamped away from exact 0 and 1.
#[must_use]
pub fn clamp_probabilities(probs: ArrayView3<'_, f32>) -> Array3<f32> {
    probs.mapv(|p| p.clamp(PROB_EPS, 1.0 - PROB_EPS))
}

/// Stop intensities to a length distribution over `0..=D`.
#[must_use]
pub fn intensity_to_probability(intensity: ArrayView1<'_, f32>) -> Array1<f32> {
    let d = intensity.len();
    let mut out = Array1::zeros(d + 1);
    let mut survive = 1.0f32;
    for (l, &t) in intensity.iter().enumerate() {
        out[l] = survive * t;
        survive *= 1.0 - t;
    }
    out[d] = survive;
    out
}

fn expected_length(intensity: ArrayView1<'_, f32>) -> f32 {
    intensity_to_probability(intensity)
        .iter()
        .enumerate()
        .map(|(l, p)| l as f32 * p)
        .sum()
}

/// Probability that `x` and `y` emit the same non-terminator symbol, per digit.
fn continuation(x: ArrayView2<'_, f32>, y: ArrayView2<'_, f32>) -> Array1<f32> {
    x.outer_iter()
        .zip(y.outer_iter())
        .map(|(px, py)| px.dot(&py) - px[0] * py[0])
        .collect()
}

/// Soft length of one code `(n_digits, n_ary)`.
#[must_use]
pub fn code_length(code: ArrayView2<'_, f32>) -> f32 {
    expected_length(code.column(0))
}

/// Probability that `x` is a strict prefix of `y`.
///
/// # Arguments
///
/// * `x` - Code of the hypernym candidate, `(n_digits, n_ary)`
/// * `y` - Code of the hyponym candidate, same shape
///
/// # Complexity
///
/// O(n_digits * n_ary).
///
/// # Example
///
/// ```
/// use ndarray::array;
/// use taxocode_loss::scoring::ancestor_probability_pair;
///
/// // x = [1], y = [1, 2]
/// let x = array![[0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
/// let y = array![[0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]];
/// assert!((ancestor_probability_pair(x.view(), y.view()) - 1.0).abs() < 1e-6);
/// assert!(ancestor_probability_pair(y.view(), x.view()).abs() < 1e-6);
/// ```
#[must_use]
pub fn ancestor_probability_pair(x: ArrayView2<'_, f32>, y: ArrayView2<'_, f32>) -> f32 {
    let gamma = continuation(x, y);
    let mut matched = 1.0f32;
    let mut total = 0.0f32;
    for n in 0..x.nrows() {
        let beta = x[[n, 0]] * (1.0 - y[[n, 0]]);
        total += beta * matched;
        matched *= gamma[n];
    }
    total
}

/// Expected length of the common prefix of `x` and `y`.
#[must_use]
pub fn lca_length(x: ArrayView2<'_, f32>, y: ArrayView2<'_, f32>) -> f32 {
    let breaks = continuation(x, y).mapv(|g| 1.0 - g);
    expected_length(breaks.view())
}

/// Soft signed tree distance from `x` down to `y`.
#[must_use]
pub fn hyponymy_score_pair(x: ArrayView2<'_, f32>, y: ArrayView2<'_, f32>) -> f32 {
    let (lx, ly) = (code_length(x), code_length(y));
    let alpha = ancestor_probability_pair(x, y);
    let l_lca = lca_length(x, y);
    alpha * (ly - lx) + (1.0 - alpha) * (l_lca - lx)
}

fn check_codes(probs: &ArrayView3<'_, f32>) -> Result<()> {
    if probs.len_of(Axis(2)) == 0 {
        return Err(Error::ShapeMismatch(
            "code distributions need at least one symbol".into(),
        ));
    }
    Ok(())
}

fn check_pair(x: &ArrayView3<'_, f32>, y: &ArrayView3<'_, f32>) -> Result<()> {
    check_codes(x)?;
    if x.shape() != y.shape() {
        return Err(Error::ShapeMismatch(format!(
            "{:?} vs {:?}",
            x.shape(),
            y.shape()
        )));
    }
    Ok(())
}

fn map_pairs(
    x: ArrayView3<'_, f32>,
    y: ArrayView3<'_, f32>,
    f: impl Fn(ArrayView2<'_, f32>, ArrayView2<'_, f32>) -> f32,
) -> Result<Array1<f32>> {
    check_pair(&x, &y)?;
    Ok(x.outer_iter()
        .zip(y.outer_iter())
        .map(|(a, b)| f(a, b))
        .collect())
}

/// Soft code length per entity, in `[0, n_digits]`.
///
/// # Arguments
///
/// * `probs` - Code distributions, `(n_entities, n_digits, n_ary)`
///
/// # Complexity
///
/// O(n_entities * n_digits).
pub fn soft_code_length(probs: ArrayView3<'_, f32>) -> Result<Array1<f32>> {
    check_codes(&probs)?;
    Ok(probs.outer_iter().map(code_length).collect())
}

/// Row-wise [`ancestor_probability_pair`].
pub fn ancestor_probability(x: ArrayView3<'_, f32>, y: ArrayView3<'_, f32>) -> Result<Array1<f32>> {
    map_pairs(x, y, ancestor_probability_pair)
}

/// Row-wise [`lca_length`].
pub fn soft_lca_length(x: ArrayView3<'_, f32>, y: ArrayView3<'_, f32>) -> Result<Array1<f32>> {
    map_pairs(x, y, lca_length)
}

/// Row-wise [`hyponymy_score_pair`].
///
/// # Arguments
///
/// * `x` - Hypernym-side codes, `(n_pairs, n_digits, n_ary)`
/// * `y` - Hyponym-side codes, same shape as `x`
///
/// # Complexity
///
/// O(n_pairs * n_digits * n_ary).
pub fn hyponymy_score(x: ArrayView3<'_, f32>, y: ArrayView3<'_, f32>) -> Result<Array1<f32>> {
    map_pairs(x, y, hyponymy_score_pair)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    const N_ARY: usize = 3;

    /// Code emitting `digits[n]` with probability `1 - eps` at each digit.
    fn hard_code(digits: &[usize]) -> Array2<f32> {
        let eps = 1e-4;
        let mut code = Array2::from_elem((digits.len(), N_ARY), eps / (N_ARY - 1) as f32);
        for (n, &v) in digits.iter().enumerate() {
            code[[n, v]] = 1.0 - eps;
        }
        code
    }

    fn batch(codes: &[Array2<f32>]) -> Array3<f32> {
        let views: Vec<_> = codes.iter().map(Array2::view).collect();
        ndarray::stack(Axis(0), &views).unwrap()
    }

    #[test]
    fn test_intensity_to_probability_sums_to_one() {
        let p = intensity_to_probability(array![0.2, 0.5, 0.1].view());
        assert_eq!(p.len(), 4);
        assert!((p.sum() - 1.0).abs() < 1e-6);
        assert!((p[0] - 0.2).abs() < 1e-6);
        assert!((p[1] - 0.8 * 0.5).abs() < 1e-6);
        assert!((p[3] - 0.8 * 0.5 * 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_code_length_extremes() {
        // never terminates -> full length
        assert!((code_length(hard_code(&[1, 2, 1, 1]).view()) - 4.0).abs() < 1e-2);
        // terminates at digit 0
        assert!(code_length(hard_code(&[0, 1, 2, 1]).view()).abs() < 1e-2);
        // terminates at digit 2
        assert!((code_length(hard_code(&[1, 2, 0, 0]).view()) - 2.0).abs() < 1e-2);
    }

    #[test]
    fn test_soft_code_length_batch() {
        let probs = batch(&[hard_code(&[1, 0, 0]), hard_code(&[2, 1, 0])]);
        let lengths = soft_code_length(probs.view()).unwrap();
        assert!((lengths[0] - 1.0).abs() < 1e-2);
        assert!((lengths[1] - 2.0).abs() < 1e-2);
    }

    #[test]
    fn test_ancestor_probability_of_prefix() {
        let x = hard_code(&[1, 0, 0, 0]);
        let y = hard_code(&[1, 2, 0, 0]);
        assert!((ancestor_probability_pair(x.view(), y.view()) - 1.0).abs() < 1e-2);
        // reversed direction: y is not a prefix of x
        assert!(ancestor_probability_pair(y.view(), x.view()) < 1e-2);
    }

    #[test]
    fn test_ancestor_probability_of_siblings() {
        let x = hard_code(&[1, 1, 0]);
        let y = hard_code(&[1, 2, 0]);
        assert!(ancestor_probability_pair(x.view(), y.view()) < 1e-2);
        assert!((lca_length(x.view(), y.view()) - 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_lca_of_prefix_is_prefix_length() {
        let x = hard_code(&[2, 1, 0, 0]);
        let y = hard_code(&[2, 1, 1, 0]);
        assert!((lca_length(x.view(), y.view()) - 2.0).abs() < 1e-2);
    }

    #[test]
    fn test_hyponymy_score_is_length_difference_for_ancestors() {
        let x = hard_code(&[1, 0, 0, 0]);
        let y = hard_code(&[1, 2, 1, 0]);
        let expected = code_length(y.view()) - code_length(x.view());
        assert!((hyponymy_score_pair(x.view(), y.view()) - expected).abs() < 1e-2);
        assert!((expected - 2.0).abs() < 1e-2);
    }

    #[test]
    fn test_hyponymy_score_through_lca() {
        // siblings under a depth-1 prefix: lca = 1, lx = 2 -> -1
        let x = hard_code(&[1, 1, 0]);
        let y = hard_code(&[1, 2, 0]);
        assert!((hyponymy_score_pair(x.view(), y.view()) + 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_uniform_code_length_in_range() {
        let code = Array2::from_elem((5, 4), 0.25f32);
        let l = code_length(code.view());
        assert!(l > 0.0 && l < 5.0);
    }

    #[test]
    fn test_pair_shape_mismatch() {
        let x = batch(&[hard_code(&[1, 0])]);
        let y = batch(&[hard_code(&[1, 0, 0])]);
        assert!(matches!(
            ancestor_probability(x.view(), y.view()),
            Err(Error::ShapeMismatch(_))
        ));
        let empty = Array3::<f32>::zeros((1, 2, 0));
        assert!(soft_code_length(empty.view()).is_err());
    }

    #[test]
    fn test_clamp() {
        let probs = batch(&[array![[0.0, 1.0], [0.5, 0.5]]]);
        let clamped = clamp_probabilities(probs.view());
        assert_eq!(clamped[[0, 0, 0]], PROB_EPS);
        assert_eq!(clamped[[0, 0, 1]], 1.0 - PROB_EPS);
        assert_eq!(clamped[[0, 1, 0]], 0.5);
    }
}
