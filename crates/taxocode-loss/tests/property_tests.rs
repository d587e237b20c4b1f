//! Property-based tests for the soft scores and metrics.
//!
//! Over random code distributions:
//! - code and LCA lengths stay within [0, n_digits]
//! - ancestor probability stays within [0, 1]
//! - prefix pairs score their length difference
//! - every metric is finite and non-negative

use ndarray::{Array1, Array3};
use proptest::prelude::*;
use taxocode_loss::scoring::clamp_probabilities;
use taxocode_loss::{
    ancestor_probability, hyponymy_score, soft_code_length, soft_lca_length, DistanceMetric,
    Reduction,
};

/// Rows normalised to sum to 1 from raw positive weights.
fn arb_codes(n: usize, digits: usize, ary: usize) -> impl Strategy<Value = Array3<f32>> {
    prop::collection::vec(0.01f32..10.0, n * digits * ary).prop_map(move |w| {
        let mut probs = Array3::from_shape_vec((n, digits, ary), w).unwrap();
        for mut row in probs.rows_mut() {
            let total = row.sum();
            row.mapv_inplace(|v| v / total);
        }
        probs
    })
}

fn arb_batch() -> impl Strategy<Value = Array3<f32>> {
    (1usize..6, 1usize..8, 2usize..6).prop_flat_map(|(n, digits, ary)| arb_codes(n, digits, ary))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn lengths_are_bounded(probs in arb_batch()) {
        let digits = probs.shape()[1] as f32;
        let lengths = soft_code_length(probs.view()).unwrap();
        for &l in &lengths {
            prop_assert!(l >= -1e-4 && l <= digits + 1e-4, "length {l}");
        }
    }

    #[test]
    fn pair_scores_are_bounded(
        x in arb_codes(4, 5, 3),
        y in arb_codes(4, 5, 3),
    ) {
        let x = clamp_probabilities(x.view());
        let y = clamp_probabilities(y.view());

        let alpha = ancestor_probability(x.view(), y.view()).unwrap();
        let lca = soft_lca_length(x.view(), y.view()).unwrap();
        let score = hyponymy_score(x.view(), y.view()).unwrap();
        let lx = soft_code_length(x.view()).unwrap();

        for i in 0..4 {
            prop_assert!((-1e-4..=1.0 + 1e-4).contains(&alpha[i]), "alpha {}", alpha[i]);
            prop_assert!((-1e-4..=5.0 + 1e-4).contains(&lca[i]), "lca {}", lca[i]);
            prop_assert!(score[i].is_finite());
            // score is a mix of (ly - lx) and (lca - lx), both >= -lx
            prop_assert!(score[i] >= -lx[i] - 1e-3);
        }
    }

    #[test]
    fn prefix_pairs_score_length_difference(
        prefix in prop::collection::vec(1usize..3, 1..4),
        suffix in prop::collection::vec(1usize..3, 1..3),
    ) {
        // x = prefix, y = prefix + suffix, both terminated and padded
        let digits = prefix.len() + suffix.len() + 1;
        let mut probs = Array3::<f32>::zeros((2, digits, 3));
        for n in 0..digits {
            let vx = prefix.get(n).copied().unwrap_or(0);
            let vy = prefix.iter().chain(&suffix).nth(n).copied().unwrap_or(0);
            probs[[0, n, vx]] = 1.0;
            probs[[1, n, vy]] = 1.0;
        }
        let probs = clamp_probabilities(probs.view());
        let x = probs.slice(ndarray::s![0..1, .., ..]);
        let y = probs.slice(ndarray::s![1..2, .., ..]);

        let alpha = ancestor_probability(x, y).unwrap()[0];
        prop_assert!(alpha > 0.99, "alpha {alpha}");

        let score = hyponymy_score(x, y).unwrap()[0];
        let diff = soft_code_length(y).unwrap()[0] - soft_code_length(x).unwrap()[0];
        prop_assert!((score - diff).abs() < 0.05, "score {score} vs {diff}");
        prop_assert!((diff - suffix.len() as f32).abs() < 0.05);
    }

    #[test]
    fn metrics_are_finite_and_non_negative(
        pred in prop::collection::vec(0.001f32..0.999, 2..20),
        seed in 0.0f32..1.0,
    ) {
        let pred = Array1::from(pred);
        let target = pred.mapv(|p| ((p + seed) * 7.0).fract());
        for metric in DistanceMetric::ALL {
            for reduction in [Reduction::Mean, Reduction::Sum] {
                let d = metric.distance(pred.view(), target.view(), reduction).unwrap();
                prop_assert!(d.is_finite(), "{metric}: {d}");
                prop_assert!(d >= -1e-5, "{metric}: {d}");
            }
        }
    }
}
