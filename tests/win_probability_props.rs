//! Property tests for the win-probability model

use parity_ratings::numeric::QuadratureOptions;
use parity_ratings::rating::{win_probability, QuadratureModel, WinProbabilityModel};
use parity_ratings::types::Belief;
use proptest::prelude::*;

fn belief() -> impl Strategy<Value = Belief> {
    (-5.0..5.0f64, 0.01..3.0f64).prop_map(|(mean, spread)| Belief::new(mean, spread))
}

proptest! {
    #[test]
    fn test_probabilities_are_complementary(a in belief(), b in belief(), parity in 0.05..50.0f64) {
        let forward = win_probability(&a, &b, parity);
        let backward = win_probability(&b, &a, parity);
        prop_assert!((forward + backward - 1.0).abs() < 1e-12);
        prop_assert!((0.0..=1.0).contains(&forward));
    }

    #[test]
    fn test_self_comparison_is_even(a in belief(), parity in 0.0..50.0f64) {
        prop_assert!((win_probability(&a, &a, parity) - 0.5).abs() < 1e-15);
    }

    #[test]
    fn test_stronger_winner_is_more_likely(a in belief(), b in belief(), boost in 0.01..2.0f64, parity in 0.05..50.0f64) {
        let stronger = Belief::new(a.mean + boost, a.spread);
        prop_assert!(win_probability(&stronger, &b, parity) >= win_probability(&a, &b, parity));
    }

    #[test]
    fn test_huge_parity_is_a_coin_flip(a in belief(), b in belief()) {
        prop_assert!((win_probability(&a, &b, 1e6) - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_certain_beliefs_give_a_step(winner in -5.0..5.0f64, gap in 0.001..5.0f64) {
        let stronger = Belief::point(winner + gap);
        let weaker = Belief::point(winner);
        prop_assert_eq!(win_probability(&stronger, &weaker, 0.0), 1.0);
        prop_assert_eq!(win_probability(&weaker, &stronger, 0.0), 0.0);
    }

    #[test]
    fn test_quadrature_matches_closed_form(a in belief(), b in belief(), parity in 0.05..50.0f64) {
        let model = QuadratureModel::new(QuadratureOptions::default());
        let estimate = model.win_probability(&a, &b, parity);
        prop_assert!((estimate.value - win_probability(&a, &b, parity)).abs() < 1e-9);
    }
}
