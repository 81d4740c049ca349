//! Normal distribution helpers on top of `statrs`

use statrs::distribution::{Continuous, Normal};
use std::f64::consts::SQRT_2;

pub use statrs::function::erf::erfc;

/// Standard normal cumulative distribution function
///
/// Written through `erfc` so the lower tail keeps its relative accuracy.
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
}

/// Standard normal density
pub fn normal_pdf(x: f64) -> f64 {
    gaussian_pdf(x, 0.0, 1.0)
}

/// Log of the standard normal density; finite far beyond where the density
/// itself underflows
pub fn normal_ln_pdf(x: f64) -> f64 {
    match Normal::new(0.0, 1.0) {
        Ok(normal) => normal.ln_pdf(x),
        Err(_) => f64::NAN,
    }
}

/// Density of Normal(mean, sd²) at `x`. `sd` must be positive; NaN otherwise.
pub fn gaussian_pdf(x: f64, mean: f64, sd: f64) -> f64 {
    match Normal::new(mean, sd) {
        Ok(normal) => normal.pdf(x),
        Err(_) => f64::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_cdf() {
        assert_eq!(normal_cdf(0.0), 0.5);
        assert!((normal_cdf(1.959_963_984_540_054) - 0.975).abs() < 1e-14);
        assert!((normal_cdf(-1.0) - 0.158_655_253_931_457_05).abs() < 1e-15);
        // Deep lower tail stays relatively accurate
        let tail = normal_cdf(-10.0);
        assert!((tail - 7.619_853_024_160_527e-24).abs() < 1e-36);
        assert!(normal_cdf(-40.0) >= 0.0);
        assert_eq!(normal_cdf(40.0), 1.0);
    }

    #[test]
    fn test_densities() {
        let peak = 0.398_942_280_401_432_7;
        assert!((normal_pdf(0.0) - peak).abs() < 1e-15);
        assert!((gaussian_pdf(1.0, 1.0, 2.0) - peak / 2.0).abs() < 1e-15);
        assert!((normal_ln_pdf(0.0) - peak.ln()).abs() < 1e-14);
        assert!(normal_pdf(50.0) == 0.0 && normal_ln_pdf(50.0).is_finite());
        assert!(gaussian_pdf(0.0, 0.0, 0.0).is_nan());
    }
}
