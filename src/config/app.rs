//! Main application configuration
//!
//! This module defines the configuration structures for the rating tool,
//! including environment variable and TOML loading and validation.

use crate::numeric::QuadratureOptions;
use crate::rating::{
    EngineConfig, ParityBracket, ParitySearch, ProbabilityStrategy, DEFAULT_CACHE_FILE,
};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub engine: EngineSettings,
    pub quadrature: QuadratureSettings,
}

/// Service-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// JSON file holding finished runs
    pub cache_path: String,
    pub cache_enabled: bool,
}

/// Convergence loop and parity search settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub convergence: f64,
    pub initial_parity: f64,
    pub parity_lower: f64,
    pub parity_upper: f64,
    pub max_iterations: usize,
    /// Evaluation budget of one parity search
    pub parity_max_iterations: usize,
    pub parity_tolerance: f64,
    pub strategy: ProbabilityStrategy,
    /// Use the rayon pool for per-competitor and per-game work
    pub parallel: bool,
}

/// Adaptive quadrature settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadratureSettings {
    pub abs_tolerance: f64,
    pub rel_tolerance: f64,
    pub subdivision_limit: usize,
    /// The misfit integrals decay slowly and get a larger budget
    pub parity_subdivision_limit: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            cache_path: DEFAULT_CACHE_FILE.to_string(),
            cache_enabled: true,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            convergence: 1e-3,
            initial_parity: 1.0,
            parity_lower: 0.05,
            parity_upper: 50.0,
            max_iterations: 200,
            parity_max_iterations: 500,
            parity_tolerance: 1e-5,
            strategy: ProbabilityStrategy::ClosedForm,
            parallel: true,
        }
    }
}

impl Default for QuadratureSettings {
    fn default() -> Self {
        Self {
            abs_tolerance: 1e-10,
            rel_tolerance: 1e-10,
            subdivision_limit: 200,
            parity_subdivision_limit: 1000,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("Invalid {} value: {}", name, value)),
        Err(_) => Ok(None),
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file; environment variables still win
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(log_level) = env::var("PARITY_LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(path) = env::var("PARITY_CACHE_PATH") {
            self.service.cache_path = path;
        }
        if let Some(enabled) = parse_var("PARITY_CACHE_ENABLED")? {
            self.service.cache_enabled = enabled;
        }

        // Engine settings
        if let Some(convergence) = parse_var("PARITY_CONVERGENCE")? {
            self.engine.convergence = convergence;
        }
        if let Some(parity) = parse_var("PARITY_INITIAL_PARITY")? {
            self.engine.initial_parity = parity;
        }
        if let Some(lower) = parse_var("PARITY_LOWER")? {
            self.engine.parity_lower = lower;
        }
        if let Some(upper) = parse_var("PARITY_UPPER")? {
            self.engine.parity_upper = upper;
        }
        if let Some(max_iterations) = parse_var("PARITY_MAX_ITERATIONS")? {
            self.engine.max_iterations = max_iterations;
        }
        if let Some(max_iterations) = parse_var("PARITY_SEARCH_MAX_ITERATIONS")? {
            self.engine.parity_max_iterations = max_iterations;
        }
        if let Some(tolerance) = parse_var("PARITY_SEARCH_TOLERANCE")? {
            self.engine.parity_tolerance = tolerance;
        }
        if let Some(strategy) = parse_var("PARITY_STRATEGY")? {
            self.engine.strategy = strategy;
        }
        if let Some(parallel) = parse_var("PARITY_PARALLEL")? {
            self.engine.parallel = parallel;
        }

        // Quadrature settings
        if let Some(tolerance) = parse_var("PARITY_QUAD_ABS_TOLERANCE")? {
            self.quadrature.abs_tolerance = tolerance;
        }
        if let Some(tolerance) = parse_var("PARITY_QUAD_REL_TOLERANCE")? {
            self.quadrature.rel_tolerance = tolerance;
        }
        if let Some(limit) = parse_var("PARITY_QUAD_SUBDIVISION_LIMIT")? {
            self.quadrature.subdivision_limit = limit;
        }
        if let Some(limit) = parse_var("PARITY_QUAD_PARITY_SUBDIVISION_LIMIT")? {
            self.quadrature.parity_subdivision_limit = limit;
        }

        Ok(())
    }

    /// Settings in the form the engine consumes
    pub fn engine_config(&self) -> EngineConfig {
        let quadrature = QuadratureOptions {
            abs_tolerance: self.quadrature.abs_tolerance,
            rel_tolerance: self.quadrature.rel_tolerance,
            subdivision_limit: self.quadrature.subdivision_limit,
        };
        EngineConfig {
            convergence: self.engine.convergence,
            initial_parity: self.engine.initial_parity,
            max_iterations: self.engine.max_iterations,
            search: ParitySearch {
                bracket: ParityBracket::new(self.engine.parity_lower, self.engine.parity_upper),
                x_tolerance: self.engine.parity_tolerance,
                max_evaluations: self.engine.parity_max_iterations,
            },
            strategy: self.engine.strategy,
            quadrature,
            parity_quadrature: quadrature
                .with_subdivision_limit(self.quadrature.parity_subdivision_limit),
            parallel: self.engine.parallel,
        }
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.cache_enabled && config.service.cache_path.is_empty() {
        return Err(anyhow!("Cache path cannot be empty when the cache is enabled"));
    }

    // Validate quadrature settings
    if !(config.quadrature.abs_tolerance > 0.0) || !(config.quadrature.rel_tolerance > 0.0) {
        return Err(anyhow!("Quadrature tolerances must be positive"));
    }

    // The engine enforces the rest of its own invariants
    config.engine_config().validate()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());

        let engine = config.engine_config();
        assert_eq!(engine.convergence, 1e-3);
        assert_eq!(engine.search.bracket, ParityBracket::new(0.05, 50.0));
        assert_eq!(engine.parity_quadrature.subdivision_limit, 1000);
        assert_eq!(engine.quadrature.subdivision_limit, 200);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = AppConfig::default();
        config.service.log_level = "loud".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.engine.parity_lower = 60.0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.engine.convergence = -1.0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.quadrature.rel_tolerance = 0.0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [engine]
            convergence = 1e-4
            strategy = "quadrature"

            [service]
            cache_enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.convergence, 1e-4);
        assert_eq!(config.engine.strategy, ProbabilityStrategy::Quadrature);
        assert_eq!(config.engine.initial_parity, 1.0);
        assert!(!config.service.cache_enabled);
        assert_eq!(config.service.log_level, "info");
        assert!(validate_config(&config).is_ok());
    }
}
