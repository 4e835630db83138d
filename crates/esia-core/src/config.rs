//! Engine configuration
//!
//! Loaded from TOML with every section optional; environment variables
//! override file values:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `ESIA_MAX_DEPTH` | `analysis.max_depth` |
//! | `ESIA_STRICT_INTEGRITY` | `analysis.strict_integrity` |
//! | `ESIA_TIMEOUT_MS` | `analysis.timeout_ms` |
//! | `ESIA_BROAD_BLAST_RADIUS` | `risk.broad_blast_radius` |

use crate::error::{EngineError, Result};
use esia_impact::{AnalysisOptions, CancelToken, IntegrityMode, DEFAULT_MAX_DEPTH};
use esia_risk::RiskThresholds;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable for `analysis.max_depth`
pub const ENV_MAX_DEPTH: &str = "ESIA_MAX_DEPTH";
/// Environment variable for `analysis.strict_integrity`
pub const ENV_STRICT_INTEGRITY: &str = "ESIA_STRICT_INTEGRITY";
/// Environment variable for `analysis.timeout_ms`
pub const ENV_TIMEOUT_MS: &str = "ESIA_TIMEOUT_MS";
/// Environment variable for `risk.broad_blast_radius`
pub const ENV_BROAD_BLAST_RADIUS: &str = "ESIA_BROAD_BLAST_RADIUS";

/// Traversal settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Maximum hops from the seed
    pub max_depth: usize,
    /// Fail on dangling edges instead of reporting them
    pub strict_integrity: bool,
    /// Per-analysis time limit in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            strict_integrity: true,
            timeout_ms: None,
        }
    }
}

impl AnalysisConfig {
    /// Set hop bound
    #[inline]
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set integrity handling
    #[inline]
    #[must_use]
    pub fn with_strict_integrity(mut self, strict: bool) -> Self {
        self.strict_integrity = strict;
        self
    }

    /// Set time limit
    #[inline]
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Analysis options for one call
    ///
    /// The configured timeout is applied only when `cancel` carries no
    /// deadline of its own.
    #[must_use]
    pub fn options(&self, cancel: CancelToken) -> AnalysisOptions {
        let cancel = match self.timeout_ms {
            Some(ms) if cancel.deadline().is_none() => {
                cancel.with_timeout(Duration::from_millis(ms))
            }
            _ => cancel,
        };
        let integrity = if self.strict_integrity {
            IntegrityMode::Strict
        } else {
            IntegrityMode::Permissive
        };
        AnalysisOptions::new()
            .with_max_depth(self.max_depth)
            .with_integrity(integrity)
            .with_cancel(cancel)
    }
}

/// Engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Traversal settings
    pub analysis: AnalysisConfig,
    /// Escalation thresholds
    pub risk: RiskThresholds,
}

impl EngineConfig {
    /// Set traversal settings
    #[inline]
    #[must_use]
    pub fn with_analysis(mut self, analysis: AnalysisConfig) -> Self {
        self.analysis = analysis;
        self
    }

    /// Set escalation thresholds
    #[inline]
    #[must_use]
    pub fn with_risk(mut self, risk: RiskThresholds) -> Self {
        self.risk = risk;
        self
    }

    /// Parse TOML without environment overrides
    ///
    /// # Errors
    /// [`EngineError::Config`] for malformed TOML or invalid values.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| EngineError::config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file, then apply environment overrides
    ///
    /// # Errors
    /// [`EngineError::Config`] if the file cannot be read or parsed, or an
    /// override or the result is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        let mut config: EngineConfig = toml::from_str(&content).map_err(|e| {
            EngineError::config(format!("failed to parse {}: {e}", path.display()))
        })?;
        config.apply_env_overrides()?;
        config.validate()?;
        tracing::debug!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Defaults with environment overrides
    ///
    /// # Errors
    /// [`EngineError::Config`] if an override is invalid.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment
    ///
    /// # Errors
    /// [`EngineError::Config`] if a variable does not parse.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`, keyed by variable name
    ///
    /// # Errors
    /// [`EngineError::Config`] if a value does not parse.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_MAX_DEPTH) {
            self.analysis.max_depth = parse_var(ENV_MAX_DEPTH, &value)?;
        }
        if let Some(value) = lookup(ENV_STRICT_INTEGRITY) {
            self.analysis.strict_integrity = parse_flag(ENV_STRICT_INTEGRITY, &value)?;
        }
        if let Some(value) = lookup(ENV_TIMEOUT_MS) {
            self.analysis.timeout_ms = Some(parse_var(ENV_TIMEOUT_MS, &value)?);
        }
        if let Some(value) = lookup(ENV_BROAD_BLAST_RADIUS) {
            self.risk.broad_blast_radius = parse_var(ENV_BROAD_BLAST_RADIUS, &value)?;
        }
        Ok(())
    }

    /// Reject settings the engine cannot run with
    ///
    /// # Errors
    /// [`EngineError::Config`] for a zero depth or zero blast radius.
    pub fn validate(&self) -> Result<()> {
        if self.analysis.max_depth == 0 {
            return Err(EngineError::config("analysis.max_depth must be at least 1"));
        }
        if self.risk.broad_blast_radius == 0 {
            return Err(EngineError::config(
                "risk.broad_blast_radius must be at least 1",
            ));
        }
        Ok(())
    }

    /// Render as TOML
    ///
    /// # Errors
    /// [`EngineError::Config`] if the config cannot be serialized.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| EngineError::config(format!("failed to render config: {e}")))
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| EngineError::config(format!("{name}: invalid value '{value}'")))
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(EngineError::config(format!(
            "{name}: invalid value '{value}'"
        ))),
    }
}
