use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::judgment::JudgmentConfig;
use crate::pipeline::retry::MAX_CORRECTIONS;

/// Application-level constants
pub const APP_NAME: &str = "Ledgerscan";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prefix of every environment variable read by `PipelineConfig::from_env`.
pub const ENV_PREFIX: &str = "LEDGERSCAN_";

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "info,ledgerscan=debug"
    } else {
        "warn,ledgerscan=info"
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },

    #[error("Invalid configuration override: {0}")]
    Override(String),
}

// ═══════════════════════════════════════════
// Sections
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceSettings {
    pub base_url: String,
    pub classification_model: String,
    pub extraction_model: String,
    pub timeout_secs: u64,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            classification_model: "qwen2.5vl:7b".into(),
            extraction_model: "qwen2.5vl:7b".into(),
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Clamped to `MAX_CORRECTIONS` by the retry controller.
    pub max_retries: u32,
    /// Fold failing-check hints into the retry prompt.
    pub inject_hints: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: MAX_CORRECTIONS,
            inject_hints: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExampleSettings {
    pub enabled: bool,
    /// Minimum decision confidence for an auto-approved payload to be kept
    /// as a vendor example.
    pub index_min_confidence: f32,
}

impl Default for ExampleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            index_min_confidence: 0.9,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusSettings {
    /// Second extraction model. Consensus runs only when set.
    pub expert_model: Option<String>,
}

/// Full pipeline configuration. Immutable once handed to a processor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub inference: InferenceSettings,
    pub judgment: JudgmentConfig,
    pub retry: RetrySettings,
    pub examples: ExampleSettings,
    pub consensus: ConsensusSettings,
}

impl PipelineConfig {
    /// Defaults overlaid with `LEDGERSCAN_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with variables resolved by `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();

        if let Some(v) = var("OLLAMA_URL") {
            config.inference.base_url = v;
        }
        if let Some(v) = var("CLASSIFICATION_MODEL") {
            config.inference.classification_model = v;
        }
        if let Some(v) = var("EXTRACTION_MODEL") {
            config.inference.extraction_model = v;
        }
        if let Some(v) = var("EXPERT_MODEL") {
            config.consensus.expert_model = Some(v);
        }
        if let Some(v) = var("TIMEOUT_SECS") {
            config.inference.timeout_secs = parse_var("TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = var("MAX_RETRIES") {
            config.retry.max_retries = parse_var("MAX_RETRIES", &v)?;
        }
        if let Some(v) = var("NEEDS_REVIEW_MIN_CONFIDENCE") {
            config.judgment.needs_review_min_confidence =
                parse_confidence("NEEDS_REVIEW_MIN_CONFIDENCE", &v)?;
        }
        if let Some(v) = var("AUTO_APPROVE_MIN_CONFIDENCE") {
            config.judgment.auto_approve_min_confidence =
                parse_confidence("AUTO_APPROVE_MIN_CONFIDENCE", &v)?;
        }
        if let Some(v) = var("MAX_WARNINGS_FOR_AUTO_APPROVE") {
            config.judgment.max_warnings_for_auto_approve =
                parse_var("MAX_WARNINGS_FOR_AUTO_APPROVE", &v)?;
        }

        Ok(config)
    }

    /// Merge a (per-tenant) JSON object over this configuration. Keys not
    /// present in `overrides` keep their current value. Thresholds are
    /// range-checked after the merge, as `from_env` does.
    pub fn with_overrides(&self, overrides: &serde_json::Value) -> Result<Self, ConfigError> {
        if !overrides.is_object() {
            return Err(ConfigError::Override("expected a JSON object".into()));
        }
        let mut base =
            serde_json::to_value(self).map_err(|e| ConfigError::Override(e.to_string()))?;
        merge(&mut base, overrides);
        let merged: Self =
            serde_json::from_value(base).map_err(|e| ConfigError::Override(e.to_string()))?;
        merged.validate()?;
        Ok(merged)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let thresholds = [
            (
                "judgment.needs_review_min_confidence",
                self.judgment.needs_review_min_confidence,
            ),
            (
                "judgment.auto_approve_min_confidence",
                self.judgment.auto_approve_min_confidence,
            ),
            (
                "examples.index_min_confidence",
                self.examples.index_min_confidence,
            ),
        ];
        for (key, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn merge(base: &mut serde_json::Value, overlay: &serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base), serde_json::Value::Object(overlay)) => {
            for (key, value) in overlay {
                merge(base.entry(key.clone()).or_insert(serde_json::Value::Null), value);
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: format!("{ENV_PREFIX}{key}"),
        value: value.to_string(),
    })
}

fn parse_confidence(key: &str, value: &str) -> Result<f32, ConfigError> {
    let parsed: f32 = parse_var(key, value)?;
    if !(0.0..=1.0).contains(&parsed) {
        return Err(ConfigError::InvalidValue {
            key: format!("{ENV_PREFIX}{key}"),
            value: value.to_string(),
        });
    }
    Ok(parsed)
}
