//! Configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `policydb.toml` +
//! `policydb.<env>.toml` + `APP_*` env vars (`__` separates nested keys, e.g.
//! `APP_RETRIEVAL__DENSE_WEIGHT=0.6`). Every section is validated at load time
//! so inconsistent weights or bounds are rejected before the first query.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

const WEIGHT_TOLERANCE: f32 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub dense_weight: f32,
    pub sparse_weight: f32,
    pub similarity_threshold: f32,
    pub max_results: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { dense_weight: 0.7, sparse_weight: 0.3, similarity_threshold: 0.6, max_results: 10 }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<()> {
        check_weight_pair("dense_weight", self.dense_weight, "sparse_weight", self.sparse_weight)?;
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(Error::InvalidConfig(format!(
                "similarity_threshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.max_results == 0 {
            return Err(Error::InvalidConfig("max_results must be at least 1".into()));
        }
        Ok(())
    }
}

/// Character bounds used when splitting plain text into chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_chunk_chars: usize,
    pub min_chunk_chars: usize,
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_chunk_chars: 512, min_chunk_chars: 50, overlap_chars: 50 }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_chars == 0 || self.min_chunk_chars > self.max_chunk_chars {
            return Err(Error::InvalidConfig(format!(
                "chunk bounds must satisfy 0 < min ({}) <= max ({})",
                self.min_chunk_chars, self.max_chunk_chars
            )));
        }
        if self.overlap_chars >= self.max_chunk_chars {
            return Err(Error::InvalidConfig(format!(
                "overlap_chars ({}) must be smaller than max_chunk_chars ({})",
                self.overlap_chars, self.max_chunk_chars
            )));
        }
        Ok(())
    }
}

/// Vocabularies used by the entity extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub procedures: Vec<String>,
    pub locations: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        let procedures = [
            "knee surgery", "knee replacement", "hip surgery", "hip replacement", "cardiac surgery",
            "heart surgery", "bypass surgery", "angioplasty", "eye surgery", "cataract surgery",
            "dental treatment", "root canal", "general surgery", "orthopedic surgery", "spine surgery",
            "cosmetic surgery", "plastic surgery", "bariatric surgery", "organ transplant",
            "kidney transplant", "appendectomy", "chemotherapy", "dialysis", "maternity",
            "physiotherapy", "surgery",
        ];
        let locations = [
            "pune", "mumbai", "delhi", "new delhi", "bangalore", "bengaluru", "chennai", "hyderabad",
            "kolkata", "ahmedabad", "jaipur", "lucknow", "india",
        ];
        Self {
            procedures: procedures.iter().map(|s| (*s).to_string()).collect(),
            locations: locations.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl ExtractionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.procedures.iter().chain(&self.locations).any(|s| s.trim().is_empty()) {
            return Err(Error::InvalidConfig("extraction vocabularies must not contain empty entries".into()));
        }
        Ok(())
    }
}

/// Policy bounds feeding the default rule set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyBounds {
    pub min_age: u32,
    pub max_age: u32,
    pub waiting_period_days: u32,
    pub max_claim_amount: f64,
    /// Never covered. An entry also matches any procedure that contains it
    /// as a whole phrase ("elective" matches "elective surgery").
    pub excluded_procedures: Vec<String>,
    pub pre_authorization: Vec<String>,
}

impl Default for PolicyBounds {
    fn default() -> Self {
        Self {
            min_age: 18,
            max_age: 80,
            waiting_period_days: 90,
            max_claim_amount: 500_000.0,
            excluded_procedures: ["cosmetic", "plastic surgery", "experimental", "elective"].map(String::from).to_vec(),
            pre_authorization: ["organ transplant", "kidney transplant", "cardiac surgery", "heart surgery", "bypass surgery"]
                .map(String::from)
                .to_vec(),
        }
    }
}

impl PolicyBounds {
    pub fn validate(&self) -> Result<()> {
        if self.min_age > self.max_age {
            return Err(Error::InvalidConfig(format!("min_age {} exceeds max_age {}", self.min_age, self.max_age)));
        }
        if !(self.max_claim_amount.is_finite() && self.max_claim_amount > 0.0) {
            return Err(Error::InvalidConfig(format!("max_claim_amount must be positive, got {}", self.max_claim_amount)));
        }
        if self.excluded_procedures.iter().chain(&self.pre_authorization).any(|s| s.trim().is_empty()) {
            return Err(Error::InvalidConfig("procedure lists in bounds must not contain empty entries".into()));
        }
        Ok(())
    }
}

/// Weights of the two confidence components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    pub retrieval_weight: f32,
    pub rule_weight: f32,
    /// Longest clause excerpt quoted in a justification, in characters.
    pub excerpt_chars: usize,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self { retrieval_weight: 0.5, rule_weight: 0.5, excerpt_chars: 200 }
    }
}

impl DecisionConfig {
    pub fn validate(&self) -> Result<()> {
        check_weight_pair("retrieval_weight", self.retrieval_weight, "rule_weight", self.rule_weight)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub embed_timeout_ms: u64,
    pub rule_timeout_ms: u64,
    pub retry_backoff_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { embed_timeout_ms: 2_000, rule_timeout_ms: 500, retry_backoff_ms: 100 }
    }
}

impl PipelineConfig {
    pub fn embed_timeout(&self) -> Duration { Duration::from_millis(self.embed_timeout_ms) }
    pub fn rule_timeout(&self) -> Duration { Duration::from_millis(self.rule_timeout_ms) }
    pub fn retry_backoff(&self) -> Duration { Duration::from_millis(self.retry_backoff_ms) }

    pub fn validate(&self) -> Result<()> {
        if self.embed_timeout_ms == 0 || self.rule_timeout_ms == 0 {
            return Err(Error::InvalidConfig("pipeline timeouts must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    /// Feature-hashing embedder; deterministic and model-free.
    Hashing,
    /// Local transformer model loaded from `model_dir`.
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    pub model_dir: Option<String>,
    pub dim: usize,
    pub max_len: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { backend: EmbeddingBackend::Hashing, model_dir: None, dim: 384, max_len: 256 }
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dim == 0 || self.max_len == 0 {
            return Err(Error::InvalidConfig("embedding dim and max_len must be positive".into()));
        }
        if self.backend == EmbeddingBackend::Model && self.model_dir.is_none() {
            return Err(Error::InvalidConfig("embedding.model_dir is required for the model backend".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// TOML or JSON rule file. The default rule set is derived from
    /// `bounds` when unset.
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub corpus_dir: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self { corpus_dir: "./policies".to_string() }
    }
}

/// Every recognized option, with defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub retrieval: RetrievalConfig,
    pub chunking: ChunkingConfig,
    pub extraction: ExtractionConfig,
    pub bounds: PolicyBounds,
    pub decision: DecisionConfig,
    pub pipeline: PipelineConfig,
    pub embedding: EmbeddingConfig,
    pub rules: RulesConfig,
    pub data: DataConfig,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.retrieval.validate()?;
        self.chunking.validate()?;
        self.extraction.validate()?;
        self.bounds.validate()?;
        self.decision.validate()?;
        self.pipeline.validate()?;
        self.embedding.validate()
    }
}

pub struct Config {
    figment: Figment,
    settings: Settings,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(&env_name)
    }

    pub fn load_for_env(env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("policydb.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("policydb.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("policydb.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("policydb.test.toml")),
            other => tracing::warn!(env = other, "unknown RUST_ENV; using base configuration only"),
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));
        Self::from_figment(figment)
    }

    /// Extracts and validates settings from an already assembled figment.
    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let settings: Settings = figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))?;
        settings.validate()?;
        tracing::debug!(?settings, "configuration loaded");
        Ok(Self { figment, settings })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }
}

fn check_weight_pair(dense_name: &'static str, dense: f32, sparse_name: &'static str, sparse: f32) -> Result<()> {
    let valid = dense.is_finite() && sparse.is_finite() && dense >= 0.0 && sparse >= 0.0;
    if !valid || (dense + sparse - 1.0).abs() > WEIGHT_TOLERANCE {
        return Err(Error::InconsistentWeights { dense_name, dense, sparse_name, sparse });
    }
    Ok(())
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
