/// Configuration module for semdex.
///
/// Handles loading, validating, and providing default configuration
/// values. Everything the pipeline tunes lives here; core logic takes
/// the loaded struct by reference and never reads the environment.
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ── Default value functions ──────────────────────────────────────────

fn default_root_path() -> String {
    "./documents".to_string()
}

fn default_allowed_extensions() -> Vec<String> {
    ["pdf", "doc", "docx", "ppt", "pptx", "xls", "xlsx", "txt", "md", "csv"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_chunk_size() -> usize {
    500
}

fn default_chunk_overlap() -> usize {
    100
}

fn default_min_section_size() -> usize {
    800
}

fn default_poll_interval_secs() -> u64 {
    300
}

fn default_file_timeout_secs() -> u64 {
    60
}

fn default_search_limit() -> usize {
    10
}

fn default_overfetch_factor() -> usize {
    4
}

fn default_threshold() -> f32 {
    0.3
}

fn default_recency_window_days() -> f64 {
    30.0
}

fn default_recency_weight() -> f64 {
    20.0
}

fn default_tag_bonus() -> f64 {
    10.0
}

fn default_dimensions() -> usize {
    384
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Directory tree to crawl.
    #[serde(default = "default_root_path")]
    pub root_path: String,

    /// When set, replaces `root_path` as the prefix of paths shown in
    /// search results (for containerized deployments where the
    /// indexed path differs from the path users know).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_path: Option<String>,

    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub indexer: IndexerConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub model: ModelConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Sections below this size are never fragmented by the header
    /// chunker.
    #[serde(default = "default_min_section_size")]
    pub min_section_size: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexerConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Budget for one file end to end (load, chunk, embed, upsert).
    #[serde(default = "default_file_timeout_secs")]
    pub file_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_search_limit")]
    pub limit: usize,

    /// The store is asked for `limit * overfetch_factor` candidates so
    /// dedup and rescoring have room to work.
    #[serde(default = "default_overfetch_factor")]
    pub overfetch_factor: usize,

    #[serde(default = "default_threshold")]
    pub threshold: f32,

    #[serde(default = "default_recency_window_days")]
    pub recency_window_days: f64,

    #[serde(default = "default_recency_weight")]
    pub recency_weight: f64,

    #[serde(default = "default_tag_bonus")]
    pub tag_bonus: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            root_path: default_root_path(),
            display_path: None,
            allowed_extensions: default_allowed_extensions(),
            chunking: ChunkingConfig::default(),
            indexer: IndexerConfig::default(),
            search: SearchConfig::default(),
            model: ModelConfig::default(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            min_section_size: default_min_section_size(),
        }
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            file_timeout_secs: default_file_timeout_secs(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: default_search_limit(),
            overfetch_factor: default_overfetch_factor(),
            threshold: default_threshold(),
            recency_window_days: default_recency_window_days(),
            recency_weight: default_recency_weight(),
            tag_bonus: default_tag_bonus(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dimensions: default_dimensions(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to `"config.json"`.
    /// If the file does not exist, returns a default config and
    /// generates a template at the default path.
    pub fn load(config_path: &str) -> anyhow::Result<Self> {
        use anyhow::Context;

        let path = if config_path.is_empty() {
            "config.json"
        } else {
            config_path
        };

        if !std::path::Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            if path == "config.json" {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        use anyhow::Context;

        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.chunking.chunk_size > 0, "chunk_size must be positive");
        anyhow::ensure!(
            self.chunking.chunk_overlap < self.chunking.chunk_size,
            "chunk_overlap ({}) must be smaller than chunk_size ({})",
            self.chunking.chunk_overlap,
            self.chunking.chunk_size
        );
        anyhow::ensure!(self.model.dimensions > 0, "model.dimensions must be positive");
        anyhow::ensure!(self.search.limit > 0, "search.limit must be positive");
        anyhow::ensure!(
            self.search.overfetch_factor > 0,
            "search.overfetch_factor must be positive"
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.search.threshold),
            "search.threshold must be in [0, 1]"
        );
        anyhow::ensure!(
            self.search.recency_window_days > 0.0,
            "search.recency_window_days must be positive"
        );
        anyhow::ensure!(
            self.indexer.poll_interval_secs > 0,
            "indexer.poll_interval_secs must be positive"
        );
        anyhow::ensure!(
            self.indexer.file_timeout_secs > 0,
            "indexer.file_timeout_secs must be positive"
        );
        anyhow::ensure!(
            !self.allowed_extensions.is_empty(),
            "at least one allowed extension must be specified"
        );
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────
