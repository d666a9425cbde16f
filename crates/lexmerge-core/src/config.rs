use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LexiconError, Result};
use crate::suggest::{DEFAULT_GENERAL_THRESHOLD, DEFAULT_MAX_COUNT, DEFAULT_THRESHOLD};

/// Root configuration, loaded from `~/.config/lexmerge/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LexiconConfig {
    pub core: CoreConfig,
    pub suggest: SuggestConfig,
    pub dedup: DedupConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub data_path: String,
    /// Language new glosses are written in.
    pub analysis_language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestConfig {
    pub max_count: usize,
    pub threshold: usize,
    pub general_threshold: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub max_in_list: usize,
    pub max_lists: usize,
    /// Largest vernacular edit distance still considered a duplicate.
    pub max_score: usize,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for CoreConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("lexmerge");

        Self {
            data_path: data_dir.to_string_lossy().to_string(),
            analysis_language: "en".to_string(),
        }
    }
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            max_count: DEFAULT_MAX_COUNT,
            threshold: DEFAULT_THRESHOLD,
            general_threshold: DEFAULT_GENERAL_THRESHOLD,
        }
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            max_in_list: 5,
            max_lists: 12,
            max_score: 2,
        }
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl LexiconConfig {
    /// Standard config file path: `~/.config/lexmerge/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("LEXMERGE_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("lexmerge")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.dedup.max_in_list < 2 {
            return Err(LexiconError::ConfigError(
                "dedup.max_in_list must be at least 2".to_string(),
            ));
        }
        if self.core.analysis_language.trim().is_empty() {
            return Err(LexiconError::ConfigError(
                "core.analysis_language must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn set_data_path(&mut self, path: PathBuf) {
        self.core.data_path = path.to_string_lossy().to_string();
    }

    // ─── Derived paths ─────────────────────────────────────

    /// Path to the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.core.data_path).join("lexmerge.db")
    }
}
