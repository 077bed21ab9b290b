use crate::cache::Cache;
use crate::repo::{FilterOptions, SortField};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Initial sort field
    #[serde(default = "default_sort_by")]
    pub sort_by: SortField,

    /// Sort descending by default
    #[serde(default = "default_true")]
    pub sort_descending: bool,

    /// Show archived repos
    #[serde(default)]
    pub show_archived: bool,

    /// Show private repos
    #[serde(default = "default_true")]
    pub show_private: bool,

    /// Show public repos
    #[serde(default = "default_true")]
    pub show_public: bool,

    /// Show forks
    #[serde(default = "default_true")]
    pub show_forks: bool,

    /// Only show repos with this primary language
    #[serde(default)]
    pub language: Option<String>,

    #[serde(default)]
    pub min_stars: Option<u32>,

    #[serde(default)]
    pub max_stars: Option<u32>,

    /// Inactivity filter in days, 0 disables it
    #[serde(default)]
    pub inactive_for_days: u32,

    /// Where the per-account repo cache lives (`~` is expanded)
    #[serde(default)]
    pub cache_dir: Option<String>,

    /// Log filter directive, e.g. "info" or "gh_repo_review=debug"
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_sort_by() -> SortField {
    SortField::Updated
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sort_by: default_sort_by(),
            sort_descending: true,
            show_archived: false,
            show_private: true,
            show_public: true,
            show_forks: true,
            language: None,
            min_stars: None,
            max_stars: None,
            inactive_for_days: 0,
            cache_dir: None,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gh-repo-review")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load config from `path`, falling back to defaults when it doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)
                .with_context(|| format!("parsing config {}", path.display())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(e).with_context(|| format!("reading config {}", path.display())),
        }
    }

    /// Filter options the list starts with, and resets to
    pub fn filter_options(&self) -> FilterOptions {
        FilterOptions {
            show_archived: self.show_archived,
            show_private: self.show_private,
            show_public: self.show_public,
            show_forks: self.show_forks,
            language: self.language.clone(),
            min_stars: self.min_stars,
            max_stars: self.max_stars,
            inactive_for_days: self.inactive_for_days,
            search_query: String::new(),
            sort_by: self.sort_by,
            sort_desc: self.sort_descending,
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        match self.cache_dir {
            Some(ref dir) => PathBuf::from(shellexpand::tilde(dir).to_string()),
            None => Cache::default_dir(),
        }
    }

    pub fn log_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gh-repo-review")
            .join("gh-repo-review.log")
    }
}
