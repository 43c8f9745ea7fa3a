//! Configuration loading for brewid
//!
//! Resolution priority for the configuration file:
//! 1. Command-line argument (highest priority)
//! 2. `BREWID_CONFIG` environment variable
//! 3. `<config_dir>/brewid/brewid.toml`
//! 4. Compiled defaults (fallback)
//!
//! A missing file never prevents startup: a warning is logged and compiled
//! defaults are used. A file that exists but does not parse is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "BREWID_CONFIG";

/// Default keyword dictionary: well-known brand terms that identify a
/// brewery or beer line on their own. Generic words ("birra", "birrificio",
/// "brewing") are deliberately absent, they would make every label overlap.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "peroni",
    "moretti",
    "menabrea",
    "ichnusa",
    "dreher",
    "forst",
    "pedavena",
    "poretti",
    "baladin",
    "lambrate",
    "heineken",
    "guinness",
    "tennents",
    "leffe",
    "chimay",
    "paulaner",
    "erdinger",
    "weihenstephaner",
    "chouffe",
    "duvel",
];

/// Complete resolver configuration
///
/// Every field has a default so a partial TOML file is always valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Upper bound on candidates kept per entity (must be at least 2)
    pub max_candidates: usize,
    /// Keyword dictionary used by the overlap heuristic
    pub keywords: Vec<String>,
    /// Optional external keyword list, one keyword per line
    pub keyword_file: Option<PathBuf>,
    /// Matching and classification thresholds
    pub thresholds: Thresholds,
    /// Session lifetime and cleanup policy
    pub session: SessionPolicy,
    /// HTTP service settings
    pub server: ServerConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

/// Similarity thresholds, all in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Below this (and without keyword overlap) a record is unrelated
    pub candidate_floor: f64,
    /// Two candidates above this make an entity ambiguous
    pub ambiguity: f64,
    /// A lone candidate above this is accepted without confirmation
    pub auto_match: f64,
    /// Token-to-token similarity needed for a fuzzy token overlap
    pub token_similarity: f64,
    /// Minimum token length (in chars) considered for fuzzy token overlap
    pub min_token_len: usize,
}

/// Session lifetime and cleanup policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPolicy {
    /// Seconds after creation when an unfinished session becomes sweepable
    pub ttl_seconds: u64,
    /// Seconds after creation when any unfinished session is released, even
    /// one still awaiting a human choice
    pub max_age_seconds: u64,
    /// Cleanup reasons allowed to discard sessions awaiting a human choice
    pub cleanup_allow_list: Vec<String>,
}

/// HTTP service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to bind
    pub bind: String,
    /// Optional JSON catalog snapshot loaded at startup
    pub catalog_path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive ("info", "brewid_resolver=debug", ...)
    pub level: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_candidates: 10,
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            keyword_file: None,
            thresholds: Thresholds::default(),
            session: SessionPolicy::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            candidate_floor: 0.6,
            ambiguity: 0.7,
            auto_match: 0.85,
            token_similarity: 0.8,
            min_token_len: 4,
        }
    }
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            ttl_seconds: 3600,
            max_age_seconds: 7 * 24 * 3600,
            cleanup_allow_list: vec![
                "logout".to_string(),
                "role_change".to_string(),
                "manual_admin".to_string(),
            ],
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5740".to_string(),
            catalog_path: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ResolverConfig {
    /// Parse and validate configuration from TOML text
    ///
    /// `keyword_file` is not read here; see [`ResolverConfig::load`].
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ResolverConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    ///
    /// A relative `keyword_file` is resolved against the config file's
    /// directory, and its entries are merged into `keywords`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        let mut config = Self::from_toml_str(&content)?;

        if let Some(keyword_file) = config.keyword_file.clone() {
            let keyword_path = if keyword_file.is_relative() {
                path.parent()
                    .map(|dir| dir.join(&keyword_file))
                    .unwrap_or(keyword_file)
            } else {
                keyword_file
            };
            let extra = load_keyword_file(&keyword_path)?;
            info!(
                path = %keyword_path.display(),
                count = extra.len(),
                "Loaded keyword dictionary file"
            );
            config.merge_keywords(extra);
        }

        Ok(config)
    }

    /// Add keywords, lower-cased, skipping duplicates
    pub fn merge_keywords(&mut self, extra: impl IntoIterator<Item = String>) {
        for keyword in extra {
            let keyword = keyword.trim().to_lowercase();
            if !keyword.is_empty() && !self.keywords.contains(&keyword) {
                self.keywords.push(keyword);
            }
        }
    }

    /// Check value ranges and threshold ordering
    pub fn validate(&self) -> Result<()> {
        let t = &self.thresholds;
        for (name, value) in [
            ("candidate_floor", t.candidate_floor),
            ("ambiguity", t.ambiguity),
            ("auto_match", t.auto_match),
            ("token_similarity", t.token_similarity),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!(
                    "threshold {} out of range [0, 1]: {}",
                    name, value
                )));
            }
        }

        if t.candidate_floor > t.ambiguity || t.ambiguity > t.auto_match {
            return Err(Error::Config(format!(
                "thresholds must satisfy candidate_floor <= ambiguity <= auto_match (got {} / {} / {})",
                t.candidate_floor, t.ambiguity, t.auto_match
            )));
        }

        if t.min_token_len == 0 {
            return Err(Error::Config("min_token_len must be at least 1".to_string()));
        }

        if self.max_candidates < 2 {
            return Err(Error::Config(format!(
                "max_candidates must be at least 2 (got {})",
                self.max_candidates
            )));
        }

        if self.session.ttl_seconds == 0 {
            return Err(Error::Config("session.ttl_seconds must be positive".to_string()));
        }

        if self.session.max_age_seconds < self.session.ttl_seconds {
            return Err(Error::Config(format!(
                "session.max_age_seconds must be at least ttl_seconds (got {} < {})",
                self.session.max_age_seconds, self.session.ttl_seconds
            )));
        }

        Ok(())
    }
}

/// Read a keyword list: one keyword per line, blank lines and `#` comments ignored
pub fn load_keyword_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_lowercase)
        .collect())
}

/// Default configuration file location for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("brewid").join("brewid.toml"))
}

/// Pick the configuration file following the priority order
///
/// Returns `None` when no tier names a file.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path()
}

/// Resolve and load configuration, falling back to compiled defaults
pub fn load_config(cli_arg: Option<&Path>) -> Result<ResolverConfig> {
    match resolve_config_path(cli_arg) {
        Some(path) if path.exists() => {
            info!(path = %path.display(), "Loading configuration");
            ResolverConfig::load(&path)
        }
        Some(path) => {
            warn!(
                path = %path.display(),
                "Config file not found, using compiled defaults"
            );
            Ok(ResolverConfig::default())
        }
        None => {
            warn!("No config location available, using compiled defaults");
            Ok(ResolverConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ResolverConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.thresholds.candidate_floor, 0.6);
        assert_eq!(config.thresholds.ambiguity, 0.7);
        assert_eq!(config.thresholds.auto_match, 0.85);
        assert_eq!(config.session.cleanup_allow_list.len(), 3);
        assert!(config.session.max_age_seconds > config.session.ttl_seconds);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ResolverConfig::from_toml_str(
            r#"
            max_candidates = 5

            [thresholds]
            auto_match = 0.9
            "#,
        )
        .unwrap();

        assert_eq!(config.max_candidates, 5);
        assert_eq!(config.thresholds.auto_match, 0.9);
        assert_eq!(config.thresholds.ambiguity, 0.7);
        assert_eq!(config.logging.level, "info");
        assert!(config.keywords.contains(&"peroni".to_string()));
    }

    #[test]
    fn misordered_thresholds_rejected() {
        let result = ResolverConfig::from_toml_str(
            r#"
            [thresholds]
            ambiguity = 0.9
            auto_match = 0.8
            "#,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        let result = ResolverConfig::from_toml_str("[thresholds]\ntoken_similarity = 1.5\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn max_age_below_ttl_rejected() {
        let result = ResolverConfig::from_toml_str(
            "[session]\nttl_seconds = 600\nmax_age_seconds = 60\n",
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn single_candidate_cap_rejected() {
        let result = ResolverConfig::from_toml_str("max_candidates = 1\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn merge_keywords_dedupes_and_lowercases() {
        let mut config = ResolverConfig {
            keywords: vec!["peroni".to_string()],
            ..Default::default()
        };
        config.merge_keywords(vec!["PERONI".to_string(), " Viana ".to_string(), "".to_string()]);
        assert_eq!(config.keywords, vec!["peroni", "viana"]);
    }
}
