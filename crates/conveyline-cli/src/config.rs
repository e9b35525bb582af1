//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use conveyline_core::{HttpConfig, SelectionPredicate};
use conveyline_enrich::OcrConfig;
use conveyline_fetch::{AnnotationMode, QuerySpec};
use serde::Deserialize;

/// Global configuration for conveyline
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    /// Empty means the built-in 2024 queries
    pub queries: Vec<QueryConfig>,
    pub http: HttpSection,
    pub ocr: OcrSection,
    pub fetch: FetchSection,
    pub filter: FilterConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub endpoint: String,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub token: Option<String>,
    pub batch_size: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://mls.hiinfo.com".to_string(),
            endpoint: "/api/search/tax-map-keys/".to_string(),
            token: std::env::var("HIINFO_TOKEN").ok(),
            batch_size: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    pub label: String,
    pub query: String,
    #[serde(default)]
    pub start: usize,
    pub end: usize,
}

impl From<QueryConfig> for QuerySpec {
    fn from(q: QueryConfig) -> Self {
        Self {
            label: q.label,
            query: q.query,
            start: q.start,
            end: q.end,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    /// Seconds
    pub timeout: u64,
    /// Seconds
    pub connect_timeout: u64,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            timeout: 60,
            connect_timeout: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OcrSection {
    pub pdftoppm: PathBuf,
    pub tesseract: PathBuf,
    pub dpi: u32,
}

impl Default for OcrSection {
    fn default() -> Self {
        let ocr = OcrConfig::default();
        Self {
            pdftoppm: ocr.pdftoppm,
            tesseract: ocr.tesseract,
            dpi: ocr.dpi,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchSection {
    /// `inline` or `sidecar`
    pub error_annotations: String,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            error_annotations: AnnotationMode::default().name().to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub year: i32,
    pub min_price: f64,
    pub instrument: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        let predicate = SelectionPredicate::default();
        Self {
            year: predicate.year,
            min_price: predicate.min_price,
            instrument: predicate.instrument,
        }
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./conveyline.toml (current directory)
    /// 2. ~/.config/conveyline/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("conveyline.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "conveyline") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn predicate(&self) -> SelectionPredicate {
        SelectionPredicate {
            year: self.filter.year,
            min_price: self.filter.min_price,
            instrument: self.filter.instrument.clone(),
        }
    }

    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            timeout: Duration::from_secs(self.http.timeout),
            connect_timeout: Duration::from_secs(self.http.connect_timeout),
        }
    }

    pub fn annotation_mode(&self) -> Result<AnnotationMode> {
        AnnotationMode::from_name(&self.fetch.error_annotations).with_context(|| {
            format!(
                "Unknown error_annotations mode {:?} (expected \"inline\" or \"sidecar\")",
                self.fetch.error_annotations
            )
        })
    }

    pub fn queries(&self) -> Vec<QuerySpec> {
        if self.queries.is_empty() {
            conveyline_fetch::config::default_queries()
        } else {
            self.queries.iter().cloned().map(QuerySpec::from).collect()
        }
    }

    /// Fetch pipeline settings writing to `output_path`
    pub fn fetch_config(&self, output_path: PathBuf) -> Result<conveyline_fetch::Config> {
        Ok(conveyline_fetch::Config {
            base_url: self.api.base_url.clone(),
            endpoint: self.api.endpoint.clone(),
            token: self.api.token.clone(),
            batch_size: self.api.batch_size,
            queries: self.queries(),
            output_path,
            annotations: self.annotation_mode()?,
            predicate: self.predicate(),
        })
    }

    /// Enrichment pipeline settings
    pub fn enrich_config(&self, input_path: PathBuf, output_path: PathBuf) -> conveyline_enrich::Config {
        conveyline_enrich::Config {
            input_path,
            output_path,
            ocr: OcrConfig {
                pdftoppm: self.ocr.pdftoppm.clone(),
                tesseract: self.ocr.tesseract.clone(),
                dpi: self.ocr.dpi,
            },
            predicate: self.predicate(),
        }
    }
}
