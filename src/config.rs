//! Configuration management for flatwatch using the prefer crate.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::crawl::{BlockPolicy, DelayRange};
use crate::extract::FingerprintSource;
use crate::fetcher::BrowserEngineConfig;

/// Default database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "flatwatch.db";

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename.
    pub database_filename: String,
    /// Database URL (overrides data_dir/database_filename if set).
    /// Supports `sqlite:` URLs. Set via DATABASE_URL env var or config.
    pub database_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        // Falls back gracefully: Documents dir -> Home dir -> Current dir
        let data_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("flatwatch");

        Self {
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            database_url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Default::default()
        }
    }

    /// Get the full path to the SQLite database.
    pub fn database_path(&self) -> PathBuf {
        match self.database_url {
            Some(ref url) => PathBuf::from(url.strip_prefix("sqlite:").unwrap_or(url)),
            None => self.data_dir.join(&self.database_filename),
        }
    }

    /// Ensure the data directory exists.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create data directory '{}': {}",
                    self.data_dir.display(),
                    e
                ),
            )
        })
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Database filename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub block: BlockConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub browser: BrowserEngineConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default locations.
    pub async fn load() -> Self {
        // Use prefer for file discovery, then parse with serde
        match prefer::load("flatwatch").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("Ignoring unreadable config: {}", e);
                            Self::default_with_env()
                        }
                    }
                } else {
                    Self::default_with_env()
                }
            }
            Err(_) => Self::default_with_env(),
        }
    }

    /// Create a default config with environment variable overrides applied.
    pub fn default_with_env() -> Self {
        let mut config = Self::default();
        config.browser = config.browser.with_env_overrides();
        config
    }

    /// Load configuration from a specific file path.
    /// TOML for `.toml` files, JSON otherwise.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let mut config = Self::parse(&contents, ext)?;
        config.source_path = Some(path.to_path_buf());
        config.browser = config.browser.with_env_overrides();
        Ok(config)
    }

    /// Parse configuration text in the given format.
    pub fn parse(contents: &str, ext: &str) -> Result<Self, String> {
        match ext {
            "toml" => {
                toml::from_str(contents).map_err(|e| format!("Failed to parse TOML config: {}", e))
            }
            _ => serde_json::from_str(contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e)),
        }
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Apply file-level overrides to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings) {
        if let Some(ref data_dir) = self.data_dir {
            let expanded = PathBuf::from(data_dir);
            settings.data_dir = match self.base_dir() {
                Some(base) if expanded.is_relative() => base.join(expanded),
                _ => expanded,
            };
        }
        if let Some(ref database) = self.database {
            settings.database_filename = database.clone();
        }
    }
}

/// Load settings and configuration, honouring an explicit config path.
pub async fn load_settings(config_path: Option<&Path>) -> Result<(Settings, Config), String> {
    let config = match config_path {
        Some(path) => Config::load_from_path(path).await?,
        None => Config::load().await,
    };
    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings);
    Ok((settings, config))
}

/// Search-results URL and its query filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: String,
    pub currency: Option<String>,
    pub max_price: Option<u64>,
    pub sort_order: Option<String>,
    /// Query parameter carrying the page number (omitted on page 1).
    pub page_param: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.olx.ua/uk/nedvizhimost/kvartiry/prodazha-kvartir/lvov/"
                .to_string(),
            currency: Some("USD".to_string()),
            max_price: Some(50_000),
            sort_order: Some("created_at:desc".to_string()),
            page_param: "page".to_string(),
        }
    }
}

impl SearchConfig {
    /// Build the listing URL for a 1-based page number.
    pub fn page_url(&self, page: u32) -> Result<String, url::ParseError> {
        let mut url = Url::parse(&self.base_url)?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(ref currency) = self.currency {
                query.append_pair("currency", currency);
            }
            if let Some(max_price) = self.max_price {
                query.append_pair("search[filter_float_price:to]", &max_price.to_string());
            }
            if let Some(ref order) = self.sort_order {
                query.append_pair("search[order]", order);
            }
            if page > 1 {
                query.append_pair(&self.page_param, &page.to_string());
            }
        }
        // An empty pair list would otherwise leave a dangling '?'
        if url.query() == Some("") {
            url.set_query(None);
        }
        Ok(url.to_string())
    }
}

/// Candidate filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Minimum accepted price. Zero disables the filter, and with it the
    /// requirement that a card's price parses at all.
    pub min_price: u64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self { min_price: 20_000 }
    }
}

impl FilterConfig {
    pub fn price_required(&self) -> bool {
        self.min_price > 0
    }
}

/// Anti-bot block heuristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockConfig {
    /// Pages shorter than this many characters are treated as blocked.
    pub size_floor: usize,
    /// Raw markup that every usable listing page contains.
    pub card_marker: String,
    /// Case-insensitive phrases that mark an interstitial.
    pub phrases: Vec<String>,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            size_floor: 50_000,
            card_marker: r#"data-cy="l-card""#.to_string(),
            phrases: vec![
                "please verify you are a human".to_string(),
                "access denied".to_string(),
                "unusual traffic".to_string(),
                "check your browser before accessing".to_string(),
            ],
        }
    }
}

/// Selectors and text markers describing the site's markup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Origin that relative ad links are resolved against.
    pub origin: String,
    pub card_selector: String,
    pub price_selector: String,
    /// Path prefix of ad permalinks; the first such anchor with text is the title.
    pub permalink_prefix: String,
    pub area_marker: String,
    /// Label of the promoted-placement badge (compared case-insensitively).
    pub promoted_label: String,
    /// Relative-date word used for ads published today.
    pub today_marker: String,
    pub structured_data_selector: String,
    pub parameter_selector: String,
    /// Global variable holding the string-escaped state payload.
    pub state_variable: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            origin: "https://www.olx.ua".to_string(),
            card_selector: r#"div[data-cy="l-card"]"#.to_string(),
            price_selector: r#"[data-testid="ad-price"]"#.to_string(),
            permalink_prefix: "/d/uk/obyavlenie/".to_string(),
            area_marker: "м²".to_string(),
            promoted_label: "топ".to_string(),
            today_marker: "сьогодні".to_string(),
            structured_data_selector: r#"script[type="application/ld+json"]"#.to_string(),
            parameter_selector: r#"[data-testid="ad-parameters-container"] p"#.to_string(),
            state_variable: "__PRERENDERED_STATE__".to_string(),
        }
    }
}

/// Crawl termination and dedup behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Hard upper bound on listing pages per run.
    pub max_pages: u32,
    /// Target day as a number of days before the run date.
    pub target_day_offset: u32,
    pub fingerprint_source: FingerprintSource,
    pub block_policy: BlockPolicy,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_pages: 25,
            target_day_offset: 1,
            fingerprint_source: FingerprintSource::default(),
            block_policy: BlockPolicy::default(),
        }
    }
}

/// Randomized pauses between navigations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub before_listing: DelayRange,
    pub before_detail: DelayRange,
    pub between_pages: DelayRange,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            before_listing: DelayRange::secs(120, 153),
            before_detail: DelayRange::secs(65, 153),
            between_pages: DelayRange::secs(67, 133),
        }
    }
}

impl PacingConfig {
    /// No pauses at all.
    pub fn disabled() -> Self {
        Self {
            before_listing: DelayRange::ZERO,
            before_detail: DelayRange::ZERO,
            between_pages: DelayRange::ZERO,
        }
    }
}
