use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Seda-Harvest
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub listing: ListingConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub throttle: ThrottleConfig,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub parallel: ParallelConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Config {
    /// Configuration with default sections around the given listing
    pub fn with_listing(url_template: impl Into<String>, pages: u32) -> Self {
        Self {
            listing: ListingConfig {
                url_template: url_template.into(),
                pages,
            },
            output: OutputConfig::default(),
            throttle: ThrottleConfig::default(),
            filters: FilterConfig::default(),
            parallel: ParallelConfig::default(),
            sweep: SweepConfig::default(),
            retry: RetryConfig::default(),
            http: HttpConfig::default(),
            logging: LoggingConfig::default(),
            cache: CacheConfig::default(),
        }
    }

    /// Cache directory when caching is enabled
    pub fn cache_dir(&self) -> Option<PathBuf> {
        self.cache.enabled.then(|| PathBuf::from(&self.cache.dir))
    }
}

/// Listing pages to enumerate item identifiers from
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ListingConfig {
    /// Listing URL with a `{page}` placeholder
    pub url_template: String,

    /// Number of listing pages to walk, starting at page 1
    pub pages: u32,
}

/// Output file locations
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OutputConfig {
    /// Item id list written by the `crawl` command
    pub ids_csv: PathBuf,

    /// Keyed dataset snapshot, rewritten atomically after each success
    pub books_csv: PathBuf,

    /// Error ledger, rewritten at the end of every pass
    pub errors_csv: PathBuf,

    /// Append-only journal of every successful record
    pub jsonl: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            ids_csv: PathBuf::from("audiobooks.csv"),
            books_csv: PathBuf::from("books_with_attid.csv"),
            errors_csv: PathBuf::from("errors.csv"),
            jsonl: PathBuf::from("books_with_attid.jsonl"),
        }
    }
}

/// Randomized delay between item completions in pass 1 (seconds)
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    pub min: f64,
    pub max: f64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self { min: 0.1, max: 0.3 }
    }
}

/// Media candidate filtering
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FilterConfig {
    /// Minimum size for an MP3 candidate to qualify
    pub min_mp3_size_bytes: u64,

    /// Skip items that have no qualifying MP3
    pub require_full_mp3: bool,
}

/// Pass 1 worker pool
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    pub workers: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self { workers: 2 }
    }
}

/// Sweep passes over the error ledger
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SweepConfig {
    pub max_sweeps: u32,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self { max_sweeps: 2 }
    }
}

/// Retry policy shared by the listing and detail fetches (delays in seconds)
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: f64,
    pub factor: f64,
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: 0.6,
            factor: 2.0,
            jitter: 0.2,
        }
    }
}

/// HTTP client identification and timeouts
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub accept_language: String,

    /// Timeout for a single network attempt
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0".to_string(),
            accept_language: "fa,en;q=0.8".to_string(),
            timeout_secs: 25,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Content cache location
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub dir: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: ".cache/details".to_string(),
        }
    }
}
