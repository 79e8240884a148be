use crate::config::types::{Config, ListingConfig, OutputConfig, ParallelConfig, RetryConfig, ThrottleConfig};
use crate::ConfigError;
use url::Url;

/// Largest delay, in seconds, accepted for any throttle or retry setting
pub const MAX_DELAY_SECS: f64 = 3600.0;

/// Largest accepted backoff growth factor
pub const MAX_BACKOFF_FACTOR: f64 = 10.0;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_listing_config(&config.listing)?;
    validate_enrichment(config)
}

/// Validates everything except the listing section
///
/// Used by `enrich`, which takes its items from an ids CSV instead of the
/// listing pages.
pub fn validate_enrichment(config: &Config) -> Result<(), ConfigError> {
    validate_output_config(&config.output)?;
    validate_throttle_config(&config.throttle)?;
    validate_parallel_config(&config.parallel)?;
    validate_retry_config(&config.retry)?;

    if config.cache.enabled && config.cache.dir.is_empty() {
        return Err(ConfigError::Validation(
            "cache.dir cannot be empty when the cache is enabled".to_string(),
        ));
    }

    Ok(())
}

/// Validates the listing template and page count
fn validate_listing_config(config: &ListingConfig) -> Result<(), ConfigError> {
    if !config.url_template.contains("{page}") {
        return Err(ConfigError::Validation(format!(
            "url-template must contain a {{page}} placeholder, got '{}'",
            config.url_template
        )));
    }

    let probe = config.url_template.replace("{page}", "1");
    let url = Url::parse(&probe)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid url-template '{}': {}", probe, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "url-template must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.pages < 1 {
        return Err(ConfigError::Validation(format!(
            "pages must be >= 1, got {}",
            config.pages
        )));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    for (name, path) in [
        ("books-csv", &config.books_csv),
        ("errors-csv", &config.errors_csv),
        ("jsonl", &config.jsonl),
    ] {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    if config.books_csv == config.errors_csv {
        return Err(ConfigError::Validation(
            "books-csv and errors-csv must be different files".to_string(),
        ));
    }

    Ok(())
}

fn validate_throttle_config(config: &ThrottleConfig) -> Result<(), ConfigError> {
    if !is_delay(config.min) || !is_delay(config.max) {
        return Err(ConfigError::Validation(format!(
            "throttle bounds must be between 0 and {}s, got min={} max={}",
            MAX_DELAY_SECS,
            config.min, config.max
        )));
    }

    if config.min > config.max {
        return Err(ConfigError::Validation(format!(
            "throttle.min must be <= throttle.max, got min={} max={}",
            config.min, config.max
        )));
    }

    Ok(())
}

fn validate_parallel_config(config: &ParallelConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 64 {
        return Err(ConfigError::Validation(format!(
            "parallel.workers must be between 1 and 64, got {}",
            config.workers
        )));
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "retry.max-attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if !is_delay(config.base_delay) || !is_delay(config.jitter) {
        return Err(ConfigError::Validation(format!(
            "retry delays must be between 0 and {}s, got base-delay={} jitter={}",
            MAX_DELAY_SECS, config.base_delay, config.jitter
        )));
    }

    if !(1.0..=MAX_BACKOFF_FACTOR).contains(&config.factor) {
        return Err(ConfigError::Validation(format!(
            "retry.factor must be between 1 and {}, got {}",
            MAX_BACKOFF_FACTOR, config.factor
        )));
    }

    Ok(())
}

/// Finite, non-negative and no longer than an hour; rejects NaN
fn is_delay(secs: f64) -> bool {
    (0.0..=MAX_DELAY_SECS).contains(&secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_listing_template() {
        let ok = ListingConfig {
            url_template: "https://example.com/list?page={page}".to_string(),
            pages: 3,
        };
        assert!(validate_listing_config(&ok).is_ok());

        let missing = ListingConfig {
            url_template: "https://example.com/list".to_string(),
            pages: 3,
        };
        assert!(validate_listing_config(&missing).is_err());

        let ftp = ListingConfig {
            url_template: "ftp://example.com/{page}".to_string(),
            pages: 3,
        };
        assert!(matches!(
            validate_listing_config(&ftp),
            Err(ConfigError::InvalidUrl(_))
        ));

        let zero = ListingConfig {
            url_template: "https://example.com/{page}".to_string(),
            pages: 0,
        };
        assert!(validate_listing_config(&zero).is_err());
    }

    #[test]
    fn test_validate_throttle() {
        assert!(validate_throttle_config(&ThrottleConfig { min: 0.1, max: 0.3 }).is_ok());
        assert!(validate_throttle_config(&ThrottleConfig { min: 0.0, max: 0.0 }).is_ok());
        assert!(validate_throttle_config(&ThrottleConfig { min: 0.5, max: 0.3 }).is_err());
        assert!(validate_throttle_config(&ThrottleConfig { min: -1.0, max: 0.3 }).is_err());
        assert!(validate_throttle_config(&ThrottleConfig { min: 0.0, max: f64::NAN }).is_err());
        assert!(validate_throttle_config(&ThrottleConfig { min: f64::INFINITY, max: f64::INFINITY }).is_err());
        assert!(validate_throttle_config(&ThrottleConfig { min: 0.1, max: 1e9 }).is_err());
    }

    #[test]
    fn test_validate_workers() {
        assert!(validate_parallel_config(&ParallelConfig { workers: 1 }).is_ok());
        assert!(validate_parallel_config(&ParallelConfig { workers: 0 }).is_err());
        assert!(validate_parallel_config(&ParallelConfig { workers: 65 }).is_err());
    }

    #[test]
    fn test_validate_retry() {
        assert!(validate_retry_config(&RetryConfig::default()).is_ok());

        let no_attempts = RetryConfig {
            max_attempts: 0,
            ..RetryConfig::default()
        };
        assert!(validate_retry_config(&no_attempts).is_err());

        let shrinking = RetryConfig {
            factor: 0.5,
            ..RetryConfig::default()
        };
        assert!(validate_retry_config(&shrinking).is_err());

        for bad in [
            RetryConfig { base_delay: f64::INFINITY, ..RetryConfig::default() },
            RetryConfig { jitter: f64::INFINITY, ..RetryConfig::default() },
            RetryConfig { base_delay: f64::NAN, ..RetryConfig::default() },
            RetryConfig { factor: 1e300, ..RetryConfig::default() },
            RetryConfig { factor: f64::NAN, ..RetryConfig::default() },
        ] {
            assert!(matches!(
                validate_retry_config(&bad),
                Err(ConfigError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_enrichment_validation_ignores_listing() {
        let mut config = Config::with_listing("", 1);
        assert!(validate(&config).is_err());
        assert!(validate_enrichment(&config).is_ok());

        config.throttle.min = f64::INFINITY;
        config.throttle.max = f64::INFINITY;
        assert!(validate_enrichment(&config).is_err());
    }
}
