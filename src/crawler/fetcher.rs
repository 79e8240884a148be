//! HTTP fetcher
//!
//! This module handles every network read the harvester makes:
//! - Building the shared HTTP client (user agent, language, timeouts)
//! - Classifying responses and transport failures as transient or permanent
//! - Retrying transient failures through [`RetryPolicy`]
//! - Decoding bodies with the declared or sniffed character set

use crate::config::HttpConfig;
use crate::crawler::retry::{RetryPolicy, Retryable};
use encoding_rs::Encoding;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// A failed network read
///
/// | Condition | Retryable |
/// |-----------|-----------|
/// | HTTP 403, 408, 429 | yes |
/// | HTTP 5xx | yes |
/// | Timeout | yes |
/// | Connection or body transfer error | yes |
/// | Any other non-2xx status | no |
/// | Malformed payload | no |
/// | Retries exhausted | no |
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Throttled { url: String, status: u16 },

    #[error("HTTP {status} from {url}")]
    ServerError { url: String, status: u16 },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("timed out fetching {url}")]
    Timeout { url: String },

    #[error("connection failed for {url}: {message}")]
    Connect { url: String, message: String },

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("malformed response from {url}: {message}")]
    Malformed { url: String, message: String },

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<FetchError> },
}

impl FetchError {
    /// Classifies a non-2xx status
    pub fn from_status(url: &str, status: StatusCode) -> Self {
        let url = url.to_string();
        let code = status.as_u16();
        match status {
            StatusCode::FORBIDDEN | StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
                Self::Throttled { url, status: code }
            }
            s if s.is_server_error() => Self::ServerError { url, status: code },
            _ => Self::Status { url, status: code },
        }
    }

    /// Classifies a transport failure reported by the HTTP client
    pub fn from_transport(url: &str, err: reqwest::Error) -> Self {
        let url = url.to_string();
        if err.is_timeout() {
            Self::Timeout { url }
        } else if err.is_connect() || err.is_body() || err.is_decode() {
            Self::Connect {
                url,
                message: err.to_string(),
            }
        } else {
            Self::Request {
                url,
                message: err.to_string(),
            }
        }
    }

    /// HTTP status behind this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Throttled { status, .. }
            | Self::ServerError { status, .. }
            | Self::Status { status, .. } => Some(*status),
            Self::Exhausted { last, .. } => last.status(),
            _ => None,
        }
    }

    /// A fatal error ends processing of the item for the current pass
    pub fn is_fatal(&self) -> bool {
        !self.is_retryable()
    }
}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Throttled { .. }
                | Self::ServerError { .. }
                | Self::Timeout { .. }
                | Self::Connect { .. }
        )
    }

    fn exhausted(self, attempts: u32) -> Self {
        Self::Exhausted {
            attempts,
            last: Box::new(self),
        }
    }
}

/// Builds the shared HTTP client
///
/// The timeout applies to each attempt, not to the whole retry sequence.
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&config.accept_language) {
        headers.insert(ACCEPT_LANGUAGE, value);
    }

    Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Retrying GET reader shared by all site collaborators
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    policy: RetryPolicy,
}

impl Fetcher {
    pub fn new(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Fetches `url` as text, retrying transient failures
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.with_retry(url, || self.fetch_once(url)).await
    }

    /// Runs one fetch operation under the retry policy, logging each backoff
    pub async fn with_retry<T, Op, Fut>(&self, url: &str, op: Op) -> Result<T, FetchError>
    where
        Op: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, FetchError>>,
    {
        self.policy
            .run(op, |attempt, delay, err| {
                tracing::warn!(
                    "Attempt {}/{} for {} failed ({}), retrying in {:.2}s",
                    attempt,
                    self.policy.max_attempts,
                    url,
                    err,
                    delay.as_secs_f64()
                );
            })
            .await
    }

    /// Single attempt, no retry
    pub async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        let (bytes, content_type) = self.get_once(url).await?;
        Ok(decode_body(&bytes, content_type.as_deref()))
    }

    async fn get_once(&self, url: &str) -> Result<(Vec<u8>, Option<String>), FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_transport(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::from_status(url, status));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_transport(url, e))?;

        Ok((bytes.to_vec(), content_type))
    }
}

/// Decodes a response body to text
///
/// Order of preference:
/// 1. A charset declared in `Content-Type`, unless it is the generic
///    `iso-8859-1`/`ascii` default some servers send for everything
/// 2. A `<meta charset>` declaration near the top of the document
/// 3. UTF-8, when the bytes are valid UTF-8
/// 4. The generic declared charset
/// 5. Lossy UTF-8
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    let declared = content_type
        .and_then(charset_from_content_type)
        .and_then(|label| Encoding::for_label(label.as_bytes()));

    if let Some(encoding) = declared.filter(|e| !is_generic(e)) {
        let (text, _, _) = encoding.decode(bytes);
        return text.into_owned();
    }

    if let Some(encoding) = sniff_meta_charset(bytes) {
        let (text, _, _) = encoding.decode(bytes);
        return text.into_owned();
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    if let Some(encoding) = declared {
        let (text, _, _) = encoding.decode(bytes);
        return text.into_owned();
    }

    String::from_utf8_lossy(bytes).into_owned()
}

fn is_generic(encoding: &&'static Encoding) -> bool {
    // encoding_rs maps both iso-8859-1 and ascii labels to windows-1252
    *encoding == encoding_rs::WINDOWS_1252
}

fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|part| {
        let (key, value) = part.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches('"').to_string())
        } else {
            None
        }
    })
}

fn sniff_meta_charset(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = &bytes[..bytes.len().min(2048)];
    let head = String::from_utf8_lossy(head).to_ascii_lowercase();

    let start = head.find("charset=")? + "charset=".len();
    let label: String = head[start..]
        .trim_start_matches(['"', '\''])
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();

    Encoding::for_label(label.as_bytes())
}
