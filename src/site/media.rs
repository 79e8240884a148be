//! Media lookup against the book details API

use crate::crawler::{FetchError, Fetcher};
use crate::site::{MediaCandidate, MediaSource};
use crate::storage::ItemId;
use crate::url::resolve_url;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

pub const DEFAULT_API_BASE: &str = "https://apisec.iranseda.ir/book/Details/";
pub const DEFAULT_PLAYER_BASE: &str = "https://player.iranseda.ir/book-player/";

/// Client for the details API that lists downloadable MP3 files
pub struct MediaApi {
    fetcher: Fetcher,
    api_base: String,
    player_base: String,
    site_base: Url,
}

impl MediaApi {
    pub fn new(fetcher: Fetcher, site_base: Url) -> Self {
        Self {
            fetcher,
            api_base: DEFAULT_API_BASE.to_string(),
            player_base: DEFAULT_PLAYER_BASE.to_string(),
            site_base,
        }
    }

    /// Points lookups at a different API root
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn lookup_url(&self, id: ItemId, attachment_id: u64) -> String {
        format!(
            "{}?VALID=TRUE&g={}&attid={}",
            self.api_base, id, attachment_id
        )
    }
}

#[async_trait]
impl MediaSource for MediaApi {
    fn access_link(&self, id: ItemId, attachment_id: u64) -> String {
        format!(
            "{}?VALID=TRUE&g={}&attid={}",
            self.player_base, id, attachment_id
        )
    }

    async fn lookup(
        &self,
        id: ItemId,
        attachment_id: u64,
    ) -> Result<Vec<MediaCandidate>, FetchError> {
        let url = self.lookup_url(id, attachment_id);

        let body = match self.fetcher.fetch(&url).await {
            Ok(body) => body,
            Err(FetchError::Status { status, .. }) => {
                tracing::debug!("Media lookup for {} returned HTTP {}", id, status);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        match parse_media_response(&body, &self.site_base) {
            Ok(candidates) => Ok(candidates),
            Err(e) => {
                tracing::warn!("Unparseable media response for {}: {}", id, e);
                Ok(Vec::new())
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    items: Option<Vec<ApiItem>>,
}

#[derive(Debug, Deserialize)]
struct ApiItem {
    #[serde(default)]
    download: Option<Vec<ApiDownload>>,
}

#[derive(Debug, Deserialize)]
struct ApiDownload {
    #[serde(default)]
    extension: Option<Value>,
    #[serde(default, rename = "downloadUrl")]
    download_url: Option<String>,
    #[serde(default, rename = "fileSize")]
    file_size: Option<Value>,
    #[serde(default, rename = "bitRate")]
    bit_rate: Option<Value>,
}

/// Parses the API's JSON body into MP3 candidates, in response order
pub fn parse_media_response(body: &str, site_base: &Url) -> serde_json::Result<Vec<MediaCandidate>> {
    let response: ApiResponse = serde_json::from_str(body)?;

    let candidates = response
        .items
        .unwrap_or_default()
        .into_iter()
        .flat_map(|item| item.download.unwrap_or_default())
        .filter(|d| {
            d.extension
                .as_ref()
                .and_then(value_as_string)
                .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"))
        })
        .filter_map(|d| {
            let href = d.download_url.as_deref().filter(|u| !u.trim().is_empty())?;
            let url = resolve_url(site_base, href).ok()?;
            Some(MediaCandidate {
                url,
                size: d.file_size.as_ref().and_then(value_as_u64).unwrap_or(0),
                quality: d
                    .bit_rate
                    .as_ref()
                    .and_then(value_as_u64)
                    .and_then(|b| u32::try_from(b).ok()),
            })
        })
        .collect();

    Ok(candidates)
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Numbers arrive either as JSON numbers or as numeric strings
fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
