//! Mock site and harvester wiring shared by the integration tests

use seda_harvest::cache::DiskCache;
use seda_harvest::config::HttpConfig;
use seda_harvest::crawler::{
    build_http_client, Enricher, Fetcher, MediaFilter, PassOptions, RetryPolicy, Throttle,
};
use seda_harvest::site::{DetailsExtractor, MediaApi};
use seda_harvest::storage::Item;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const DETAILS_PATH: &str = "/DetailsAlbum/";
pub const API_PATH: &str = "/book/Details/";

/// Retry policy with millisecond backoff so tests stay fast
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(5),
        factor: 2.0,
        jitter: Duration::ZERO,
    }
}

pub fn fast_fetcher() -> Fetcher {
    let http = HttpConfig {
        timeout_secs: 5,
        ..HttpConfig::default()
    };
    Fetcher::new(build_http_client(&http).unwrap(), fast_policy())
}

pub fn site_base(server: &MockServer) -> Url {
    Url::parse(&format!("{}/", server.uri())).unwrap()
}

pub fn item(server: &MockServer, id: u64) -> Item {
    Item::new(id, format!("{}{}?g={}", server.uri(), DETAILS_PATH, id))
}

pub fn details_page(title: &str, attachment_id: u64) -> String {
    format!(
        r#"<html>
          <head><meta property="og:image" content="/Images/cover.jpg?AttID={attachment_id}" /></head>
          <body><h1 class="titel">{title}</h1></body>
        </html>"#
    )
}

/// Two MP3s for `id`: a small high-bitrate one and a large low-bitrate one
pub fn media_json(id: u64) -> String {
    format!(
        r#"{{"items": [{{"download": [
            {{"extension": "mp3", "downloadUrl": "https://cdn.example.org/{id}-a.mp3", "fileSize": 1000, "bitRate": 64}},
            {{"extension": "mp3", "downloadUrl": "https://cdn.example.org/{id}-b.mp3", "fileSize": 2000, "bitRate": 32}}
        ]}}]}}"#
    )
}

/// Serves a details page and a media response for book `id`
pub async fn mount_book(server: &MockServer, id: u64, title: &str) {
    let attachment_id = id + 1000;

    Mock::given(method("GET"))
        .and(path(DETAILS_PATH))
        .and(query_param("g", id.to_string()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string(details_page(title, attachment_id)),
        )
        .mount(server)
        .await;

    mount_media(server, id).await;
}

pub async fn mount_media(server: &MockServer, id: u64) {
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("g", id.to_string()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .set_body_string(media_json(id)),
        )
        .mount(server)
        .await;
}

/// Details page for `id` that answers with `status` for the first `times` requests
///
/// Mount before [`mount_book`] so this mock is matched first.
pub async fn mount_failing_details(server: &MockServer, id: u64, status: u16, times: u64) {
    Mock::given(method("GET"))
        .and(path(DETAILS_PATH))
        .and(query_param("g", id.to_string()))
        .respond_with(ResponseTemplate::new(status))
        .up_to_n_times(times)
        .mount(server)
        .await;
}

pub fn enricher(server: &MockServer, cache: Option<DiskCache>, filter: MediaFilter) -> Enricher {
    let fetcher = fast_fetcher();
    let base = site_base(server);
    let media = MediaApi::new(fetcher.clone(), base.clone())
        .with_api_base(format!("{}{}", server.uri(), API_PATH));

    Enricher::new(fetcher, Arc::new(DetailsExtractor::new(base)))
        .with_cache(cache)
        .with_media(Arc::new(media))
        .with_filter(filter)
}

/// Unthrottled options so sweeps do not sleep
pub fn options(dir: &Path, workers: usize, max_sweeps: u32) -> PassOptions {
    PassOptions {
        workers,
        throttle: Throttle::none(),
        sweep_throttle: Throttle::none(),
        max_sweeps,
        ledger_path: dir.join("errors.csv"),
    }
}

/// Number of details page requests the server has seen
pub async fn details_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == DETAILS_PATH)
        .count()
}

/// `g` ids of the details page requests, in the order the server received them
pub async fn details_request_ids(server: &MockServer) -> Vec<u64> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == DETAILS_PATH)
        .filter_map(|r| {
            r.url
                .query_pairs()
                .find(|(key, _)| key == "g")
                .and_then(|(_, value)| value.parse().ok())
        })
        .collect()
}
