//! Fetcher, listing and media API against a mock server

use crate::support::{fast_fetcher, fast_policy, media_json, site_base, API_PATH};
use seda_harvest::crawler::FetchError;
use seda_harvest::site::{collect_items, Listing, MediaApi, MediaSource, TagListing};
use seda_harvest::storage::{Item, ItemId};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_retry_until_success_sleeps_twice() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/book"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/book"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let fetcher = fast_fetcher();
    let url = format!("{}/book?g=42", server.uri());
    let mut sleeps = Vec::new();

    let body = fast_policy()
        .run(|| fetcher.fetch_once(&url), |_, delay, _| sleeps.push(delay))
        .await
        .unwrap();

    assert_eq!(body, "ok");
    assert_eq!(sleeps.len(), 2);
    assert!(sleeps[1] > sleeps[0]);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = fast_fetcher()
        .fetch(&format!("{}/missing", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Status { status: 404, .. }));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_rate_limit_exhausts_attempts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let err = fast_fetcher()
        .fetch(&format!("{}/busy", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Exhausted { attempts: 3, .. }));
    assert_eq!(err.status(), Some(429));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_windows_1256_body_is_decoded() {
    let server = MockServer::start().await;
    let (bytes, _, _) = encoding_rs::WINDOWS_1256.encode("<h1>کتاب</h1>");

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=windows-1256")
                .set_body_bytes(bytes.into_owned()),
        )
        .mount(&server)
        .await;

    let body = fast_fetcher().fetch(&server.uri()).await.unwrap();
    assert_eq!(body, "<h1>کتاب</h1>");
}

fn listing_page(ids: &[u64]) -> String {
    let links: String = ids
        .iter()
        .map(|id| format!(r#"<a href="./DetailsAlbum/?VALID=TRUE&g={}">book</a>"#, id))
        .collect();
    format!(r#"<html><body><a href="/Tag/">tag</a>{}</body></html>"#, links)
}

#[tokio::test]
async fn test_listing_pages_are_merged_and_deduplicated() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tag/"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&[1, 2])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tag/"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tag/"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&[2, 3])))
        .mount(&server)
        .await;

    let base = site_base(&server);
    let listing = TagListing::new(
        fast_fetcher(),
        format!("{}/tag/?page={{page}}", server.uri()),
        base.clone(),
    );

    let first = listing.enumerate(1).await.unwrap();
    assert_eq!(first.len(), 2);

    let items = collect_items(&listing, 3).await.unwrap();
    let expected: Vec<Item> = [1, 2, 3]
        .iter()
        .map(|id| {
            Item::new(
                *id,
                format!("{}DetailsAlbum/?VALID=TRUE&g={}", base, id),
            )
        })
        .collect();
    assert_eq!(items, expected);
}

#[tokio::test]
async fn test_media_lookup_parses_candidates() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("VALID", "TRUE"))
        .and(query_param("g", "42"))
        .and(query_param("attid", "7"))
        .respond_with(ResponseTemplate::new(200).set_body_string(media_json(42)))
        .mount(&server)
        .await;

    let api = MediaApi::new(fast_fetcher(), site_base(&server))
        .with_api_base(format!("{}{}", server.uri(), API_PATH));

    let candidates = api.lookup(ItemId(42), 7).await.unwrap();

    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[1].url, "https://cdn.example.org/42-b.mp3");
    assert_eq!(candidates[1].size, 2000);
    assert_eq!(candidates[1].quality, Some(32));
}

#[tokio::test]
async fn test_media_lookup_tolerates_bad_responses() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("g", "1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("g", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("g", "3"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let api = MediaApi::new(fast_fetcher(), site_base(&server))
        .with_api_base(format!("{}{}", server.uri(), API_PATH));

    assert!(api.lookup(ItemId(1), 9).await.unwrap().is_empty());
    assert!(api.lookup(ItemId(2), 9).await.unwrap().is_empty());
    assert!(matches!(
        api.lookup(ItemId(3), 9).await,
        Err(FetchError::Exhausted { .. })
    ));
}
