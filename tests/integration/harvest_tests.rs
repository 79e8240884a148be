//! End-to-end harvests through the pass controller

use crate::support::{
    details_request_ids, details_requests, enricher, item, mount_book, mount_failing_details,
    mount_media, options,
};
use seda_harvest::cache::DiskCache;
use seda_harvest::crawler::{MediaFilter, SweepController, NO_MEDIA_REASON};
use seda_harvest::state::PassState;
use seda_harvest::storage::{read_snapshot, ErrorLedger, ItemId, MergeStore};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use wiremock::MockServer;

fn controller(
    server: &MockServer,
    dir: &Path,
    cache: Option<DiskCache>,
    filter: MediaFilter,
    workers: usize,
    max_sweeps: u32,
) -> SweepController {
    let store = MergeStore::open(&dir.join("books.csv"), &dir.join("books.jsonl")).unwrap();
    SweepController::new(
        enricher(server, cache, filter),
        store,
        options(dir, workers, max_sweeps),
    )
}

#[tokio::test]
async fn test_full_harvest_all_succeed() {
    let server = MockServer::start().await;
    for id in 1..=4 {
        mount_book(&server, id, &format!("کتاب {}", id)).await;
    }
    let dir = TempDir::new().unwrap();

    let items = vec![
        item(&server, 1),
        item(&server, 2),
        item(&server, 3),
        item(&server, 2),
        item(&server, 4),
    ];
    let report = controller(&server, dir.path(), None, MediaFilter::default(), 2, 2)
        .run(items)
        .await
        .unwrap();

    assert_eq!(report.total_items, 4);
    assert_eq!(report.cumulative_successes(), 4);
    assert_eq!(report.remaining_errors, 0);
    assert_eq!(report.dataset_rows, 4);
    // Sweep 1 sees an empty ledger and never runs
    assert_eq!(report.passes.len(), 1);

    let records = read_snapshot(&dir.path().join("books.csv")).unwrap();
    let ids: Vec<_> = records.keys().copied().collect();
    assert_eq!(ids, vec![ItemId(1), ItemId(2), ItemId(3), ItemId(4)]);

    let book = &records[&ItemId(3)];
    assert_eq!(book.title.as_deref(), Some("کتاب 3"));
    assert_eq!(book.attachment_id, Some(1003));
    assert_eq!(
        book.player_link.as_deref(),
        Some("https://player.iranseda.ir/book-player/?VALID=TRUE&g=3&attid=1003")
    );
    assert_eq!(
        book.full_mp3_url.as_deref(),
        Some("https://cdn.example.org/3-b.mp3")
    );
    assert_eq!(
        book.all_mp3s.as_deref(),
        Some("https://cdn.example.org/3-a.mp3, https://cdn.example.org/3-b.mp3")
    );

    let journal = fs::read_to_string(dir.path().join("books.jsonl")).unwrap();
    assert_eq!(journal.lines().count(), 4);

    let ledger = ErrorLedger::load(&dir.path().join("errors.csv")).unwrap();
    assert!(ledger.is_empty());
}

#[tokio::test]
async fn test_sweep_recovers_transient_failure() {
    let server = MockServer::start().await;
    // Three 503s use up every attempt of pass 1; sweep 1 then succeeds
    mount_failing_details(&server, 2, 503, 3).await;
    for id in 1..=3 {
        mount_book(&server, id, &format!("Book {}", id)).await;
    }
    let dir = TempDir::new().unwrap();
    let ledger_path = dir.path().join("errors.csv");

    let items = vec![item(&server, 1), item(&server, 2), item(&server, 3)];
    let report = controller(&server, dir.path(), None, MediaFilter::default(), 2, 2)
        .run(items)
        .await
        .unwrap();

    assert_eq!(report.passes.len(), 2);
    assert_eq!(report.passes[0].state, PassState::Pass1);
    assert_eq!(report.passes[0].succeeded, 2);
    assert_eq!(report.passes[0].failed, 1);
    assert_eq!(report.passes[1].state, PassState::Sweep(1));
    assert_eq!(report.passes[1].attempted, 1);
    assert_eq!(report.passes[1].succeeded, 1);

    assert_eq!(report.cumulative_successes(), 3);
    assert_eq!(report.remaining_errors, 0);
    assert!(ErrorLedger::load(&ledger_path).unwrap().is_empty());
    assert_eq!(report.dataset_rows, 3);
}

#[tokio::test]
async fn test_sweep_follows_ledger_order_and_drops_recovered() {
    let server = MockServer::start().await;
    mount_failing_details(&server, 9, 404, u64::MAX).await;
    mount_failing_details(&server, 5, 404, u64::MAX).await;
    // 2 fails once in pass 1, then recovers in sweep 1
    mount_failing_details(&server, 2, 404, 1).await;
    mount_book(&server, 2, "Second chance").await;
    let dir = TempDir::new().unwrap();

    let items = vec![item(&server, 9), item(&server, 2), item(&server, 5)];
    let report = controller(&server, dir.path(), None, MediaFilter::default(), 1, 1)
        .run(items)
        .await
        .unwrap();

    let states: Vec<_> = report.passes.iter().map(|p| p.state).collect();
    assert_eq!(states, vec![PassState::Pass1, PassState::Sweep(1)]);
    assert_eq!(report.passes[0].failed, 3);
    assert_eq!(report.passes[1].attempted, 3);
    assert_eq!(report.passes[1].succeeded, 1);
    assert_eq!(report.passes[1].failed, 2);

    // Pass 1 walks the item list, sweep 1 walks the ledger in stored order
    assert_eq!(details_request_ids(&server).await, vec![9, 2, 5, 9, 2, 5]);

    let ledger = ErrorLedger::load(&dir.path().join("errors.csv")).unwrap();
    let ids: Vec<_> = ledger.entries().iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![ItemId(9), ItemId(5)]);
    assert_eq!(report.remaining_errors, 2);

    let records = read_snapshot(&dir.path().join("books.csv")).unwrap();
    assert_eq!(records.keys().copied().collect::<Vec<_>>(), vec![ItemId(2)]);
}

#[tokio::test]
async fn test_persist_failure_lands_in_ledger() {
    let server = MockServer::start().await;
    mount_book(&server, 4, "Unwritable").await;
    let dir = TempDir::new().unwrap();

    let controller = controller(&server, dir.path(), None, MediaFilter::default(), 1, 0);
    // A directory where the snapshot belongs makes the atomic rename fail
    fs::create_dir(dir.path().join("books.csv")).unwrap();

    let report = controller.run(vec![item(&server, 4)]).await.unwrap();

    assert_eq!(report.passes[0].succeeded, 0);
    assert_eq!(report.passes[0].failed, 1);

    let ledger = ErrorLedger::load(&dir.path().join("errors.csv")).unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger.entries()[0].id, ItemId(4));
    assert!(ledger.entries()[0].reason.starts_with("persist failed"));
}

#[tokio::test]
async fn test_permanent_failure_stays_in_ledger() {
    let server = MockServer::start().await;
    mount_failing_details(&server, 9, 404, u64::MAX).await;
    mount_book(&server, 1, "Good").await;
    let dir = TempDir::new().unwrap();

    let items = vec![item(&server, 1), item(&server, 9)];
    let report = controller(&server, dir.path(), None, MediaFilter::default(), 2, 2)
        .run(items)
        .await
        .unwrap();

    let states: Vec<_> = report.passes.iter().map(|p| p.state).collect();
    assert_eq!(
        states,
        vec![PassState::Pass1, PassState::Sweep(1), PassState::Sweep(2)]
    );
    assert_eq!(report.remaining_errors, 1);
    assert_eq!(report.remaining_failed(), 1);
    // 404 is fatal: one request per pass, no internal retries
    assert_eq!(details_requests(&server).await, 1 + 3);

    let ledger = ErrorLedger::load(&dir.path().join("errors.csv")).unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger.entries()[0].id, ItemId(9));
    assert!(ledger.entries()[0].reason.contains("404"));
}

#[tokio::test]
async fn test_no_sweeps_when_budget_is_zero() {
    let server = MockServer::start().await;
    mount_failing_details(&server, 5, 404, u64::MAX).await;
    let dir = TempDir::new().unwrap();

    let report = controller(&server, dir.path(), None, MediaFilter::default(), 1, 0)
        .run(vec![item(&server, 5)])
        .await
        .unwrap();

    assert_eq!(report.passes.len(), 1);
    assert_eq!(report.remaining_errors, 1);
}

#[tokio::test]
async fn test_required_media_skip_lands_in_ledger() {
    let server = MockServer::start().await;
    mount_book(&server, 42, "X").await;
    let dir = TempDir::new().unwrap();
    let filter = MediaFilter {
        min_size: 5000,
        require_media: true,
    };

    let report = controller(&server, dir.path(), None, filter, 1, 0)
        .run(vec![item(&server, 42)])
        .await
        .unwrap();

    assert_eq!(report.remaining_skipped(), 1);
    assert_eq!(report.dataset_rows, 0);

    let ledger = ErrorLedger::load(&dir.path().join("errors.csv")).unwrap();
    assert_eq!(ledger.entries()[0].reason, NO_MEDIA_REASON);
    assert!(read_snapshot(&dir.path().join("books.csv")).is_err());
}

#[tokio::test]
async fn test_empty_title_is_incomplete() {
    let server = MockServer::start().await;
    mount_book(&server, 7, "").await;
    let dir = TempDir::new().unwrap();

    let report = controller(&server, dir.path(), None, MediaFilter::default(), 1, 0)
        .run(vec![item(&server, 7)])
        .await
        .unwrap();

    assert_eq!(report.remaining_failed(), 1);
    let ledger = ErrorLedger::load(&dir.path().join("errors.csv")).unwrap();
    assert!(ledger.entries()[0].reason.contains("incomplete"));
}

#[tokio::test]
async fn test_missing_attachment_id_is_incomplete() {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(crate::support::DETAILS_PATH))
        .and(query_param("g", "8"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<h1 class=\"titel\">No player</h1>"),
        )
        .mount(&server)
        .await;
    mount_media(&server, 8).await;
    let dir = TempDir::new().unwrap();

    let report = controller(&server, dir.path(), None, MediaFilter::default(), 1, 0)
        .run(vec![item(&server, 8)])
        .await
        .unwrap();

    assert_eq!(report.remaining_failed(), 1);
    let ledger = ErrorLedger::load(&dir.path().join("errors.csv")).unwrap();
    assert!(ledger.entries()[0].reason.contains("Player_Link"));
}

#[tokio::test]
async fn test_warm_cache_issues_no_fetches() {
    let server = MockServer::start().await;
    for id in 1..=3 {
        mount_book(&server, id, "Cached").await;
    }
    let dir = TempDir::new().unwrap();
    let cache_dir = dir.path().join("cache");
    let items: Vec<_> = (1..=3).map(|id| item(&server, id)).collect();

    let cache = DiskCache::open(&cache_dir).unwrap();
    controller(&server, dir.path(), Some(cache), MediaFilter::default(), 2, 0)
        .run(items.clone())
        .await
        .unwrap();
    assert_eq!(details_requests(&server).await, 3);

    let cache = DiskCache::open(&cache_dir).unwrap();
    let report = controller(&server, dir.path(), Some(cache), MediaFilter::default(), 2, 0)
        .run(items)
        .await
        .unwrap();

    assert_eq!(report.cumulative_successes(), 3);
    assert_eq!(details_requests(&server).await, 3);
}

#[tokio::test]
async fn test_rerun_is_byte_identical() {
    let server = MockServer::start().await;
    for id in [3, 1, 2] {
        mount_book(&server, id, &format!("Book, \"{}\"", id)).await;
    }
    let dir = TempDir::new().unwrap();
    let snapshot = dir.path().join("books.csv");
    let items: Vec<_> = [3, 1, 2].iter().map(|id| item(&server, *id)).collect();

    controller(&server, dir.path(), None, MediaFilter::default(), 2, 0)
        .run(items.clone())
        .await
        .unwrap();
    let first = fs::read(&snapshot).unwrap();

    let report = controller(&server, dir.path(), None, MediaFilter::default(), 2, 0)
        .run(items)
        .await
        .unwrap();
    let second = fs::read(&snapshot).unwrap();

    assert_eq!(report.dataset_rows, 3);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_prior_snapshot_rows_are_kept() {
    let server = MockServer::start().await;
    mount_book(&server, 2, "New").await;
    let dir = TempDir::new().unwrap();

    mount_book(&server, 1, "Old").await;
    controller(&server, dir.path(), None, MediaFilter::default(), 1, 0)
        .run(vec![item(&server, 1)])
        .await
        .unwrap();

    let report = controller(&server, dir.path(), None, MediaFilter::default(), 1, 0)
        .run(vec![item(&server, 2)])
        .await
        .unwrap();

    assert_eq!(report.total_items, 1);
    assert_eq!(report.dataset_rows, 2);
    let records = read_snapshot(&dir.path().join("books.csv")).unwrap();
    assert_eq!(records[&ItemId(1)].title.as_deref(), Some("Old"));
}
