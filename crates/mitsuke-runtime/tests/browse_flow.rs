mod common;

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use common::{anime, harness, harness_with_config, user, FakeBackend, FakeCatalog};
use mitsuke_api::traits::AnimeType;
use mitsuke_core::config::AppConfig;
use mitsuke_core::fetch::FetchOutcome;
use mitsuke_core::scope::Scoped;
use mitsuke_runtime::{feedback, RuntimeError};

#[tokio::test(start_paused = true)]
async fn test_blank_search_is_rejected_without_request() {
    let h = harness(FakeCatalog::new(), FakeBackend::new());
    let err = h
        .runtime
        .search("   ", 1, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Validation(ref m) if m == "Please enter a search term."));
    assert_eq!(h.catalog.searches(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_search_returns_matches() {
    let catalog = FakeCatalog::new();
    catalog.insert(anime(1, "Cowboy Bebop", Some(26)));
    catalog.insert(anime(2, "Mushishi", Some(26)));
    let h = harness(catalog, FakeBackend::new());

    let outcome = h
        .runtime
        .search("bebop", 1, &CancellationToken::new())
        .await
        .unwrap();
    let page = outcome.ready().expect("search should succeed");
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].mal_id, 1);
}

#[tokio::test(start_paused = true)]
async fn test_search_without_matches_reads_as_no_results() {
    let catalog = FakeCatalog::new();
    catalog.insert(anime(1, "Cowboy Bebop", Some(26)));
    let h = harness(catalog, FakeBackend::new());

    let outcome = h
        .runtime
        .search("zzz", 1, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, FetchOutcome::NotFound);
    assert_eq!(feedback::outcome_message(&outcome), Some(feedback::NO_RESULTS));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_search_retries_then_reports() {
    let catalog = FakeCatalog::new();
    catalog.fail_search(429);
    let config = AppConfig::from_overrides("[fetch]\nmax_attempts = 3\nbase_delay_ms = 100\n").unwrap();
    let h = harness_with_config(catalog, FakeBackend::new(), config);

    let start = Instant::now();
    let outcome = h
        .runtime
        .search("bebop", 1, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, FetchOutcome::RateLimited);
    assert_eq!(h.catalog.searches(), 3);
    assert_eq!(start.elapsed(), Duration::from_millis(700));
    assert_eq!(
        feedback::outcome_message(&outcome),
        Some("Rate limit exceeded. Please wait a moment and try again.")
    );
}

#[tokio::test(start_paused = true)]
async fn test_missing_search_endpoint_is_not_retried() {
    let catalog = FakeCatalog::new();
    catalog.fail_search(404);
    let h = harness(catalog, FakeBackend::new());

    let outcome = h
        .runtime
        .search("bebop", 1, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, FetchOutcome::NotFound);
    assert_eq!(h.catalog.searches(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_genre_filter_needs_a_genre() {
    let h = harness(FakeCatalog::new(), FakeBackend::new());
    let err = h
        .runtime
        .by_genres(&[], &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Validation(_)));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_browse_is_silent() {
    let catalog = FakeCatalog::with_delay(Duration::from_millis(200));
    catalog.insert(anime(1, "Cowboy Bebop", Some(26)));
    let h = harness(catalog, FakeBackend::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = h.runtime.top_anime(&cancel).await;
    assert_eq!(outcome, FetchOutcome::Cancelled);
    assert_eq!(feedback::outcome_message(&outcome), None);
}

#[tokio::test(start_paused = true)]
async fn test_details_mirror_catalog_item_once() {
    let catalog = FakeCatalog::new();
    let mut fma = anime(5114, "Hagane no Renkinjutsushi", Some(64));
    fma.title_english = Some("Fullmetal Alchemist: Brotherhood".into());
    fma.media_type = Some("Special".into());
    catalog.insert(fma);
    let h = harness(catalog, FakeBackend::new());
    let cancel = CancellationToken::new();

    let Scoped::Done(details) = h.runtime.details(5114, &cancel).await.unwrap() else {
        panic!("details were cancelled");
    };
    assert_eq!(details.local.name, "Fullmetal Alchemist: Brotherhood");
    assert_eq!(details.local.anime_type, AnimeType::Special);
    assert_eq!(details.local.episodes, 64);

    h.runtime.details(5114, &cancel).await.unwrap();
    assert_eq!(h.backend.created_local().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_details_of_unknown_anime() {
    let h = harness(FakeCatalog::new(), FakeBackend::new());
    let err = h
        .runtime
        .details(1, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::NotFound));
    assert!(h.backend.created_local().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_recommendations_keep_order_and_drop_failures() {
    let catalog = FakeCatalog::new();
    for id in [2, 3, 4, 5, 6, 7] {
        catalog.insert(anime(id, &format!("Anime {id}"), Some(12)));
    }
    catalog.fail(4, 500);
    let backend = FakeBackend::new();
    backend.set_recommendations(vec![3, 1, 2, 4, 5, 6, 7]);
    let config =
        AppConfig::from_overrides("[fetch]\nmax_attempts = 1\ninter_batch_delay_ms = 400\n").unwrap();
    let h = harness_with_config(catalog, backend, config);
    h.runtime.session().login("jwt-7".into(), user(7)).unwrap();

    let start = Instant::now();
    let Scoped::Done(recs) = h
        .runtime
        .recommendations(true, &CancellationToken::new())
        .await
        .unwrap()
    else {
        panic!("recommendations were cancelled");
    };

    let ids: Vec<u64> = recs.iter().map(|a| a.mal_id).collect();
    assert_eq!(ids, vec![3, 2, 5, 6, 7]);
    assert!(start.elapsed() >= Duration::from_millis(400));
}

#[tokio::test(start_paused = true)]
async fn test_recommendations_require_login() {
    let h = harness(FakeCatalog::new(), FakeBackend::new());
    let err = h
        .runtime
        .recommendations(false, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::NotLoggedIn));
}
