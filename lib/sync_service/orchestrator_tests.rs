use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::Error;
use super::test_support::{
    category, stream, stream_info, test_update_config, MockCatalog, MockSink, Scripted,
};
use super::types::StreamStage;
use super::VodUpdateOrchestrator;
use crate::provider_client::ProviderClientErr;
use crate::server::monitoring::SyncMetrics;

#[tokio::test(start_paused = true)]
async fn failing_category_does_not_block_healthy_one() {
    let catalog = Arc::new(
        MockCatalog::new(Scripted::Body(vec![
            category("1", "Action"),
            category("2", "Drama"),
        ]))
        .with_streams("1", vec![Scripted::Body(vec![stream(json!(10), "Matrix")])])
        .with_streams("2", vec![Scripted::Status(500)])
        .with_info("10", stream_info(json!("10"), "Matrix", "Neo wakes up.")),
    );
    let sink = Arc::new(MockSink::default());
    let orchestrator = VodUpdateOrchestrator::new(
        Arc::clone(&catalog),
        Arc::clone(&sink),
        test_update_config(16, 3),
    );

    let started = Instant::now();
    let summary = orchestrator.run().await.expect("run should succeed");

    assert_eq!(summary.categories_listed, 2);
    assert_eq!(summary.outcomes.len(), 2);
    assert!(summary.outcome_for("1").expect("category 1").is_success());

    let failed = summary.outcome_for("2").expect("category 2");
    match failed.error.as_ref().expect("category 2 should fail") {
        Error::RetriesExhausted {
            category_id,
            attempts,
            last_error,
        } => {
            assert_eq!(category_id, "2");
            assert_eq!(*attempts, 3);
            assert!(matches!(
                last_error,
                ProviderClientErr::UnexpectedStatus { status: 500, .. }
            ));
        }
        other => panic!("unexpected category error: {other:?}"),
    }

    assert_eq!(catalog.list_calls_for("1"), 1);
    assert_eq!(catalog.list_calls_for("2"), 3);
    assert_eq!(sink.calls(), 1);
    let added = sink.added();
    assert_eq!(added[0].stream_id, "10");
    assert_eq!(added[0].title, "Matrix");
    assert_eq!(added[0].plot, "Neo wakes up.");
    assert_eq!(added[0].rating, "7.5");
    assert_eq!(summary.records_indexed, 1);
    // Two 3 s pauses between the three failed listings, none after the last.
    assert_eq!(started.elapsed(), Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn listing_recovers_on_third_attempt() {
    let catalog = Arc::new(
        MockCatalog::new(Scripted::Body(vec![category("7", "Docs")]))
            .with_streams(
                "7",
                vec![
                    Scripted::Status(502),
                    Scripted::Status(503),
                    Scripted::Body(vec![stream(json!("70"), "Planet")]),
                ],
            )
            .with_info("70", stream_info(json!("70"), "Planet", "Earth.")),
    );
    let sink = Arc::new(MockSink::default());
    let orchestrator =
        VodUpdateOrchestrator::new(Arc::clone(&catalog), Arc::clone(&sink), test_update_config(4, 3));

    let summary = orchestrator.run().await.expect("run should succeed");

    assert!(summary.outcome_for("7").expect("category 7").is_success());
    assert_eq!(catalog.list_calls_for("7"), 3);
    assert_eq!(sink.added_ids(), vec!["70".to_string()]);
}

#[tokio::test]
async fn malformed_categories_are_skipped_before_dispatch() {
    let catalog = Arc::new(
        MockCatalog::new(Scripted::Body(vec![
            category("1", "Action"),
            json!({ "category_id": 5, "category_name": "Numeric id" }),
            json!({ "category_name": "No id" }),
            json!({ "category_id": "9", "category_name": null }),
        ]))
        .with_streams("1", vec![Scripted::Body(Vec::new())]),
    );
    let sink = Arc::new(MockSink::default());
    let orchestrator =
        VodUpdateOrchestrator::new(Arc::clone(&catalog), Arc::clone(&sink), test_update_config(4, 1));

    let summary = orchestrator.run().await.expect("run should succeed");

    assert_eq!(summary.categories_listed, 4);
    assert_eq!(summary.skipped_categories.len(), 3);
    assert_eq!(summary.outcomes.len(), 1);
    assert!(summary.outcome_for("1").expect("category 1").is_success());
    assert_eq!(catalog.list_calls_for("5"), 0);
    assert_eq!(catalog.list_calls_for("9"), 0);
    assert_eq!(sink.calls(), 0);
}

#[tokio::test]
async fn stream_level_failures_skip_only_that_stream() {
    let catalog = Arc::new(
        MockCatalog::new(Scripted::Body(vec![category("3", "Sci-Fi")]))
            .with_streams(
                "3",
                vec![Scripted::Body(vec![
                    stream(json!(1), "Alien"),
                    stream(json!({ "nested": true }), "Broken id"),
                    stream(json!(3), "No info"),
                    stream(json!(4), "No movie data"),
                    stream(json!(5), "Rejected"),
                    stream(json!("6"), "Dune"),
                ])],
            )
            .with_info("1", stream_info(json!(1), "Alien", "In space."))
            .with_info("4", json!({ "info": { "plot": "orphan" } }))
            .with_info("5", stream_info(json!(5), "Rejected", "Never indexed."))
            .with_info("6", stream_info(json!("6"), "Dune", "Spice.")),
    );
    let sink = Arc::new(MockSink::rejecting(&["5"]));
    let orchestrator =
        VodUpdateOrchestrator::new(Arc::clone(&catalog), Arc::clone(&sink), test_update_config(4, 3));

    let summary = orchestrator.run().await.expect("run should succeed");

    assert!(summary.outcome_for("3").expect("category 3").is_success());
    assert_eq!(summary.records_indexed, 2);
    assert_eq!(sink.added_ids(), vec!["1".to_string(), "6".to_string()]);

    let stages: Vec<(String, StreamStage)> = summary
        .stream_failures
        .iter()
        .map(|failure| (failure.stream_ref.clone(), failure.stage))
        .collect();
    assert_eq!(
        stages,
        vec![
            (r#"{"nested":true}"#.to_string(), StreamStage::Identify),
            ("3".to_string(), StreamStage::FetchInfo),
            ("4".to_string(), StreamStage::Normalize),
            ("5".to_string(), StreamStage::Index),
        ]
    );
    // The malformed id never reaches the info endpoint.
    assert_eq!(catalog.info_calls(), 5);
}

#[tokio::test]
async fn category_fetch_failure_aborts_the_run() {
    let catalog = Arc::new(MockCatalog::new(Scripted::Status(503)));
    let sink = Arc::new(MockSink::default());
    let orchestrator =
        VodUpdateOrchestrator::new(Arc::clone(&catalog), Arc::clone(&sink), test_update_config(4, 3));

    let err = orchestrator
        .run()
        .await
        .expect_err("category fetch failure must be fatal");

    assert!(matches!(
        err,
        Error::Provider(ProviderClientErr::UnexpectedStatus { status: 503, .. })
    ));
    assert_eq!(sink.calls(), 0);
}

#[tokio::test]
async fn empty_catalog_succeeds_without_work() {
    let catalog = Arc::new(MockCatalog::new(Scripted::Body(Vec::new())));
    let sink = Arc::new(MockSink::default());
    let orchestrator =
        VodUpdateOrchestrator::new(Arc::clone(&catalog), Arc::clone(&sink), test_update_config(4, 3));

    let summary = orchestrator.run().await.expect("run should succeed");

    assert_eq!(summary.categories_listed, 0);
    assert!(summary.outcomes.is_empty());
    assert_eq!(sink.calls(), 0);
}

#[tokio::test]
async fn rerun_sends_the_same_records() {
    let catalog = Arc::new(
        MockCatalog::new(Scripted::Body(vec![category("1", "Action")]))
            .with_streams(
                "1",
                vec![Scripted::Body(vec![
                    stream(json!(10), "Matrix"),
                    stream(json!(11), "Heat"),
                ])],
            )
            .with_info("10", stream_info(json!(10), "Matrix", "Neo."))
            .with_info("11", stream_info(json!(11), "Heat", "LA.")),
    );
    let sink = Arc::new(MockSink::default());
    let orchestrator =
        VodUpdateOrchestrator::new(Arc::clone(&catalog), Arc::clone(&sink), test_update_config(4, 3));

    orchestrator.run().await.expect("first run should succeed");
    let first = sink.added();
    orchestrator.run().await.expect("second run should succeed");
    let all = sink.added();

    assert_eq!(first.len(), 2);
    assert_eq!(all.len(), 4);
    assert_eq!(&all[..2], &all[2..]);
}

#[tokio::test]
async fn mismatched_stream_id_is_still_indexed() {
    let catalog = Arc::new(
        MockCatalog::new(Scripted::Body(vec![category("1", "Action")]))
            .with_streams("1", vec![Scripted::Body(vec![stream(json!(10), "Matrix")])])
            .with_info("10", stream_info(json!(99), "Matrix", "Neo.")),
    );
    let sink = Arc::new(MockSink::default());
    let orchestrator =
        VodUpdateOrchestrator::new(Arc::clone(&catalog), Arc::clone(&sink), test_update_config(4, 3));

    let summary = orchestrator.run().await.expect("run should succeed");

    assert_eq!(summary.records_indexed, 1);
    assert_eq!(sink.added_ids(), vec!["99".to_string()]);
}

#[tokio::test]
async fn cancellation_stops_workers_between_streams() {
    let token = CancellationToken::new();
    let catalog = Arc::new(
        MockCatalog::new(Scripted::Body(vec![category("1", "Action")]))
            .with_streams(
                "1",
                vec![Scripted::Body(vec![
                    stream(json!(10), "Matrix"),
                    stream(json!(11), "Heat"),
                    stream(json!(12), "Ronin"),
                ])],
            )
            .with_info("10", stream_info(json!(10), "Matrix", "Neo."))
            .with_info("11", stream_info(json!(11), "Heat", "LA."))
            .with_info("12", stream_info(json!(12), "Ronin", "Paris.")),
    );
    let sink = Arc::new(MockSink::cancelling(token.clone()));
    let orchestrator =
        VodUpdateOrchestrator::new(Arc::clone(&catalog), Arc::clone(&sink), test_update_config(4, 3))
            .with_cancellation(token);

    let summary = orchestrator.run().await.expect("run should still report");

    assert_eq!(sink.calls(), 1);
    let outcome = summary.outcome_for("1").expect("category 1");
    assert!(matches!(
        outcome.error,
        Some(Error::Cancelled { ref category_id }) if category_id == "1"
    ));
}

#[tokio::test]
async fn cancelled_before_start_skips_listing() {
    let token = CancellationToken::new();
    token.cancel();
    let catalog = Arc::new(
        MockCatalog::new(Scripted::Body(vec![category("1", "Action")]))
            .with_streams("1", vec![Scripted::Body(Vec::new())]),
    );
    let orchestrator =
        VodUpdateOrchestrator::new(Arc::clone(&catalog), MockSink::default(), test_update_config(4, 3))
            .with_cancellation(token);

    let summary = orchestrator.run().await.expect("run should still report");

    assert_eq!(catalog.list_calls_for("1"), 0);
    assert_eq!(summary.failed_categories(), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_workers_respect_the_bound() {
    let ids = ["1", "2", "3", "4", "5"];
    let mut catalog = MockCatalog::new(Scripted::Body(
        ids.iter().map(|id| category(id, "Bulk")).collect(),
    ))
    .with_list_delay(Duration::from_secs(1));
    for id in ids {
        catalog = catalog.with_streams(id, vec![Scripted::Body(Vec::new())]);
    }
    let catalog = Arc::new(catalog);
    let orchestrator =
        VodUpdateOrchestrator::new(Arc::clone(&catalog), MockSink::default(), test_update_config(2, 1));

    let started = Instant::now();
    let summary = orchestrator.run().await.expect("run should succeed");

    assert_eq!(summary.succeeded_categories(), 5);
    assert_eq!(catalog.peak_in_flight(), 2);
    // Five one-second listings through two slots.
    assert_eq!(started.elapsed(), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn run_counts_dispatch_failures_and_retries() {
    let catalog = MockCatalog::new(Scripted::Body(vec![
        category("1", "Action"),
        category("2", "Drama"),
    ]))
    .with_streams("1", vec![Scripted::Body(vec![stream(json!(10), "Matrix")])])
    .with_streams("2", vec![Scripted::Status(500)])
    .with_info("10", stream_info(json!("10"), "Matrix", "Neo wakes up."));
    let metrics = SyncMetrics::default();
    let orchestrator =
        VodUpdateOrchestrator::new(catalog, MockSink::default(), test_update_config(16, 3))
            .with_metrics(metrics.clone());

    orchestrator.run().await.expect("run should succeed");

    assert_eq!(metrics.categories_dispatched.get(), 2);
    assert_eq!(metrics.categories_failed.get(), 1);
    assert_eq!(metrics.stream_list_retries.get(), 2);
    assert_eq!(metrics.streams_indexed.get(), 1);
    assert_eq!(metrics.stream_failures.get(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_cuts_the_retry_delay_short() {
    let token = CancellationToken::new();
    let catalog = Arc::new(
        MockCatalog::new(Scripted::Body(vec![category("2", "Drama")]))
            .with_streams("2", vec![Scripted::Status(500)]),
    );
    let orchestrator =
        VodUpdateOrchestrator::new(Arc::clone(&catalog), MockSink::default(), test_update_config(4, 3))
            .with_cancellation(token.clone());

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let summary = orchestrator.run().await.expect("run should still report");

    assert_eq!(catalog.list_calls_for("2"), 1);
    assert_eq!(started.elapsed(), Duration::from_secs(1));
    assert_eq!(summary.cancelled_categories(), 1);
    assert_eq!(summary.failed_categories(), 1);
    assert!(matches!(
        summary.outcome_for("2").expect("category 2").error,
        Some(Error::Cancelled { ref category_id }) if category_id == "2"
    ));
}
