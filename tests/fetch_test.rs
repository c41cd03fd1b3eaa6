mod common;

use channel_digest::config::{BudgetConfig, GatewayConfig};
use channel_digest::sink::{RecordingSink, Severity};
use channel_digest::{ChannelFetcher, FetchOrchestrator};
use common::rss_feed;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

fn gateway(base: String, fallbacks: Vec<String>) -> GatewayConfig {
    GatewayConfig {
        base_url: base,
        fallbacks,
        timeout: Duration::from_secs(5),
        ..GatewayConfig::default()
    }
}

fn fetcher(config: GatewayConfig, sink: Arc<RecordingSink>) -> ChannelFetcher {
    ChannelFetcher::new(config, &BudgetConfig::default(), sink)
}

/// Reserve a port that refuses connections.
async fn refused_base() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

#[tokio::test]
async fn fallback_mirror_wins_when_primary_returns_503() {
    let mut primary = mockito::Server::new_async().await;
    let mut fallback = mockito::Server::new_async().await;

    let primary_mock = primary
        .mock("GET", "/telegram/channel/technews")
        .with_status(503)
        .create_async()
        .await;
    let fallback_mock = fallback
        .mock("GET", "/telegram/channel/technews")
        .with_status(200)
        .with_body(rss_feed("technews", 5))
        .create_async()
        .await;

    let sink = Arc::new(RecordingSink::new());
    let fetcher = fetcher(gateway(primary.url(), vec![fallback.url()]), sink.clone());

    let items = fetcher.fetch("technews", 5).await;

    assert_eq!(items.len(), 5);
    assert!(items.iter().all(|i| i.source == "technews"));
    assert!(sink.is_empty(), "no error surfaces when a fallback succeeds");
    primary_mock.assert_async().await;
    fallback_mock.assert_async().await;
}

#[tokio::test]
async fn fallback_mirror_wins_when_primary_feed_is_empty() {
    let mut primary = mockito::Server::new_async().await;
    let mut fallback = mockito::Server::new_async().await;

    primary
        .mock("GET", "/telegram/channel/technews")
        .with_status(200)
        .with_body(rss_feed("technews", 0))
        .create_async()
        .await;
    fallback
        .mock("GET", "/telegram/channel/technews")
        .with_status(200)
        .with_body(rss_feed("technews", 3))
        .create_async()
        .await;

    let sink = Arc::new(RecordingSink::new());
    let fetcher = fetcher(gateway(primary.url(), vec![fallback.url()]), sink.clone());

    let items = fetcher.fetch("technews", 5).await;
    assert_eq!(items.len(), 3);
    assert!(sink.is_empty());
}

#[tokio::test]
async fn exhausted_mirrors_yield_empty_batch_and_one_report() {
    let sink = Arc::new(RecordingSink::new());
    let config = gateway(refused_base().await, vec![refused_base().await]);
    let fetcher = fetcher(config, sink.clone());

    let items = fetcher.fetch("technews", 5).await;

    assert!(items.is_empty());
    let reports = sink.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].0, Severity::Error);
    assert_eq!(reports[0].2["channel_id"], "technews");
}

#[tokio::test]
async fn one_failing_channel_does_not_abort_siblings() {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("GET", "/telegram/channel/alpha")
        .with_status(200)
        .with_body(rss_feed("alpha", 2))
        .create_async()
        .await;
    server
        .mock("GET", "/telegram/channel/beta")
        .with_status(200)
        .with_body(rss_feed("beta", 1))
        .create_async()
        .await;
    server
        .mock("GET", "/telegram/channel/gamma")
        .with_status(500)
        .create_async()
        .await;

    let sink = Arc::new(RecordingSink::new());
    let fetcher = Arc::new(fetcher(gateway(server.url(), Vec::new()), sink.clone()));
    let orchestrator = FetchOrchestrator::new(fetcher, 5);

    let channels: Vec<String> = ["alpha", "beta", "gamma"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let batch = orchestrator.fetch_all(&channels, 5).await;

    assert_eq!(batch.len(), 3);
    assert_eq!(batch.iter().filter(|i| i.source == "alpha").count(), 2);
    assert_eq!(batch.iter().filter(|i| i.source == "beta").count(), 1);
    assert_eq!(sink.len(), 1, "exactly one failure reported");
    assert_eq!(sink.reports()[0].2["channel_id"], "gamma");
}

#[tokio::test]
async fn empty_channel_list_issues_no_requests() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", mockito::Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let sink = Arc::new(RecordingSink::new());
    let fetcher = Arc::new(fetcher(gateway(server.url(), Vec::new()), sink.clone()));
    let orchestrator = FetchOrchestrator::new(fetcher, 5);

    let batch = orchestrator.fetch_all(&[], 5).await;

    assert!(batch.is_empty());
    assert!(sink.is_empty());
    mock.assert_async().await;
}

#[tokio::test]
async fn limit_bounds_items_per_channel() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/telegram/channel/alpha")
        .with_status(200)
        .with_body(rss_feed("alpha", 10))
        .create_async()
        .await;

    let sink = Arc::new(RecordingSink::new());
    let fetcher = fetcher(gateway(server.url(), Vec::new()), sink);

    let items = fetcher.fetch("alpha", 4).await;
    assert_eq!(items.len(), 4);
    assert_eq!(items[0].title, "alpha story 0");
    assert_eq!(items[0].link, "https://t.me/alpha/0");
    assert!(!items[0].content.is_empty());
}
