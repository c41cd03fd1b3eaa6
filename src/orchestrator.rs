use crate::fetcher::ChannelFetcher;
use crate::types::NewsItem;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info};

/// Fans a set of channels out to the fetcher concurrently and merges the
/// results as they arrive. One channel failing (it then contributes zero
/// items) never aborts its siblings, and arrival order is irrelevant to
/// downstream consumers.
pub struct FetchOrchestrator {
    fetcher: Arc<ChannelFetcher>,
    fetch_concurrency: usize,
}

impl FetchOrchestrator {
    pub fn new(fetcher: Arc<ChannelFetcher>, fetch_concurrency: usize) -> Self {
        Self {
            fetcher,
            fetch_concurrency: fetch_concurrency.max(1),
        }
    }

    pub async fn fetch_all(&self, channel_ids: &[String], limit_per_channel: usize) -> Vec<NewsItem> {
        if channel_ids.is_empty() {
            debug!("No channels subscribed, skipping fetch round");
            return Vec::new();
        }

        let concurrency = self.fetch_concurrency.min(channel_ids.len());
        let fetcher = self.fetcher.clone();

        let batches: Vec<Vec<NewsItem>> = stream::iter(channel_ids.iter().cloned())
            .map(|channel_id| {
                let fetcher = fetcher.clone();
                async move { fetcher.fetch(&channel_id, limit_per_channel).await }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let items: Vec<NewsItem> = batches.into_iter().flatten().collect();
        info!(
            "Fetch round collected {} items from {} channels",
            items.len(),
            channel_ids.len()
        );
        items
    }
}
