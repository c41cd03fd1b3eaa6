use crate::config::{BudgetConfig, GatewayConfig};
use crate::resolver::MirrorResolver;
use crate::sink::{ReportSink, Severity};
use crate::types::{truncate_chars, NewsItem};
use feed_rs::model::Entry;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

/// Fetches one channel's feed through the mirror resolver and normalizes
/// entries into news items. Partial-source failure never propagates: any
/// failure yields an empty batch after a sink report.
pub struct ChannelFetcher {
    resolver: MirrorResolver,
    per_article_chars: usize,
    sink: Arc<dyn ReportSink>,
}

impl ChannelFetcher {
    pub fn new(gateway: GatewayConfig, budget: &BudgetConfig, sink: Arc<dyn ReportSink>) -> Self {
        Self {
            resolver: MirrorResolver::new(gateway),
            per_article_chars: budget.per_article_chars,
            sink,
        }
    }

    pub async fn fetch(&self, channel_id: &str, limit: usize) -> Vec<NewsItem> {
        let resolved = match self.resolver.resolve(channel_id).await {
            Some(resolved) => resolved,
            None => {
                self.sink.report(
                    Severity::Error,
                    "All feed gateways exhausted for channel",
                    json!({
                        "channel_id": channel_id,
                        "bases": self.resolver.bases(),
                    }),
                );
                return Vec::new();
            }
        };

        let mut items = Vec::new();
        for entry in resolved.feed.entries.into_iter().take(limit) {
            match self.normalize(channel_id, entry) {
                Some(item) => items.push(item),
                None => {
                    self.sink.report(
                        Severity::Warning,
                        "Skipping malformed feed entry",
                        json!({
                            "channel_id": channel_id,
                            "base": resolved.base,
                        }),
                    );
                }
            }
        }

        info!(
            "Fetched {} items for channel {} via {}",
            items.len(),
            channel_id,
            resolved.base
        );
        items
    }

    /// Maps a feed entry to a news item. Missing fields default to empty
    /// strings; an entry with nothing usable at all is dropped.
    fn normalize(&self, channel_id: &str, entry: Entry) -> Option<NewsItem> {
        let title = entry.title.map(|t| t.content).unwrap_or_default();
        let content = entry.summary.map(|s| s.content).unwrap_or_default();
        let link = entry
            .links
            .first()
            .map(|l| l.href.clone())
            .unwrap_or_default();

        if title.is_empty() && content.is_empty() && link.is_empty() {
            debug!("Entry from {} carries no usable fields", channel_id);
            return None;
        }

        Some(NewsItem {
            source: channel_id.to_string(),
            title,
            content: truncate_chars(&content, self.per_article_chars),
            link,
        })
    }
}
