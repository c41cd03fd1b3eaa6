use crate::config::GatewayConfig;
use crate::types::MirrorAttempt;
use chrono::Utc;
use feed_rs::model::Feed;
use reqwest::Client;
use tracing::{debug, info, warn};

/// Resolution progress across the ordered mirror list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorState {
    Trying(usize),
    Accepted(usize),
    Exhausted,
}

impl MirrorState {
    pub fn advance(self, accepted: bool, mirror_count: usize) -> Self {
        match self {
            MirrorState::Trying(i) if accepted => MirrorState::Accepted(i),
            MirrorState::Trying(i) if i + 1 < mirror_count => MirrorState::Trying(i + 1),
            MirrorState::Trying(_) => MirrorState::Exhausted,
            other => other,
        }
    }
}

/// A feed accepted from one of the gateways.
#[derive(Debug)]
pub struct ResolvedFeed {
    pub base: String,
    pub feed: Feed,
}

/// Tries the primary gateway and then each fallback in order until one
/// yields a usable feed for the channel. Mirror fallback substitutes for
/// retry: a base is attempted exactly once per resolution.
pub struct MirrorResolver {
    client: Client,
    config: GatewayConfig,
}

impl MirrorResolver {
    pub fn new(config: GatewayConfig) -> Self {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    pub fn feed_url(base: &str, channel_id: &str) -> String {
        format!("{}/telegram/channel/{}", base.trim_end_matches('/'), channel_id)
    }

    pub fn bases(&self) -> Vec<String> {
        std::iter::once(self.config.base_url.clone())
            .chain(self.config.fallbacks.iter().cloned())
            .collect()
    }

    pub async fn resolve(&self, channel_id: &str) -> Option<ResolvedFeed> {
        let bases = self.bases();
        let mut state = MirrorState::Trying(0);
        let mut accepted_feed = None;

        loop {
            match state {
                MirrorState::Trying(i) => {
                    let base = &bases[i];
                    let (attempt, feed) = self.attempt(base, channel_id).await;
                    debug!(
                        "Mirror try at {}: base={} channel={} status={:?} entries={}",
                        attempt.attempted_at, base, channel_id, attempt.status, attempt.entry_count
                    );
                    let accepted = attempt.is_accepted();
                    if accepted {
                        accepted_feed = feed.map(|feed| ResolvedFeed {
                            base: base.clone(),
                            feed,
                        });
                    } else if let Some(err) = &attempt.parse_error {
                        warn!(
                            "Mirror rejected: base={} channel={} err={}",
                            base, channel_id, err
                        );
                    } else {
                        debug!(
                            "No usable entries from {}, trying next base if available",
                            Self::feed_url(base, channel_id)
                        );
                    }
                    state = state.advance(accepted, bases.len());
                }
                MirrorState::Accepted(i) => {
                    let resolved = accepted_feed?;
                    info!(
                        "Using gateway {} for channel {} (entries={})",
                        bases[i],
                        channel_id,
                        resolved.feed.entries.len()
                    );
                    return Some(resolved);
                }
                MirrorState::Exhausted => {
                    warn!(
                        "All {} gateways exhausted for channel {}",
                        bases.len(),
                        channel_id
                    );
                    return None;
                }
            }
        }
    }

    async fn attempt(&self, base: &str, channel_id: &str) -> (MirrorAttempt, Option<Feed>) {
        let url = Self::feed_url(base, channel_id);
        let attempted_at = Utc::now();

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                return (
                    MirrorAttempt {
                        base: base.to_string(),
                        status: None,
                        entry_count: 0,
                        parse_error: Some(e.to_string()),
                        attempted_at,
                    },
                    None,
                );
            }
        };

        let status = Some(response.status().as_u16());
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                return (
                    MirrorAttempt {
                        base: base.to_string(),
                        status,
                        entry_count: 0,
                        parse_error: Some(e.to_string()),
                        attempted_at,
                    },
                    None,
                );
            }
        };

        match feed_rs::parser::parse(bytes.as_ref()) {
            Ok(feed) => (
                MirrorAttempt {
                    base: base.to_string(),
                    status,
                    entry_count: feed.entries.len(),
                    parse_error: None,
                    attempted_at,
                },
                Some(feed),
            ),
            Err(e) => (
                MirrorAttempt {
                    base: base.to_string(),
                    status,
                    entry_count: 0,
                    parse_error: Some(e.to_string()),
                    attempted_at,
                },
                None,
            ),
        }
    }
}
