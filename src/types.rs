use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One normalized feed entry, attributed to the channel it came from.
///
/// Items are immutable after creation; the budgeter produces shortened
/// copies rather than mutating in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewsItem {
    pub source: String,
    pub title: String,
    pub content: String,
    pub link: String,
}

impl NewsItem {
    pub fn with_content(&self, content: String) -> Self {
        Self {
            source: self.source.clone(),
            title: self.title.clone(),
            content,
            link: self.link.clone(),
        }
    }
}

/// Transient record of a single (channel, mirror) attempt, kept only long
/// enough to decide whether the mirror is acceptable.
#[derive(Debug, Clone)]
pub struct MirrorAttempt {
    pub base: String,
    pub status: Option<u16>,
    pub entry_count: usize,
    pub parse_error: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

impl MirrorAttempt {
    /// Acceptance rule: at least one entry, and a 200 or unknown status.
    /// A missing status is treated as acceptable, matching the permissive
    /// behavior of proxies that omit it.
    pub fn is_accepted(&self) -> bool {
        self.entry_count > 0 && matches!(self.status, None | Some(200))
    }
}

/// Why the completion service stopped emitting output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    Other,
}

impl FinishReason {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("stop") => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            _ => FinishReason::Other,
        }
    }
}

/// A successful completion. `content` is guaranteed non-blank; a blank
/// payload is surfaced as `CompletionErrorKind::EmptyContent` instead.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionErrorKind {
    /// Request deadline elapsed, retries exhausted.
    Timeout,
    /// Could not reach the service at all.
    Connection,
    /// Other transport-level failure.
    Transport,
    /// The service rejected the configured API key.
    InvalidApiKey,
    /// Non-retryable 4xx response.
    Rejected(u16),
    /// 5xx (or retryable status) after retries were exhausted.
    ServiceFailure(u16),
    /// HTTP success but the payload held no usable text.
    EmptyContent,
    /// Response body did not match the expected shape.
    MalformedResponse,
}

/// Tagged failure from the completion client. Callers can always tell a
/// diagnostic apart from model output.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct CompletionError {
    pub kind: CompletionErrorKind,
    pub message: String,
}

impl CompletionError {
    pub fn new(kind: CompletionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, DigestError>;

/// Truncate to at most `max` characters, respecting char boundaries.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}
