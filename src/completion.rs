use crate::config::CompletionConfig;
use crate::sink::{ReportSink, Severity};
use crate::types::{Completion, CompletionError, CompletionErrorKind, FinishReason};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Seam between the pipeline and the remote completion service.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn call(
        &self,
        prompt: &str,
        max_output_tokens: u32,
        attempt_label: u32,
    ) -> Result<Completion, CompletionError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChatMessage>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: Option<u64>,
    #[serde(default)]
    completion_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

/// One bounded-retry client for the remote completion service. Transport
/// failures and retryable statuses (429/5xx) back off linearly at
/// `backoff_base * (attempt + 1)`; other statuses are classified
/// immediately. Every terminal failure is reported to the sink.
pub struct CompletionClient {
    client: Client,
    config: CompletionConfig,
    sink: Arc<dyn ReportSink>,
    concurrency: Semaphore,
}

impl CompletionClient {
    pub fn new(config: CompletionConfig, sink: Arc<dyn ReportSink>) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");
        let concurrency = Semaphore::new(config.concurrency.max(1));

        Self {
            client,
            config,
            sink,
            concurrency,
        }
    }

    /// `{base}/v1/chat/completions`, or `{base}/chat/completions` when the
    /// base already ends in `/v1`.
    pub fn endpoint(base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{}/chat/completions", base)
        } else {
            format!("{}/v1/chat/completions", base)
        }
    }

    pub async fn call(
        &self,
        prompt: &str,
        max_output_tokens: u32,
        attempt_label: u32,
    ) -> Result<Completion, CompletionError> {
        let _permit = self.concurrency.acquire().await.map_err(|_| {
            CompletionError::new(
                CompletionErrorKind::Transport,
                "Completion client is shut down",
            )
        })?;

        let endpoint = Self::endpoint(&self.config.base_url);
        let body = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: max_output_tokens,
            temperature: self.config.temperature,
        };

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = self.config.backoff_base * attempt;
                warn!(
                    "Retrying completion call (attempt {}/{}) after {:?}",
                    attempt + 1,
                    self.config.max_retries + 1,
                    delay
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self
                .client
                .post(&endpoint)
                .bearer_auth(&self.config.api_key)
                .json(&body)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    if attempt < self.config.max_retries {
                        warn!("Completion transport failure, will retry: {}", e);
                        continue;
                    }
                    return Err(self.transport_error(&e, &endpoint, attempt_label, attempt + 1));
                }
            };

            let status = response.status().as_u16();
            if status == 200 {
                return self.parse_success(response, &endpoint, attempt_label).await;
            }

            let response_body = response.text().await.unwrap_or_default();
            if RETRYABLE_STATUSES.contains(&status) && attempt < self.config.max_retries {
                warn!("Completion call returned HTTP {}, will retry", status);
                continue;
            }
            return Err(self.classify(status, &response_body, &endpoint, attempt_label, attempt + 1));
        }

        // The final loop iteration always returns.
        Err(CompletionError::new(
            CompletionErrorKind::Transport,
            "Completion attempts exhausted",
        ))
    }

    async fn parse_success(
        &self,
        response: reqwest::Response,
        endpoint: &str,
        attempt_label: u32,
    ) -> Result<Completion, CompletionError> {
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                let error = CompletionError::new(
                    CompletionErrorKind::Transport,
                    format!("Failed to read completion response body: {}", e),
                );
                self.report(&error, endpoint, attempt_label, Some(200), None);
                return Err(error);
            }
        };

        let parsed: ChatResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(e) => {
                let error = CompletionError::new(
                    CompletionErrorKind::MalformedResponse,
                    format!("Failed to parse completion response: {}", e),
                );
                self.report(&error, endpoint, attempt_label, Some(200), Some(&body));
                return Err(error);
            }
        };

        let Some(choice) = parsed.choices.first() else {
            let error = CompletionError::new(
                CompletionErrorKind::MalformedResponse,
                "Completion response contains no choices",
            );
            self.report(&error, endpoint, attempt_label, Some(200), Some(&body));
            return Err(error);
        };

        let content = choice
            .message
            .as_ref()
            .map(|m| m.content.clone())
            .or_else(|| choice.text.clone())
            .unwrap_or_default();

        if content.trim().is_empty() {
            let error = CompletionError::new(
                CompletionErrorKind::EmptyContent,
                "Completion service returned no usable content",
            );
            self.report(&error, endpoint, attempt_label, Some(200), Some(&body));
            return Err(error);
        }

        if let Some(usage) = &parsed.usage {
            debug!(
                "Completion usage: prompt_tokens={:?} completion_tokens={:?}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        let finish_reason = FinishReason::parse(choice.finish_reason.as_deref());
        info!(
            "Completion succeeded ({} chars, finish_reason={:?})",
            content.chars().count(),
            finish_reason
        );
        Ok(Completion {
            content,
            finish_reason,
        })
    }

    fn transport_error(
        &self,
        e: &reqwest::Error,
        endpoint: &str,
        attempt_label: u32,
        attempts: u32,
    ) -> CompletionError {
        let error = if e.is_timeout() {
            CompletionError::new(
                CompletionErrorKind::Timeout,
                format!("Completion request timed out after {} attempts", attempts),
            )
        } else if e.is_connect() {
            CompletionError::new(
                CompletionErrorKind::Connection,
                format!(
                    "Could not connect to completion service after {} attempts",
                    attempts
                ),
            )
        } else {
            CompletionError::new(
                CompletionErrorKind::Transport,
                format!("Completion request failed: {}", e),
            )
        };
        self.report(&error, endpoint, attempt_label, None, None);
        error
    }

    /// Classifies a terminal non-2xx response into an actionable error.
    fn classify(
        &self,
        status: u16,
        body: &str,
        endpoint: &str,
        attempt_label: u32,
        attempts: u32,
    ) -> CompletionError {
        let detail: Option<ErrorDetail> = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.error);
        let message = detail
            .as_ref()
            .and_then(|d| d.message.clone())
            .unwrap_or_default();
        let code = detail.as_ref().and_then(|d| d.code.clone()).unwrap_or_default();

        let error = if code == "invalid_api_key" || message.to_lowercase().contains("api key") {
            CompletionError::new(
                CompletionErrorKind::InvalidApiKey,
                "Completion service rejected the API key (invalid or missing)",
            )
        } else if (400..500).contains(&status) {
            CompletionError::new(
                CompletionErrorKind::Rejected(status),
                format!("Completion request rejected with HTTP {}: {}", status, message),
            )
        } else {
            CompletionError::new(
                CompletionErrorKind::ServiceFailure(status),
                format!("Completion call failed with HTTP {} after {} attempts", status, attempts),
            )
        };
        self.report(&error, endpoint, attempt_label, Some(status), Some(body));
        error
    }

    fn report(
        &self,
        error: &CompletionError,
        endpoint: &str,
        attempt_label: u32,
        status: Option<u16>,
        body: Option<&str>,
    ) {
        self.sink.report(
            Severity::Error,
            &error.message,
            json!({
                "endpoint": endpoint,
                "attempt": attempt_label,
                "status": status,
                "body": body,
            }),
        );
    }
}

#[async_trait]
impl CompletionBackend for CompletionClient {
    async fn call(
        &self,
        prompt: &str,
        max_output_tokens: u32,
        attempt_label: u32,
    ) -> Result<Completion, CompletionError> {
        CompletionClient::call(self, prompt, max_output_tokens, attempt_label).await
    }
}
