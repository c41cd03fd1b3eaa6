use crate::budget::{frame_item, ContentBudgeter};
use crate::completion::CompletionBackend;
use crate::config::{BudgetConfig, CompletionConfig};
use crate::types::{Completion, CompletionErrorKind, FinishReason, NewsItem};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Returned when a digest round fetched nothing from any channel.
pub const NO_NEWS_MESSAGE: &str = "No new information was fetched from any subscribed channel.";

/// Returned when every completion path yielded nothing usable.
pub const NO_CONTENT_MESSAGE: &str = "The completion service returned no usable content.";

/// Picks up a completion that was cut off by the output-length limit and
/// asks the service to resume it once. A continuation failure is not an
/// error: the original partial content is returned as-is.
pub struct ContinuationController {
    client: Arc<dyn CompletionBackend>,
    continuation_tokens: u32,
}

impl ContinuationController {
    pub fn new(client: Arc<dyn CompletionBackend>, continuation_tokens: u32) -> Self {
        Self {
            client,
            continuation_tokens,
        }
    }

    pub async fn resume(&self, original: Completion) -> String {
        if original.finish_reason != FinishReason::Length || original.content.is_empty() {
            return original.content;
        }

        let prompt = format!(
            "Your previous answer was cut off before completion. \
             Here is what you wrote so far:\n\n{}\n\n\
             Continue from exactly where it stops. Do not repeat earlier text.",
            original.content
        );

        match self.client.call(&prompt, self.continuation_tokens, 2).await {
            Ok(continuation) => {
                info!(
                    "Continuation appended {} chars",
                    continuation.content.chars().count()
                );
                format!("{}\n\n{}", original.content, continuation.content)
            }
            Err(e) => {
                warn!("Continuation failed, keeping partial content: {}", e);
                original.content
            }
        }
    }
}

/// Sequences budgeting, prompt construction, the completion call,
/// continuation handling, and the aggressive re-truncation fallback. All
/// failure states are encoded in the returned string; `summarize` never
/// errors.
pub struct SummaryPipeline {
    budgeter: ContentBudgeter,
    client: Arc<dyn CompletionBackend>,
    continuation: ContinuationController,
    budget: BudgetConfig,
    max_output_tokens: u32,
}

impl SummaryPipeline {
    pub fn new(
        budget: BudgetConfig,
        completion: &CompletionConfig,
        client: Arc<dyn CompletionBackend>,
    ) -> Self {
        let continuation =
            ContinuationController::new(client.clone(), completion.continuation_tokens);
        Self {
            budgeter: ContentBudgeter::new(&budget),
            client,
            continuation,
            budget,
            max_output_tokens: completion.max_output_tokens,
        }
    }

    pub async fn summarize(&self, items: &[NewsItem]) -> String {
        if items.is_empty() {
            info!("Empty batch, short-circuiting before any completion call");
            return NO_NEWS_MESSAGE.to_string();
        }

        let request_id = Uuid::new_v4();
        let input_budget = self
            .budget
            .context_chars
            .saturating_sub(self.budget.reserve_chars);

        let truncated = self.budgeter.truncate(items, input_budget);
        let prompt = build_digest_prompt(&truncated);
        let prompt_chars = prompt.chars().count();
        info!(
            "Digest request {}: {} items, prompt {} chars (est. {} tokens)",
            request_id,
            truncated.len(),
            prompt_chars,
            prompt_chars / 4
        );

        let threshold = (self.budget.retrunc_threshold * self.budget.context_chars as f64) as usize;
        match self.client.call(&prompt, self.max_output_tokens, 1).await {
            Ok(completion) if completion.finish_reason == FinishReason::Length => {
                info!("Digest request {} hit the output limit, continuing", request_id);
                self.continuation.resume(completion).await
            }
            Ok(completion) => {
                if prompt_chars >= threshold {
                    warn!(
                        "Digest request {} prompt approached the context limit ({} >= {}), re-budgeting",
                        request_id, prompt_chars, threshold
                    );
                    match self.aggressive_retry(items, input_budget).await {
                        Some(text) => text,
                        None => completion.content,
                    }
                } else {
                    completion.content
                }
            }
            Err(e) if e.kind == CompletionErrorKind::EmptyContent => {
                warn!("Digest request {} returned empty content, re-budgeting", request_id);
                self.aggressive_retry(items, input_budget)
                    .await
                    .unwrap_or_else(|| NO_CONTENT_MESSAGE.to_string())
            }
            Err(e) => e.to_string(),
        }
    }

    /// One retry at half the input budget with a shorter instruction set.
    async fn aggressive_retry(&self, items: &[NewsItem], input_budget: usize) -> Option<String> {
        let truncated = self.budgeter.truncate(items, input_budget / 2);
        let prompt = build_short_prompt(&truncated);
        match self.client.call(&prompt, self.max_output_tokens, 3).await {
            Ok(completion) => Some(completion.content),
            Err(e) => {
                warn!("Aggressive re-truncation retry failed: {}", e);
                None
            }
        }
    }
}

fn frame_items(items: &[NewsItem]) -> String {
    items.iter().map(frame_item).collect()
}

fn build_digest_prompt(items: &[NewsItem]) -> String {
    format!(
        "You are a senior news analyst. Below are reports collected from \
         several sources over the past few hours:\n\n{}\n\
         Please do the following:\n\
         1. Group reports that cover the same event.\n\
         2. Where an event has multiple sources, compare how their stance, \
         emphasis, or details differ.\n\
         3. Select the 3 most noteworthy stories of the day.\n\n\
         Respond in concise, professional Markdown.",
        frame_items(items)
    )
}

fn build_short_prompt(items: &[NewsItem]) -> String {
    format!(
        "Summarize the following reports into a brief Markdown digest of \
         the 3 most important stories:\n\n{}",
        frame_items(items)
    )
}
