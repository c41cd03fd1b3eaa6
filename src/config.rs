use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;
use url::Url;

/// Where and how channel feeds are fetched.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Primary feed gateway base URL.
    pub base_url: String,
    /// Ordered fallback gateway bases, tried when the primary is rejected.
    pub fallbacks: Vec<String>,
    /// Per-attempt request timeout.
    pub timeout: Duration,
    /// Entries kept per channel.
    pub items_per_channel: usize,
    /// Concurrent channel fetches.
    pub fetch_concurrency: usize,
    pub user_agent: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://rsshub.app".to_string(),
            fallbacks: vec![
                "https://rsshub.rssforever.com".to_string(),
                "https://rss.shab.fun".to_string(),
            ],
            timeout: Duration::from_secs(10),
            items_per_channel: 5,
            fetch_concurrency: 5,
            user_agent: "channel-digest/0.1".to_string(),
        }
    }
}

/// Character budgets used as a proxy for the completion service's token
/// context limit (1 token estimated as 4 chars).
#[derive(Debug, Clone)]
pub struct BudgetConfig {
    /// Total prompt budget in characters.
    pub context_chars: usize,
    /// Characters held back for the completion output.
    pub reserve_chars: usize,
    /// Cap applied to each article's content at creation time.
    pub per_article_chars: usize,
    /// Minimum content kept per item when shrinking proportionally.
    pub floor_chars: usize,
    /// Fraction of the context budget at which the pipeline re-budgets
    /// aggressively (token-estimate heuristic, not a guarantee).
    pub retrunc_threshold: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            context_chars: 48_000,
            reserve_chars: 8_000,
            per_article_chars: 1_500,
            floor_chars: 50,
            retrunc_threshold: 0.8,
        }
    }
}

/// Remote completion service client configuration.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub max_output_tokens: u32,
    pub continuation_tokens: u32,
    pub temperature: f32,
    /// Additional attempts after the first one.
    pub max_retries: u32,
    /// Backoff grows linearly: base * (attempt + 1).
    pub backoff_base: Duration,
    pub timeout: Duration,
    /// Cap on concurrent outbound completion calls across digest requests.
    pub concurrency: usize,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-5-mini".to_string(),
            max_output_tokens: 2_048,
            continuation_tokens: 1_024,
            temperature: 0.7,
            max_retries: 2,
            backoff_base: Duration::from_secs(2),
            timeout: Duration::from_secs(60),
            concurrency: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub gateway: GatewayConfig,
    pub budget: BudgetConfig,
    pub completion: CompletionConfig,
    pub subscriptions_file: PathBuf,
    pub error_report_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            budget: BudgetConfig::default(),
            completion: CompletionConfig::default(),
            subscriptions_file: PathBuf::from("subscriptions.json"),
            error_report_url: None,
        }
    }
}

impl Settings {
    /// Build settings from the environment, falling back to defaults for
    /// anything unset. Recognized variables use the `DIGEST_` prefix.
    pub fn from_env() -> Self {
        let mut settings = Settings::default();

        if let Ok(base) = env::var("DIGEST_GATEWAY_URL") {
            match Url::parse(&base) {
                Ok(_) => settings.gateway.base_url = base,
                Err(e) => warn!("Ignoring invalid DIGEST_GATEWAY_URL {}: {}", base, e),
            }
        }
        if let Ok(fallbacks) = env::var("DIGEST_GATEWAY_FALLBACKS") {
            settings.gateway.fallbacks = fallbacks
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .filter(|s| match Url::parse(s) {
                    Ok(_) => true,
                    Err(e) => {
                        warn!("Ignoring invalid fallback gateway {}: {}", s, e);
                        false
                    }
                })
                .collect();
        }
        if let Some(secs) = env_u64("DIGEST_GATEWAY_TIMEOUT_SECS") {
            settings.gateway.timeout = Duration::from_secs(secs);
        }
        if let Some(n) = env_u64("DIGEST_ITEMS_PER_CHANNEL") {
            settings.gateway.items_per_channel = n as usize;
        }
        if let Some(n) = env_u64("DIGEST_FETCH_CONCURRENCY") {
            settings.gateway.fetch_concurrency = (n as usize).max(1);
        }

        if let Some(n) = env_u64("DIGEST_CONTEXT_CHARS") {
            settings.budget.context_chars = n as usize;
        }
        if let Some(n) = env_u64("DIGEST_RESERVE_CHARS") {
            settings.budget.reserve_chars = n as usize;
        }
        if let Some(n) = env_u64("DIGEST_PER_ARTICLE_CHARS") {
            settings.budget.per_article_chars = n as usize;
        }
        if let Ok(raw) = env::var("DIGEST_RETRUNC_THRESHOLD") {
            match raw.parse::<f64>() {
                Ok(t) if t > 0.0 && t <= 1.0 => settings.budget.retrunc_threshold = t,
                _ => warn!("Ignoring invalid DIGEST_RETRUNC_THRESHOLD {}", raw),
            }
        }

        if let Ok(url) = env::var("DIGEST_LLM_BASE_URL") {
            settings.completion.base_url = url;
        }
        if let Ok(key) = env::var("DIGEST_LLM_API_KEY") {
            settings.completion.api_key = key;
        }
        if let Ok(model) = env::var("DIGEST_LLM_MODEL") {
            settings.completion.model = model;
        }
        if let Some(n) = env_u64("DIGEST_MAX_OUTPUT_TOKENS") {
            settings.completion.max_output_tokens = n as u32;
        }
        if let Some(n) = env_u64("DIGEST_CONTINUATION_TOKENS") {
            settings.completion.continuation_tokens = n as u32;
        }
        if let Some(n) = env_u64("DIGEST_LLM_RETRIES") {
            settings.completion.max_retries = n as u32;
        }
        if let Some(secs) = env_u64("DIGEST_LLM_BACKOFF_SECS") {
            settings.completion.backoff_base = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("DIGEST_LLM_TIMEOUT_SECS") {
            settings.completion.timeout = Duration::from_secs(secs);
        }
        if let Some(n) = env_u64("DIGEST_LLM_CONCURRENCY") {
            settings.completion.concurrency = (n as usize).max(1);
        }
        if let Ok(t) = env::var("DIGEST_LLM_TEMPERATURE") {
            if let Ok(t) = t.parse() {
                settings.completion.temperature = t;
            }
        }

        if let Ok(path) = env::var("DIGEST_SUBSCRIPTIONS_FILE") {
            settings.subscriptions_file = PathBuf::from(path);
        }
        settings.error_report_url = env::var("DIGEST_ERROR_REPORT_URL").ok();

        settings
    }
}

fn env_u64(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
