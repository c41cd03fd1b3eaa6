use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// Receives (severity, message, structured context) for every degraded or
/// failed step. The core only depends on this trait; what happens to the
/// reports is the sink's business.
pub trait ReportSink: Send + Sync {
    fn report(&self, severity: Severity, message: &str, context: Value);
}

/// Default sink: emits reports as structured log events.
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn report(&self, severity: Severity, message: &str, context: Value) {
        match severity {
            Severity::Warning => warn!(%context, "{}", message),
            Severity::Error => error!(%context, "{}", message),
        }
    }
}

/// Sink that forwards reports to a remote collection endpoint as JSON,
/// logging locally as well so nothing is lost if the POST fails.
pub struct HttpReportSink {
    endpoint: String,
    client: Client,
}

impl HttpReportSink {
    pub fn new(endpoint: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to create HTTP client");
        Self { endpoint, client }
    }
}

impl ReportSink for HttpReportSink {
    fn report(&self, severity: Severity, message: &str, context: Value) {
        TracingSink.report(severity, message, context.clone());

        let payload = json!({
            "error": message,
            "severity": match severity {
                Severity::Warning => "warning",
                Severity::Error => "error",
            },
            "context": context,
        });
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        tokio::spawn(async move {
            if let Err(e) = client.post(&endpoint).json(&payload).send().await {
                warn!("Failed to deliver error report to {}: {}", endpoint, e);
            }
        });
    }
}

/// Test double that records every report it receives.
pub struct RecordingSink {
    reports: Mutex<Vec<(Severity, String, Value)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            reports: Mutex::new(Vec::new()),
        }
    }

    pub fn reports(&self) -> Vec<(Severity, String, Value)> {
        self.reports.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportSink for RecordingSink {
    fn report(&self, severity: Severity, message: &str, context: Value) {
        self.reports
            .lock()
            .unwrap()
            .push((severity, message.to_string(), context));
    }
}
