pub mod budget;
pub mod completion;
pub mod config;
pub mod fetcher;
pub mod orchestrator;
pub mod pipeline;
pub mod resolver;
pub mod sink;
pub mod subscriptions;
pub mod types;

pub use budget::ContentBudgeter;
pub use completion::{CompletionBackend, CompletionClient};
pub use config::Settings;
pub use fetcher::ChannelFetcher;
pub use orchestrator::FetchOrchestrator;
pub use pipeline::{ContinuationController, SummaryPipeline};
pub use resolver::MirrorResolver;
pub use sink::{HttpReportSink, RecordingSink, ReportSink, Severity, TracingSink};
pub use subscriptions::{JsonFileSubscriptions, StaticSubscriptions, SubscriptionSource};
pub use types::*;
