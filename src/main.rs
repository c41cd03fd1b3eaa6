use channel_digest::{
    ChannelFetcher, CompletionClient, FetchOrchestrator, HttpReportSink, JsonFileSubscriptions,
    ReportSink, Settings, SummaryPipeline, SubscriptionSource, TracingSink,
};
use channel_digest::types::truncate_chars;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "channel-digest", about = "Multi-mirror feed digest pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch all subscribed channels and print a synthesized digest
    Digest,
    /// Fetch one channel's latest entries and print them
    Fetch {
        channel_id: String,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// List subscribed channels
    ListSubs,
    /// Add a channel subscription
    AddSub { channel_id: String },
    /// Remove a channel subscription
    RemoveSub { channel_id: String },
}

/// One-line content preview, marked with "..." when shortened.
fn preview(content: &str, max: usize) -> String {
    let flat = content.replace('\n', " ");
    let flat = flat.trim();
    if flat.chars().count() > max {
        format!("{}...", truncate_chars(flat, max))
    } else {
        flat.to_string()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let settings = Settings::from_env();

    let sink: Arc<dyn ReportSink> = match &settings.error_report_url {
        Some(url) => Arc::new(HttpReportSink::new(url.clone())),
        None => Arc::new(TracingSink),
    };
    let subscriptions = JsonFileSubscriptions::new(settings.subscriptions_file.clone());

    match cli.command {
        Command::Digest => {
            let channels = subscriptions.channels();
            info!("Starting digest round for {} channels", channels.len());

            let fetcher = Arc::new(ChannelFetcher::new(
                settings.gateway.clone(),
                &settings.budget,
                sink.clone(),
            ));
            let orchestrator =
                FetchOrchestrator::new(fetcher, settings.gateway.fetch_concurrency);
            let items = orchestrator
                .fetch_all(&channels, settings.gateway.items_per_channel)
                .await;

            let client = Arc::new(CompletionClient::new(settings.completion.clone(), sink));
            let pipeline = SummaryPipeline::new(settings.budget, &settings.completion, client);
            println!("{}", pipeline.summarize(&items).await);
        }
        Command::Fetch { channel_id, limit } => {
            let fetcher = ChannelFetcher::new(settings.gateway, &settings.budget, sink);
            let items = fetcher.fetch(&channel_id, limit).await;
            if items.is_empty() {
                println!("No entries fetched for {} (restricted or empty).", channel_id);
                return Ok(());
            }
            for item in items {
                let title = if item.title.is_empty() {
                    "(untitled)"
                } else {
                    &item.title
                };
                println!("- {}\n{}\n{}\n", title, preview(&item.content, 300), item.link);
            }
        }
        Command::ListSubs => {
            let channels = subscriptions.channels();
            if channels.is_empty() {
                println!("No subscriptions. Use `add-sub <channel_id>` to add one.");
            } else {
                for channel in channels {
                    println!("{}", channel);
                }
            }
        }
        Command::AddSub { channel_id } => {
            if subscriptions.add(&channel_id)? {
                println!("Subscribed to {}", channel_id);
            } else {
                println!("Already subscribed (or invalid id): {}", channel_id);
            }
        }
        Command::RemoveSub { channel_id } => {
            if subscriptions.remove(&channel_id)? {
                println!("Unsubscribed from {}", channel_id);
            } else {
                println!("Not subscribed: {}", channel_id);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::preview;

    #[test]
    fn preview_marks_shortened_content() {
        let long = "x".repeat(400);
        let shown = preview(&long, 300);
        assert_eq!(shown.chars().count(), 303);
        assert!(shown.ends_with("..."));
    }

    #[test]
    fn preview_leaves_short_content_unmarked() {
        assert_eq!(preview("brief\nreport", 300), "brief report");
    }
}
