use crate::types::Result;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

/// Ordered sequence of channel identifiers, read once per digest request.
/// The pipeline never writes through this trait.
pub trait SubscriptionSource: Send + Sync {
    fn channels(&self) -> Vec<String>;
}

/// Fixed channel list, mainly for tests and one-off runs.
pub struct StaticSubscriptions(pub Vec<String>);

impl SubscriptionSource for StaticSubscriptions {
    fn channels(&self) -> Vec<String> {
        self.0.clone()
    }
}

/// Channels a fresh install starts with, before any `add-sub`/`remove-sub`.
pub const DEFAULT_CHANNELS: &[&str] = &[
    "TechCrunch",
    "wallstreetcn",
    "reuters_cn",
    "tnews365",
    "solidot",
    "landiansub",
    "OutsightChina",
    "outvivid",
];

/// Subscription list persisted as a JSON array of channel ids. A missing
/// file is seeded with `DEFAULT_CHANNELS` on first load.
pub struct JsonFileSubscriptions {
    path: PathBuf,
}

impl JsonFileSubscriptions {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn load(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            let defaults: Vec<String> = DEFAULT_CHANNELS.iter().map(|c| c.to_string()).collect();
            debug!(
                "Seeding {} with {} default channels",
                self.path.display(),
                defaults.len()
            );
            self.save(&defaults)?;
            return Ok(defaults);
        }
        let raw = fs::read_to_string(&self.path)?;
        let channels: Vec<String> = serde_json::from_str(&raw)?;
        Ok(channels)
    }

    pub fn save(&self, channels: &[String]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(channels)?)?;
        Ok(())
    }

    /// Add a channel id. Returns false for empty or already-present ids.
    pub fn add(&self, channel_id: &str) -> Result<bool> {
        let channel_id = channel_id.trim();
        if channel_id.is_empty() {
            return Ok(false);
        }
        let mut channels = self.load()?;
        if channels.iter().any(|c| c == channel_id) {
            return Ok(false);
        }
        channels.push(channel_id.to_string());
        self.save(&channels)?;
        info!("Added subscription: {}", channel_id);
        Ok(true)
    }

    /// Remove a channel id. Returns whether anything was removed.
    pub fn remove(&self, channel_id: &str) -> Result<bool> {
        let channel_id = channel_id.trim();
        let channels = self.load()?;
        let remaining: Vec<String> = channels
            .iter()
            .filter(|c| c.as_str() != channel_id)
            .cloned()
            .collect();
        if remaining.len() == channels.len() {
            return Ok(false);
        }
        self.save(&remaining)?;
        info!("Removed subscription: {}", channel_id);
        Ok(true)
    }
}

impl SubscriptionSource for JsonFileSubscriptions {
    fn channels(&self) -> Vec<String> {
        self.load().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, JsonFileSubscriptions) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSubscriptions::new(dir.path().join("subs.json"));
        (dir, store)
    }

    #[test]
    fn add_and_remove_round_trip() {
        let (_dir, subs) = store();
        subs.save(&[]).unwrap();
        assert!(subs.add("technews").unwrap());
        assert!(subs.add("worldwire").unwrap());
        assert!(!subs.add("technews").unwrap(), "duplicates are rejected");
        assert_eq!(subs.channels(), vec!["technews", "worldwire"]);

        assert!(subs.remove("technews").unwrap());
        assert!(!subs.remove("technews").unwrap());
        assert_eq!(subs.channels(), vec!["worldwire"]);
    }

    #[test]
    fn blank_ids_are_rejected() {
        let (_dir, subs) = store();
        subs.save(&[]).unwrap();
        assert!(!subs.add("   ").unwrap());
        assert!(subs.channels().is_empty());
    }

    #[test]
    fn missing_file_is_seeded_with_defaults() {
        let (_dir, subs) = store();
        let channels = subs.channels();
        assert_eq!(channels, DEFAULT_CHANNELS);
        // The seed is persisted, so later edits start from it.
        assert!(subs.remove("solidot").unwrap());
        assert_eq!(subs.channels().len(), DEFAULT_CHANNELS.len() - 1);
    }
}
