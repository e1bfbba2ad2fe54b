use crate::processing::MediaInfo;
use crate::{Error, Result};
use crate::utils::{elapsed_millis, now};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone)]
pub struct PublisherInfo {
    /// Connection index of the publisher
    pub index: i32,

    /// `app/key`
    pub path: String,

    pub app: String,
    pub key: String,

    /// Publishing start time
    pub started_at: DateTime<Utc>,

    /// Set once both sequence headers arrived
    pub media_info: Option<Arc<MediaInfo>>,
}

impl PublisherInfo {
    /// Milliseconds since publishing started
    pub fn uptime_millis(&self) -> i64 {
        elapsed_millis(self.started_at)
    }
}

/// Live stream paths; one publisher per path
#[derive(Default)]
pub struct StreamRegistry {
    publishers: RwLock<HashMap<String, PublisherInfo>>,
}

impl StreamRegistry {
    /// Create new registry
    pub fn new() -> Self {
        StreamRegistry::default()
    }

    /// Claim `path` for the publisher at `index`
    pub fn register(&self, path: &str, index: i32) -> Result<()> {
        let mut publishers = self.publishers.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = publishers.get(path) {
            return Err(Error::stream(format!(
                "Stream '{}' is already being published by index {}",
                path, existing.index
            )));
        }

        let (app, key) = path.split_once('/').unwrap_or((path, ""));
        publishers.insert(
            path.to_string(),
            PublisherInfo {
                index,
                path: path.to_string(),
                app: app.to_string(),
                key: key.to_string(),
                started_at: now(),
                media_info: None,
            },
        );
        Ok(())
    }

    /// Record the bootstrap result for a registered path
    pub fn set_ready(&self, path: &str, media_info: Arc<MediaInfo>) -> Result<()> {
        let mut publishers = self.publishers.write().unwrap_or_else(PoisonError::into_inner);
        let publisher = publishers
            .get_mut(path)
            .ok_or_else(|| Error::stream(format!("Stream '{}' not found", path)))?;
        publisher.media_info = Some(media_info);
        Ok(())
    }

    /// Release `path` if `index` still owns it
    pub fn unregister(&self, path: &str, index: i32) -> Option<PublisherInfo> {
        let mut publishers = self.publishers.write().unwrap_or_else(PoisonError::into_inner);
        match publishers.get(path) {
            Some(publisher) if publisher.index == index => publishers.remove(path),
            _ => None,
        }
    }

    pub fn get(&self, path: &str) -> Option<PublisherInfo> {
        let publishers = self.publishers.read().unwrap_or_else(PoisonError::into_inner);
        publishers.get(path).cloned()
    }

    /// Check if stream is being published
    pub fn is_publishing(&self, path: &str) -> bool {
        let publishers = self.publishers.read().unwrap_or_else(PoisonError::into_inner);
        publishers.contains_key(path)
    }

    /// Get all publishers
    pub fn get_all(&self) -> Vec<PublisherInfo> {
        let publishers = self.publishers.read().unwrap_or_else(PoisonError::into_inner);
        publishers.values().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.publishers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Remove every entry, returning what was live
    pub fn clear(&self) -> Vec<PublisherInfo> {
        let mut publishers = self.publishers.write().unwrap_or_else(PoisonError::into_inner);
        publishers.drain().map(|(_, publisher)| publisher).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_path_rejected() {
        let registry = StreamRegistry::new();
        registry.register("live/abc", 1).unwrap();
        assert!(registry.register("live/abc", 2).is_err());
        assert!(registry.register("live/other", 2).is_ok());
        assert_eq!(registry.count(), 2);

        let info = registry.get("live/abc").unwrap();
        assert_eq!((info.app.as_str(), info.key.as_str(), info.index), ("live", "abc", 1));
    }

    #[test]
    fn test_unregister_checks_owner() {
        let registry = StreamRegistry::new();
        registry.register("live/abc", 1).unwrap();

        // the rejected second publisher closing must not free the path
        assert!(registry.unregister("live/abc", 2).is_none());
        assert!(registry.is_publishing("live/abc"));

        assert!(registry.unregister("live/abc", 1).is_some());
        assert!(!registry.is_publishing("live/abc"));
    }

    #[test]
    fn test_set_ready() {
        let registry = StreamRegistry::new();
        assert!(registry.set_ready("live/abc", Arc::new(MediaInfo::new())).is_err());

        registry.register("live/abc", 1).unwrap();
        registry.set_ready("live/abc", Arc::new(MediaInfo::new())).unwrap();
        assert!(registry.get("live/abc").unwrap().media_info.is_some());
        assert_eq!(registry.clear().len(), 1);
        assert_eq!(registry.count(), 0);
    }
}
