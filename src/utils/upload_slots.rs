use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async lock per upload target (`directory/name`), so two uploads to
/// the same target never overlap while unrelated targets proceed freely.
#[derive(Debug, Clone, Default)]
pub struct UploadSlots {
    slots: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl UploadSlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(directory_path: &str, target_name: &str) -> String {
        format!("{}/{}", directory_path.trim_matches('/'), target_name)
    }

    /// Waits until no other upload holds `key`. The slot is released when
    /// the guard is dropped.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let slot = self
            .slots
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        slot.lock_owned().await
    }

    pub fn in_flight(&self, key: &str) -> bool {
        self.slots
            .get(key)
            .map(|slot| slot.try_lock().is_err())
            .unwrap_or(false)
    }

    /// Drops slots nobody holds or waits on.
    pub fn prune(&self) {
        self.slots.retain(|_, slot| Arc::strong_count(slot) > 1);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
