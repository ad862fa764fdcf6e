use crate::error::StoreError;
use crate::state::SensorStatus;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// A status snapshot with the optimistic-concurrency version the store
/// assigned to it
#[derive(Debug, Clone)]
pub struct VersionedStatus {
    pub version: u64,
    pub status: SensorStatus,
}

/// External resource store for sensor status, keyed by sensor name
/// within a namespace. Writers coordinate through `compare_and_set`.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<VersionedStatus>, StoreError>;

    /// Atomically replace the status if the stored version still equals
    /// `expected` (0 for a create). Returns the new version.
    async fn compare_and_set(
        &self,
        key: &str,
        expected: u64,
        status: SensorStatus,
    ) -> Result<u64, StoreError>;

    /// Subscribe to committed status updates for the key
    fn watch(&self, key: &str) -> broadcast::Receiver<VersionedStatus>;
}

struct Entry {
    version: u64,
    status: SensorStatus,
    watchers: broadcast::Sender<VersionedStatus>,
}

/// In-memory state store for embedded use and tests
pub struct InMemoryStateStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<VersionedStatus>, StoreError> {
        let entries = self.entries.lock();
        Ok(entries.get(key).map(|entry| VersionedStatus {
            version: entry.version,
            status: entry.status.clone(),
        }))
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: u64,
        status: SensorStatus,
    ) -> Result<u64, StoreError> {
        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            Some(entry) => {
                if entry.version != expected {
                    return Err(StoreError::WriteConflict {
                        key: key.to_string(),
                        attempts: 1,
                    });
                }
                entry.version += 1;
                entry.status = status.clone();
                let _ = entry.watchers.send(VersionedStatus {
                    version: entry.version,
                    status,
                });
                Ok(entry.version)
            }
            None => {
                if expected != 0 {
                    return Err(StoreError::NotFound(key.to_string()));
                }
                let (watchers, _) = broadcast::channel(16);
                let _ = watchers.send(VersionedStatus {
                    version: 1,
                    status: status.clone(),
                });
                entries.insert(
                    key.to_string(),
                    Entry {
                        version: 1,
                        status,
                        watchers,
                    },
                );
                Ok(1)
            }
        }
    }

    fn watch(&self, key: &str) -> broadcast::Receiver<VersionedStatus> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) => entry.watchers.subscribe(),
            None => {
                let (watchers, receiver) = broadcast::channel(16);
                entries.insert(
                    key.to_string(),
                    Entry {
                        version: 0,
                        status: SensorStatus::default(),
                        watchers,
                    },
                );
                receiver
            }
        }
    }
}

/// Persists status after every material transition.
///
/// Each write is a fresh read-modify-CAS; a conflict re-reads and
/// retries up to the configured bound before surfacing
/// `StoreError::WriteConflict`.
pub struct StatusRecorder {
    store: Arc<dyn StateStore>,
    key: String,
    max_attempts: u32,
}

impl StatusRecorder {
    pub fn new(store: Arc<dyn StateStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            max_attempts: 3,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn record(&self, status: &SensorStatus) -> Result<u64, StoreError> {
        for attempt in 1..=self.max_attempts {
            let current = self.store.get(&self.key).await?;
            let expected = current.map(|v| v.version).unwrap_or(0);
            match self
                .store
                .compare_and_set(&self.key, expected, status.clone())
                .await
            {
                Ok(version) => return Ok(version),
                Err(StoreError::WriteConflict { .. }) if attempt < self.max_attempts => continue,
                Err(StoreError::WriteConflict { .. }) => {
                    return Err(StoreError::WriteConflict {
                        key: self.key.clone(),
                        attempts: self.max_attempts,
                    });
                }
                Err(other) => return Err(other),
            }
        }
        Err(StoreError::WriteConflict {
            key: self.key.clone(),
            attempts: self.max_attempts,
        })
    }
}
