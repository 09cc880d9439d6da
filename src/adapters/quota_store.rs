use crate::config::QuotaSettings;
use crate::domain::codes::SearchType;
use crate::domain::model::QuotaRecord;
use crate::domain::ports::{QuotaOutcome, QuotaStore};
use crate::utils::error::{Result, TariffError};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;

const LOCK_RETRY_DELAY: Duration = Duration::from_millis(25);
const LOCK_ATTEMPTS: u32 = 200;
/// A lock file older than this is left over from a crashed process.
const STALE_LOCK_AGE: Duration = Duration::from_secs(30);

/// Rolls the period over when needed, then bumps the counter if it is below `limit`.
fn apply_increment(
    records: &mut HashMap<String, QuotaRecord>,
    client_key: &str,
    search_type: SearchType,
    limit: u32,
    today: NaiveDate,
) -> QuotaOutcome {
    let record = records
        .entry(client_key.to_string())
        .or_insert_with(|| QuotaRecord::new(client_key, today));

    if record.period_start < today {
        *record = QuotaRecord::new(client_key, today);
    }

    let counter = match search_type {
        SearchType::Single => &mut record.single_count,
        SearchType::Bulk => &mut record.bulk_count,
    };

    if *counter >= limit {
        return QuotaOutcome::Rejected(record.clone());
    }

    *counter += 1;
    QuotaOutcome::Accepted(record.clone())
}

/// In-process counters for a single instance. The map lock makes
/// check-then-increment atomic per key.
#[derive(Clone, Default)]
pub struct MemoryQuotaStore {
    records: Arc<Mutex<HashMap<String, QuotaRecord>>>,
}

impl MemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops records whose period ended before `today`.
    pub async fn purge_stale(&self, today: NaiveDate) -> usize {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, record| record.period_start >= today);
        before - records.len()
    }
}

#[async_trait]
impl QuotaStore for MemoryQuotaStore {
    async fn get(&self, client_key: &str) -> Result<Option<QuotaRecord>> {
        let records = self.records.lock().await;
        Ok(records.get(client_key).cloned())
    }

    async fn increment_if_below(
        &self,
        client_key: &str,
        search_type: SearchType,
        limit: u32,
        today: NaiveDate,
    ) -> Result<QuotaOutcome> {
        let mut records = self.records.lock().await;
        Ok(apply_increment(&mut records, client_key, search_type, limit, today))
    }

    async fn reset(&self, client_key: &str, today: NaiveDate) -> Result<()> {
        let mut records = self.records.lock().await;
        records.insert(client_key.to_string(), QuotaRecord::new(client_key, today));
        Ok(())
    }
}

/// Removes the lock file when dropped.
struct LockFile {
    path: PathBuf,
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!("Failed to release quota lock {}: {}", self.path.display(), e);
        }
    }
}

/// Counters kept in a JSON state file so separate CLI runs share one quota.
///
/// Each read-modify-write happens while holding `<state_file>.lock`, created
/// with `create_new`, so concurrent processes serialize on it.
pub struct FileQuotaStore {
    path: PathBuf,
    lock_path: PathBuf,
    local: Mutex<()>,
}

impl FileQuotaStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_name = path.as_os_str().to_os_string();
        lock_name.push(".lock");
        Self {
            path,
            lock_path: PathBuf::from(lock_name),
            local: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn acquire(&self) -> Result<LockFile> {
        for _ in 0..LOCK_ATTEMPTS {
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.lock_path)
                .await
            {
                Ok(_) => {
                    return Ok(LockFile {
                        path: self.lock_path.clone(),
                    })
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if self.lock_is_stale().await {
                        tracing::warn!("Removing stale quota lock {}", self.lock_path.display());
                        let _ = tokio::fs::remove_file(&self.lock_path).await;
                        continue;
                    }
                    tokio::time::sleep(LOCK_RETRY_DELAY).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(TariffError::ConfigError {
            message: format!("quota state is locked: {}", self.lock_path.display()),
        })
    }

    async fn lock_is_stale(&self) -> bool {
        let Ok(metadata) = tokio::fs::metadata(&self.lock_path).await else {
            return false;
        };
        metadata
            .modified()
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_some_and(|age| age > STALE_LOCK_AGE)
    }

    async fn load(&self) -> Result<HashMap<String, QuotaRecord>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, records: &HashMap<String, QuotaRecord>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut tmp_name = self.path.as_os_str().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        tokio::fs::write(&tmp_path, serde_json::to_vec_pretty(records)?).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }

    /// Runs `update` on the stored map under both locks and writes the result back.
    async fn update<T>(
        &self,
        update: impl FnOnce(&mut HashMap<String, QuotaRecord>) -> T,
    ) -> Result<T> {
        let _local = self.local.lock().await;
        let _lock = self.acquire().await?;

        let mut records = self.load().await?;
        let value = update(&mut records);
        self.save(&records).await?;
        Ok(value)
    }
}

#[async_trait]
impl QuotaStore for FileQuotaStore {
    async fn get(&self, client_key: &str) -> Result<Option<QuotaRecord>> {
        let _local = self.local.lock().await;
        let _lock = self.acquire().await?;
        Ok(self.load().await?.remove(client_key))
    }

    async fn increment_if_below(
        &self,
        client_key: &str,
        search_type: SearchType,
        limit: u32,
        today: NaiveDate,
    ) -> Result<QuotaOutcome> {
        self.update(|records| apply_increment(records, client_key, search_type, limit, today))
            .await
    }

    async fn reset(&self, client_key: &str, today: NaiveDate) -> Result<()> {
        self.update(|records| {
            records.insert(client_key.to_string(), QuotaRecord::new(client_key, today));
        })
        .await
    }
}

/// Store chosen by `[quota] state_file`: a shared file when set, process memory otherwise.
pub enum ConfiguredQuotaStore {
    Memory(MemoryQuotaStore),
    File(FileQuotaStore),
}

impl ConfiguredQuotaStore {
    pub fn from_settings(settings: &QuotaSettings) -> Self {
        match &settings.state_file {
            Some(path) => {
                tracing::debug!("Quota counters stored in {}", path.display());
                ConfiguredQuotaStore::File(FileQuotaStore::new(path.clone()))
            }
            None => ConfiguredQuotaStore::Memory(MemoryQuotaStore::new()),
        }
    }
}

#[async_trait]
impl QuotaStore for ConfiguredQuotaStore {
    async fn get(&self, client_key: &str) -> Result<Option<QuotaRecord>> {
        match self {
            ConfiguredQuotaStore::Memory(store) => store.get(client_key).await,
            ConfiguredQuotaStore::File(store) => store.get(client_key).await,
        }
    }

    async fn increment_if_below(
        &self,
        client_key: &str,
        search_type: SearchType,
        limit: u32,
        today: NaiveDate,
    ) -> Result<QuotaOutcome> {
        match self {
            ConfiguredQuotaStore::Memory(store) => {
                store
                    .increment_if_below(client_key, search_type, limit, today)
                    .await
            }
            ConfiguredQuotaStore::File(store) => {
                store
                    .increment_if_below(client_key, search_type, limit, today)
                    .await
            }
        }
    }

    async fn reset(&self, client_key: &str, today: NaiveDate) -> Result<()> {
        match self {
            ConfiguredQuotaStore::Memory(store) => store.reset(client_key, today).await,
            ConfiguredQuotaStore::File(store) => store.reset(client_key, today).await,
        }
    }
}
