//! The manual document: the last fallback tier for every resource that has
//! one, and the data edited from the dashboard.
//!
//! The document is a single JSON object mapping store keys to arrays of
//! records. It is always read and rewritten whole.
use crate::metrics_defs::{MANUAL_STORE_READY, MANUAL_STORE_WRITES};
use crate::types::ResourceType;
use async_trait::async_trait;
use serde_json::{Map, Value};
use shared::{counter, gauge};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};

pub type ManualDocument = Map<String, Value>;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("could not decode manual document: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("manual store is shutting down")]
    Closed(#[from] tokio::sync::AcquireError),
}

/// Where the manual document is persisted.
#[async_trait]
pub trait ManualDataProvider: Send + Sync {
    /// Returns `Ok(None)` when no document has been stored yet.
    async fn load(&self) -> Result<Option<ManualDocument>, StoreError>;
    async fn store(&self, document: &ManualDocument) -> Result<(), StoreError>;
}

pub struct FilesystemManualProvider {
    path: PathBuf,
}

impl FilesystemManualProvider {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        FilesystemManualProvider {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "manual".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl ManualDataProvider for FilesystemManualProvider {
    async fn load(&self) -> Result<Option<ManualDocument>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn store(&self, document: &ManualDocument) -> Result<(), StoreError> {
        let mut bytes = serde_json::to_vec_pretty(document)?;
        bytes.push(b'\n');

        // Write next to the target and rename over it, so readers see either
        // the old document or the new one.
        let staging = self.staging_path();
        tokio::fs::write(&staging, &bytes).await?;
        tokio::fs::rename(&staging, &self.path).await?;

        tracing::debug!(path = ?self.path, bytes = bytes.len(), "stored manual document");
        Ok(())
    }
}

/// Keeps the document in memory. Used when no file is configured and in tests.
#[derive(Default)]
pub struct MemoryManualProvider {
    document: Mutex<Option<ManualDocument>>,
}

impl MemoryManualProvider {
    pub fn new(document: ManualDocument) -> Self {
        MemoryManualProvider {
            document: Mutex::new(Some(document)),
        }
    }
}

#[async_trait]
impl ManualDataProvider for MemoryManualProvider {
    async fn load(&self) -> Result<Option<ManualDocument>, StoreError> {
        Ok(self.document.lock().await.clone())
    }

    async fn store(&self, document: &ManualDocument) -> Result<(), StoreError> {
        *self.document.lock().await = Some(document.clone());
        Ok(())
    }
}

/// Typed access to the manual document.
///
/// Writes are read-modify-write cycles over the whole document and are
/// serialized through `write_lock`, so two writes to different resources
/// cannot drop each other's records. This only holds inside one process;
/// another process writing the same file still races, last writer wins.
pub struct ManualStore {
    provider: Arc<dyn ManualDataProvider>,
    write_lock: Semaphore,
    // Used by the readiness probe. False until a load succeeds and again
    // after any load fails.
    ready: AtomicBool,
}

impl ManualStore {
    pub fn new(provider: Arc<dyn ManualDataProvider>) -> Self {
        ManualStore {
            provider,
            write_lock: Semaphore::new(1),
            ready: AtomicBool::new(false),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    async fn load(&self) -> Result<ManualDocument, StoreError> {
        let result = self.provider.load().await;
        let ready = result.is_ok();
        self.ready.store(ready, Ordering::Relaxed);
        gauge!(MANUAL_STORE_READY).set(if ready { 1.0 } else { 0.0 });
        Ok(result?.unwrap_or_default())
    }

    /// Loads the document once so the readiness probe reflects its state.
    pub async fn refresh(&self) -> Result<(), StoreError> {
        self.load().await.map(|_| ())
    }

    /// Fallback read. Never fails: an unreadable or corrupt document looks
    /// the same as an empty one.
    pub async fn read(&self, resource: ResourceType) -> Value {
        match self.load().await {
            Ok(document) => entry(&document, resource),
            Err(err) => {
                tracing::error!(
                    %resource,
                    error = %err,
                    "manual document unreadable, serving empty list"
                );
                Value::Array(Vec::new())
            }
        }
    }

    /// The whole document, for administrative reads.
    pub async fn read_all(&self) -> Result<ManualDocument, StoreError> {
        self.load().await
    }

    /// Administrative read of a single resource. Unlike [`ManualStore::read`],
    /// a broken document is reported.
    pub async fn read_entry(&self, resource: ResourceType) -> Result<Value, StoreError> {
        let document = self.read_all().await?;
        Ok(entry(&document, resource))
    }

    /// Replaces the records for `resource` with `records` as given. Every
    /// other key in the document is left as it was.
    pub async fn write(&self, resource: ResourceType, records: Value) -> Result<(), StoreError> {
        let _permit = self.get_permit().await?;

        let result = async {
            let mut document = self.load().await?;
            document.insert(resource.store_key().to_string(), records);
            self.provider.store(&document).await
        }
        .await;

        let outcome = if result.is_ok() { "ok" } else { "error" };
        counter!(MANUAL_STORE_WRITES, "resource" => resource.name(), "outcome" => outcome)
            .increment(1);
        result
    }

    /// Guard that ensures only one write is in progress at a time.
    async fn get_permit(&self) -> Result<SemaphorePermit<'_>, tokio::sync::AcquireError> {
        self.write_lock.acquire().await
    }
}

// Missing and null entries read as an empty list.
fn entry(document: &ManualDocument, resource: ResourceType) -> Value {
    match document.get(resource.store_key()) {
        None | Some(Value::Null) => Value::Array(Vec::new()),
        Some(records) => records.clone(),
    }
}
