use std::collections::HashMap;
use std::env;
use std::sync::{Arc, Mutex};

use stowage_core::{StorageClient, StorageError, UploadRequest};
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

use crate::batch::{FileKey, SourceFile, UploadBatch, UploadStatus};
use crate::content_type::{ContentKind, wire_content_type};
use crate::intake;
use crate::paths::remote_path_for;
use crate::store::BatchStore;
use crate::transfer::{TransferClient, TransferError};

const DEFAULT_CONCURRENCY: usize = 5;
const DEFAULT_MAX_FILE_BYTES: u64 = 100 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("api error: {0}")]
    Api(#[from] StorageError),
    #[error("uploads to {0} are not allowed")]
    UploadNotAllowed(String),
    #[error("no failed uploads to retry")]
    NothingToRetry,
}

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub concurrency: usize,
    pub max_file_bytes: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: read_limit("STOWAGE_UPLOAD_CONCURRENCY", DEFAULT_CONCURRENCY),
            max_file_bytes: read_byte_limit("STOWAGE_MAX_FILE_BYTES", DEFAULT_MAX_FILE_BYTES),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadNotice {
    OversizedSkipped { names: Vec<String>, limit: u64 },
    BatchFinished { succeeded: usize, failed: usize },
    SchedulerFailure { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

type LiveHandles = Mutex<HashMap<FileKey, CancellationToken>>;

pub struct UploadEngine {
    client: StorageClient,
    transfer: TransferClient,
    store: Arc<BatchStore>,
    config: EngineConfig,
    handles: Arc<LiveHandles>,
    notices_tx: UnboundedSender<UploadNotice>,
    notices_rx: Option<UnboundedReceiver<UploadNotice>>,
}

impl UploadEngine {
    pub fn new(client: StorageClient, store: Arc<BatchStore>) -> Self {
        Self::with_config(client, store, EngineConfig::default())
    }

    pub fn with_config(
        client: StorageClient,
        store: Arc<BatchStore>,
        config: EngineConfig,
    ) -> Self {
        let (notices_tx, notices_rx) = mpsc::unbounded_channel();
        Self {
            client,
            transfer: TransferClient::new(),
            store,
            config,
            handles: Arc::new(Mutex::new(HashMap::new())),
            notices_tx,
            notices_rx: Some(notices_rx),
        }
    }

    pub fn with_transfer(mut self, transfer: TransferClient) -> Self {
        self.transfer = transfer;
        self
    }

    pub fn take_notices(&mut self) -> Option<UnboundedReceiver<UploadNotice>> {
        self.notices_rx.take()
    }

    pub fn store(&self) -> &Arc<BatchStore> {
        &self.store
    }

    pub async fn start_upload(
        &self,
        files: Vec<SourceFile>,
        dest_path: &str,
    ) -> Result<BatchReport, EngineError> {
        let destination = self
            .client
            .resolve_destination(dest_path)
            .await?
            .ok_or_else(|| EngineError::UploadNotAllowed(dest_path.to_string()))?;

        let plan = intake::partition(files, self.config.max_file_bytes);
        let skipped = plan.oversized.len();
        if skipped > 0 {
            self.notify(UploadNotice::OversizedSkipped {
                names: plan.oversized.iter().map(|f| f.name.clone()).collect(),
                limit: self.config.max_file_bytes,
            });
        }
        if plan.admitted.is_empty() {
            return Ok(BatchReport {
                succeeded: 0,
                failed: 0,
                skipped,
            });
        }

        // A new batch supersedes whatever was still running.
        self.abort_live_handles();
        let keys: Vec<FileKey> = plan.admitted.iter().map(|f| f.key.clone()).collect();
        self.store
            .set_batch(UploadBatch::new(destination, plan.admitted));

        let (succeeded, failed) = self.run_chunks(&keys).await;
        Ok(BatchReport {
            succeeded,
            failed,
            skipped,
        })
    }

    pub fn cancel_file(&self, key: &FileKey) {
        if let Some(token) = self.handles.lock().unwrap().remove(key) {
            token.cancel();
        }
        // Settles the record even when no transfer was ever started for it.
        self.store.fail_upload(key, "upload cancelled");
    }

    pub fn cancel_all(&self) {
        self.abort_live_handles();
        self.store.fail_all_active("upload cancelled");
        self.store.clear_time_remaining();
    }

    pub async fn retry_file(&self, key: &FileKey) {
        if !self.store.reset_for_retry(key) {
            return;
        }
        upload_one(
            self.client.clone(),
            self.transfer.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.handles),
            key.clone(),
        )
        .await;
    }

    pub async fn retry_failed(&self) -> Result<BatchReport, EngineError> {
        let retry_set = self.store.failed_keys();
        if retry_set.is_empty() {
            return Err(EngineError::NothingToRetry);
        }
        for key in &retry_set {
            self.store.reset_for_retry(key);
        }
        let (succeeded, failed) = self.run_chunks(&retry_set).await;
        Ok(BatchReport {
            succeeded,
            failed,
            skipped: 0,
        })
    }

    pub fn clear_batch(&self) {
        self.abort_live_handles();
        self.store.clear();
    }

    async fn run_chunks(&self, keys: &[FileKey]) -> (usize, usize) {
        self.store.set_uploading(true);
        let _uploading = UploadingGuard {
            store: Arc::clone(&self.store),
        };

        // Every file in a chunk settles before the next chunk starts, failures included.
        for chunk in keys.chunks(self.config.concurrency.max(1)) {
            let mut running = Vec::with_capacity(chunk.len());
            for key in chunk {
                running.push((key.clone(), self.spawn_upload(key.clone())));
            }
            for (key, task) in running {
                if let Err(err) = task.await {
                    self.remove_handle(&key);
                    self.store.fail_upload(&key, "upload task failed");
                    self.notify(UploadNotice::SchedulerFailure {
                        message: format!("upload task for {key} failed: {err}"),
                    });
                }
            }
        }

        let (succeeded, failed) = self.tally(keys);
        self.notify(UploadNotice::BatchFinished { succeeded, failed });
        (succeeded, failed)
    }

    fn spawn_upload(&self, key: FileKey) -> tokio::task::JoinHandle<()> {
        let client = self.client.clone();
        let transfer = self.transfer.clone();
        let store = Arc::clone(&self.store);
        let handles = Arc::clone(&self.handles);
        tokio::spawn(async move {
            upload_one(client, transfer, store, handles, key).await;
        })
    }

    fn abort_live_handles(&self) {
        let mut handles = self.handles.lock().unwrap();
        for (_, token) in handles.drain() {
            token.cancel();
        }
    }

    fn remove_handle(&self, key: &FileKey) {
        self.handles.lock().unwrap().remove(key);
    }

    fn tally(&self, keys: &[FileKey]) -> (usize, usize) {
        let mut succeeded = 0;
        let mut failed = 0;
        for key in keys {
            match self.store.status(key) {
                Some(UploadStatus::Success) => succeeded += 1,
                Some(status) if status.is_terminal() => failed += 1,
                _ => {}
            }
        }
        (succeeded, failed)
    }

    fn notify(&self, notice: UploadNotice) {
        let _ = self.notices_tx.send(notice);
    }
}

// Hash, signed URL, PUT; failures settle on this file alone, the scheduler never sees them.
async fn upload_one(
    client: StorageClient,
    transfer: TransferClient,
    store: Arc<BatchStore>,
    handles: Arc<LiveHandles>,
    key: FileKey,
) {
    if !store.begin_upload(&key) {
        return;
    }
    let Some(source) = store.source(&key) else {
        return;
    };

    let digest = match transfer.content_md5(&source.path).await {
        Ok(digest) => digest,
        Err(err) => {
            store.fail_upload(&key, &format!("hash failed: {err}"));
            return;
        }
    };

    let Some(destination) = store.destination() else {
        return;
    };
    let remote_path = match remote_path_for(&destination.root, &source.name) {
        Ok(path) => path,
        Err(err) => {
            store.fail_upload(&key, &format!("failed to generate signed URL: {err}"));
            return;
        }
    };
    let ticket = match client
        .create_upload_url(&UploadRequest {
            destination: destination.id,
            path: remote_path,
            content_type: ContentKind::from_name(&source.name).as_str().to_string(),
            size: source.size,
            content_md5: digest,
        })
        .await
    {
        Ok(ticket) => ticket,
        Err(err) => {
            store.fail_upload(&key, &format!("failed to generate signed URL: {err}"));
            return;
        }
    };
    store.record_signed_url(&key, ticket.href.clone());

    let token = CancellationToken::new();
    handles.lock().unwrap().insert(key.clone(), token.clone());
    // The file may have been cancelled while the URL was being negotiated.
    if store.status(&key) != Some(UploadStatus::Uploading) {
        handles.lock().unwrap().remove(&key);
        return;
    }

    let total = source.size.max(1);
    let progress_store = Arc::clone(&store);
    let progress_key = key.clone();
    let result = transfer
        .upload_from_path(
            &ticket.href,
            &source.path,
            &wire_content_type(&source.name),
            move |sent| {
                progress_store
                    .update_progress(&progress_key, (sent.min(total) * 100 / total) as u8);
            },
            token,
        )
        .await;

    handles.lock().unwrap().remove(&key);

    match result {
        Ok(()) => store.complete_upload(&key),
        Err(TransferError::Cancelled) => {
            store.fail_upload(&key, "upload cancelled");
        }
        Err(TransferError::Status(status)) => {
            store.fail_upload(&key, &format!("upload failed with status {status}"));
        }
        Err(err) => {
            store.fail_upload(&key, &format!("upload failed: {err}"));
        }
    }
}

struct UploadingGuard {
    store: Arc<BatchStore>,
}

impl Drop for UploadingGuard {
    fn drop(&mut self) {
        self.store.set_uploading(false);
    }
}

fn read_limit(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

fn read_byte_limit(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
