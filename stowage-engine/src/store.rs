use std::sync::RwLock;

use stowage_core::Destination;
use url::Url;

use crate::batch::{FileKey, FileUpload, SourceFile, UploadBatch, UploadStatus};
use crate::snapshot::BatchSnapshot;

// One batch at a time; writes addressed to keys the current batch lacks are no-ops.
#[derive(Default)]
pub struct BatchStore {
    inner: RwLock<Option<UploadBatch>>,
}

impl BatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_batch(&self, batch: UploadBatch) {
        *self.inner.write().unwrap() = Some(batch);
    }

    pub fn clear(&self) {
        *self.inner.write().unwrap() = None;
    }

    pub fn has_batch(&self) -> bool {
        self.inner.read().unwrap().is_some()
    }

    pub fn destination(&self) -> Option<Destination> {
        let guard = self.inner.read().unwrap();
        guard.as_ref().map(|batch| batch.destination.clone())
    }

    pub fn source(&self, key: &FileKey) -> Option<SourceFile> {
        let guard = self.inner.read().unwrap();
        guard
            .as_ref()
            .and_then(|batch| batch.get(key))
            .map(|file| file.source.clone())
    }

    pub fn status(&self, key: &FileKey) -> Option<UploadStatus> {
        let guard = self.inner.read().unwrap();
        guard
            .as_ref()
            .and_then(|batch| batch.get(key))
            .map(|file| file.status)
    }

    // Only from Pending; files cancelled before start or from a replaced batch stay put.
    pub fn begin_upload(&self, key: &FileKey) -> bool {
        self.with_file(key, |file| {
            if file.status != UploadStatus::Pending {
                return false;
            }
            file.status = UploadStatus::Uploading;
            file.progress = 0;
            file.error = None;
            true
        })
        .unwrap_or(false)
    }

    pub fn complete_upload(&self, key: &FileKey) {
        self.with_file(key, |file| {
            if file.status.is_active() {
                file.status = UploadStatus::Success;
                file.progress = 100;
                file.error = None;
            }
        });
    }

    pub fn fail_upload(&self, key: &FileKey, message: &str) -> bool {
        self.with_file(key, |file| {
            if !file.status.is_active() {
                return false;
            }
            file.status = UploadStatus::Error;
            file.error = Some(message.to_string());
            true
        })
        .unwrap_or(false)
    }

    pub fn fail_all_active(&self, message: &str) -> usize {
        let mut guard = self.inner.write().unwrap();
        let Some(batch) = guard.as_mut() else {
            return 0;
        };
        let keys: Vec<FileKey> = batch.keys().to_vec();
        let mut changed = 0;
        for key in keys {
            if let Some(file) = batch.get_mut(&key) {
                if file.status.is_active() {
                    file.status = UploadStatus::Error;
                    file.error = Some(message.to_string());
                    changed += 1;
                }
            }
        }
        changed
    }

    pub fn reset_for_retry(&self, key: &FileKey) -> bool {
        self.with_file(key, |file| {
            if file.status != UploadStatus::Error {
                return false;
            }
            file.status = UploadStatus::Pending;
            file.progress = 0;
            file.error = None;
            file.signed_url = None;
            true
        })
        .unwrap_or(false)
    }

    pub fn failed_keys(&self) -> Vec<FileKey> {
        let guard = self.inner.read().unwrap();
        guard
            .as_ref()
            .map(|batch| {
                batch
                    .files()
                    .filter(|file| file.status == UploadStatus::Error)
                    .map(|file| file.key.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn record_signed_url(&self, key: &FileKey, url: Url) {
        self.with_file(key, |file| {
            if file.status == UploadStatus::Uploading {
                file.signed_url = Some(url);
            }
        });
    }

    // Ticks land only while in flight; a cancelled transfer cannot move the bar late.
    pub fn update_progress(&self, key: &FileKey, progress: u8) {
        self.with_file(key, |file| {
            if file.status == UploadStatus::Uploading {
                file.progress = progress.min(100);
            }
        });
    }

    pub fn set_uploading(&self, value: bool) {
        if let Some(batch) = self.inner.write().unwrap().as_mut() {
            batch.is_uploading = value;
        }
    }

    pub fn is_uploading(&self) -> bool {
        let guard = self.inner.read().unwrap();
        guard.as_ref().is_some_and(|batch| batch.is_uploading)
    }

    pub fn clear_time_remaining(&self) {
        if let Some(batch) = self.inner.write().unwrap().as_mut() {
            batch.time_remaining = None;
        }
    }

    pub fn snapshot(&self) -> Option<BatchSnapshot> {
        let guard = self.inner.read().unwrap();
        guard.as_ref().map(BatchSnapshot::from_batch)
    }

    fn with_file<R>(&self, key: &FileKey, op: impl FnOnce(&mut FileUpload) -> R) -> Option<R> {
        let mut guard = self.inner.write().unwrap();
        guard.as_mut().and_then(|batch| batch.get_mut(key)).map(op)
    }
}
