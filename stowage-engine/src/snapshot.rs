use serde::Serialize;

use crate::batch::{FileKey, UploadBatch, UploadStatus};

#[derive(Debug, Clone, Serialize)]
pub struct FileSnapshot {
    pub key: FileKey,
    pub name: String,
    pub size: u64,
    pub status: UploadStatus,
    pub progress: u8,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSnapshot {
    pub files: Vec<FileSnapshot>,
    pub destination: String,
    pub is_uploading: bool,
    pub total_count: usize,
    pub completed_count: usize,
    pub total_size: u64,
    pub bytes_uploaded: u64,
    pub total_progress: u8,
    pub time_remaining: Option<u64>,
}

impl BatchSnapshot {
    pub(crate) fn from_batch(batch: &UploadBatch) -> Self {
        let files = batch
            .files()
            .map(|file| FileSnapshot {
                key: file.key.clone(),
                name: file.source.name.clone(),
                size: file.source.size,
                status: file.status,
                progress: file.progress,
                error: file.error.clone(),
            })
            .collect();
        Self {
            files,
            destination: batch.destination.root.clone(),
            is_uploading: batch.is_uploading,
            total_count: batch.len(),
            completed_count: batch.completed_count(),
            total_size: batch.total_size(),
            bytes_uploaded: batch.bytes_uploaded(),
            total_progress: batch.total_progress(),
            time_remaining: batch.time_remaining,
        }
    }
}
