use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::Serialize;
use stowage_core::Destination;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub size: u64,
    pub modified_ms: u64,
    pub path: PathBuf,
}

impl SourceFile {
    pub async fn from_path(path: &Path) -> io::Result<Self> {
        let meta = tokio::fs::metadata(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let modified_ms = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Ok(Self {
            name,
            size: meta.len(),
            modified_ms,
            path: path.to_path_buf(),
        })
    }

    pub fn key(&self) -> FileKey {
        FileKey::new(&self.name, self.size, self.modified_ms)
    }
}

// Files sharing name, size and mtime collapse into a single entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FileKey(String);

impl FileKey {
    pub fn new(name: &str, size: u64, modified_ms: u64) -> Self {
        Self(format!("{name}-{size}-{modified_ms}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Success,
    Error,
    Cancelled,
}

impl UploadStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            UploadStatus::Success | UploadStatus::Error | UploadStatus::Cancelled
        )
    }

    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }
}

#[derive(Debug, Clone)]
pub struct FileUpload {
    pub key: FileKey,
    pub source: SourceFile,
    pub status: UploadStatus,
    pub progress: u8,
    pub error: Option<String>,
    pub signed_url: Option<Url>,
}

impl FileUpload {
    pub fn new(source: SourceFile) -> Self {
        Self {
            key: source.key(),
            source,
            status: UploadStatus::Pending,
            progress: 0,
            error: None,
            signed_url: None,
        }
    }

    pub fn bytes_uploaded(&self) -> u64 {
        self.source.size * u64::from(self.progress) / 100
    }
}

#[derive(Debug, Clone)]
pub struct UploadBatch {
    files: HashMap<FileKey, FileUpload>,
    order: Vec<FileKey>,
    pub destination: Destination,
    pub is_uploading: bool,
    pub time_remaining: Option<u64>,
}

impl UploadBatch {
    pub fn new(destination: Destination, files: Vec<FileUpload>) -> Self {
        let mut map = HashMap::with_capacity(files.len());
        let mut order = Vec::with_capacity(files.len());
        for file in files {
            if !map.contains_key(&file.key) {
                order.push(file.key.clone());
            }
            map.insert(file.key.clone(), file);
        }
        Self {
            files: map,
            order,
            destination,
            is_uploading: false,
            time_remaining: None,
        }
    }

    pub fn get(&self, key: &FileKey) -> Option<&FileUpload> {
        self.files.get(key)
    }

    pub fn get_mut(&mut self, key: &FileKey) -> Option<&mut FileUpload> {
        self.files.get_mut(key)
    }

    pub fn files(&self) -> impl Iterator<Item = &FileUpload> {
        self.order.iter().filter_map(|key| self.files.get(key))
    }

    pub fn keys(&self) -> &[FileKey] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn total_size(&self) -> u64 {
        self.files.values().map(|f| f.source.size).sum()
    }

    pub fn bytes_uploaded(&self) -> u64 {
        self.files.values().map(FileUpload::bytes_uploaded).sum()
    }

    pub fn completed_count(&self) -> usize {
        self.files
            .values()
            .filter(|f| f.status == UploadStatus::Success)
            .count()
    }

    pub fn total_progress(&self) -> u8 {
        let total = self.total_size();
        if total == 0 {
            // All-empty batches fall back to averaging per-file progress.
            if self.files.is_empty() {
                return 0;
            }
            let sum: u32 = self.files.values().map(|f| u32::from(f.progress)).sum();
            return (sum / self.files.len() as u32) as u8;
        }
        (self.bytes_uploaded() * 100 / total).min(100) as u8
    }
}
