mod batch;
mod content_type;
mod engine;
mod intake;
mod paths;
mod snapshot;
mod store;
mod transfer;

pub use batch::{FileKey, FileUpload, SourceFile, UploadBatch, UploadStatus};
pub use engine::{BatchReport, EngineConfig, EngineError, UploadEngine, UploadNotice};
pub use snapshot::{BatchSnapshot, FileSnapshot};
pub use store::BatchStore;
pub use transfer::{TransferClient, TransferError};
