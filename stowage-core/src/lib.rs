mod client;

pub use client::{Destination, StorageClient, StorageError, UploadRequest, UploadTicket};
