use std::collections::HashMap;

use crate::batch::{FileKey, FileUpload, SourceFile};

#[derive(Debug)]
pub struct IntakePlan {
    pub admitted: Vec<FileUpload>,
    pub oversized: Vec<SourceFile>,
}

// Duplicate keys collapse; the first occurrence keeps its position, the last payload wins.
pub fn partition(files: Vec<SourceFile>, max_file_bytes: u64) -> IntakePlan {
    let mut admitted: Vec<FileUpload> = Vec::new();
    let mut positions: HashMap<FileKey, usize> = HashMap::new();
    let mut oversized = Vec::new();

    for source in files {
        if source.size > max_file_bytes {
            oversized.push(source);
            continue;
        }
        let key = source.key();
        match positions.get(&key) {
            Some(&at) => admitted[at] = FileUpload::new(source),
            None => {
                positions.insert(key, admitted.len());
                admitted.push(FileUpload::new(source));
            }
        }
    }

    IntakePlan {
        admitted,
        oversized,
    }
}
