use std::path::{Component, Path};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("file name is empty")]
    EmptyName,
    #[error("remote path contains unsupported component")]
    UnsupportedComponent,
}

// Remote paths are POSIX-like ("/team/photos/cat.png") regardless of the local OS.
pub fn remote_path_for(dir: &str, name: &str) -> Result<String, PathError> {
    if name.is_empty() {
        return Err(PathError::EmptyName);
    }

    let mut parts = Vec::new();
    push_components(&mut parts, dir)?;
    let dir_parts = parts.len();
    push_components(&mut parts, name)?;
    if parts.len() == dir_parts {
        return Err(PathError::EmptyName);
    }

    Ok(format!("/{}", parts.join("/")))
}

fn push_components(parts: &mut Vec<String>, value: &str) -> Result<(), PathError> {
    for component in Path::new(value).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::RootDir | Component::CurDir => continue,
            Component::ParentDir | Component::Prefix(_) => {
                return Err(PathError::UnsupportedComponent);
            }
        }
    }
    Ok(())
}
