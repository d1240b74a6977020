//! Local inventory scanner

use std::path::Path;
use tracing::debug;

use crate::error::{Result, SyncError};

/// An immediate child of the local root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    pub name: String,

    /// True only for real directories; symbolic links are never followed
    pub is_dir: bool,

    /// True for real directories and for symbolic links whose target is one
    pub resolves_to_dir: bool,
}

impl LocalEntry {
    /// A real directory
    pub fn directory(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_dir: true,
            resolves_to_dir: true,
        }
    }

    /// A file, or anything else that is not a directory
    pub fn other(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_dir: false,
            resolves_to_dir: false,
        }
    }
}

/// List the immediate children of `root`, sorted by name
pub async fn scan(root: &Path) -> Result<Vec<LocalEntry>> {
    let unreadable = |reason: String| SyncError::PathUnreadable {
        path: root.to_path_buf(),
        reason,
    };

    let metadata = tokio::fs::metadata(root)
        .await
        .map_err(|e| unreadable(e.to_string()))?;
    if !metadata.is_dir() {
        return Err(unreadable("not a directory".to_string()));
    }

    let mut reader = tokio::fs::read_dir(root)
        .await
        .map_err(|e| unreadable(e.to_string()))?;

    let mut entries = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .map_err(|e| unreadable(e.to_string()))?
    {
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| unreadable(e.to_string()))?;

        let is_dir = file_type.is_dir();
        let resolves_to_dir = if file_type.is_symlink() {
            tokio::fs::metadata(entry.path())
                .await
                .map(|target| target.is_dir())
                .unwrap_or(false)
        } else {
            is_dir
        };

        let entry = match entry.file_name().into_string() {
            Ok(name) => LocalEntry {
                name,
                is_dir,
                resolves_to_dir,
            },
            Err(raw) => {
                debug!("Entry {:?} is not valid UTF-8, never treating it as a repository", raw);
                LocalEntry::other(&raw.to_string_lossy())
            }
        };
        entries.push(entry);
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    debug!("Found {} entries in {}", entries.len(), root.display());
    Ok(entries)
}
