use std::path::PathBuf;

use thiserror::Error;

use crate::model::Slot;

/// Failures of the file-level helpers. The text transforms themselves never
/// fail.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("zip backup failed: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("invalid set JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScriptError {
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> ScriptError {
        let path = path.into();
        move |source| ScriptError::Io { path, source }
    }
}

/// Rejected workbook edits.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("unknown set: {0}")]
    UnknownSet(String),
    #[error("set already exists: {0}")]
    SetExists(String),
    #[error("{set} has no item in {slot}")]
    EmptySlot { set: String, slot: Slot },
    #[error("{0} cannot take an Odyssey path")]
    NotPathItem(String),
}
