use crate::error::{Result, WeaveError};
use crate::fs_utils::{modified_time, read_file_contents};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A top-level file being rendered.
///
/// `modified` is the document's freshness timestamp. Rendering a document
/// advances it to the newest modification time among the files it includes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: PathBuf,
    pub contents: String,
    pub modified: SystemTime,
}

impl Document {
    pub fn new(
        path: impl Into<PathBuf>,
        contents: impl Into<String>,
        modified: SystemTime,
    ) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
            modified,
        }
    }

    /// Builds a document from raw bytes handed over by a pipeline
    ///
    /// # Errors
    ///
    /// Returns `WeaveError::InvalidInput` if the bytes are not UTF-8 text.
    pub fn from_bytes(
        path: impl Into<PathBuf>,
        bytes: Vec<u8>,
        modified: SystemTime,
    ) -> Result<Self> {
        let path = path.into();
        let contents = String::from_utf8(bytes).map_err(|_| {
            WeaveError::invalid_input(format!("{} is not UTF-8 text", path.display()))
        })?;
        Ok(Self::new(path, contents, modified))
    }

    /// Reads a document and its modification time from disk
    ///
    /// # Errors
    ///
    /// - `WeaveError::NotFound` if the file doesn't exist.
    /// - `WeaveError::Io` on read failures.
    pub fn load(path: &Path) -> Result<Self> {
        let modified = modified_time(path)?;
        let contents = read_file_contents(path)?;
        Ok(Self::new(path, contents, modified))
    }
}
