use crate::error::ValidationError;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const SUPPORTED_EXTENSIONS: &[&str] = &["html", "htm"];

/// A validated HTML snapshot read from disk.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub text: String,
    pub base_dir: PathBuf,
}

impl SourceDocument {
    /// Validate and read `path`. Nothing is written on failure.
    pub fn open(path: &Path, max_file_size: u64) -> Result<Self, ValidationError> {
        if !path.exists() {
            return Err(ValidationError::NotFound(path.to_path_buf()));
        }
        if !path.is_file() {
            return Err(ValidationError::NotAFile(path.to_path_buf()));
        }

        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            let shown = if ext.is_empty() {
                "(none)".to_string()
            } else {
                format!(".{}", ext)
            };
            return Err(ValidationError::WrongExtension(shown));
        }

        let size = fs::metadata(path)
            .map_err(ValidationError::Unreadable)?
            .len();
        if size == 0 {
            return Err(ValidationError::Empty);
        }
        if size > max_file_size {
            return Err(ValidationError::TooLarge {
                size,
                limit: max_file_size,
            });
        }

        let bytes = fs::read(path).map_err(ValidationError::Unreadable)?;
        let text = decode_text(bytes);
        if text.trim().is_empty() {
            return Err(ValidationError::Empty);
        }

        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            path: path.to_path_buf(),
            text,
            base_dir,
        })
    }

    pub fn file_stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Find the sibling folder holding the snapshot's saved resources.
    ///
    /// Tries `<stem>_files`, `<stem>_assets` and `<filename>_files`, in that
    /// order, and returns the first one that is a directory.
    pub fn locate_asset_folder(&self) -> Option<PathBuf> {
        let stem = self.file_stem();
        let name = self
            .path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        [
            format!("{}_files", stem),
            format!("{}_assets", stem),
            format!("{}_files", name),
        ]
        .iter()
        .map(|candidate| self.base_dir.join(candidate))
        .find(|candidate| candidate.is_dir())
    }
}

/// UTF-8 first, Latin-1 when the bytes are not valid UTF-8.
pub fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => err.into_bytes().iter().map(|&b| char::from(b)).collect(),
    }
}

/// Outcome of a validate-only check.
#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub file_path: PathBuf,
    pub is_valid: bool,
    pub message: String,
    pub file_exists: bool,
    pub file_size: u64,
}

pub fn validate_html_file(path: &Path, max_file_size: u64) -> ValidationReport {
    let file_exists = path.exists();
    let file_size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);

    let (is_valid, message) = match SourceDocument::open(path, max_file_size) {
        Ok(_) => (true, "Valid HTML file".to_string()),
        Err(e) => (false, e.to_string()),
    };

    ValidationReport {
        file_path: path.to_path_buf(),
        is_valid,
        message,
        file_exists,
        file_size,
    }
}
