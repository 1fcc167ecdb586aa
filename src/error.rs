use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validating,
    Parsing,
    ExtractingMetadata,
    Cleaning,
    PreservingCode,
    ResolvingAssets,
    Rendering,
    PostProcessing,
    Assembling,
    Writing,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::Parsing => "parsing",
            Stage::ExtractingMetadata => "extracting metadata",
            Stage::Cleaning => "cleaning",
            Stage::PreservingCode => "preserving code",
            Stage::ResolvingAssets => "resolving assets",
            Stage::Rendering => "rendering",
            Stage::PostProcessing => "post-processing",
            Stage::Assembling => "assembling",
            Stage::Writing => "writing",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("File does not exist: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Path is not a file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("File is not an HTML file: {0}")]
    WrongExtension(String),

    #[error("File is empty")]
    Empty,

    #[error("File is too large: {size} bytes (limit {limit})")]
    TooLarge { size: u64, limit: u64 },

    #[error("Cannot read file: {0}")]
    Unreadable(#[source] io::Error),
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Invalid HTML file: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to write output file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ConvertError {
    /// The stage the conversion terminated in.
    pub fn stage(&self) -> Stage {
        match self {
            ConvertError::Validation(_) | ConvertError::Config(_) => Stage::Validating,
            ConvertError::Write { .. } => Stage::Writing,
        }
    }
}
