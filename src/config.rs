use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_IMAGES_DIR: &str = "images";
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Settings for a single conversion. Unset fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Directory for the Markdown file. `None` places it next to the input.
    pub output_dir: Option<PathBuf>,
    /// Images directory, relative to the output file's directory.
    pub images_dir: String,
    pub preserve_images: bool,
    pub clean_html: bool,
    pub add_metadata: bool,
    pub max_file_size: u64,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            images_dir: DEFAULT_IMAGES_DIR.to_string(),
            preserve_images: true,
            clean_html: true,
            add_metadata: true,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl ConversionConfig {
    /// Load a config file. `.json` and `.yaml`/`.yml` are recognised.
    pub fn from_file(path: &Path) -> Result<Self, ConvertError> {
        let text = fs::read_to_string(path).map_err(|e| {
            ConvertError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;

        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        let parsed: Result<Self, String> = match ext.as_str() {
            "json" => serde_json::from_str(&text).map_err(|e| e.to_string()),
            "yaml" | "yml" => serde_yaml::from_str(&text).map_err(|e| e.to_string()),
            other => Err(format!("unsupported config format: .{}", other)),
        };

        parsed.map_err(|e| ConvertError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Images directory name with a trailing separator removed, for use in
    /// Markdown links.
    pub fn images_link_prefix(&self) -> &str {
        let trimmed = self.images_dir.trim_end_matches(['/', '\\']);
        if trimmed.is_empty() {
            DEFAULT_IMAGES_DIR
        } else {
            trimmed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let config = ConversionConfig::default();
        assert_eq!(config.output_dir, None);
        assert_eq!(config.images_dir, "images");
        assert!(config.preserve_images);
        assert!(config.clean_html);
        assert!(config.add_metadata);
        assert_eq!(config.max_file_size, 50 * 1024 * 1024);
    }

    #[test]
    fn json_partial_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"images_dir": "assets", "add_metadata": false}"#).unwrap();

        let config = ConversionConfig::from_file(&path).unwrap();
        assert_eq!(config.images_dir, "assets");
        assert!(!config.add_metadata);
        assert!(config.preserve_images);
    }

    #[test]
    fn yaml_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "output_dir: out\nclean_html: false\n").unwrap();

        let config = ConversionConfig::from_file(&path).unwrap();
        assert_eq!(config.output_dir, Some(PathBuf::from("out")));
        assert!(!config.clean_html);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        fs::write(&path, "x=1").unwrap();

        let err = ConversionConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConvertError::Config(msg) if msg.contains("unsupported")));
    }

    #[test]
    fn link_prefix_strips_trailing_slash() {
        let config = ConversionConfig {
            images_dir: "media/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.images_link_prefix(), "media");
    }
}
