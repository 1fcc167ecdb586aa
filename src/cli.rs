use crate::config::ConversionConfig;
use crate::error::ConvertError;
use clap::Parser;
use std::path::{Path, PathBuf};

/// Convert saved HTML webpage snapshots to clean Markdown
#[derive(Parser, Debug)]
#[command(name = "snapshot2md", version, about)]
pub struct Cli {
    /// Path to the saved HTML file, or `-` to read HTML from stdin
    pub input: PathBuf,

    /// Output Markdown file. Defaults to `<stem>.md` in the output directory.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory for the Markdown file (default: next to the input)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Images directory name, relative to the output file
    #[arg(long)]
    pub images_dir: Option<String>,

    /// JSON or YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Leave image references untouched and copy nothing
    #[arg(long, default_value_t = false)]
    pub no_images: bool,

    /// Keep navigation, ads and other boilerplate
    #[arg(long, default_value_t = false)]
    pub no_cleanup: bool,

    /// Omit the YAML frontmatter block
    #[arg(long, default_value_t = false)]
    pub no_metadata: bool,

    /// Only check whether the input can be converted
    #[arg(long, default_value_t = false, conflicts_with = "metadata")]
    pub validate: bool,

    /// Only print the extracted metadata
    #[arg(long, default_value_t = false)]
    pub metadata: bool,

    /// Print results as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

impl Cli {
    pub fn reads_stdin(&self) -> bool {
        self.input == Path::new("-")
    }

    /// Config file values (or defaults) with command-line overrides applied.
    pub fn conversion_config(&self) -> Result<ConversionConfig, ConvertError> {
        let mut config = match self.config {
            Some(ref path) => ConversionConfig::from_file(path)?,
            None => ConversionConfig::default(),
        };

        if let Some(ref dir) = self.output_dir {
            config.output_dir = Some(dir.clone());
        }
        if let Some(ref dir) = self.images_dir {
            config.images_dir = dir.clone();
        }
        if self.no_images {
            config.preserve_images = false;
        }
        if self.no_cleanup {
            config.clean_html = false;
        }
        if self.no_metadata {
            config.add_metadata = false;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "snapshot2md",
            "page.html",
            "--images-dir",
            "media",
            "--no-images",
            "--no-metadata",
        ]);
        let config = cli.conversion_config().unwrap();
        assert_eq!(config.images_dir, "media");
        assert!(!config.preserve_images);
        assert!(!config.add_metadata);
        assert!(config.clean_html);
        assert!(!cli.reads_stdin());
    }

    #[test]
    fn dash_reads_stdin() {
        let cli = Cli::parse_from(["snapshot2md", "-"]);
        assert!(cli.reads_stdin());
    }

    #[test]
    fn validate_conflicts_with_metadata() {
        let parsed = Cli::try_parse_from(["snapshot2md", "a.html", "--validate", "--metadata"]);
        assert!(parsed.is_err());
    }
}
