mod cleaner;
mod cli;
mod code_blocks;
mod config;
mod converter;
mod dom;
mod error;
mod image;
mod markdown;
mod metadata;
mod postprocess;
mod reader;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::{self, Write};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(io::stderr)
        .init();

    let cli = cli::Cli::parse();
    let config = cli.conversion_config()?;

    if cli.reads_stdin() {
        let html = io::read_to_string(io::stdin()).context("Failed to read HTML from stdin")?;
        let markdown = converter::convert_html_content(&html, &config);
        io::stdout()
            .write_all(markdown.as_bytes())
            .context("Failed to write Markdown to stdout")?;
        return Ok(());
    }

    if cli.validate {
        let report = reader::validate_html_file(&cli.input, config.max_file_size);
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!(
                "{}: {}",
                if report.is_valid { "Valid" } else { "Invalid" },
                report.message
            );
        }
        if !report.is_valid {
            bail!("{} is not convertible", cli.input.display());
        }
        return Ok(());
    }

    if cli.metadata {
        let metadata = converter::extract_file_metadata(&cli.input, &config)
            .with_context(|| format!("Failed to read metadata from {}", cli.input.display()))?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        } else if metadata.is_empty() {
            println!("No metadata found");
        } else {
            for (key, value) in metadata.iter() {
                println!("{}: {}", key.as_str(), value);
            }
        }
        return Ok(());
    }

    let result = converter::convert_file(&cli.input, cli.output.as_deref(), &config);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    if !result.is_success() {
        bail!(
            "Conversion failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    }

    if !cli.json {
        let image_count = result.images_processed;
        eprintln!(
            "Converted {} ({} characters{}) to {}",
            cli.input.display(),
            result.content_length,
            if image_count > 0 {
                format!(", {} images", image_count)
            } else {
                String::new()
            },
            result
                .output_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        );
    }

    Ok(())
}
