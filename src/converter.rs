use crate::cleaner;
use crate::code_blocks;
use crate::config::ConversionConfig;
use crate::dom;
use crate::error::{ConvertError, Stage};
use crate::image::{self, AssetReference, AssetResolver};
use crate::markdown;
use crate::metadata::{self, Metadata};
use crate::postprocess;
use crate::reader::SourceDocument;
use kuchikiki::NodeRef;
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const MAX_FILENAME_CHARS: usize = 200;
const FALLBACK_FILENAME: &str = "converted_file";

static FORBIDDEN_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).unwrap());
static UNDERSCORE_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_+").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionStatus {
    Success,
    Failure,
}

/// Outcome of one conversion attempt.
#[derive(Debug, Serialize)]
pub struct ConversionResult {
    pub input_file: PathBuf,
    pub output_file: Option<PathBuf>,
    pub assets_folder: Option<PathBuf>,
    pub images_directory: Option<PathBuf>,
    pub content_length: usize,
    pub images_processed: usize,
    pub images: Vec<AssetReference>,
    pub metadata: Metadata,
    pub status: ConversionStatus,
    pub failed_stage: Option<Stage>,
    pub error: Option<String>,
}

impl ConversionResult {
    fn failure(input: &Path, err: &ConvertError) -> Self {
        Self {
            input_file: input.to_path_buf(),
            output_file: None,
            assets_folder: None,
            images_directory: None,
            content_length: 0,
            images_processed: 0,
            images: Vec::new(),
            metadata: Metadata::default(),
            status: ConversionStatus::Failure,
            failed_stage: Some(err.stage()),
            error: Some(err.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ConversionStatus::Success
    }
}

/// Converts one HTML snapshot. Each converter logs inside its own span.
pub struct Converter {
    input: PathBuf,
    output_file: Option<PathBuf>,
    config: ConversionConfig,
    span: tracing::Span,
}

impl Converter {
    pub fn new(
        input: impl Into<PathBuf>,
        output_file: Option<PathBuf>,
        config: ConversionConfig,
    ) -> Self {
        let input = input.into();
        let span = tracing::info_span!("conversion", input = %input.display());
        Self {
            input,
            output_file,
            config,
            span,
        }
    }

    pub fn convert(&self) -> Result<ConversionResult, ConvertError> {
        let _guard = self.span.enter();
        tracing::info!("converting to markdown");

        enter(Stage::Validating);
        let source = SourceDocument::open(&self.input, self.config.max_file_size)?;
        let assets_folder = source.locate_asset_folder();
        if let Some(ref folder) = assets_folder {
            tracing::debug!(folder = %folder.display(), "found asset folder");
        }

        let output_path = resolve_output_path(&source, self.output_file.as_deref(), &self.config);
        let images_dir = output_root(&output_path).join(&self.config.images_dir);
        let resolver = self.config.preserve_images.then(|| {
            AssetResolver::new(
                assets_folder.as_deref(),
                &source.base_dir,
                images_dir,
                self.config.images_link_prefix(),
            )
        });

        enter(Stage::Parsing);
        let document = dom::parse_html(&source.text);
        let transformed = transform(&document, &self.config, resolver.as_ref());

        enter(Stage::Assembling);
        let content =
            assemble_document(&transformed.metadata, &transformed.body, self.config.add_metadata);

        enter(Stage::Writing);
        write_atomically(&output_path, &content)?;

        enter(Stage::Done);
        let images_directory = resolver.map(|r| r.images_dir().to_path_buf());
        tracing::info!(
            output = %output_path.display(),
            images = transformed.images.len(),
            "conversion complete"
        );

        Ok(ConversionResult {
            input_file: self.input.clone(),
            output_file: Some(output_path),
            assets_folder,
            images_directory,
            content_length: content.chars().count(),
            images_processed: transformed.images.len(),
            images: transformed.images,
            metadata: transformed.metadata,
            status: ConversionStatus::Success,
            failed_stage: None,
            error: None,
        })
    }
}

/// Convert `input`, folding any failure into the returned result.
pub fn convert_file(
    input: &Path,
    output_file: Option<&Path>,
    config: &ConversionConfig,
) -> ConversionResult {
    let converter = Converter::new(input, output_file.map(Path::to_path_buf), config.clone());
    match converter.convert() {
        Ok(result) => result,
        Err(err) => {
            tracing::error!(input = %input.display(), error = %err, "conversion failed");
            ConversionResult::failure(input, &err)
        }
    }
}

/// Validate and read `input`, returning only its metadata. Writes nothing.
pub fn extract_file_metadata(
    input: &Path,
    config: &ConversionConfig,
) -> Result<Metadata, ConvertError> {
    let source = SourceDocument::open(input, config.max_file_size)?;
    let document = dom::parse_html(&source.text);
    Ok(metadata::extract_metadata(&document))
}

/// Convert an HTML string in memory. Images are left as they are.
pub fn convert_html_content(html: &str, config: &ConversionConfig) -> String {
    let document = dom::parse_html(html);
    let transformed = transform(&document, config, None);
    assemble_document(&transformed.metadata, &transformed.body, config.add_metadata)
}

struct Transformed {
    metadata: Metadata,
    body: String,
    images: Vec<AssetReference>,
}

fn transform(
    document: &NodeRef,
    config: &ConversionConfig,
    resolver: Option<&AssetResolver<'_>>,
) -> Transformed {
    enter(Stage::ExtractingMetadata);
    let metadata = metadata::extract_metadata(document);
    tracing::debug!(entries = metadata.len(), "extracted metadata");

    enter(Stage::Cleaning);
    if config.clean_html {
        let removed = cleaner::prune_boilerplate(document);
        tracing::debug!(removed, "pruned boilerplate");
    }
    let content = cleaner::select_main_content(document);

    enter(Stage::PreservingCode);
    let blocks = code_blocks::preserve_code_blocks(&content);
    tracing::debug!(blocks, "preserved code blocks");

    enter(Stage::ResolvingAssets);
    let images = resolver
        .map(|r| r.resolve_images(&content))
        .unwrap_or_default();
    image::apply_default_alt(&content);

    enter(Stage::Rendering);
    let raw = markdown::render_markdown(&content);

    enter(Stage::PostProcessing);
    let body = postprocess::process_markdown(&raw);

    Transformed {
        metadata,
        body,
        images,
    }
}

fn enter(stage: Stage) {
    tracing::debug!(%stage, "stage");
}

/// Frontmatter (optional), title and article information, a rule, then the
/// body. Always ends with a single newline.
pub fn assemble_document(metadata: &Metadata, body: &str, add_metadata: bool) -> String {
    let mut content = String::new();

    if add_metadata {
        content.push_str(&metadata::format_frontmatter(metadata));
    }
    content.push_str(&metadata::format_header(metadata));
    content.push_str("---\n\n");
    content.push_str(body);

    format!("{}\n", content.trim_end())
}

pub fn resolve_output_path(
    source: &SourceDocument,
    output_file: Option<&Path>,
    config: &ConversionConfig,
) -> PathBuf {
    if let Some(path) = output_file {
        return path.to_path_buf();
    }

    let dir = config
        .output_dir
        .clone()
        .unwrap_or_else(|| source.base_dir.clone());
    dir.join(sanitize_filename(&format!("{}.md", source.file_stem())))
}

fn output_root(output_path: &Path) -> PathBuf {
    match output_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

pub fn sanitize_filename(name: &str) -> String {
    let replaced = FORBIDDEN_CHARS_RE.replace_all(name, "_");
    let collapsed = UNDERSCORE_RUN_RE.replace_all(&replaced, "_");
    let trimmed = collapsed.trim_matches([' ', '.']);

    if trimmed.is_empty() {
        return FALLBACK_FILENAME.to_string();
    }
    if trimmed.chars().count() <= MAX_FILENAME_CHARS {
        return trimmed.to_string();
    }

    let (stem, ext) = match trimmed.rfind('.') {
        Some(i) if i > 0 => trimmed.split_at(i),
        _ => (trimmed, ""),
    };
    let keep = MAX_FILENAME_CHARS.saturating_sub(ext.chars().count());
    let stem: String = stem.chars().take(keep).collect();
    format!("{}{}", stem, ext)
}

/// Write through a sibling temporary file so a failure leaves nothing behind.
fn write_atomically(path: &Path, content: &str) -> Result<(), ConvertError> {
    let write_err = |source| ConvertError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string());
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()));

    if let Err(e) = fs::write(&tmp, content) {
        let _ = fs::remove_file(&tmp);
        return Err(write_err(e));
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(write_err(e));
    }
    Ok(())
}
