use crate::dom;
use kuchikiki::NodeRef;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULT_ALT: &str = "Image";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetKind {
    Remote,
    DataUri,
    LocalResolved,
    LocalUnresolved,
}

/// One `<img>` encountered during resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetReference {
    pub src: String,
    pub kind: AssetKind,
    /// Rewritten link, relative to the output file, when resolved.
    pub destination: Option<String>,
}

/// Maps local image references to files copied under the images directory.
pub struct AssetResolver<'a> {
    asset_folder: Option<&'a Path>,
    base_dir: &'a Path,
    images_dir: PathBuf,
    link_prefix: &'a str,
}

impl<'a> AssetResolver<'a> {
    pub fn new(
        asset_folder: Option<&'a Path>,
        base_dir: &'a Path,
        images_dir: PathBuf,
        link_prefix: &'a str,
    ) -> Self {
        Self {
            asset_folder,
            base_dir,
            images_dir,
            link_prefix,
        }
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Resolve every `<img>` with a non-empty `src` under `root`, rewriting
    /// `src` in place. Copy failures degrade to `LocalUnresolved`.
    pub fn resolve_images(&self, root: &NodeRef) -> Vec<AssetReference> {
        let mut references = Vec::new();

        for img in dom::select_all(root, "img") {
            let src = dom::attr(&img, "src").unwrap_or_default();
            let src = src.trim();
            if src.is_empty() {
                continue;
            }

            let reference = self.resolve(src);
            match reference.kind {
                AssetKind::DataUri => dom::set_attr(&img, "src", ""),
                AssetKind::LocalResolved => {
                    if let Some(ref link) = reference.destination {
                        dom::set_attr(&img, "src", link);
                    }
                }
                AssetKind::Remote | AssetKind::LocalUnresolved => {}
            }
            references.push(reference);
        }

        references
    }

    fn resolve(&self, src: &str) -> AssetReference {
        let unresolved = |kind| AssetReference {
            src: src.to_string(),
            kind,
            destination: None,
        };

        if is_remote(src) {
            return unresolved(AssetKind::Remote);
        }
        if src.starts_with("data:") {
            return unresolved(AssetKind::DataUri);
        }

        let relative = local_path(src);
        let Some(filename) = Path::new(relative)
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
        else {
            return unresolved(AssetKind::LocalUnresolved);
        };

        let Some(found) = self.find_source(relative, &filename) else {
            tracing::debug!(src, "image not found locally");
            return unresolved(AssetKind::LocalUnresolved);
        };

        if let Err(e) = self.copy_into_place(&found, &filename) {
            tracing::warn!(src, from = %found.display(), error = %e, "failed to copy image");
            return unresolved(AssetKind::LocalUnresolved);
        }

        AssetReference {
            src: src.to_string(),
            kind: AssetKind::LocalResolved,
            destination: Some(format!("{}/{}", self.link_prefix, filename)),
        }
    }

    /// Search order: asset folder by filename, asset folder by relative
    /// path, then the document's directory by relative path.
    fn find_source(&self, relative: &str, filename: &str) -> Option<PathBuf> {
        let mut candidates = Vec::with_capacity(3);
        if let Some(folder) = self.asset_folder {
            candidates.push(folder.join(filename));
            candidates.push(folder.join(relative));
        }
        candidates.push(self.base_dir.join(relative));

        candidates.into_iter().find(|p| p.is_file())
    }

    /// First writer wins: an existing destination is never overwritten.
    fn copy_into_place(&self, from: &Path, filename: &str) -> io::Result<()> {
        let dest = self.images_dir.join(filename);
        if dest.exists() {
            tracing::debug!(dest = %dest.display(), "image already present, not copying");
            return Ok(());
        }

        fs::create_dir_all(&self.images_dir)?;
        fs::copy(from, &dest)?;
        tracing::debug!(from = %from.display(), dest = %dest.display(), "copied image");
        Ok(())
    }
}

/// Give every `<img>` without an `alt` attribute the default text.
pub fn apply_default_alt(root: &NodeRef) -> usize {
    let mut applied = 0;
    for img in dom::select_all(root, "img") {
        if dom::attr(&img, "alt").is_none() {
            dom::set_attr(&img, "alt", DEFAULT_ALT);
            applied += 1;
        }
    }
    applied
}

fn is_remote(src: &str) -> bool {
    let lower = src.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("//")
}

/// Strip `file://`, query and fragment, and leading `./` segments.
fn local_path(src: &str) -> &str {
    let mut path = src.strip_prefix("file://").unwrap_or(src);
    if let Some(end) = path.find(['?', '#']) {
        path = &path[..end];
    }
    while let Some(rest) = path.strip_prefix("./") {
        path = rest;
    }
    path
}
