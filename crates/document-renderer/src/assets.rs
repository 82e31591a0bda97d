//! Template asset loading
//!
//! Each document kind has an HTML template and a stylesheet. Both kinds share
//! two logo images, which are inlined as base64 data URIs so the composed
//! document never fetches anything at render time.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{RenderError, Result};
use crate::kind::DocumentKind;

/// Default file names of the two logos
pub const DEFAULT_LOGOS: [&str; 2] = ["logo-primary.png", "logo-secondary.png"];

/// Logo image ready for inlining
#[derive(Debug, Clone)]
pub struct InlineImage {
    /// File name the template refers to in `<img src="...">`
    pub file_name: String,

    /// `data:` URI carrying the image bytes
    pub data_uri: String,
}

/// Everything needed to compose one document
#[derive(Debug, Clone)]
pub struct LoadedTemplate {
    pub html: String,
    pub stylesheet: String,
    pub logos: Vec<InlineImage>,
}

/// Location of the template assets on disk
#[derive(Debug, Clone)]
pub struct TemplateAssets {
    dir: PathBuf,
    logos: Vec<String>,
}

impl TemplateAssets {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            logos: DEFAULT_LOGOS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Override the logo file names
    pub fn with_logos(mut self, logos: Vec<String>) -> Self {
        self.logos = logos;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load template, stylesheet and logos for a document kind
    ///
    /// Any missing file fails the load.
    pub async fn load(&self, kind: DocumentKind) -> Result<LoadedTemplate> {
        let html = read_text(&self.dir.join(kind.template_file())).await?;
        let stylesheet = read_text(&self.dir.join(kind.stylesheet_file())).await?;

        let mut logos = Vec::with_capacity(self.logos.len());
        for name in &self.logos {
            let path = self.dir.join(name);
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|source| RenderError::MissingAsset {
                    path: path.clone(),
                    source,
                })?;

            logos.push(InlineImage {
                file_name: name.clone(),
                data_uri: data_uri(image_mime(&path), &bytes),
            });
        }

        debug!(
            "Loaded {} template with {} logo(s) from {}",
            kind,
            logos.len(),
            self.dir.display()
        );

        Ok(LoadedTemplate {
            html,
            stylesheet,
            logos,
        })
    }
}

async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| RenderError::MissingAsset {
            path: path.to_path_buf(),
            source,
        })
}

/// Encode bytes as a base64 `data:` URI
pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

fn image_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "svg" => "image/svg+xml",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/png",
    }
}
