//! Document renderer: template + registration → PDF on local disk

use registrar_common::Registration;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::assets::TemplateAssets;
use crate::binding::{compose, field_map};
use crate::error::Result;
use crate::kind::DocumentKind;
use crate::rasterize::{PageSetup, Rasterizer};

/// Renders registrations into documents in an output directory
pub struct DocumentRenderer {
    assets: TemplateAssets,
    rasterizer: Arc<dyn Rasterizer>,
    output_dir: PathBuf,
}

impl DocumentRenderer {
    pub fn new(
        assets: TemplateAssets,
        rasterizer: Arc<dyn Rasterizer>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            assets,
            rasterizer,
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Compose the populated HTML for a document without rasterizing it
    pub async fn compose(&self, kind: DocumentKind, registration: &Registration) -> Result<String> {
        let template = self.assets.load(kind).await?;
        let fields = field_map(kind, registration);
        compose(&template, &fields, registration.form.photo.as_deref())
    }

    /// Render a document and return the path of the written file
    pub async fn render(&self, kind: DocumentKind, registration: &Registration) -> Result<PathBuf> {
        let output = self.output_path(kind, registration);
        self.render_to(kind, registration, &output).await?;
        Ok(output)
    }

    /// Fresh, unique path in the output directory for one document
    pub fn output_path(&self, kind: DocumentKind, registration: &Registration) -> PathBuf {
        self.output_dir.join(output_file_name(kind, registration))
    }

    /// Render a document to `output`
    ///
    /// A partial file is removed when rasterization fails. Callers that may
    /// cancel the returned future own the cleanup of `output`.
    pub async fn render_to(
        &self,
        kind: DocumentKind,
        registration: &Registration,
        output: &Path,
    ) -> Result<()> {
        let html = self.compose(kind, registration).await?;

        tokio::fs::create_dir_all(&self.output_dir).await?;

        if let Err(e) = self
            .rasterizer
            .rasterize(&html, PageSetup::a4(kind.landscape()), output)
            .await
        {
            if let Err(cleanup) = tokio::fs::remove_file(output).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove partial {}: {}", output.display(), cleanup);
                }
            }
            return Err(e);
        }

        info!("Rendered {} for {}", kind, registration.serial_number);
        debug!("{} written to {}", kind, output.display());

        Ok(())
    }
}

/// Reduce an applicant name to a safe file name component
///
/// Whitespace runs become a single `_`; anything other than ASCII
/// alphanumerics, `_` and `-` is dropped.
pub fn sanitize_file_component(name: &str) -> String {
    let joined = name.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();

    if cleaned.is_empty() {
        "applicant".to_string()
    } else {
        cleaned
    }
}

fn output_file_name(kind: DocumentKind, registration: &Registration) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let token = Uuid::new_v4().simple().to_string();

    format!(
        "{}_{}_{}_{}_{}.pdf",
        kind.slug(),
        sanitize_file_component(registration.applicant_name()),
        registration.serial_number,
        nanos,
        &token[..8]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use registrar_common::{RegistrationForm, SerialNumber};

    #[test]
    fn test_sanitize_collapses_whitespace() {
        assert_eq!(sanitize_file_component("Asha   Rao"), "Asha_Rao");
        assert_eq!(sanitize_file_component("  Asha\tK. Rao "), "Asha_K_Rao");
        assert_eq!(sanitize_file_component("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_file_component(""), "applicant");
        assert_eq!(sanitize_file_component("   "), "applicant");
    }

    #[test]
    fn test_output_names_are_unique() {
        let registration = Registration::stamp(
            SerialNumber::new(819),
            RegistrationForm {
                name: "Asha Rao".to_string(),
                ..Default::default()
            },
        );

        let a = output_file_name(DocumentKind::Certificate, &registration);
        let b = output_file_name(DocumentKind::Certificate, &registration);

        assert!(a.starts_with("certificate_Asha_Rao_000819_"));
        assert!(a.ends_with(".pdf"));
        assert_ne!(a, b);
    }
}
