//! Submission orchestrator
//!
//! Sequences one registration through serial allocation, rendering, upload,
//! persistence, the student confirmation and the pending queue.

use document_renderer::{DocumentKind, DocumentRenderer};
use registrar_common::{PendingNotification, Registration, RegistrationForm, SerialNumber};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::error::SubmissionError;
use crate::notifier::Notifier;
use crate::queue::PendingQueue;
use crate::serial::SerialAllocator;
use crate::store::RegistrationStore;
use crate::uploader::Uploader;

/// What the client gets back for a completed submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub serial_number: SerialNumber,
    pub certificate_url: Option<String>,
    pub application_form_url: Option<String>,
}

pub struct Registrar {
    allocator: SerialAllocator,
    renderer: DocumentRenderer,
    uploader: Arc<dyn Uploader>,
    store: Arc<dyn RegistrationStore>,
    notifier: Arc<Notifier>,
    queue: Arc<PendingQueue>,
    timeout: Duration,
}

impl Registrar {
    pub fn new(
        allocator: SerialAllocator,
        renderer: DocumentRenderer,
        uploader: Arc<dyn Uploader>,
        store: Arc<dyn RegistrationStore>,
        notifier: Arc<Notifier>,
        queue: Arc<PendingQueue>,
        timeout: Duration,
    ) -> Self {
        Self {
            allocator,
            renderer,
            uploader,
            store,
            notifier,
            queue,
            timeout,
        }
    }

    /// Process one submission end to end
    ///
    /// Render and persistence failures abort the submission. Upload and
    /// confirmation email failures are logged and the submission continues.
    pub async fn submit(&self, form: RegistrationForm) -> Result<SubmissionReceipt, SubmissionError> {
        let serial = self.allocator.next().await;
        let mut registration = Registration::stamp(serial, form);
        info!("Processing submission {}", serial);
        debug!(
            "Submission {} applicant: {:?}",
            serial,
            registration.applicant_name()
        );

        let certificate = self.render(DocumentKind::Certificate, &registration).await?;
        let application_form = self
            .render(DocumentKind::ApplicationForm, &registration)
            .await?;

        let result = self
            .deliver(&mut registration, certificate.path(), application_form.path())
            .await;

        certificate.remove().await;
        application_form.remove().await;

        result
    }

    /// Render one document under the pipeline timeout
    ///
    /// The output file is owned before rendering starts, so a render that
    /// times out or fails leaves nothing behind in the output directory.
    async fn render(
        &self,
        kind: DocumentKind,
        registration: &Registration,
    ) -> Result<ScratchFile, SubmissionError> {
        let step = match kind {
            DocumentKind::Certificate => "certificate render",
            DocumentKind::ApplicationForm => "application form render",
        };

        let output = ScratchFile::new(self.renderer.output_path(kind, registration));
        match tokio::time::timeout(
            self.timeout,
            self.renderer.render_to(kind, registration, output.path()),
        )
        .await
        {
            Ok(Ok(())) => Ok(output),
            Ok(Err(source)) => Err(SubmissionError::Render { kind, source }),
            Err(_) => Err(SubmissionError::Timeout {
                step,
                after: self.timeout,
            }),
        }
    }

    async fn deliver(
        &self,
        registration: &mut Registration,
        certificate: &Path,
        application_form: &Path,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let owner = registration.applicant_name().to_string();
        let (certificate_url, application_form_url) = tokio::join!(
            self.upload(DocumentKind::Certificate, certificate, &owner),
            self.upload(DocumentKind::ApplicationForm, application_form, &owner),
        );

        registration.attach_documents(certificate_url, application_form_url);
        registration.mark_submitted();

        if let Err(e) = self.persist(registration).await {
            if registration.certificate_url.is_some() || registration.application_form_url.is_some() {
                error!(
                    "Registration {} not saved but its documents were uploaded ({:?}, {:?})",
                    registration.serial_number,
                    registration.certificate_url,
                    registration.application_form_url
                );
            }
            return Err(e);
        }

        if let Err(e) = self
            .notifier
            .send_confirmation(registration, application_form)
            .await
        {
            warn!(
                "Confirmation email for {} not sent: {}",
                registration.serial_number, e
            );
        }

        self.queue
            .enqueue(PendingNotification::from(&*registration))
            .await;

        info!("Submission {} complete", registration.serial_number);

        Ok(SubmissionReceipt {
            serial_number: registration.serial_number,
            certificate_url: registration.certificate_url.clone(),
            application_form_url: registration.application_form_url.clone(),
        })
    }

    /// Upload one document; failure leaves its URL empty
    async fn upload(&self, kind: DocumentKind, path: &Path, owner: &str) -> Option<String> {
        match tokio::time::timeout(self.timeout, self.uploader.upload(path, owner)).await {
            Ok(Ok(url)) => Some(url),
            Ok(Err(e)) => {
                warn!("Upload of {} failed, continuing without URL: {}", kind, e);
                None
            }
            Err(_) => {
                warn!(
                    "Upload of {} timed out after {:?}, continuing without URL",
                    kind, self.timeout
                );
                None
            }
        }
    }

    async fn persist(&self, registration: &Registration) -> Result<(), SubmissionError> {
        tokio::time::timeout(self.timeout, self.store.save(registration))
            .await
            .map_err(|_| SubmissionError::Timeout {
                step: "persist",
                after: self.timeout,
            })??;
        Ok(())
    }
}

/// A rendered file removed once the submission is done with it
struct ScratchFile {
    path: Option<PathBuf>,
}

impl ScratchFile {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or(Path::new(""))
    }

    async fn remove(mut self) {
        if let Some(path) = self.path.take() {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StoreError, UploadError};
    use crate::mailer::LogMailer;
    use crate::store::MemoryRegistrationStore;
    use crate::uploader::LocalUploader;
    use async_trait::async_trait;
    use document_renderer::{
        PageSetup, PassthroughRasterizer, Rasterizer, RenderError, TemplateAssets,
    };
    use std::io::Write;
    use std::sync::Mutex;

    const TEMPLATE: &str =
        "<html><head><title>t</title></head><body><span id=\"name\"></span></body></html>";

    fn asset_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for kind in [DocumentKind::Certificate, DocumentKind::ApplicationForm] {
            std::fs::write(dir.path().join(kind.template_file()), TEMPLATE).unwrap();
            std::fs::write(dir.path().join(kind.stylesheet_file()), "body {}").unwrap();
        }
        std::fs::write(dir.path().join("logo-primary.png"), b"primary").unwrap();
        std::fs::write(dir.path().join("logo-secondary.png"), b"secondary").unwrap();
        dir
    }

    struct FailingUploader;

    #[async_trait]
    impl Uploader for FailingUploader {
        async fn upload(&self, _local_path: &Path, _owner: &str) -> Result<String, UploadError> {
            Err(UploadError::Rejected {
                status: 403,
                body: "denied".to_string(),
            })
        }
    }

    /// Store that accepts lookups but refuses every save
    struct RejectingStore;

    #[async_trait]
    impl RegistrationStore for RejectingStore {
        async fn save(&self, registration: &Registration) -> Result<(), StoreError> {
            Err(StoreError::DuplicateSerial(registration.serial_number))
        }

        async fn find_max_serial(&self) -> Result<Option<String>, StoreError> {
            Ok(None)
        }

        async fn find_all(&self) -> Result<Vec<Registration>, StoreError> {
            Ok(Vec::new())
        }

        async fn count(&self) -> Result<usize, StoreError> {
            Ok(0)
        }
    }

    /// Starts writing its output, then stalls past any reasonable timeout
    struct StalledRasterizer;

    #[async_trait]
    impl Rasterizer for StalledRasterizer {
        async fn rasterize(
            &self,
            html: &str,
            _setup: PageSetup,
            output: &Path,
        ) -> document_renderer::Result<()> {
            tokio::fs::write(output, html).await?;
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct Harness {
        registrar: Registrar,
        store: Arc<MemoryRegistrationStore>,
        queue: Arc<PendingQueue>,
        mailer: Arc<LogMailer>,
        output: tempfile::TempDir,
        _assets: tempfile::TempDir,
        _public: tempfile::TempDir,
    }

    fn harness(
        uploader: Option<Arc<dyn Uploader>>,
        store_override: Option<Arc<dyn RegistrationStore>>,
    ) -> Harness {
        harness_with(
            uploader,
            store_override,
            Arc::new(PassthroughRasterizer),
            Duration::from_secs(5),
        )
    }

    fn harness_with(
        uploader: Option<Arc<dyn Uploader>>,
        store_override: Option<Arc<dyn RegistrationStore>>,
        rasterizer: Arc<dyn Rasterizer>,
        timeout: Duration,
    ) -> Harness {
        let assets = asset_dir();
        let output = tempfile::tempdir().unwrap();
        let public = tempfile::tempdir().unwrap();

        let store = Arc::new(MemoryRegistrationStore::new());
        let active_store: Arc<dyn RegistrationStore> =
            store_override.unwrap_or_else(|| store.clone());
        let queue = Arc::new(PendingQueue::new());
        let mailer = Arc::new(LogMailer::new());

        let notifier = Arc::new(Notifier::new(
            mailer.clone(),
            active_store.clone(),
            queue.clone(),
            "faculty@institute.test".to_string(),
            timeout,
        ));
        let uploader = uploader.unwrap_or_else(|| {
            Arc::new(LocalUploader::new(
                public.path(),
                "http://files.test".to_string(),
                "registrations".to_string(),
            ))
        });

        let registrar = Registrar::new(
            SerialAllocator::new(active_store.clone(), 818, timeout),
            DocumentRenderer::new(
                TemplateAssets::new(assets.path()),
                rasterizer,
                output.path(),
            ),
            uploader,
            active_store,
            notifier,
            queue.clone(),
            timeout,
        );

        Harness {
            registrar,
            store,
            queue,
            mailer,
            output,
            _assets: assets,
            _public: public,
        }
    }

    fn form() -> RegistrationForm {
        RegistrationForm {
            name: "Asha Rao".to_string(),
            email: "asha@example.com".to_string(),
            course: "Welding".to_string(),
            ..Default::default()
        }
    }

    fn output_is_empty(h: &Harness) -> bool {
        std::fs::read_dir(h.output.path()).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_submit_runs_full_pipeline() {
        let h = harness(None, None);

        let receipt = h.registrar.submit(form()).await.unwrap();
        assert_eq!(receipt.serial_number.to_string(), "000819");
        let certificate_url = receipt.certificate_url.unwrap();
        assert!(certificate_url.starts_with("http://files.test/registrations/Asha_Rao/certificate_Asha_Rao_000819_"));
        assert!(receipt.application_form_url.is_some());

        let stored = h.store.find_all().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].certificate_url.as_deref(), Some(certificate_url.as_str()));
        assert!(stored[0].submitted_at.is_some());

        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "asha@example.com");

        assert_eq!(h.queue.len().await, 1);
        assert!(output_is_empty(&h));

        let second = h.registrar.submit(form()).await.unwrap();
        assert_eq!(second.serial_number.to_string(), "000820");
    }

    #[tokio::test]
    async fn test_upload_failure_is_not_fatal() {
        let h = harness(Some(Arc::new(FailingUploader)), None);

        let receipt = h.registrar.submit(form()).await.unwrap();
        assert_eq!(receipt.certificate_url, None);
        assert_eq!(receipt.application_form_url, None);

        let stored = h.store.find_all().await.unwrap();
        assert_eq!(stored[0].certificate_url, None);
        assert_eq!(h.queue.snapshot().await[0].certificate_url, None);
        assert!(output_is_empty(&h));
    }

    #[tokio::test]
    async fn test_missing_email_still_completes() {
        let h = harness(None, None);
        let receipt = h
            .registrar
            .submit(RegistrationForm {
                email: String::new(),
                ..form()
            })
            .await
            .unwrap();

        assert_eq!(receipt.serial_number.value(), 819);
        assert!(h.mailer.sent().is_empty());
        assert_eq!(h.queue.len().await, 1);
    }

    #[tokio::test]
    async fn test_persistence_failure_aborts_and_cleans_up() {
        let h = harness(None, Some(Arc::new(RejectingStore)));

        let err = h.registrar.submit(form()).await.unwrap_err();
        assert_eq!(err.category(), "persistence");
        assert!(h.queue.is_empty().await);
        assert!(h.mailer.sent().is_empty());
        assert!(output_is_empty(&h));
    }

    #[tokio::test]
    async fn test_missing_template_aborts() {
        let h = harness(None, None);
        std::fs::remove_file(
            h._assets
                .path()
                .join(DocumentKind::ApplicationForm.template_file()),
        )
        .unwrap();

        let err = h.registrar.submit(form()).await.unwrap_err();
        assert_eq!(err.category(), "asset");
        assert!(matches!(
            err,
            SubmissionError::Render {
                kind: DocumentKind::ApplicationForm,
                source: RenderError::MissingAsset { .. }
            }
        ));
        // The already rendered certificate is removed too
        assert!(output_is_empty(&h));
        assert_eq!(h.store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_render_timeout_leaves_no_scratch_file() {
        let h = harness_with(
            None,
            None,
            Arc::new(StalledRasterizer),
            Duration::from_millis(200),
        );

        let err = h.registrar.submit(form()).await.unwrap_err();
        assert_eq!(err.category(), "timeout");
        assert_eq!(err.to_string(), "certificate render timed out after 200ms");

        assert!(output_is_empty(&h));
        assert_eq!(h.store.count().await.unwrap(), 0);
        assert!(h.queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_info_logs_carry_serial_not_applicant() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let h = harness(None, None);
        h.registrar.submit(form()).await.unwrap();

        let output = logs.contents();
        assert!(output.contains("Processing submission 000819"));
        assert!(output.contains("Submission 000819 complete"));
        assert!(!output.contains("Asha"));
    }
}
