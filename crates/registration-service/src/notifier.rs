//! Student confirmations and faculty batch notifications
//!
//! Batch flush states: the queue is Empty or Accumulating between flushes.
//! A flush snapshots the queue, exports every stored registration and mails
//! the faculty recipient. Only after the mail is accepted are the snapshotted
//! entries removed; on any failure the queue keeps them for the next flush.

use chrono::Local;
use registrar_common::{PendingNotification, Registration};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{MailError, NotifyError};
use crate::export::{build_workbook, export_file_name};
use crate::mailer::{Attachment, Email, Mailer};
use crate::queue::PendingQueue;
use crate::store::RegistrationStore;
use crate::uploader::content_type_for;

/// Result of a flush that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Queue was empty, no email sent
    NothingToSend,
    /// Another flush holds the guard
    AlreadyRunning,
    /// One batch email covering `count` submissions was sent
    Sent { count: usize },
}

pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    store: Arc<dyn RegistrationStore>,
    queue: Arc<PendingQueue>,
    faculty_email: String,
    timeout: Duration,
    flush_guard: Mutex<()>,
}

impl Notifier {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        store: Arc<dyn RegistrationStore>,
        queue: Arc<PendingQueue>,
        faculty_email: String,
        timeout: Duration,
    ) -> Self {
        Self {
            mailer,
            store,
            queue,
            faculty_email,
            timeout,
            flush_guard: Mutex::new(()),
        }
    }

    /// Email the student their application form
    pub async fn send_confirmation(
        &self,
        registration: &Registration,
        application_form: &Path,
    ) -> Result<(), MailError> {
        let to = registration.form.email.trim();
        if to.is_empty() {
            return Err(MailError::NoRecipient);
        }

        let content = tokio::fs::read(application_form)
            .await
            .map_err(|source| MailError::Attachment {
                path: application_form.to_path_buf(),
                source,
            })?;

        let email = Email {
            to: to.to_string(),
            subject: format!(
                "Registration confirmed: {}",
                registration.serial_number
            ),
            html: confirmation_html(registration),
            attachments: vec![Attachment {
                filename: format!("application-form-{}.pdf", registration.serial_number),
                content_type: content_type_for(application_form).to_string(),
                content,
            }],
        };

        tokio::time::timeout(self.timeout, self.mailer.send(&email))
            .await
            .map_err(|_| MailError::Timeout)?
    }

    /// Send one batch email for everything queued so far
    pub async fn flush(&self) -> Result<FlushOutcome, NotifyError> {
        let Ok(_guard) = self.flush_guard.try_lock() else {
            info!("Batch flush already in progress, skipping");
            return Ok(FlushOutcome::AlreadyRunning);
        };

        let batch = self.queue.snapshot().await;
        if batch.is_empty() {
            info!("No pending registrations, nothing to send");
            return Ok(FlushOutcome::NothingToSend);
        }

        info!("Flushing {} pending registration(s)", batch.len());

        let registrations = tokio::time::timeout(self.timeout, self.store.find_all())
            .await
            .map_err(|_| NotifyError::Timeout)??;
        let workbook = build_workbook(&registrations)?;
        let filename = export_file_name(&Local::now());

        let email = Email {
            to: self.faculty_email.clone(),
            subject: format!("New registrations: {}", batch.len()),
            html: batch_html(&batch, registrations.len()),
            attachments: vec![Attachment {
                content_type: content_type_for(Path::new(&filename)).to_string(),
                filename,
                content: workbook,
            }],
        };

        tokio::time::timeout(self.timeout, self.mailer.send(&email))
            .await
            .map_err(|_| MailError::Timeout)??;

        self.queue.acknowledge(batch.len()).await;
        info!("Batch email sent for {} registration(s)", batch.len());

        Ok(FlushOutcome::Sent { count: batch.len() })
    }
}

fn confirmation_html(registration: &Registration) -> String {
    let form = &registration.form;
    format!(
        "<p>Dear {},</p>\
         <p>Your registration for <strong>{}</strong> ({}) has been received. \
         Your registration number is <strong>{}</strong>.</p>\
         <p>A copy of your application form is attached.</p>",
        escape_html(form.name.trim()),
        escape_html(&form.course),
        escape_html(&form.department),
        registration.serial_number,
    )
}

fn link_or_missing(label: &str, url: Option<&str>) -> String {
    match url {
        Some(url) => format!("<a href=\"{}\">{}</a>", escape_html(url), label),
        None => format!("{} unavailable", label),
    }
}

/// HTML body listing each pending submission with its document links
pub fn batch_html(batch: &[PendingNotification], total_registrations: usize) -> String {
    let items: String = batch
        .iter()
        .map(|n| {
            format!(
                "<li>{} &ndash; {}: {} | {}</li>",
                n.serial_number,
                escape_html(&n.applicant_name),
                link_or_missing("Certificate", n.certificate_url.as_deref()),
                link_or_missing("Application form", n.application_form_url.as_deref()),
            )
        })
        .collect();

    format!(
        "<p>{} new registration(s) since the last summary:</p><ul>{}</ul>\
         <p>The attached spreadsheet lists all {} registration(s).</p>",
        batch.len(),
        items,
        total_registrations
    )
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
