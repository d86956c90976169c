//! # Notification Pipeline
//!
//! The side-effecting half of the core. [`Pipeline::finalize`] takes a
//! validated note from storage to "everyone has been told": it renders the
//! document, archives it under the note's business number, emails it to each
//! recipient in turn, writes one audit row per attempt, and derives the
//! note's aggregate status from the attempts of that run.
//!
//! All collaborators are traits: the real deployment binds them to the
//! database, the object store and the mail provider; tests bind them to the
//! in-memory implementations in [`crate::store`].
//!
//! Two properties are deliberate and load-bearing:
//!
//! - Dispatch is strictly **sequential**. A recipient's outcome never races
//!   another's audit row, and the aggregate status always agrees with the
//!   rows just written.
//! - A rerun repeats everything: the artifact is overwritten and every
//!   recipient is resent to, with fresh audit rows. Recipients that already
//!   succeeded last time get the email again.
//!
//! There is no per-note mutual exclusion. Two concurrent runs for the same
//! note interleave, and the last status write wins; callers wanting stronger
//! guarantees must serialize invocations per note id themselves.

use base64::Engine;
use serde::Serialize;
use uuid::Uuid;

use crate::compose::{compose_note, NoteDocument};
use crate::error::{DispatchError, PipelineError, StorageError};
use crate::model::{
    format_validated_at, CompanyProfile, DeliveryNote, DispatchOutcome, EmailLogEntry,
    NoteStatus, UNKNOWN_DRIVER,
};

/// Content type of every artifact this pipeline stores.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Namespaces of the blob store, one per asset kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlobCategory {
    Signatures,
    Logos,
    Pdfs,
}

impl BlobCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlobCategory::Signatures => "signatures",
            BlobCategory::Logos => "logos",
            BlobCategory::Pdfs => "pdfs",
        }
    }
}

/// A file attached to an outbound email, base64-encoded for transport.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content: String,
}

/// One message handed to the dispatcher.
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub attachments: Vec<Attachment>,
}

/// The dispatcher's verdict on a hand-off that reached it.
#[derive(Debug, Clone)]
pub struct DispatchResponse {
    pub accepted: bool,
    /// Provider response payload; serialized into the audit row on rejection.
    pub detail: Option<serde_json::Value>,
}

/// Read/update access to delivery notes. The pipeline only ever touches the
/// artifact reference and the status.
pub trait NoteStore {
    fn get(&self, id: Uuid) -> Result<Option<DeliveryNote>, StorageError>;
    fn set_artifact(&self, id: Uuid, name: &str) -> Result<(), StorageError>;
    fn set_status(&self, id: Uuid, status: NoteStatus) -> Result<(), StorageError>;
}

/// Company profile and driver lookups.
pub trait ReferenceData {
    fn company_profile(&self) -> Option<CompanyProfile>;
    fn driver_name(&self, id: Uuid) -> Option<String>;
}

/// Binary assets, keyed by category and name. `put` upserts.
pub trait BlobStore {
    fn get(&self, category: BlobCategory, name: &str) -> Result<Option<Vec<u8>>, StorageError>;
    fn put(
        &self,
        category: BlobCategory,
        name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError>;
}

/// Outbound email transport.
pub trait Dispatcher {
    fn send(&self, email: &OutboundEmail) -> Result<DispatchResponse, DispatchError>;
}

/// The append-only email audit log.
pub trait AuditSink {
    fn append(&self, entry: &EmailLogEntry) -> Result<(), StorageError>;
}

/// What a finalization run reports back to its caller. Per-recipient
/// failures are visible only through the status and the audit log.
#[derive(Debug, Clone, Serialize)]
pub struct FinalizeSummary {
    pub artifact_name: String,
    pub bdl_number: String,
    pub status: NoteStatus,
}

/// The finalization orchestrator. Holds its collaborators by reference and
/// carries no state of its own; every invocation is a complete run.
pub struct Pipeline<'a> {
    notes: &'a dyn NoteStore,
    reference: &'a dyn ReferenceData,
    blobs: &'a dyn BlobStore,
    dispatcher: &'a dyn Dispatcher,
    audit: &'a dyn AuditSink,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        notes: &'a dyn NoteStore,
        reference: &'a dyn ReferenceData,
        blobs: &'a dyn BlobStore,
        dispatcher: &'a dyn Dispatcher,
        audit: &'a dyn AuditSink,
    ) -> Self {
        Self {
            notes,
            reference,
            blobs,
            dispatcher,
            audit,
        }
    }

    /// Render, archive and dispatch a delivery note.
    ///
    /// Fatal errors are a missing note and storage failures around the
    /// artifact and status writes. A missing or broken logo, signature or
    /// driver reference only degrades the document; a rejected email only
    /// shows up in the audit log and the aggregate status.
    ///
    /// Safe to re-invoke: the artifact is overwritten in place and every
    /// recipient is attempted again, with new audit rows.
    pub fn finalize(&self, note_id: Uuid) -> Result<FinalizeSummary, PipelineError> {
        let note = self
            .notes
            .get(note_id)?
            .ok_or(PipelineError::NoteNotFound(note_id))?;

        let company = self.reference.company_profile().unwrap_or_default();
        let driver_name = self
            .reference
            .driver_name(note.driver_id)
            .unwrap_or_else(|| {
                log::warn!("driver {} not found for note {}", note.driver_id, note_id);
                UNKNOWN_DRIVER.to_string()
            });

        let signature = note
            .signature_path
            .as_deref()
            .and_then(|name| self.fetch_optional_blob(BlobCategory::Signatures, name));
        let logo = company
            .logo_path
            .as_deref()
            .and_then(|name| self.fetch_optional_blob(BlobCategory::Logos, name));

        let date_text = format_validated_at(note.validated_at);
        let document = NoteDocument {
            bdl_number: note.bdl_number.clone(),
            client_name: note.client_name.clone(),
            client_email: note.client_email.clone(),
            address: note.address.clone(),
            details: note.details.clone(),
            driver_name: driver_name.clone(),
            company_name: company.company_name.clone(),
            validated_at_text: date_text.clone(),
            logo,
            signature,
        };
        let pdf_bytes = compose_note(&document);

        let artifact_name = format!("{}.pdf", note.bdl_number);
        self.blobs
            .put(BlobCategory::Pdfs, &artifact_name, &pdf_bytes, PDF_CONTENT_TYPE)
            .map_err(|e| {
                log::error!("artifact upload failed for {}: {}", artifact_name, e);
                e
            })?;
        self.notes.set_artifact(note_id, &artifact_name).map_err(|e| {
            log::error!("artifact reference write failed for note {}: {}", note_id, e);
            e
        })?;

        // Company first, then the client. Coinciding addresses get two sends
        // and two audit rows.
        let mut recipients = vec![company.main_email.clone()];
        if let Some(ref client_email) = note.client_email {
            recipients.push(client_email.clone());
        }

        let attachment = Attachment {
            filename: artifact_name.clone(),
            content: base64::engine::general_purpose::STANDARD.encode(&pdf_bytes),
        };
        let subject = format!(
            "Bon de Livraison {} - {}",
            note.bdl_number, company.company_name
        );
        let body = notification_body(&note, &company.company_name, &driver_name, &date_text);

        let mut all_sent = true;
        for recipient in &recipients {
            let email = OutboundEmail {
                to: recipient.clone(),
                subject: subject.clone(),
                html_body: body.clone(),
                attachments: vec![attachment.clone()],
            };
            all_sent &= self.dispatch_and_log(note_id, recipient, &email).is_ok();
        }

        let status = if all_sent {
            NoteStatus::EmailSent
        } else {
            NoteStatus::EmailFailed
        };
        self.notes.set_status(note_id, status).map_err(|e| {
            log::error!("status write failed for note {}: {}", note_id, e);
            e
        })?;

        Ok(FinalizeSummary {
            artifact_name,
            bdl_number: note.bdl_number,
            status,
        })
    }

    /// Re-send the stored document to the client only, without re-rendering.
    ///
    /// Requires a client email and a previously archived artifact. Appends
    /// one audit row for the attempt; the note's status is left untouched —
    /// only a full [`Pipeline::finalize`] run derives the aggregate.
    /// Returns the address the document went to.
    pub fn send_to_client(&self, note_id: Uuid) -> Result<String, PipelineError> {
        let note = self
            .notes
            .get(note_id)?
            .ok_or(PipelineError::NoteNotFound(note_id))?;
        let client_email = note
            .client_email
            .clone()
            .ok_or(PipelineError::ClientEmailMissing)?;
        let artifact_name = note
            .pdf_path
            .clone()
            .ok_or(PipelineError::ArtifactMissing)?;
        let pdf_bytes = self
            .blobs
            .get(BlobCategory::Pdfs, &artifact_name)?
            .ok_or(PipelineError::ArtifactMissing)?;

        let company = self.reference.company_profile().unwrap_or_default();
        let driver_name = self
            .reference
            .driver_name(note.driver_id)
            .unwrap_or_else(|| UNKNOWN_DRIVER.to_string());
        let date_text = format_validated_at(note.validated_at);

        let email = OutboundEmail {
            to: client_email.clone(),
            subject: format!(
                "Votre Bon de Livraison {} - {}",
                note.bdl_number, company.company_name
            ),
            html_body: notification_body(&note, &company.company_name, &driver_name, &date_text),
            attachments: vec![Attachment {
                filename: artifact_name,
                content: base64::engine::general_purpose::STANDARD.encode(&pdf_bytes),
            }],
        };

        self.dispatch_and_log(note_id, &client_email, &email)
            .map_err(PipelineError::DispatchRejected)?;
        Ok(client_email)
    }

    /// Load an optional dependency, degrading to `None` on any miss.
    fn fetch_optional_blob(&self, category: BlobCategory, name: &str) -> Option<Vec<u8>> {
        match self.blobs.get(category, name) {
            Ok(Some(bytes)) => Some(bytes),
            Ok(None) => {
                log::warn!("blob {}/{} is referenced but absent", category.as_str(), name);
                None
            }
            Err(e) => {
                log::warn!("failed to load blob {}/{}: {}", category.as_str(), name, e);
                None
            }
        }
    }

    /// Attempt one dispatch and append exactly one audit row for it.
    /// Transport errors are caught here, not propagated. On failure the
    /// serialized detail that went into the audit row is returned.
    fn dispatch_and_log(
        &self,
        note_id: Uuid,
        recipient: &str,
        email: &OutboundEmail,
    ) -> Result<(), String> {
        let (outcome, error) = match self.dispatcher.send(email) {
            Ok(response) if response.accepted => (DispatchOutcome::Sent, None),
            Ok(response) => {
                let detail = response
                    .detail
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "\"rejected\"".to_string());
                log::error!("email to {} rejected: {}", recipient, detail);
                (DispatchOutcome::Failed, Some(detail))
            }
            Err(e) => {
                log::error!("email to {} failed: {}", recipient, e);
                (DispatchOutcome::Failed, Some(e.to_string()))
            }
        };

        let entry = EmailLogEntry::new(note_id, recipient, outcome, error.clone());
        if let Err(e) = self.audit.append(&entry) {
            // Best effort: a lost audit row must not fail the run.
            log::warn!("audit append failed for {}: {}", recipient, e);
        }

        match error {
            None => Ok(()),
            Some(detail) => Err(detail),
        }
    }
}

/// The fixed HTML body sent with the document.
fn notification_body(
    note: &DeliveryNote,
    company_name: &str,
    driver_name: &str,
    date_text: &str,
) -> String {
    format!(
        "<h2>Bon de Livraison {number}</h2>\n\
         <p>Bonjour,</p>\n\
         <p>Veuillez trouver ci-joint le bon de livraison <strong>{number}</strong>.</p>\n\
         <ul>\n\
         <li><strong>Client :</strong> {client}</li>\n\
         <li><strong>Adresse :</strong> {address}</li>\n\
         <li><strong>Date :</strong> {date}</li>\n\
         <li><strong>Livreur :</strong> {driver}</li>\n\
         </ul>\n\
         <p>Cordialement,<br>{company}</p>",
        number = note.bdl_number,
        client = note.client_name,
        address = note.address,
        date = date_text,
        driver = driver_name,
        company = company_name,
    )
}
