//! Integration tests for the delivery-note finalization pipeline.
//!
//! These tests exercise the full path from a stored note to a rendered,
//! archived and dispatched document. They verify:
//! - the aggregate status derived from per-recipient outcomes
//! - one audit row per dispatch attempt, accumulating across reruns
//! - artifact naming and overwrite-on-regeneration
//! - tolerance of missing/undecodable assets
//! - the client-only resend path

use std::sync::Mutex;

use chrono::{TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;

use bordereau::compose::compose_note;
use bordereau::error::{DispatchError, PipelineError};
use bordereau::model::{
    CompanyProfile, DeliveryNote, DispatchOutcome, Driver, NoteStatus, UNKNOWN_DRIVER,
};
use bordereau::pipeline::{
    BlobCategory, BlobStore, Dispatcher, DispatchResponse, OutboundEmail, Pipeline,
    PDF_CONTENT_TYPE,
};
use bordereau::store::{
    InMemoryAuditLog, InMemoryBlobStore, InMemoryNoteStore, InMemoryReferenceData,
};

// ─── Helpers ────────────────────────────────────────────────────

/// A dispatcher that records every hand-off and can be told to reject or
/// drop messages for specific addresses.
#[derive(Default)]
struct ScriptedDispatcher {
    sent: Mutex<Vec<OutboundEmail>>,
    reject_address: Option<String>,
    transport_fail_address: Option<String>,
}

impl ScriptedDispatcher {
    fn accepting() -> Self {
        Self::default()
    }

    fn rejecting(address: &str) -> Self {
        Self {
            reject_address: Some(address.to_string()),
            ..Self::default()
        }
    }

    fn failing_transport(address: &str) -> Self {
        Self {
            transport_fail_address: Some(address.to_string()),
            ..Self::default()
        }
    }

    fn deliveries(&self) -> Vec<OutboundEmail> {
        self.sent.lock().unwrap().clone()
    }
}

impl Dispatcher for ScriptedDispatcher {
    fn send(&self, email: &OutboundEmail) -> Result<DispatchResponse, DispatchError> {
        self.sent.lock().unwrap().push(email.clone());
        if self.transport_fail_address.as_deref() == Some(email.to.as_str()) {
            return Err(DispatchError("connection reset".to_string()));
        }
        if self.reject_address.as_deref() == Some(email.to.as_str()) {
            return Ok(DispatchResponse {
                accepted: false,
                detail: Some(json!({"error": "mailbox unavailable"})),
            });
        }
        Ok(DispatchResponse {
            accepted: true,
            detail: None,
        })
    }
}

struct Harness {
    notes: InMemoryNoteStore,
    reference: InMemoryReferenceData,
    blobs: InMemoryBlobStore,
    audit: InMemoryAuditLog,
}

impl Harness {
    fn new() -> Self {
        Self {
            notes: InMemoryNoteStore::new(),
            reference: InMemoryReferenceData::new().with_company(CompanyProfile {
                company_name: "JOJA DISTRIBUTION".to_string(),
                main_email: "b@y.com".to_string(),
                logo_path: None,
            }),
            blobs: InMemoryBlobStore::new(),
            audit: InMemoryAuditLog::new(),
        }
    }

    fn pipeline<'a>(&'a self, dispatcher: &'a ScriptedDispatcher) -> Pipeline<'a> {
        Pipeline::new(
            &self.notes,
            &self.reference,
            &self.blobs,
            dispatcher,
            &self.audit,
        )
    }
}

fn make_note(client_email: Option<&str>) -> DeliveryNote {
    DeliveryNote {
        id: Uuid::new_v4(),
        bdl_number: "BDL-20250101-00001".to_string(),
        client_name: "Boulangerie Martin".to_string(),
        client_email: client_email.map(str::to_string),
        address: "12 rue des Lilas, 75011 Paris".to_string(),
        details: "3 palettes de farine T65".to_string(),
        signature_path: None,
        pdf_path: None,
        driver_id: Uuid::new_v4(),
        status: NoteStatus::Validated,
        validated_at: Utc.with_ymd_and_hms(2025, 1, 5, 14, 30, 0).unwrap(),
        created_at: Utc.with_ymd_and_hms(2025, 1, 5, 9, 0, 0).unwrap(),
    }
}

// ─── Finalization ───────────────────────────────────────────────

#[test]
fn finalize_sends_to_company_then_client() {
    let harness = Harness::new();
    let dispatcher = ScriptedDispatcher::accepting();
    let note = make_note(Some("a@x.com"));
    let note_id = note.id;
    harness.notes.insert(note);

    let summary = harness.pipeline(&dispatcher).finalize(note_id).unwrap();

    assert_eq!(summary.status, NoteStatus::EmailSent);
    assert_eq!(summary.bdl_number, "BDL-20250101-00001");
    assert_eq!(summary.artifact_name, "BDL-20250101-00001.pdf");

    let rows = harness.audit.entries();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].to_email, "b@y.com");
    assert_eq!(rows[1].to_email, "a@x.com");
    assert!(rows.iter().all(|r| r.outcome == DispatchOutcome::Sent));
    assert!(rows.iter().all(|r| r.error.is_none()));

    let updated = harness.notes.snapshot(note_id).unwrap();
    assert_eq!(updated.status, NoteStatus::EmailSent);
    assert_eq!(updated.pdf_path.as_deref(), Some("BDL-20250101-00001.pdf"));

    let stored = harness
        .blobs
        .get(BlobCategory::Pdfs, "BDL-20250101-00001.pdf")
        .unwrap()
        .expect("artifact stored");
    assert!(stored.starts_with(b"%PDF-1.7"));
    assert_eq!(
        harness
            .blobs
            .content_type(BlobCategory::Pdfs, "BDL-20250101-00001.pdf")
            .as_deref(),
        Some(PDF_CONTENT_TYPE)
    );
}

#[test]
fn finalize_without_client_email_notifies_company_only() {
    let harness = Harness::new();
    let dispatcher = ScriptedDispatcher::accepting();
    let note = make_note(None);
    let note_id = note.id;
    harness.notes.insert(note);

    let summary = harness.pipeline(&dispatcher).finalize(note_id).unwrap();

    assert_eq!(summary.status, NoteStatus::EmailSent);
    let rows = harness.audit.entries();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].to_email, "b@y.com");
}

#[test]
fn finalize_rejection_fails_aggregate_but_not_run() {
    let harness = Harness::new();
    let dispatcher = ScriptedDispatcher::rejecting("a@x.com");
    let note = make_note(Some("a@x.com"));
    let note_id = note.id;
    harness.notes.insert(note);

    let summary = harness.pipeline(&dispatcher).finalize(note_id).unwrap();

    assert_eq!(summary.status, NoteStatus::EmailFailed);
    let rows = harness.audit.entries();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].outcome, DispatchOutcome::Sent);
    assert_eq!(rows[1].outcome, DispatchOutcome::Failed);
    let detail = rows[1].error.as_deref().expect("rejection detail captured");
    assert!(detail.contains("mailbox unavailable"));

    let updated = harness.notes.snapshot(note_id).unwrap();
    assert_eq!(updated.status, NoteStatus::EmailFailed);
}

#[test]
fn finalize_continues_past_transport_failure() {
    // The company send dies at the transport layer; the client must still be
    // attempted and succeed.
    let harness = Harness::new();
    let dispatcher = ScriptedDispatcher::failing_transport("b@y.com");
    let note = make_note(Some("a@x.com"));
    let note_id = note.id;
    harness.notes.insert(note);

    let summary = harness.pipeline(&dispatcher).finalize(note_id).unwrap();

    assert_eq!(summary.status, NoteStatus::EmailFailed);
    let rows = harness.audit.entries();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].outcome, DispatchOutcome::Failed);
    assert!(rows[0].error.as_deref().unwrap().contains("connection reset"));
    assert_eq!(rows[1].outcome, DispatchOutcome::Sent);
    assert_eq!(dispatcher.deliveries().len(), 2);
}

#[test]
fn finalize_twice_appends_rows_and_overwrites_artifact() {
    let harness = Harness::new();
    let dispatcher = ScriptedDispatcher::accepting();
    let note = make_note(Some("a@x.com"));
    let note_id = note.id;
    harness.notes.insert(note);

    let pipeline = harness.pipeline(&dispatcher);
    pipeline.finalize(note_id).unwrap();
    pipeline.finalize(note_id).unwrap();

    // No dedup across runs: every recipient is attempted again.
    assert_eq!(harness.audit.entries().len(), 4);
    // One artifact, overwritten in place.
    assert_eq!(harness.blobs.count(BlobCategory::Pdfs), 1);
}

#[test]
fn finalize_does_not_deduplicate_coinciding_recipients() {
    let harness = Harness::new();
    let dispatcher = ScriptedDispatcher::accepting();
    // Client email equals the company's main email.
    let note = make_note(Some("b@y.com"));
    let note_id = note.id;
    harness.notes.insert(note);

    harness.pipeline(&dispatcher).finalize(note_id).unwrap();

    let rows = harness.audit.entries();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.to_email == "b@y.com"));
    assert_eq!(dispatcher.deliveries().len(), 2);
}

#[test]
fn finalize_unknown_note_is_not_found() {
    let harness = Harness::new();
    let dispatcher = ScriptedDispatcher::accepting();

    let result = harness.pipeline(&dispatcher).finalize(Uuid::new_v4());

    assert!(matches!(result, Err(PipelineError::NoteNotFound(_))));
    // Fatal before any side effect.
    assert!(harness.audit.entries().is_empty());
    assert_eq!(harness.blobs.count(BlobCategory::Pdfs), 0);
    assert!(dispatcher.deliveries().is_empty());
}

#[test]
fn finalize_tolerates_missing_assets() {
    let harness = Harness::new();
    let dispatcher = ScriptedDispatcher::accepting();
    let mut note = make_note(Some("a@x.com"));
    // Referenced but never uploaded.
    note.signature_path = Some("sig-123.png".to_string());
    let note_id = note.id;
    harness.notes.insert(note);

    let summary = harness.pipeline(&dispatcher).finalize(note_id).unwrap();
    assert_eq!(summary.status, NoteStatus::EmailSent);
}

#[test]
fn finalize_tolerates_undecodable_signature() {
    let harness = Harness::new();
    let dispatcher = ScriptedDispatcher::accepting();
    let mut note = make_note(Some("a@x.com"));
    note.signature_path = Some("sig-123.png".to_string());
    let note_id = note.id;
    harness.notes.insert(note);
    harness
        .blobs
        .seed(BlobCategory::Signatures, "sig-123.png", vec![0xAA; 64]);

    let summary = harness.pipeline(&dispatcher).finalize(note_id).unwrap();
    assert_eq!(summary.status, NoteStatus::EmailSent);
}

#[test]
fn finalize_resolves_driver_name_into_the_email() {
    let dispatcher = ScriptedDispatcher::accepting();
    let note = make_note(Some("a@x.com"));
    let driver = Driver {
        id: note.driver_id,
        name: "Karim B.".to_string(),
    };
    let notes = InMemoryNoteStore::new();
    let reference = InMemoryReferenceData::new()
        .with_company(CompanyProfile {
            company_name: "JOJA DISTRIBUTION".to_string(),
            main_email: "b@y.com".to_string(),
            logo_path: None,
        })
        .with_driver(&driver);
    let blobs = InMemoryBlobStore::new();
    let audit = InMemoryAuditLog::new();
    let note_id = note.id;
    notes.insert(note);

    Pipeline::new(&notes, &reference, &blobs, &dispatcher, &audit)
        .finalize(note_id)
        .unwrap();

    let deliveries = dispatcher.deliveries();
    assert!(deliveries[0].html_body.contains("Karim B."));
}

#[test]
fn finalize_falls_back_on_unknown_driver() {
    // Harness registers no drivers, so resolution fails and degrades.
    let harness = Harness::new();
    let dispatcher = ScriptedDispatcher::accepting();
    let note = make_note(Some("a@x.com"));
    let note_id = note.id;
    harness.notes.insert(note);

    let summary = harness.pipeline(&dispatcher).finalize(note_id).unwrap();

    assert_eq!(summary.status, NoteStatus::EmailSent);
    assert!(dispatcher.deliveries()[0].html_body.contains(UNKNOWN_DRIVER));
}

#[test]
fn finalize_attaches_the_archived_document() {
    let harness = Harness::new();
    let dispatcher = ScriptedDispatcher::accepting();
    let note = make_note(None);
    let note_id = note.id;
    harness.notes.insert(note);

    harness.pipeline(&dispatcher).finalize(note_id).unwrap();

    let deliveries = dispatcher.deliveries();
    assert_eq!(deliveries.len(), 1);
    let email = &deliveries[0];
    assert!(email.subject.contains("BDL-20250101-00001"));
    assert!(email.html_body.contains("Boulangerie Martin"));
    assert_eq!(email.attachments.len(), 1);
    assert_eq!(email.attachments[0].filename, "BDL-20250101-00001.pdf");
    assert!(!email.attachments[0].content.is_empty());
}

// ─── Client resend ──────────────────────────────────────────────

#[test]
fn send_to_client_resends_stored_artifact() {
    let harness = Harness::new();
    let dispatcher = ScriptedDispatcher::accepting();
    let mut note = make_note(Some("a@x.com"));
    note.pdf_path = Some("BDL-20250101-00001.pdf".to_string());
    let note_id = note.id;
    harness.notes.insert(note);
    harness.blobs.seed(
        BlobCategory::Pdfs,
        "BDL-20250101-00001.pdf",
        b"%PDF-1.7 stub".to_vec(),
    );

    let sent_to = harness.pipeline(&dispatcher).send_to_client(note_id).unwrap();

    assert_eq!(sent_to, "a@x.com");
    let rows = harness.audit.entries();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].to_email, "a@x.com");
    assert_eq!(rows[0].outcome, DispatchOutcome::Sent);
    // Only a full finalization run derives the aggregate status.
    assert_eq!(
        harness.notes.snapshot(note_id).unwrap().status,
        NoteStatus::Validated
    );

    let deliveries = dispatcher.deliveries();
    assert!(deliveries[0].subject.starts_with("Votre Bon de Livraison"));
}

#[test]
fn send_to_client_requires_client_email() {
    let harness = Harness::new();
    let dispatcher = ScriptedDispatcher::accepting();
    let mut note = make_note(None);
    note.pdf_path = Some("BDL-20250101-00001.pdf".to_string());
    let note_id = note.id;
    harness.notes.insert(note);

    let result = harness.pipeline(&dispatcher).send_to_client(note_id);

    assert!(matches!(result, Err(PipelineError::ClientEmailMissing)));
    assert!(harness.audit.entries().is_empty());
}

#[test]
fn send_to_client_requires_stored_artifact() {
    let harness = Harness::new();
    let dispatcher = ScriptedDispatcher::accepting();
    let note = make_note(Some("a@x.com"));
    let note_id = note.id;
    harness.notes.insert(note);

    let result = harness.pipeline(&dispatcher).send_to_client(note_id);

    assert!(matches!(result, Err(PipelineError::ArtifactMissing)));
}

#[test]
fn send_to_client_surfaces_rejection_detail() {
    let harness = Harness::new();
    let dispatcher = ScriptedDispatcher::rejecting("a@x.com");
    let mut note = make_note(Some("a@x.com"));
    note.pdf_path = Some("BDL-20250101-00001.pdf".to_string());
    let note_id = note.id;
    harness.notes.insert(note);
    harness
        .blobs
        .seed(BlobCategory::Pdfs, "BDL-20250101-00001.pdf", vec![1, 2, 3]);

    let result = harness.pipeline(&dispatcher).send_to_client(note_id);

    match result {
        Err(PipelineError::DispatchRejected(detail)) => {
            assert!(detail.contains("mailbox unavailable"));
        }
        other => panic!("expected DispatchRejected, got {:?}", other.map(|_| ())),
    }
    let rows = harness.audit.entries();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].outcome, DispatchOutcome::Failed);
}

// ─── Rendering ──────────────────────────────────────────────────

#[test]
fn rendered_document_is_structurally_valid_pdf() {
    let harness = Harness::new();
    let dispatcher = ScriptedDispatcher::accepting();
    let note = make_note(Some("a@x.com"));
    let note_id = note.id;
    harness.notes.insert(note);

    harness.pipeline(&dispatcher).finalize(note_id).unwrap();

    let bytes = harness
        .blobs
        .get(BlobCategory::Pdfs, "BDL-20250101-00001.pdf")
        .unwrap()
        .unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert!(bytes.starts_with(b"%PDF-1.7"));
    assert!(text.contains("/BaseFont /Helvetica"));
    assert!(text.contains("/WinAnsiEncoding"));
    assert!(text.contains("xref"));
    assert!(text.contains("trailer"));
    assert!(bytes.windows(5).any(|w| w == b"%%EOF"));
    assert!(text.contains("/Title (Bon de Livraison BDL-20250101-00001)"));
}

#[test]
fn compose_note_standalone_matches_pipeline_output_shape() {
    let document = bordereau::compose::NoteDocument {
        bdl_number: "BDL-20250101-00002".to_string(),
        client_name: "Client".to_string(),
        client_email: None,
        address: "Adresse".to_string(),
        details: String::new(),
        driver_name: "Livreur".to_string(),
        company_name: "JOJA DISTRIBUTION".to_string(),
        validated_at_text: "5 janvier 2025 a 14:30".to_string(),
        logo: None,
        signature: None,
    };
    let bytes = compose_note(&document);
    assert!(bytes.starts_with(b"%PDF-1.7"));
    assert!(bytes.windows(5).any(|w| w == b"%%EOF"));
}
