//! # Domain Model
//!
//! The delivery-note ("BDL") records the core operates on. These types mirror
//! the delivery workflow's storage rows: the note itself, the company
//! profile singleton, the driver reference, and the append-only email audit
//! log. The core never creates or deletes notes — it reads them, renders
//! them, and writes back the artifact reference and the aggregate status.

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Company display name used when no profile row exists.
pub const DEFAULT_COMPANY_NAME: &str = "JOJA DISTRIBUTION";
/// Notification address used when no profile row exists.
pub const DEFAULT_MAIN_EMAIL: &str = "contact@jojadistribution.fr";
/// Driver display name used when the driver reference cannot be resolved.
pub const UNKNOWN_DRIVER: &str = "Livreur inconnu";

/// Lifecycle status of a delivery note, as seen by this core.
///
/// `Validated` is the only pre-dispatch state. After a pipeline run the note
/// carries `EmailSent` iff every dispatch attempt of that run succeeded,
/// `EmailFailed` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoteStatus {
    Validated,
    EmailSent,
    EmailFailed,
}

impl NoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteStatus::Validated => "VALIDATED",
            NoteStatus::EmailSent => "EMAIL_SENT",
            NoteStatus::EmailFailed => "EMAIL_FAILED",
        }
    }
}

/// A delivery note. Owned by the delivery workflow; this core mutates only
/// `pdf_path` and `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryNote {
    pub id: Uuid,
    /// Business-facing sequential number, `BDL-YYYYMMDD-NNNNN`. Unique and
    /// immutable once assigned; the generated artifact is addressable by it.
    pub bdl_number: String,
    pub client_name: String,
    pub client_email: Option<String>,
    pub address: String,
    pub details: String,
    /// Blob name of the captured signature image, if one was taken.
    pub signature_path: Option<String>,
    /// Blob name of the generated document, set by the pipeline.
    pub pdf_path: Option<String>,
    pub driver_id: Uuid,
    pub status: NoteStatus,
    pub validated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// The company profile singleton. Read-only input to the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub company_name: String,
    pub main_email: String,
    /// Blob name of the company logo, if one was uploaded.
    pub logo_path: Option<String>,
}

impl Default for CompanyProfile {
    fn default() -> Self {
        Self {
            company_name: DEFAULT_COMPANY_NAME.to_string(),
            main_email: DEFAULT_MAIN_EMAIL.to_string(),
            logo_path: None,
        }
    }
}

/// A driver, resolved by id to a display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub name: String,
}

/// Outcome of a single dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchOutcome {
    Sent,
    Failed,
}

impl DispatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchOutcome::Sent => "sent",
            DispatchOutcome::Failed => "failed",
        }
    }
}

/// One row of the append-only email audit log: a single dispatch attempt to
/// a single recipient. Rows accumulate across retries and are never updated
/// in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailLogEntry {
    pub id: Uuid,
    pub delivery_note_id: Uuid,
    pub to_email: String,
    pub outcome: DispatchOutcome,
    /// Serialized dispatcher rejection or transport error, on failure.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl EmailLogEntry {
    pub fn new(
        delivery_note_id: Uuid,
        to_email: &str,
        outcome: DispatchOutcome,
        error: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            delivery_note_id,
            to_email: to_email.to_string(),
            outcome,
            error,
            created_at: Utc::now(),
        }
    }
}

/// Build a business number for a note validated on `date`, with `seq` being
/// the 1-based position within that day. Sequencing itself is owned by the
/// delivery workflow; this is only the shared format.
pub fn bdl_number(date: NaiveDate, seq: u32) -> String {
    format!("BDL-{}-{:05}", date.format("%Y%m%d"), seq)
}

// Accent-less on purpose: these strings end up in WinAnsi-encoded PDF text
// and in email subjects assembled by callers that predate UTF-8 transport.
const MONTHS_FR: [&str; 12] = [
    "janvier", "fevrier", "mars", "avril", "mai", "juin", "juillet", "aout",
    "septembre", "octobre", "novembre", "decembre",
];

/// Format a validation timestamp the way it appears on the document and in
/// email bodies: `5 janvier 2025 a 14:30`.
pub fn format_validated_at(ts: DateTime<Utc>) -> String {
    let month = MONTHS_FR[ts.month0() as usize];
    format!(
        "{} {} {} a {:02}:{:02}",
        ts.day(),
        month,
        ts.year(),
        ts.hour(),
        ts.minute()
    )
}
