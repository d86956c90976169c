//! In-memory implementations of the pipeline's collaborator traits.
//!
//! These back the integration tests and the CLI demo. Each is a
//! mutex-wrapped map with the same observable semantics as the real
//! backends: the note store updates fields in place, the blob store upserts,
//! the audit log only appends.

use std::collections::HashMap;
use std::sync::Mutex;

use uuid::Uuid;

use crate::error::StorageError;
use crate::model::{CompanyProfile, DeliveryNote, Driver, EmailLogEntry, NoteStatus};
use crate::pipeline::{AuditSink, BlobCategory, BlobStore, NoteStore, ReferenceData};

/// Delivery notes held in memory.
#[derive(Default)]
pub struct InMemoryNoteStore {
    notes: Mutex<HashMap<Uuid, DeliveryNote>>,
}

impl InMemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, note: DeliveryNote) {
        self.notes.lock().unwrap().insert(note.id, note);
    }

    /// Snapshot of a note, for assertions.
    pub fn snapshot(&self, id: Uuid) -> Option<DeliveryNote> {
        self.notes.lock().unwrap().get(&id).cloned()
    }
}

impl NoteStore for InMemoryNoteStore {
    fn get(&self, id: Uuid) -> Result<Option<DeliveryNote>, StorageError> {
        Ok(self.notes.lock().unwrap().get(&id).cloned())
    }

    fn set_artifact(&self, id: Uuid, name: &str) -> Result<(), StorageError> {
        let mut notes = self.notes.lock().unwrap();
        let note = notes
            .get_mut(&id)
            .ok_or_else(|| StorageError(format!("note {} vanished", id)))?;
        note.pdf_path = Some(name.to_string());
        Ok(())
    }

    fn set_status(&self, id: Uuid, status: NoteStatus) -> Result<(), StorageError> {
        let mut notes = self.notes.lock().unwrap();
        let note = notes
            .get_mut(&id)
            .ok_or_else(|| StorageError(format!("note {} vanished", id)))?;
        note.status = status;
        Ok(())
    }
}

/// Company profile and driver names held in memory.
#[derive(Default)]
pub struct InMemoryReferenceData {
    pub company: Option<CompanyProfile>,
    pub drivers: HashMap<Uuid, String>,
}

impl InMemoryReferenceData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_company(mut self, company: CompanyProfile) -> Self {
        self.company = Some(company);
        self
    }

    pub fn with_driver(mut self, driver: &Driver) -> Self {
        self.drivers.insert(driver.id, driver.name.clone());
        self
    }
}

impl ReferenceData for InMemoryReferenceData {
    fn company_profile(&self) -> Option<CompanyProfile> {
        self.company.clone()
    }

    fn driver_name(&self, id: Uuid) -> Option<String> {
        self.drivers.get(&id).cloned()
    }
}

/// Binary blobs held in memory, keyed by (category, name). Upserts like the
/// real object store.
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: Mutex<HashMap<(BlobCategory, String), (Vec<u8>, String)>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a blob outside the trait, for test setup.
    pub fn seed(&self, category: BlobCategory, name: &str, bytes: Vec<u8>) {
        self.blobs
            .lock()
            .unwrap()
            .insert((category, name.to_string()), (bytes, String::new()));
    }

    /// Number of blobs stored under a category.
    pub fn count(&self, category: BlobCategory) -> usize {
        self.blobs
            .lock()
            .unwrap()
            .keys()
            .filter(|(c, _)| *c == category)
            .count()
    }

    /// Content type recorded for a blob, if present.
    pub fn content_type(&self, category: BlobCategory, name: &str) -> Option<String> {
        self.blobs
            .lock()
            .unwrap()
            .get(&(category, name.to_string()))
            .map(|(_, ct)| ct.clone())
    }
}

impl BlobStore for InMemoryBlobStore {
    fn get(&self, category: BlobCategory, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self
            .blobs
            .lock()
            .unwrap()
            .get(&(category, name.to_string()))
            .map(|(bytes, _)| bytes.clone()))
    }

    fn put(
        &self,
        category: BlobCategory,
        name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.blobs.lock().unwrap().insert(
            (category, name.to_string()),
            (bytes.to_vec(), content_type.to_string()),
        );
        Ok(())
    }
}

/// An append-only audit log held in memory.
#[derive(Default)]
pub struct InMemoryAuditLog {
    entries: Mutex<Vec<EmailLogEntry>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<EmailLogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

impl AuditSink for InMemoryAuditLog {
    fn append(&self, entry: &EmailLogEntry) -> Result<(), StorageError> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}
