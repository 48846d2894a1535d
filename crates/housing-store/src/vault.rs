//! The bounded application store.
//!
//! Holds at most [`MAX_CAPACITY`] applications, one per national ID, newest
//! first. Saving an existing national ID updates that record in place; saving
//! a new one inserts it at the front and, when the vault overflows, evicts the
//! earliest-inserted record from the back.
//!
//! Every mutation builds the next list, persists it, and only then swaps it
//! in, so a failed write leaves the vault exactly as it was.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use housing_shared::constants::{MAX_CAPACITY, VAULT_STORAGE_KEY};
use housing_shared::reference::generate_reference_number;
use housing_shared::{Application, ApplicationForm, ApplicationPatch, ApplicationStatus};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::StorageBackend;
use crate::codec::Codec;
use crate::error::{Result, StoreError};
use crate::events::{EventKind, EventLog, VaultEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveOutcome {
    Inserted,
    Updated,
}

/// What a successful [`Vault::save`] hands back for the receipt page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReceipt {
    pub reference_number: String,
    pub application: Application,
    pub outcome: SaveOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evicted: Option<Application>,
    pub total_applications: usize,
}

pub struct Vault<B: StorageBackend> {
    backend: B,
    codec: Codec,
    /// Newest first; the last element is the earliest inserted.
    applications: Vec<Application>,
    events: EventLog,
}

impl<B: StorageBackend> Vault<B> {
    /// Load the vault from `backend`.
    ///
    /// Never fails: an unreadable, undecodable or corrupt payload yields an
    /// empty vault.
    pub fn open(backend: B, codec: Codec) -> Self {
        let applications = match read_applications(&backend, &codec) {
            Ok(applications) => applications,
            Err(e) => {
                warn!(error = %e, "vault unreadable, starting empty");
                Vec::new()
            }
        };
        let events = EventLog::load(&backend, &codec);

        info!(
            applications = applications.len(),
            sealed = codec.is_sealed(),
            "vault opened"
        );

        Self {
            backend,
            codec,
            applications,
            events,
        }
    }

    pub fn capacity(&self) -> usize {
        MAX_CAPACITY
    }

    pub fn len(&self) -> usize {
        self.applications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applications.is_empty()
    }

    /// All applications in stored order (newest first).
    pub fn list(&self) -> &[Application] {
        &self.applications
    }

    pub fn find_by_national_id(&self, national_id: &str) -> Option<&Application> {
        self.applications
            .iter()
            .find(|app| app.national_id() == national_id)
    }

    pub fn get(&self, id: Uuid) -> Option<&Application> {
        self.applications.iter().find(|app| app.id == id)
    }

    /// Recent mutations, oldest first.
    pub fn events(&self) -> &[VaultEvent] {
        self.events.events()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Store an application.
    ///
    /// Assigns the reference number, registration date and fees. The form is
    /// not validated here.
    pub fn save(&mut self, mut form: ApplicationForm) -> Result<SaveReceipt> {
        sanitize(&mut form);

        let now = Utc::now();
        let reference_number = generate_reference_number(now, &mut rand::thread_rng());
        let fees = form.room_type.fee();

        let mut next = self.applications.clone();
        let existing = next
            .iter()
            .position(|app| app.national_id() == form.national_id);

        let (application, outcome, evicted) = match existing {
            Some(index) => {
                let app = &mut next[index];
                app.form = form;
                app.fees = fees;
                app.reference_number = reference_number.clone();
                app.registration_date = now;
                (app.clone(), SaveOutcome::Updated, None)
            }
            None => {
                let app = Application {
                    id: Uuid::new_v4(),
                    reference_number: reference_number.clone(),
                    form,
                    fees,
                    status: ApplicationStatus::Pending,
                    registration_date: now,
                };
                next.insert(0, app.clone());
                let evicted = if next.len() > MAX_CAPACITY {
                    next.pop()
                } else {
                    None
                };
                (app, SaveOutcome::Inserted, evicted)
            }
        };

        self.commit(next)?;

        info!(
            reference = %reference_number,
            outcome = ?outcome,
            total = self.applications.len(),
            "application saved"
        );

        let kind = match outcome {
            SaveOutcome::Inserted => EventKind::ApplicationAdded,
            SaveOutcome::Updated => EventKind::ApplicationUpdated,
        };
        self.record(VaultEvent::new(kind, Some(application.national_id())));

        if let Some(old) = &evicted {
            debug!(national_id = %old.national_id(), "evicted oldest application");
            self.record(VaultEvent::new(
                EventKind::ApplicationEvicted,
                Some(old.national_id()),
            ));
        }

        Ok(SaveReceipt {
            reference_number,
            application,
            outcome,
            evicted,
            total_applications: self.applications.len(),
        })
    }

    /// Delete by internal id.  Returns `false` if no such application exists.
    pub fn delete(&mut self, id: Uuid) -> Result<bool> {
        let Some(index) = self.applications.iter().position(|app| app.id == id) else {
            return Ok(false);
        };

        let mut next = self.applications.clone();
        let removed = next.remove(index);
        self.commit(next)?;

        info!(id = %id, "application deleted");
        self.record(VaultEvent::new(
            EventKind::ApplicationDeleted,
            Some(removed.national_id()),
        ));
        Ok(true)
    }

    /// Change the review status.  Returns `false` if no such application exists.
    pub fn update_status(&mut self, id: Uuid, status: ApplicationStatus) -> Result<bool> {
        let Some(index) = self.applications.iter().position(|app| app.id == id) else {
            return Ok(false);
        };

        let mut next = self.applications.clone();
        next[index].status = status;
        let national_id = next[index].national_id().to_string();
        self.commit(next)?;

        self.record(
            VaultEvent::new(EventKind::StatusChanged, Some(&national_id))
                .with_detail(status.to_string()),
        );
        Ok(true)
    }

    /// Apply an admin edit.  Returns the updated record, or `None` if no such
    /// application exists.
    ///
    /// Moving a record onto a national ID held by another application is
    /// refused.  Fees follow a changed room type; id, reference number and
    /// registration date are kept.
    pub fn update_application(
        &mut self,
        id: Uuid,
        patch: &ApplicationPatch,
    ) -> Result<Option<Application>> {
        let Some(index) = self.applications.iter().position(|app| app.id == id) else {
            return Ok(None);
        };

        if let Some(national_id) = &patch.national_id {
            let taken = self
                .applications
                .iter()
                .any(|app| app.id != id && app.national_id() == national_id);
            if taken {
                return Err(StoreError::DuplicateNationalId(national_id.clone()));
            }
        }

        let mut next = self.applications.clone();
        let app = &mut next[index];
        patch.apply_to(&mut app.form);
        sanitize(&mut app.form);
        if patch.room_type.is_some() {
            app.fees = app.form.room_type.fee();
        }
        if let Some(status) = patch.status {
            app.status = status;
        }
        let updated = app.clone();

        self.commit(next)?;

        info!(id = %id, "application edited");
        self.record(
            VaultEvent::new(EventKind::ApplicationUpdated, Some(updated.national_id()))
                .with_detail("edited"),
        );
        Ok(Some(updated))
    }

    /// Remove applications registered more than `max_age` ago.
    ///
    /// An age reaching back past the earliest representable date removes
    /// nothing.
    pub fn cleanup_older_than(&mut self, max_age: Duration) -> Result<usize> {
        match Utc::now().checked_sub_signed(max_age) {
            Some(cutoff) => self.cleanup_before(cutoff),
            None => Ok(0),
        }
    }

    /// Remove applications registered at or before `cutoff`.  Returns how
    /// many were removed.
    pub fn cleanup_before(&mut self, cutoff: DateTime<Utc>) -> Result<usize> {
        let next: Vec<Application> = self
            .applications
            .iter()
            .filter(|app| app.registration_date > cutoff)
            .cloned()
            .collect();

        let removed = self.applications.len() - next.len();
        if removed == 0 {
            return Ok(0);
        }

        self.commit(next)?;

        info!(removed, cutoff = %cutoff, "expired applications removed");
        self.record(
            VaultEvent::new(EventKind::ApplicationsExpired, None)
                .with_detail(format!("{removed} removed")),
        );
        Ok(removed)
    }

    /// Empty the vault unconditionally.
    pub fn clear(&mut self) -> Result<()> {
        self.backend
            .remove(VAULT_STORAGE_KEY)
            .map_err(|e| persistence_error(VAULT_STORAGE_KEY, e))?;
        let cleared = std::mem::take(&mut self.applications).len();

        info!(cleared, "vault cleared");
        self.record(
            VaultEvent::new(EventKind::VaultCleared, None).with_detail(format!("{cleared} removed")),
        );
        Ok(())
    }

    /// Replace the contents with a JSON snapshot (as produced by
    /// `export_json`).
    ///
    /// The snapshot is read newest first: later duplicates of a national ID
    /// are dropped and only the first [`MAX_CAPACITY`] records are kept.
    pub fn import_json(&mut self, json: &str) -> Result<usize> {
        let snapshot: Vec<Application> = serde_json::from_str(json)?;
        let offered = snapshot.len();

        let mut seen = HashSet::new();
        let next: Vec<Application> = snapshot
            .into_iter()
            .filter(|app| seen.insert(app.national_id().to_string()))
            .take(MAX_CAPACITY)
            .collect();

        let imported = next.len();
        self.commit(next)?;

        info!(offered, imported, "snapshot imported");
        self.record(
            VaultEvent::new(EventKind::VaultImported, None)
                .with_detail(format!("{imported} of {offered} imported")),
        );
        Ok(imported)
    }

    /// Persist `next` and make it the current list.
    fn commit(&mut self, next: Vec<Application>) -> Result<()> {
        let json = serde_json::to_vec(&next)?;
        let encoded = self.codec.encode(json)?;
        self.backend
            .write(VAULT_STORAGE_KEY, &encoded)
            .map_err(|e| persistence_error(VAULT_STORAGE_KEY, e))?;
        self.applications = next;
        Ok(())
    }

    fn record(&mut self, event: VaultEvent) {
        self.events.record(&mut self.backend, &self.codec, event);
    }
}

// The form is stored as given, except for values JSON cannot carry.
fn sanitize(form: &mut ApplicationForm) {
    if form.clamp_non_finite_gpa() {
        warn!(national_id = %form.national_id, "non-finite GPA stored as 0");
    }
    if !form.province.is_known() {
        debug!(
            province = %form.province,
            "unmapped province, scoring with the default distance weight"
        );
    }
}

fn persistence_error(key: &'static str, source: StoreError) -> StoreError {
    warn!(key, error = %source, "storage write failed");
    StoreError::Persistence {
        key,
        source: Box::new(source),
    }
}

fn read_applications<B: StorageBackend>(backend: &B, codec: &Codec) -> Result<Vec<Application>> {
    let Some(stored) = backend.read(VAULT_STORAGE_KEY)? else {
        return Ok(Vec::new());
    };
    let json = codec.decode(stored)?;
    Ok(serde_json::from_slice(&json)?)
}
