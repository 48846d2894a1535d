//! Audit trail of vault mutations, persisted under its own key and capped to
//! the most recent [`MAX_EVENTS`] entries.

use chrono::{DateTime, Utc};
use housing_shared::constants::{EVENTS_STORAGE_KEY, MAX_EVENTS};
use serde::{Deserialize, Serialize};

use crate::backend::StorageBackend;
use crate::codec::Codec;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ApplicationAdded,
    ApplicationUpdated,
    ApplicationEvicted,
    ApplicationDeleted,
    StatusChanged,
    ApplicationsExpired,
    VaultImported,
    VaultCleared,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultEvent {
    pub event: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub national_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl VaultEvent {
    pub fn new(event: EventKind, national_id: Option<&str>) -> Self {
        Self {
            event,
            national_id: national_id.map(str::to_string),
            detail: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Oldest-first ring of recent events.
#[derive(Debug, Default)]
pub(crate) struct EventLog {
    events: Vec<VaultEvent>,
}

impl EventLog {
    pub(crate) fn load<B: StorageBackend>(backend: &B, codec: &Codec) -> Self {
        match read_events(backend, codec) {
            Ok(events) => Self { events },
            Err(e) => {
                tracing::warn!(error = %e, "event log unreadable, starting fresh");
                Self::default()
            }
        }
    }

    pub(crate) fn events(&self) -> &[VaultEvent] {
        &self.events
    }

    /// Append and persist. A failed write is logged, never surfaced: the
    /// mutation the event describes has already been committed.
    pub(crate) fn record<B: StorageBackend>(
        &mut self,
        backend: &mut B,
        codec: &Codec,
        event: VaultEvent,
    ) {
        tracing::debug!(event = ?event.event, national_id = ?event.national_id, "vault event");

        self.events.push(event);
        if self.events.len() > MAX_EVENTS {
            let excess = self.events.len() - MAX_EVENTS;
            self.events.drain(..excess);
        }

        if let Err(e) = write_events(backend, codec, &self.events) {
            tracing::warn!(error = %e, "failed to persist event log");
        }
    }
}

fn read_events<B: StorageBackend>(backend: &B, codec: &Codec) -> Result<Vec<VaultEvent>> {
    let Some(stored) = backend.read(EVENTS_STORAGE_KEY)? else {
        return Ok(Vec::new());
    };
    let json = codec.decode(stored)?;
    Ok(serde_json::from_slice(&json)?)
}

fn write_events<B: StorageBackend>(
    backend: &mut B,
    codec: &Codec,
    events: &[VaultEvent],
) -> Result<()> {
    let json = serde_json::to_vec(events)?;
    backend.write(EVENTS_STORAGE_KEY, &codec.encode(json)?)
}
