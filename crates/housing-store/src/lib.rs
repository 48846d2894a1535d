//! # housing-store
//!
//! The bounded student housing application vault and its local storage.
//!
//! A [`Vault`] keeps up to 50 applications, one per national ID, persisted
//! as a single JSON array through a [`StorageBackend`]. The default backend
//! is a SQLite key/value table; values can optionally be sealed with
//! XChaCha20-Poly1305 (see [`Codec`]).

pub mod backend;
pub mod codec;
pub mod database;
pub mod entries;
pub mod events;
pub mod export;
pub mod migrations;
pub mod query;
pub mod stats;
pub mod vault;

mod error;

pub use backend::{MemoryBackend, StorageBackend};
pub use codec::Codec;
pub use database::Database;
pub use error::{Result, StoreError};
pub use events::{EventKind, VaultEvent};
pub use query::{ApplicationQuery, Page, RankedApplication, SortKey};
pub use stats::{CollegeStats, GenderCounts, Statistics};
pub use vault::{SaveOutcome, SaveReceipt, Vault};
