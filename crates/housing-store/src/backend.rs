//! Storage backends for the vault.
//!
//! A backend is a flat key/value store; the vault writes its whole
//! application list under one key. Every call is fallible and non-retrying.

use std::collections::HashMap;

use crate::database::Database;
use crate::error::{Result, StoreError};

pub trait StorageBackend {
    /// Read the value stored under `key`. `Ok(None)` when absent.
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the value stored under `key`.
    fn write(&mut self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&mut self, key: &str) -> Result<()>;
}

impl StorageBackend for Database {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.get_entry(key)
    }

    fn write(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.put_entry(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.delete_entry(key).map(|_| ())
    }
}

/// Volatile backend, used by tests and by embedders that persist elsewhere.
///
/// Reads and writes can be switched to fail to exercise the vault's
/// degradation paths.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    entries: HashMap<String, Vec<u8>>,
    fail_reads: bool,
    fail_writes: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed `key` with a raw value.
    pub fn with_entry(mut self, key: &str, value: impl Into<Vec<u8>>) -> Self {
        self.entries.insert(key.to_string(), value.into());
        self
    }

    pub fn set_fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Raw bytes currently stored under `key`.
    pub fn entry(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if self.fail_reads {
            return Err(StoreError::Unavailable("read failure injected"));
        }
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &[u8]) -> Result<()> {
        if self.fail_writes {
            return Err(StoreError::Unavailable("write failure injected"));
        }
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.fail_writes {
            return Err(StoreError::Unavailable("write failure injected"));
        }
        self.entries.remove(key);
        Ok(())
    }
}
