use super::RecordStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Simple in-memory record store. Clones share the same records.
#[derive(Default, Clone, Debug)]
pub struct InMemoryRecordStore {
    records: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    fail_writes: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `write`/`clear` fail with an I/O error until switched off.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Place raw bytes under `key`, bypassing encoding (e.g. to plant a corrupt record).
    pub fn insert_raw(&self, key: &str, bytes: impl Into<Vec<u8>>) {
        self.guard().insert(key.to_string(), bytes.into());
    }

    /// Raw bytes currently stored under `key`.
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.guard().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    /// Number of successful writes since creation.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_writable(&self) -> io::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(io::Error::new(io::ErrorKind::Other, "injected write failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn read(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self.guard().get(key).cloned())
    }

    async fn write(&self, key: &str, record: &[u8]) -> io::Result<()> {
        self.check_writable()?;
        self.guard().insert(key.to_string(), record.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self) -> io::Result<()> {
        self.check_writable()?;
        self.guard().clear();
        Ok(())
    }
}
