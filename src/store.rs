//! Durable record backends.
//!
//! The entity store mirrors every account into a [`RecordStore`]: one opaque record per user
//! id, always replaced in full. Backends move bytes; encoding and decoding stay with the
//! caller so a corrupt record is reported against the user it belongs to.
//!
//! - [`FileRecordStore`]: one JSON file per user inside a data directory.
//! - [`InMemoryRecordStore`]: a map of byte buffers, with fault injection for tests.

use async_trait::async_trait;
use std::io;

pub mod file;
pub mod memory;
pub use file::FileRecordStore;
pub use memory::InMemoryRecordStore;

/// Abstract storage interface for per-user records.
#[async_trait]
pub trait RecordStore: Send + Sync + std::fmt::Debug {
    /// Fetch the record for `key`, or `None` if it was never written.
    async fn read(&self, key: &str) -> io::Result<Option<Vec<u8>>>;

    /// Replace the record for `key` in a single step. Readers observe either the previous
    /// record or the new one, never a partial write.
    async fn write(&self, key: &str, record: &[u8]) -> io::Result<()>;

    /// Drop every record.
    async fn clear(&self) -> io::Result<()>;
}
