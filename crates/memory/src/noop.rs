//! No-op memory backend: archival disabled.

use async_trait::async_trait;
use shrimp_core::error::MemoryError;
use shrimp_core::memory::{MemoryBackend, MemoryEntry, MemoryQuery};

/// Accepts every store and remembers nothing.
pub struct NoopMemory;

#[async_trait]
impl MemoryBackend for NoopMemory {
    fn name(&self) -> &str { "none" }

    async fn store(&self, _entry: MemoryEntry) -> Result<String, MemoryError> {
        Ok(String::new())
    }

    async fn search(&self, _query: MemoryQuery) -> Result<Vec<MemoryEntry>, MemoryError> {
        Ok(Vec::new())
    }

    async fn get(&self, _id: &str) -> Result<Option<MemoryEntry>, MemoryError> {
        Ok(None)
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Ok(0)
    }
}
