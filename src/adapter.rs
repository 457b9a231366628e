//! The persistence adapter seam (§6): the editor's only external
//! collaborator besides the geometry kernel. `load_all`/`batch_write`
//! failures surface as `StorageError`/`DataIntegrity`; the editor never
//! retries and never rolls back in-memory state on a `StorageError`.

use crate::area::Area;
use crate::history::ChangeSet;

/// Everything the editor needs from an external store.
pub trait PersistenceAdapter: Send + Sync {
    /// Loads every real area. Atomicity across the whole set, and any
    /// draft-scratchpad persistence, is the adapter's concern.
    fn load_all(&mut self) -> anyhow::Result<Vec<Area>>;

    /// Durably applies `change_set`. Atomicity and ordering among the
    /// three fields are the adapter's concern, not the editor's.
    fn batch_write(&mut self, change_set: &ChangeSet) -> anyhow::Result<()>;
}

/// A simple in-memory adapter: useful as a test double and as the
/// default when a caller has nothing durable to write to yet.
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    areas: Vec<Area>,
    pub writes: Vec<ChangeSet>,
}

impl MemoryAdapter {
    pub fn new(areas: Vec<Area>) -> Self {
        Self { areas, writes: Vec::new() }
    }
}

impl PersistenceAdapter for MemoryAdapter {
    fn load_all(&mut self) -> anyhow::Result<Vec<Area>> {
        Ok(self.areas.clone())
    }

    fn batch_write(&mut self, change_set: &ChangeSet) -> anyhow::Result<()> {
        self.writes.push(change_set.clone());
        Ok(())
    }
}
