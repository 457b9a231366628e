//! `HistoryEntry`, `ChangeSet`, and the bounded undo/redo stack (§3, §4.6).

use std::collections::VecDeque;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::area::Area;
use crate::id::AreaId;
use crate::propagate::AreaChange;
use crate::store::AreaStore;

/// Undo-facing record: full before/after snapshots so `undo`/`redo` can
/// apply the reverse without consulting the store for anything else.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub created: Vec<Area>,
    pub deleted: Vec<Area>,
    pub modified: Vec<ModifiedPair>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifiedPair {
    pub before: Area,
    pub after: Area,
}

impl HistoryEntry {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.deleted.is_empty() && self.modified.is_empty()
    }

    pub fn extend_modified(&mut self, changes: impl IntoIterator<Item = AreaChange>) {
        self.modified.extend(changes.into_iter().map(|c| ModifiedPair { before: c.before, after: c.after }));
    }

    /// Every area this entry touches, as it stands *after* the operation
    /// (used to build the adapter-facing `ChangeSet`).
    pub fn to_change_set(&self) -> ChangeSet {
        ChangeSet {
            created: self.created.clone(),
            deleted: self.deleted.iter().map(|a| a.id.clone()).collect(),
            modified: self.modified.iter().map(|m| m.after.clone()).collect(),
        }
    }

    /// Applies this entry's inverse to `store`: delete each `created`,
    /// re-insert each `deleted`, and roll each `modified` pair back to
    /// `before`. Returns the ids of every area this touched.
    fn apply_reverse(&self, store: &mut AreaStore) -> Vec<AreaId> {
        let mut touched = Vec::new();
        for area in &self.created {
            store.delete(&area.id);
            touched.push(area.id.clone());
        }
        for area in &self.deleted {
            store.add(area.clone());
            touched.push(area.id.clone());
        }
        for pair in &self.modified {
            store.update(pair.before.clone());
            touched.push(pair.before.id.clone());
        }
        touched
    }

    /// Applies this entry forward (as it was originally applied):
    /// re-create each `created`, delete each `deleted`, and roll each
    /// `modified` pair forward to `after`.
    fn apply_forward(&self, store: &mut AreaStore) -> Vec<AreaId> {
        let mut touched = Vec::new();
        for area in &self.created {
            store.add(area.clone());
            touched.push(area.id.clone());
        }
        for area in &self.deleted {
            store.delete(&area.id);
            touched.push(area.id.clone());
        }
        for pair in &self.modified {
            store.update(pair.after.clone());
            touched.push(pair.after.id.clone());
        }
        touched
    }
}

/// Storage-facing delta handed to the persistence adapter (§3, §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeSet {
    pub created: Vec<Area>,
    pub deleted: Vec<AreaId>,
    pub modified: Vec<Area>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.deleted.is_empty() && self.modified.is_empty()
    }
}

/// Bounded double stack of `HistoryEntry` (§4.6). Every successful Edit
/// Engine operation pushes exactly one entry, clearing redo; once the
/// undo stack exceeds `max_undo_steps`, the oldest entry is dropped.
#[derive(Debug, Default)]
pub struct History {
    undo_stack: VecDeque<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    max_undo_steps: usize,
}

impl History {
    pub fn new(max_undo_steps: usize) -> Self {
        Self { undo_stack: VecDeque::new(), redo_stack: Vec::new(), max_undo_steps }
    }

    /// Pushes `entry`, clears the redo stack, and evicts the oldest undo
    /// entry if the bound is exceeded.
    pub fn push(&mut self, entry: HistoryEntry) {
        self.redo_stack.clear();
        self.undo_stack.push_back(entry);
        while self.undo_stack.len() > self.max_undo_steps {
            self.undo_stack.pop_front();
            debug!("history bound exceeded; discarded oldest undo entry");
        }
    }

    /// Pops the most recent undo entry, applies its reverse to `store`,
    /// and pushes it onto the redo stack. Returns the touched area ids,
    /// or an empty vec (no mutation) if there was nothing to undo.
    pub fn undo(&mut self, store: &mut AreaStore) -> Vec<AreaId> {
        let Some(entry) = self.undo_stack.pop_back() else {
            return Vec::new();
        };
        let touched = entry.apply_reverse(store);
        self.redo_stack.push(entry);
        touched
    }

    /// Symmetric to `undo`: pops from redo, applies forward, pushes back
    /// onto undo (re-checking the bound, though redo never exceeds it
    /// since it only ever holds entries popped from undo).
    pub fn redo(&mut self, store: &mut AreaStore) -> Vec<AreaId> {
        let Some(entry) = self.redo_stack.pop() else {
            return Vec::new();
        };
        let touched = entry.apply_forward(store);
        self.undo_stack.push_back(entry);
        touched
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::Timestamp;
    use crate::geometry::{AreaGeometry, PolygonDef};

    fn square() -> AreaGeometry {
        AreaGeometry::Polygon(PolygonDef::new(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]], vec![]))
    }

    fn area(id: &str, name: &str) -> Area {
        Area {
            id: AreaId::new(id),
            display_name: name.to_string(),
            level_key: "x".into(),
            parent_id: None,
            geometry: square(),
            metadata: None,
            created_at: Timestamp(0),
            updated_at: Timestamp(0),
        }
    }

    #[test]
    fn bound_discards_oldest() {
        let mut history = History::new(2);
        let mut store = AreaStore::new();
        store.add(area("a", "R0"));

        for (from, to) in [("R0", "R1"), ("R1", "R2"), ("R2", "R3")] {
            let before = area("a", from);
            let after = area("a", to);
            store.update(after.clone());
            history.push(HistoryEntry { created: vec![], deleted: vec![], modified: vec![ModifiedPair { before, after }] });
        }

        assert_eq!(history.undo_len(), 2);

        history.undo(&mut store);
        assert_eq!(store.get_real(&AreaId::new("a")).unwrap().display_name, "R2");
        history.undo(&mut store);
        assert_eq!(store.get_real(&AreaId::new("a")).unwrap().display_name, "R1");

        // third undo: nothing left (the R0 -> R1 transition was evicted)
        let touched = history.undo(&mut store);
        assert!(touched.is_empty());
        assert_eq!(store.get_real(&AreaId::new("a")).unwrap().display_name, "R1");
    }

    #[test]
    fn undo_then_redo_restores_state() {
        let mut history = History::new(10);
        let mut store = AreaStore::new();
        store.add(area("a", "original"));
        let after = area("a", "renamed");
        store.update(after.clone());
        history.push(HistoryEntry {
            created: vec![],
            deleted: vec![],
            modified: vec![ModifiedPair { before: area("a", "original"), after }],
        });

        history.undo(&mut store);
        assert_eq!(store.get_real(&AreaId::new("a")).unwrap().display_name, "original");
        history.redo(&mut store);
        assert_eq!(store.get_real(&AreaId::new("a")).unwrap().display_name, "renamed");
    }

    #[test]
    fn push_clears_redo_stack() {
        let mut history = History::new(10);
        let mut store = AreaStore::new();
        store.add(area("a", "original"));
        history.push(HistoryEntry {
            created: vec![],
            deleted: vec![],
            modified: vec![ModifiedPair { before: area("a", "original"), after: area("a", "renamed") }],
        });
        history.undo(&mut store);
        assert_eq!(history.redo_len(), 1);
        history.push(HistoryEntry::default());
        assert_eq!(history.redo_len(), 0);
    }
}
