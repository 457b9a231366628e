//! The `AreaStore` (§4.2): owns explicit areas, maintains the
//! `parent_id -> children` and `level_key -> areas` secondary indexes,
//! and synthesizes implicit children on demand.

use std::collections::{HashMap, HashSet};

use crate::area::{AnyArea, Area, ImplicitArea};
use crate::id::AreaId;
use crate::level::LevelStore;

#[derive(Debug, Default)]
pub struct AreaStore {
    by_id: HashMap<AreaId, Area>,
    children_of: HashMap<Option<AreaId>, HashSet<AreaId>>,
    by_level: HashMap<String, HashSet<AreaId>>,
}

impl AreaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads an initial set of real areas (from the persistence adapter),
    /// rebuilding both secondary indexes.
    pub fn load(areas: Vec<Area>) -> Self {
        let mut store = Self::new();
        for area in areas {
            store.add(area);
        }
        store
    }

    pub fn add(&mut self, area: Area) {
        self.index_insert(&area);
        self.by_id.insert(area.id.clone(), area);
    }

    pub fn update(&mut self, area: Area) {
        if let Some(old) = self.by_id.get(&area.id) {
            self.index_remove(old);
        }
        self.index_insert(&area);
        self.by_id.insert(area.id.clone(), area);
    }

    /// No-op if `id` is not present.
    pub fn delete(&mut self, id: &AreaId) {
        if let Some(area) = self.by_id.remove(id) {
            self.index_remove(&area);
        }
    }

    fn index_insert(&mut self, area: &Area) {
        self.children_of.entry(area.parent_id.clone()).or_default().insert(area.id.clone());
        self.by_level.entry(area.level_key.clone()).or_default().insert(area.id.clone());
    }

    fn index_remove(&mut self, area: &Area) {
        if let Some(set) = self.children_of.get_mut(&area.parent_id) {
            set.remove(&area.id);
        }
        if let Some(set) = self.by_level.get_mut(&area.level_key) {
            set.remove(&area.id);
        }
    }

    /// The real area with this id, or `None`.
    pub fn get_real(&self, id: &AreaId) -> Option<&Area> {
        self.by_id.get(id)
    }

    /// Resolves any id — real or the deterministic implicit encoding —
    /// to the area it denotes (§4.2 `get`).
    pub fn get(&self, level_store: &LevelStore, id: &AreaId) -> Option<AnyArea> {
        if let Some(area) = self.by_id.get(id) {
            return Some(AnyArea::Real(area.clone()));
        }
        let (parent_id, child_level) = id.parse_implicit()?;
        let parent = self.by_id.get(&parent_id)?;
        let expected_child_level = level_store.get_child_of(&parent.level_key)?;
        if expected_child_level.key != child_level {
            return None;
        }
        if self.has_explicit_children(&parent_id) {
            return None;
        }
        Some(AnyArea::Implicit(ImplicitArea::from_parent(parent, child_level)))
    }

    /// Explicit children of `parent_id`, real areas only — the view every
    /// "does this area have explicit children" check consults (§4.2).
    pub fn explicit_children(&self, parent_id: &AreaId) -> Vec<&Area> {
        self.children_of
            .get(&Some(parent_id.clone()))
            .into_iter()
            .flatten()
            .filter_map(|id| self.by_id.get(id))
            .collect()
    }

    pub fn has_explicit_children(&self, parent_id: &AreaId) -> bool {
        self.children_of.get(&Some(parent_id.clone())).is_some_and(|set| !set.is_empty())
    }

    /// `get_children` (§4.2): explicit children if any exist, else the
    /// single synthesized implicit child, else empty (leaf level).
    pub fn get_children(&self, level_store: &LevelStore, parent_id: &AreaId) -> Vec<AnyArea> {
        let explicit = self.explicit_children(parent_id);
        if !explicit.is_empty() {
            return explicit.into_iter().cloned().map(AnyArea::Real).collect();
        }
        let Some(parent) = self.by_id.get(parent_id) else {
            return Vec::new();
        };
        let Some(child_level) = level_store.get_child_of(&parent.level_key) else {
            return Vec::new();
        };
        vec![AnyArea::Implicit(ImplicitArea::from_parent(parent, &child_level.key))]
    }

    /// All real areas with no parent.
    pub fn get_roots(&self) -> Vec<&Area> {
        self.children_of
            .get(&None)
            .into_iter()
            .flatten()
            .filter_map(|id| self.by_id.get(id))
            .collect()
    }

    /// Every real (non-implicit) area.
    pub fn get_all(&self) -> Vec<&Area> {
        self.by_id.values().collect()
    }

    /// Every real area at `level_key`.
    pub fn get_by_level(&self, level_key: &str) -> Vec<&Area> {
        self.by_level
            .get(level_key)
            .into_iter()
            .flatten()
            .filter_map(|id| self.by_id.get(id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// BFS over explicit-child edges starting at `root`, `root` included.
    pub fn descendants_inclusive(&self, root: &AreaId) -> Vec<AreaId> {
        let mut out = vec![root.clone()];
        let mut frontier = vec![root.clone()];
        while let Some(current) = frontier.pop() {
            for child in self.explicit_children(&current) {
                out.push(child.id.clone());
                frontier.push(child.id.clone());
            }
        }
        out
    }

    /// True if `candidate` is `root` or a descendant of it through
    /// explicit children (used by `reparentArea`'s cycle check).
    pub fn is_descendant_or_self(&self, root: &AreaId, candidate: &AreaId) -> bool {
        self.descendants_inclusive(root).iter().any(|id| id == candidate)
    }
}
