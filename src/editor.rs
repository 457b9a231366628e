//! The Edit Engine (§4.5, §4.6, §6): `Editor` owns the level taxonomy,
//! the area store, and the undo/redo history, and is the only way a
//! caller mutates or queries either. Every write operation either
//! commits in full (store mutation, history push, adapter write) or
//! returns an error before touching any of the three.

use geo::BooleanOps;
use log::{debug, error, info};

use crate::adapter::PersistenceAdapter;
use crate::area::{AnyArea, Area, Timestamp};
use crate::config::EditorConfig;
use crate::draft::{validate_draft, DraftShape};
use crate::error::EditorError;
use crate::geometry::{signed_area, union_all, wind, AreaGeometry, PolygonDef};
use crate::history::{History, HistoryEntry, ModifiedPair};
use crate::id::{AreaId, AreaIdAllocator, UuidAllocator};
use crate::kernel::{dedup_loop, point_in_geometry, remove_whiskers, replace_coincident_vertices, split_by_line};
use crate::level::{AreaLevel, LevelStore};
use crate::propagate::propagate;
use crate::store::AreaStore;

const ZERO_AREA_TOLERANCE: f64 = 1e-14;

/// One item of a [`Editor::bulk_create`] batch.
#[derive(Debug, Clone)]
pub struct BulkCreateItem {
    pub draft: DraftShape,
    pub name: String,
    pub level_key: String,
    pub parent_id: Option<AreaId>,
}

struct ReadyState {
    levels: LevelStore,
    store: AreaStore,
    history: History,
    adapter: Box<dyn PersistenceAdapter>,
    allocator: Box<dyn AreaIdAllocator>,
}

enum EditorState {
    Uninitialized,
    Ready(ReadyState),
}

/// The in-memory, transactional editor (§3, §6). A fresh `Editor` is
/// [`Editor::uninitialized`] until [`Editor::initialize`] (or the
/// [`Editor::new`] convenience) succeeds; every operation on an
/// uninitialized editor returns [`EditorError::NotInitialized`].
pub struct Editor {
    config: EditorConfig,
    state: EditorState,
}

impl Editor {
    pub fn uninitialized(config: EditorConfig) -> Self {
        Self { config, state: EditorState::Uninitialized }
    }

    /// Validates `levels`, loads every area from `adapter`, checks the
    /// loaded set against the level store (I1), and moves this editor
    /// into the ready state.
    pub fn initialize(&mut self, levels: Vec<AreaLevel>, mut adapter: Box<dyn PersistenceAdapter>, allocator: Box<dyn AreaIdAllocator>) -> Result<(), EditorError> {
        let level_store = LevelStore::new(levels)?;
        let areas = adapter.load_all().map_err(|source| {
            error!("adapter load_all failed: {source}");
            EditorError::StorageError { source }
        })?;
        validate_integrity(&level_store, &areas)?;
        info!("editor initialized with {} areas", areas.len());
        let store = AreaStore::load(areas);
        self.state = EditorState::Ready(ReadyState {
            levels: level_store,
            store,
            history: History::new(self.config.max_undo_steps),
            adapter,
            allocator,
        });
        Ok(())
    }

    pub fn new(config: EditorConfig, levels: Vec<AreaLevel>, adapter: Box<dyn PersistenceAdapter>) -> Result<Self, EditorError> {
        Self::with_allocator(config, levels, adapter, Box::new(UuidAllocator))
    }

    pub fn with_allocator(config: EditorConfig, levels: Vec<AreaLevel>, adapter: Box<dyn PersistenceAdapter>, allocator: Box<dyn AreaIdAllocator>) -> Result<Self, EditorError> {
        let mut editor = Self::uninitialized(config);
        editor.initialize(levels, adapter, allocator)?;
        Ok(editor)
    }

    fn ready(&self) -> Option<&ReadyState> {
        match &self.state {
            EditorState::Ready(r) => Some(r),
            EditorState::Uninitialized => None,
        }
    }

    fn ready_mut(&mut self) -> Result<&mut ReadyState, EditorError> {
        match &mut self.state {
            EditorState::Ready(r) => Ok(r),
            EditorState::Uninitialized => Err(EditorError::NotInitialized),
        }
    }

    /// Pushes `entry` to history then hands the resulting change set to
    /// the adapter. A no-op entry (e.g. a split that didn't cut
    /// anything) skips both and is not an error.
    fn finish(&mut self, entry: HistoryEntry) -> Result<(), EditorError> {
        if entry.is_empty() {
            return Ok(());
        }
        let change_set = entry.to_change_set();
        let ready = self.ready_mut()?;
        ready.history.push(entry);
        ready.adapter.batch_write(&change_set).map_err(|source| {
            error!("adapter batch_write failed: {source}");
            EditorError::StorageError { source }
        })
    }

    // ---- Query API (§4.2) — pure, never fail, empty/default on a
    // not-yet-initialized editor instead of raising NotInitialized. ----

    pub fn get_area(&self, id: &AreaId) -> Option<AnyArea> {
        let ready = self.ready()?;
        ready.store.get(&ready.levels, id)
    }

    pub fn get_children(&self, id: &AreaId) -> Vec<AnyArea> {
        let Some(ready) = self.ready() else { return Vec::new() };
        ready.store.get_children(&ready.levels, id)
    }

    pub fn get_roots(&self) -> Vec<Area> {
        let Some(ready) = self.ready() else { return Vec::new() };
        ready.store.get_roots().into_iter().cloned().collect()
    }

    pub fn get_all_areas(&self) -> Vec<Area> {
        let Some(ready) = self.ready() else { return Vec::new() };
        ready.store.get_all().into_iter().cloned().collect()
    }

    pub fn get_by_level(&self, level_key: &str) -> Vec<Area> {
        let Some(ready) = self.ready() else { return Vec::new() };
        ready.store.get_by_level(level_key).into_iter().cloned().collect()
    }

    pub fn get_all_levels(&self) -> Vec<AreaLevel> {
        let Some(ready) = self.ready() else { return Vec::new() };
        ready.levels.all()
    }

    pub fn get_level(&self, key: &str) -> Option<AreaLevel> {
        self.ready()?.levels.get(key).cloned()
    }

    pub fn validate_draft(&self, draft: &DraftShape) -> Vec<crate::draft::DraftViolation> {
        validate_draft(draft)
    }

    pub fn undo(&mut self) -> Result<Vec<AreaId>, EditorError> {
        let ready = self.ready_mut()?;
        Ok(ready.history.undo(&mut ready.store))
    }

    pub fn redo(&mut self) -> Result<Vec<AreaId>, EditorError> {
        let ready = self.ready_mut()?;
        Ok(ready.history.redo(&mut ready.store))
    }

    // ---- Edit Engine operations (§4.5) ----

    pub fn save_as_area(&mut self, draft: &DraftShape, name: &str, level_key: &str, parent_id: Option<AreaId>) -> Result<Area, EditorError> {
        let ready = self.ready_mut()?;
        require_closed_and_valid(draft)?;
        let level = require_level(&ready.levels, level_key)?.clone();
        check_parent_matches_level(ready, &level, parent_id.as_ref())?;

        let ring = wind(draft.as_lnglat_ring(), true);
        let geometry = AreaGeometry::Polygon(PolygonDef::new(ring, vec![]));
        let id = ready.allocator.allocate();
        let area = Area::new(id, name, level_key, parent_id.clone(), geometry);
        ready.store.add(area.clone());
        debug!("saved area {} at level {level_key}", area.id);

        let mut entry = HistoryEntry { created: vec![area.clone()], deleted: vec![], modified: vec![] };
        if let Some(pid) = &parent_id {
            entry.extend_modified(propagate(&mut ready.store, pid));
        }
        self.finish(entry)?;
        Ok(area)
    }

    /// All-or-nothing: every item is validated before any area is
    /// created, so a single bad item leaves the store untouched (§4.5).
    pub fn bulk_create(&mut self, items: Vec<BulkCreateItem>) -> Result<Vec<Area>, EditorError> {
        let ready = self.ready_mut()?;
        for item in &items {
            require_closed_and_valid(&item.draft)?;
            let level = require_level(&ready.levels, &item.level_key)?.clone();
            check_parent_matches_level(ready, &level, item.parent_id.as_ref())?;
        }

        let mut created = Vec::with_capacity(items.len());
        let mut affected_parents: Vec<AreaId> = Vec::new();
        for item in &items {
            let ring = wind(item.draft.as_lnglat_ring(), true);
            let geometry = AreaGeometry::Polygon(PolygonDef::new(ring, vec![]));
            let id = ready.allocator.allocate();
            let area = Area::new(id, item.name.clone(), item.level_key.clone(), item.parent_id.clone(), geometry);
            ready.store.add(area.clone());
            if let Some(pid) = &item.parent_id {
                if !affected_parents.contains(pid) {
                    affected_parents.push(pid.clone());
                }
            }
            created.push(area);
        }
        info!("bulk_create committed {} areas", created.len());

        let mut entry = HistoryEntry { created: created.clone(), deleted: vec![], modified: vec![] };
        for pid in &affected_parents {
            entry.extend_modified(propagate(&mut ready.store, pid));
        }
        self.finish(entry)?;
        Ok(created)
    }

    pub fn update_area_geometry(&mut self, area_id: &AreaId, draft: &DraftShape) -> Result<Area, EditorError> {
        let ready = self.ready_mut()?;
        let before = require_real(ready, area_id)?;
        if ready.store.has_explicit_children(area_id) {
            return Err(EditorError::AreaHasChildren { id: area_id.clone() });
        }
        require_closed_and_valid(draft)?;

        let ring = wind(draft.as_lnglat_ring(), true);
        let mut after = before.clone();
        after.geometry = AreaGeometry::Polygon(PolygonDef::new(ring, vec![]));
        after.updated_at = Timestamp::now();
        ready.store.update(after.clone());

        let mut entry = HistoryEntry { created: vec![], deleted: vec![], modified: vec![ModifiedPair { before: before.clone(), after: after.clone() }] };
        if let Some(pid) = &before.parent_id {
            entry.extend_modified(propagate(&mut ready.store, pid));
        }
        self.finish(entry)?;
        Ok(after)
    }

    /// Without `cascade`, fails with [`EditorError::AreaHasChildren`] if
    /// `area_id` has any explicit child. With `cascade`, deletes the
    /// whole explicit-child subtree beneath it too.
    pub fn delete_area(&mut self, area_id: &AreaId, cascade: bool) -> Result<Vec<Area>, EditorError> {
        let ready = self.ready_mut()?;
        let target = require_real(ready, area_id)?;
        if !cascade && ready.store.has_explicit_children(area_id) {
            return Err(EditorError::AreaHasChildren { id: area_id.clone() });
        }

        let ids_to_delete = if cascade { ready.store.descendants_inclusive(area_id) } else { vec![area_id.clone()] };
        let mut deleted = Vec::with_capacity(ids_to_delete.len());
        for id in &ids_to_delete {
            if let Some(area) = ready.store.get_real(id).cloned() {
                ready.store.delete(id);
                deleted.push(area);
            }
        }
        debug!("deleted {} area(s) rooted at {area_id}", deleted.len());

        let mut entry = HistoryEntry { created: vec![], deleted: deleted.clone(), modified: vec![] };
        if let Some(pid) = &target.parent_id {
            entry.extend_modified(propagate(&mut ready.store, pid));
        }
        self.finish(entry)?;
        Ok(deleted)
    }

    pub fn rename_area(&mut self, area_id: &AreaId, name: &str) -> Result<Area, EditorError> {
        let ready = self.ready_mut()?;
        let before = require_real(ready, area_id)?;
        let mut after = before.clone();
        after.display_name = name.to_string();
        after.updated_at = Timestamp::now();
        ready.store.update(after.clone());

        let entry = HistoryEntry { created: vec![], deleted: vec![], modified: vec![ModifiedPair { before, after: after.clone() }] };
        self.finish(entry)?;
        Ok(after)
    }

    /// Moves `area_id` under `new_parent_id` (or to root, if `None`).
    /// No ancestor geometry is recomputed by this operation — matching
    /// the behavior this editor was modeled on; see `DESIGN.md`.
    pub fn reparent_area(&mut self, area_id: &AreaId, new_parent_id: Option<AreaId>) -> Result<Area, EditorError> {
        let ready = self.ready_mut()?;
        let before = require_real(ready, area_id)?;
        let area_level = require_level(&ready.levels, &before.level_key)?.clone();

        match &new_parent_id {
            Some(new_parent) => {
                let new_parent_area = require_real(ready, new_parent)?;
                if area_level.parent_level_key.as_deref() != Some(new_parent_area.level_key.as_str()) {
                    return Err(EditorError::LevelMismatch {
                        reason: format!("area's level '{}' is not a child of new parent's level '{}'", before.level_key, new_parent_area.level_key),
                    });
                }
                if ready.store.is_descendant_or_self(area_id, new_parent) {
                    return Err(EditorError::CircularReference { id: area_id.clone(), new_parent: new_parent.clone() });
                }
            }
            None => {
                if area_level.parent_level_key.is_some() {
                    return Err(EditorError::LevelMismatch { reason: format!("area's level '{}' is not a root level", before.level_key) });
                }
            }
        }

        if let Some(old_parent) = &before.parent_id {
            let remaining = ready.store.explicit_children(old_parent).iter().filter(|s| s.id != *area_id).count();
            if remaining == 0 {
                return Err(EditorError::ParentWouldBeEmpty { id: area_id.clone(), parent: old_parent.clone() });
            }
        }

        let mut after = before.clone();
        after.parent_id = new_parent_id;
        after.updated_at = Timestamp::now();
        ready.store.update(after.clone());

        let entry = HistoryEntry { created: vec![], deleted: vec![], modified: vec![ModifiedPair { before, after: after.clone() }] };
        self.finish(entry)?;
        Ok(after)
    }

    /// Merges `other_area_id` into `area_id`: `area_id` survives with
    /// the union of both geometries, `other_area_id` is deleted. No
    /// ancestor propagation — union is associative, so the ancestor
    /// chain's geometry is already correct.
    pub fn merge_area(&mut self, area_id: &AreaId, other_area_id: &AreaId) -> Result<Area, EditorError> {
        let ready = self.ready_mut()?;
        let survivor_before = require_real(ready, area_id)?;
        let other = require_real(ready, other_area_id)?;
        if survivor_before.parent_id != other.parent_id || survivor_before.level_key != other.level_key {
            return Err(EditorError::LevelMismatch { reason: "merge candidates must share a parent and a level".into() });
        }
        if ready.store.has_explicit_children(area_id) {
            return Err(EditorError::AreaHasChildren { id: area_id.clone() });
        }
        if ready.store.has_explicit_children(other_area_id) {
            return Err(EditorError::AreaHasChildren { id: other_area_id.clone() });
        }

        let merged = union_all([survivor_before.geometry.clone(), other.geometry.clone()])
            .ok_or_else(|| EditorError::InvalidGeometry { reason: "merge produced no geometry".into() })?;
        let mut survivor_after = survivor_before.clone();
        survivor_after.geometry = merged;
        survivor_after.updated_at = Timestamp::now();
        ready.store.update(survivor_after.clone());
        ready.store.delete(other_area_id);

        let entry = HistoryEntry {
            created: vec![],
            deleted: vec![other],
            modified: vec![ModifiedPair { before: survivor_before, after: survivor_after.clone() }],
        };
        self.finish(entry)?;
        Ok(survivor_after)
    }

    /// Moves vertex `vertex_index` of `area_id`'s exterior ring to
    /// `(new_lat, new_lng)`, and rewrites every coincident vertex (within
    /// `epsilon`) across `area_id`'s siblings — including `area_id`
    /// itself — so the shared edge moves together on both sides.
    pub fn shared_edge_move(&mut self, area_id: &AreaId, vertex_index: usize, new_lat: f64, new_lng: f64) -> Result<Vec<Area>, EditorError> {
        let epsilon = self.config.epsilon;
        let ready = self.ready_mut()?;
        let area = require_real(ready, area_id)?;
        if ready.store.has_explicit_children(area_id) {
            return Err(EditorError::AreaHasChildren { id: area_id.clone() });
        }
        let exterior = match &area.geometry {
            AreaGeometry::Polygon(p) => p.exterior.clone(),
            AreaGeometry::MultiPolygon(_) => return Err(EditorError::InvalidGeometry { reason: "sharedEdgeMove requires a single-polygon area".into() }),
        };
        let open_len = exterior.len().saturating_sub(1).max(1);
        let target_vertex = exterior[vertex_index % open_len];
        let replacement = [new_lng, new_lat];

        let siblings: Vec<Area> = match &area.parent_id {
            Some(pid) => ready.store.explicit_children(pid).into_iter().cloned().collect(),
            None => ready.store.get_roots().into_iter().cloned().collect(),
        };

        let mut modified = Vec::new();
        for mut sibling in siblings {
            let mut poly = match &sibling.geometry {
                AreaGeometry::Polygon(p) => p.clone(),
                AreaGeometry::MultiPolygon(_) => continue,
            };
            if !replace_coincident_vertices(&mut poly, target_vertex, replacement, epsilon) {
                continue;
            }
            let before = sibling.clone();
            sibling.geometry = AreaGeometry::Polygon(poly);
            sibling.updated_at = Timestamp::now();
            ready.store.update(sibling.clone());
            modified.push(ModifiedPair { before, after: sibling });
        }

        let mut entry = HistoryEntry { created: vec![], deleted: vec![], modified };
        if let Some(pid) = &area.parent_id {
            entry.extend_modified(propagate(&mut ready.store, pid));
        }
        let touched: Vec<Area> = entry.modified.iter().map(|m| m.after.clone()).collect();
        self.finish(entry)?;
        Ok(touched)
    }

    /// Cuts `target_id`'s geometry along `open_draft` into two or more
    /// explicit children at its child level. `target_id` may itself be
    /// implicit; an implicit id resolves to the real parent it denotes
    /// (the new children are then parented to that real parent). A
    /// line that does not actually cut the target is a no-op: empty
    /// result, no history entry, no adapter call.
    pub fn split_as_children(&mut self, target_id: &AreaId, open_draft: &DraftShape) -> Result<Vec<Area>, EditorError> {
        let ready = self.ready_mut()?;
        require_open_line(open_draft)?;
        let resolved = ready.store.get(&ready.levels, target_id).ok_or_else(|| EditorError::AreaNotFound { id: target_id.clone() })?;
        let target_id = match resolved {
            AnyArea::Real(a) => a.id,
            AnyArea::Implicit(ia) => ia.parent_id,
        };
        let target = require_real(ready, &target_id)?;
        if ready.store.has_explicit_children(&target_id) {
            return Err(EditorError::AreaHasChildren { id: target_id });
        }
        let child_level = require_child_level(&ready.levels, &target.level_key)?;

        let created = cut_into_children(ready, &target, &target_id, &child_level, open_draft)?;
        if created.is_empty() {
            return Ok(Vec::new());
        }

        let mut entry = HistoryEntry { created: created.clone(), deleted: vec![], modified: vec![] };
        entry.extend_modified(propagate(&mut ready.store, &target_id));
        self.finish(entry)?;
        Ok(created)
    }

    /// Like `split_as_children`, but `area_id` must already be a real
    /// area: it is deleted and replaced by the pieces, which inherit
    /// its level and parent rather than descending a level.
    pub fn split_replace(&mut self, area_id: &AreaId, open_draft: &DraftShape) -> Result<Vec<Area>, EditorError> {
        let ready = self.ready_mut()?;
        require_open_line(open_draft)?;
        let target = require_real(ready, area_id)?;
        if ready.store.has_explicit_children(area_id) {
            return Err(EditorError::AreaHasChildren { id: area_id.clone() });
        }

        let cut_parent = target.parent_id.clone().unwrap_or_else(|| area_id.clone());
        let created = cut_into_children(ready, &target, &cut_parent, &target.level_key, open_draft)?;
        let created = reparent_pieces(created, target.level_key.clone(), target.parent_id.clone(), ready);
        if created.is_empty() {
            return Ok(Vec::new());
        }
        ready.store.delete(area_id);

        let mut entry = HistoryEntry { created: created.clone(), deleted: vec![target.clone()], modified: vec![] };
        if let Some(pid) = &target.parent_id {
            entry.extend_modified(propagate(&mut ready.store, pid));
        }
        self.finish(entry)?;
        Ok(created)
    }

    /// Splits off an interior loop as a new child, leaving the
    /// remainder as a sibling child: `parent_area_id` gains two
    /// children ("outer" carrying a hole, "inner" filling it) at its
    /// child level. A strict check rejects a loop with any vertex
    /// outside the parent's current geometry.
    pub fn carve_inner_child(&mut self, parent_area_id: &AreaId, loop_points: &[(f64, f64)]) -> Result<(Area, Area), EditorError> {
        let ready = self.ready_mut()?;
        let parent = require_real(ready, parent_area_id)?;
        if ready.store.has_explicit_children(parent_area_id) {
            return Err(EditorError::AreaHasChildren { id: parent_area_id.clone() });
        }
        let child_level = require_child_level(&ready.levels, &parent.level_key)?;

        let inner_polygon = build_loop_polygon(loop_points)?;
        if inner_polygon.exterior().0.iter().any(|c| !point_in_geometry(&parent.geometry, [c.x, c.y])) {
            return Err(EditorError::InvalidGeometry { reason: "carveInnerChild loop must lie within the parent's geometry".into() });
        }

        let outer_geo = parent.geometry.to_geo().difference(&geo::MultiPolygon(vec![inner_polygon.clone()]));
        let outer_geometry = AreaGeometry::from_geo(outer_geo);
        let inner_geometry = AreaGeometry::from_single(inner_polygon);

        let outer = Area::new(ready.allocator.allocate(), "", child_level.clone(), Some(parent_area_id.clone()), outer_geometry);
        let inner = Area::new(ready.allocator.allocate(), "", child_level, Some(parent_area_id.clone()), inner_geometry);
        ready.store.add(outer.clone());
        ready.store.add(inner.clone());

        let mut entry = HistoryEntry { created: vec![outer.clone(), inner.clone()], deleted: vec![], modified: vec![] };
        entry.extend_modified(propagate(&mut ready.store, parent_area_id));
        self.finish(entry)?;
        Ok((outer, inner))
    }

    /// Punches a hole in `area_id`'s own geometry: `area_id` keeps its
    /// identity but becomes a donut, and a new sibling at the same
    /// level and parent fills the hole.
    pub fn punch_hole(&mut self, area_id: &AreaId, hole_points: &[(f64, f64)]) -> Result<(Area, Area), EditorError> {
        let ready = self.ready_mut()?;
        let before = require_real(ready, area_id)?;
        if ready.store.has_explicit_children(area_id) {
            return Err(EditorError::AreaHasChildren { id: area_id.clone() });
        }

        let hole_polygon = build_loop_polygon(hole_points)?;
        let donut_geo = before.geometry.to_geo().difference(&geo::MultiPolygon(vec![hole_polygon.clone()]));
        let mut after = before.clone();
        after.geometry = AreaGeometry::from_geo(donut_geo);
        after.updated_at = Timestamp::now();
        ready.store.update(after.clone());

        let inner = Area::new(ready.allocator.allocate(), "", before.level_key.clone(), before.parent_id.clone(), AreaGeometry::from_single(hole_polygon));
        ready.store.add(inner.clone());

        let mut entry = HistoryEntry {
            created: vec![inner.clone()],
            deleted: vec![],
            modified: vec![ModifiedPair { before, after: after.clone() }],
        };
        if let Some(pid) = &after.parent_id {
            entry.extend_modified(propagate(&mut ready.store, pid));
        }
        self.finish(entry)?;
        Ok((after, inner))
    }

    /// Adds a new outer child to `parent_area_id` and unions it into
    /// the parent's own geometry. If the parent currently has no
    /// explicit children (only a synthesized implicit one), its
    /// *current* geometry is first materialized as an explicit twin
    /// child at the child level, so the parent ends up with exactly
    /// two children whose union is the expanded geometry.
    pub fn expand_with_child(&mut self, parent_area_id: &AreaId, outer_path: &[(f64, f64)]) -> Result<Area, EditorError> {
        let ready = self.ready_mut()?;
        if outer_path.len() < 2 {
            return Err(EditorError::InvalidGeometry { reason: "expandWithChild requires an outer path with at least two points".into() });
        }
        let parent = require_real(ready, parent_area_id)?;
        let child_level = require_child_level(&ready.levels, &parent.level_key)?;

        let ring = wind(crate::geometry::close_ring(&outer_path.iter().map(|(lat, lng)| [*lng, *lat]).collect::<Vec<_>>()), true);
        if signed_area(&ring).abs() < ZERO_AREA_TOLERANCE {
            return Err(EditorError::InvalidGeometry { reason: "expandWithChild outer path has zero area".into() });
        }
        let outer_geometry = AreaGeometry::Polygon(PolygonDef::new(ring, vec![]));

        let mut created = Vec::new();
        if !ready.store.has_explicit_children(parent_area_id) {
            let twin = Area::new(ready.allocator.allocate(), "", child_level.clone(), Some(parent_area_id.clone()), parent.geometry.clone());
            ready.store.add(twin.clone());
            created.push(twin);
            debug!("materialized implicit twin of {parent_area_id} before expandWithChild");
        }

        let child = Area::new(ready.allocator.allocate(), "", child_level, Some(parent_area_id.clone()), outer_geometry);
        ready.store.add(child.clone());
        created.push(child.clone());

        let mut entry = HistoryEntry { created, deleted: vec![], modified: vec![] };
        entry.extend_modified(propagate(&mut ready.store, parent_area_id));
        self.finish(entry)?;
        Ok(child)
    }
}

fn require_real(ready: &ReadyState, id: &AreaId) -> Result<Area, EditorError> {
    ready.store.get_real(id).cloned().ok_or_else(|| EditorError::AreaNotFound { id: id.clone() })
}

fn require_level<'a>(levels: &'a LevelStore, key: &str) -> Result<&'a AreaLevel, EditorError> {
    levels.get(key).ok_or_else(|| EditorError::AreaLevelNotFound { key: key.to_string() })
}

fn require_child_level(levels: &LevelStore, parent_level_key: &str) -> Result<String, EditorError> {
    levels
        .get_child_of(parent_level_key)
        .map(|l| l.key.clone())
        .ok_or_else(|| EditorError::NoChildLevel { key: parent_level_key.to_string() })
}

fn require_closed_and_valid(draft: &DraftShape) -> Result<(), EditorError> {
    if !draft.closed {
        return Err(EditorError::DraftNotClosed);
    }
    let violations = validate_draft(draft);
    if !violations.is_empty() {
        return Err(EditorError::InvalidGeometry { reason: format!("{violations:?}") });
    }
    Ok(())
}

fn require_open_line(draft: &DraftShape) -> Result<(), EditorError> {
    if draft.closed || draft.points.len() < 2 {
        return Err(EditorError::InvalidGeometry { reason: "this operation requires an open draft with at least two points".into() });
    }
    Ok(())
}

fn check_parent_matches_level(ready: &ReadyState, level: &AreaLevel, parent_id: Option<&AreaId>) -> Result<(), EditorError> {
    match parent_id {
        Some(pid) => {
            let parent = require_real(ready, pid)?;
            if level.parent_level_key.as_deref() != Some(parent.level_key.as_str()) {
                return Err(EditorError::LevelMismatch {
                    reason: format!("level '{}' is not a child of parent's level '{}'", level.key, parent.level_key),
                });
            }
        }
        None => {
            if level.parent_level_key.is_some() {
                return Err(EditorError::LevelMismatch { reason: format!("level '{}' requires a parent", level.key) });
            }
        }
    }
    Ok(())
}

/// Shared tail of `split_as_children`/`split_replace`: clean whiskers
/// from the drawn line, cut `target`'s geometry, and materialize every
/// non-degenerate piece as a new area at `child_level` under `parent_id`.
fn cut_into_children(ready: &mut ReadyState, target: &Area, parent_id: &AreaId, new_level: &str, open_draft: &DraftShape) -> Result<Vec<Area>, EditorError> {
    let cleaned = remove_whiskers(&open_draft.points);
    if cleaned.len() < 2 {
        return Err(EditorError::InvalidGeometry { reason: "draft collapsed to fewer than two points after whisker removal".into() });
    }
    let line: Vec<[f64; 2]> = cleaned.iter().map(|(lat, lng)| [*lng, *lat]).collect();
    let pieces = split_by_line(&target.geometry, &line);
    let non_empty: Vec<_> = pieces.into_iter().filter(|p| p.exterior().0.len() >= 4).collect();
    if non_empty.len() < 2 {
        return Ok(Vec::new());
    }

    let mut created = Vec::with_capacity(non_empty.len());
    for piece in non_empty {
        let geometry = AreaGeometry::from_single(piece);
        let id = ready.allocator.allocate();
        let area = Area::new(id, "", new_level, Some(parent_id.clone()), geometry);
        ready.store.add(area.clone());
        created.push(area);
    }
    Ok(created)
}

/// `split_replace`'s pieces come back parented/leveled as if for
/// `split_as_children` (one level down); rewrite them in place to
/// inherit the replaced area's own level and parent instead.
fn reparent_pieces(mut pieces: Vec<Area>, level_key: String, parent_id: Option<AreaId>, ready: &mut ReadyState) -> Vec<Area> {
    for piece in &mut pieces {
        piece.level_key = level_key.clone();
        piece.parent_id = parent_id.clone();
        ready.store.update(piece.clone());
    }
    pieces
}

fn build_loop_polygon(points: &[(f64, f64)]) -> Result<geo::Polygon<f64>, EditorError> {
    let deduped = dedup_loop(points);
    if deduped.len() < 3 {
        return Err(EditorError::InvalidGeometry { reason: "loop requires at least three distinct points".into() });
    }
    let ring = wind(crate::geometry::close_ring(&deduped.iter().map(|(lat, lng)| [*lng, *lat]).collect::<Vec<_>>()), true);
    if signed_area(&ring).abs() < ZERO_AREA_TOLERANCE {
        return Err(EditorError::InvalidGeometry { reason: "loop has zero area".into() });
    }
    Ok(PolygonDef::new(ring, vec![]).to_geo())
}

/// Checks the two things a half-loaded store cannot safely operate
/// without: every area's level is known, and `parent_id` references
/// (when present) resolve to a loaded area with no cycle among them.
///
/// Deliberately does *not* re-check that an area's level sits where the
/// level chain says it should relative to its parent's level — a loaded
/// dataset can already be mid-migration or otherwise stale on that
/// front, and each mutating operation (`reparentArea`, `saveAsArea`,
/// `bulkCreate`, ...) enforces the level chain for anything it touches
/// going forward. Load-time integrity is about whether the store is
/// navigable, not whether every record is already where I1 wants it.
fn validate_integrity(levels: &LevelStore, areas: &[Area]) -> Result<(), EditorError> {
    use std::collections::HashSet;
    let ids: HashSet<&AreaId> = areas.iter().map(|a| &a.id).collect();

    for area in areas {
        levels.get(&area.level_key).ok_or_else(|| EditorError::DataIntegrity {
            reason: format!("area {} references unknown level '{}'", area.id, area.level_key),
        })?;
        if let Some(pid) = &area.parent_id {
            if !ids.contains(pid) {
                return Err(EditorError::DataIntegrity { reason: format!("area {} references missing parent {pid}", area.id) });
            }
        }
    }

    for area in areas {
        let mut seen = HashSet::new();
        let mut current = area;
        loop {
            if !seen.insert(&current.id) {
                return Err(EditorError::DataIntegrity { reason: format!("parent chain starting at area {} cycles back on itself", area.id) });
            }
            match &current.parent_id {
                None => break,
                Some(pid) => current = areas.iter().find(|a| &a.id == pid).expect("checked above"),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MemoryAdapter;
    use crate::geometry::signed_area as ring_signed_area;

    fn levels() -> Vec<AreaLevel> {
        vec![AreaLevel::new("prefecture", "Prefecture", None), AreaLevel::new("city", "City", Some("prefecture".into()))]
    }

    fn square(lng0: f64, lat0: f64, lng1: f64, lat1: f64) -> DraftShape {
        DraftShape::new(vec![(lat0, lng0), (lat0, lng1), (lat1, lng1), (lat1, lng0), (lat0, lng0)], true)
    }

    fn fresh_editor(preloaded: Vec<Area>) -> Editor {
        Editor::new(EditorConfig::default(), levels(), Box::new(MemoryAdapter::new(preloaded))).unwrap()
    }

    fn prefecture() -> Area {
        let geometry = AreaGeometry::Polygon(PolygonDef::new(square(0.0, 0.0, 1.0, 1.0).as_lnglat_ring(), vec![]));
        Area::new(AreaId::new("P"), "P", "prefecture", None, geometry)
    }

    #[test]
    fn uninitialized_editor_rejects_writes_but_queries_stay_empty() {
        let mut editor = Editor::uninitialized(EditorConfig::default());
        assert!(editor.get_all_areas().is_empty());
        assert!(editor.get_area(&AreaId::new("anything")).is_none());
        assert!(matches!(editor.rename_area(&AreaId::new("anything"), "x"), Err(EditorError::NotInitialized)));
    }

    #[test]
    fn save_as_area_unions_into_parent() {
        let mut editor = fresh_editor(vec![prefecture()]);
        let created = editor.save_as_area(&square(0.0, 0.0, 1.0, 1.0), "A", "city", Some(AreaId::new("P"))).unwrap();
        let parent = editor.get_area(&AreaId::new("P")).unwrap();
        assert!(parent.geometry().is_single_polygon());
        // Parent's area should match the child's area within the geometry
        // kernel's float tolerance, not bit-for-bit (the ring underwent a
        // union round-trip through `geo`).
        let expected = ring_signed_area(&square(0.0, 0.0, 1.0, 1.0).as_lnglat_ring()).abs();
        let actual = match parent.geometry() {
            AreaGeometry::Polygon(p) => ring_signed_area(&p.exterior).abs(),
            AreaGeometry::MultiPolygon(_) => panic!("expected single polygon"),
        };
        approx::assert_relative_eq!(expected, actual, epsilon = 1e-9);
        assert_eq!(created.parent_id, Some(AreaId::new("P")));
    }

    #[test]
    fn bulk_create_rolls_back_on_any_bad_item() {
        let mut editor = fresh_editor(vec![]);
        let items = vec![
            BulkCreateItem { draft: square(0.0, 0.0, 1.0, 1.0), name: "ok".into(), level_key: "prefecture".into(), parent_id: None },
            BulkCreateItem { draft: square(2.0, 0.0, 3.0, 1.0), name: "bad".into(), level_key: "nope".into(), parent_id: None },
        ];
        let err = editor.bulk_create(items).unwrap_err();
        assert!(matches!(err, EditorError::AreaLevelNotFound { .. }));
        assert!(editor.get_all_areas().is_empty());
    }

    #[test]
    fn delete_area_without_cascade_rejects_parent_with_children() {
        let mut editor = fresh_editor(vec![prefecture()]);
        editor.save_as_area(&square(0.0, 0.0, 1.0, 1.0), "A", "city", Some(AreaId::new("P"))).unwrap();
        let err = editor.delete_area(&AreaId::new("P"), false).unwrap_err();
        assert!(matches!(err, EditorError::AreaHasChildren { .. }));
    }

    #[test]
    fn reparent_rejects_a_cycle() {
        let mut editor = fresh_editor(vec![prefecture()]);
        let city = editor.save_as_area(&square(0.0, 0.0, 1.0, 1.0), "A", "city", Some(AreaId::new("P"))).unwrap();
        // City's own level has no child level, so this can never be a
        // legitimate new parent for the prefecture; the circular check
        // is unreachable through the public API here, so this exercises
        // the more ordinary LevelMismatch path instead.
        let err = editor.reparent_area(&AreaId::new("P"), Some(city.id)).unwrap_err();
        assert!(matches!(err, EditorError::LevelMismatch { .. }));
    }

    #[test]
    fn expand_with_child_materializes_twin_when_parent_has_no_explicit_children() {
        let mut editor = fresh_editor(vec![prefecture()]);
        let new_child = editor.expand_with_child(&AreaId::new("P"), &[(0.0, 1.0), (1.0, 1.0), (1.0, 2.0), (0.0, 2.0)]).unwrap();
        let children = editor.get_children(&AreaId::new("P"));
        assert_eq!(children.len(), 2);
        assert!(children.iter().any(|c| c.id() == &new_child.id));
        assert!(children.iter().all(|c| !c.is_implicit()));
    }

    #[test]
    fn undo_redo_round_trips_to_the_same_store() {
        let mut editor = fresh_editor(vec![prefecture()]);
        editor.save_as_area(&square(0.0, 0.0, 1.0, 1.0), "A", "city", Some(AreaId::new("P"))).unwrap();
        let mid = editor.get_all_areas();
        editor.rename_area(&AreaId::new("P"), "renamed").unwrap();
        editor.undo().unwrap();
        assert_eq!(editor.get_all_areas(), mid);
        editor.redo().unwrap();
        assert_eq!(editor.get_all_areas().into_iter().find(|a| a.id == AreaId::new("P")).unwrap().display_name, "renamed");
    }
}
