//! Fixtures shared by the end-to-end scenario tests: a couple of level
//! taxonomies, draft builders for the squares the scenarios live on, and
//! an adapter that keeps its write history reachable after being boxed
//! into an `Editor`.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use geocatalog::{Area, AreaId, AreaLevel, ChangeSet, DraftShape, Editor, EditorConfig, PersistenceAdapter};

/// `prefecture` (root) -> `city` (leaf).
pub fn two_level_levels() -> Vec<AreaLevel> {
    vec![
        AreaLevel::new("prefecture", "Prefecture", None),
        AreaLevel::new("city", "City", Some("prefecture".into())),
    ]
}

/// `country` (root) -> `province` -> `prefecture` (leaf).
pub fn three_level_levels() -> Vec<AreaLevel> {
    vec![
        AreaLevel::new("country", "Country", None),
        AreaLevel::new("province", "Province", Some("country".into())),
        AreaLevel::new("prefecture", "Prefecture", Some("province".into())),
    ]
}

/// A closed rectangular draft over `(lng0..lng1, lat0..lat1)`, vertices
/// in CCW lng/lat order as a caller would hand-draw them.
pub fn rect_draft(lng0: f64, lat0: f64, lng1: f64, lat1: f64) -> DraftShape {
    DraftShape::new(
        vec![(lat0, lng0), (lat0, lng1), (lat1, lng1), (lat1, lng0), (lat0, lng0)],
        true,
    )
}

pub fn unit_square_draft() -> DraftShape {
    rect_draft(0.0, 0.0, 1.0, 1.0)
}

/// An already-loaded `Area` at `level_key`, parented under `parent_id`,
/// with a rectangular geometry — for building a pre-existing dataset
/// handed straight to `MemoryAdapter::new` rather than created through
/// the editor.
pub fn loaded_area(id: &str, name: &str, level_key: &str, parent_id: Option<&str>, lng0: f64, lat0: f64, lng1: f64, lat1: f64) -> Area {
    let ring = geocatalog::PolygonDef::new(
        vec![[lng0, lat0], [lng1, lat0], [lng1, lat1], [lng0, lat1], [lng0, lat0]],
        vec![],
    );
    Area::new(AreaId::new(id), name, level_key, parent_id.map(AreaId::new), geocatalog::AreaGeometry::Polygon(ring))
}

/// A `PersistenceAdapter` that hands its write history out through a
/// cloneable handle, so test code holds a reference even after the
/// adapter itself is boxed and owned by an `Editor`.
#[derive(Clone, Default)]
pub struct ObservableAdapter {
    initial: Arc<Vec<Area>>,
    writes: Arc<Mutex<Vec<ChangeSet>>>,
}

impl ObservableAdapter {
    pub fn new(initial: Vec<Area>) -> Self {
        Self { initial: Arc::new(initial), writes: Arc::new(Mutex::new(Vec::new())) }
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }
}

impl PersistenceAdapter for ObservableAdapter {
    fn load_all(&mut self) -> anyhow::Result<Vec<Area>> {
        Ok((*self.initial).clone())
    }

    fn batch_write(&mut self, change_set: &ChangeSet) -> anyhow::Result<()> {
        self.writes.lock().unwrap().push(change_set.clone());
        Ok(())
    }
}

pub fn editor_with(levels: Vec<AreaLevel>, initial: Vec<Area>, config: EditorConfig) -> (Editor, ObservableAdapter) {
    let adapter = ObservableAdapter::new(initial);
    let editor = Editor::new(config, levels, Box::new(adapter.clone())).expect("editor initializes");
    (editor, adapter)
}
