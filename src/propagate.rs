//! The Ancestor Propagator (§4.4): after a leaf geometry change, walks
//! the parent chain re-unioning each ancestor's explicit children.

use log::debug;

use crate::area::Area;
use crate::geometry::union_all;
use crate::id::AreaId;
use crate::store::AreaStore;

/// A before/after snapshot of one re-unioned ancestor.
#[derive(Debug, Clone)]
pub struct AreaChange {
    pub before: Area,
    pub after: Area,
}

/// Walks upward from `start_parent_id`, re-unioning every real ancestor's
/// explicit-child geometries, applying the updates to `store`, and
/// returning the before/after pairs in walk order (nearest ancestor
/// first). An ancestor with no explicit children at the moment of the
/// walk (e.g. immediately after a deletion) is left untouched and the
/// walk continues past it (§4.4).
pub fn propagate(store: &mut AreaStore, start_parent_id: &AreaId) -> Vec<AreaChange> {
    let mut changes = Vec::new();
    let mut cursor = Some(start_parent_id.clone());

    while let Some(current_id) = cursor {
        let Some(current) = store.get_real(&current_id).cloned() else {
            break;
        };

        let children = store.explicit_children(&current_id);
        if !children.is_empty() {
            if let Some(new_geometry) = union_all(children.into_iter().map(|c| c.geometry.clone())) {
                if new_geometry != current.geometry {
                    let mut after = current.clone();
                    after.geometry = new_geometry;
                    after.updated_at = crate::area::Timestamp::now();
                    store.update(after.clone());
                    debug!("propagated geometry to ancestor {current_id}");
                    changes.push(AreaChange { before: current.clone(), after });
                }
            }
        }

        cursor = current.parent_id.clone();
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::Timestamp;
    use crate::geometry::{AreaGeometry, PolygonDef};

    fn square(offset: f64) -> AreaGeometry {
        AreaGeometry::Polygon(PolygonDef::new(
            vec![[offset, 0.0], [offset + 1.0, 0.0], [offset + 1.0, 1.0], [offset, 1.0], [offset, 0.0]],
            vec![],
        ))
    }

    fn area(id: &str, parent: Option<&str>, geometry: AreaGeometry) -> Area {
        Area {
            id: AreaId::new(id),
            display_name: String::new(),
            level_key: "x".into(),
            parent_id: parent.map(AreaId::new),
            geometry,
            metadata: None,
            created_at: Timestamp(0),
            updated_at: Timestamp(0),
        }
    }

    #[test]
    fn single_child_collapses_to_polygon_union() {
        let mut store = AreaStore::load(vec![area("p", None, square(0.0))]);
        store.add(area("c", Some("p"), square(0.0)));
        let changes = propagate(&mut store, &AreaId::new("p"));
        assert_eq!(changes.len(), 1);
        assert!(store.get_real(&AreaId::new("p")).unwrap().geometry.is_single_polygon());
    }

    #[test]
    fn walk_stops_at_root() {
        let mut store = AreaStore::load(vec![area("root", None, square(0.0))]);
        let changes = propagate(&mut store, &AreaId::new("root"));
        assert!(changes.is_empty());
    }

    #[test]
    fn unchanged_geometry_produces_no_change_entry() {
        let mut store = AreaStore::load(vec![area("p", None, square(0.0))]);
        store.add(area("c", Some("p"), square(0.0)));
        propagate(&mut store, &AreaId::new("p"));
        // Second propagation from the same state: union is already current.
        let changes = propagate(&mut store, &AreaId::new("p"));
        assert!(changes.is_empty());
    }

    #[test]
    fn ancestor_with_no_explicit_children_is_skipped_not_halted() {
        // grandparent -> parent (no explicit children right now) -> (nothing)
        // propagate from parent should leave parent's geometry untouched
        // but still continue the walk up to grandparent.
        let mut store = AreaStore::load(vec![area("gp", None, square(0.0))]);
        store.add(area("parent", Some("gp"), square(5.0)));
        let changes = propagate(&mut store, &AreaId::new("parent"));
        // parent has no explicit children -> left unchanged; gp has no
        // explicit children either (parent is real but union_all needs
        // children of gp, which is "parent" itself as an explicit child)
        // so gp *does* get updated to match parent's geometry.
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].before.id, AreaId::new("gp"));
    }
}
