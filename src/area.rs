//! The persisted `Area` entity and the virtual `ImplicitArea` projection (§3).

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::geometry::AreaGeometry;
use crate::id::AreaId;

/// Milliseconds since the Unix epoch. Opaque beyond that; the editor
/// never interprets timestamps, only stamps and carries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Timestamp(millis)
    }
}

/// A real, stored area (§3). `id` is opaque and immutable once assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub id: AreaId,
    pub display_name: String,
    pub level_key: String,
    pub parent_id: Option<AreaId>,
    pub geometry: AreaGeometry,
    pub metadata: Option<Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Area {
    pub fn new(id: AreaId, display_name: impl Into<String>, level_key: impl Into<String>, parent_id: Option<AreaId>, geometry: AreaGeometry) -> Self {
        let now = Timestamp::now();
        Self {
            id,
            display_name: display_name.into(),
            level_key: level_key.into(),
            parent_id,
            geometry,
            metadata: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A virtual area synthesized when a non-leaf area has no explicit
/// children: same geometry and timestamps as `parent`, at `parent`'s
/// child level, with an empty display name. Never stored (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct ImplicitArea {
    pub id: AreaId,
    pub parent_id: AreaId,
    pub level_key: String,
    pub geometry: AreaGeometry,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ImplicitArea {
    pub fn from_parent(parent: &Area, child_level_key: &str) -> Self {
        Self {
            id: AreaId::implicit(&parent.id, child_level_key),
            parent_id: parent.id.clone(),
            level_key: child_level_key.to_string(),
            geometry: parent.geometry.clone(),
            created_at: parent.created_at,
            updated_at: parent.updated_at,
        }
    }

    pub fn display_name(&self) -> &'static str {
        ""
    }
}

/// Either a real area or its implicit projection, as returned by read
/// operations that accept both (§4.2 `get`, `get_children`).
#[derive(Debug, Clone, PartialEq)]
pub enum AnyArea {
    Real(Area),
    Implicit(ImplicitArea),
}

impl AnyArea {
    pub fn id(&self) -> &AreaId {
        match self {
            AnyArea::Real(a) => &a.id,
            AnyArea::Implicit(a) => &a.id,
        }
    }

    pub fn parent_id(&self) -> Option<&AreaId> {
        match self {
            AnyArea::Real(a) => a.parent_id.as_ref(),
            AnyArea::Implicit(a) => Some(&a.parent_id),
        }
    }

    pub fn level_key(&self) -> &str {
        match self {
            AnyArea::Real(a) => &a.level_key,
            AnyArea::Implicit(a) => &a.level_key,
        }
    }

    pub fn geometry(&self) -> &AreaGeometry {
        match self {
            AnyArea::Real(a) => &a.geometry,
            AnyArea::Implicit(a) => &a.geometry,
        }
    }

    pub fn is_implicit(&self) -> bool {
        matches!(self, AnyArea::Implicit(_))
    }
}
