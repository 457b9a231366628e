//! Opaque area identifiers, including the deterministic encoding used for
//! synthesized [`crate::area::ImplicitArea`] ids.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A real area's identifier. Opaque and immutable once assigned (§3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AreaId(Arc<str>);

impl AreaId {
    pub fn new(raw: impl Into<Arc<str>>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The deterministic id of the virtual child synthesized when `parent`
    /// has no explicit children: `implicit:<parent>:<child_level_key>`.
    pub fn implicit(parent: &AreaId, child_level_key: &str) -> Self {
        Self(Arc::from(format!("implicit:{}:{}", parent.as_str(), child_level_key)))
    }

    /// Parses an id that looks like `implicit:<parent>:<level>` into its
    /// two parts. Returns `None` for a real id (or for anything else that
    /// isn't exactly this shape).
    pub fn parse_implicit(&self) -> Option<(AreaId, &str)> {
        let rest = self.0.strip_prefix("implicit:")?;
        let (parent, level) = rest.split_once(':')?;
        if parent.is_empty() || level.is_empty() {
            return None;
        }
        Some((AreaId::new(parent), level))
    }

    pub fn is_implicit(&self) -> bool {
        self.0.starts_with("implicit:")
    }
}

impl fmt::Display for AreaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AreaId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AreaId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Allocates fresh ids for areas created by `save-as-area`, `bulk-create`,
/// and the split/carve/punch/expand family. Identifier generation
/// *policy* is an external concern (§1); this trait is the seam, with a
/// collision-free default.
pub trait AreaIdAllocator: Send + Sync {
    fn allocate(&self) -> AreaId;
}

/// Default allocator: random v4 UUIDs, collision-free for practical purposes.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidAllocator;

impl AreaIdAllocator for UuidAllocator {
    fn allocate(&self) -> AreaId {
        AreaId::new(uuid::Uuid::new_v4().to_string())
    }
}
