//! The editor's closed error taxonomy.
//!
//! Every public, fallible operation on [`crate::Editor`] returns
//! `Result<T, EditorError>`. No variant here is a sub-kind of another —
//! callers distinguish behavior by matching on the variant, never by
//! parsing the message (see spec §7).

use crate::AreaId;

/// The full error taxonomy. Lifecycle, validation, and external groups are
/// documented on the individual variants, matching spec §7's three groups.
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    /// Lifecycle: an operation was attempted before the editor finished
    /// initializing (level store validation + `adapter.load_all()`).
    #[error("[Editor] editor is not initialized")]
    NotInitialized,

    /// Validation: the declared level list is not a valid linear chain.
    #[error("[LevelStore] invalid level configuration: {reason}")]
    InvalidLevelConfig { reason: String },

    /// External: the persistence adapter returned areas that violate I1
    /// against the level store.
    #[error("[Editor] loaded data is inconsistent with the level store: {reason}")]
    DataIntegrity { reason: String },

    /// External: the persistence adapter failed a `load_all`/`batch_write` call.
    #[error("[Editor] storage adapter failed: {source}")]
    StorageError {
        #[source]
        source: anyhow::Error,
    },

    /// Validation: a referenced area does not exist, is not real, or is
    /// not addressable by the calling operation (e.g. an implicit id
    /// passed to `rename-area`).
    #[error("[Editor] area not found: {id}")]
    AreaNotFound { id: AreaId },

    /// Validation: a referenced level key does not exist in the level store.
    #[error("[Editor] area level not found: {key}")]
    AreaLevelNotFound { key: String },

    /// Validation: an area's level does not relate to its (prospective)
    /// parent's level the way the level chain requires.
    #[error("[Editor] level mismatch: {reason}")]
    LevelMismatch { reason: String },

    /// Validation: an operation that requires a childless area was
    /// called on an area with at least one explicit child.
    #[error("[Editor] area {id} has explicit children")]
    AreaHasChildren { id: AreaId },

    /// Validation: reparenting would leave the old parent with zero
    /// explicit children.
    #[error("[Editor] reparenting {id} would leave parent {parent} with no children")]
    ParentWouldBeEmpty { id: AreaId, parent: AreaId },

    /// Validation: a reparent target is a descendant of the area being moved.
    #[error("[Editor] {new_parent} is a descendant of {id}; cannot reparent")]
    CircularReference { id: AreaId, new_parent: AreaId },

    /// Validation: an operation that requires a closed draft was given an open one.
    #[error("[Editor] draft is not closed")]
    DraftNotClosed,

    /// Validation: a draft or constructed geometry failed validation
    /// (too few vertices, self-intersection, zero area, or a kernel
    /// operation failed to produce usable geometry).
    #[error("[Editor] invalid geometry: {reason}")]
    InvalidGeometry { reason: String },

    /// Validation: the target's level has no declared child level.
    #[error("[Editor] level {key} has no child level")]
    NoChildLevel { key: String },

    /// Validation: a scratchpad lookup by draft id found nothing.
    #[error("[Scratchpad] draft not found: {id}")]
    DraftNotFound { id: String },
}
