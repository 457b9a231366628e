//! An optional, orthogonal draft scratchpad (§3, §9, SPEC_FULL AMBIENT-5).
//!
//! Lets a caller stash an in-progress [`DraftShape`] by id between user
//! interactions (e.g. "save this half-drawn cut, come back and finish
//! it later"). No Edit Engine operation accepts a scratchpad id — every
//! operation takes a `DraftShape` value directly. This type exists only
//! so callers have somewhere to put drafts; the core never looks at it.

use std::collections::HashMap;

use crate::draft::DraftShape;
use crate::error::EditorError;

#[derive(Debug, Default)]
pub struct DraftScratchpad {
    drafts: HashMap<String, DraftShape>,
}

impl DraftScratchpad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, id: impl Into<String>, draft: DraftShape) {
        self.drafts.insert(id.into(), draft);
    }

    pub fn get(&self, id: &str) -> Result<&DraftShape, EditorError> {
        self.drafts.get(id).ok_or_else(|| EditorError::DraftNotFound { id: id.to_string() })
    }

    pub fn remove(&mut self, id: &str) -> Option<DraftShape> {
        self.drafts.remove(id)
    }
}
