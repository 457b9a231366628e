//! Construction-time configuration (§6, SPEC_FULL AMBIENT-3).

/// `max_undo_steps` defaults to 100, `epsilon` to 1e-8 degrees (~1mm),
/// matching §6's defaults exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditorConfig {
    pub max_undo_steps: usize,
    pub epsilon: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self { max_undo_steps: 100, epsilon: 1e-8 }
    }
}
