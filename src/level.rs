//! The static level taxonomy (§4.1).
//!
//! A `LevelStore` validates and indexes the declared levels once at
//! construction time. Levels never change after that — there is no
//! `add_level`/`remove_level` on the public surface.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::EditorError;

/// A rung in the level hierarchy (country, prefecture, city, block, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaLevel {
    pub key: String,
    pub name: String,
    pub parent_level_key: Option<String>,
    pub description: Option<String>,
}

impl AreaLevel {
    pub fn new(key: impl Into<String>, name: impl Into<String>, parent_level_key: Option<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            parent_level_key,
            description: None,
        }
    }
}

/// Validated, indexed level taxonomy. Linear chain: each level has at
/// most one child, and at most one level is a root.
#[derive(Debug, Clone, Default)]
pub struct LevelStore {
    levels: Vec<AreaLevel>,
    by_key: HashMap<String, usize>,
    /// Maps a parent_level_key value (including `None`, the root slot) to
    /// the index of the level that declares it, enforcing the linear chain.
    child_of: HashMap<Option<String>, usize>,
}

impl LevelStore {
    /// Validates `levels` and builds the indexes, or signals
    /// `InvalidLevelConfig` naming the offense (§4.1).
    pub fn new(levels: Vec<AreaLevel>) -> Result<Self, EditorError> {
        let mut by_key = HashMap::with_capacity(levels.len());
        for (i, level) in levels.iter().enumerate() {
            if by_key.insert(level.key.clone(), i).is_some() {
                return Err(EditorError::InvalidLevelConfig {
                    reason: format!("duplicate level key '{}'", level.key),
                });
            }
        }

        for level in &levels {
            if let Some(parent_key) = &level.parent_level_key {
                if !by_key.contains_key(parent_key) {
                    return Err(EditorError::InvalidLevelConfig {
                        reason: format!(
                            "level '{}' declares parent_level_key '{parent_key}' which does not exist",
                            level.key
                        ),
                    });
                }
            }
        }

        let mut child_of: HashMap<Option<String>, usize> = HashMap::with_capacity(levels.len());
        for (i, level) in levels.iter().enumerate() {
            if let Some(existing) = child_of.insert(level.parent_level_key.clone(), i) {
                return Err(EditorError::InvalidLevelConfig {
                    reason: format!(
                        "levels '{}' and '{}' both declare parent_level_key {:?}; only one child per level (including root) is allowed",
                        levels[existing].key, level.key, level.parent_level_key
                    ),
                });
            }
        }

        Self::check_acyclic(&levels, &by_key)?;

        Ok(Self { levels, by_key, child_of })
    }

    fn check_acyclic(levels: &[AreaLevel], by_key: &HashMap<String, usize>) -> Result<(), EditorError> {
        for start in levels {
            let mut seen: HashSet<&str> = HashSet::new();
            let mut cursor = start.parent_level_key.as_deref();
            seen.insert(&start.key);
            while let Some(key) = cursor {
                if !seen.insert(key) {
                    return Err(EditorError::InvalidLevelConfig {
                        reason: format!("cycle detected in level hierarchy starting at '{}'", start.key),
                    });
                }
                cursor = by_key.get(key).and_then(|&i| levels[i].parent_level_key.as_deref());
            }
        }
        Ok(())
    }

    /// Looks up a level by key.
    pub fn get(&self, key: &str) -> Option<&AreaLevel> {
        self.by_key.get(key).map(|&i| &self.levels[i])
    }

    /// The level whose `parent_level_key` equals `key`, if any.
    pub fn get_child_of(&self, key: &str) -> Option<&AreaLevel> {
        self.child_of.get(&Some(key.to_string())).map(|&i| &self.levels[i])
    }

    /// Whether `key` is a leaf level (no other level declares it as a parent).
    pub fn is_leaf(&self, key: &str) -> bool {
        self.by_key.contains_key(key) && self.get_child_of(key).is_none()
    }

    /// The single root level (`parent_level_key = None`), if declared.
    pub fn root(&self) -> Option<&AreaLevel> {
        self.child_of.get(&None).map(|&i| &self.levels[i])
    }

    /// Defensive copy of all levels, in insertion order.
    pub fn all(&self) -> Vec<AreaLevel> {
        self.levels.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Vec<AreaLevel> {
        vec![
            AreaLevel::new("prefecture", "Prefecture", None),
            AreaLevel::new("city", "City", Some("prefecture".into())),
            AreaLevel::new("block", "Block", Some("city".into())),
        ]
    }

    #[test]
    fn valid_chain_builds() {
        let store = LevelStore::new(chain()).unwrap();
        assert_eq!(store.root().unwrap().key, "prefecture");
        assert_eq!(store.get_child_of("prefecture").unwrap().key, "city");
        assert!(store.is_leaf("block"));
        assert!(!store.is_leaf("city"));
        assert_eq!(store.all().len(), 3);
    }

    #[test]
    fn duplicate_key_rejected() {
        let mut levels = chain();
        levels.push(AreaLevel::new("city", "City Dup", Some("block".into())));
        let err = LevelStore::new(levels).unwrap_err();
        assert!(matches!(err, EditorError::InvalidLevelConfig { .. }));
    }

    #[test]
    fn missing_parent_rejected() {
        let levels = vec![AreaLevel::new("city", "City", Some("prefecture".into()))];
        let err = LevelStore::new(levels).unwrap_err();
        assert!(matches!(err, EditorError::InvalidLevelConfig { .. }));
    }

    #[test]
    fn branching_chain_rejected() {
        // Two levels both declaring prefecture as their parent: not a linear chain.
        let levels = vec![
            AreaLevel::new("prefecture", "Prefecture", None),
            AreaLevel::new("city", "City", Some("prefecture".into())),
            AreaLevel::new("ward", "Ward", Some("prefecture".into())),
        ];
        let err = LevelStore::new(levels).unwrap_err();
        assert!(matches!(err, EditorError::InvalidLevelConfig { .. }));
    }

    #[test]
    fn two_roots_rejected() {
        let levels = vec![
            AreaLevel::new("country", "Country", None),
            AreaLevel::new("continent", "Continent", None),
        ];
        let err = LevelStore::new(levels).unwrap_err();
        assert!(matches!(err, EditorError::InvalidLevelConfig { .. }));
    }

    #[test]
    fn cycle_rejected() {
        let levels = vec![
            AreaLevel::new("a", "A", Some("b".into())),
            AreaLevel::new("b", "B", Some("a".into())),
        ];
        let err = LevelStore::new(levels).unwrap_err();
        assert!(matches!(err, EditorError::InvalidLevelConfig { .. }));
    }
}
