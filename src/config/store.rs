//! Persisted checkpoint document.
//!
//! ```json
//! { "override_mode": "thread", "tree": { ... }, "check_point": { ... } }
//! ```
//!
//! `check_point` is the older flat store. Its entries are folded into the
//! tree root when the document is loaded and it is never written back.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use super::loader;
use crate::error::{ConfigError, TreeError};
use crate::models::{BlockState, Checkpoint, Coords, Realm};
use crate::tree::CheckpointTree;

/// How the bridge keeps its gate installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideMode {
    /// Poll until shutdown
    #[default]
    Thread,
    /// Poll for a bounded window after startup
    Event,
}

/// Entry of the flat store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyCheckpoint {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub block: String,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    #[serde(default)]
    pub world: Realm,
}

impl From<LegacyCheckpoint> for Checkpoint {
    fn from(legacy: LegacyCheckpoint) -> Self {
        Checkpoint::new(
            Coords::new(legacy.x, legacy.y, legacy.z),
            legacy.world,
            BlockState { block: legacy.block, attributes: legacy.data },
        )
    }
}

/// Flat store entries in file order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LegacyEntries(Vec<(String, LegacyCheckpoint)>);

impl LegacyEntries {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }
}

impl IntoIterator for LegacyEntries {
    type Item = (String, LegacyCheckpoint);
    type IntoIter = std::vec::IntoIter<(String, LegacyCheckpoint)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'de> Deserialize<'de> for LegacyEntries {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct LegacyVisitor;

        impl<'de> Visitor<'de> for LegacyVisitor {
            type Value = LegacyEntries;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of legacy checkpoints")
            }

            fn visit_map<M>(self, mut access: M) -> Result<LegacyEntries, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut entries: Vec<(String, LegacyCheckpoint)> = Vec::new();
                while let Some((name, entry)) = access.next_entry::<String, LegacyCheckpoint>()? {
                    // A repeated key keeps its first position and its last value
                    match entries.iter_mut().find(|(existing, _)| *existing == name) {
                        Some(slot) => slot.1 = entry,
                        None => entries.push((name, entry)),
                    }
                }
                Ok(LegacyEntries(entries))
            }
        }

        deserializer.deserialize_map(LegacyVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointDocument {
    pub override_mode: OverrideMode,
    pub tree: CheckpointTree,
    #[serde(skip_serializing)]
    pub check_point: LegacyEntries,
}

impl CheckpointDocument {
    /// Move legacy entries into the tree root. Returns how many were moved.
    ///
    /// A name already present in the tree keeps the tree's entry; names that
    /// are not valid identifiers are dropped with a warning.
    pub fn migrate_legacy(&mut self) -> usize {
        let legacy = std::mem::take(&mut self.check_point);
        let mut migrated = 0;
        for (name, entry) in legacy {
            match self.tree.insert_checkpoint("", &name, entry.into()) {
                Ok(_) => migrated += 1,
                Err(TreeError::AlreadyExists(_)) => {
                    log::warn!("[Store] Legacy checkpoint '{}' shadowed by tree entry, discarded", name);
                }
                Err(e) => log::warn!("[Store] Legacy checkpoint '{}' dropped: {}", name, e),
            }
        }
        migrated
    }
}

/// Loads and saves the checkpoint document at a fixed path.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CheckpointStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document; a missing file is an empty document.
    ///
    /// If legacy entries were migrated, the upgraded document is saved before
    /// returning.
    pub fn load(&self) -> Result<CheckpointDocument, ConfigError> {
        let mut document = match loader::load_json::<CheckpointDocument>(&self.path) {
            Ok(document) => document,
            Err(ConfigError::FileNotFound(_)) => {
                log::info!("[Store] No checkpoint file at {}, starting empty", self.path.display());
                return Ok(CheckpointDocument::default());
            }
            Err(e) => return Err(e),
        };

        let had_legacy = !document.check_point.is_empty();
        let migrated = document.migrate_legacy();
        if had_legacy {
            log::info!("[Store] Migrated {} legacy checkpoint(s) into the tree", migrated);
            self.save(&document)?;
        }
        log::info!(
            "[Store] Loaded {} checkpoint(s), override mode {:?}",
            document.tree.checkpoint_count(),
            document.override_mode
        );
        Ok(document)
    }

    pub fn save(&self, document: &CheckpointDocument) -> Result<(), ConfigError> {
        loader::save_json(document, &self.path)?;
        log::debug!("[Store] Saved {}", self.path.display());
        Ok(())
    }

    /// Save `tree` under the given mode.
    pub fn save_tree(&self, tree: &CheckpointTree, override_mode: OverrideMode) -> Result<(), ConfigError> {
        let document = CheckpointDocument {
            override_mode,
            tree: tree.clone(),
            check_point: LegacyEntries::default(),
        };
        self.save(&document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("check_point.json"));
        let document = store.load().unwrap();
        assert!(document.tree.is_empty());
        assert_eq!(document.override_mode, OverrideMode::Thread);
    }

    #[test]
    fn test_override_mode_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&OverrideMode::Event).unwrap(), "\"event\"");
    }

    #[test]
    fn test_legacy_collision_keeps_tree_entry() {
        let json = r#"{
            "tree": {
                "lamp": {"type": "checkpoint", "x": 1, "y": 2, "z": 3, "world": "the_nether",
                         "block": "minecraft:lever", "data": {}}
            },
            "check_point": {
                "lamp": {"x": 9, "y": 9, "z": 9, "block": "minecraft:stone"},
                "door": {"x": 4, "y": 5, "z": 6, "block": "minecraft:lever", "data": {"powered": "false"}}
            }
        }"#;
        let mut document: CheckpointDocument = serde_json::from_str(json).unwrap();
        assert_eq!(document.migrate_legacy(), 1);
        assert!(document.check_point.is_empty());

        let lamp = document.tree.resolve_checkpoint("lamp").unwrap();
        assert_eq!(lamp.x, 1);
        let door = document.tree.resolve_checkpoint("door").unwrap();
        assert_eq!(door.world, Realm::Overworld);
        assert_eq!(door.data.get("powered").map(String::as_str), Some("false"));
    }

    #[test]
    fn test_legacy_entries_keep_file_order() {
        let json = r#"{
            "check_point": {
                "zulu": {"x": 1, "y": 1, "z": 1, "block": "minecraft:lever"},
                "alpha": {"x": 2, "y": 2, "z": 2, "block": "minecraft:lever"},
                "mike": {"x": 3, "y": 3, "z": 3, "block": "minecraft:lever"}
            }
        }"#;
        let mut document: CheckpointDocument = serde_json::from_str(json).unwrap();
        assert_eq!(document.check_point.names().collect::<Vec<_>>(), vec!["zulu", "alpha", "mike"]);

        assert_eq!(document.migrate_legacy(), 3);
        let paths: Vec<String> = document.tree.list().into_iter().map(|e| e.path).collect();
        assert_eq!(paths, vec!["zulu", "alpha", "mike"]);
    }

    #[test]
    fn test_legacy_key_is_not_written_back() {
        let json = r#"{"check_point": {"lamp": {"x": 1, "y": 1, "z": 1, "block": "minecraft:lever"}}}"#;
        let document: CheckpointDocument = serde_json::from_str(json).unwrap();
        assert_eq!(document.check_point.len(), 1);
        let written = serde_json::to_value(&document).unwrap();
        assert!(written.get("check_point").is_none());
    }
}
