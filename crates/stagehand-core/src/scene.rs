use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, StagehandError};
use crate::snapshot::Snapshot;

pub const DEFAULT_MAX_SAVED_SCENES: usize = 20;

// ---------------------------------------------------------------------------
// SceneEntry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneOrigin {
    /// Declared by the deck; read-only at runtime.
    Authored,
    /// Saved by the presenter during the session.
    Saved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneEntry {
    pub name: String,
    pub origin: SceneOrigin,
    pub slide_index: usize,
    pub timestamp: DateTime<Utc>,
    /// `None` only for an authored scene whose anchor was never visited.
    pub snapshot: Option<Snapshot>,
}

/// An authored scene as declared by a deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthoredScene {
    pub name: String,
    pub slide: usize,
}

// ---------------------------------------------------------------------------
// SceneStore
// ---------------------------------------------------------------------------

/// Named checkpoints: read-only authored anchors plus a capped set of
/// presenter-saved snapshots.
#[derive(Debug, Clone)]
pub struct SceneStore {
    authored: BTreeMap<String, SceneEntry>,
    saved: Vec<SceneEntry>,
    max_saved: usize,
}

impl Default for SceneStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SAVED_SCENES)
    }
}

impl SceneStore {
    pub fn new(max_saved: usize) -> Self {
        Self {
            authored: BTreeMap::new(),
            saved: Vec::new(),
            max_saved,
        }
    }

    /// Save or overwrite a presenter scene.
    ///
    /// Authored names are rejected. A new name is rejected once the saved
    /// limit is reached; overwriting an existing saved name always works.
    pub fn save(&mut self, name: &str, snapshot: Snapshot, slide_index: usize) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StagehandError::validation("name", "must not be empty"));
        }
        if self.authored.contains_key(name) {
            return Err(StagehandError::SceneReadOnly(name.to_string()));
        }
        let existing = self.saved.iter().position(|e| e.name == name);
        match existing {
            Some(i) => {
                self.saved.remove(i);
            }
            None if self.saved.len() >= self.max_saved => {
                return Err(StagehandError::SceneLimitReached(self.max_saved));
            }
            None => {}
        }
        self.saved.push(SceneEntry {
            name: name.to_string(),
            origin: SceneOrigin::Saved,
            slide_index,
            timestamp: Utc::now(),
            snapshot: Some(snapshot),
        });
        tracing::debug!(scene = name, slide = slide_index, "scene saved");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&SceneEntry> {
        self.authored
            .get(name)
            .or_else(|| self.saved.iter().find(|e| e.name == name))
    }

    /// Look up a scene for restoring. An entry without a snapshot means
    /// "navigate to its anchor slide" rather than restore state.
    pub fn restore(&self, name: &str) -> Result<&SceneEntry> {
        self.get(name)
            .ok_or_else(|| StagehandError::SceneNotFound(name.to_string()))
    }

    /// Remove a saved scene. Returns whether it existed.
    pub fn delete(&mut self, name: &str) -> Result<bool> {
        if self.authored.contains_key(name) {
            return Err(StagehandError::SceneReadOnly(name.to_string()));
        }
        let before = self.saved.len();
        self.saved.retain(|e| e.name != name);
        Ok(self.saved.len() != before)
    }

    /// Authored scenes alphabetically, then saved scenes oldest first.
    pub fn list(&self) -> Vec<&SceneEntry> {
        let mut saved: Vec<&SceneEntry> = self.saved.iter().collect();
        saved.sort_by_key(|e| e.timestamp);
        self.authored.values().chain(saved).collect()
    }

    /// Replace every authored scene, leaving saved scenes untouched.
    pub fn load_authored(&mut self, defs: &[AuthoredScene]) {
        let now = Utc::now();
        self.authored = defs
            .iter()
            .map(|def| {
                (
                    def.name.clone(),
                    SceneEntry {
                        name: def.name.clone(),
                        origin: SceneOrigin::Authored,
                        slide_index: def.slide,
                        timestamp: now,
                        snapshot: None,
                    },
                )
            })
            .collect();
    }

    /// Give unvisited authored scenes anchored at `slide_index` their first
    /// snapshot. Returns how many entries were filled.
    pub fn remember_anchor(&mut self, slide_index: usize, snapshot: &Snapshot) -> usize {
        let mut filled = 0;
        for entry in self.authored.values_mut() {
            if entry.slide_index == slide_index && entry.snapshot.is_none() {
                entry.snapshot = Some(snapshot.clone());
                entry.timestamp = Utc::now();
                filled += 1;
            }
        }
        filled
    }

    pub fn saved_count(&self) -> usize {
        self.saved.len()
    }

    pub fn max_saved(&self) -> usize {
        self.max_saved
    }

    pub fn clear_saved(&mut self) {
        self.saved.clear();
    }

    pub fn clear(&mut self) {
        self.authored.clear();
        self.saved.clear();
    }
}
