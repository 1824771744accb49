use crate::error::Result;
use crate::paths;
use crate::types::ActionType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// SequenceConfig
// ---------------------------------------------------------------------------

/// Defaults applied to sequences that do not set `delay` / `stopOnError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceConfig {
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_stop_on_error")]
    pub stop_on_error: bool,
}

fn default_delay_ms() -> u64 {
    500
}

fn default_stop_on_error() -> bool {
    true
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            stop_on_error: default_stop_on_error(),
        }
    }
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default = "default_capacity")]
    pub undo_capacity: usize,
    #[serde(default = "default_capacity")]
    pub history_capacity: usize,
    #[serde(default = "default_max_saved_scenes")]
    pub max_saved_scenes: usize,
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    #[serde(default)]
    pub sequence: SequenceConfig,
    /// Per action-type budget overrides in milliseconds, keyed by wire id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub timeouts: BTreeMap<String, u64>,
}

fn default_capacity() -> usize {
    50
}

fn default_max_saved_scenes() -> usize {
    20
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            undo_capacity: default_capacity(),
            history_capacity: default_capacity(),
            max_saved_scenes: default_max_saved_scenes(),
            default_timeout_ms: default_timeout_ms(),
            sequence: SequenceConfig::default(),
            timeouts: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    /// Load `.stagehand/config.yaml` under `root`, or defaults if absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: EngineConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Write the config atomically, creating `.stagehand/` if needed.
    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let dir = paths::stagehand_dir(root);
        std::fs::create_dir_all(&dir)?;
        let data = serde_yaml::to_string(self)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(data.as_bytes())?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Configured override for `action_type`, if any. Unknown keys are ignored.
    pub fn timeout_for(&self, action_type: ActionType) -> Option<Duration> {
        self.timeouts
            .iter()
            .find(|(key, _)| key.parse::<ActionType>().ok() == Some(action_type))
            .map(|(_, ms)| Duration::from_millis(*ms))
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        let capacities = [
            ("undoCapacity", self.undo_capacity),
            ("historyCapacity", self.history_capacity),
            ("maxSavedScenes", self.max_saved_scenes),
        ];
        for (name, value) in capacities {
            if value == 0 {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("{name} must be greater than zero"),
                });
            }
        }

        if self.default_timeout_ms == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "defaultTimeoutMs must be greater than zero".to_string(),
            });
        }

        for (key, ms) in &self.timeouts {
            if key.parse::<ActionType>().is_err() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("unknown action type '{key}' in timeouts"),
                });
            } else if *ms == 0 {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("timeout for '{key}' must be greater than zero"),
                });
            }
        }

        if self.sequence.delay_ms > 10_000 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "sequence.delayMs={} (>10s between steps is unusual)",
                    self.sequence.delay_ms
                ),
            });
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = EngineConfig::load(dir.path()).unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.undo_capacity, 50);
        assert_eq!(cfg.max_saved_scenes, 20);
        assert_eq!(cfg.sequence.delay_ms, 500);
        assert!(cfg.sequence.stop_on_error);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".stagehand")).unwrap();
        std::fs::write(
            dir.path().join(".stagehand/config.yaml"),
            "undoCapacity: 10\nsequence:\n  delayMs: 0\ntimeouts:\n  terminal.run: 1000\n",
        )
        .unwrap();
        let cfg = EngineConfig::load(dir.path()).unwrap();
        assert_eq!(cfg.undo_capacity, 10);
        assert_eq!(cfg.history_capacity, 50);
        assert_eq!(cfg.sequence.delay_ms, 0);
        assert!(cfg.sequence.stop_on_error);
        assert_eq!(
            cfg.timeout_for(ActionType::TerminalRun),
            Some(Duration::from_millis(1000))
        );
        assert_eq!(cfg.timeout_for(ActionType::FileOpen), None);
    }

    #[test]
    fn alias_keys_resolve_in_timeouts() {
        let mut cfg = EngineConfig::default();
        cfg.timeouts.insert("vscode.command".into(), 250);
        assert_eq!(
            cfg.timeout_for(ActionType::HostCommand),
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let mut cfg = EngineConfig::default();
        cfg.max_saved_scenes = 5;
        cfg.save(dir.path()).unwrap();
        assert_eq!(EngineConfig::load(dir.path()).unwrap(), cfg);
    }

    #[test]
    fn validate_flags_zero_capacity_and_unknown_types() {
        let mut cfg = EngineConfig::default();
        cfg.undo_capacity = 0;
        cfg.timeouts.insert("slide.zoom".into(), 100);
        cfg.timeouts.insert("file.open".into(), 0);
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 3);
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("undoCapacity")));
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Warning && w.message.contains("slide.zoom")));
    }

    #[test]
    fn default_config_is_clean() {
        assert!(EngineConfig::default().validate().is_empty());
    }
}
