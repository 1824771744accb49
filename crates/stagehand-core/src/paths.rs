use std::path::{Path, PathBuf};

pub const STAGEHAND_DIR: &str = ".stagehand";
pub const CONFIG_FILE: &str = ".stagehand/config.yaml";
pub const DECK_FILE: &str = "deck.yaml";

pub fn stagehand_dir(root: &Path) -> PathBuf {
    root.join(STAGEHAND_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Default deck manifest location when none is given explicitly.
pub fn default_deck_path(root: &Path) -> PathBuf {
    root.join(DECK_FILE)
}
