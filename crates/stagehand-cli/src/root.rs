use std::path::{Path, PathBuf};

/// Resolve the workspace root the engine operates in.
///
/// Priority:
/// 1. `--root` flag / `STAGEHAND_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.stagehand/`
/// 3. Walk upward from `cwd` looking for `.git/`
/// 4. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_upward(&cwd, stagehand_core::paths::STAGEHAND_DIR)
        .or_else(|| find_upward(&cwd, ".git"))
        .unwrap_or(cwd)
}

fn find_upward(start: &Path, marker: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(marker).is_dir())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve_root(Some(dir.path())), dir.path());
    }

    #[test]
    fn marker_found_from_nested_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".stagehand")).unwrap();
        let nested = dir.path().join("src/deep");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(
            find_upward(&nested, ".stagehand").as_deref(),
            Some(dir.path())
        );
    }

    #[test]
    fn missing_marker_yields_none() {
        let dir = TempDir::new().unwrap();
        assert!(find_upward(dir.path(), "no-such-marker-dir").is_none());
    }
}
