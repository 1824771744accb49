//! Capture and restore of session-owned editor state.
//!
//! The factory remembers which resources the engine itself opened
//! (editors, decorations, terminals). Only those are ever closed, reapplied
//! or disposed on restore, so a presenter's unrelated open work is left
//! alone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::Result;
use crate::host::{Host, OpenOptions};
use crate::params::{HighlightStyle, LineRange};
use crate::undo::{self, UndoOp};

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorRecord {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_column: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    pub opened_by_us: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecorationRecord {
    pub path: PathBuf,
    pub lines: LineRange,
    pub style: HighlightStyle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalRecord {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
}

/// Point-in-time record of what the session has open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub slide_index: usize,
    pub label: String,
    pub timestamp: DateTime<Utc>,
    /// Every visible editor; only `opened_by_us` ones are touched on restore.
    pub editors: Vec<EditorRecord>,
    pub decorations: Vec<DecorationRecord>,
    pub terminals: Vec<TerminalRecord>,
}

impl Snapshot {
    pub fn owned_editors(&self) -> impl Iterator<Item = &EditorRecord> {
        self.editors.iter().filter(|e| e.opened_by_us)
    }
}

// ---------------------------------------------------------------------------
// RestoreResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Editor,
    Decoration,
    Terminal,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::Editor => "editor",
            ResourceKind::Decoration => "decoration",
            ResourceKind::Terminal => "terminal",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedResource {
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreResult {
    pub success: bool,
    pub skipped: Vec<SkippedResource>,
}

impl RestoreResult {
    fn skip(&mut self, kind: ResourceKind, name: impl Into<String>, reason: impl fmt::Display) {
        let name = name.into();
        let reason = reason.to_string();
        tracing::warn!(%kind, %name, %reason, "restore skipped resource");
        self.skipped.push(SkippedResource { kind, name, reason });
    }
}

// ---------------------------------------------------------------------------
// SnapshotFactory
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Tracked {
    editors: BTreeSet<PathBuf>,
    decorations: BTreeMap<String, DecorationRecord>,
    terminals: BTreeMap<String, TerminalRecord>,
}

pub struct SnapshotFactory {
    host: Arc<dyn Host>,
    tracked: Mutex<Tracked>,
}

impl SnapshotFactory {
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self {
            host,
            tracked: Mutex::new(Tracked::default()),
        }
    }

    fn tracked(&self) -> MutexGuard<'_, Tracked> {
        self.tracked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark an editor as opened by the session.
    pub fn track_opened_editor(&self, path: &Path) {
        self.tracked().editors.insert(path.to_path_buf());
    }

    pub fn untrack_editor(&self, path: &Path) {
        self.tracked().editors.remove(path);
    }

    pub fn is_owned_editor(&self, path: &Path) -> bool {
        self.tracked().editors.contains(path)
    }

    pub fn track_decoration(&self, id: &str, record: DecorationRecord) {
        self.tracked().decorations.insert(id.to_string(), record);
    }

    pub fn track_terminal(&self, name: &str, cwd: Option<PathBuf>) {
        self.tracked().terminals.insert(
            name.to_string(),
            TerminalRecord {
                name: name.to_string(),
                cwd,
            },
        );
    }

    pub fn tracked_decorations(&self) -> usize {
        self.tracked().decorations.len()
    }

    /// Apply an undo and stop tracking every resource it released, so later
    /// snapshots neither reapply nor claim them.
    pub async fn apply_undo(&self, op: &UndoOp) -> Result<()> {
        undo::apply_each(self.host.as_ref(), op, |leaf| self.forget(leaf)).await
    }

    fn forget(&self, leaf: &UndoOp) {
        let mut tracked = self.tracked();
        match leaf {
            UndoOp::CloseEditor { path } => {
                tracked.editors.remove(path);
            }
            UndoOp::DisposeDecoration { id } => {
                tracked.decorations.remove(id);
            }
            UndoOp::DisposeTerminal { name } => {
                tracked.terminals.remove(name);
            }
            UndoOp::StopDebug { .. } | UndoOp::Composite { .. } => {}
        }
    }

    /// Forget everything without touching the host.
    pub fn clear(&self) {
        *self.tracked() = Tracked::default();
    }

    pub async fn capture(&self, slide_index: usize, label: &str) -> Snapshot {
        let visible = match self.host.visible_documents().await {
            Ok(docs) => docs,
            Err(e) => {
                tracing::warn!(error = %e, "could not list visible documents for snapshot");
                Vec::new()
            }
        };
        let live_terminals: BTreeSet<String> = match self.host.terminals().await {
            Ok(names) => names.into_iter().collect(),
            Err(e) => {
                tracing::warn!(error = %e, "could not list terminals for snapshot");
                BTreeSet::new()
            }
        };

        let tracked = self.tracked();
        let open: BTreeSet<&Path> = visible.iter().map(|d| d.path.as_path()).collect();
        // A decoration does not outlive its editor.
        let decorations = tracked
            .decorations
            .values()
            .filter(|d| open.contains(d.path.as_path()))
            .cloned()
            .collect();
        let editors = visible
            .iter()
            .map(|doc| EditorRecord {
                opened_by_us: tracked.editors.contains(&doc.path),
                path: doc.path.clone(),
                view_column: doc.view_column,
                line: doc.line,
            })
            .collect();
        Snapshot {
            slide_index,
            label: label.to_string(),
            timestamp: Utc::now(),
            editors,
            decorations,
            terminals: tracked
                .terminals
                .values()
                .filter(|t| live_terminals.contains(&t.name))
                .cloned()
                .collect(),
        }
    }

    /// Bring session-owned resources back to `snapshot`, skipping (not
    /// failing on) any resource that cannot be restored.
    pub async fn restore(&self, snapshot: &Snapshot) -> RestoreResult {
        let mut result = RestoreResult::default();
        self.restore_editors(snapshot, &mut result).await;
        self.restore_decorations(snapshot, &mut result).await;
        self.restore_terminals(snapshot, &mut result).await;
        result.success = result.skipped.is_empty();
        tracing::debug!(
            slide = snapshot.slide_index,
            label = %snapshot.label,
            skipped = result.skipped.len(),
            "snapshot restored"
        );
        result
    }

    async fn restore_editors(&self, snapshot: &Snapshot, result: &mut RestoreResult) {
        let wanted: BTreeSet<&Path> = snapshot.owned_editors().map(|e| e.path.as_path()).collect();
        let visible = match self.host.visible_documents().await {
            Ok(docs) => docs,
            Err(e) => {
                result.skip(ResourceKind::Editor, "*", e);
                Vec::new()
            }
        };

        for doc in visible {
            if wanted.contains(doc.path.as_path()) || !self.is_owned_editor(&doc.path) {
                continue;
            }
            match self.host.close_document(&doc.path).await {
                Ok(()) => self.untrack_editor(&doc.path),
                Err(e) => result.skip(ResourceKind::Editor, doc.path.display().to_string(), e),
            }
        }

        for editor in snapshot.owned_editors() {
            let options = OpenOptions {
                line: editor.line,
                view_column: editor.view_column,
                ..OpenOptions::default()
            };
            match self.host.open_document(&editor.path, &options).await {
                Ok(()) => self.track_opened_editor(&editor.path),
                Err(e) => result.skip(ResourceKind::Editor, editor.path.display().to_string(), e),
            }
        }
    }

    async fn restore_decorations(&self, snapshot: &Snapshot, result: &mut RestoreResult) {
        for (id, record) in self.take_decorations() {
            if let Err(e) = self.host.dispose_decoration(&id).await {
                result.skip(ResourceKind::Decoration, record.path.display().to_string(), e);
            }
        }
        for record in &snapshot.decorations {
            match self
                .host
                .decorate(&record.path, record.lines, record.style)
                .await
            {
                Ok(id) => self.track_decoration(&id, record.clone()),
                Err(e) => result.skip(
                    ResourceKind::Decoration,
                    format!("{}#{}", record.path.display(), record.lines),
                    e,
                ),
            }
        }
    }

    async fn restore_terminals(&self, snapshot: &Snapshot, result: &mut RestoreResult) {
        let live: BTreeSet<String> = match self.host.terminals().await {
            Ok(names) => names.into_iter().collect(),
            Err(e) => {
                result.skip(ResourceKind::Terminal, "*", e);
                return;
            }
        };
        let wanted: BTreeSet<&str> = snapshot.terminals.iter().map(|t| t.name.as_str()).collect();

        let extra: Vec<String> = self
            .tracked()
            .terminals
            .keys()
            .filter(|name| !wanted.contains(name.as_str()))
            .cloned()
            .collect();
        for name in extra {
            match self.host.dispose_terminal(&name).await {
                Ok(()) => {
                    self.tracked().terminals.remove(&name);
                }
                Err(e) => result.skip(ResourceKind::Terminal, name, e),
            }
        }

        for terminal in &snapshot.terminals {
            if !live.contains(&terminal.name) {
                result.skip(
                    ResourceKind::Terminal,
                    terminal.name.clone(),
                    "terminal was closed; its commands are not replayed",
                );
            }
        }
    }

    fn take_decorations(&self) -> BTreeMap<String, DecorationRecord> {
        std::mem::take(&mut self.tracked().decorations)
    }

    /// Dispose every decoration the session applied. Safe to call repeatedly.
    pub async fn dispose_decorations(&self) -> usize {
        let decorations = self.take_decorations();
        let count = decorations.len();
        for id in decorations.keys() {
            if let Err(e) = self.host.dispose_decoration(id).await {
                tracing::warn!(id = %id, error = %e, "failed to dispose decoration");
            }
        }
        count
    }
}
