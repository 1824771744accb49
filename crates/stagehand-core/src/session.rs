//! `Session`: the conductor for one presentation.
//!
//! Owns the registry, pipeline, snapshot factory and the three session
//! stores, and turns navigation and invocation events into calls against
//! them. Every state-changing event first captures a snapshot onto the undo
//! stack.

use serde::Serialize;
use std::sync::Arc;

use crate::action::{Action, Params};
use crate::cancel::CancellationToken;
use crate::config::EngineConfig;
use crate::deck::Deck;
use crate::error::Result;
use crate::executors::steps::StepSpec;
use crate::executors::ExecutionContext;
use crate::history::{Breadcrumb, NavigationHistory, NavigationMethod};
use crate::host::Host;
use crate::pipeline::{ExecuteOptions, Pipeline};
use crate::registry::Registry;
use crate::result::ExecutionResult;
use crate::scene::{SceneEntry, SceneStore};
use crate::snapshot::{RestoreResult, Snapshot, SnapshotFactory};
use crate::state_stack::StateStack;
use crate::types::ActionType;

/// One undo-stack entry: the state before an event, plus the state to
/// return to if the undo is redone (filled in when the undo happens).
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub before: Snapshot,
    pub resume: Option<Snapshot>,
}

/// Outcome of restoring a scene.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SceneRestore {
    Restored { slide: usize, result: RestoreResult },
    /// The scene was never captured; the caller should navigate here.
    NavigateTo { slide: usize },
}

pub struct Session {
    host: Arc<dyn Host>,
    registry: Arc<Registry>,
    pipeline: Pipeline,
    snapshots: Arc<SnapshotFactory>,
    stack: StateStack<Checkpoint>,
    scenes: SceneStore,
    history: NavigationHistory,
    config: EngineConfig,
    deck: Option<Deck>,
    current_slide: Option<usize>,
    current_title: Option<String>,
    trusted: Option<bool>,
    cancel: CancellationToken,
}

impl Session {
    pub fn new(host: Arc<dyn Host>, config: EngineConfig) -> Self {
        Self::with_registry(host, Registry::with_builtins(), config)
    }

    pub fn with_registry(host: Arc<dyn Host>, registry: Registry, config: EngineConfig) -> Self {
        Self {
            snapshots: Arc::new(SnapshotFactory::new(host.clone())),
            host,
            registry: Arc::new(registry),
            pipeline: Pipeline::from_config(&config),
            stack: StateStack::new(config.undo_capacity),
            scenes: SceneStore::new(config.max_saved_scenes),
            history: NavigationHistory::new(config.history_capacity),
            config,
            deck: None,
            current_slide: None,
            current_title: None,
            trusted: None,
            cancel: CancellationToken::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn deck(&self) -> Option<&Deck> {
        self.deck.as_ref()
    }

    pub fn current_slide(&self) -> Option<usize> {
        self.current_slide
    }

    pub fn can_undo(&self) -> bool {
        self.stack.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.stack.can_redo()
    }

    pub fn scenes(&self) -> Vec<&SceneEntry> {
        self.scenes.list()
    }

    pub fn recent_history(&self, n: usize) -> Vec<Breadcrumb> {
        self.history.recent(n)
    }

    /// Override the host's trust posture for this session.
    pub fn set_trusted(&mut self, trusted: bool) {
        self.trusted = Some(trusted);
    }

    /// Token that cancels whatever the session is currently running.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn context(&self) -> ExecutionContext {
        let slide = self.current_slide.unwrap_or(0);
        let ctx = ExecutionContext::new(self.host.clone(), self.registry.clone())
            .with_snapshots(self.snapshots.clone())
            .with_slide(slide)
            .with_cancel(self.cancel.clone())
            .with_sequence_defaults(self.config.sequence);
        match self.trusted {
            Some(trusted) => ctx.with_trusted(trusted),
            None => ctx,
        }
    }

    fn title_of(&self, slide: usize) -> Option<String> {
        self.deck.as_ref().and_then(|d| d.title_of(slide))
    }

    /// Record the slide being left, then make `slide` current.
    fn arrive(&mut self, slide: usize, method: NavigationMethod, title: Option<String>) {
        let departing_title = self.current_title.take();
        if let Some(current) = self.current_slide {
            if method != NavigationMethod::GoBack {
                let title = departing_title.or_else(|| self.title_of(current));
                self.history.push(current, method, title);
            }
        }
        self.current_title = title.or_else(|| self.title_of(slide));
        self.current_slide = Some(slide);
    }

    async fn checkpoint(&mut self, label: &str) -> Snapshot {
        let snapshot = self
            .snapshots
            .capture(self.current_slide.unwrap_or(0), label)
            .await;
        self.stack.push(Checkpoint {
            before: snapshot.clone(),
            resume: None,
        });
        snapshot
    }

    // -----------------------------------------------------------------------
    // Deck & navigation
    // -----------------------------------------------------------------------

    /// Install a deck: its scenes replace the authored scene set.
    pub fn load_deck(&mut self, deck: Deck) {
        self.scenes.load_authored(&deck.scenes);
        tracing::info!(
            slides = deck.len(),
            scenes = deck.scenes.len(),
            "deck loaded"
        );
        self.deck = Some(deck);
    }

    /// Move to `slide`, recording the slide being left in the history.
    /// `title` names the destination; the deck's title is used if absent.
    pub async fn navigate(&mut self, slide: usize, method: NavigationMethod, title: Option<String>) {
        let snapshot = self
            .checkpoint(&format!("navigate to slide {}", slide + 1))
            .await;
        let mut anchor = snapshot;
        anchor.slide_index = slide;
        self.scenes.remember_anchor(slide, &anchor);
        self.arrive(slide, method, title);
        tracing::debug!(slide, %method, "navigated");
    }

    /// Return to the most recent breadcrumb, if any.
    pub async fn go_back(&mut self) -> Option<usize> {
        let slide = self.history.go_back()?;
        self.navigate(slide, NavigationMethod::GoBack, None).await;
        Some(slide)
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    pub async fn invoke(&mut self, action_type: ActionType, params: Params) -> ExecutionResult {
        self.invoke_with(action_type, params, &ExecuteOptions::default())
            .await
    }

    pub async fn invoke_with(
        &mut self,
        action_type: ActionType,
        params: Params,
        options: &ExecuteOptions,
    ) -> ExecutionResult {
        if !action_type.is_check() {
            self.checkpoint(&format!("before {action_type}")).await;
        }
        let ctx = self.context();
        let mut action = Action::new(action_type, params, ctx.slide_index);
        self.pipeline.execute(&mut action, &ctx, options).await
    }

    /// Invoke a step whose type is still text; unknown types fail as data.
    pub async fn invoke_step(&mut self, step: &StepSpec, options: &ExecuteOptions) -> ExecutionResult {
        match step.action_type.parse::<ActionType>() {
            Ok(action_type) => {
                self.invoke_with(action_type, step.params.clone(), options)
                    .await
            }
            Err(e) => ExecutionResult::failure(e.to_string()),
        }
    }

    /// Run every action on `slide` of the loaded deck, in order.
    pub async fn run_slide(&mut self, slide: usize, options: &ExecuteOptions) -> Result<Vec<ExecutionResult>> {
        let steps = match self.deck.as_ref().and_then(|d| d.slide(slide)) {
            Some(s) => s.actions()?,
            None => return Ok(Vec::new()),
        };
        let mut results = Vec::with_capacity(steps.len());
        for step in &steps {
            results.push(self.invoke_step(step, options).await);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Undo / redo
    // -----------------------------------------------------------------------

    /// Restore the state captured before the most recent event.
    pub async fn undo(&mut self) -> Option<RestoreResult> {
        if !self.stack.can_undo() {
            return None;
        }
        let current = self
            .snapshots
            .capture(self.current_slide.unwrap_or(0), "redo point")
            .await;
        let checkpoint = self.stack.undo()?;
        if let Some(top) = self.stack.peek_redo_mut() {
            top.resume = Some(current);
        }
        let result = self.snapshots.restore(&checkpoint.before).await;
        self.current_slide = Some(checkpoint.before.slide_index);
        self.current_title = self.title_of(checkpoint.before.slide_index);
        Some(result)
    }

    /// Return to the state that the last undo left.
    pub async fn redo(&mut self) -> Option<RestoreResult> {
        let checkpoint = self.stack.redo()?;
        let resume = checkpoint.resume?;
        let result = self.snapshots.restore(&resume).await;
        self.current_slide = Some(resume.slide_index);
        self.current_title = self.title_of(resume.slide_index);
        Some(result)
    }

    // -----------------------------------------------------------------------
    // Scenes
    // -----------------------------------------------------------------------

    pub async fn save_scene(&mut self, name: &str) -> Result<()> {
        let slide = self.current_slide.unwrap_or(0);
        let snapshot = self.snapshots.capture(slide, name).await;
        self.scenes.save(name, snapshot, slide)
    }

    pub fn delete_scene(&mut self, name: &str) -> Result<bool> {
        self.scenes.delete(name)
    }

    pub async fn restore_scene(&mut self, name: &str) -> Result<SceneRestore> {
        let entry = self.scenes.restore(name)?.clone();
        let Some(snapshot) = entry.snapshot else {
            return Ok(SceneRestore::NavigateTo {
                slide: entry.slide_index,
            });
        };
        self.checkpoint(&format!("before scene {name}")).await;
        let result = self.snapshots.restore(&snapshot).await;
        self.arrive(entry.slide_index, NavigationMethod::SceneRestore, None);
        Ok(SceneRestore::Restored {
            slide: entry.slide_index,
            result,
        })
    }

    // -----------------------------------------------------------------------
    // Reset
    // -----------------------------------------------------------------------

    /// Cancel in-flight work and drop all session state. Authored scenes
    /// stay; decorations applied by the session are disposed.
    pub async fn reset(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        let disposed = self.snapshots.dispose_decorations().await;
        self.snapshots.clear();
        self.stack.clear();
        self.history.clear();
        self.scenes.clear_saved();
        if let Some(deck) = &self.deck {
            self.scenes.load_authored(&deck.scenes);
        }
        self.current_slide = None;
        self.current_title = None;
        tracing::info!(disposed, "session reset");
    }
}
