//! Deck manifest: the read-only slide/action/scene structure a presentation
//! is driven from.
//!
//! ```yaml
//! title: Async Rust in practice
//! slides:
//!   - title: Setup
//!     actions:
//!       - type: file.open
//!         path: src/main.rs
//!       - type: terminal.run
//!         params: { command: cargo build }
//! scenes:
//!   - name: demo
//!     slide: 1
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, StagehandError};
use crate::executors::steps::{canonicalize, StepSpec};
use crate::scene::AuthoredScene;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Raw action entries, nested (`{type, params}`) or flat.
    #[serde(default)]
    pub actions: Vec<serde_json::Value>,
}

impl Slide {
    pub fn actions(&self) -> Result<Vec<StepSpec>> {
        if self.actions.is_empty() {
            return Ok(Vec::new());
        }
        canonicalize(&serde_json::Value::Array(self.actions.clone()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Deck {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub slides: Vec<Slide>,
    #[serde(default)]
    pub scenes: Vec<AuthoredScene>,
}

impl Deck {
    pub fn parse(text: &str) -> Result<Self> {
        let deck: Deck = serde_yaml::from_str(text)?;
        deck.check()?;
        Ok(deck)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    fn check(&self) -> Result<()> {
        for (i, slide) in self.slides.iter().enumerate() {
            slide.actions().map_err(|e| match e {
                StagehandError::Validation { field, reason } => {
                    StagehandError::validation(format!("slides[{i}].actions: {field}"), reason)
                }
                other => other,
            })?;
        }
        for scene in &self.scenes {
            if scene.slide >= self.slides.len() {
                return Err(StagehandError::validation(
                    format!("scenes.{}", scene.name),
                    format!(
                        "anchor slide {} is out of range (deck has {} slides)",
                        scene.slide,
                        self.slides.len()
                    ),
                ));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn slide(&self, index: usize) -> Option<&Slide> {
        self.slides.get(index)
    }

    pub fn title_of(&self, index: usize) -> Option<String> {
        self.slide(index).and_then(|s| s.title.clone())
    }
}
