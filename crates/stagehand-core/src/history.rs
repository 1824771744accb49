use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NavigationMethod {
    Sequential,
    Jump,
    SceneRestore,
    HistoryClick,
    GoBack,
}

impl fmt::Display for NavigationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NavigationMethod::Sequential => "sequential",
            NavigationMethod::Jump => "jump",
            NavigationMethod::SceneRestore => "scene-restore",
            NavigationMethod::HistoryClick => "history-click",
            NavigationMethod::GoBack => "go-back",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breadcrumb {
    pub slide_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub method: NavigationMethod,
    pub timestamp: DateTime<Utc>,
}

/// Bounded log of visited slides.
///
/// Storage drops the oldest entry when full; `go_back` consumes from the
/// newest end.
#[derive(Debug, Clone)]
pub struct NavigationHistory {
    entries: VecDeque<Breadcrumb>,
    capacity: usize,
}

impl Default for NavigationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl NavigationHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, slide_index: usize, method: NavigationMethod, title: Option<String>) {
        self.entries.push_back(Breadcrumb {
            slide_index,
            title,
            method,
            timestamp: Utc::now(),
        });
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Pop the most recent entry and return its slide.
    pub fn go_back(&mut self) -> Option<usize> {
        self.entries.pop_back().map(|b| b.slide_index)
    }

    /// Up to `n` entries, most recent first.
    pub fn recent(&self, n: usize) -> Vec<Breadcrumb> {
        self.entries.iter().rev().take(n).cloned().collect()
    }

    pub fn can_go_back(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_drops_oldest_but_go_back_is_lifo() {
        let mut history = NavigationHistory::default();
        for i in 0..51 {
            history.push(i, NavigationMethod::Sequential, None);
        }
        assert_eq!(history.len(), 50);
        assert_eq!(history.go_back(), Some(50));
        assert_eq!(history.go_back(), Some(49));

        while history.go_back().is_some() {}
        assert!(!history.can_go_back());
    }

    #[test]
    fn oldest_entry_is_the_one_evicted() {
        let mut history = NavigationHistory::new(3);
        for i in 0..4 {
            history.push(i, NavigationMethod::Jump, None);
        }
        let slides: Vec<_> = history.recent(10).iter().map(|b| b.slide_index).collect();
        assert_eq!(slides, vec![3, 2, 1]);
    }

    #[test]
    fn recent_does_not_mutate() {
        let mut history = NavigationHistory::default();
        history.push(1, NavigationMethod::Sequential, Some("Intro".into()));
        history.push(4, NavigationMethod::SceneRestore, None);
        let recent = history.recent(1);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].slide_index, 4);
        assert_eq!(recent[0].method, NavigationMethod::SceneRestore);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn empty_history_has_nothing_to_go_back_to() {
        let mut history = NavigationHistory::default();
        assert_eq!(history.go_back(), None);
        history.push(2, NavigationMethod::HistoryClick, None);
        history.clear();
        assert!(history.is_empty());
    }

    #[test]
    fn methods_serialize_kebab_case() {
        assert_eq!(
            serde_json::to_string(&NavigationMethod::HistoryClick).unwrap(),
            "\"history-click\""
        );
        assert_eq!(NavigationMethod::GoBack.to_string(), "go-back");
    }
}
