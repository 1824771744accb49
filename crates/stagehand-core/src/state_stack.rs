use std::collections::VecDeque;

pub const DEFAULT_UNDO_CAPACITY: usize = 50;

/// Bounded undo stack paired with an unbounded redo stack.
///
/// Any push clears redo. Once the undo stack is full the oldest entry is
/// evicted. `undo` and `redo` move entries between the two stacks and hand
/// a copy back to the caller to apply.
#[derive(Debug, Clone)]
pub struct StateStack<T> {
    undo: VecDeque<T>,
    redo: Vec<T>,
    capacity: usize,
}

impl<T> Default for StateStack<T> {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_CAPACITY)
    }
}

impl<T> StateStack<T> {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, entry: T) {
        self.redo.clear();
        if self.undo.len() == self.capacity {
            self.undo.pop_front();
        }
        self.undo.push_back(entry);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn peek(&self) -> Option<&T> {
        self.undo.back()
    }

    pub fn peek_redo(&self) -> Option<&T> {
        self.redo.last()
    }

    /// Mutable access to the entry the next `redo` will return.
    pub fn peek_redo_mut(&mut self) -> Option<&mut T> {
        self.redo.last_mut()
    }

    pub fn len(&self) -> usize {
        self.undo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo.is_empty()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    /// Entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.undo.iter()
    }
}

impl<T: Clone> StateStack<T> {
    pub fn undo(&mut self) -> Option<T> {
        let entry = self.undo.pop_back()?;
        self.redo.push(entry.clone());
        Some(entry)
    }

    /// Redo never evicts: the entry came off this same bounded stack.
    pub fn redo(&mut self) -> Option<T> {
        let entry = self.redo.pop()?;
        self.undo.push_back(entry.clone());
        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_keeps_most_recent_in_order() {
        let mut stack = StateStack::new(50);
        for i in 0..51 {
            stack.push(i);
        }
        assert_eq!(stack.len(), 50);
        let kept: Vec<_> = stack.iter().copied().collect();
        assert_eq!(kept, (1..51).collect::<Vec<_>>());
        assert_eq!(stack.peek(), Some(&50));
    }

    #[test]
    fn push_clears_redo() {
        let mut stack = StateStack::default();
        stack.push("a");
        stack.push("b");
        stack.undo();
        assert!(stack.can_redo());
        stack.push("c");
        assert!(!stack.can_redo());
        assert_eq!(stack.redo_len(), 0);
    }

    #[test]
    fn undo_and_redo_are_inverses() {
        let mut stack = StateStack::new(3);
        for s in ["a", "b", "c"] {
            stack.push(s);
        }
        let before: Vec<_> = stack.iter().copied().collect();

        assert_eq!(stack.undo(), Some("c"));
        assert_eq!(stack.undo(), Some("b"));
        assert_eq!(stack.peek_redo(), Some(&"b"));
        assert_eq!(stack.redo(), Some("b"));
        assert_eq!(stack.redo(), Some("c"));
        assert_eq!(stack.redo(), None);

        let after: Vec<_> = stack.iter().copied().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn empty_stack_yields_none() {
        let mut stack: StateStack<u8> = StateStack::default();
        assert!(!stack.can_undo());
        assert_eq!(stack.undo(), None);
        assert_eq!(stack.redo(), None);
        assert_eq!(stack.peek(), None);
    }

    #[test]
    fn peek_redo_mut_edits_in_place() {
        let mut stack = StateStack::default();
        stack.push(String::from("draft"));
        stack.undo();
        if let Some(top) = stack.peek_redo_mut() {
            top.push_str("-edited");
        }
        assert_eq!(stack.redo().as_deref(), Some("draft-edited"));
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut stack = StateStack::new(0);
        stack.push(1);
        stack.push(2);
        assert_eq!(stack.capacity(), 1);
        assert_eq!(stack.peek(), Some(&2));
        stack.clear();
        assert!(stack.is_empty());
    }
}
