//! Bounded undo/redo history
//!
//! The history only stores commands that were already applied successfully.
//! Undo applies a command's inverse to the target and moves the command to
//! the redo stack; redo re-applies it. Pushing a new command clears the redo
//! stack, and the oldest entry is dropped once the configured depth is
//! exceeded.

use crate::error::EditorResult;
use std::collections::VecDeque;

/// Default number of undo steps kept per session
pub const DEFAULT_DEPTH: usize = 50;

/// A reversible edit that can be replayed against a target
pub trait Reversible: Sized {
    type Target;

    /// Apply to the target. Must leave the target unchanged on error.
    fn apply(&self, target: &mut Self::Target) -> EditorResult<()>;

    /// Command that exactly undoes `self`
    fn inverse(&self) -> Self;

    /// Short description for menu items ("Undo Add Highlight")
    fn label(&self) -> String;
}

/// Result of an undo or redo request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryOutcome {
    /// A step was applied; carries its label
    Applied(String),
    /// The relevant stack was empty; reported to the user, not an error
    Nothing,
}

impl HistoryOutcome {
    pub fn applied(&self) -> bool {
        matches!(self, HistoryOutcome::Applied(_))
    }
}

#[derive(Debug, Clone)]
pub struct History<C> {
    undo: VecDeque<C>,
    redo: Vec<C>,
    depth: usize,
}

impl<C: Reversible> History<C> {
    pub fn new() -> Self {
        Self::with_depth(DEFAULT_DEPTH)
    }

    /// History keeping at most `depth` undo steps (at least one)
    pub fn with_depth(depth: usize) -> Self {
        Self { undo: VecDeque::new(), redo: Vec::new(), depth: depth.max(1) }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Change the depth, evicting the oldest steps if needed
    pub fn set_depth(&mut self, depth: usize) {
        self.depth = depth.max(1);
        self.evict();
    }

    /// Record a command that has already been applied
    pub fn push(&mut self, command: C) {
        self.redo.clear();
        self.undo.push_back(command);
        self.evict();
    }

    fn evict(&mut self) {
        while self.undo.len() > self.depth {
            if let Some(dropped) = self.undo.pop_front() {
                tracing::debug!(label = %dropped.label(), "history full, dropping oldest step");
            }
        }
        self.redo.truncate(self.depth);
    }

    /// Undo the most recent step
    ///
    /// If the inverse fails to apply the step stays on the undo stack and the
    /// error is returned.
    pub fn undo(&mut self, target: &mut C::Target) -> EditorResult<HistoryOutcome> {
        let Some(command) = self.undo.pop_back() else {
            return Ok(HistoryOutcome::Nothing);
        };

        if let Err(err) = command.inverse().apply(target) {
            self.undo.push_back(command);
            return Err(err);
        }

        let label = command.label();
        self.redo.push(command);
        Ok(HistoryOutcome::Applied(label))
    }

    /// Redo the most recently undone step
    pub fn redo(&mut self, target: &mut C::Target) -> EditorResult<HistoryOutcome> {
        let Some(command) = self.redo.pop() else {
            return Ok(HistoryOutcome::Nothing);
        };

        if let Err(err) = command.apply(target) {
            self.redo.push(command);
            return Err(err);
        }

        let label = command.label();
        self.undo.push_back(command);
        self.evict();
        Ok(HistoryOutcome::Applied(label))
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_label(&self) -> Option<String> {
        self.undo.back().map(Reversible::label)
    }

    pub fn redo_label(&self) -> Option<String> {
        self.redo.last().map(Reversible::label)
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

impl<C: Reversible> Default for History<C> {
    fn default() -> Self {
        Self::new()
    }
}
