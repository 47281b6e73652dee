// SPDX-License-Identifier: MIT OR Apache-2.0
//! Undo/redo history for Portloom.
//!
//! The stack stores reversible [`UndoCommand`] values. Commands pushed while
//! a macro is open are merged into a single undo step, so a user action that
//! touches several ports is undone in one go.
//!
//! ## Model
//!
//! - An ordered log of steps with a cursor (`index`) pointing past the last
//!   applied step
//! - A nesting counter for `begin_macro`/`end_macro`
//! - An optional step limit that drops the oldest steps
//! - A clean index used to track unsaved changes

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

/// Default maximum undo history depth
pub const DEFAULT_UNDO_LIMIT: usize = 100;

/// History errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    /// Nothing to undo
    #[error("Nothing to undo")]
    NothingToUndo,

    /// Nothing to redo
    #[error("Nothing to redo")]
    NothingToRedo,

    /// Undo/redo requested while a macro is still open
    #[error("Macro \"{0}\" is still open")]
    MacroInProgress(String),

    /// `end_macro` called without a matching `begin_macro`
    #[error("No macro is open")]
    NoOpenMacro,
}

/// Result type for history operations
pub type Result<T> = std::result::Result<T, HistoryError>;

/// A reversible state change.
///
/// `undo` must restore exactly the state observed before the matching
/// `redo`. Commands may record what they changed during `redo` to achieve
/// that, which is why both take `&mut self`.
pub trait UndoCommand {
    /// The state this command mutates
    type Target;

    /// Human-readable description
    fn text(&self) -> &str;

    /// Apply the change
    fn redo(&mut self, target: &mut Self::Target);

    /// Revert the change
    fn undo(&mut self, target: &mut Self::Target);
}

/// One user-visible undo step
#[derive(Debug)]
struct Step<C> {
    text: String,
    commands: Vec<C>,
}

impl<C> Step<C> {
    fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            commands: Vec::new(),
        }
    }
}

/// History statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryStats {
    /// Steps that can be undone
    pub undo_count: usize,
    /// Steps that can be redone
    pub redo_count: usize,
    /// Total commands stored across all steps
    pub command_count: usize,
    /// Maximum history depth (0 = unlimited)
    pub limit: usize,
}

/// Undo/redo stack
#[derive(Debug)]
pub struct UndoStack<C: UndoCommand> {
    steps: VecDeque<Step<C>>,
    /// Number of applied steps
    index: usize,
    open_macro: Option<Step<C>>,
    macro_depth: usize,
    limit: usize,
    clean_index: Option<usize>,
}

impl<C: UndoCommand> UndoStack<C> {
    /// Create a stack with the default limit
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_UNDO_LIMIT)
    }

    /// Create with a custom step limit (0 = unlimited)
    pub fn with_limit(limit: usize) -> Self {
        Self {
            steps: VecDeque::new(),
            index: 0,
            open_macro: None,
            macro_depth: 0,
            limit,
            clean_index: Some(0),
        }
    }

    /// Apply `command` and record it.
    ///
    /// Inside a macro the command joins the open step. Otherwise it becomes
    /// its own step and discards anything that could have been redone.
    pub fn push(&mut self, mut command: C, target: &mut C::Target) {
        tracing::trace!(command = command.text(), "push");
        command.redo(target);

        if let Some(step) = self.open_macro.as_mut() {
            step.commands.push(command);
            return;
        }

        let mut step = Step::new(command.text());
        step.commands.push(command);
        self.commit(step);
    }

    /// Open a macro. Nested calls only bump the nesting counter.
    pub fn begin_macro(&mut self, text: impl Into<String>) {
        if self.macro_depth == 0 {
            self.open_macro = Some(Step::new(text));
        }
        self.macro_depth += 1;
    }

    /// Close a macro. The outermost call commits the step, even when empty.
    pub fn end_macro(&mut self) -> Result<()> {
        if self.macro_depth == 0 {
            return Err(HistoryError::NoOpenMacro);
        }
        self.macro_depth -= 1;
        if self.macro_depth == 0 {
            if let Some(step) = self.open_macro.take() {
                self.commit(step);
            }
        }
        Ok(())
    }

    /// Whether a macro is currently open
    pub fn in_macro(&self) -> bool {
        self.macro_depth > 0
    }

    fn commit(&mut self, step: Step<C>) {
        self.steps.truncate(self.index);
        if self.clean_index.is_some_and(|clean| clean > self.index) {
            self.clean_index = None;
        }

        self.steps.push_back(step);
        self.index += 1;

        while self.limit > 0 && self.steps.len() > self.limit {
            self.steps.pop_front();
            self.index -= 1;
            self.clean_index = match self.clean_index {
                Some(0) | None => None,
                Some(clean) => Some(clean - 1),
            };
        }
    }

    fn check_no_macro(&self) -> Result<()> {
        match &self.open_macro {
            Some(step) => Err(HistoryError::MacroInProgress(step.text.clone())),
            None => Ok(()),
        }
    }

    /// Revert the last applied step
    pub fn undo(&mut self, target: &mut C::Target) -> Result<()> {
        self.check_no_macro()?;
        if self.index == 0 {
            return Err(HistoryError::NothingToUndo);
        }

        self.index -= 1;
        let step = &mut self.steps[self.index];
        tracing::debug!(step = %step.text, "undo");
        for command in step.commands.iter_mut().rev() {
            command.undo(target);
        }
        Ok(())
    }

    /// Re-apply the next undone step
    pub fn redo(&mut self, target: &mut C::Target) -> Result<()> {
        self.check_no_macro()?;
        if self.index == self.steps.len() {
            return Err(HistoryError::NothingToRedo);
        }

        let step = &mut self.steps[self.index];
        tracing::debug!(step = %step.text, "redo");
        for command in step.commands.iter_mut() {
            command.redo(target);
        }
        self.index += 1;
        Ok(())
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        self.index < self.steps.len()
    }

    /// Description of the step `undo` would revert
    pub fn undo_text(&self) -> Option<&str> {
        self.index
            .checked_sub(1)
            .and_then(|i| self.steps.get(i))
            .map(|s| s.text.as_str())
    }

    /// Description of the step `redo` would apply
    pub fn redo_text(&self) -> Option<&str> {
        self.steps.get(self.index).map(|s| s.text.as_str())
    }

    /// Cursor position (number of applied steps)
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of recorded steps
    pub fn count(&self) -> usize {
        self.steps.len()
    }

    /// Number of commands in the step at `index`
    pub fn step_len(&self, index: usize) -> Option<usize> {
        self.steps.get(index).map(|s| s.commands.len())
    }

    /// Maximum history depth (0 = unlimited)
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Mark the current position as the saved state
    pub fn set_clean(&mut self) {
        self.clean_index = Some(self.index);
    }

    /// Whether the cursor is at the saved state
    pub fn is_clean(&self) -> bool {
        self.clean_index == Some(self.index)
    }

    /// Drop all history. An open macro is discarded as well.
    pub fn clear(&mut self) {
        self.steps.clear();
        self.index = 0;
        self.open_macro = None;
        self.macro_depth = 0;
        self.clean_index = Some(0);
    }

    /// Get history statistics
    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            undo_count: self.index,
            redo_count: self.steps.len() - self.index,
            command_count: self.steps.iter().map(|s| s.commands.len()).sum(),
            limit: self.limit,
        }
    }
}

impl<C: UndoCommand> Default for UndoStack<C> {
    fn default() -> Self {
        Self::new()
    }
}
