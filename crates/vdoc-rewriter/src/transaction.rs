//! Transactions and snapshot undo.
//!
//! A transaction batches rewriter mutations into one atomic text flush and
//! one undo step. Nesting is ref-counted: inner transactions (typically
//! carrying the same identifier, e.g. per drag frame) fold into the
//! outermost one instead of creating separate undo steps. Dropping a guard
//! without committing rolls everything back.
//!
//! Undo is snapshot-based: each committed transaction records the text
//! before and after; undo and redo swap the buffer and re-amend, so the
//! model receives targeted events rather than a wholesale reload.

use crate::error::RewriterError;
use crate::rewriter::{Rewriter, RewriterState};
use std::ops::{Deref, DerefMut};

const UNDO_LIMIT: usize = 100;

// ─── Transactions ────────────────────────────────────────────────────────

/// RAII transaction guard. Derefs to the rewriter so mutations (and nested
/// transactions) route through it while it is open.
pub struct RewriterTransaction<'a> {
    rewriter: &'a mut Rewriter,
    done: bool,
}

impl Rewriter {
    /// Open a transaction. The first (outermost) identifier names the undo
    /// step; nested opens only increase the ref count.
    pub fn begin_transaction(&mut self, identifier: &str) -> RewriterTransaction<'_> {
        if self.open_transactions == 0 {
            self.transaction_identifier = Some(identifier.to_string());
            self.snapshot_before = Some(self.text.clone());
            self.transaction_poisoned = false;
            self.state = RewriterState::CollectingChanges;
        }
        self.open_transactions += 1;
        RewriterTransaction {
            rewriter: self,
            done: false,
        }
    }

    fn end_transaction(&mut self, commit: bool) -> Result<(), RewriterError> {
        debug_assert!(self.open_transactions > 0);
        self.open_transactions -= 1;
        if !commit {
            // The model already carries this transaction's mutations, so an
            // inner rollback can only be honored by rolling back the whole
            // batch at the outermost level.
            self.transaction_poisoned = true;
        }
        if self.open_transactions > 0 {
            return Ok(());
        }
        let identifier = self
            .transaction_identifier
            .take()
            .unwrap_or_else(|| "change".to_string());
        let before = self
            .snapshot_before
            .take()
            .unwrap_or_else(|| self.text.clone());
        let commit = commit && !self.transaction_poisoned;
        if commit {
            self.flush_pending()?;
            if before != self.text {
                self.undo.push(&identifier, before, self.text.clone());
            }
            Ok(())
        } else {
            self.discard_pending();
            self.rebuild_from_text()
        }
    }

    // ─── Undo / redo ─────────────────────────────────────────────────────

    pub fn undo_stack(&self) -> &UndoStack {
        &self.undo
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.undo.redo.is_empty()
    }

    /// Restore the text before the most recent step and re-amend.
    pub fn undo(&mut self) -> Result<(), RewriterError> {
        if self.state == RewriterState::Error {
            return Err(RewriterError::ErrorState);
        }
        let snapshot = self.undo.undo.pop().ok_or(RewriterError::NothingToUndo)?;
        let text = snapshot.before.clone();
        self.amend_inner(&text)?;
        self.undo.redo.push(snapshot);
        Ok(())
    }

    pub fn redo(&mut self) -> Result<(), RewriterError> {
        if self.state == RewriterState::Error {
            return Err(RewriterError::ErrorState);
        }
        let snapshot = self.undo.redo.pop().ok_or(RewriterError::NothingToRedo)?;
        let text = snapshot.after.clone();
        self.amend_inner(&text)?;
        self.undo.undo.push(snapshot);
        Ok(())
    }
}

impl RewriterTransaction<'_> {
    /// Commit the transaction. At the outermost level this flushes the text
    /// and pushes the undo step.
    pub fn commit(mut self) -> Result<(), RewriterError> {
        self.done = true;
        self.rewriter.end_transaction(true)
    }

    /// Abandon the transaction: pending work is discarded and the model is
    /// restored from the untouched buffer.
    pub fn rollback(mut self) -> Result<(), RewriterError> {
        self.done = true;
        self.rewriter.end_transaction(false)
    }
}

impl Deref for RewriterTransaction<'_> {
    type Target = Rewriter;

    fn deref(&self) -> &Rewriter {
        self.rewriter
    }
}

impl DerefMut for RewriterTransaction<'_> {
    fn deref_mut(&mut self) -> &mut Rewriter {
        self.rewriter
    }
}

impl Drop for RewriterTransaction<'_> {
    fn drop(&mut self) {
        if !self.done {
            if let Err(err) = self.rewriter.end_transaction(false) {
                log::warn!("transaction rollback on drop failed: {err}");
            }
        }
    }
}

// ─── Undo stack ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    pub(crate) identifier: String,
    pub(crate) before: String,
    pub(crate) after: String,
}

/// Bounded before/after text snapshots. New steps clear the redo side.
#[derive(Debug, Default)]
pub struct UndoStack {
    pub(crate) undo: Vec<Snapshot>,
    pub(crate) redo: Vec<Snapshot>,
    limit: usize,
}

impl UndoStack {
    pub(crate) fn new() -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            limit: UNDO_LIMIT,
        }
    }

    pub(crate) fn push(&mut self, identifier: &str, before: String, after: String) {
        self.redo.clear();
        self.undo.push(Snapshot {
            identifier: identifier.to_string(),
            before,
            after,
        });
        if self.undo.len() > self.limit {
            self.undo.remove(0);
        }
    }

    pub fn depth(&self) -> usize {
        self.undo.len()
    }

    /// Identifier of the step undo would revert next.
    pub fn current_identifier(&self) -> Option<&str> {
        self.undo.last().map(|s| s.identifier.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_clears_redo_and_bounds_depth() {
        let mut stack = UndoStack::new();
        stack.push("a", "1".into(), "2".into());
        stack.redo.push(Snapshot {
            identifier: "x".into(),
            before: "2".into(),
            after: "3".into(),
        });
        stack.push("b", "2".into(), "3".into());
        assert!(stack.redo.is_empty());
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.current_identifier(), Some("b"));

        for i in 0..(UNDO_LIMIT + 10) {
            stack.push("fill", format!("{i}"), format!("{}", i + 1));
        }
        assert_eq!(stack.depth(), UNDO_LIMIT);
    }
}
