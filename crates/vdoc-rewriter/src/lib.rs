pub mod error;
pub mod positions;
pub mod rewriter;
pub mod textedit;
pub mod transaction;

pub use error::RewriterError;
pub use positions::PositionMap;
pub use rewriter::{AmendScheduler, ModelMutation, Rewriter, RewriterState, UpdatePolicy};
pub use textedit::{TextEdit, apply_edits, indent_lines};
pub use transaction::{RewriterTransaction, UndoStack};
