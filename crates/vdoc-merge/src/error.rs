//! Merge failure kinds.

use thiserror::Error;
use vdoc_rewriter::RewriterError;

/// Failure of a single merge step. The driver logs it, abandons the rest of
/// that node's steps and continues with the next queued node, so a partial
/// merge is an accepted outcome rather than a fatal error.
#[derive(Debug, Error)]
pub enum MergeStepError {
    #[error("no template node with id `{0}`")]
    MissingTemplateNode(String),

    #[error("no style node with id `{0}`")]
    MissingStyleNode(String),

    #[error("template node `{0}` is not held by a container property")]
    Detached(String),

    #[error(transparent)]
    Rewriter(#[from] RewriterError),
}
