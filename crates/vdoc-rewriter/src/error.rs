use thiserror::Error;
use vdoc_model::{Diagnostic, ModelError, ParseError};

#[derive(Debug, Error)]
pub enum RewriterError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The document parsed but was rejected under the validate policy.
    #[error("document rejected: {}", first_line(.0))]
    InvalidDocument(Vec<Diagnostic>),

    /// The rewriter is in the error state and only accepts text updates or
    /// a reset.
    #[error("rewriter is in the error state")]
    ErrorState,

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,
}

fn first_line(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .first()
        .map(|d| d.to_string())
        .unwrap_or_else(|| "no diagnostics".to_string())
}
