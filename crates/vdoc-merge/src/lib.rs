//! Stylesheet merging.
//!
//! Layers a visual-style document onto a template document, matched by
//! shared node ids: replacement construction, id renaming on collision,
//! position adjustment and state/property synchronization. The template is
//! driven through its rewriter, so the merged text and the undo history
//! stay consistent; the style document is only touched by the hierarchy
//! preprocessing pass.

pub mod error;
pub mod merger;

pub use error::MergeStepError;
pub use merger::{
    MergeOptions, MergeReport, OPTIONS_NODE_ID, SkippedNode, StylesheetMerger,
};
