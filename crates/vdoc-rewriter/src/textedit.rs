//! Span-based text edits.
//!
//! Edits are computed against one buffer snapshot and applied in descending
//! offset order, so the spans of not-yet-applied edits stay valid. `Move`
//! relocates a slice in the same pass; `Indent` runs last and re-anchors
//! whole lines to their brace depth.

use std::ops::Range;
use vdoc_model::Span;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextEdit {
    /// Replace `span` with `text`. Deletion is empty `text`.
    Replace { span: Span, text: String },
    /// Cut the (trimmed) slice at `span` and paste it at `target`,
    /// wrapped in `prefix`/`suffix`.
    Move {
        span: Span,
        target: usize,
        prefix: String,
        suffix: String,
    },
    /// Re-indent the given 0-based line range to brace depth.
    Indent { lines: Range<usize> },
}

impl TextEdit {
    pub fn replace(span: Span, text: impl Into<String>) -> Self {
        TextEdit::Replace {
            span,
            text: text.into(),
        }
    }

    pub fn delete(span: Span) -> Self {
        TextEdit::Replace {
            span,
            text: String::new(),
        }
    }

    fn offset(&self) -> usize {
        match self {
            TextEdit::Replace { span, .. } => span.start,
            TextEdit::Move { span, .. } => span.start,
            TextEdit::Indent { .. } => 0,
        }
    }
}

/// Apply a batch of edits to `buffer`. Replace/Move spans must not overlap;
/// they are applied back to front, then the indent passes run.
pub fn apply_edits(buffer: &mut String, mut edits: Vec<TextEdit>) {
    let mut indents = Vec::new();
    edits.retain(|e| match e {
        TextEdit::Indent { lines } => {
            indents.push(lines.clone());
            false
        }
        _ => true,
    });
    edits.sort_by(|a, b| b.offset().cmp(&a.offset()));

    for edit in edits {
        match edit {
            TextEdit::Replace { span, text } => {
                buffer.replace_range(span.start..span.end, &text);
            }
            TextEdit::Move {
                span,
                mut target,
                prefix,
                suffix,
            } => {
                let captured = buffer[span.start..span.end].trim().to_string();
                buffer.replace_range(span.start..span.end, "");
                if target >= span.end {
                    target -= span.len();
                } else if target > span.start {
                    target = span.start;
                }
                let insertion = format!("{prefix}{captured}{suffix}");
                buffer.insert_str(target, &insertion);
            }
            TextEdit::Indent { .. } => unreachable!(),
        }
    }

    for lines in indents {
        indent_lines(buffer, lines);
    }
}

const INDENT: &str = "    ";

/// Rewrite the indentation of the given 0-based line range so each line sits
/// at its brace/bracket depth. Strings are skipped opaquely.
pub fn indent_lines(buffer: &mut String, lines: Range<usize>) {
    let mut out = String::with_capacity(buffer.len());
    let mut depth: i32 = 0;
    for (number, line) in buffer.lines().enumerate() {
        let trimmed = line.trim_start();
        // A line that opens with closers sits one level out.
        let leading_closers = trimmed
            .chars()
            .take_while(|c| matches!(c, '}' | ']'))
            .count() as i32;
        if lines.contains(&number) {
            if trimmed.is_empty() {
                out.push('\n');
                depth += line_depth_delta(line);
                continue;
            }
            let effective = (depth - leading_closers).max(0) as usize;
            out.push_str(&INDENT.repeat(effective));
            out.push_str(trimmed);
        } else {
            out.push_str(line);
        }
        out.push('\n');
        depth += line_depth_delta(line);
    }
    if !buffer.ends_with('\n') {
        out.pop();
    }
    *buffer = out;
}

fn line_depth_delta(line: &str) -> i32 {
    let mut delta = 0;
    let mut in_string = false;
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if in_string {
            match c {
                '\\' => {
                    chars.next();
                }
                '"' => in_string = false,
                _ => {}
            }
        } else {
            match c {
                '"' => in_string = true,
                '{' | '[' => delta += 1,
                '}' | ']' => delta -= 1,
                '/' => {
                    if chars.as_str().starts_with('/') {
                        break;
                    }
                }
                _ => {}
            }
        }
    }
    delta
}
