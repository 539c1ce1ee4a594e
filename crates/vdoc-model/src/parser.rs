//! Parser for VDL text → spanned document AST.
//!
//! Built on `winnow` 0.7 combinators over `&mut &str` for the token-level
//! pieces, with hand-written control flow above them. Every AST node records
//! its byte span in the source so the rewriter can compute minimal edits.
//!
//! The parser itself recovers nothing: malformed input yields a
//! [`ParseError`] carrying line/column diagnostics, and error policy
//! (validate vs best-effort amend) lives in the rewriter.

use crate::diagnostics::{Diagnostic, line_column};
use crate::property::VariantValue;
use thiserror::Error;
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::take_while;

// ─── AST ─────────────────────────────────────────────────────────────────

/// A half-open byte range in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportAst {
    pub module: String,
    pub version: Option<(i32, i32)>,
    pub alias: Option<String>,
}

/// A parsed object declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectAst {
    pub type_name: String,
    pub span: Span,
    pub members: Vec<MemberAst>,
    /// Raw body text for component-like nodes that keep their source
    /// unparsed (`Component { … }`).
    pub node_source: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberAst {
    /// `id: foo`
    Id { value: String, span: Span },
    /// `x: 10`, `width: parent.width`, dotted names allowed.
    Property {
        name: String,
        value: ValueAst,
        span: Span,
    },
    /// `property int clicks: 0`
    PropertyDeclaration {
        name: String,
        type_name: String,
        value: Option<ValueAst>,
        span: Span,
    },
    /// `signal pressed(int x)`
    SignalDeclaration {
        name: String,
        signature: String,
        span: Span,
    },
    /// `onClicked: { … }`
    SignalHandler {
        name: String,
        source: String,
        span: Span,
    },
    /// `contentItem: Item { … }`
    ObjectProperty {
        name: String,
        object: ObjectAst,
        span: Span,
    },
    /// `states: [ State { … }, … ]`
    ArrayProperty {
        name: String,
        objects: Vec<ObjectAst>,
        span: Span,
    },
    /// A multi-member grouped block (`font { bold: true; pixelSize: 12 }`),
    /// carried as the flattened dotted properties it denotes.
    Group {
        properties: Vec<(String, ValueAst, Span)>,
        span: Span,
    },
    /// A nested object in the default property slot.
    Child(ObjectAst),
}

/// The right-hand side of a plain property member.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueAst {
    Variant(VariantValue),
    /// Anything that is not a recognizable literal: a binding expression.
    Script(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentAst {
    pub imports: Vec<ImportAst>,
    pub root: ObjectAst,
}

impl ObjectAst {
    pub fn id(&self) -> Option<&str> {
        self.members.iter().find_map(|m| match m {
            MemberAst::Id { value, .. } => Some(value.as_str()),
            _ => None,
        })
    }

    /// Direct default-property children, in document order.
    pub fn children(&self) -> Vec<&ObjectAst> {
        self.members
            .iter()
            .filter_map(|m| match m {
                MemberAst::Child(obj) => Some(obj),
                _ => None,
            })
            .collect()
    }

    pub fn find_property(&self, name: &str) -> Option<&MemberAst> {
        self.members.iter().find(|m| {
            matches!(m,
                MemberAst::Property { name: n, .. }
                | MemberAst::PropertyDeclaration { name: n, .. }
                | MemberAst::SignalDeclaration { name: n, .. }
                | MemberAst::SignalHandler { name: n, .. }
                | MemberAst::ObjectProperty { name: n, .. }
                | MemberAst::ArrayProperty { name: n, .. } if n == name)
        })
    }
}

// ─── Errors ──────────────────────────────────────────────────────────────

/// Parse failure with structured diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", .diagnostics.first().map(|d| d.to_string()).unwrap_or_else(|| "parse error".into()))]
pub struct ParseError {
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseError {
    fn at(source: &str, offset: usize, message: impl Into<String>) -> Self {
        let (line, column) = line_column(source, offset);
        Self {
            diagnostics: vec![Diagnostic::error(line, column, message)],
        }
    }
}

// ─── Entry point ─────────────────────────────────────────────────────────

/// Parse a VDL document.
pub fn parse_document(source: &str) -> Result<DocumentAst, ParseError> {
    let mut rest = source;
    skip_ws_and_comments(&mut rest);

    let mut imports = Vec::new();
    while rest.starts_with("import ") || rest.starts_with("import\t") {
        let import = parse_import(source, &mut rest)?;
        imports.push(import);
        skip_ws_and_comments(&mut rest);
    }

    if rest.is_empty() {
        return Err(ParseError::at(
            source,
            source.len(),
            "expected a root object declaration",
        ));
    }

    let root = parse_object(source, &mut rest)?;
    skip_ws_and_comments(&mut rest);
    if !rest.is_empty() {
        return Err(ParseError::at(
            source,
            offset_of(source, rest),
            "unexpected trailing content after root object",
        ));
    }

    Ok(DocumentAst { imports, root })
}

// ─── Low-level helpers ───────────────────────────────────────────────────

fn offset_of(source: &str, rest: &str) -> usize {
    source.len() - rest.len()
}

fn skip_ws_and_comments(input: &mut &str) {
    loop {
        let before = *input;
        *input = input.trim_start();
        if let Some(stripped) = input.strip_prefix("//") {
            match stripped.find('\n') {
                Some(pos) => *input = &stripped[pos + 1..],
                None => *input = "",
            }
            continue;
        }
        if let Some(stripped) = input.strip_prefix("/*") {
            match stripped.find("*/") {
                Some(pos) => *input = &stripped[pos + 2..],
                None => *input = "",
            }
            continue;
        }
        if *input == before {
            break;
        }
    }
}

/// Consume optional horizontal whitespace.
fn skip_space(input: &mut &str) {
    use winnow::ascii::space0;
    let _: Result<&str, winnow::error::ErrMode<ContextError>> = space0.parse_next(input);
}

fn parse_identifier<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    let first_ok = input
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !first_ok {
        return Err(winnow::error::ErrMode::Backtrack(ContextError::new()));
    }
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_').parse_next(input)
}

/// `ident(.ident)*`
fn parse_dotted_name<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    let start = *input;
    let _ = parse_identifier.parse_next(input)?;
    while input.starts_with('.') {
        let mut lookahead = &input[1..];
        match parse_identifier.parse_next(&mut lookahead) {
            Ok(_) => *input = lookahead,
            Err(_) => break,
        }
    }
    Ok(&start[..start.len() - input.len()])
}

fn parse_quoted_string(source: &str, input: &mut &str) -> Result<String, ParseError> {
    let open = offset_of(source, input);
    debug_assert!(input.starts_with('"'));
    *input = &input[1..];
    let mut out = String::new();
    let mut chars = input.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => {
                *input = &input[i + 1..];
                return Ok(out);
            }
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, other)) => out.push(other),
                None => break,
            },
            '\n' => break,
            other => out.push(other),
        }
    }
    Err(ParseError::at(source, open, "unterminated string literal"))
}

/// Capture raw value text: scan until a `\n`, `;`, `}` or `//` at bracket
/// depth zero. Strings are skipped opaquely; `{` `[` `(` nest.
fn capture_raw<'a>(source: &str, input: &mut &'a str) -> Result<&'a str, ParseError> {
    let start_off = offset_of(source, input);
    let bytes = input.as_bytes();
    let mut depth: i32 = 0;
    let mut i = 0usize;
    let mut in_string = false;
    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            match b {
                b'\\' => i += 1,
                b'"' => in_string = false,
                _ => {}
            }
        } else {
            match b {
                b'"' => in_string = true,
                b'{' | b'[' | b'(' => depth += 1,
                b'}' => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                b']' | b')' => depth -= 1,
                b'\n' | b';' => {
                    if depth == 0 {
                        break;
                    }
                }
                b'/' => {
                    if depth == 0 && bytes.get(i + 1) == Some(&b'/') {
                        break;
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    if depth > 0 || in_string {
        return Err(ParseError::at(source, start_off, "unbalanced value"));
    }
    let captured = input[..i].trim_end();
    *input = &input[i..];
    Ok(captured)
}

/// Classify captured value text as a literal or a script expression.
pub fn classify_value(raw: &str) -> ValueAst {
    let trimmed = raw.trim();
    match trimmed {
        "true" => return ValueAst::Variant(VariantValue::Bool(true)),
        "false" => return ValueAst::Variant(VariantValue::Bool(false)),
        _ => {}
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return ValueAst::Variant(VariantValue::Int(i));
    }
    if let Ok(d) = trimmed.parse::<f64>()
        && trimmed.chars().all(|c| c.is_ascii_digit() || "+-.eE".contains(c))
    {
        return ValueAst::Variant(VariantValue::Double(d));
    }
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        let inner = &trimmed[1..trimmed.len() - 1];
        // A string literal must not contain an unescaped quote.
        let mut ok = true;
        let mut escape = false;
        for c in inner.chars() {
            if escape {
                escape = false;
            } else if c == '\\' {
                escape = true;
            } else if c == '"' {
                ok = false;
                break;
            }
        }
        if ok && !escape {
            return ValueAst::Variant(VariantValue::Str(unescape(inner)));
        }
    }
    if is_enumeration(trimmed) {
        return ValueAst::Variant(VariantValue::Enumeration(trimmed.to_string()));
    }
    ValueAst::Script(trimmed.to_string())
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// `Scope.Literal` with an uppercase scope: an enumeration value.
fn is_enumeration(s: &str) -> bool {
    let Some((scope, literal)) = s.split_once('.') else {
        return false;
    };
    let scope_ok = scope.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && scope.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    let literal_ok = !literal.is_empty()
        && !literal.contains('.')
        && literal.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    scope_ok && literal_ok
}

/// Whether `rest` begins an object declaration: `TypeName {` with an
/// uppercase leading letter.
fn at_object_start(rest: &str) -> bool {
    let mut probe = rest;
    let Ok(name) = parse_dotted_name.parse_next(&mut probe) else {
        return false;
    };
    if !name.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
        return false;
    }
    skip_ws_and_comments(&mut probe);
    probe.starts_with('{')
}

// ─── Imports ─────────────────────────────────────────────────────────────

fn parse_import(source: &str, input: &mut &str) -> Result<ImportAst, ParseError> {
    let start = offset_of(source, input);
    *input = &input["import".len()..];
    skip_space(input);

    let module = if input.starts_with('"') {
        parse_quoted_string(source, input)?
    } else {
        parse_dotted_name
            .parse_next(input)
            .map_err(|_| ParseError::at(source, start, "expected module name after `import`"))?
            .to_string()
    };
    skip_space(input);

    // Optional `major.minor`
    let mut version = None;
    if input.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        let raw = capture_version(input);
        if let Some((maj, min)) = raw.split_once('.')
            && let (Ok(maj), Ok(min)) = (maj.parse(), min.parse())
        {
            version = Some((maj, min));
        } else if let Ok(maj) = raw.parse() {
            version = Some((maj, 0));
        }
    }
    skip_space(input);

    let mut alias = None;
    if let Some(stripped) = input.strip_prefix("as ") {
        *input = stripped;
        skip_space(input);
        let name = parse_identifier
            .parse_next(input)
            .map_err(|_| ParseError::at(source, start, "expected alias after `as`"))?;
        alias = Some(name.to_string());
    }

    Ok(ImportAst {
        module,
        version,
        alias,
    })
}

fn capture_version<'a>(input: &mut &'a str) -> &'a str {
    let end = input
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(input.len());
    let raw = &input[..end];
    *input = &input[end..];
    raw
}

// ─── Objects ─────────────────────────────────────────────────────────────

/// Types whose body is kept as an unparsed source blob.
const SOURCE_ONLY_TYPES: &[&str] = &["Component"];

fn parse_object(source: &str, input: &mut &str) -> Result<ObjectAst, ParseError> {
    let start = offset_of(source, input);
    let type_name = parse_dotted_name
        .parse_next(input)
        .map_err(|_| ParseError::at(source, start, "expected a type name"))?
        .to_string();
    if !type_name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_uppercase())
    {
        return Err(ParseError::at(
            source,
            start,
            format!("type name `{type_name}` must start with an uppercase letter"),
        ));
    }
    skip_ws_and_comments(input);
    if !input.starts_with('{') {
        return Err(ParseError::at(
            source,
            offset_of(source, input),
            format!("expected `{{` after type `{type_name}`"),
        ));
    }
    *input = &input[1..];

    if SOURCE_ONLY_TYPES.contains(&type_name.as_str()) {
        let body = capture_balanced_body(source, input)?;
        let end = offset_of(source, input);
        return Ok(ObjectAst {
            type_name,
            span: Span::new(start, end),
            members: Vec::new(),
            node_source: Some(body.trim().to_string()),
        });
    }

    let mut members = Vec::new();
    loop {
        skip_ws_and_comments(input);
        if input.is_empty() {
            return Err(ParseError::at(
                source,
                source.len(),
                format!("unterminated object `{type_name}`"),
            ));
        }
        if input.starts_with('}') {
            *input = &input[1..];
            break;
        }
        if input.starts_with(';') {
            *input = &input[1..];
            continue;
        }
        members.push(parse_member(source, input)?);
    }

    let end = offset_of(source, input);
    Ok(ObjectAst {
        type_name,
        span: Span::new(start, end),
        members,
        node_source: None,
    })
}

/// Consume a balanced `{ … }` body (the opening brace already consumed) and
/// return the inner text.
fn capture_balanced_body<'a>(source: &str, input: &mut &'a str) -> Result<&'a str, ParseError> {
    let start_off = offset_of(source, input);
    let bytes = input.as_bytes();
    let mut depth: i32 = 1;
    let mut in_string = false;
    let mut i = 0usize;
    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            match b {
                b'\\' => i += 1,
                b'"' => in_string = false,
                _ => {}
            }
        } else {
            match b {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        let body = &input[..i];
                        *input = &input[i + 1..];
                        return Ok(body);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    Err(ParseError::at(source, start_off, "unterminated `{`"))
}

// ─── Members ─────────────────────────────────────────────────────────────

fn parse_member(source: &str, input: &mut &str) -> Result<MemberAst, ParseError> {
    let start = offset_of(source, input);

    if input.starts_with("property ") || input.starts_with("property\t") {
        return parse_property_declaration(source, input, start);
    }
    if input.starts_with("signal ") || input.starts_with("signal\t") {
        return parse_signal_declaration(source, input, start);
    }

    // A child object?
    if at_object_start(input) {
        let object = parse_object(source, input)?;
        return Ok(MemberAst::Child(object));
    }

    let name = parse_dotted_name
        .parse_next(input)
        .map_err(|_| ParseError::at(source, start, "expected a property name or object"))?
        .to_string();
    skip_space(input);

    if input.starts_with(':') {
        *input = &input[1..];
        skip_space(input);
        return parse_binding_rhs(source, input, name, start);
    }

    if input.starts_with('{') {
        // Grouped property block: `font { bold: true }` flattened to dot-paths.
        *input = &input[1..];
        return parse_group_body(source, input, name, start);
    }

    Err(ParseError::at(
        source,
        offset_of(source, input),
        format!("expected `:` or `{{` after `{name}`"),
    ))
}

fn parse_binding_rhs(
    source: &str,
    input: &mut &str,
    name: String,
    start: usize,
) -> Result<MemberAst, ParseError> {
    if name == "id" {
        let id = parse_identifier
            .parse_next(input)
            .map_err(|_| ParseError::at(source, start, "expected an identifier after `id:`"))?
            .to_string();
        let end = offset_of(source, input);
        return Ok(MemberAst::Id {
            value: id,
            span: Span::new(start, end),
        });
    }

    // Signal handler: `on` + uppercase.
    if is_handler_name(&name) {
        let raw = capture_raw(source, input)?;
        let end = offset_of(source, input);
        return Ok(MemberAst::SignalHandler {
            name,
            source: raw.to_string(),
            span: Span::new(start, end),
        });
    }

    // Array of objects: `states: [ State { … } ]`.
    if input.starts_with('[') {
        let mut probe = &input[1..];
        skip_ws_and_comments(&mut probe);
        if at_object_start(probe) || probe.starts_with(']') {
            *input = &input[1..];
            let mut objects = Vec::new();
            loop {
                skip_ws_and_comments(input);
                if input.starts_with(']') {
                    *input = &input[1..];
                    break;
                }
                if input.starts_with(',') {
                    *input = &input[1..];
                    continue;
                }
                if input.is_empty() {
                    return Err(ParseError::at(source, start, "unterminated `[`"));
                }
                objects.push(parse_object(source, input)?);
            }
            let end = offset_of(source, input);
            return Ok(MemberAst::ArrayProperty {
                name,
                objects,
                span: Span::new(start, end),
            });
        }
    }

    // Object-valued property: `contentItem: Item { … }`.
    if at_object_start(input) {
        let object = parse_object(source, input)?;
        let end = offset_of(source, input);
        return Ok(MemberAst::ObjectProperty {
            name,
            object,
            span: Span::new(start, end),
        });
    }

    let raw = capture_raw(source, input)?;
    if raw.is_empty() {
        return Err(ParseError::at(
            source,
            start,
            format!("missing value for `{name}`"),
        ));
    }
    let end = offset_of(source, input);
    Ok(MemberAst::Property {
        name,
        value: classify_value(raw),
        span: Span::new(start, end),
    })
}

pub fn is_handler_name(name: &str) -> bool {
    name.strip_prefix("on")
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_uppercase())
}

fn parse_property_declaration(
    source: &str,
    input: &mut &str,
    start: usize,
) -> Result<MemberAst, ParseError> {
    *input = &input["property".len()..];
    skip_space(input);
    let type_name = parse_dotted_name
        .parse_next(input)
        .map_err(|_| ParseError::at(source, start, "expected a type after `property`"))?
        .to_string();
    skip_space(input);
    let name = parse_identifier
        .parse_next(input)
        .map_err(|_| ParseError::at(source, start, "expected a name after the property type"))?
        .to_string();
    skip_space(input);

    let mut value = None;
    if input.starts_with(':') {
        *input = &input[1..];
        skip_space(input);
        let raw = capture_raw(source, input)?;
        if raw.is_empty() {
            return Err(ParseError::at(
                source,
                start,
                format!("missing value for declared property `{name}`"),
            ));
        }
        value = Some(classify_value(raw));
    }
    let end = offset_of(source, input);
    Ok(MemberAst::PropertyDeclaration {
        name,
        type_name,
        value,
        span: Span::new(start, end),
    })
}

fn parse_signal_declaration(
    source: &str,
    input: &mut &str,
    start: usize,
) -> Result<MemberAst, ParseError> {
    *input = &input["signal".len()..];
    skip_space(input);
    let name = parse_identifier
        .parse_next(input)
        .map_err(|_| ParseError::at(source, start, "expected a name after `signal`"))?
        .to_string();
    skip_space(input);

    let mut signature = String::new();
    if input.starts_with('(') {
        let close = input
            .find(')')
            .ok_or_else(|| ParseError::at(source, start, "unterminated signal parameter list"))?;
        signature = input[1..close].trim().to_string();
        *input = &input[close + 1..];
    }
    let end = offset_of(source, input);
    Ok(MemberAst::SignalDeclaration {
        name,
        signature,
        span: Span::new(start, end),
    })
}

/// Body of a grouped property block; only simple `name: value` members are
/// meaningful inside, each flattened to `group.name`.
fn parse_group_body(
    source: &str,
    input: &mut &str,
    group: String,
    start: usize,
) -> Result<MemberAst, ParseError> {
    let mut flattened = Vec::new();
    loop {
        skip_ws_and_comments(input);
        if input.starts_with('}') {
            *input = &input[1..];
            break;
        }
        if input.starts_with(';') {
            *input = &input[1..];
            continue;
        }
        if input.is_empty() {
            return Err(ParseError::at(
                source,
                start,
                format!("unterminated group `{group}`"),
            ));
        }
        let member_start = offset_of(source, input);
        let name = parse_dotted_name
            .parse_next(input)
            .map_err(|_| ParseError::at(source, member_start, "expected a property name"))?;
        skip_space(input);
        if !input.starts_with(':') {
            return Err(ParseError::at(
                source,
                offset_of(source, input),
                format!("expected `:` after `{name}` in group `{group}`"),
            ));
        }
        *input = &input[1..];
        skip_space(input);
        let raw = capture_raw(source, input)?;
        let member_end = offset_of(source, input);
        flattened.push((
            format!("{group}.{name}"),
            classify_value(raw),
            Span::new(member_start, member_end),
        ));
    }

    // A group with exactly one member degrades to a plain dotted property;
    // more members stay grouped as consecutive dotted properties. Both forms
    // re-emit as dotted lines, so the single-member case is the general one.
    let end = offset_of(source, input);
    if flattened.len() == 1 {
        let (name, value, _) = flattened.into_iter().next().unwrap();
        return Ok(MemberAst::Property {
            name,
            value,
            span: Span::new(start, end),
        });
    }
    // Represent multi-member groups as a synthetic child-less span wrapper:
    // emit each dotted property separately under the group's span.
    Ok(MemberAst::Group {
        properties: flattened
            .into_iter()
            .map(|(name, value, span)| (name, value, span))
            .collect(),
        span: Span::new(start, end),
    })
}
