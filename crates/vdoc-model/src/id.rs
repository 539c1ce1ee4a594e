//! Type names and node ids.
//!
//! Type names come from a small fixed vocabulary and are compared on every
//! diff step, so they are interned. Node ids are plain strings: users rename
//! them and the merger rewrites them wholesale, which defeats interning.

use crate::error::ModelError;
use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

/// Global string interner for type names, for cheap comparisons.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// An interned object type name (e.g. `Rectangle`, `State`).
/// Internally a `Spur` index: 4 bytes, Copy, Eq, Hash in O(1).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeName(Spur);

impl TypeName {
    /// Intern a type name, or return the existing handle if already interned.
    pub fn intern(s: &str) -> Self {
        TypeName(INTERNER.get_or_intern(s))
    }

    /// Resolve back to a string slice.
    pub fn as_str(&self) -> &'static str {
        INTERNER.resolve(&self.0)
    }
}

impl fmt::Debug for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for TypeName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TypeName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(TypeName::intern(&s))
    }
}

/// Words that may not be used as node ids.
const RESERVED: &[&str] = &[
    "import", "property", "signal", "true", "false", "parent", "this", "function", "if", "else",
    "var",
];

/// Check id syntax: empty means "no id" and is always accepted; otherwise the
/// id must start with a lowercase letter or `_`, continue with word
/// characters, and must not be a reserved word.
pub fn validate_id(id: &str) -> Result<(), ModelError> {
    if id.is_empty() {
        return Ok(());
    }
    let mut chars = id.chars();
    let first = chars.next().unwrap_or('\0');
    if !(first.is_ascii_lowercase() || first == '_') {
        return Err(ModelError::InvalidId(id.to_string()));
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ModelError::InvalidId(id.to_string()));
    }
    if RESERVED.contains(&id) {
        return Err(ModelError::InvalidId(id.to_string()));
    }
    Ok(())
}

/// Generate a fresh id `<base><counter>` that collides with nothing in `taken`.
/// The counter starts at 1 and counts up; `base` itself is never returned.
pub fn fresh_id(base: &str, taken: &HashSet<String>) -> String {
    let mut n: u32 = 1;
    loop {
        let candidate = format!("{base}{n}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_roundtrip() {
        let a = TypeName::intern("Rectangle");
        let b = TypeName::intern("Rectangle");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "Rectangle");
    }

    #[test]
    fn empty_id_is_valid() {
        assert!(validate_id("").is_ok());
    }

    #[test]
    fn id_syntax() {
        assert!(validate_id("button1").is_ok());
        assert!(validate_id("_hidden").is_ok());
        assert!(validate_id("Button").is_err());
        assert!(validate_id("1button").is_err());
        assert!(validate_id("foo-bar").is_err());
        assert!(validate_id("parent").is_err());
    }

    #[test]
    fn fresh_id_skips_taken() {
        let mut taken = HashSet::new();
        taken.insert("item1".to_string());
        taken.insert("item2".to_string());
        assert_eq!(fresh_id("item", &taken), "item3");
        assert_eq!(fresh_id("other", &taken), "other1");
    }
}
