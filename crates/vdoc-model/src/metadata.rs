//! The consumed node-metadata interface: given a type, which property names
//! does it declare, and what does it inherit from.
//!
//! The engine never introspects types itself; the host supplies an
//! implementation (the merger uses it to filter copyable properties).

use crate::id::TypeName;
use std::collections::{BTreeSet, HashMap};

/// Type introspection as consumed by the merger and property-default
/// resolution.
pub trait NodeMetadata {
    /// Whether `type_name` (or a super type) declares `property`.
    fn has_property(&self, type_name: TypeName, property: &str) -> bool;

    /// All declared property names of `type_name`, super chain included.
    fn properties_of(&self, type_name: TypeName) -> BTreeSet<String>;

    /// The direct super type, if any.
    fn super_type(&self, type_name: TypeName) -> Option<TypeName>;
}

/// Permissive metadata: every type declares every property. Useful for tests
/// and for hosts without type information.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveMetadata;

impl NodeMetadata for PermissiveMetadata {
    fn has_property(&self, _type_name: TypeName, _property: &str) -> bool {
        true
    }

    fn properties_of(&self, _type_name: TypeName) -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn super_type(&self, _type_name: TypeName) -> Option<TypeName> {
        None
    }
}

/// In-memory registry with single inheritance.
#[derive(Debug, Clone, Default)]
pub struct MetadataRegistry {
    types: HashMap<TypeName, TypeEntry>,
}

#[derive(Debug, Clone, Default)]
struct TypeEntry {
    properties: BTreeSet<String>,
    super_type: Option<TypeName>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type with its declared property names and optional super type.
    pub fn register<'a>(
        &mut self,
        type_name: &str,
        super_type: Option<&str>,
        properties: impl IntoIterator<Item = &'a str>,
    ) {
        let entry = TypeEntry {
            properties: properties.into_iter().map(str::to_string).collect(),
            super_type: super_type.map(TypeName::intern),
        };
        self.types.insert(TypeName::intern(type_name), entry);
    }
}

impl NodeMetadata for MetadataRegistry {
    fn has_property(&self, type_name: TypeName, property: &str) -> bool {
        let mut current = Some(type_name);
        while let Some(t) = current {
            let Some(entry) = self.types.get(&t) else {
                return false;
            };
            if entry.properties.contains(property) {
                return true;
            }
            current = entry.super_type;
        }
        false
    }

    fn properties_of(&self, type_name: TypeName) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        let mut current = Some(type_name);
        while let Some(t) = current {
            let Some(entry) = self.types.get(&t) else {
                break;
            };
            out.extend(entry.properties.iter().cloned());
            current = entry.super_type;
        }
        out
    }

    fn super_type(&self, type_name: TypeName) -> Option<TypeName> {
        self.types.get(&type_name).and_then(|e| e.super_type)
    }
}
