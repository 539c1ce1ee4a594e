pub mod builder;
pub mod diagnostics;
pub mod emitter;
pub mod error;
pub mod id;
pub mod metadata;
pub mod model;
pub mod parser;
pub mod property;

pub use builder::{BuiltDocument, DEFAULT_PROPERTY, build_document, instantiate_object};
pub use diagnostics::{Diagnostic, Severity};
pub use emitter::{emit_document, emit_node};
pub use error::ModelError;
pub use id::{TypeName, fresh_id, validate_id};
pub use metadata::{MetadataRegistry, NodeMetadata, PermissiveMetadata};
pub use model::*;
pub use parser::{DocumentAst, ImportAst, ObjectAst, ParseError, Span, parse_document};
pub use property::{Property, PropertyLookup, PropertyValue, VariantValue, binding_is_literal};
