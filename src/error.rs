use crate::types::{SourceLocation, TypeOffset};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse binary: {0}")]
    ObjectParse(#[from] object::read::Error),

    #[error("No debug information found. Compile with -g flag to include DWARF debug info.")]
    NoDebugInfo,

    #[error("Unsupported binary format. Only ELF, Mach-O and PE binaries are supported.")]
    UnsupportedFormat,

    #[error("DWARF parsing error: {0}")]
    Dwarf(String),

    #[error("Malformed debug info in unit '{unit}': type offset {offset} registered twice")]
    DuplicateOffset { unit: String, offset: TypeOffset },

    #[error("Malformed debug info: '{from}' references missing type entry {offset}")]
    DanglingReference { from: String, offset: TypeOffset },

    #[error("Type cycle detected at '{name}'")]
    TypeCycle { name: String },

    #[error("Conflicting definitions of '{name}'{}", describe_locations(.first, .second))]
    ConflictingDefinition {
        name: String,
        first: Option<SourceLocation>,
        second: Option<SourceLocation>,
    },

    #[error("Array '{name}' has no upper bound; variable-length arrays are not supported")]
    UnboundedArray { name: String },

    #[error("Type '{name}' has no byte size")]
    MissingSize { name: String },

    #[error("Member '{member}' of '{owner}' is not supported: {reason}")]
    UnsupportedMember { owner: String, member: String, reason: &'static str },

    #[error("Member '{member}' of '{owner}' has unsized type '{type_name}'")]
    UnsizedMember { owner: String, member: String, type_name: String },

    #[error("Array '{name}' has unsized element type '{element}'")]
    UnsizedElement { name: String, element: String },

    #[error("Member '{member}' of '{owner}' at offset {offset} overlaps the previous member")]
    OverlappingMember { owner: String, member: String, offset: u64 },

    #[error("'{first}' and '{second}' would both be emitted as '{ident}'")]
    IdentifierClash { ident: String, first: String, second: String },

    #[error("Field '{field}' of '{owner}' has type '{type_name}' with no hydras representation")]
    Unrepresentable { owner: String, field: String, type_name: String },

    #[error("Invalid whitelist pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

fn describe_locations(first: &Option<SourceLocation>, second: &Option<SourceLocation>) -> String {
    match (first, second) {
        (Some(a), Some(b)) => format!(" ({} vs {})", a, b),
        (Some(a), None) | (None, Some(a)) => format!(" (at {})", a),
        (None, None) => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;
