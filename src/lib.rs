pub mod analysis;
pub mod cli;
pub mod config;
pub mod dwarf;
pub mod error;
mod finalize;
pub mod loader;
pub mod merge;
pub mod output;
pub mod table;
pub mod types;

#[cfg(test)]
mod testing;

pub use analysis::{analyze_layout, has_padding, padding_holes, struct_layouts};
pub use cli::{Cli, Commands, ReportFormat};
pub use config::Config;
pub use dwarf::DwarfContext;
pub use error::{Error, Result};
pub use loader::{BinaryData, LoadedDwarf};
pub use merge::{Definition, DefinitionKind, LayoutSet, Selector};
pub use output::{HydraFormatter, JsonFormatter, LayoutExpr, TableFormatter};
pub use table::TypeTable;
pub use types::{
    Lifecycle, MemberLayout, NodeId, PaddingHole, SourceLocation, StructLayout, TypeKind,
    TypeNode, TypeOffset, TypeRef,
};
