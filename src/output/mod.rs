mod hydra;
mod json;
mod table;

pub use hydra::{HydraFormatter, LayoutExpr, PREAMBLE, layout_expr, python_identifier};
pub use json::JsonFormatter;
pub use table::TableFormatter;
