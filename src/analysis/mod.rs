mod equality;
mod padding;

pub use equality::{same_layout, structurally_equal};
pub use padding::{analyze_layout, has_padding, padding_holes, struct_layouts};
