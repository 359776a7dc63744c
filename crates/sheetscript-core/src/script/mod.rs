//! Script text: normalization, composition and export.

mod compose;
mod export;
mod normalize;
pub(crate) mod scan;

pub use compose::{
    MARKER, compose, default_preamble, extract_generated_region, new_script, selection_script,
    strip_alias_declarations, user_region,
};
pub use export::{ExportOptions, export_script};
pub use normalize::{normalize, normalize_text};
pub use scan::table_alias;
