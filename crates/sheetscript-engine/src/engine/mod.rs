//! Engine API.
//!
//! - [`Value`] - typed cell values and their snapshot JSON form
//! - [`CellAddress`], [`RangeAddress`], [`Region`] - region-qualified addresses
//! - [`Rect`], [`LabelBands`] - small structured records carried by commands
//! - [`encode`] and friends - script literal rendering with full escaping
//! - [`translate_formula`] - spreadsheet formula to script rendering

mod address;
mod formula;
mod geometry;
mod literal;
mod value;

pub use address::{
    AddressError, CellAddress, RangeAddress, Region, Target, cell_label, col_to_letters,
    is_cell_token, letters_to_col,
};
pub use formula::{
    AggregateCall, FormulaForm, InlineToken, Translation, aggregate_call, fallback_text,
    inline_tokens, is_numeric_literal, strip_formula_prefix, translate_formula,
};
pub use geometry::{LabelBands, Rect};
pub use literal::{
    encode, encode_2d, encode_dict, encode_list, encode_number, encode_str, encode_str_list,
    encode_structured, Structured,
};
pub use value::Value;
