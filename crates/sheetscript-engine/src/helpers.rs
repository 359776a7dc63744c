//! Names of the helper-module API the generated script calls.
//!
//! The runtime side lives in an external module; these constants are the
//! only place its spelling is written down.

/// Module imported by the default preamble.
pub const DEFAULT_HELPER_MODULE: &str = "sheetscript_api";

pub const PROJECT_VAR: &str = "proj";
pub const PROJECT_CTOR: &str = "Project";
pub const ADD_SHEET: &str = "add_sheet";
pub const RENAME_SHEET: &str = "rename_sheet";
pub const ADD_TABLE: &str = "add_table";
pub const ADD_SUMMARY_TABLE: &str = "add_summary_table";
pub const TABLE_LOOKUP: &str = "table";
pub const TABLE_CONTEXT: &str = "table_context";
pub const LABEL_CONTEXT: &str = "label_context";
pub const FORMULA_CALL: &str = "formula";
pub const DATE_CTOR: &str = "date_value";
pub const TIME_CTOR: &str = "time_value";
pub const RECT_CTOR: &str = "Rect";

// Table methods.
pub const SET_POSITION: &str = "set_position";
pub const RESIZE: &str = "resize";
pub const MINIMIZE: &str = "minimize";
pub const SET_LABELS: &str = "set_labels";
pub const INSERT_ROWS: &str = "insert_rows";
pub const INSERT_COLS: &str = "insert_cols";
pub const SET_COLUMN_TYPE: &str = "set_column_type";
pub const SET_FORMULA: &str = "set_formula";

/// Methods on the project object that create a table.
pub const TABLE_CONSTRUCTORS: &[&str] = &[ADD_TABLE, ADD_SUMMARY_TABLE];

#[derive(Debug)]
pub struct AggregateHelper {
    /// Spreadsheet function name.
    pub sheet_name: &'static str,
    /// Helper called by the aggregate-helper formula form.
    pub helper_name: &'static str,
    /// NumPy spelling used when rewriting fallback formula text.
    pub numpy_name: Option<&'static str>,
    /// Reducer used by the self-contained export; `{}` is the operand list.
    pub export_template: &'static str,
    #[allow(dead_code)]
    pub description: &'static str,
}

pub const AGGREGATE_HELPERS: &[AggregateHelper] = &[
    AggregateHelper {
        sheet_name: "SUM",
        helper_name: "c_sum",
        numpy_name: Some("np.sum"),
        export_template: "float(np.sum(_numbers({})))",
        description: "Sum of numeric values",
    },
    AggregateHelper {
        sheet_name: "AVERAGE",
        helper_name: "c_avg",
        numpy_name: Some("np.mean"),
        export_template: "float(np.mean(_numbers({})))",
        description: "Mean of numeric values",
    },
    AggregateHelper {
        sheet_name: "MIN",
        helper_name: "c_min",
        numpy_name: Some("np.min"),
        export_template: "float(np.min(_numbers({})))",
        description: "Smallest numeric value",
    },
    AggregateHelper {
        sheet_name: "MAX",
        helper_name: "c_max",
        numpy_name: Some("np.max"),
        export_template: "float(np.max(_numbers({})))",
        description: "Largest numeric value",
    },
    AggregateHelper {
        sheet_name: "COUNT",
        helper_name: "c_count",
        numpy_name: None,
        export_template: "len(_numbers({}))",
        description: "Number of numeric values",
    },
    AggregateHelper {
        sheet_name: "COUNTA",
        helper_name: "c_counta",
        numpy_name: None,
        export_template: "len(_values({}))",
        description: "Number of non-empty values",
    },
];

/// Look up an aggregate by spreadsheet name (case-insensitive).
pub fn aggregate_helper(sheet_name: &str) -> Option<&'static AggregateHelper> {
    AGGREGATE_HELPERS
        .iter()
        .find(|h| h.sheet_name.eq_ignore_ascii_case(sheet_name))
}

/// `proj = Project()`
pub fn project_init() -> String {
    format!("{} = {}()", PROJECT_VAR, PROJECT_CTOR)
}

/// `proj.table('<id>')`
pub fn table_lookup_call(table_id: &str) -> String {
    format!(
        "{}.{}({})",
        PROJECT_VAR,
        TABLE_LOOKUP,
        crate::engine::encode_str(table_id)
    )
}
