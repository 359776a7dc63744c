//! sheetscript-core - command history, script generation and execution.
//!
//! Pipeline: [`Command`] → [`TransactionManager`] → rendered lines →
//! [`normalize`] → [`compose`] → full script text, and back again through
//! [`extract_generated_region`] and [`History`].

pub mod command;
pub mod document;
pub mod error;
pub mod history;
pub mod project;
pub mod runner;
pub mod script;

pub use command::{Command, Mutation, Transaction, TransactionKind, TransactionManager};
pub use document::{Document, history_path};
pub use error::{Result, SheetError};
pub use history::History;
pub use project::{Project, Sheet, Table};
pub use runner::{RunError, RunGeneration, RunOutput, RunTicket, RunnerConfig, ScriptRunner};
pub use script::{
    ExportOptions, MARKER, compose, export_script, extract_generated_region, normalize,
    normalize_text, selection_script,
};

pub use sheetscript_engine::engine::{CellAddress, RangeAddress, Region, Target, Value};
