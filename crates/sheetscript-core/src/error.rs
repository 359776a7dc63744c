//! Error types for sheetscript core.

use sheetscript_engine::engine::AddressError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SheetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error("Unknown sheet: {0}")]
    UnknownSheet(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    #[error("No active transaction")]
    NoActiveTransaction,

    #[error("A transaction is already active")]
    TransactionActive,
}

pub type Result<T> = std::result::Result<T, SheetError>;
