use thiserror::Error;

use crate::descriptor::DescriptorError;

#[derive(Error, Debug)]
pub enum ReleveError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "xlsx")]
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("Invalid column format: {0}")]
    Descriptor(#[from] DescriptorError),

    #[error("Unknown client: {0}")]
    UnknownClient(String),

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Unknown bank account: {0}")]
    UnknownAccount(String),

    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    #[error("Unknown import: {0}")]
    UnknownImport(i64),

    #[error("Unknown cash closure: {0}")]
    UnknownClosure(i64),

    #[error("Unknown person: {0}")]
    UnknownPerson(i64),

    #[error("Unknown contract: {0}")]
    UnknownContract(i64),

    #[error("Unsupported file type: {0}")]
    UnsupportedFile(String),

    #[error("A cash closure already exists for {entity} on {date}")]
    ClosureExists { entity: String, date: String },

    #[error("Budget line already exists for {entity} {year}-{month:02} '{category}' (use --replace)")]
    BudgetLineExists {
        entity: String,
        year: i32,
        month: u32,
        category: String,
    },

    #[error("Budget {year} for {entity} is not empty")]
    BudgetNotEmpty { entity: String, year: i32 },

    #[error("Affectations of contract {contract} would exceed 100% ({total}%)")]
    OverAssigned { contract: i64, total: rust_decimal::Decimal },

    #[error("Amount out of range: {0}")]
    AmountOutOfRange(rust_decimal::Decimal),

    #[error("Invalid value: {0}")]
    Invalid(String),

    #[error("Settings error: {0}")]
    Settings(String),
}

pub type Result<T> = std::result::Result<T, ReleveError>;
