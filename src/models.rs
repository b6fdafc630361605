use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::normalize::DateOrder;

#[derive(Debug, Clone)]
pub struct Client {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: i64,
    pub client_id: i64,
    pub name: String,
    pub code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BankAccount {
    pub id: i64,
    pub client_id: i64,
    pub entity_id: Option<i64>,
    pub label: String,
    pub bank_name: Option<String>,
    pub iban: Option<String>,
    pub account_number: Option<String>,
}

/// How to read one family of statement files.
#[derive(Debug, Clone)]
pub struct BankFormat {
    pub id: i64,
    pub name: String,
    pub descriptor: String,
    /// `None` sniffs the delimiter from the file.
    pub delimiter: Option<char>,
    pub skip_rows: usize,
    pub has_header: bool,
    pub date_order: DateOrder,
    /// Spreadsheet tab; the first sheet when unset.
    pub sheet: Option<String>,
}

impl BankFormat {
    /// An unsaved format, used for previews and tests.
    pub fn adhoc(descriptor: &str) -> Self {
        Self {
            id: 0,
            name: "adhoc".to_string(),
            descriptor: descriptor.to_string(),
            delimiter: None,
            skip_rows: 0,
            has_header: true,
            date_order: DateOrder::Dmy,
            sheet: None,
        }
    }
}

/// One row of a statement file before interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    /// 1-based line (or spreadsheet row) number in the source file.
    pub line: usize,
    pub cells: Vec<String>,
}

/// A statement row once the descriptor has been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    pub date_operation: NaiveDate,
    pub date_valeur: Option<NaiveDate>,
    pub libelle: Option<String>,
    pub reference: Option<String>,
    pub amount: Decimal,
    pub account_ref: Option<String>,
    pub balance: Option<Decimal>,
    pub currency: Option<String>,
    /// Cells of descriptor columns with no ledger field, keyed by column name.
    pub extras: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStatus {
    Pending,
    Imported,
    Duplicate,
    Error,
}

impl LineStatus {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Imported => "IMPORTED",
            Self::Duplicate => "DUPLICATE",
            Self::Error => "ERROR",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "PENDING" => Some(Self::Pending),
            "IMPORTED" => Some(Self::Imported),
            "DUPLICATE" => Some(Self::Duplicate),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for LineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStatus {
    Pending,
    Done,
    Partial,
    Failed,
}

impl ImportStatus {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Done => "DONE",
            Self::Partial => "PARTIAL",
            Self::Failed => "FAILED",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportRecord {
    pub id: i64,
    pub client_id: i64,
    pub format_id: i64,
    pub bank_account_id: Option<i64>,
    pub file_name: String,
    pub status: String,
    pub line_count: i64,
    pub imported_count: i64,
    pub duplicate_count: i64,
    pub error_count: i64,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct ImportLine {
    pub id: i64,
    pub line_number: i64,
    pub status: LineStatus,
    pub message: Option<String>,
    pub date_operation: Option<String>,
    pub libelle: Option<String>,
    pub amount: Option<Decimal>,
    pub bank_entry_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct BankEntry {
    pub id: i64,
    pub bank_account_id: i64,
    pub date_operation: String,
    pub date_valeur: Option<String>,
    pub libelle: Option<String>,
    pub reference: Option<String>,
    pub amount: Decimal,
    pub import_id: Option<i64>,
    pub extras: BTreeMap<String, String>,
}
