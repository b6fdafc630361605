pub mod accounts;
pub mod backup;
pub mod budget;
pub mod closure;
pub mod entities;
pub mod formats;
pub mod hr;
pub mod import;
pub mod init;
pub mod status;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::closure::ModeAmounts;
use crate::error::Result;
use crate::normalize::{parse_amount, parse_date, DateOrder};
use crate::settings::Settings;

pub(crate) fn open_db(settings: &Settings) -> Result<Connection> {
    crate::db::open(&settings.db_path())
}

/// Amounts as typed on a French keyboard: `1 234,56`, `-12.5`, `300`.
pub(crate) fn parse_decimal_arg(raw: &str) -> std::result::Result<Decimal, String> {
    parse_amount(raw, None).ok_or_else(|| format!("'{raw}' is not an amount"))
}

/// `2024-03-31` or `31/03/2024`.
pub(crate) fn parse_date_arg(raw: &str) -> std::result::Result<NaiveDate, String> {
    parse_date(raw, DateOrder::Dmy).ok_or_else(|| format!("'{raw}' is not a date"))
}

pub(crate) fn parse_month_arg(raw: &str) -> std::result::Result<String, String> {
    NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d")
        .map(|d| d.format("%Y-%m").to_string())
        .map_err(|_| format!("'{raw}' is not a month (YYYY-MM)"))
}

fn parse_delimiter_arg(raw: &str) -> std::result::Result<char, String> {
    match raw {
        "tab" | "\\t" | "\t" => Ok('\t'),
        _ => {
            let mut chars = raw.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii() => Ok(c),
                _ => Err(format!("'{raw}' is not a single-character delimiter")),
            }
        }
    }
}

fn parse_date_order_arg(raw: &str) -> std::result::Result<DateOrder, String> {
    DateOrder::from_key(&raw.to_lowercase()).ok_or_else(|| format!("'{raw}' is not one of dmy, mdy, ymd"))
}

#[derive(Parser)]
#[command(
    name = "releve",
    version,
    about = "Back-office for restaurant groups: bank statements, cash closures, CA and HR budgets."
)]
pub struct Cli {
    /// Client to work on (default: default_client from settings)
    #[arg(long, global = true)]
    pub client: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for releve data (default: ~/Documents/releve)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Client used when --client is omitted
        #[arg(long = "default-client")]
        default_client: Option<String>,
    },
    /// Manage clients (restaurant groups).
    Clients {
        #[command(subcommand)]
        command: ClientsCommands,
    },
    /// Manage entities (sites) of a client.
    Entities {
        #[command(subcommand)]
        command: EntitiesCommands,
    },
    /// Manage bank accounts of a client.
    Accounts {
        #[command(subcommand)]
        command: AccountsCommands,
    },
    /// Manage statement file formats.
    Formats {
        #[command(subcommand)]
        command: FormatsCommands,
    },
    /// Import a bank statement (CSV or spreadsheet).
    Import {
        /// Path to the statement file
        file: String,
        /// Format name (see `releve formats list`)
        #[arg(long)]
        format: String,
        /// Bank account for rows without an account column
        #[arg(long)]
        account: Option<String>,
    },
    /// Inspect and manage import batches.
    Imports {
        #[command(subcommand)]
        command: ImportsCommands,
    },
    /// Browse ledger entries.
    Entries {
        #[command(subcommand)]
        command: EntriesCommands,
    },
    /// Cash-register closures (fermetures de caisse).
    Closure {
        #[command(subcommand)]
        command: ClosureCommands,
    },
    /// Revenue (CA) budget.
    Budget {
        #[command(subcommand)]
        command: BudgetCommands,
    },
    /// Staff, contracts and payroll projection.
    Hr {
        #[command(subcommand)]
        command: HrCommands,
    },
    /// Back up the database.
    Backup {
        /// Output path (default: <data_dir>/backups/releve-YYYYMMDD-HHMMSS.db)
        #[arg(long)]
        output: Option<String>,
    },
    /// Show current database and summary statistics.
    Status,
}

#[derive(Subcommand)]
pub enum ClientsCommands {
    /// Add a client.
    Add {
        /// Client name, e.g. 'Bistro Group'
        name: String,
    },
    /// List clients.
    List,
}

#[derive(Subcommand)]
pub enum EntitiesCommands {
    /// Add an entity (site) to the client.
    Add {
        /// Entity name, e.g. 'Bistro Lyon'
        name: String,
        /// Short site code, e.g. LYO
        #[arg(long)]
        code: Option<String>,
    },
    /// List entities (all clients unless --client is given).
    List,
}

#[derive(Subcommand)]
pub enum AccountsCommands {
    /// Add a bank account.
    Add {
        /// Account label, e.g. 'LCL Lyon'
        label: String,
        #[arg(long)]
        iban: Option<String>,
        /// Domestic account number
        #[arg(long)]
        number: Option<String>,
        /// Bank name
        #[arg(long)]
        bank: Option<String>,
        /// Entity (name or code) the account belongs to
        #[arg(long)]
        entity: Option<String>,
    },
    /// List active bank accounts.
    List,
    /// Delete a bank account (deactivated instead when it has entries).
    Delete { label: String },
}

#[derive(Subcommand)]
pub enum FormatsCommands {
    /// Register a statement format.
    Add {
        /// Format name, e.g. lcl_csv
        name: String,
        /// Column descriptor, e.g. "date; valeur; libelle; debit; credit"
        #[arg(long)]
        columns: String,
        /// Field delimiter (sniffed from the file when omitted); 'tab' for tabs
        #[arg(long, value_parser = parse_delimiter_arg)]
        delimiter: Option<char>,
        /// Rows to skip before the header
        #[arg(long = "skip-rows", default_value_t = 0)]
        skip_rows: usize,
        /// The file has no header row
        #[arg(long = "no-header")]
        no_header: bool,
        /// Day/month order of ambiguous dates: dmy, mdy, ymd
        #[arg(long = "date-order", default_value = "dmy", value_parser = parse_date_order_arg)]
        date_order: DateOrder,
        /// Spreadsheet tab to read (default: first)
        #[arg(long)]
        sheet: Option<String>,
    },
    /// List formats.
    List,
    /// Show a format's settings and columns.
    Show { name: String },
    /// Parse a file with a format without importing it.
    Check {
        name: String,
        file: String,
        /// Rows to display
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Delete a format not used by any import.
    Delete { name: String },
}

#[derive(Subcommand)]
pub enum ImportsCommands {
    /// List import batches.
    List,
    /// Show the lines of a batch.
    Show {
        id: i64,
        /// Only lines in error
        #[arg(long)]
        errors: bool,
    },
    /// Re-run parsing, matching and duplicate detection on a batch.
    Reprocess { id: i64 },
    /// Delete a batch and the entries it created.
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum EntriesCommands {
    /// List ledger entries, newest first.
    List {
        /// Bank account label
        #[arg(long)]
        account: Option<String>,
        /// Month: YYYY-MM
        #[arg(long, value_parser = parse_month_arg)]
        month: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
}

#[derive(Subcommand)]
pub enum ClosureCommands {
    /// Record the closure of a day.
    Record {
        /// Entity name or code
        entity: String,
        /// Closure date (YYYY-MM-DD or DD/MM/YYYY)
        #[arg(long, value_parser = parse_date_arg)]
        date: NaiveDate,
        /// Payment mode as mode:expected:counted, e.g. especes:812,40:810 (repeatable)
        #[arg(long = "mode", required = true)]
        modes: Vec<ModeAmounts>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Show a closure with its gaps per payment mode.
    Show {
        id: i64,
        /// Largest total gap still balanced (default: closure_tolerance setting)
        #[arg(long, value_parser = parse_decimal_arg)]
        tolerance: Option<Decimal>,
    },
    /// List closures of an entity.
    List {
        entity: String,
        /// Month: YYYY-MM
        #[arg(long, value_parser = parse_month_arg)]
        month: Option<String>,
    },
    /// Delete a closure.
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum BudgetCommands {
    /// Set the budgeted revenue of a category for a month.
    Set {
        /// Entity name or code
        entity: String,
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: u32,
        /// Revenue category, e.g. restaurant, bar, traiteur
        #[arg(long)]
        category: String,
        #[arg(allow_hyphen_values = true, value_parser = parse_decimal_arg)]
        amount: Decimal,
        /// Overwrite an existing line
        #[arg(long)]
        replace: bool,
    },
    /// Show the month x category grid of a year.
    Show {
        entity: String,
        #[arg(long)]
        year: i32,
    },
    /// Seed a year from another one.
    Copy {
        entity: String,
        #[arg(long)]
        from: i32,
        #[arg(long)]
        to: i32,
        /// Growth applied to every amount, in percent
        #[arg(long, default_value = "0", allow_hyphen_values = true, value_parser = parse_decimal_arg)]
        growth: Decimal,
    },
    /// Delete one budget line.
    Delete {
        entity: String,
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: u32,
        #[arg(long)]
        category: String,
    },
}

#[derive(Subcommand)]
pub enum HrCommands {
    /// Manage staff.
    Person {
        #[command(subcommand)]
        command: PersonCommands,
    },
    /// Manage employment contracts.
    Contract {
        #[command(subcommand)]
        command: ContractCommands,
    },
    /// Assign a share of a contract to an entity.
    Assign {
        contract: i64,
        /// Entity name or code
        entity: String,
        /// Share of the contract, in percent
        #[arg(long, value_parser = parse_decimal_arg)]
        share: Decimal,
        /// First day (default: contract start)
        #[arg(long, value_parser = parse_date_arg)]
        from: Option<NaiveDate>,
        /// Last day (default: contract end)
        #[arg(long, value_parser = parse_date_arg)]
        to: Option<NaiveDate>,
    },
    /// Project monthly payroll cost per entity for a year.
    Project {
        #[arg(long)]
        year: i32,
        /// Only this entity
        #[arg(long)]
        entity: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum PersonCommands {
    /// Add a person.
    Add {
        last_name: String,
        first_name: String,
        /// Job title, e.g. 'Chef de partie'
        #[arg(long)]
        title: Option<String>,
    },
    /// List staff of the client.
    List,
}

#[derive(Subcommand)]
pub enum ContractCommands {
    /// Add a contract to a person.
    Add {
        person: i64,
        /// Contract type: CDI, CDD, extra, apprentissage...
        #[arg(long = "type")]
        contract_type: String,
        #[arg(long, value_parser = parse_date_arg)]
        start: NaiveDate,
        #[arg(long, value_parser = parse_date_arg)]
        end: Option<NaiveDate>,
        /// Monthly gross pay
        #[arg(long, value_parser = parse_decimal_arg)]
        gross: Decimal,
        /// Employer charges, in percent of gross
        #[arg(long = "employer-rate", value_parser = parse_decimal_arg)]
        employer_rate: Decimal,
        /// Weekly hours
        #[arg(long, value_parser = parse_decimal_arg)]
        hours: Option<Decimal>,
    },
    /// List contracts of a person with their assignments.
    List { person: i64 },
}
