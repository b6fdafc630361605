use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS clients (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS entities (
    id INTEGER PRIMARY KEY,
    client_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    code TEXT,
    UNIQUE (client_id, name),
    FOREIGN KEY (client_id) REFERENCES clients(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS bank_accounts (
    id INTEGER PRIMARY KEY,
    client_id INTEGER NOT NULL,
    entity_id INTEGER,
    label TEXT NOT NULL,
    bank_name TEXT,
    iban TEXT,
    account_number TEXT,
    currency TEXT DEFAULT 'EUR',
    is_active INTEGER DEFAULT 1,
    UNIQUE (client_id, label),
    FOREIGN KEY (client_id) REFERENCES clients(id) ON DELETE CASCADE,
    FOREIGN KEY (entity_id) REFERENCES entities(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS bank_formats (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    descriptor TEXT NOT NULL,
    delimiter TEXT,
    skip_rows INTEGER DEFAULT 0,
    has_header INTEGER DEFAULT 1,
    date_order TEXT DEFAULT 'dmy',
    sheet TEXT
);

CREATE TABLE IF NOT EXISTS imports (
    id INTEGER PRIMARY KEY,
    client_id INTEGER NOT NULL,
    format_id INTEGER NOT NULL,
    bank_account_id INTEGER,
    file_name TEXT NOT NULL,
    checksum TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'PENDING',
    line_count INTEGER DEFAULT 0,
    imported_count INTEGER DEFAULT 0,
    duplicate_count INTEGER DEFAULT 0,
    error_count INTEGER DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now')),
    UNIQUE (client_id, file_name),
    FOREIGN KEY (client_id) REFERENCES clients(id),
    FOREIGN KEY (format_id) REFERENCES bank_formats(id),
    FOREIGN KEY (bank_account_id) REFERENCES bank_accounts(id)
);

CREATE TABLE IF NOT EXISTS import_lines (
    id INTEGER PRIMARY KEY,
    import_id INTEGER NOT NULL,
    line_number INTEGER NOT NULL,
    raw TEXT NOT NULL,
    date_operation TEXT,
    date_valeur TEXT,
    libelle TEXT,
    reference TEXT,
    amount_cents INTEGER,
    account_ref TEXT,
    extras TEXT,
    status TEXT NOT NULL,
    message TEXT,
    bank_entry_id INTEGER,
    UNIQUE (import_id, line_number),
    FOREIGN KEY (import_id) REFERENCES imports(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS bank_entries (
    id INTEGER PRIMARY KEY,
    bank_account_id INTEGER NOT NULL,
    import_id INTEGER,
    date_operation TEXT NOT NULL,
    date_valeur TEXT,
    libelle TEXT,
    reference TEXT,
    amount_cents INTEGER NOT NULL,
    extras TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (bank_account_id) REFERENCES bank_accounts(id),
    FOREIGN KEY (import_id) REFERENCES imports(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_bank_entries_lookup
    ON bank_entries (bank_account_id, date_operation, amount_cents);

CREATE TABLE IF NOT EXISTS cash_closures (
    id INTEGER PRIMARY KEY,
    entity_id INTEGER NOT NULL,
    closure_date TEXT NOT NULL,
    notes TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    UNIQUE (entity_id, closure_date),
    FOREIGN KEY (entity_id) REFERENCES entities(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS cash_closure_details (
    id INTEGER PRIMARY KEY,
    closure_id INTEGER NOT NULL,
    payment_mode TEXT NOT NULL,
    expected_cents INTEGER NOT NULL,
    counted_cents INTEGER NOT NULL,
    UNIQUE (closure_id, payment_mode),
    FOREIGN KEY (closure_id) REFERENCES cash_closures(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS ca_budgets (
    id INTEGER PRIMARY KEY,
    entity_id INTEGER NOT NULL,
    year INTEGER NOT NULL,
    UNIQUE (entity_id, year),
    FOREIGN KEY (entity_id) REFERENCES entities(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS ca_budget_lines (
    id INTEGER PRIMARY KEY,
    budget_id INTEGER NOT NULL,
    month INTEGER NOT NULL CHECK (month BETWEEN 1 AND 12),
    category TEXT NOT NULL,
    amount_cents INTEGER NOT NULL,
    UNIQUE (budget_id, month, category),
    FOREIGN KEY (budget_id) REFERENCES ca_budgets(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS personnel (
    id INTEGER PRIMARY KEY,
    client_id INTEGER NOT NULL,
    last_name TEXT NOT NULL,
    first_name TEXT NOT NULL,
    job_title TEXT,
    FOREIGN KEY (client_id) REFERENCES clients(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS contracts (
    id INTEGER PRIMARY KEY,
    personnel_id INTEGER NOT NULL,
    contract_type TEXT NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT,
    monthly_gross_cents INTEGER NOT NULL,
    employer_rate TEXT NOT NULL,
    weekly_hours TEXT,
    FOREIGN KEY (personnel_id) REFERENCES personnel(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS affectations (
    id INTEGER PRIMARY KEY,
    contract_id INTEGER NOT NULL,
    entity_id INTEGER NOT NULL,
    share_pct TEXT NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT,
    FOREIGN KEY (contract_id) REFERENCES contracts(id) ON DELETE CASCADE,
    FOREIGN KEY (entity_id) REFERENCES entities(id) ON DELETE CASCADE
);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Opens the database and makes sure the schema exists.
pub fn open(db_path: &Path) -> Result<Connection> {
    if let Some(dir) = db_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let conn = get_connection(db_path)?;
    init_db(&conn)?;
    Ok(conn)
}
