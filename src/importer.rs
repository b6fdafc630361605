use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::dedup::{find_duplicate, EntryKey};
use crate::descriptor::Descriptor;
use crate::error::{ReleveError, Result};
use crate::matcher::match_account;
use crate::models::{
    BankAccount, BankEntry, BankFormat, ImportLine, ImportRecord, ImportStatus, LineStatus, ParsedLine, RawRow,
};
use crate::normalize::{cents, from_cents};
use crate::parser::{parse_row, LineError};
use crate::reader::read_rows;
use crate::registry::{client_accounts, client_id, find_account, load_format, load_format_by_id};
use crate::settings::Settings;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

/// Extra columns as stored on lines and entries; `None` when there are none.
fn extras_json(extras: &BTreeMap<String, String>) -> Result<Option<String>> {
    if extras.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(extras)?))
}

fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_iso(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub import_id: Option<i64>,
    pub lines: usize,
    pub imported: usize,
    pub duplicates: usize,
    pub errors: usize,
    pub pending: usize,
    pub duplicate_file: bool,
}

impl ImportSummary {
    pub fn status(&self) -> ImportStatus {
        if self.pending > 0 {
            ImportStatus::Pending
        } else if self.errors == 0 {
            ImportStatus::Done
        } else if self.imported + self.duplicates == 0 {
            ImportStatus::Failed
        } else {
            ImportStatus::Partial
        }
    }
}

// ---------------------------------------------------------------------------
// import_file
// ---------------------------------------------------------------------------

pub struct ImportRequest<'a> {
    pub client: &'a str,
    pub file_path: &'a Path,
    pub format: &'a str,
    /// Account used for rows that carry no account reference.
    pub default_account: Option<&'a str>,
}

pub fn import_file(conn: &Connection, request: &ImportRequest, settings: &Settings) -> Result<ImportSummary> {
    let client_id = client_id(conn, request.client)?;
    let format = load_format(conn, request.format)?;
    let descriptor = Descriptor::parse(&format.descriptor)?;
    let default_account = request
        .default_account
        .map(|label| find_account(conn, client_id, label))
        .transpose()?;

    let file_name = request
        .file_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let checksum = compute_checksum(request.file_path)?;
    {
        let mut stmt = conn.prepare(
            "SELECT 1 FROM imports WHERE client_id = ?1 AND (file_name = ?2 OR checksum = ?3)",
        )?;
        if stmt.exists(params![client_id, file_name, checksum])? {
            info!(file = %file_name, "file already imported for this client");
            return Ok(ImportSummary {
                duplicate_file: true,
                ..ImportSummary::default()
            });
        }
    }

    let rows = read_rows(request.file_path, &format)?;

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO imports (client_id, format_id, bank_account_id, file_name, checksum, line_count) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            client_id,
            format.id,
            default_account.as_ref().map(|a| a.id),
            file_name,
            checksum,
            rows.len() as i64,
        ],
    )?;
    let import_id = tx.last_insert_rowid();
    info!(import_id, file = %file_name, rows = rows.len(), format = %format.name, "import batch created");

    for raw in &rows {
        store_line(&tx, import_id, raw, parse_row(&descriptor, &format, raw))?;
    }
    tx.commit()?;

    reconcile_import(conn, import_id, settings)
}

fn store_line(
    conn: &Connection,
    import_id: i64,
    raw: &RawRow,
    parsed: std::result::Result<ParsedLine, LineError>,
) -> Result<()> {
    let raw_json = serde_json::to_string(&raw.cells)?;
    match parsed {
        Ok(line) => {
            conn.execute(
                "INSERT INTO import_lines (import_id, line_number, raw, date_operation, date_valeur, libelle, \
                 reference, amount_cents, account_ref, extras, status) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 'PENDING')",
                params![
                    import_id,
                    raw.line as i64,
                    raw_json,
                    iso(line.date_operation),
                    line.date_valeur.map(iso),
                    line.libelle,
                    line.reference,
                    cents(line.amount)?,
                    line.account_ref,
                    extras_json(&line.extras)?,
                ],
            )?;
        }
        Err(e) => {
            warn!(import_id, line = raw.line, error = %e, "line flagged");
            conn.execute(
                "INSERT INTO import_lines (import_id, line_number, raw, status, message) \
                 VALUES (?1, ?2, ?3, 'ERROR', ?4)",
                params![import_id, raw.line as i64, raw_json, e.to_string()],
            )?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// reconcile_import
// ---------------------------------------------------------------------------

struct PendingLine {
    id: i64,
    line_number: i64,
    date_operation: String,
    date_valeur: Option<String>,
    libelle: Option<String>,
    reference: Option<String>,
    amount_cents: i64,
    account_ref: Option<String>,
    extras: Option<String>,
}

fn load_import(conn: &Connection, import_id: i64) -> Result<(i64, i64, Option<i64>)> {
    conn.query_row(
        "SELECT client_id, format_id, bank_account_id FROM imports WHERE id = ?1",
        [import_id],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )
    .optional()?
    .ok_or(ReleveError::UnknownImport(import_id))
}

fn set_line_error(conn: &Connection, line_id: i64, message: &str) -> Result<()> {
    conn.execute(
        "UPDATE import_lines SET status = 'ERROR', message = ?2, bank_entry_id = NULL WHERE id = ?1",
        params![line_id, message],
    )?;
    Ok(())
}

/// Gives flagged lines another parse, e.g. after the format was fixed.
fn reparse_errors(conn: &Connection, import_id: i64, format: &BankFormat, descriptor: &Descriptor) -> Result<()> {
    let flagged: Vec<(i64, i64, String)> = conn
        .prepare("SELECT id, line_number, raw FROM import_lines WHERE import_id = ?1 AND status = 'ERROR'")?
        .query_map([import_id], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for (id, line_number, raw_json) in flagged {
        let cells: Vec<String> = serde_json::from_str(&raw_json)?;
        let raw = RawRow {
            line: line_number as usize,
            cells,
        };
        match parse_row(descriptor, format, &raw) {
            Ok(line) => {
                conn.execute(
                    "UPDATE import_lines SET status = 'PENDING', message = NULL, date_operation = ?2, \
                     date_valeur = ?3, libelle = ?4, reference = ?5, amount_cents = ?6, account_ref = ?7, \
                     extras = ?8 WHERE id = ?1",
                    params![
                        id,
                        iso(line.date_operation),
                        line.date_valeur.map(iso),
                        line.libelle,
                        line.reference,
                        cents(line.amount)?,
                        line.account_ref,
                        extras_json(&line.extras)?,
                    ],
                )?;
            }
            Err(e) => set_line_error(conn, id, &e.to_string())?,
        }
    }
    Ok(())
}

fn resolve_account(
    line: &PendingLine,
    accounts: &[BankAccount],
    default_account: Option<i64>,
    settings: &Settings,
) -> std::result::Result<i64, String> {
    match &line.account_ref {
        Some(reference) => match match_account(reference, accounts, settings.account_suffix_digits) {
            Ok(m) => {
                debug!(line = line.line_number, account_id = m.account_id, by = %m.kind, "account matched");
                Ok(m.account_id)
            }
            Err(e) => Err(e.to_string()),
        },
        None => default_account
            .ok_or_else(|| "no account reference on the line and no default account for the import".to_string()),
    }
}

/// Turns every pending line of a batch into a ledger entry, a duplicate or
/// a flagged error. Lines already imported or recognised as duplicates are
/// left alone, so running it twice is harmless.
pub fn reconcile_import(conn: &Connection, import_id: i64, settings: &Settings) -> Result<ImportSummary> {
    let (client_id, format_id, default_account) = load_import(conn, import_id)?;
    let format = load_format_by_id(conn, format_id)?;
    let descriptor = Descriptor::parse(&format.descriptor)?;
    let accounts = client_accounts(conn, client_id)?;

    let tx = conn.unchecked_transaction()?;
    reparse_errors(&tx, import_id, &format, &descriptor)?;

    let pending: Vec<PendingLine> = tx
        .prepare(
            "SELECT id, line_number, date_operation, date_valeur, libelle, reference, amount_cents, account_ref, \
             extras FROM import_lines WHERE import_id = ?1 AND status = 'PENDING' ORDER BY line_number",
        )?
        .query_map([import_id], |row| {
            Ok(PendingLine {
                id: row.get(0)?,
                line_number: row.get(1)?,
                date_operation: row.get(2)?,
                date_valeur: row.get(3)?,
                libelle: row.get(4)?,
                reference: row.get(5)?,
                amount_cents: row.get(6)?,
                account_ref: row.get(7)?,
                extras: row.get(8)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for line in &pending {
        let account_id = match resolve_account(line, &accounts, default_account, settings) {
            Ok(id) => id,
            Err(message) => {
                warn!(import_id, line = line.line_number, %message, "line flagged");
                set_line_error(&tx, line.id, &message)?;
                continue;
            }
        };
        let Some(date_operation) = parse_iso(&line.date_operation) else {
            set_line_error(&tx, line.id, "stored operation date is unreadable")?;
            continue;
        };
        let key = EntryKey {
            bank_account_id: account_id,
            date_operation,
            amount: from_cents(line.amount_cents),
            date_valeur: line.date_valeur.as_deref().and_then(parse_iso),
            libelle: line.libelle.clone(),
            reference: line.reference.clone(),
        };

        if let Some(existing) = find_duplicate(&tx, &key, Some(import_id))? {
            debug!(line = line.line_number, entry = existing, "duplicate of existing entry");
            tx.execute(
                "UPDATE import_lines SET status = 'DUPLICATE', message = ?2, bank_entry_id = ?3 WHERE id = ?1",
                params![line.id, format!("already recorded as entry {existing}"), existing],
            )?;
            continue;
        }

        tx.execute(
            "INSERT INTO bank_entries (bank_account_id, import_id, date_operation, date_valeur, libelle, reference, \
             amount_cents, extras) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                account_id,
                import_id,
                line.date_operation,
                line.date_valeur,
                line.libelle,
                line.reference,
                line.amount_cents,
                line.extras,
            ],
        )?;
        let entry_id = tx.last_insert_rowid();
        tx.execute(
            "UPDATE import_lines SET status = 'IMPORTED', message = NULL, bank_entry_id = ?2 WHERE id = ?1",
            params![line.id, entry_id],
        )?;
    }

    let summary = refresh_counts(&tx, import_id)?;
    tx.commit()?;
    info!(
        import_id,
        imported = summary.imported,
        duplicates = summary.duplicates,
        errors = summary.errors,
        status = summary.status().key(),
        "import reconciled"
    );
    Ok(summary)
}

fn refresh_counts(conn: &Connection, import_id: i64) -> Result<ImportSummary> {
    let mut summary = ImportSummary {
        import_id: Some(import_id),
        ..ImportSummary::default()
    };
    let mut stmt = conn.prepare("SELECT status, count(*) FROM import_lines WHERE import_id = ?1 GROUP BY status")?;
    let counts = stmt
        .query_map([import_id], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    for (status, count) in counts {
        let count = count as usize;
        summary.lines += count;
        match LineStatus::from_key(&status) {
            Some(LineStatus::Imported) => summary.imported += count,
            Some(LineStatus::Duplicate) => summary.duplicates += count,
            Some(LineStatus::Error) => summary.errors += count,
            Some(LineStatus::Pending) | None => summary.pending += count,
        }
    }
    conn.execute(
        "UPDATE imports SET status = ?2, line_count = ?3, imported_count = ?4, duplicate_count = ?5, error_count = ?6 \
         WHERE id = ?1",
        params![
            import_id,
            summary.status().key(),
            summary.lines as i64,
            summary.imported as i64,
            summary.duplicates as i64,
            summary.errors as i64,
        ],
    )?;
    Ok(summary)
}

// ---------------------------------------------------------------------------
// Batches
// ---------------------------------------------------------------------------

pub fn list_imports(conn: &Connection, client: Option<&str>) -> Result<Vec<ImportRecord>> {
    let client_id = client.map(|c| client_id(conn, c)).transpose()?;
    let mut stmt = conn.prepare(
        "SELECT id, client_id, format_id, bank_account_id, file_name, status, line_count, imported_count, \
         duplicate_count, error_count, created_at FROM imports \
         WHERE ?1 IS NULL OR client_id = ?1 ORDER BY id DESC",
    )?;
    let rows = stmt
        .query_map([client_id], |row| {
            Ok(ImportRecord {
                id: row.get(0)?,
                client_id: row.get(1)?,
                format_id: row.get(2)?,
                bank_account_id: row.get(3)?,
                file_name: row.get(4)?,
                status: row.get(5)?,
                line_count: row.get(6)?,
                imported_count: row.get(7)?,
                duplicate_count: row.get(8)?,
                error_count: row.get(9)?,
                created_at: row.get(10)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn import_lines(conn: &Connection, import_id: i64, only_errors: bool) -> Result<Vec<ImportLine>> {
    load_import(conn, import_id)?;
    let mut stmt = conn.prepare(
        "SELECT id, line_number, status, message, date_operation, libelle, amount_cents, bank_entry_id \
         FROM import_lines WHERE import_id = ?1 AND (?2 = 0 OR status = 'ERROR') ORDER BY line_number",
    )?;
    let rows = stmt
        .query_map(params![import_id, only_errors], |row| {
            let status: String = row.get(2)?;
            Ok(ImportLine {
                id: row.get(0)?,
                line_number: row.get(1)?,
                status: LineStatus::from_key(&status).unwrap_or(LineStatus::Error),
                message: row.get(3)?,
                date_operation: row.get(4)?,
                libelle: row.get(5)?,
                amount: row.get::<_, Option<i64>>(6)?.map(from_cents),
                bank_entry_id: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Removes a batch, its lines and the ledger entries it created. Lines of
/// other batches that pointed at those entries as duplicates go back to
/// pending so the next reconciliation records them.
pub fn delete_import(conn: &Connection, import_id: i64) -> Result<usize> {
    load_import(conn, import_id)?;
    let tx = conn.unchecked_transaction()?;
    let released: Vec<i64> = tx
        .prepare(
            "SELECT DISTINCT import_id FROM import_lines \
             WHERE import_id <> ?1 AND bank_entry_id IN (SELECT id FROM bank_entries WHERE import_id = ?1)",
        )?
        .query_map([import_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    tx.execute(
        "UPDATE import_lines SET status = 'PENDING', message = NULL, bank_entry_id = NULL \
         WHERE import_id <> ?1 AND bank_entry_id IN (SELECT id FROM bank_entries WHERE import_id = ?1)",
        [import_id],
    )?;
    let removed = tx.execute("DELETE FROM bank_entries WHERE import_id = ?1", [import_id])?;
    tx.execute("DELETE FROM import_lines WHERE import_id = ?1", [import_id])?;
    tx.execute("DELETE FROM imports WHERE id = ?1", [import_id])?;
    for other in &released {
        refresh_counts(&tx, *other)?;
    }
    tx.commit()?;
    info!(import_id, entries = removed, "import deleted");
    Ok(removed)
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

pub struct EntryFilter<'a> {
    pub client: &'a str,
    pub account: Option<&'a str>,
    /// `YYYY-MM`
    pub month: Option<&'a str>,
    pub limit: usize,
}

/// Ledger entries of a client, newest operation first, with the label of
/// the bank account they belong to.
pub fn list_entries(conn: &Connection, filter: &EntryFilter) -> Result<Vec<(String, BankEntry)>> {
    let client_id = client_id(conn, filter.client)?;
    let account_id = filter
        .account
        .map(|label| find_account(conn, client_id, label).map(|a| a.id))
        .transpose()?;
    let mut stmt = conn.prepare(
        "SELECT a.label, e.id, e.bank_account_id, e.date_operation, e.date_valeur, e.libelle, e.reference, \
         e.amount_cents, e.import_id, e.extras FROM bank_entries e JOIN bank_accounts a ON a.id = e.bank_account_id \
         WHERE a.client_id = ?1 AND (?2 IS NULL OR a.id = ?2) \
         AND (?3 IS NULL OR substr(e.date_operation, 1, 7) = ?3) \
         ORDER BY e.date_operation DESC, e.id DESC LIMIT ?4",
    )?;
    let rows = stmt
        .query_map(
            params![client_id, account_id, filter.month, filter.limit as i64],
            |row| {
                Ok((
                    row.get(0)?,
                    BankEntry {
                        id: row.get(1)?,
                        bank_account_id: row.get(2)?,
                        date_operation: row.get(3)?,
                        date_valeur: row.get(4)?,
                        libelle: row.get(5)?,
                        reference: row.get(6)?,
                        amount: from_cents(row.get(7)?),
                        import_id: row.get(8)?,
                        extras: match row.get::<_, Option<String>>(9)? {
                            Some(json) => serde_json::from_str(&json).map_err(|e| {
                                rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e))
                            })?,
                            None => BTreeMap::new(),
                        },
                    },
                ))
            },
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Parses a file with a format without touching the database.
pub fn preview_file(
    file_path: &Path,
    format: &BankFormat,
) -> Result<Vec<(RawRow, std::result::Result<ParsedLine, LineError>)>> {
    let descriptor = Descriptor::parse(&format.descriptor)?;
    let rows = read_rows(file_path, format)?;
    Ok(rows
        .into_iter()
        .map(|raw| {
            let parsed = parse_row(&descriptor, format, &raw);
            (raw, parsed)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::test_db;
    use crate::normalize::DateOrder;
    use crate::registry::{add_bank_account, add_client, add_format, NewBankAccount, NewFormat};

    const IBAN_LYON: &str = "FR7630006000011234567890189";

    fn setup(conn: &Connection, descriptor: &str) {
        add_client(conn, "Bistro Group").unwrap();
        add_bank_account(
            conn,
            &NewBankAccount {
                client: "Bistro Group",
                label: "Lyon",
                entity: None,
                bank_name: Some("LCL"),
                iban: Some(IBAN_LYON),
                account_number: None,
            },
        )
        .unwrap();
        add_bank_account(
            conn,
            &NewBankAccount {
                client: "Bistro Group",
                label: "Paris",
                entity: None,
                bank_name: None,
                iban: None,
                account_number: Some("00098765432"),
            },
        )
        .unwrap();
        add_format(
            conn,
            &NewFormat {
                name: "std",
                descriptor,
                delimiter: Some(';'),
                skip_rows: 0,
                has_header: true,
                date_order: DateOrder::Dmy,
                sheet: None,
            },
        )
        .unwrap();
    }

    fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn run(conn: &Connection, path: &Path, default_account: Option<&str>) -> ImportSummary {
        import_file(
            conn,
            &ImportRequest {
                client: "Bistro Group",
                file_path: path,
                format: "std",
                default_account,
            },
            &Settings::default(),
        )
        .unwrap()
    }

    fn count(conn: &Connection, sql: &str) -> i64 {
        conn.query_row(sql, [], |r| r.get(0)).unwrap()
    }

    const DESC: &str = "date; libelle; debit; credit; compte";

    #[test]
    fn test_import_matches_accounts_and_flags_errors() {
        let (dir, conn) = test_db();
        setup(&conn, DESC);
        let path = write(
            dir.path(),
            "janvier.csv",
            "Date;Libelle;Debit;Credit;Compte\n\
             15/01/2024;CB METRO;12,50;;FR76 3000 6000 0112 3456 7890 189\n\
             16/01/2024;VIR CLIENT;;1 200,00;98765432\n\
             Total;;12,50;1 200,00;\n\
             17/01/2024;FRAIS;3,00;;99999999999\n",
        );
        let s = run(&conn, &path, None);
        assert_eq!(s.lines, 4);
        assert_eq!(s.imported, 2);
        assert_eq!(s.errors, 2);
        assert_eq!(s.status(), ImportStatus::Partial);
        assert_eq!(count(&conn, "SELECT count(*) FROM bank_entries"), 2);
        assert_eq!(
            count(&conn, "SELECT amount_cents FROM bank_entries WHERE libelle = 'VIR CLIENT'"),
            120000
        );

        let errors = import_lines(&conn, s.import_id.unwrap(), true).unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].line_number, 4);
        assert!(errors[0].message.as_deref().unwrap().contains("not a date"));
        assert!(errors[1].message.as_deref().unwrap().contains("no bank account matches"));
    }

    #[test]
    fn test_same_file_name_is_refused() {
        let (dir, conn) = test_db();
        setup(&conn, DESC);
        let path = write(dir.path(), "a.csv", "h\n15/01/2024;X;1,00;;98765432\n");
        assert!(!run(&conn, &path, None).duplicate_file);
        std::fs::write(&path, "h\n16/01/2024;Y;2,00;;98765432\n").unwrap();
        assert!(run(&conn, &path, None).duplicate_file);
        assert_eq!(count(&conn, "SELECT count(*) FROM imports"), 1);
    }

    #[test]
    fn test_renamed_copy_is_refused_by_checksum() {
        let (dir, conn) = test_db();
        setup(&conn, DESC);
        let content = "h\n15/01/2024;X;1,00;;98765432\n";
        run(&conn, &write(dir.path(), "a.csv", content), None);
        assert!(run(&conn, &write(dir.path(), "a (1).csv", content), None).duplicate_file);
    }

    #[test]
    fn test_overlapping_statements_yield_duplicates() {
        let (dir, conn) = test_db();
        setup(&conn, DESC);
        run(
            &conn,
            &write(dir.path(), "a.csv", "h\n15/01/2024;CB METRO;12,50;;98765432\n16/01/2024;VIR;;5,00;98765432\n"),
            None,
        );
        // Same operation, label reformatted by the bank and no value date.
        let s = run(
            &conn,
            &write(dir.path(), "b.csv", "h\n15/01/2024;cb  metro;12,50;;98765432\n18/01/2024;NEW;1,00;;98765432\n"),
            None,
        );
        assert_eq!(s.imported, 1);
        assert_eq!(s.duplicates, 1);
        assert_eq!(s.status(), ImportStatus::Done);
        assert_eq!(count(&conn, "SELECT count(*) FROM bank_entries"), 3);
    }

    #[test]
    fn test_identical_rows_within_one_file_are_kept() {
        let (dir, conn) = test_db();
        setup(&conn, DESC);
        let s = run(
            &conn,
            &write(dir.path(), "a.csv", "h\n15/01/2024;CB CAFE;2,00;;98765432\n15/01/2024;CB CAFE;2,00;;98765432\n"),
            None,
        );
        assert_eq!(s.imported, 2);
    }

    #[test]
    fn test_default_account_for_rows_without_reference() {
        let (dir, conn) = test_db();
        setup(&conn, "date; libelle; montant");
        let path = write(dir.path(), "a.csv", "h\n15/01/2024;X;-1,00\n");
        let s = run(&conn, &path, Some("Lyon"));
        assert_eq!(s.imported, 1);

        let path = write(dir.path(), "b.csv", "h\n16/01/2024;Y;-1,00\n");
        let s = run(&conn, &path, None);
        assert_eq!(s.errors, 1);
        assert_eq!(s.status(), ImportStatus::Failed);
    }

    #[test]
    fn test_reconcile_is_idempotent_and_picks_up_new_accounts() {
        let (dir, conn) = test_db();
        setup(&conn, DESC);
        let path = write(
            dir.path(),
            "a.csv",
            "h\n15/01/2024;A;1,00;;98765432\n15/01/2024;B;1,00;;FR1420041010050500013M02606\n",
        );
        let s = run(&conn, &path, None);
        let id = s.import_id.unwrap();
        assert_eq!((s.imported, s.errors), (1, 1));

        let again = reconcile_import(&conn, id, &Settings::default()).unwrap();
        assert_eq!((again.imported, again.errors), (1, 1));
        assert_eq!(count(&conn, "SELECT count(*) FROM bank_entries"), 1);

        add_bank_account(
            &conn,
            &NewBankAccount {
                client: "Bistro Group",
                label: "Nice",
                entity: None,
                bank_name: None,
                iban: Some("FR1420041010050500013M02606"),
                account_number: None,
            },
        )
        .unwrap();
        let fixed = reconcile_import(&conn, id, &Settings::default()).unwrap();
        assert_eq!((fixed.imported, fixed.errors), (2, 0));
        assert_eq!(fixed.status(), ImportStatus::Done);
        assert_eq!(count(&conn, "SELECT count(*) FROM bank_entries"), 2);
    }

    #[test]
    fn test_delete_import_releases_duplicates() {
        let (dir, conn) = test_db();
        setup(&conn, DESC);
        let first = run(&conn, &write(dir.path(), "a.csv", "h\n15/01/2024;A;1,00;;98765432\n"), None);
        let second = run(&conn, &write(dir.path(), "b.csv", "Date\n15/01/2024;A;1,00;;98765432\n"), None);
        assert_eq!(second.duplicates, 1);

        assert_eq!(delete_import(&conn, first.import_id.unwrap()).unwrap(), 1);
        let listed = list_imports(&conn, Some("Bistro Group")).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, "PENDING");
        assert_eq!(listed[0].duplicate_count, 0);

        let redo = reconcile_import(&conn, second.import_id.unwrap(), &Settings::default()).unwrap();
        assert_eq!(redo.imported, 1);
        assert_eq!(count(&conn, "SELECT count(*) FROM bank_entries"), 1);
    }

    #[test]
    fn test_extra_columns_reach_the_ledger() {
        let (dir, conn) = test_db();
        setup(&conn, "date; libelle; montant; compte; categorie");
        run(
            &conn,
            &write(dir.path(), "a.csv", "h\n15/01/2024;A;-1,00;98765432;Fournitures\n16/01/2024;B;2,00;98765432;\n"),
            None,
        );
        let entries = list_entries(&conn, &EntryFilter { client: "Bistro Group", account: None, month: None, limit: 10 }).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].1.extras.is_empty());
        assert_eq!(entries[1].1.extras["categorie"], "Fournitures");
    }

    #[test]
    fn test_preview_does_not_write() {
        let (dir, conn) = test_db();
        setup(&conn, DESC);
        let path = write(dir.path(), "a.csv", "h\n15/01/2024;A;1,00;;x\nbad;B;;;\n");
        let format = load_format(&conn, "std").unwrap();
        let preview = preview_file(&path, &format).unwrap();
        assert_eq!(preview.len(), 2);
        assert!(preview[0].1.is_ok());
        assert!(preview[1].1.is_err());
        assert_eq!(count(&conn, "SELECT count(*) FROM import_lines"), 0);
    }

    #[test]
    fn test_list_entries_filters() {
        let (dir, conn) = test_db();
        setup(&conn, DESC);
        run(
            &conn,
            &write(
                dir.path(),
                "a.csv",
                "h\n15/01/2024;A;1,00;;98765432\n03/02/2024;B;2,00;;98765432\n04/02/2024;C;;3,00;FR7630006000011234567890189\n",
            ),
            None,
        );
        let all = list_entries(&conn, &EntryFilter { client: "Bistro Group", account: None, month: None, limit: 100 }).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].1.date_operation, "2024-02-04");
        assert_eq!(all[0].0, "Lyon");

        let feb_paris = list_entries(
            &conn,
            &EntryFilter { client: "Bistro Group", account: Some("Paris"), month: Some("2024-02"), limit: 100 },
        )
        .unwrap();
        assert_eq!(feb_paris.len(), 1);
        assert_eq!(feb_paris[0].1.amount, from_cents(-200));
    }

    #[test]
    fn test_unknown_import() {
        let (_dir, conn) = test_db();
        assert!(matches!(
            reconcile_import(&conn, 42, &Settings::default()),
            Err(ReleveError::UnknownImport(42))
        ));
    }
}
