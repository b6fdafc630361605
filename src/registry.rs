//! Reference data: clients, their sites, bank accounts and statement formats.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::descriptor::Descriptor;
use crate::error::{ReleveError, Result};
use crate::models::{BankAccount, BankFormat, Client, Entity};
use crate::normalize::{is_valid_iban, normalize_account, DateOrder};

// ---------------------------------------------------------------------------
// Clients & entities
// ---------------------------------------------------------------------------

pub fn add_client(conn: &Connection, name: &str) -> Result<i64> {
    conn.execute("INSERT INTO clients (name) VALUES (?1)", [name])?;
    info!(client = name, "client created");
    Ok(conn.last_insert_rowid())
}

pub fn list_clients(conn: &Connection) -> Result<Vec<Client>> {
    let mut stmt = conn.prepare("SELECT id, name FROM clients ORDER BY name")?;
    let rows = stmt
        .query_map([], |row| Ok(Client { id: row.get(0)?, name: row.get(1)? }))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn client_id(conn: &Connection, name: &str) -> Result<i64> {
    conn.query_row("SELECT id FROM clients WHERE name = ?1", [name], |row| row.get(0))
        .optional()?
        .ok_or_else(|| ReleveError::UnknownClient(name.to_string()))
}

pub fn add_entity(conn: &Connection, client: &str, name: &str, code: Option<&str>) -> Result<i64> {
    let client_id = client_id(conn, client)?;
    conn.execute(
        "INSERT INTO entities (client_id, name, code) VALUES (?1, ?2, ?3)",
        params![client_id, name, code],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_entities(conn: &Connection, client: Option<&str>) -> Result<Vec<Entity>> {
    let client_id = client.map(|c| client_id(conn, c)).transpose()?;
    let mut stmt = conn.prepare(
        "SELECT id, client_id, name, code FROM entities \
         WHERE ?1 IS NULL OR client_id = ?1 ORDER BY name",
    )?;
    let rows = stmt
        .query_map([client_id], |row| {
            Ok(Entity {
                id: row.get(0)?,
                client_id: row.get(1)?,
                name: row.get(2)?,
                code: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Entities are looked up by name or by site code, within one client.
pub fn entity_id(conn: &Connection, client_id: i64, name_or_code: &str) -> Result<i64> {
    let ids: Vec<i64> = conn
        .prepare("SELECT id FROM entities WHERE client_id = ?1 AND (name = ?2 OR code = ?2)")?
        .query_map(params![client_id, name_or_code], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    match ids.as_slice() {
        [id] => Ok(*id),
        [] => Err(ReleveError::UnknownEntity(name_or_code.to_string())),
        _ => Err(ReleveError::Invalid(format!(
            "'{name_or_code}' names several entities, use the site code"
        ))),
    }
}

pub fn entity_name(conn: &Connection, id: i64) -> Result<String> {
    Ok(conn.query_row("SELECT name FROM entities WHERE id = ?1", [id], |row| row.get(0))?)
}

// ---------------------------------------------------------------------------
// Bank accounts
// ---------------------------------------------------------------------------

pub struct NewBankAccount<'a> {
    pub client: &'a str,
    pub label: &'a str,
    pub entity: Option<&'a str>,
    pub bank_name: Option<&'a str>,
    pub iban: Option<&'a str>,
    pub account_number: Option<&'a str>,
}

pub fn add_bank_account(conn: &Connection, account: &NewBankAccount) -> Result<i64> {
    let client_id = client_id(conn, account.client)?;
    let entity_id = account.entity.map(|e| entity_id(conn, client_id, e)).transpose()?;
    let iban = account.iban.map(normalize_account).filter(|s| !s.is_empty());
    if let Some(iban) = &iban {
        if !is_valid_iban(iban) {
            return Err(ReleveError::Invalid(format!("IBAN {iban} fails its checksum")));
        }
    }
    let number = account.account_number.map(normalize_account).filter(|s| !s.is_empty());
    if iban.is_none() && number.is_none() {
        return Err(ReleveError::Invalid(
            "a bank account needs an IBAN or an account number".into(),
        ));
    }
    conn.execute(
        "INSERT INTO bank_accounts (client_id, entity_id, label, bank_name, iban, account_number) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![client_id, entity_id, account.label, account.bank_name, iban, number],
    )?;
    info!(label = account.label, "bank account added");
    Ok(conn.last_insert_rowid())
}

fn account_from_row(row: &rusqlite::Row) -> rusqlite::Result<BankAccount> {
    Ok(BankAccount {
        id: row.get(0)?,
        client_id: row.get(1)?,
        entity_id: row.get(2)?,
        label: row.get(3)?,
        bank_name: row.get(4)?,
        iban: row.get(5)?,
        account_number: row.get(6)?,
    })
}

const ACCOUNT_COLUMNS: &str = "id, client_id, entity_id, label, bank_name, iban, account_number";

pub fn client_accounts(conn: &Connection, client_id: i64) -> Result<Vec<BankAccount>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM bank_accounts WHERE client_id = ?1 AND is_active = 1 ORDER BY label"
    ))?;
    let rows = stmt
        .query_map([client_id], account_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn find_account(conn: &Connection, client_id: i64, label: &str) -> Result<BankAccount> {
    conn.query_row(
        &format!("SELECT {ACCOUNT_COLUMNS} FROM bank_accounts WHERE client_id = ?1 AND label = ?2"),
        params![client_id, label],
        account_from_row,
    )
    .optional()?
    .ok_or_else(|| ReleveError::UnknownAccount(label.to_string()))
}

/// Accounts with ledger entries or imports are deactivated rather than removed.
pub fn delete_bank_account(conn: &Connection, client: &str, label: &str) -> Result<bool> {
    let account = find_account(conn, client_id(conn, client)?, label)?;
    let used: bool = conn
        .prepare_cached(
            "SELECT 1 FROM bank_entries WHERE bank_account_id = ?1 \
             UNION ALL SELECT 1 FROM imports WHERE bank_account_id = ?1",
        )?
        .exists([account.id])?;
    if used {
        conn.execute("UPDATE bank_accounts SET is_active = 0 WHERE id = ?1", [account.id])?;
        Ok(false)
    } else {
        conn.execute("DELETE FROM bank_accounts WHERE id = ?1", [account.id])?;
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Formats
// ---------------------------------------------------------------------------

pub struct NewFormat<'a> {
    pub name: &'a str,
    pub descriptor: &'a str,
    pub delimiter: Option<char>,
    pub skip_rows: usize,
    pub has_header: bool,
    pub date_order: DateOrder,
    pub sheet: Option<&'a str>,
}

/// Validates the descriptor and stores it in canonical form.
pub fn add_format(conn: &Connection, format: &NewFormat) -> Result<i64> {
    let descriptor = Descriptor::parse(format.descriptor)?;
    conn.execute(
        "INSERT INTO bank_formats (name, descriptor, delimiter, skip_rows, has_header, date_order, sheet) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            format.name,
            descriptor.to_string(),
            format.delimiter.map(|c| c.to_string()),
            format.skip_rows as i64,
            format.has_header,
            format.date_order.key(),
            format.sheet,
        ],
    )?;
    info!(format = format.name, columns = descriptor.columns.len(), "format saved");
    Ok(conn.last_insert_rowid())
}

fn format_from_row(row: &rusqlite::Row) -> rusqlite::Result<BankFormat> {
    let delimiter: Option<String> = row.get(3)?;
    let date_order: String = row.get(6)?;
    Ok(BankFormat {
        id: row.get(0)?,
        name: row.get(1)?,
        descriptor: row.get(2)?,
        delimiter: delimiter.and_then(|d| if d == "\\t" { Some('\t') } else { d.chars().next() }),
        skip_rows: row.get::<_, i64>(4)?.max(0) as usize,
        has_header: row.get(5)?,
        date_order: DateOrder::from_key(&date_order).unwrap_or_default(),
        sheet: row.get(7)?,
    })
}

const FORMAT_COLUMNS: &str = "id, name, descriptor, delimiter, skip_rows, has_header, date_order, sheet";

pub fn load_format(conn: &Connection, name: &str) -> Result<BankFormat> {
    conn.query_row(
        &format!("SELECT {FORMAT_COLUMNS} FROM bank_formats WHERE name = ?1"),
        [name],
        format_from_row,
    )
    .optional()?
    .ok_or_else(|| ReleveError::UnknownFormat(name.to_string()))
}

pub fn load_format_by_id(conn: &Connection, id: i64) -> Result<BankFormat> {
    conn.query_row(
        &format!("SELECT {FORMAT_COLUMNS} FROM bank_formats WHERE id = ?1"),
        [id],
        format_from_row,
    )
    .optional()?
    .ok_or_else(|| ReleveError::UnknownFormat(id.to_string()))
}

pub fn list_formats(conn: &Connection) -> Result<Vec<BankFormat>> {
    let mut stmt = conn.prepare(&format!("SELECT {FORMAT_COLUMNS} FROM bank_formats ORDER BY name"))?;
    let rows = stmt
        .query_map([], format_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn delete_format(conn: &Connection, name: &str) -> Result<()> {
    let format = load_format(conn, name)?;
    let used: bool = conn
        .prepare_cached("SELECT 1 FROM imports WHERE format_id = ?1")?
        .exists([format.id])?;
    if used {
        return Err(ReleveError::Invalid(format!("format '{name}' is used by existing imports")));
    }
    conn.execute("DELETE FROM bank_formats WHERE id = ?1", [format.id])?;
    Ok(())
}
