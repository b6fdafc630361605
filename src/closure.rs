use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use tracing::info;

use crate::error::{ReleveError, Result};
use crate::normalize::{cents, from_cents, parse_amount};
use crate::registry::{client_id, entity_id, entity_name};

/// Register total and counted total for one payment mode (cash, card,
/// meal vouchers...).
#[derive(Debug, Clone, PartialEq)]
pub struct ModeAmounts {
    pub mode: String,
    pub expected: Decimal,
    pub counted: Decimal,
}

/// Parses `mode:expected:counted`, e.g. `especes:812,40:810,00`.
impl FromStr for ModeAmounts {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        let [mode, expected, counted] = parts.as_slice() else {
            return Err(format!("'{s}' should read mode:expected:counted"));
        };
        if mode.is_empty() {
            return Err(format!("'{s}' has no payment mode"));
        }
        let amount = |v: &str| parse_amount(v, None).ok_or_else(|| format!("'{v}' is not an amount"));
        Ok(Self {
            mode: mode.to_lowercase(),
            expected: amount(expected)?,
            counted: amount(counted)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosureStatus {
    Balanced,
    Discrepancy,
}

impl fmt::Display for ClosureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Balanced => "BALANCED",
            Self::Discrepancy => "DISCREPANCY",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModeGap {
    pub mode: String,
    pub expected: Decimal,
    pub counted: Decimal,
    pub gap: Decimal,
}

#[derive(Debug, Clone)]
pub struct ClosureReport {
    pub id: i64,
    pub entity: String,
    pub date: NaiveDate,
    pub notes: Option<String>,
    pub modes: Vec<ModeGap>,
    pub expected: Decimal,
    pub counted: Decimal,
    pub gap: Decimal,
    pub status: ClosureStatus,
}

#[derive(Debug, Clone)]
pub struct ClosureSummary {
    pub id: i64,
    pub date: String,
    pub expected: Decimal,
    pub counted: Decimal,
    pub gap: Decimal,
}

pub fn record_closure(
    conn: &Connection,
    client: &str,
    entity: &str,
    date: NaiveDate,
    details: &[ModeAmounts],
    notes: Option<&str>,
) -> Result<i64> {
    let entity_id = entity_id(conn, client_id(conn, client)?, entity)?;
    if details.is_empty() {
        return Err(ReleveError::Invalid("a closure needs at least one payment mode".into()));
    }
    for (i, d) in details.iter().enumerate() {
        if details[..i].iter().any(|o| o.mode == d.mode) {
            return Err(ReleveError::Invalid(format!("payment mode '{}' given twice", d.mode)));
        }
    }

    let iso = date.format("%Y-%m-%d").to_string();
    let exists: bool = conn
        .prepare("SELECT 1 FROM cash_closures WHERE entity_id = ?1 AND closure_date = ?2")?
        .exists(params![entity_id, iso])?;
    if exists {
        return Err(ReleveError::ClosureExists {
            entity: entity.to_string(),
            date: iso,
        });
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO cash_closures (entity_id, closure_date, notes) VALUES (?1, ?2, ?3)",
        params![entity_id, iso, notes],
    )?;
    let closure_id = tx.last_insert_rowid();
    for d in details {
        tx.execute(
            "INSERT INTO cash_closure_details (closure_id, payment_mode, expected_cents, counted_cents) \
             VALUES (?1, ?2, ?3, ?4)",
            params![closure_id, d.mode, cents(d.expected)?, cents(d.counted)?],
        )?;
    }
    tx.commit()?;
    info!(closure_id, entity, date = %iso, modes = details.len(), "closure recorded");
    Ok(closure_id)
}

/// Gap per payment mode is `counted - expected`; the closure balances
/// when the total gap stays within `tolerance`.
pub fn closure_report(conn: &Connection, closure_id: i64, tolerance: Decimal) -> Result<ClosureReport> {
    let (entity_id, date, notes): (i64, String, Option<String>) = conn
        .query_row(
            "SELECT entity_id, closure_date, notes FROM cash_closures WHERE id = ?1",
            [closure_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?
        .ok_or(ReleveError::UnknownClosure(closure_id))?;

    let mut stmt = conn.prepare(
        "SELECT payment_mode, expected_cents, counted_cents FROM cash_closure_details \
         WHERE closure_id = ?1 ORDER BY payment_mode",
    )?;
    let modes = stmt
        .query_map([closure_id], |row| {
            let expected = from_cents(row.get(1)?);
            let counted = from_cents(row.get(2)?);
            Ok(ModeGap {
                mode: row.get(0)?,
                expected,
                counted,
                gap: counted - expected,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let expected: Decimal = modes.iter().map(|m| m.expected).sum();
    let counted: Decimal = modes.iter().map(|m| m.counted).sum();
    let gap = counted - expected;
    let status = if gap.abs() <= tolerance.abs() {
        ClosureStatus::Balanced
    } else {
        ClosureStatus::Discrepancy
    };

    Ok(ClosureReport {
        id: closure_id,
        entity: entity_name(conn, entity_id)?,
        date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .map_err(|_| ReleveError::Invalid(format!("closure {closure_id} has an unreadable date '{date}'")))?,
        notes,
        modes,
        expected,
        counted,
        gap,
        status,
    })
}

/// Closures of an entity, optionally limited to one `YYYY-MM` month.
pub fn list_closures(
    conn: &Connection,
    client: &str,
    entity: &str,
    month: Option<&str>,
) -> Result<Vec<ClosureSummary>> {
    let entity_id = entity_id(conn, client_id(conn, client)?, entity)?;
    let mut stmt = conn.prepare(
        "SELECT c.id, c.closure_date, COALESCE(SUM(d.expected_cents), 0), COALESCE(SUM(d.counted_cents), 0) \
         FROM cash_closures c LEFT JOIN cash_closure_details d ON d.closure_id = c.id \
         WHERE c.entity_id = ?1 AND (?2 IS NULL OR substr(c.closure_date, 1, 7) = ?2) \
         GROUP BY c.id ORDER BY c.closure_date",
    )?;
    let rows = stmt
        .query_map(params![entity_id, month], |row| {
            let expected = from_cents(row.get(2)?);
            let counted = from_cents(row.get(3)?);
            Ok(ClosureSummary {
                id: row.get(0)?,
                date: row.get(1)?,
                expected,
                counted,
                gap: counted - expected,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn delete_closure(conn: &Connection, closure_id: i64) -> Result<()> {
    let deleted = conn.execute("DELETE FROM cash_closures WHERE id = ?1", [closure_id])?;
    if deleted == 0 {
        return Err(ReleveError::UnknownClosure(closure_id));
    }
    info!(closure_id, "closure deleted");
    Ok(())
}
