use std::collections::BTreeMap;

use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use tracing::info;

use crate::error::{ReleveError, Result};
use crate::normalize::{cents, from_cents};
use crate::registry::{client_id, entity_id, entity_name};

/// Revenue budget of one entity for one year: amounts per category and month.
#[derive(Debug, Clone, Default)]
pub struct BudgetGrid {
    pub entity: String,
    pub year: i32,
    /// Category -> January..December.
    pub rows: BTreeMap<String, [Decimal; 12]>,
}

impl BudgetGrid {
    /// Total of all categories for `month` (1-12); `None` outside that range.
    pub fn month_total(&self, month: u32) -> Option<Decimal> {
        let idx = (month as usize).checked_sub(1).filter(|i| *i < 12)?;
        Some(self.rows.values().map(|m| m[idx]).sum())
    }

    pub fn category_total(&self, category: &str) -> Decimal {
        self.rows.get(category).map(|m| m.iter().sum()).unwrap_or_default()
    }

    pub fn total(&self) -> Decimal {
        self.rows.values().flat_map(|m| m.iter()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn budget_id(conn: &Connection, entity_id: i64, year: i32) -> Result<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT id FROM ca_budgets WHERE entity_id = ?1 AND year = ?2",
            params![entity_id, year],
            |row| row.get(0),
        )
        .optional()?)
}

fn ensure_budget(conn: &Connection, entity_id: i64, year: i32) -> Result<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO ca_budgets (entity_id, year) VALUES (?1, ?2)",
        params![entity_id, year],
    )?;
    Ok(conn.query_row(
        "SELECT id FROM ca_budgets WHERE entity_id = ?1 AND year = ?2",
        params![entity_id, year],
        |row| row.get(0),
    )?)
}

fn check_month(month: u32) -> Result<()> {
    if (1..=12).contains(&month) {
        Ok(())
    } else {
        Err(ReleveError::Invalid(format!("month {month} is not between 1 and 12")))
    }
}

fn category_key(category: &str) -> Result<String> {
    let key = category.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    if key.is_empty() {
        return Err(ReleveError::Invalid("budget category is empty".into()));
    }
    Ok(key)
}

pub struct BudgetLine<'a> {
    pub client: &'a str,
    pub entity: &'a str,
    pub year: i32,
    pub month: u32,
    pub category: &'a str,
    pub amount: Decimal,
}

/// Stores one cell of the grid. An existing cell is only overwritten when
/// `replace` is set.
pub fn set_budget_line(conn: &Connection, line: &BudgetLine, replace: bool) -> Result<()> {
    check_month(line.month)?;
    let category = category_key(line.category)?;
    let entity_id = entity_id(conn, client_id(conn, line.client)?, line.entity)?;

    let tx = conn.unchecked_transaction()?;
    let budget_id = ensure_budget(&tx, entity_id, line.year)?;
    let existing: Option<i64> = tx
        .query_row(
            "SELECT id FROM ca_budget_lines WHERE budget_id = ?1 AND month = ?2 AND category = ?3",
            params![budget_id, line.month, category],
            |row| row.get(0),
        )
        .optional()?;

    match existing {
        Some(_) if !replace => {
            return Err(ReleveError::BudgetLineExists {
                entity: entity_name(&tx, entity_id)?,
                year: line.year,
                month: line.month,
                category,
            })
        }
        Some(id) => {
            tx.execute(
                "UPDATE ca_budget_lines SET amount_cents = ?2 WHERE id = ?1",
                params![id, cents(line.amount)?],
            )?;
        }
        None => {
            tx.execute(
                "INSERT INTO ca_budget_lines (budget_id, month, category, amount_cents) VALUES (?1, ?2, ?3, ?4)",
                params![budget_id, line.month, category, cents(line.amount)?],
            )?;
        }
    }
    tx.commit()?;
    Ok(())
}

pub fn budget_grid(conn: &Connection, client: &str, entity: &str, year: i32) -> Result<BudgetGrid> {
    let entity_id = entity_id(conn, client_id(conn, client)?, entity)?;
    let mut grid = BudgetGrid {
        entity: entity_name(conn, entity_id)?,
        year,
        rows: BTreeMap::new(),
    };
    let Some(budget_id) = budget_id(conn, entity_id, year)? else {
        return Ok(grid);
    };

    let mut stmt = conn.prepare("SELECT month, category, amount_cents FROM ca_budget_lines WHERE budget_id = ?1")?;
    let lines = stmt
        .query_map([budget_id], |row| {
            Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    for (month, category, cents) in lines {
        let months = grid.rows.entry(category).or_insert([Decimal::ZERO; 12]);
        months[month as usize - 1] += from_cents(cents);
    }
    Ok(grid)
}

/// Seeds `to_year` from `from_year`, every amount scaled by `growth_pct`
/// percent and rounded to the cent. Returns the number of lines written.
pub fn copy_budget(
    conn: &Connection,
    client: &str,
    entity: &str,
    from_year: i32,
    to_year: i32,
    growth_pct: Decimal,
) -> Result<usize> {
    if from_year == to_year {
        return Err(ReleveError::Invalid("source and target years are the same".into()));
    }
    let source = budget_grid(conn, client, entity, from_year)?;
    if source.is_empty() {
        return Err(ReleveError::Invalid(format!("no budget {from_year} for {}", source.entity)));
    }
    let target = budget_grid(conn, client, entity, to_year)?;
    if !target.is_empty() {
        return Err(ReleveError::BudgetNotEmpty {
            entity: target.entity,
            year: to_year,
        });
    }

    let factor = Decimal::ONE + growth_pct / Decimal::ONE_HUNDRED;
    let entity_id = entity_id(conn, client_id(conn, client)?, entity)?;
    let tx = conn.unchecked_transaction()?;
    let budget_id = ensure_budget(&tx, entity_id, to_year)?;
    let mut written = 0;
    for (category, months) in &source.rows {
        for (i, amount) in months.iter().enumerate() {
            if amount.is_zero() {
                continue;
            }
            tx.execute(
                "INSERT INTO ca_budget_lines (budget_id, month, category, amount_cents) VALUES (?1, ?2, ?3, ?4)",
                params![budget_id, i as u32 + 1, category, cents(*amount * factor)?],
            )?;
            written += 1;
        }
    }
    tx.commit()?;
    info!(entity, from_year, to_year, %growth_pct, lines = written, "budget copied");
    Ok(written)
}

pub fn delete_budget_line(
    conn: &Connection,
    client: &str,
    entity: &str,
    year: i32,
    month: u32,
    category: &str,
) -> Result<bool> {
    check_month(month)?;
    let category = category_key(category)?;
    let entity_id = entity_id(conn, client_id(conn, client)?, entity)?;
    let Some(budget_id) = budget_id(conn, entity_id, year)? else {
        return Ok(false);
    };
    let deleted = conn.execute(
        "DELETE FROM ca_budget_lines WHERE budget_id = ?1 AND month = ?2 AND category = ?3",
        params![budget_id, month, category],
    )?;
    Ok(deleted > 0)
}
