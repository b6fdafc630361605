use comfy_table::{Cell, CellAlignment, Table};
use rust_decimal::Decimal;

use crate::budget::{self, BudgetLine};
use crate::cli::open_db;
use crate::error::Result;
use crate::fmt::{amount, money, percent};
use crate::settings::Settings;

const MONTHS: [&str; 12] = [
    "Jan", "Fév", "Mar", "Avr", "Mai", "Juin", "Juil", "Aoû", "Sep", "Oct", "Nov", "Déc",
];

pub fn set(settings: &Settings, line: &BudgetLine, replace: bool) -> Result<()> {
    let conn = open_db(settings)?;
    budget::set_budget_line(&conn, line, replace)?;
    println!(
        "{} {}-{:02} {}: {}",
        line.entity,
        line.year,
        line.month,
        line.category,
        money(line.amount)
    );
    Ok(())
}

pub fn show(settings: &Settings, client: &str, entity: &str, year: i32) -> Result<()> {
    let conn = open_db(settings)?;
    let grid = budget::budget_grid(&conn, client, entity, year)?;
    if grid.is_empty() {
        println!("No budget {year} for {}.", grid.entity);
        return Ok(());
    }

    let mut table = Table::new();
    let mut header = vec!["Category"];
    header.extend(MONTHS);
    header.push("Total");
    table.set_header(header);

    let right = |s: String| Cell::new(s).set_alignment(CellAlignment::Right);
    for (category, months) in &grid.rows {
        let mut row = vec![Cell::new(category)];
        row.extend(months.iter().map(|m| right(amount(*m))));
        row.push(right(amount(grid.category_total(category))));
        table.add_row(row);
    }
    let mut totals = vec![Cell::new("Total")];
    totals.extend((1..=12).map(|m| right(amount(grid.month_total(m).unwrap_or_default()))));
    totals.push(right(amount(grid.total())));
    table.add_row(totals);

    println!("CA budget {year} - {}\n{table}", grid.entity);
    Ok(())
}

pub fn copy(settings: &Settings, client: &str, entity: &str, from: i32, to: i32, growth: Decimal) -> Result<()> {
    let conn = open_db(settings)?;
    let written = budget::copy_budget(&conn, client, entity, from, to, growth)?;
    println!("Copied {written} lines from {from} to {to} ({})", percent(growth));
    Ok(())
}

pub fn delete(settings: &Settings, client: &str, entity: &str, year: i32, month: u32, category: &str) -> Result<()> {
    let conn = open_db(settings)?;
    if budget::delete_budget_line(&conn, client, entity, year, month, category)? {
        println!("Deleted {entity} {year}-{month:02} {category}");
    } else {
        println!("No budget line {entity} {year}-{month:02} {category}");
    }
    Ok(())
}
