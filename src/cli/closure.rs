use chrono::NaiveDate;
use colored::Colorize;
use comfy_table::{Cell, Table};
use rust_decimal::Decimal;

use crate::cli::open_db;
use crate::closure::{self, ClosureStatus, ModeAmounts};
use crate::error::Result;
use crate::fmt::{amount, money};
use crate::settings::Settings;

pub fn record(
    settings: &Settings,
    client: &str,
    entity: &str,
    date: NaiveDate,
    modes: &[ModeAmounts],
    notes: Option<&str>,
) -> Result<()> {
    let conn = open_db(settings)?;
    let id = closure::record_closure(&conn, client, entity, date, modes, notes)?;
    println!("Recorded closure #{id} for {entity} on {date}");
    show_report(&conn, id, settings.closure_tolerance)
}

pub fn show(settings: &Settings, closure_id: i64, tolerance: Option<Decimal>) -> Result<()> {
    let conn = open_db(settings)?;
    show_report(&conn, closure_id, tolerance.unwrap_or(settings.closure_tolerance))
}

fn show_report(conn: &rusqlite::Connection, closure_id: i64, tolerance: Decimal) -> Result<()> {
    let report = closure::closure_report(conn, closure_id, tolerance)?;

    let mut table = Table::new();
    table.set_header(vec!["Mode", "Expected", "Counted", "Gap"]);
    for m in &report.modes {
        table.add_row(vec![
            Cell::new(&m.mode),
            Cell::new(amount(m.expected)),
            Cell::new(amount(m.counted)),
            Cell::new(amount(m.gap)),
        ]);
    }
    table.add_row(vec![
        Cell::new("Total"),
        Cell::new(amount(report.expected)),
        Cell::new(amount(report.counted)),
        Cell::new(amount(report.gap)),
    ]);

    println!("Closure #{} {} {}", report.id, report.entity, report.date);
    if let Some(notes) = &report.notes {
        println!("Notes: {notes}");
    }
    println!("{table}");
    match report.status {
        ClosureStatus::Balanced => println!("{}", report.status.to_string().green()),
        ClosureStatus::Discrepancy => println!(
            "{} {} (tolerance {})",
            report.status.to_string().red().bold(),
            money(report.gap),
            money(tolerance)
        ),
    }
    Ok(())
}

pub fn list(settings: &Settings, client: &str, entity: &str, month: Option<&str>) -> Result<()> {
    let conn = open_db(settings)?;
    let tolerance = settings.closure_tolerance.abs();

    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Expected", "Counted", "Gap"]);
    for c in closure::list_closures(&conn, client, entity, month)? {
        let gap = amount(c.gap);
        let gap = if c.gap.abs() > tolerance { gap.red() } else { gap.normal() };
        table.add_row(vec![
            Cell::new(c.id),
            Cell::new(c.date),
            Cell::new(amount(c.expected)),
            Cell::new(amount(c.counted)),
            Cell::new(gap),
        ]);
    }
    println!("Closures ({entity})\n{table}");
    Ok(())
}

pub fn delete(settings: &Settings, closure_id: i64) -> Result<()> {
    let conn = open_db(settings)?;
    closure::delete_closure(&conn, closure_id)?;
    println!("Deleted closure #{closure_id}");
    Ok(())
}
