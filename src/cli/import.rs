use std::path::PathBuf;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::open_db;
use crate::error::Result;
use crate::fmt::amount;
use crate::importer::{self, EntryFilter, ImportRequest, ImportSummary};
use crate::models::LineStatus;
use crate::settings::Settings;

fn print_summary(summary: &ImportSummary) {
    let status = summary.status().key();
    let status = if summary.errors > 0 { status.yellow() } else { status.green() };
    println!(
        "{} lines: {} imported, {} duplicates, {} errors [{}]",
        summary.lines, summary.imported, summary.duplicates, summary.errors, status
    );
    if summary.errors > 0 {
        if let Some(id) = summary.import_id {
            println!("See `releve imports show {id} --errors`, then `releve imports reprocess {id}`.");
        }
    }
}

pub fn run(settings: &Settings, client: &str, file: &str, format: &str, account: Option<&str>) -> Result<()> {
    let file_path = PathBuf::from(file);
    let conn = open_db(settings)?;

    let summary = importer::import_file(
        &conn,
        &ImportRequest {
            client,
            file_path: &file_path,
            format,
            default_account: account,
        },
        settings,
    )?;

    if summary.duplicate_file {
        println!("This file has already been imported for {client} (same name or checksum).");
        return Ok(());
    }
    if let Some(id) = summary.import_id {
        println!("Import #{id}");
    }
    print_summary(&summary);
    Ok(())
}

pub fn list(settings: &Settings, client: Option<&str>) -> Result<()> {
    let conn = open_db(settings)?;
    let mut table = Table::new();
    table.set_header(vec!["ID", "File", "Status", "Lines", "Imported", "Duplicates", "Errors", "Date"]);
    for r in importer::list_imports(&conn, client)? {
        table.add_row(vec![
            Cell::new(r.id),
            Cell::new(r.file_name),
            Cell::new(r.status),
            Cell::new(r.line_count),
            Cell::new(r.imported_count),
            Cell::new(r.duplicate_count),
            Cell::new(r.error_count),
            Cell::new(r.created_at),
        ]);
    }
    println!("Imports\n{table}");
    Ok(())
}

pub fn show(settings: &Settings, import_id: i64, only_errors: bool) -> Result<()> {
    let conn = open_db(settings)?;
    let lines = importer::import_lines(&conn, import_id, only_errors)?;

    let mut table = Table::new();
    table.set_header(vec!["Line", "Status", "Date", "Label", "Amount", "Message"]);
    for l in lines {
        let status = match l.status {
            LineStatus::Imported => l.status.key().green(),
            LineStatus::Duplicate => l.status.key().dimmed(),
            LineStatus::Error => l.status.key().red(),
            LineStatus::Pending => l.status.key().normal(),
        };
        table.add_row(vec![
            Cell::new(l.line_number),
            Cell::new(status),
            Cell::new(l.date_operation.unwrap_or_default()),
            Cell::new(l.libelle.unwrap_or_default()),
            Cell::new(l.amount.map(amount).unwrap_or_default()),
            Cell::new(l.message.unwrap_or_default()),
        ]);
    }
    println!("Import #{import_id}\n{table}");
    Ok(())
}

pub fn reprocess(settings: &Settings, import_id: i64) -> Result<()> {
    let conn = open_db(settings)?;
    let summary = importer::reconcile_import(&conn, import_id, settings)?;
    print_summary(&summary);
    Ok(())
}

pub fn delete(settings: &Settings, import_id: i64) -> Result<()> {
    let conn = open_db(settings)?;
    let removed = importer::delete_import(&conn, import_id)?;
    println!("Deleted import #{import_id} ({removed} entries removed)");
    Ok(())
}

pub fn entries(settings: &Settings, filter: &EntryFilter) -> Result<()> {
    let conn = open_db(settings)?;
    let mut table = Table::new();
    table.set_header(vec!["ID", "Account", "Date", "Value date", "Label", "Reference", "Amount", "Extra"]);
    for (account, e) in importer::list_entries(&conn, filter)? {
        let shown = amount(e.amount);
        let shown = if e.amount.is_sign_negative() { shown.red() } else { shown.normal() };
        table.add_row(vec![
            Cell::new(e.id),
            Cell::new(account),
            Cell::new(e.date_operation),
            Cell::new(e.date_valeur.map(|d| d.to_string()).unwrap_or_default()),
            Cell::new(e.libelle.unwrap_or_default()),
            Cell::new(e.reference.unwrap_or_default()),
            Cell::new(shown),
            Cell::new(e.extras.iter().map(|(k, v)| format!("{k}: {v}")).collect::<Vec<_>>().join("\n")),
        ]);
    }
    println!("Entries ({})\n{table}", filter.client);
    Ok(())
}
