use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::open_db;
use crate::descriptor::Descriptor;
use crate::error::Result;
use crate::fmt::amount;
use crate::importer::preview_file;
use crate::registry::{self, NewFormat};
use crate::settings::Settings;

fn show_delimiter(d: Option<char>) -> String {
    match d {
        None => "auto".to_string(),
        Some('\t') => "tab".to_string(),
        Some(c) => c.to_string(),
    }
}

pub fn add(settings: &Settings, format: &NewFormat) -> Result<()> {
    let conn = open_db(settings)?;
    registry::add_format(&conn, format)?;
    let saved = registry::load_format(&conn, format.name)?;
    println!("Added format: {}", saved.name);
    println!("Columns:    {}", saved.descriptor);
    Ok(())
}

pub fn list(settings: &Settings) -> Result<()> {
    let conn = open_db(settings)?;
    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Delimiter", "Skip", "Header", "Dates", "Columns"]);
    for f in registry::list_formats(&conn)? {
        table.add_row(vec![
            Cell::new(f.id),
            Cell::new(&f.name),
            Cell::new(show_delimiter(f.delimiter)),
            Cell::new(f.skip_rows),
            Cell::new(if f.has_header { "yes" } else { "no" }),
            Cell::new(f.date_order.key()),
            Cell::new(&f.descriptor),
        ]);
    }
    println!("Formats\n{table}");
    Ok(())
}

pub fn show(settings: &Settings, name: &str) -> Result<()> {
    let conn = open_db(settings)?;
    let format = registry::load_format(&conn, name)?;
    let descriptor = Descriptor::parse(&format.descriptor)?;

    println!("Format:     {}", format.name);
    println!("Delimiter:  {}", show_delimiter(format.delimiter));
    println!("Skip rows:  {}", format.skip_rows);
    println!("Header:     {}", if format.has_header { "yes" } else { "no" });
    println!("Dates:      {}", format.date_order.key());
    if let Some(sheet) = &format.sheet {
        println!("Sheet:      {sheet}");
    }

    let mut table = Table::new();
    table.set_header(vec!["#", "Field", "Type"]);
    for (i, column) in descriptor.columns.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(column.field.name()),
            Cell::new(column.kind.to_string()),
        ]);
    }
    println!("\n{table}");
    Ok(())
}

pub fn check(settings: &Settings, name: &str, file: &str, limit: usize) -> Result<()> {
    let conn = open_db(settings)?;
    let format = registry::load_format(&conn, name)?;
    let rows = preview_file(Path::new(file), &format)?;
    let errors = rows.iter().filter(|(_, parsed)| parsed.is_err()).count();

    let mut table = Table::new();
    table.set_header(vec!["Line", "Date", "Label", "Amount", "Account", "Problem"]);
    for (raw, parsed) in rows.iter().take(limit) {
        match parsed {
            Ok(line) => table.add_row(vec![
                Cell::new(raw.line),
                Cell::new(line.date_operation),
                Cell::new(line.libelle.as_deref().unwrap_or_default()),
                Cell::new(amount(line.amount)),
                Cell::new(line.account_ref.as_deref().unwrap_or_default()),
                Cell::new(""),
            ]),
            Err(e) => table.add_row(vec![
                Cell::new(raw.line),
                Cell::new(""),
                Cell::new(raw.cells.join(" | ")),
                Cell::new(""),
                Cell::new(""),
                Cell::new(e.to_string().red()),
            ]),
        };
    }
    println!("{table}");
    println!("{} rows, {} readable, {} in error", rows.len(), rows.len() - errors, errors);
    Ok(())
}

pub fn delete(settings: &Settings, name: &str) -> Result<()> {
    let conn = open_db(settings)?;
    registry::delete_format(&conn, name)?;
    println!("Deleted format: {name}");
    Ok(())
}
