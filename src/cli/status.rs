use crate::db::get_connection;
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::settings::Settings;

pub fn run(settings: &Settings) -> Result<()> {
    let db_path = settings.db_path();

    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());
    println!("Client:     {}", settings.default_client.as_deref().unwrap_or("(not set)"));

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `releve init` to set up.");
        return Ok(());
    }

    let size = std::fs::metadata(&db_path)?.len();
    println!("DB size:    {}", format_bytes(size));

    let conn = get_connection(&db_path)?;
    let count = |table: &str| -> Result<i64> {
        Ok(conn.query_row(&format!("SELECT count(*) FROM {table}"), [], |r| r.get(0))?)
    };
    let flagged: i64 = conn.query_row(
        "SELECT count(*) FROM import_lines WHERE status = 'ERROR'",
        [],
        |r| r.get(0),
    )?;

    println!();
    println!("Clients:       {}", count("clients")?);
    println!("Entities:      {}", count("entities")?);
    println!("Bank accounts: {}", count("bank_accounts")?);
    println!("Formats:       {}", count("bank_formats")?);
    println!("Imports:       {}", count("imports")?);
    println!("Entries:       {}", count("bank_entries")?);
    println!("Line errors:   {flagged}");
    println!("Closures:      {}", count("cash_closures")?);
    println!("Staff:         {}", count("personnel")?);
    Ok(())
}
