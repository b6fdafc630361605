use comfy_table::{Cell, Table};

use crate::cli::open_db;
use crate::error::Result;
use crate::registry::{self, NewBankAccount};
use crate::settings::Settings;

pub fn add(settings: &Settings, account: &NewBankAccount) -> Result<()> {
    let conn = open_db(settings)?;
    registry::add_bank_account(&conn, account)?;
    println!("Added bank account: {}", account.label);
    Ok(())
}

pub fn list(settings: &Settings, client: &str) -> Result<()> {
    let conn = open_db(settings)?;
    let client_id = registry::client_id(&conn, client)?;
    let entities = registry::list_entities(&conn, Some(client))?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Label", "Bank", "IBAN", "Number", "Entity"]);
    for a in registry::client_accounts(&conn, client_id)? {
        let entity = a
            .entity_id
            .and_then(|id| entities.iter().find(|e| e.id == id))
            .map(|e| e.name.clone())
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(a.id),
            Cell::new(a.label),
            Cell::new(a.bank_name.unwrap_or_default()),
            Cell::new(a.iban.unwrap_or_default()),
            Cell::new(a.account_number.unwrap_or_default()),
            Cell::new(entity),
        ]);
    }
    println!("Bank accounts ({client})\n{table}");
    Ok(())
}

pub fn delete(settings: &Settings, client: &str, label: &str) -> Result<()> {
    let conn = open_db(settings)?;
    if registry::delete_bank_account(&conn, client, label)? {
        println!("Deleted bank account: {label}");
    } else {
        println!("Bank account {label} has history; deactivated instead.");
    }
    Ok(())
}
