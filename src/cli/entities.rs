use comfy_table::{Cell, Table};

use crate::cli::open_db;
use crate::error::Result;
use crate::registry;
use crate::settings::Settings;

pub fn add_client(settings: &Settings, name: &str) -> Result<()> {
    let conn = open_db(settings)?;
    registry::add_client(&conn, name)?;
    println!("Added client: {name}");
    Ok(())
}

pub fn list_clients(settings: &Settings) -> Result<()> {
    let conn = open_db(settings)?;
    let mut table = Table::new();
    table.set_header(vec!["ID", "Name"]);
    for c in registry::list_clients(&conn)? {
        table.add_row(vec![Cell::new(c.id), Cell::new(c.name)]);
    }
    println!("Clients\n{table}");
    Ok(())
}

pub fn add(settings: &Settings, client: &str, name: &str, code: Option<&str>) -> Result<()> {
    let conn = open_db(settings)?;
    registry::add_entity(&conn, client, name, code)?;
    println!("Added entity: {name} ({client})");
    Ok(())
}

pub fn list(settings: &Settings, client: Option<&str>) -> Result<()> {
    let conn = open_db(settings)?;
    let clients = registry::list_clients(&conn)?;
    let mut table = Table::new();
    table.set_header(vec!["ID", "Client", "Name", "Code"]);
    for e in registry::list_entities(&conn, client)? {
        let owner = clients
            .iter()
            .find(|c| c.id == e.client_id)
            .map(|c| c.name.clone())
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(e.id),
            Cell::new(owner),
            Cell::new(e.name),
            Cell::new(e.code.unwrap_or_default()),
        ]);
    }
    println!("Entities\n{table}");
    Ok(())
}
