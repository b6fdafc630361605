use crate::db;
use crate::error::Result;
use crate::settings::{load_settings, save_settings, shellexpand_path};

pub fn run(data_dir: Option<String>, default_client: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }
    if default_client.is_some() {
        settings.default_client = default_client;
    }

    let db_path = settings.db_path();
    db::open(&db_path)?;
    save_settings(&settings)?;

    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());
    if let Some(client) = &settings.default_client {
        println!("Client:     {client}");
    }
    Ok(())
}
