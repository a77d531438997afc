//! Server command implementation

use std::path::Path;

use anyhow::{Context, Result};

use super::{load_reference, open_db};

pub async fn cmd_serve(db_path: &Path, config: Option<&Path>, host: &str, port: u16) -> Result<()> {
    println!("🚀 Starting treasury web server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);

    let db = open_db(db_path)?;
    let reference = load_reference(config)?;

    treasury_server::serve(db, reference, host, port)
        .await
        .context("Server error")
}
