//! Initialize command.

use console::style;

use crate::config::Settings;
use crate::repository::SqliteDedupStore;

/// Create the data directory and the dedup schema.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let store = SqliteDedupStore::open(&settings.database_path()).await?;

    println!(
        "{} Initialized flatwatch in {}",
        style("✓").green(),
        settings.data_dir.display()
    );
    println!("  Dedup database: {}", store.path().display());
    Ok(())
}
