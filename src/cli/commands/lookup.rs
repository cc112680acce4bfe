//! Dedup record lookup.

use console::style;

use crate::config::Settings;
use crate::extract::fingerprint;
use crate::repository::{DedupStore, SqliteDedupStore};

pub async fn cmd_lookup(settings: &Settings, value: &str, is_text: bool) -> anyhow::Result<()> {
    let key = if is_text {
        match fingerprint(value) {
            Some(fp) => fp,
            None => anyhow::bail!("Empty text has no fingerprint"),
        }
    } else {
        value.trim().to_lowercase()
    };

    let db_path = settings.database_path();
    if !db_path.exists() {
        anyhow::bail!(
            "No dedup database at {}; run `flatwatch init` first",
            db_path.display()
        );
    }
    let store = SqliteDedupStore::open(&db_path).await?;

    match store.lookup(&key).await? {
        Some(record) => {
            println!("{} {}", style("✓").green(), record.fingerprint);
            println!("  first seen: {}", record.first_seen);
            println!("  link:       {}", record.link);
            if let Some(title) = record.title {
                println!("  title:      {}", title);
            }
        }
        None => println!("{} No record for {}", style("✗").red(), key),
    }
    Ok(())
}
