//! SQLite-backed dedup store.
//!
//! rusqlite is synchronous, so every call runs on the blocking pool with its
//! own connection. The primary key on `fingerprint` is what makes `upsert`
//! safe across processes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use super::{parse_datetime, DedupResult, DedupStore};
use crate::models::DedupRecord;

pub struct SqliteDedupStore {
    db_path: PathBuf,
}

impl SqliteDedupStore {
    /// Open (and create if needed) the store at `db_path`.
    pub async fn open(db_path: &Path) -> DedupResult<Self> {
        let store = Self {
            db_path: db_path.to_path_buf(),
        };
        let path = store.db_path.clone();
        tokio::task::spawn_blocking(move || init_schema(&path)).await??;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    async fn with_connection<T, F>(&self, f: F) -> DedupResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> DedupResult<T> + Send + 'static,
    {
        let path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = connect(&path)?;
            f(&conn)
        })
        .await?
    }
}

fn connect(path: &Path) -> DedupResult<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(conn)
}

fn init_schema(path: &Path) -> DedupResult<()> {
    let conn = connect(path)?;
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS dedup_records (
            fingerprint TEXT PRIMARY KEY,
            link TEXT NOT NULL,
            title TEXT,
            first_seen TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_dedup_records_first_seen ON dedup_records(first_seen);
    "#,
    )?;
    Ok(())
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<DedupRecord> {
    let first_seen: String = row.get("first_seen")?;
    let first_seen = chrono::NaiveDate::parse_from_str(&first_seen, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(DedupRecord {
        fingerprint: row.get("fingerprint")?,
        link: row.get("link")?,
        title: row.get("title")?,
        first_seen,
        created_at: parse_datetime(&row.get::<_, String>("created_at")?),
    })
}

#[async_trait]
impl DedupStore for SqliteDedupStore {
    async fn lookup(&self, fingerprint: &str) -> DedupResult<Option<DedupRecord>> {
        let fingerprint = fingerprint.to_string();
        self.with_connection(move |conn| {
            let found = conn
                .query_row(
                    "SELECT * FROM dedup_records WHERE fingerprint = ?1",
                    params![fingerprint],
                    row_to_record,
                )
                .optional()?;
            Ok(found)
        })
        .await
    }

    async fn upsert(&self, record: &DedupRecord) -> DedupResult<bool> {
        let record = record.clone();
        self.with_connection(move |conn| {
            let inserted = conn.execute(
                r#"INSERT INTO dedup_records (fingerprint, link, title, first_seen, created_at)
                   VALUES (?1, ?2, ?3, ?4, ?5)
                   ON CONFLICT(fingerprint) DO NOTHING"#,
                params![
                    record.fingerprint,
                    record.link,
                    record.title,
                    record.first_seen.format("%Y-%m-%d").to_string(),
                    record.created_at.to_rfc3339(),
                ],
            )?;
            Ok(inserted == 1)
        })
        .await
    }
}
