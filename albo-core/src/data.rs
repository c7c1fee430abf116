use crate::model::MappingEntry;
use albo_scanner::Discovery;
use rusqlite::{Connection, OptionalExtension, Result, params};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Durable store of confirmed (param, key) mappings plus run bookkeeping.
///
/// Writes are idempotent: a pair is keyed by (param, key) and re-inserting
/// it is a no-op, so interrupted runs can be resumed and reruns only ever
/// grow the table. A single process owns the database file at a time.
pub struct MappingStore {
    conn: Connection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanRun {
    pub id: String,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub status: String,
    pub base_url: String,
}

fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl MappingStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Optimize for frequent small write batches
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let store = MappingStore { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = MappingStore { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS scan_runs (
    id TEXT PRIMARY KEY,
    start_time INTEGER NOT NULL,
    end_time INTEGER,
    status TEXT NOT NULL CHECK(status IN ('running', 'completed', 'failed', 'cancelled')),
    base_url TEXT NOT NULL,
    configuration TEXT        -- JSON configuration used
);

CREATE TABLE IF NOT EXISTS mappings (
    param INTEGER NOT NULL,
    key INTEGER NOT NULL,
    size_bytes INTEGER,
    content_type TEXT,
    url TEXT NOT NULL,
    discovered_at INTEGER NOT NULL,
    source_run TEXT NOT NULL,

    PRIMARY KEY(param, key),
    FOREIGN KEY(source_run) REFERENCES scan_runs(id)
);

CREATE INDEX IF NOT EXISTS idx_mappings_param ON mappings(param);
CREATE INDEX IF NOT EXISTS idx_mappings_run ON mappings(source_run);
            ",
        )?;
        Ok(())
    }

    // Run management
    pub fn create_run(&self, base_url: &str, configuration: Option<&str>) -> Result<String> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let timestamp = current_timestamp();

        self.conn.execute(
            "INSERT INTO scan_runs (id, start_time, status, base_url, configuration) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![&run_id, timestamp, "running", base_url, configuration],
        )?;

        Ok(run_id)
    }

    pub fn complete_run(&self, run_id: &str) -> Result<()> {
        self.finish_run(run_id, "completed")
    }

    pub fn fail_run(&self, run_id: &str) -> Result<()> {
        self.finish_run(run_id, "failed")
    }

    pub fn cancel_run(&self, run_id: &str) -> Result<()> {
        self.finish_run(run_id, "cancelled")
    }

    fn finish_run(&self, run_id: &str, status: &str) -> Result<()> {
        let timestamp = current_timestamp();
        self.conn.execute(
            "UPDATE scan_runs SET status = ?1, end_time = ?2 WHERE id = ?3",
            params![status, timestamp, run_id],
        )?;
        Ok(())
    }

    pub fn get_run(&self, run_id: &str) -> Result<Option<ScanRun>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, start_time, end_time, status, base_url FROM scan_runs WHERE id = ?1",
        )?;

        let run = stmt
            .query_row(params![run_id], |row| {
                Ok(ScanRun {
                    id: row.get(0)?,
                    start_time: row.get(1)?,
                    end_time: row.get(2)?,
                    status: row.get(3)?,
                    base_url: row.get(4)?,
                })
            })
            .optional()?;
        Ok(run)
    }

    // Mapping operations
    /// Persists a batch of discoveries in one transaction. Pairs the store
    /// already holds are ignored, keeping the first-seen metadata and
    /// source run. Returns how many rows were actually new.
    pub fn insert_batch(
        &mut self,
        run_id: &str,
        base_url: &str,
        discoveries: &[Discovery],
    ) -> Result<usize> {
        if discoveries.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO mappings (param, key, size_bytes, content_type, url, discovered_at, source_run)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;

            for discovery in discoveries {
                let entry = MappingEntry::from_discovery(discovery, base_url, run_id);
                inserted += stmt.execute(params![
                    entry.param,
                    entry.key,
                    entry.size_bytes,
                    &entry.content_type,
                    &entry.url,
                    entry.discovered_at,
                    &entry.source_run,
                ])?;
            }
        }
        tx.commit()?;

        Ok(inserted)
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM mappings", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// All mappings, params descending, keys ascending within a param.
    pub fn load_all(&self) -> Result<Vec<MappingEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT param, key, size_bytes, content_type, url, discovered_at, source_run
             FROM mappings ORDER BY param DESC, key ASC",
        )?;

        let entries = stmt
            .query_map([], Self::row_to_entry)?
            .collect::<Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Just the (param, key) pairs, for dedup sets and seeding predictions.
    pub fn known_pairs(&self) -> Result<Vec<(i64, i64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT param, key FROM mappings ORDER BY param DESC, key ASC")?;

        let pairs = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>>>()?;
        Ok(pairs)
    }

    pub fn entries_for_run(&self, run_id: &str) -> Result<Vec<MappingEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT param, key, size_bytes, content_type, url, discovered_at, source_run
             FROM mappings WHERE source_run = ?1 ORDER BY param DESC, key ASC",
        )?;

        let entries = stmt
            .query_map(params![run_id], Self::row_to_entry)?
            .collect::<Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn row_to_entry(row: &rusqlite::Row<'_>) -> Result<MappingEntry> {
        Ok(MappingEntry {
            param: row.get(0)?,
            key: row.get(1)?,
            size_bytes: row.get(2)?,
            content_type: row.get(3)?,
            url: row.get(4)?,
            discovered_at: row.get(5)?,
            source_run: row.get(6)?,
        })
    }

    pub fn get_connection(&self) -> &Connection {
        &self.conn
    }
}
