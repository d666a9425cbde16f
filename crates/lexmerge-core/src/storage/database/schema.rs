use std::time::Duration;

use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: u32 = 2;

/// How long a statement waits on another writer before reporting BUSY.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        ",
    )?;
    Ok(())
}

pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS words (
            id          TEXT PRIMARY KEY,
            project_id  TEXT NOT NULL,
            guid        TEXT NOT NULL,
            vernacular  TEXT NOT NULL,
            body        TEXT NOT NULL,
            frontier    INTEGER NOT NULL DEFAULT 1,
            created_at  TEXT NOT NULL,
            modified_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS merge_records (
            id          TEXT PRIMARY KEY,
            project_id  TEXT NOT NULL,
            user_id     TEXT NOT NULL,
            parent_ids  TEXT NOT NULL,
            child_ids   TEXT NOT NULL,
            snapshots   TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            undone      INTEGER NOT NULL DEFAULT 0
        );
        ",
    )?;
    Ok(())
}

pub fn create_indexes(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_words_frontier   ON words(project_id, frontier);
        CREATE INDEX IF NOT EXISTS idx_words_vernacular ON words(project_id, vernacular);
        CREATE INDEX IF NOT EXISTS idx_merge_lookup     ON merge_records(project_id, parent_ids, child_ids);
        ",
    )?;
    Ok(())
}

pub fn create_review_lists(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS review_lists (
            kind        TEXT NOT NULL CHECK(kind IN ('blacklist', 'graylist')),
            project_id  TEXT NOT NULL,
            user_id     TEXT NOT NULL DEFAULT '',
            word_ids    TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            PRIMARY KEY (kind, project_id, user_id, word_ids)
        );
        ",
    )?;
    Ok(())
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    create_tables(conn)?;
    create_indexes(conn)?;
    create_review_lists(conn)?;
    Ok(())
}
