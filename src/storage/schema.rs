//! Database schema and migrations.

use anyhow::Result;
use rusqlite::Connection;

pub const SCHEMA_VERSION: i64 = 2;

/// Run all pending migrations.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS executions (
            id INTEGER PRIMARY KEY,
            interface_name TEXT NOT NULL,
            integration_key TEXT NOT NULL,
            status TEXT NOT NULL
                CHECK (status IN ('SUCCESS', 'FAILED', 'WARNING', 'PENDING')),
            start_time INTEGER NOT NULL,
            end_time INTEGER,
            duration INTEGER CHECK (duration IS NULL OR duration >= 0),
            message TEXT NOT NULL DEFAULT '',
            error_details TEXT,
            severity TEXT NOT NULL DEFAULT 'LOW'
                CHECK (severity IN ('LOW', 'MEDIUM', 'HIGH', 'CRITICAL')),
            tags TEXT NOT NULL DEFAULT '[]',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_executions_name ON executions(interface_name);
        CREATE INDEX IF NOT EXISTS idx_executions_key ON executions(integration_key);
        CREATE INDEX IF NOT EXISTS idx_executions_status ON executions(status);
        CREATE INDEX IF NOT EXISTS idx_executions_start ON executions(start_time);
        CREATE INDEX IF NOT EXISTS idx_executions_duration ON executions(duration);
        CREATE INDEX IF NOT EXISTS idx_executions_severity ON executions(severity);
        CREATE INDEX IF NOT EXISTS idx_executions_created ON executions(created_at);
        CREATE INDEX IF NOT EXISTS idx_executions_start_id ON executions(start_time, id);
        CREATE INDEX IF NOT EXISTS idx_executions_start_status ON executions(start_time, status);
        CREATE INDEX IF NOT EXISTS idx_executions_name_start ON executions(interface_name, start_time);",
    )?;

    // Migration 2: full-text index over messages
    let has_fts: i64 = conn.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = 'executions_fts'",
        [],
        |row| row.get(0),
    )?;

    if has_fts == 0 {
        conn.execute_batch(
            "CREATE VIRTUAL TABLE executions_fts USING fts5(
                message,
                content = 'executions',
                content_rowid = 'id'
            );

            CREATE TRIGGER IF NOT EXISTS executions_fts_ai AFTER INSERT ON executions BEGIN
                INSERT INTO executions_fts(rowid, message) VALUES (new.id, new.message);
            END;

            CREATE TRIGGER IF NOT EXISTS executions_fts_ad AFTER DELETE ON executions BEGIN
                INSERT INTO executions_fts(executions_fts, rowid, message)
                VALUES ('delete', old.id, old.message);
            END;

            CREATE TRIGGER IF NOT EXISTS executions_fts_au AFTER UPDATE OF message ON executions BEGIN
                INSERT INTO executions_fts(executions_fts, rowid, message)
                VALUES ('delete', old.id, old.message);
                INSERT INTO executions_fts(rowid, message) VALUES (new.id, new.message);
            END;

            INSERT INTO executions_fts(executions_fts) VALUES ('rebuild');",
        )?;
    }

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [SCHEMA_VERSION],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        // Verify tables exist by querying them
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM executions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM executions_fts", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap(); // Should not error
    }

    #[test]
    fn test_fts_follows_inserts() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn.execute(
            "INSERT INTO executions
                (interface_name, integration_key, status, start_time, message, created_at, updated_at)
             VALUES ('SF_ManagerSync', 'k1', 'FAILED', 0, 'Error code 42 - socket timeout', 0, 0)",
            [],
        )
        .unwrap();

        let hits: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM executions_fts WHERE executions_fts MATCH 'timeout'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(hits, 1);
    }

    #[test]
    fn test_negative_duration_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        let res = conn.execute(
            "INSERT INTO executions
                (interface_name, integration_key, status, start_time, duration, created_at, updated_at)
             VALUES ('SF_ManagerSync', 'k1', 'SUCCESS', 0, -5, 0, 0)",
            [],
        );
        assert!(res.is_err());
    }
}
