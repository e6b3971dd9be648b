//! Database connection and operations

use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

use crate::migrations::run_migrations;
use crate::Result;

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;

        // WAL keeps policy writes from blocking concurrent readers
        let _: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

        run_migrations(&conn)?;

        tracing::debug!(path = %path.as_ref().display(), "Opened policy database");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        db.with_connection(|conn| {
            let count: i32 = conn.query_row(
                "SELECT COUNT(*) FROM permission_policies",
                [],
                |row| row.get(0),
            )?;
            assert_eq!(count, 0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let path = std::env::temp_dir().join(format!(
            "tether-storage-test-{}.db",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        {
            let db = Database::open(&path).unwrap();
            db.with_connection(|conn| {
                conn.execute(
                    "INSERT INTO permission_policies
                     (caller_origin, target_origin, actions, created_at, updated_at)
                     VALUES ('https://app.com', 'https://bank.com', '[\"navigate\"]', 'now', 'now')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();
        }

        let db = Database::open(&path).unwrap();
        let count: i32 = db
            .with_connection(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM permission_policies", [], |row| {
                    row.get(0)
                })?)
            })
            .unwrap();
        assert_eq!(count, 1);

        drop(db);
        let _ = std::fs::remove_file(&path);
    }
}
