//! Durable session entry operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbResult, TOKEN_KEY, USER_KEY};

/// Raw stored session pair. Either half may be missing if the file was
/// written by something other than [`Database::save_session`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSession {
    pub token: Option<String>,
    pub user_json: Option<String>,
}

impl Database {
    /// Write token and identity JSON in one transaction.
    pub fn save_session(&mut self, token: &str, user_json: &str) -> DbResult<()> {
        let tx = self.conn.transaction()?;
        for (key, value) in [(TOKEN_KEY, token), (USER_KEY, user_json)] {
            tx.execute(
                r#"
                INSERT INTO session_entries (key, value, updated_at)
                VALUES (?1, ?2, datetime('now'))
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at
                "#,
                params![key, value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Read both session entries.
    pub fn load_session(&self) -> DbResult<StoredSession> {
        Ok(StoredSession {
            token: self.get_entry(TOKEN_KEY)?,
            user_json: self.get_entry(USER_KEY)?,
        })
    }

    /// Remove both session entries. Returns whether anything was removed.
    pub fn clear_session(&mut self) -> DbResult<bool> {
        let tx = self.conn.transaction()?;
        let rows_affected = tx.execute(
            "DELETE FROM session_entries WHERE key IN (?1, ?2)",
            params![TOKEN_KEY, USER_KEY],
        )?;
        tx.commit()?;
        Ok(rows_affected > 0)
    }

    fn get_entry(&self, key: &str) -> DbResult<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM session_entries WHERE key = ?",
                [key],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_session() {
        let mut db = Database::open_in_memory().unwrap();
        db.save_session("tok-1", r#"{"email":"a@b.c","role":"DOCTOR"}"#)
            .unwrap();

        let stored = db.load_session().unwrap();
        assert_eq!(stored.token.as_deref(), Some("tok-1"));
        assert!(stored.user_json.unwrap().contains("DOCTOR"));
    }

    #[test]
    fn test_save_overwrites() {
        let mut db = Database::open_in_memory().unwrap();
        db.save_session("tok-1", "{}").unwrap();
        db.save_session("tok-2", "{}").unwrap();

        assert_eq!(db.load_session().unwrap().token.as_deref(), Some("tok-2"));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut db = Database::open_in_memory().unwrap();
        db.save_session("tok-1", "{}").unwrap();

        assert!(db.clear_session().unwrap());
        assert!(!db.clear_session().unwrap());

        let stored = db.load_session().unwrap();
        assert!(stored.token.is_none());
        assert!(stored.user_json.is_none());
    }
}
