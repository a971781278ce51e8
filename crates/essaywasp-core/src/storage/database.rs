//! SQLite-based essay storage.
//!
//! Provides persistent storage for:
//! - In-progress essays (`temp_users_essay`), one row per started session
//! - The saved essay history (`users_essay`), append-only
//! - Key-value store for local state such as the countdown deadline

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use super::data_dir;
use crate::essay::{NewSavedEssay, SavedEssay, TempEssay};
use crate::error::{DatabaseError, GatewayError, Result};
use crate::gateway::{DeadlineStore, EssayStore, DEADLINE_KEY};

/// SQLite database for essay storage.
///
/// The connection sits behind a mutex so one database can serve the
/// session from any task. Statements are short and never span an await.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `~/.config/essaywasp/essaywasp.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("essaywasp.db");
        Ok(Self::open_at(&path)?)
    }

    /// Open (or create) a database file at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.create_schema()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.create_schema()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::Poisoned)
    }

    fn create_schema(&self) -> Result<(), DatabaseError> {
        self.conn()?.execute_batch(
            "CREATE TABLE IF NOT EXISTS temp_users_essay (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                email_address   TEXT NOT NULL,
                essay_question  TEXT NOT NULL,
                essay_text      TEXT NOT NULL DEFAULT '',
                essay_feedback  TEXT NOT NULL DEFAULT '',
                closed          INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS users_essay (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                email_address   TEXT NOT NULL,
                essay_question  TEXT NOT NULL,
                essay_text      TEXT NOT NULL,
                essay_feedback  TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_temp_email_created ON temp_users_essay(email_address, created_at);
            CREATE INDEX IF NOT EXISTS idx_saved_email ON users_essay(email_address);",
        )?;
        Ok(())
    }

    pub fn insert_temp_essay(&self, email: &str, question: &str) -> Result<i64, DatabaseError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO temp_users_essay (email_address, essay_question, created_at)
             VALUES (?1, ?2, ?3)",
            params![email, question, Utc::now().to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Update the most recent in-progress row. Returns the number of rows
    /// touched (0 when the user has none).
    pub fn update_latest_temp_essay(
        &self,
        email: &str,
        essay_text: &str,
        feedback: &str,
    ) -> Result<usize, DatabaseError> {
        let changed = self.conn()?.execute(
            "UPDATE temp_users_essay SET essay_text = ?2, essay_feedback = ?3
             WHERE id = (SELECT id FROM temp_users_essay WHERE email_address = ?1
                         ORDER BY created_at DESC, id DESC LIMIT 1)",
            params![email, essay_text, feedback],
        )?;
        Ok(changed)
    }

    pub fn close_latest_temp_essay(&self, email: &str) -> Result<usize, DatabaseError> {
        let changed = self.conn()?.execute(
            "UPDATE temp_users_essay SET closed = 1
             WHERE id = (SELECT id FROM temp_users_essay WHERE email_address = ?1
                         ORDER BY created_at DESC, id DESC LIMIT 1)",
            params![email],
        )?;
        Ok(changed)
    }

    pub fn latest_temp_essay(&self, email: &str) -> Result<Option<TempEssay>, DatabaseError> {
        let conn = self.conn()?;
        let essay = conn
            .query_row(
                "SELECT id, essay_question, essay_text, essay_feedback, created_at, closed
                 FROM temp_users_essay WHERE email_address = ?1
                 ORDER BY created_at DESC, id DESC LIMIT 1",
                params![email],
                |row| {
                    Ok(TempEssay {
                        id: row.get(0)?,
                        question: row.get(1)?,
                        essay_text: row.get(2)?,
                        feedback: row.get(3)?,
                        created_at: parse_timestamp(4, &row.get::<_, String>(4)?)?,
                        closed: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(essay)
    }

    pub fn insert_saved_essay(
        &self,
        email: &str,
        essay: &NewSavedEssay,
    ) -> Result<SavedEssay, DatabaseError> {
        let conn = self.conn()?;
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO users_essay (email_address, essay_question, essay_text, essay_feedback, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                email,
                essay.question,
                essay.essay_text,
                essay.feedback,
                created_at.to_rfc3339(),
            ],
        )?;
        Ok(SavedEssay {
            id: conn.last_insert_rowid(),
            question: essay.question.clone(),
            essay_text: essay.essay_text.clone(),
            feedback: essay.feedback.clone(),
            created_at,
        })
    }

    pub fn saved_essays_for(&self, email: &str) -> Result<Vec<SavedEssay>, DatabaseError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, essay_question, essay_text, essay_feedback, created_at
             FROM users_essay WHERE email_address = ?1",
        )?;
        let rows = stmt.query_map(params![email], |row| {
            Ok(SavedEssay {
                id: row.get(0)?,
                question: row.get(1)?,
                essay_text: row.get(2)?,
                feedback: row.get(3)?,
                created_at: parse_timestamp(4, &row.get::<_, String>(4)?)?,
            })
        })?;
        let essays = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(essays)
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let value = self
            .conn()?
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), DatabaseError> {
        self.conn()?
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

fn parse_timestamp(idx: usize, raw: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[async_trait]
impl EssayStore for Database {
    async fn insert_temp(&self, email: &str, question: &str) -> Result<i64, GatewayError> {
        Ok(self.insert_temp_essay(email, question)?)
    }

    async fn update_latest_temp(
        &self,
        email: &str,
        essay_text: &str,
        feedback: &str,
    ) -> Result<(), GatewayError> {
        match self.update_latest_temp_essay(email, essay_text, feedback)? {
            0 => Err(GatewayError::persistence(format!(
                "no in-progress essay stored for {email}"
            ))),
            _ => Ok(()),
        }
    }

    async fn latest_temp(&self, email: &str) -> Result<Option<TempEssay>, GatewayError> {
        Ok(self.latest_temp_essay(email)?)
    }

    async fn close_latest_temp(&self, email: &str) -> Result<(), GatewayError> {
        self.close_latest_temp_essay(email)?;
        Ok(())
    }

    async fn insert_saved(
        &self,
        email: &str,
        essay: &NewSavedEssay,
    ) -> Result<SavedEssay, GatewayError> {
        Ok(self.insert_saved_essay(email, essay)?)
    }

    async fn saved_essays(&self, email: &str) -> Result<Vec<SavedEssay>, GatewayError> {
        Ok(self.saved_essays_for(email)?)
    }
}

impl DeadlineStore for Database {
    fn load(&self) -> Result<Option<u64>, GatewayError> {
        let Some(raw) = self.kv_get(DEADLINE_KEY)? else {
            return Ok(None);
        };
        raw.parse::<u64>().map(Some).map_err(|e| {
            GatewayError::persistence(format!("corrupt {DEADLINE_KEY} value '{raw}': {e}"))
        })
    }

    fn save(&self, deadline_ms: u64) -> Result<(), GatewayError> {
        Ok(self.kv_set(DEADLINE_KEY, &deadline_ms.to_string())?)
    }

    fn clear(&self) -> Result<(), GatewayError> {
        Ok(self.kv_delete(DEADLINE_KEY)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMAIL: &str = "writer@example.com";

    #[test]
    fn temp_essay_lifecycle() {
        let db = Database::open_memory().unwrap();
        assert!(db.latest_temp_essay(EMAIL).unwrap().is_none());

        db.insert_temp_essay(EMAIL, "Old question").unwrap();
        let id = db.insert_temp_essay(EMAIL, "New question").unwrap();
        assert_eq!(
            db.update_latest_temp_essay(EMAIL, "My essay", "Good work")
                .unwrap(),
            1
        );

        let latest = db.latest_temp_essay(EMAIL).unwrap().unwrap();
        assert_eq!(latest.id, id);
        assert_eq!(latest.question, "New question");
        assert_eq!(latest.essay_text, "My essay");
        assert_eq!(latest.feedback, "Good work");
        assert!(!latest.closed);

        db.close_latest_temp_essay(EMAIL).unwrap();
        assert!(db.latest_temp_essay(EMAIL).unwrap().unwrap().closed);
    }

    #[test]
    fn temp_update_is_scoped_to_email() {
        let db = Database::open_memory().unwrap();
        db.insert_temp_essay("other@example.com", "Q").unwrap();
        assert_eq!(db.update_latest_temp_essay(EMAIL, "t", "f").unwrap(), 0);
    }

    #[test]
    fn saved_essays_are_appended() {
        let db = Database::open_memory().unwrap();
        let essay = NewSavedEssay {
            question: "Q".into(),
            essay_text: "T".into(),
            feedback: "F".into(),
        };
        let first = db.insert_saved_essay(EMAIL, &essay).unwrap();
        let second = db.insert_saved_essay(EMAIL, &essay).unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(db.saved_essays_for(EMAIL).unwrap().len(), 2);
        assert!(db.saved_essays_for("nobody@example.com").unwrap().is_empty());
    }

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
        db.kv_delete("test").unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
    }

    #[test]
    fn deadline_slot_uses_countdown_key() {
        let db = Database::open_memory().unwrap();
        DeadlineStore::save(&db, 1_700_000_000_000).unwrap();
        assert_eq!(
            db.kv_get(DEADLINE_KEY).unwrap().as_deref(),
            Some("1700000000000")
        );
        assert_eq!(DeadlineStore::load(&db).unwrap(), Some(1_700_000_000_000));
        DeadlineStore::clear(&db).unwrap();
        assert_eq!(DeadlineStore::load(&db).unwrap(), None);
    }

    #[test]
    fn corrupt_deadline_is_reported() {
        let db = Database::open_memory().unwrap();
        db.kv_set(DEADLINE_KEY, "soon").unwrap();
        assert!(DeadlineStore::load(&db).is_err());
    }

    #[test]
    fn file_database_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("essays.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.insert_temp_essay(EMAIL, "Persisted?").unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        assert_eq!(
            db.latest_temp_essay(EMAIL).unwrap().unwrap().question,
            "Persisted?"
        );
    }
}
