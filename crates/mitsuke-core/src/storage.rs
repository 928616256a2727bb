use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::MitsukeError;
use crate::models::{Identity, UserRecord};

/// Storage key holding the bearer credential.
pub const TOKEN_KEY: &str = "token";
/// Storage key holding the JSON-encoded user record.
pub const USER_KEY: &str = "user";

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS local_storage (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);";

/// Durable client-side storage for the session.
///
/// Implementations write or remove both keys together.
pub trait SessionStorage: Send + Sync {
    /// Read the persisted identity. Missing or half-written state yields `None`.
    fn load(&self) -> Result<Option<Identity>, MitsukeError>;

    fn store(&self, identity: &Identity) -> Result<(), MitsukeError>;

    fn clear(&self) -> Result<(), MitsukeError>;
}

/// Turn the raw `token`/`user` pair into an identity.
///
/// The flag is set when only one half is present or the user record does
/// not parse; the caller then removes both keys.
fn decode(token: Option<String>, user: Option<String>) -> (Option<Identity>, bool) {
    match (token, user) {
        (None, None) => (None, false),
        (Some(credential), Some(user_json)) => {
            match serde_json::from_str::<UserRecord>(&user_json) {
                Ok(user) => (Some(Identity { credential, user }), false),
                Err(e) => {
                    tracing::warn!("Stored user record is unreadable, discarding session: {e}");
                    (None, true)
                }
            }
        }
        _ => {
            tracing::warn!("Stored session is half-written, discarding it");
            (None, true)
        }
    }
}

// ── SQLite ──────────────────────────────────────────────────────

/// SQLite-backed key/value store for the session.
pub struct SqliteSessionStorage {
    conn: Mutex<Connection>,
}

impl SqliteSessionStorage {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> Result<Self, MitsukeError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, MitsukeError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read a single raw value.
    pub fn get(&self, key: &str) -> Result<Option<String>, MitsukeError> {
        Self::get_with(&self.conn(), key)
    }

    fn get_with(conn: &Connection, key: &str) -> Result<Option<String>, MitsukeError> {
        conn.query_row(
            "SELECT value FROM local_storage WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(Into::into)
    }
}

impl SessionStorage for SqliteSessionStorage {
    fn load(&self) -> Result<Option<Identity>, MitsukeError> {
        let (identity, scrub) = {
            let conn = self.conn();
            let token = Self::get_with(&conn, TOKEN_KEY)?;
            let user = Self::get_with(&conn, USER_KEY)?;
            decode(token, user)
        };
        if scrub {
            self.clear()?;
        }
        Ok(identity)
    }

    fn store(&self, identity: &Identity) -> Result<(), MitsukeError> {
        let user_json = serde_json::to_string(&identity.user)?;
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO local_storage (key, value) VALUES (?1, ?2)",
            params![TOKEN_KEY, identity.credential],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO local_storage (key, value) VALUES (?1, ?2)",
            params![USER_KEY, user_json],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn clear(&self) -> Result<(), MitsukeError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM local_storage WHERE key IN (?1, ?2)",
            params![TOKEN_KEY, USER_KEY],
        )?;
        tx.commit()?;
        Ok(())
    }
}

// ── In-memory ───────────────────────────────────────────────────

/// Volatile storage, used by tests and when no data dir is available.
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read a single raw value.
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    /// Write a single raw value, bypassing the paired-write discipline.
    pub fn set_raw(&self, key: &str, value: &str) {
        self.entries().insert(key.to_string(), value.to_string());
    }
}

impl SessionStorage for MemorySessionStorage {
    fn load(&self) -> Result<Option<Identity>, MitsukeError> {
        let mut entries = self.entries();
        let token = entries.get(TOKEN_KEY).cloned();
        let user = entries.get(USER_KEY).cloned();
        let (identity, scrub) = decode(token, user);
        if scrub {
            entries.remove(TOKEN_KEY);
            entries.remove(USER_KEY);
        }
        Ok(identity)
    }

    fn store(&self, identity: &Identity) -> Result<(), MitsukeError> {
        let user_json = serde_json::to_string(&identity.user)?;
        let mut entries = self.entries();
        entries.insert(TOKEN_KEY.to_string(), identity.credential.clone());
        entries.insert(USER_KEY.to_string(), user_json);
        Ok(())
    }

    fn clear(&self) -> Result<(), MitsukeError> {
        let mut entries = self.entries();
        entries.remove(TOKEN_KEY);
        entries.remove(USER_KEY);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserId;

    fn identity() -> Identity {
        Identity {
            credential: "jwt-abc".into(),
            user: UserRecord {
                user_id: UserId(7),
                username: "rin".into(),
                email: "rin@example.com".into(),
            },
        }
    }

    #[test]
    fn test_sqlite_store_and_load() {
        let db = SqliteSessionStorage::open_memory().unwrap();
        assert_eq!(db.load().unwrap(), None);

        db.store(&identity()).unwrap();
        assert_eq!(db.load().unwrap(), Some(identity()));
        assert_eq!(db.get(TOKEN_KEY).unwrap().as_deref(), Some("jwt-abc"));

        db.clear().unwrap();
        assert_eq!(db.load().unwrap(), None);
        assert_eq!(db.get(USER_KEY).unwrap(), None);
    }

    #[test]
    fn test_sqlite_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.db");

        SqliteSessionStorage::open(&path)
            .unwrap()
            .store(&identity())
            .unwrap();

        let reopened = SqliteSessionStorage::open(&path).unwrap();
        assert_eq!(reopened.load().unwrap(), Some(identity()));
    }

    #[test]
    fn test_half_written_session_is_discarded() {
        let storage = MemorySessionStorage::new();
        storage.set_raw(TOKEN_KEY, "orphan-token");

        assert_eq!(storage.load().unwrap(), None);
        assert_eq!(storage.get(TOKEN_KEY), None);
    }

    #[test]
    fn test_unparseable_user_is_discarded() {
        let storage = MemorySessionStorage::new();
        storage.set_raw(TOKEN_KEY, "tok");
        storage.set_raw(USER_KEY, "{not json");

        assert_eq!(storage.load().unwrap(), None);
        assert_eq!(storage.get(USER_KEY), None);
    }
}
