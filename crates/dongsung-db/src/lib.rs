pub mod accounts;
pub mod calendar;
pub mod gallery;
pub mod migrations;
pub mod models;
pub mod photos;
pub mod posts;
pub mod shares;
pub mod words;

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

pub use dongsung_crypto::Credential;

pub struct Database {
    conn: Mutex<Connection>,
}

/// Outcome of a write that needs proof of ownership first.
///
/// Authorization failures are ordinary results here; `Err` is reserved for
/// storage and hashing faults.
#[derive(Debug, PartialEq, Eq)]
pub enum Gated<T> {
    /// No record under the given key.
    Missing,
    /// The record exists but the proof (password or owner) did not match.
    Denied,
    Done(T),
}

impl<T> Gated<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Gated<U> {
        match self {
            Gated::Missing => Gated::Missing,
            Gated::Denied => Gated::Denied,
            Gated::Done(v) => Gated::Done(f(v)),
        }
    }
}

/// How often a gated write re-reads its row after it changed mid-check.
const MAX_GATED_ATTEMPTS: usize = 3;

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let db = Self::init(conn)?;
        info!("Database opened at {}", path.display());
        Ok(db)
    }

    /// Same schema, nothing on disk. Used by tests and throwaway instances.
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run `f` while holding the connection. Nothing slow (password hashing
    /// in particular) belongs inside `f`; see `gated_write`.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }

    /// Password-gated write. `lookup` yields the row key and its stored hash;
    /// the hash is checked against `credential` with the connection released,
    /// then `write` runs in a transaction only if the row still has that key
    /// and hash. A row that changed in between is looked up again.
    pub(crate) fn gated_write<K, T>(
        &self,
        credential: &impl Credential,
        lookup: impl Fn(&Connection) -> Result<Option<(K, String)>>,
        write: impl Fn(&Connection, &K) -> Result<T>,
    ) -> Result<Gated<T>>
    where
        K: PartialEq,
    {
        for _ in 0..MAX_GATED_ATTEMPTS {
            let Some((key, stored_hash)) = self.with_conn(|conn| lookup(conn))? else {
                return Ok(Gated::Missing);
            };
            if !credential.matches(&stored_hash)? {
                return Ok(Gated::Denied);
            }

            let applied = self.with_conn(|conn| {
                let tx = conn.unchecked_transaction()?;
                match lookup(&*tx)? {
                    Some((k, h)) if k == key && h == stored_hash => {
                        let value = write(&*tx, &key)?;
                        tx.commit()?;
                        Ok(Some(value))
                    }
                    _ => Ok(None),
                }
            })?;
            if let Some(value) = applied {
                return Ok(Gated::Done(value));
            }
            debug!("Row changed during password check, looking it up again");
        }

        anyhow::bail!("Row kept changing during password checks")
    }
}
