use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};

use crate::models::ShareRow;
use crate::{Credential, Database, Gated};

const SHARE_COLUMNS: &str = "id, date, author_name, content, created_at, updated_at";

impl Database {
    /// Shares posted under `date`, oldest first.
    pub fn get_shares(&self, date: NaiveDate) -> Result<Vec<ShareRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {SHARE_COLUMNS} FROM word_shares WHERE date = ?1 ORDER BY created_at ASC, id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([date], map_share)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_share(&self, id: i64) -> Result<Option<ShareRow>> {
        self.with_conn(|conn| query_share(conn, id))
    }

    pub fn create_share(
        &self,
        date: NaiveDate,
        author_name: &str,
        content: &str,
        credential: &impl Credential,
    ) -> Result<ShareRow> {
        let hash = credential.seal()?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO word_shares (date, author_name, password, content) VALUES (?1, ?2, ?3, ?4)",
                params![date, author_name, hash, content],
            )?;
            let id = conn.last_insert_rowid();
            query_share(conn, id)?.ok_or_else(|| anyhow!("Share {} vanished after insert", id))
        })
    }

    pub fn update_share(&self, id: i64, content: &str, credential: &impl Credential) -> Result<Gated<ShareRow>> {
        self.gated_write(
            credential,
            |conn| share_proof(conn, id),
            |conn, &id| {
                conn.execute(
                    "UPDATE word_shares SET content = ?1, updated_at = datetime('now') WHERE id = ?2",
                    params![content, id],
                )?;
                query_share(conn, id)?.ok_or_else(|| anyhow!("Share {} vanished mid-update", id))
            },
        )
    }

    pub fn delete_share(&self, id: i64, credential: &impl Credential) -> Result<Gated<()>> {
        self.gated_write(
            credential,
            |conn| share_proof(conn, id),
            |conn, &id| {
                conn.execute("DELETE FROM word_shares WHERE id = ?1", [id])?;
                Ok(())
            },
        )
    }
}

fn share_proof(conn: &Connection, id: i64) -> Result<Option<(i64, String)>> {
    Ok(conn
        .query_row("SELECT id, password FROM word_shares WHERE id = ?1", [id], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .optional()?)
}

fn query_share(conn: &Connection, id: i64) -> Result<Option<ShareRow>> {
    let sql = format!("SELECT {SHARE_COLUMNS} FROM word_shares WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], map_share).optional()?)
}

fn map_share(row: &rusqlite::Row<'_>) -> rusqlite::Result<ShareRow> {
    Ok(ShareRow {
        id: row.get(0)?,
        date: row.get(1)?,
        author_name: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}
