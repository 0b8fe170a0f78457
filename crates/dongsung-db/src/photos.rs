use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::{Result, anyhow, bail};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

use crate::models::{CommentRow, DailyPhotoRow};
use crate::{Database, Gated};

/// Who may overwrite a date's photo once it exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplacePolicy {
    /// Any signed-in member replaces any date's photo.
    #[default]
    AnyMember,
    /// Only the member who uploaded the current photo may replace it.
    OwnerOnly,
}

impl FromStr for ReplacePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any" => Ok(Self::AnyMember),
            "owner" => Ok(Self::OwnerOnly),
            other => bail!("Unknown photo replace policy '{}' (expected 'any' or 'owner')", other),
        }
    }
}

impl Database {
    pub fn get_daily_photo(&self, date: NaiveDate) -> Result<Option<DailyPhotoRow>> {
        self.with_conn(|conn| query_photo(conn, date))
    }

    /// Store `image_url` as the photo for `date`, replacing any previous row
    /// (and with it, that row's comments). The new row gets a fresh id.
    pub fn replace_daily_photo(
        &self,
        date: NaiveDate,
        image_url: &str,
        user_id: i64,
        policy: ReplacePolicy,
    ) -> Result<Gated<DailyPhotoRow>> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;

            let current_owner: Option<Option<i64>> = tx
                .query_row("SELECT uploaded_by FROM daily_photos WHERE date = ?1", [date], |row| row.get(0))
                .optional()?;

            if let Some(owner) = current_owner {
                if policy == ReplacePolicy::OwnerOnly && owner != Some(user_id) {
                    return Ok(Gated::Denied);
                }
                tx.execute("DELETE FROM daily_photos WHERE date = ?1", [date])?;
                info!("Daily photo for {} replaced by user {}", date, user_id);
            }

            tx.execute(
                "INSERT INTO daily_photos (date, image_url, uploaded_by) VALUES (?1, ?2, ?3)",
                params![date, image_url, user_id],
            )?;
            let row = query_photo(&tx, date)?.ok_or_else(|| anyhow!("Daily photo {} vanished after insert", date))?;
            tx.commit()?;
            Ok(Gated::Done(row))
        })
    }

    /// Comment count for every date that has a photo, including zero.
    pub fn photo_comment_counts(&self) -> Result<BTreeMap<NaiveDate, i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT dp.date, COUNT(c.id)
                 FROM daily_photos dp
                 LEFT JOIN comments c ON c.daily_photo_id = dp.id
                 GROUP BY dp.id, dp.date",
            )?;
            let counts = stmt
                .query_map([], |row| Ok((row.get::<_, NaiveDate>(0)?, row.get::<_, i64>(1)?)))?
                .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;
            Ok(counts)
        })
    }

    // -- Comments --

    /// Returns `None` if the photo does not exist.
    pub fn create_comment(&self, daily_photo_id: i64, user_id: i64, content: &str) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            let exists: Option<i64> = conn
                .query_row("SELECT id FROM daily_photos WHERE id = ?1", [daily_photo_id], |row| row.get(0))
                .optional()?;
            if exists.is_none() {
                return Ok(None);
            }

            conn.execute(
                "INSERT INTO comments (daily_photo_id, content, user_id) VALUES (?1, ?2, ?3)",
                params![daily_photo_id, content, user_id],
            )?;
            let id = conn.last_insert_rowid();
            let row = query_comments(conn, "c.id = ?1", id)?
                .pop()
                .ok_or_else(|| anyhow!("Comment {} vanished after insert", id))?;
            Ok(Some(row))
        })
    }

    /// Comments on a photo with their authors' usernames, oldest first.
    pub fn get_comments(&self, daily_photo_id: i64) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| query_comments(conn, "c.daily_photo_id = ?1", daily_photo_id))
    }

    /// Delete a comment on behalf of `user_id`; only its author may.
    pub fn delete_comment(&self, id: i64, user_id: i64) -> Result<Gated<()>> {
        self.with_conn(|conn| {
            let author: Option<i64> = conn
                .query_row("SELECT user_id FROM comments WHERE id = ?1", [id], |row| row.get(0))
                .optional()?;

            match author {
                None => Ok(Gated::Missing),
                Some(author) if author != user_id => Ok(Gated::Denied),
                Some(_) => {
                    conn.execute("DELETE FROM comments WHERE id = ?1", [id])?;
                    Ok(Gated::Done(()))
                }
            }
        })
    }
}

fn query_photo(conn: &Connection, date: NaiveDate) -> Result<Option<DailyPhotoRow>> {
    let row = conn
        .query_row(
            "SELECT id, date, image_url, uploaded_by, created_at FROM daily_photos WHERE date = ?1",
            [date],
            |row| {
                Ok(DailyPhotoRow {
                    id: row.get(0)?,
                    date: row.get(1)?,
                    image_url: row.get(2)?,
                    uploaded_by: row.get(3)?,
                    created_at: row.get(4)?,
                })
            },
        )
        .optional()?;

    Ok(row)
}

fn query_comments(conn: &Connection, filter: &str, key: i64) -> Result<Vec<CommentRow>> {
    // JOIN users to fetch the username in a single query
    let sql = format!(
        "SELECT c.id, c.daily_photo_id, c.content, c.user_id, u.username, c.created_at
         FROM comments c
         LEFT JOIN users u ON c.user_id = u.id
         WHERE {filter}
         ORDER BY c.created_at ASC, c.id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;

    let rows = stmt
        .query_map([key], |row| {
            Ok(CommentRow {
                id: row.get(0)?,
                daily_photo_id: row.get(1)?,
                content: row.get(2)?,
                user_id: row.get(3)?,
                username: row.get::<_, Option<String>>(4)?.unwrap_or_else(|| "unknown".to_string()),
                created_at: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}
