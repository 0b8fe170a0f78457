use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::models::{DailyWordRecord, DailyWordRow, ImageRow};
use crate::{Credential, Database, Gated};

/// Fields of a daily word submission, for both the first write of a date and
/// later edits.
pub struct WordDraft<'a> {
    pub title: &'a str,
    pub passage: &'a str,
    pub content: &'a str,
    pub author_name: &'a str,
    /// Newly uploaded document. `None` keeps whatever the record already has.
    pub file_url: Option<&'a str>,
    /// Newly uploaded images, appended in order.
    pub new_images: &'a [String],
    /// Collection ids to drop before appending. Ignored on create.
    pub remove_images: &'a [i64],
}

pub enum Upserted {
    Created(DailyWordRecord),
    Updated(DailyWordRecord),
}

impl Database {
    pub fn get_daily_word(&self, date: NaiveDate) -> Result<Option<DailyWordRecord>> {
        self.with_conn(|conn| match query_word(conn, "date", date)? {
            Some(word) => Ok(Some(load_record(conn, word)?)),
            None => Ok(None),
        })
    }

    /// Create the word for `date`, or edit it if one exists.
    ///
    /// An existing record is only touched after `credential` matches its
    /// stored hash; a fresh record stores `credential.seal()` as its
    /// permanent password. Hashing runs with the connection released, and
    /// every write of one submission lands in a single transaction.
    pub fn upsert_daily_word(
        &self,
        date: NaiveDate,
        draft: &WordDraft<'_>,
        credential: &impl Credential,
    ) -> Result<Gated<Upserted>> {
        for _ in 0..MAX_UPSERT_ATTEMPTS {
            if self.with_conn(|conn| word_proof(conn, date))?.is_some() {
                let edited = self.gated_write(
                    credential,
                    |conn| word_proof(conn, date),
                    |conn, &id| {
                        update_word(conn, id, draft)?;
                        let removed = remove_images(conn, id, draft.remove_images)?;
                        add_images(conn, id, draft.new_images)?;
                        sync_legacy_image(conn, id, draft.new_images.first(), removed)?;
                        debug!(
                            "Daily word {} edited: -{} +{} images",
                            date,
                            removed,
                            draft.new_images.len()
                        );
                        load_by_id(conn, id)
                    },
                )?;
                match edited {
                    // Deleted while we were checking; fall through and create.
                    Gated::Missing => {}
                    other => return Ok(other.map(Upserted::Updated)),
                }
            }

            let hash = credential.seal()?;
            let created = self.with_conn(|conn| {
                let tx = conn.unchecked_transaction()?;
                if word_proof(&tx, date)?.is_some() {
                    return Ok(None);
                }
                let id = insert_word(&tx, date, draft, &hash)?;
                add_images(&tx, id, draft.new_images)?;
                let record = load_by_id(&tx, id)?;
                tx.commit()?;
                Ok(Some(record))
            })?;
            if let Some(record) = created {
                info!("Daily word created for {}", date);
                return Ok(Gated::Done(Upserted::Created(record)));
            }
            debug!("Daily word {} appeared while sealing, editing it instead", date);
        }

        Err(anyhow!("Daily word {} kept changing during the upsert", date))
    }

    /// Delete the word for `date` and, through the foreign key, its images.
    pub fn delete_daily_word(&self, date: NaiveDate, credential: &impl Credential) -> Result<Gated<()>> {
        let outcome = self.gated_write(
            credential,
            |conn| word_proof(conn, date),
            |conn, &id| {
                conn.execute("DELETE FROM daily_words WHERE id = ?1", [id])?;
                Ok(())
            },
        )?;
        if outcome == Gated::Done(()) {
            info!("Daily word for {} deleted", date);
        }
        Ok(outcome)
    }

    pub fn daily_word_images(&self, word_id: i64) -> Result<Vec<ImageRow>> {
        self.with_conn(|conn| list_images(conn, word_id))
    }
}

/// Create and edit can take turns on one date; each lost turn costs a retry.
const MAX_UPSERT_ATTEMPTS: usize = 3;

/// Id and stored hash of the word for `date`.
fn word_proof(conn: &Connection, date: NaiveDate) -> Result<Option<(i64, String)>> {
    Ok(conn
        .query_row(
            "SELECT id, password FROM daily_words WHERE date = ?1",
            [date],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?)
}

// -- Image collection --

/// Append `urls` after the current highest sort order (0 for an empty
/// collection). The starting point is read once per call.
pub fn add_images(conn: &Connection, word_id: i64, urls: &[String]) -> Result<()> {
    if urls.is_empty() {
        return Ok(());
    }

    let next: i64 = conn.query_row(
        "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM daily_word_images WHERE daily_word_id = ?1",
        [word_id],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(
        "INSERT INTO daily_word_images (daily_word_id, image_url, sort_order) VALUES (?1, ?2, ?3)",
    )?;
    for (offset, url) in urls.iter().enumerate() {
        stmt.execute(params![word_id, url, next + offset as i64])?;
    }

    Ok(())
}

/// Delete images by id, restricted to `word_id`'s collection. Ids that belong
/// to another parent, or to nothing, are skipped. Returns the number removed.
pub fn remove_images(conn: &Connection, word_id: i64, ids: &[i64]) -> Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut stmt =
        conn.prepare("DELETE FROM daily_word_images WHERE id = ?1 AND daily_word_id = ?2")?;
    let mut removed = 0;
    for id in ids {
        removed += stmt.execute(params![id, word_id])?;
    }

    Ok(removed)
}

/// Collection rows in display order: sort order, then insertion id.
pub fn list_images(conn: &Connection, word_id: i64) -> Result<Vec<ImageRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, image_url, sort_order FROM daily_word_images
         WHERE daily_word_id = ?1
         ORDER BY sort_order ASC, id ASC",
    )?;

    let rows = stmt
        .query_map([word_id], |row| {
            Ok(ImageRow {
                id: Some(row.get(0)?),
                image_url: row.get(1)?,
                sort_order: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

// -- Helpers --

fn insert_word(conn: &Connection, date: NaiveDate, draft: &WordDraft<'_>, hash: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO daily_words (date, title, passage, content, author_name, password, image_url, file_url)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            date,
            draft.title,
            draft.passage,
            draft.content,
            draft.author_name,
            hash,
            draft.new_images.first(),
            draft.file_url,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn update_word(conn: &Connection, id: i64, draft: &WordDraft<'_>) -> Result<()> {
    conn.execute(
        "UPDATE daily_words
         SET title = ?1, passage = ?2, content = ?3, author_name = ?4,
             file_url = COALESCE(?5, file_url), updated_at = datetime('now')
         WHERE id = ?6",
        params![draft.title, draft.passage, draft.content, draft.author_name, draft.file_url, id],
    )?;
    Ok(())
}

/// Keep the single `image_url` column pointing at something sensible: the
/// first newly uploaded image if any, nothing once the collection has been
/// emptied by removals, otherwise unchanged.
fn sync_legacy_image(conn: &Connection, id: i64, first_new: Option<&String>, removed: usize) -> Result<()> {
    if let Some(url) = first_new {
        conn.execute("UPDATE daily_words SET image_url = ?1 WHERE id = ?2", params![url, id])?;
    } else if removed > 0 {
        conn.execute(
            "UPDATE daily_words SET image_url = NULL
             WHERE id = ?1
               AND NOT EXISTS (SELECT 1 FROM daily_word_images WHERE daily_word_id = ?1)",
            [id],
        )?;
    }
    Ok(())
}

fn query_word(conn: &Connection, column: &str, key: impl rusqlite::ToSql) -> Result<Option<DailyWordRow>> {
    let sql = format!(
        "SELECT id, date, title, passage, content, author_name, image_url, file_url, created_at, updated_at
         FROM daily_words WHERE {column} = ?1"
    );

    let row = conn
        .query_row(&sql, [key], |row| {
            Ok(DailyWordRow {
                id: row.get(0)?,
                date: row.get(1)?,
                title: row.get(2)?,
                passage: row.get(3)?,
                content: row.get(4)?,
                author_name: row.get(5)?,
                image_url: row.get(6)?,
                file_url: row.get(7)?,
                created_at: row.get(8)?,
                updated_at: row.get(9)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn load_by_id(conn: &Connection, id: i64) -> Result<DailyWordRecord> {
    let word = query_word(conn, "id", id)?.ok_or_else(|| anyhow!("Daily word {} vanished mid-write", id))?;
    load_record(conn, word)
}

/// Attach the image collection. Records from before the collection existed
/// only have `image_url`; that URL is surfaced as a single id-less entry.
fn load_record(conn: &Connection, word: DailyWordRow) -> Result<DailyWordRecord> {
    let mut images = list_images(conn, word.id)?;
    if images.is_empty() {
        if let Some(url) = &word.image_url {
            images.push(ImageRow {
                id: None,
                image_url: url.clone(),
                sort_order: 0,
            });
        }
    }
    Ok(DailyWordRecord { word, images })
}
