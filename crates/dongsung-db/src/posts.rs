use std::collections::BTreeMap;

use anyhow::{Result, anyhow};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{Connection, OptionalExtension, params};

use crate::Database;
use crate::models::PostRow;

const POST_COLUMNS: &str = "id, title, content, image_url, author_name, user_id, created_at";

pub struct NewPost<'a> {
    pub title: &'a str,
    pub content: &'a str,
    /// First uploaded image, mirrored into the single-image column.
    pub image_url: Option<&'a str>,
    pub author_name: &'a str,
    pub user_id: i64,
    /// Backdated creation time; `None` means now.
    pub created_at: Option<NaiveDateTime>,
}

impl Database {
    pub fn create_post(&self, post: &NewPost<'_>) -> Result<PostRow> {
        let created_at = post
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string());

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (title, content, image_url, author_name, user_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, COALESCE(?6, datetime('now')))",
                params![post.title, post.content, post.image_url, post.author_name, post.user_id, created_at],
            )?;
            let id = conn.last_insert_rowid();
            query_post(conn, id)?.ok_or_else(|| anyhow!("Post {} vanished after insert", id))
        })
    }

    /// Every post, newest first.
    pub fn get_posts(&self) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC, id DESC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], map_post)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Posts created on `date`, newest first.
    pub fn get_posts_on(&self, date: NaiveDate) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {POST_COLUMNS} FROM posts WHERE date(created_at) = ?1 ORDER BY created_at DESC, id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([date], map_post)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Number of posts per creation day.
    pub fn post_counts(&self) -> Result<BTreeMap<NaiveDate, i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT date(created_at) AS day, COUNT(*) FROM posts GROUP BY day HAVING day IS NOT NULL",
            )?;
            let counts = stmt
                .query_map([], |row| Ok((row.get::<_, NaiveDate>(0)?, row.get::<_, i64>(1)?)))?
                .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;
            Ok(counts)
        })
    }
}

fn query_post(conn: &Connection, id: i64) -> Result<Option<PostRow>> {
    let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], map_post).optional()?)
}

fn map_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        image_url: row.get(3)?,
        author_name: row.get(4)?,
        user_id: row.get(5)?,
        created_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::date;

    fn post(user_id: i64, created_at: Option<&str>) -> NewPost<'static> {
        NewPost {
            title: "Sunday",
            content: "Service notes",
            image_url: None,
            author_name: "alice",
            user_id,
            created_at: created_at.map(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()),
        }
    }

    #[test]
    fn backdated_posts_land_on_their_day() {
        let db = Database::in_memory().unwrap();
        let uid = db.create_user("alice", "h").unwrap().unwrap();

        db.create_post(&post(uid, Some("2025-06-01 09:00:00"))).unwrap();
        db.create_post(&post(uid, Some("2025-06-01 18:30:00"))).unwrap();
        db.create_post(&post(uid, Some("2025-06-03 07:00:00"))).unwrap();

        let day = db.get_posts_on(date("2025-06-01")).unwrap();
        assert_eq!(day.len(), 2);
        assert_eq!(day[0].created_at, "2025-06-01 18:30:00");

        let counts = db.post_counts().unwrap();
        assert_eq!(counts.get(&date("2025-06-01")), Some(&2));
        assert_eq!(counts.get(&date("2025-06-03")), Some(&1));
        assert!(db.get_posts_on(date("2025-06-02")).unwrap().is_empty());
    }

    #[test]
    fn posts_list_newest_first_with_image_mirror() {
        let db = Database::in_memory().unwrap();
        let uid = db.create_user("alice", "h").unwrap().unwrap();

        db.create_post(&post(uid, Some("2025-01-01 00:00:00"))).unwrap();
        let mut with_image = post(uid, None);
        with_image.image_url = Some("/uploads/cover.jpg");
        let newest = db.create_post(&with_image).unwrap();

        let posts = db.get_posts().unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].id, newest.id);
        assert_eq!(posts[0].image_url.as_deref(), Some("/uploads/cover.jpg"));
        assert_eq!(posts[0].user_id, Some(uid));
    }
}
