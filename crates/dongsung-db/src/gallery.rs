use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension, params};

use crate::models::GalleryRow;
use crate::{Credential, Database, Gated};

const GALLERY_COLUMNS: &str = "id, author_name, title, image_url, user_id, created_at";

impl Database {
    /// All gallery photos, newest first.
    pub fn get_gallery(&self) -> Result<Vec<GalleryRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {GALLERY_COLUMNS} FROM gallery ORDER BY created_at DESC, id DESC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], map_gallery)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_gallery_photo(&self, id: i64) -> Result<Option<GalleryRow>> {
        self.with_conn(|conn| query_gallery(conn, id))
    }

    /// Photo owned by a member account; the username doubles as author name.
    pub fn create_member_photo(&self, user_id: i64, username: &str, title: &str, image_url: &str) -> Result<GalleryRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO gallery (author_name, title, image_url, user_id) VALUES (?1, ?2, ?3, ?4)",
                params![username, title, image_url, user_id],
            )?;
            fetch_inserted(conn)
        })
    }

    /// Photo posted without an account, protected by its own password.
    pub fn create_anonymous_photo(
        &self,
        author_name: &str,
        title: &str,
        image_url: &str,
        credential: &impl Credential,
    ) -> Result<GalleryRow> {
        let hash = credential.seal()?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO gallery (author_name, title, image_url, password) VALUES (?1, ?2, ?3, ?4)",
                params![author_name, title, image_url, hash],
            )?;
            fetch_inserted(conn)
        })
    }

    /// Delete a member-owned photo. Anonymous photos are never deletable this
    /// way.
    pub fn delete_member_photo(&self, id: i64, user_id: i64) -> Result<Gated<()>> {
        self.with_conn(|conn| {
            let Some((owner, _)) = query_proof(conn, id)? else {
                return Ok(Gated::Missing);
            };
            if owner != Some(user_id) {
                return Ok(Gated::Denied);
            }
            conn.execute("DELETE FROM gallery WHERE id = ?1", [id])?;
            Ok(Gated::Done(()))
        })
    }

    /// Delete an anonymous photo by password. Member photos always deny.
    pub fn delete_anonymous_photo(&self, id: i64, credential: &impl Credential) -> Result<Gated<()>> {
        match self.with_conn(|conn| query_proof(conn, id))? {
            None => return Ok(Gated::Missing),
            Some((_, None)) => return Ok(Gated::Denied),
            Some((_, Some(_))) => {}
        }

        self.gated_write(
            credential,
            |conn| Ok(query_proof(conn, id)?.and_then(|(_, hash)| hash.map(|h| (id, h)))),
            |conn, &id| {
                conn.execute("DELETE FROM gallery WHERE id = ?1", [id])?;
                Ok(())
            },
        )
    }
}

/// `(user_id, password)` of a gallery row; exactly one of them is set.
fn query_proof(conn: &Connection, id: i64) -> Result<Option<(Option<i64>, Option<String>)>> {
    Ok(conn
        .query_row("SELECT user_id, password FROM gallery WHERE id = ?1", [id], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .optional()?)
}

fn fetch_inserted(conn: &Connection) -> Result<GalleryRow> {
    let id = conn.last_insert_rowid();
    query_gallery(conn, id)?.ok_or_else(|| anyhow!("Gallery photo {} vanished after insert", id))
}

fn query_gallery(conn: &Connection, id: i64) -> Result<Option<GalleryRow>> {
    let sql = format!("SELECT {GALLERY_COLUMNS} FROM gallery WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], map_gallery).optional()?)
}

fn map_gallery(row: &rusqlite::Row<'_>) -> rusqlite::Result<GalleryRow> {
    Ok(GalleryRow {
        id: row.get(0)?,
        author_name: row.get(1)?,
        title: row.get(2)?,
        image_url: row.get(3)?,
        user_id: row.get(4)?,
        created_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Meddling, Plain};

    #[test]
    fn member_photos_delete_only_for_owner() {
        let db = Database::in_memory().unwrap();
        let alice = db.create_user("alice", "h").unwrap().unwrap();
        let bob = db.create_user("bob", "h").unwrap().unwrap();

        let photo = db.create_member_photo(alice, "alice", "Picnic", "/uploads/p.jpg").unwrap();
        assert_eq!(photo.author_name, "alice");
        assert_eq!(photo.user_id, Some(alice));

        assert_eq!(db.delete_member_photo(photo.id, bob).unwrap(), Gated::Denied);
        assert_eq!(db.delete_anonymous_photo(photo.id, &Plain("anything")).unwrap(), Gated::Denied);
        assert_eq!(db.delete_member_photo(photo.id, alice).unwrap(), Gated::Done(()));
        assert_eq!(db.delete_member_photo(photo.id, alice).unwrap(), Gated::Missing);
    }

    #[test]
    fn anonymous_photos_delete_by_password() {
        let db = Database::in_memory().unwrap();
        let alice = db.create_user("alice", "h").unwrap().unwrap();
        let photo = db.create_anonymous_photo("Guest", "", "/uploads/g.jpg", &Plain("pw1")).unwrap();
        assert_eq!(photo.user_id, None);

        assert_eq!(db.delete_member_photo(photo.id, alice).unwrap(), Gated::Denied);
        assert_eq!(db.delete_anonymous_photo(photo.id, &Plain("nope")).unwrap(), Gated::Denied);
        assert!(db.get_gallery_photo(photo.id).unwrap().is_some());
        assert_eq!(db.delete_anonymous_photo(photo.id, &Plain("pw1")).unwrap(), Gated::Done(()));
        assert!(db.get_gallery().unwrap().is_empty());
    }

    #[test]
    fn gallery_lists_newest_first() {
        let db = Database::in_memory().unwrap();
        let alice = db.create_user("alice", "h").unwrap().unwrap();
        let older = db.create_member_photo(alice, "alice", "one", "/uploads/1.jpg").unwrap();
        let newer = db.create_anonymous_photo("Guest", "two", "/uploads/2.jpg", &Plain("pw")).unwrap();

        let ids: Vec<i64> = db.get_gallery().unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids, [newer.id, older.id]);
    }

    #[test]
    fn anonymous_delete_checks_the_password_with_the_connection_free() {
        let db = Database::in_memory().unwrap();
        let photo = db.create_anonymous_photo("Guest", "", "/uploads/g.jpg", &Plain("pw1")).unwrap();
        let quiet = Meddling { db: &db, password: "pw1", during: |_: &Database| {} };

        assert_eq!(db.delete_anonymous_photo(photo.id, &quiet).unwrap(), Gated::Done(()));
        assert!(db.get_gallery().unwrap().is_empty());
    }
}
