/// Database row types — these map directly to SQLite rows.
/// Distinct from dongsung-types API models to keep the DB layer independent.
///
/// Rows of password-protected tables never include the hash column; the hash
/// is only read inside gated writes.
use chrono::NaiveDate;

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

pub struct PostRow {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub author_name: Option<String>,
    pub user_id: Option<i64>,
    pub created_at: String,
}

pub struct DailyWordRow {
    pub id: i64,
    pub date: NaiveDate,
    pub title: String,
    pub passage: String,
    pub content: String,
    pub author_name: String,
    pub image_url: Option<String>,
    pub file_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// `id` is `None` for the pseudo-entry synthesized from a legacy `image_url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRow {
    pub id: Option<i64>,
    pub image_url: String,
    pub sort_order: i64,
}

/// A daily word together with its ordered image collection.
pub struct DailyWordRecord {
    pub word: DailyWordRow,
    pub images: Vec<ImageRow>,
}

pub struct ShareRow {
    pub id: i64,
    pub date: NaiveDate,
    pub author_name: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct DailyPhotoRow {
    pub id: i64,
    pub date: NaiveDate,
    pub image_url: String,
    pub uploaded_by: Option<i64>,
    pub created_at: String,
}

pub struct CommentRow {
    pub id: i64,
    pub daily_photo_id: i64,
    pub content: String,
    pub user_id: i64,
    pub username: String,
    pub created_at: String,
}

pub struct GalleryRow {
    pub id: i64,
    pub author_name: String,
    pub title: String,
    pub image_url: String,
    pub user_id: Option<i64>,
    pub created_at: String,
}
