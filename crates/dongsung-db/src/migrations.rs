use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                username    TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE posts (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                title        TEXT NOT NULL,
                content      TEXT NOT NULL,
                image_url    TEXT,
                author_name  TEXT,
                user_id      INTEGER REFERENCES users(id),
                created_at   TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_posts_created ON posts(created_at);

            CREATE TABLE daily_words (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                date         TEXT NOT NULL UNIQUE,
                title        TEXT NOT NULL,
                passage      TEXT NOT NULL DEFAULT '',
                content      TEXT NOT NULL,
                author_name  TEXT NOT NULL,
                password     TEXT NOT NULL,
                image_url    TEXT,
                file_url     TEXT,
                created_at   TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at   TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE daily_word_images (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                daily_word_id  INTEGER NOT NULL REFERENCES daily_words(id) ON DELETE CASCADE,
                image_url      TEXT NOT NULL,
                sort_order     INTEGER NOT NULL DEFAULT 0,
                created_at     TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_daily_word_images_parent
                ON daily_word_images(daily_word_id, sort_order, id);

            CREATE TABLE word_shares (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                date         TEXT NOT NULL,
                author_name  TEXT NOT NULL,
                password     TEXT NOT NULL,
                content      TEXT NOT NULL,
                created_at   TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at   TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_word_shares_date ON word_shares(date);

            CREATE TABLE daily_photos (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                date         TEXT NOT NULL UNIQUE,
                image_url    TEXT NOT NULL,
                uploaded_by  INTEGER REFERENCES users(id),
                created_at   TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE comments (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                daily_photo_id  INTEGER NOT NULL REFERENCES daily_photos(id) ON DELETE CASCADE,
                content         TEXT NOT NULL,
                user_id         INTEGER NOT NULL REFERENCES users(id),
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_comments_photo ON comments(daily_photo_id, created_at);

            -- Rows carry either user_id (account-owned) or password (anonymous).
            CREATE TABLE gallery (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                author_name  TEXT NOT NULL,
                password     TEXT,
                title        TEXT NOT NULL DEFAULT '',
                image_url    TEXT NOT NULL,
                user_id      INTEGER REFERENCES users(id),
                created_at   TEXT NOT NULL DEFAULT (datetime('now')),
                CHECK ((user_id IS NULL) <> (password IS NULL))
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
