use super::Database;
use anyhow::Result;

pub fn run(db: &Database) -> Result<()> {
    db.with_conn(|conn| {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- Catalog documents, carts and orders, stored as JSON per collection
            CREATE TABLE IF NOT EXISTS documents (
                seq         INTEGER PRIMARY KEY AUTOINCREMENT,
                id          TEXT NOT NULL UNIQUE,
                collection  TEXT NOT NULL,
                body        TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);

            -- Shop accounts
            CREATE TABLE IF NOT EXISTS users (
                id              TEXT PRIMARY KEY,
                firstname       TEXT NOT NULL,
                lastname        TEXT NOT NULL,
                email           TEXT NOT NULL UNIQUE COLLATE NOCASE,
                mobile          TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                role            TEXT NOT NULL DEFAULT 'user',
                wishlist        TEXT NOT NULL DEFAULT '[]',
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            -- Bearer tokens handed out at login
            CREATE TABLE IF NOT EXISTS sessions (
                token           TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                expires_at      TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
            "#,
        )?;
        Ok(())
    })
}
