use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use std::path::PathBuf;
use anyhow::Result;

pub mod documents;
mod migrations;
pub mod seed;
pub mod sessions;
pub mod users;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    pub fn new(database_path: PathBuf) -> Result<Self> {
        if let Some(parent) = database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let manager = SqliteConnectionManager::file(&database_path);
        let pool = Pool::builder()
            .max_size(8)
            .build(manager)?;

        let db = Self { pool };
        migrations::run(&db)?;
        Ok(db)
    }

    /// A single pooled connection, since every in-memory connection is its
    /// own database.
    pub fn new_in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)?;

        let db = Self { pool };
        migrations::run(&db)?;
        Ok(db)
    }

    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&rusqlite::Connection) -> Result<T>,
    {
        let conn = self.pool.get()?;
        f(&conn)
    }
}

/// Opens `STUB_DATABASE_PATH` when set, otherwise a fresh in-memory store.
pub fn init() -> Result<Database> {
    match std::env::var("STUB_DATABASE_PATH") {
        Ok(path) if !path.trim().is_empty() => Database::new(PathBuf::from(path)),
        _ => Database::new_in_memory(),
    }
}

/// Mongo-style object id: 12 random bytes, hex encoded.
pub fn new_object_id() -> String {
    use rand::Rng;
    let bytes: [u8; 12] = rand::thread_rng().gen();
    hex::encode(bytes)
}

pub fn is_object_id(id: &str) -> bool {
    id.len() == 24 && hex::decode(id).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn object_ids_are_24_hex_chars() {
        let id = new_object_id();
        assert_eq!(id.len(), 24);
        assert!(is_object_id(&id));
        assert_ne!(id, new_object_id());
    }

    #[test]
    fn malformed_ids_are_rejected() {
        assert!(!is_object_id("InvalidBlogId"));
        assert!(!is_object_id("65a1b2c3d4e5f6a7b8c9d0e")); // 23 chars
        assert!(!is_object_id("zza1b2c3d4e5f6a7b8c9d0e1"));
        assert!(is_object_id("65A1B2C3D4E5F6A7B8C9D0E1"));
    }

    #[test]
    fn file_database_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("shop.db");
        let db = Database::new(path.clone()).unwrap();
        assert!(path.exists());
        assert!(db.conn().is_ok());
    }
}
