use anyhow::Result;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::users::User;
use super::Database;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub expires_at: String,
    pub created_at: String,
}

impl Database {
    pub fn create_session(&self, token: &str, user_id: &str, ttl_days: i64) -> Result<Session> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (token, user_id, expires_at, created_at)
                 VALUES (?1, ?2, datetime('now', ?3 || ' days'), datetime('now'))",
                params![token, user_id, ttl_days],
            )?;

            let session = conn.query_row(
                "SELECT token, user_id, expires_at, created_at FROM sessions WHERE token = ?1",
                params![token],
                |row| {
                    Ok(Session {
                        token: row.get(0)?,
                        user_id: row.get(1)?,
                        expires_at: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )?;
            Ok(session)
        })
    }

    /// The account behind an unexpired token.
    pub fn session_user(&self, token: &str) -> Result<Option<User>> {
        let user_id: Option<String> = self.with_conn(|conn| {
            let user_id = conn
                .query_row(
                    "SELECT user_id FROM sessions
                     WHERE token = ?1 AND datetime(expires_at) > datetime('now')",
                    params![token],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(user_id)
        })?;

        match user_id {
            Some(id) => self.get_user_by_id(&id),
            None => Ok(None),
        }
    }

    pub fn delete_session(&self, token: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
            Ok(())
        })
    }

    pub fn cleanup_expired_sessions(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM sessions WHERE datetime(expires_at) <= datetime('now')",
                [],
            )?;
            Ok(deleted as u64)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::users::{NewUser, ROLE_ADMIN};

    fn admin(db: &Database) -> User {
        db.create_user(&NewUser {
            firstname: "Admin",
            lastname: "Shop",
            email: "admin@gmail.com",
            mobile: "0888999000",
            password: "admin@gmail.com",
            role: ROLE_ADMIN,
        })
        .unwrap()
    }

    #[test]
    fn token_resolves_to_its_user() {
        let db = Database::new_in_memory().unwrap();
        let user = admin(&db);
        let session = db.create_session("t1", &user.id, 3).unwrap();
        assert_eq!(session.user_id, user.id);

        let found = db.session_user("t1").unwrap().unwrap();
        assert!(found.is_admin());
        assert!(db.session_user("InvalidToken").unwrap().is_none());
    }

    #[test]
    fn expired_sessions_are_ignored_and_cleaned_up() {
        let db = Database::new_in_memory().unwrap();
        let user = admin(&db);
        db.create_session("old", &user.id, -1).unwrap();
        db.create_session("new", &user.id, 1).unwrap();

        assert!(db.session_user("old").unwrap().is_none());
        assert_eq!(db.cleanup_expired_sessions().unwrap(), 1);
        assert!(db.session_user("new").unwrap().is_some());
    }

    #[test]
    fn deleted_session_no_longer_resolves() {
        let db = Database::new_in_memory().unwrap();
        let user = admin(&db);
        db.create_session("t2", &user.id, 3).unwrap();
        db.delete_session("t2").unwrap();
        assert!(db.session_user("t2").unwrap().is_none());
    }
}
