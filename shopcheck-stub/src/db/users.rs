use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::documents::{now_iso, touch_after};
use super::{new_object_id, Database};

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";

/// Public view of an account; the password hash never leaves this module.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub mobile: String,
    pub role: String,
    pub wishlist: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub firstname: &'a str,
    pub lastname: &'a str,
    pub email: &'a str,
    pub mobile: &'a str,
    pub password: &'a str,
    pub role: &'a str,
}

#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Failed to hash password: {}", e))?
        .to_string())
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}

const USER_COLUMNS: &str =
    "id, firstname, lastname, email, mobile, role, wishlist, created_at, updated_at";

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    let wishlist: String = row.get(6)?;
    Ok(User {
        id: row.get(0)?,
        firstname: row.get(1)?,
        lastname: row.get(2)?,
        email: row.get(3)?,
        mobile: row.get(4)?,
        role: row.get(5)?,
        wishlist: serde_json::from_str(&wishlist).unwrap_or_default(),
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

impl Database {
    pub fn create_user(&self, new: &NewUser) -> Result<User> {
        if self.get_user_by_email(new.email)?.is_some() {
            return Err(anyhow!("User Already Exists"));
        }
        let id = new_object_id();
        let hash = hash_password(new.password)?;
        let stamp = now_iso();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, firstname, lastname, email, mobile, password_hash, role, wishlist, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, '[]', ?8, ?8)",
                params![id, new.firstname, new.lastname, new.email, new.mobile, hash, new.role, stamp],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    anyhow!("User Already Exists")
                }
                other => other.into(),
            })?;
            Ok(())
        })?;

        self.get_user_by_id(&id)?
            .ok_or_else(|| anyhow!("Failed to load created user"))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let user = conn
                .query_row(
                    &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                    params![id],
                    row_to_user,
                )
                .optional()?;
            Ok(user)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let user = conn
                .query_row(
                    &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
                    params![email],
                    row_to_user,
                )
                .optional()?;
            Ok(user)
        })
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {} FROM users ORDER BY created_at", USER_COLUMNS))?;
            let users = stmt
                .query_map([], row_to_user)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(users)
        })
    }

    /// `None` when the email is unknown or the password does not match.
    pub fn verify_credentials(&self, email: &str, password: &str) -> Result<Option<User>> {
        let hash: Option<String> = self.with_conn(|conn| {
            let hash = conn
                .query_row(
                    "SELECT password_hash FROM users WHERE email = ?1",
                    params![email],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(hash)
        })?;

        match hash {
            Some(h) if verify_password(password, &h) => self.get_user_by_email(email),
            _ => Ok(None),
        }
    }

    pub fn update_user(&self, id: &str, changes: &UserChanges) -> Result<Option<User>> {
        let Some(current) = self.get_user_by_id(id)? else {
            return Ok(None);
        };
        let stamp = touch_after(Some(&current.updated_at));

        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET firstname = ?1, lastname = ?2, email = ?3, mobile = ?4, updated_at = ?5
                 WHERE id = ?6",
                params![
                    changes.firstname.as_deref().unwrap_or(&current.firstname),
                    changes.lastname.as_deref().unwrap_or(&current.lastname),
                    changes.email.as_deref().unwrap_or(&current.email),
                    changes.mobile.as_deref().unwrap_or(&current.mobile),
                    stamp,
                    id,
                ],
            )?;
            Ok(())
        })?;
        self.get_user_by_id(id)
    }

    /// Adds `product_id` to the wishlist, or removes it when already there.
    pub fn toggle_wishlist(&self, id: &str, product_id: &str) -> Result<Option<User>> {
        let Some(user) = self.get_user_by_id(id)? else {
            return Ok(None);
        };
        let mut wishlist = user.wishlist;
        if let Some(pos) = wishlist.iter().position(|p| p == product_id) {
            wishlist.remove(pos);
        } else {
            wishlist.push(product_id.to_string());
        }
        let stamp = touch_after(Some(&user.updated_at));

        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET wishlist = ?1, updated_at = ?2 WHERE id = ?3",
                params![serde_json::to_string(&wishlist)?, stamp, id],
            )?;
            Ok(())
        })?;
        self.get_user_by_id(id)
    }

    /// Drops the account and every session it holds.
    pub fn delete_user(&self, id: &str) -> Result<Option<User>> {
        let existing = self.get_user_by_id(id)?;
        if existing.is_some() {
            self.with_conn(|conn| {
                conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![id])?;
                conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
                Ok(())
            })?;
        }
        Ok(existing)
    }
}
