use anyhow::Result;
use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, OptionalExtension};
use serde_json::{Map, Value};

use super::{new_object_id, Database};

pub const ID_FIELD: &str = "_id";
const PROTECTED_FIELDS: [&str; 3] = [ID_FIELD, "createdAt", "__v"];

pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A timestamp strictly after `previous`, even when the clock has not moved
/// past it at millisecond resolution.
pub fn touch_after(previous: Option<&str>) -> String {
    let now = Utc::now().trunc_subsecs(3);
    let prev = previous
        .and_then(|p| DateTime::parse_from_rfc3339(p).ok())
        .map(|p| p.with_timezone(&Utc));
    let stamp = match prev {
        Some(p) if now <= p => p + Duration::milliseconds(1),
        _ => now,
    };
    stamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_body(raw: String) -> Result<Value> {
    Ok(serde_json::from_str(&raw)?)
}

impl Database {
    pub fn insert_document(&self, collection: &str, mut body: Map<String, Value>) -> Result<Value> {
        let id = new_object_id();
        let stamp = now_iso();
        body.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        body.insert("createdAt".to_string(), Value::String(stamp.clone()));
        body.insert("updatedAt".to_string(), Value::String(stamp));
        body.insert("__v".to_string(), Value::from(0));
        let doc = Value::Object(body);

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO documents (id, collection, body) VALUES (?1, ?2, ?3)",
                params![id, collection, serde_json::to_string(&doc)?],
            )?;
            Ok(())
        })?;
        Ok(doc)
    }

    pub fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let raw = self.with_conn(|conn| {
            let raw = conn
                .query_row(
                    "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                    params![collection, id],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            Ok(raw)
        })?;
        raw.map(parse_body).transpose()
    }

    /// In insertion order.
    pub fn list_documents(&self, collection: &str) -> Result<Vec<Value>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT body FROM documents WHERE collection = ?1 ORDER BY seq")?;
            let rows = stmt
                .query_map(params![collection], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(parse_body).collect()
    }

    /// Documents whose top-level string `field` equals `value`, oldest first.
    pub fn find_documents(&self, collection: &str, field: &str, value: &str) -> Result<Vec<Value>> {
        let path = format!("$.{}", field);
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT body FROM documents
                 WHERE collection = ?1 AND json_extract(body, ?2) = ?3
                 ORDER BY seq",
            )?;
            let rows = stmt
                .query_map(params![collection, path, value], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(parse_body).collect()
    }

    /// Merges `patch` into the stored document and bumps `updatedAt`.
    /// Identity and creation fields cannot be patched.
    pub fn update_document(&self, collection: &str, id: &str, patch: Map<String, Value>) -> Result<Option<Value>> {
        let Some(mut doc) = self.get_document(collection, id)? else {
            return Ok(None);
        };
        let Some(fields) = doc.as_object_mut() else {
            return Ok(None);
        };

        for (key, value) in patch {
            if !PROTECTED_FIELDS.contains(&key.as_str()) {
                fields.insert(key, value);
            }
        }
        let stamp = touch_after(fields.get("updatedAt").and_then(Value::as_str));
        fields.insert("updatedAt".to_string(), Value::String(stamp));

        self.with_conn(|conn| {
            conn.execute(
                "UPDATE documents SET body = ?1 WHERE collection = ?2 AND id = ?3",
                params![serde_json::to_string(&doc)?, collection, id],
            )?;
            Ok(())
        })?;
        Ok(Some(doc))
    }

    /// Returns the removed document.
    pub fn delete_document(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let existing = self.get_document(collection, id)?;
        if existing.is_some() {
            self.with_conn(|conn| {
                conn.execute(
                    "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                    params![collection, id],
                )?;
                Ok(())
            })?;
        }
        Ok(existing)
    }

    pub fn count_documents(&self, collection: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                params![collection],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }
}
