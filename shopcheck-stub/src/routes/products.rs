//! Shopper interactions with products: ratings, wishlist, images.

use axum::{
    extract::{Path, State},
    routing::put,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::info;

use super::catalog::check_id;
use crate::db::new_object_id;
use crate::db::users::User;
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::{AdminUser, AuthUser};
use crate::AppState;

const PRODUCTS: &str = "product";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistRequest {
    prod_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingRequest {
    star: Value,
    prod_id: String,
    #[serde(default)]
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    #[serde(default)]
    images: Vec<Value>,
}

pub async fn toggle_wishlist(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<WishlistRequest>,
) -> ApiResult<Json<User>> {
    check_id(&payload.prod_id)?;
    let user = state
        .db
        .toggle_wishlist(&auth.user.id, &payload.prod_id)?
        .ok_or(ApiError::InvalidToken)?;
    Ok(Json(user))
}

fn star_value(star: &Value) -> Option<f64> {
    match star {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|s| (1.0..=5.0).contains(s))
}

/// One rating per shopper; rating again replaces the earlier one. The
/// product's `totalrating` is the rounded average.
pub async fn rate(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<RatingRequest>,
) -> ApiResult<Json<Value>> {
    check_id(&payload.prod_id)?;
    let star = star_value(&payload.star)
        .ok_or_else(|| ApiError::validation("star must be a number between 1 and 5"))?;
    let product = state
        .db
        .get_document(PRODUCTS, &payload.prod_id)?
        .ok_or_else(|| ApiError::validation("Product not found"))?;

    let mut ratings: Vec<Value> = product
        .get("ratings")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let entry = json!({ "star": star, "comment": payload.comment, "postedby": auth.user.id });
    match ratings
        .iter_mut()
        .find(|r| r.get("postedby").and_then(Value::as_str) == Some(auth.user.id.as_str()))
    {
        Some(existing) => *existing = entry,
        None => ratings.push(entry),
    }

    let sum: f64 = ratings.iter().filter_map(|r| r.get("star").and_then(Value::as_f64)).sum();
    let total = (sum / ratings.len() as f64).round();

    let mut patch = Map::new();
    patch.insert("ratings".to_string(), Value::Array(ratings));
    patch.insert("totalrating".to_string(), json!(total));
    let updated = state
        .db
        .update_document(PRODUCTS, &payload.prod_id, patch)?
        .ok_or_else(|| ApiError::validation("Product not found"))?;

    info!(product = %payload.prod_id, total, "product rated");
    Ok(Json(updated))
}

/// Images arrive as URLs (or already-shaped objects) and are stored as
/// `{url, asset_id, public_id}` entries.
pub async fn upload_images(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UploadRequest>,
) -> ApiResult<Json<Option<Value>>> {
    check_id(&id)?;
    let images: Vec<Value> = payload
        .images
        .into_iter()
        .map(|image| match image {
            Value::String(url) => json!({ "url": url, "asset_id": new_object_id(), "public_id": url }),
            other => other,
        })
        .collect();

    let mut patch = Map::new();
    patch.insert("images".to_string(), Value::Array(images));
    Ok(Json(state.db.update_document(PRODUCTS, &id, patch)?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/wishlist", put(toggle_wishlist))
        .route("/rating", put(rate))
        .route("/upload/:id", put(upload_images))
}
