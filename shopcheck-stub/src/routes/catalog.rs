//! CRUD routes shared by every catalog collection.

use axum::{
    extract::{Path, State},
    routing::{get, MethodRouter},
    Json, Router,
};
use chrono::SecondsFormat;
use shopcheck::{assertions::parse_instant, resources::slugify};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::db::documents::ID_FIELD;
use crate::db::is_object_id;
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::AdminUser;
use crate::AppState;

const PROTECTED: [&str; 4] = [ID_FIELD, "createdAt", "updatedAt", "__v"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Blog,
    Brand,
    Category,
    Color,
    Coupon,
    Product,
}

impl Collection {
    pub fn name(self) -> &'static str {
        match self {
            Collection::Blog => "blog",
            Collection::Brand => "brand",
            Collection::Category => "category",
            Collection::Color => "color",
            Collection::Coupon => "coupon",
            Collection::Product => "product",
        }
    }

    fn model(self) -> &'static str {
        match self {
            Collection::Blog => "Blog",
            Collection::Brand => "Brand",
            Collection::Category => "Category",
            Collection::Color => "Color",
            Collection::Coupon => "Coupon",
            Collection::Product => "Product",
        }
    }

    fn required(self) -> &'static [&'static str] {
        match self {
            Collection::Blog => &["title", "description", "category"],
            Collection::Brand | Collection::Category | Collection::Color => &["title"],
            Collection::Coupon => &["name", "expiry", "discount"],
            Collection::Product => &["title", "description", "price", "category", "brand", "quantity"],
        }
    }

    fn unique(self) -> Option<&'static str> {
        match self {
            Collection::Blog => None,
            Collection::Brand | Collection::Category | Collection::Color => Some("title"),
            Collection::Coupon => Some("name"),
            Collection::Product => Some("slug"),
        }
    }

    /// Coupons are admin-only even for reads.
    pub fn reads_need_admin(self) -> bool {
        self == Collection::Coupon
    }

    fn defaults(self) -> Value {
        match self {
            Collection::Blog => json!({ "numViews": 0, "likes": [], "dislikes": [] }),
            Collection::Product => json!({ "sold": 0, "images": [], "ratings": [], "totalrating": 0 }),
            _ => json!({}),
        }
    }

    /// Turns a request body into stored fields: protected keys dropped,
    /// required keys enforced on create, per-collection normalization applied.
    pub fn prepare(self, body: Value, creating: bool) -> ApiResult<Map<String, Value>> {
        let Value::Object(mut fields) = body else {
            return Err(ApiError::validation("Request body must be a JSON object"));
        };
        for key in PROTECTED {
            fields.remove(key);
        }

        if creating {
            for &name in self.required() {
                let present = match fields.get(name) {
                    None | Some(Value::Null) => false,
                    Some(Value::String(s)) => !s.trim().is_empty(),
                    Some(_) => true,
                };
                if !present {
                    return Err(ApiError::validation(format!(
                        "{} validation failed: {}: Path `{}` is required.",
                        self.model(),
                        name,
                        name
                    )));
                }
            }
            if let Value::Object(defaults) = self.defaults() {
                for (key, value) in defaults {
                    fields.entry(key).or_insert(value);
                }
            }
        }

        match self {
            Collection::Coupon => {
                if let Some(Value::String(name)) = fields.get("name") {
                    let upper = name.to_uppercase();
                    fields.insert("name".to_string(), Value::String(upper));
                }
                if let Some(raw) = fields.get("expiry") {
                    let expiry = raw
                        .as_str()
                        .and_then(parse_instant)
                        .ok_or_else(|| ApiError::validation(format!("Cast to date failed for value {}", raw)))?;
                    fields.insert(
                        "expiry".to_string(),
                        Value::String(expiry.to_rfc3339_opts(SecondsFormat::Millis, true)),
                    );
                }
                number_field(&mut fields, "discount")?;
            }
            Collection::Product => {
                if let Some(Value::String(title)) = fields.get("title") {
                    let slug = slugify(title);
                    fields.insert("slug".to_string(), Value::String(slug));
                }
                number_field(&mut fields, "price")?;
                number_field(&mut fields, "quantity")?;
            }
            _ => {}
        }

        Ok(fields)
    }
}

/// Numeric strings are cast like the backend's schema does.
fn number_field(fields: &mut Map<String, Value>, name: &str) -> ApiResult<()> {
    if let Some(Value::String(raw)) = fields.get(name) {
        let parsed: f64 = raw
            .trim()
            .parse()
            .map_err(|_| ApiError::validation(format!("Cast to Number failed for value \"{}\" at path \"{}\"", raw, name)))?;
        fields.insert(name.to_string(), json!(parsed));
    }
    Ok(())
}

pub fn check_id(id: &str) -> ApiResult<()> {
    if is_object_id(id) {
        Ok(())
    } else {
        Err(ApiError::InvalidId)
    }
}

fn ensure_unique(kind: Collection, state: &AppState, fields: &Map<String, Value>, own_id: Option<&str>) -> ApiResult<()> {
    let Some(key) = kind.unique() else {
        return Ok(());
    };
    let Some(Value::String(value)) = fields.get(key) else {
        return Ok(());
    };
    let clash = state
        .db
        .find_documents(kind.name(), key, value)?
        .iter()
        .any(|doc| doc.get(ID_FIELD).and_then(Value::as_str) != own_id);
    if clash {
        return Err(ApiError::validation(format!(
            "E11000 duplicate key error collection: {}s index: {}_1 dup key: {{ {}: \"{}\" }}",
            kind.name(),
            key,
            key,
            value
        )));
    }
    Ok(())
}

pub fn create(kind: Collection, state: &AppState, body: Value) -> ApiResult<Json<Value>> {
    let fields = kind.prepare(body, true)?;
    ensure_unique(kind, state, &fields, None)?;
    let doc = state.db.insert_document(kind.name(), fields)?;
    info!(collection = kind.name(), id = ?doc.get(ID_FIELD), "document created");
    Ok(Json(doc))
}

pub fn list(kind: Collection, state: &AppState) -> ApiResult<Json<Vec<Value>>> {
    Ok(Json(state.db.list_documents(kind.name())?))
}

/// A well-formed id with no document answers `null`.
pub fn read(kind: Collection, state: &AppState, id: &str) -> ApiResult<Json<Option<Value>>> {
    check_id(id)?;
    Ok(Json(state.db.get_document(kind.name(), id)?))
}

pub fn update(kind: Collection, state: &AppState, id: &str, body: Value) -> ApiResult<Json<Option<Value>>> {
    check_id(id)?;
    let fields = kind.prepare(body, false)?;
    ensure_unique(kind, state, &fields, Some(id))?;
    Ok(Json(state.db.update_document(kind.name(), id, fields)?))
}

pub fn delete(kind: Collection, state: &AppState, id: &str) -> ApiResult<Json<Option<Value>>> {
    check_id(id)?;
    let removed = state.db.delete_document(kind.name(), id)?;
    if removed.is_some() {
        info!(collection = kind.name(), id, "document deleted");
    }
    Ok(Json(removed))
}

fn read_routes(kind: Collection) -> (MethodRouter<AppState>, MethodRouter<AppState>) {
    if kind.reads_need_admin() {
        (
            get(move |_: AdminUser, State(state): State<AppState>| async move { list(kind, &state) }),
            get(move |_: AdminUser, State(state): State<AppState>, Path(id): Path<String>| async move {
                read(kind, &state, &id)
            }),
        )
    } else {
        (
            get(move |State(state): State<AppState>| async move { list(kind, &state) }),
            get(move |State(state): State<AppState>, Path(id): Path<String>| async move { read(kind, &state, &id) }),
        )
    }
}

pub fn router(kind: Collection) -> Router<AppState> {
    let (list_route, item_route) = read_routes(kind);

    Router::new()
        .route(
            "/",
            list_route.post(
                move |_: AdminUser, State(state): State<AppState>, Json(body): Json<Value>| async move {
                    create(kind, &state, body)
                },
            ),
        )
        .route(
            "/:id",
            item_route
                .put(
                    move |_: AdminUser,
                          State(state): State<AppState>,
                          Path(id): Path<String>,
                          Json(body): Json<Value>| async move { update(kind, &state, &id, body) },
                )
                .delete(
                    move |_: AdminUser, State(state): State<AppState>, Path(id): Path<String>| async move {
                        delete(kind, &state, &id)
                    },
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::test_support::{admin_token, authed, body_json, user_token};
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    fn create_app() -> (Router, Database) {
        let db = Database::new_in_memory().unwrap();
        let state = AppState { db: db.clone() };
        let app = Router::new()
            .nest("/api/color", router(Collection::Color))
            .nest("/api/coupon", router(Collection::Coupon))
            .with_state(state);
        (app, db)
    }

    #[test]
    fn coupon_names_are_uppercased_and_expiry_is_a_datetime() {
        let fields = Collection::Coupon
            .prepare(json!({ "name": "Summer Sale", "discount": "20", "expiry": "2031-12-31" }), true)
            .unwrap();
        assert_eq!(fields["name"], "SUMMER SALE");
        assert_eq!(fields["discount"], 20.0);
        assert_eq!(fields["expiry"], "2031-12-31T00:00:00.000Z");
    }

    #[test]
    fn product_slug_tracks_title() {
        let fields = Collection::Product
            .prepare(
                json!({ "title": "New Test Product", "slug": "ignored", "description": "d", "price": 1,
                        "category": "c", "brand": "b", "quantity": 1 }),
                true,
            )
            .unwrap();
        assert_eq!(fields["slug"], "new-test-product");
        assert_eq!(fields["sold"], 0);
    }

    #[test]
    fn missing_required_field_fails_on_create_only() {
        let err = Collection::Blog.prepare(json!({ "title": "t" }), true).unwrap_err();
        assert!(err.to_string().contains("Path `description` is required"));
        assert!(Collection::Blog.prepare(json!({ "title": "t" }), false).is_ok());
    }

    #[test]
    fn protected_fields_are_dropped() {
        let fields = Collection::Color
            .prepare(json!({ "title": "Red", "_id": "x", "createdAt": "y" }), true)
            .unwrap();
        assert!(!fields.contains_key("_id"));
        assert!(!fields.contains_key("createdAt"));
    }

    #[tokio::test]
    async fn color_lifecycle_over_http() {
        let (app, db) = create_app();
        let token = admin_token(&db);

        let response = app
            .clone()
            .oneshot(authed("POST", "/api/color", &token, Some(json!({ "title": "Teal" }))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let created = body_json(response).await;
        let id = created["_id"].as_str().unwrap().to_string();
        assert_eq!(created["createdAt"], created["updatedAt"]);

        let response = app
            .clone()
            .oneshot(Request::builder().uri(format!("/api/color/{}", id)).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await["title"], "Teal");

        let response = app
            .clone()
            .oneshot(authed("DELETE", &format!("/api/color/{}", id), &token, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::builder().uri(format!("/api/color/{}", id)).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"null");
    }

    #[tokio::test]
    async fn malformed_id_is_a_500() {
        let (app, _db) = create_app();
        let response = app
            .oneshot(Request::builder().uri("/api/color/InvalidColorId").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["message"], "This id is not valid or not Found");
    }

    #[tokio::test]
    async fn coupon_reads_need_an_admin() {
        let (app, db) = create_app();
        let shopper = user_token(&db);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/api/coupon").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = app.oneshot(authed("GET", "/api/coupon", &shopper, None)).await.unwrap();
        assert_eq!(body_json(response).await["message"], "You are not an admin");
    }

    #[tokio::test]
    async fn duplicate_titles_are_refused() {
        let (app, db) = create_app();
        let token = admin_token(&db);
        let first = app
            .clone()
            .oneshot(authed("POST", "/api/color", &token, Some(json!({ "title": "Red" }))))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(authed("POST", "/api/color", &token, Some(json!({ "title": "Red" }))))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_json(second).await["message"].as_str().unwrap().contains("E11000"));
    }
}
