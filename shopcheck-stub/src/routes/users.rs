use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use super::catalog::check_id;
use crate::db::users::{NewUser, User, UserChanges, ROLE_USER};
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::{AdminUser, AuthUser};
use crate::AppState;

const SESSION_TTL_DAYS: i64 = 3;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    firstname: Option<String>,
    lastname: Option<String>,
    email: Option<String>,
    mobile: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub mobile: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct EditUserRequest {
    firstname: Option<String>,
    lastname: Option<String>,
    email: Option<String>,
    mobile: Option<String>,
}

fn required(value: Option<String>, name: &str) -> ApiResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ApiError::validation(format!(
            "User validation failed: {}: Path `{}` is required.",
            name, name
        ))),
    }
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<Json<User>> {
    let firstname = required(payload.firstname, "firstname")?;
    let lastname = required(payload.lastname, "lastname")?;
    let email = required(payload.email, "email")?;
    let mobile = required(payload.mobile, "mobile")?;
    let password = required(payload.password, "password")?;

    let user = state.db.create_user(&NewUser {
        firstname: &firstname,
        lastname: &lastname,
        email: &email,
        mobile: &mobile,
        password: &password,
        role: ROLE_USER,
    })?;

    info!(user = %user.id, "user registered");
    Ok(Json(user))
}

fn open_session(state: &AppState, payload: &LoginRequest, admin_only: bool) -> ApiResult<LoginResponse> {
    let user = state
        .db
        .verify_credentials(&payload.email, &payload.password)?
        .ok_or(ApiError::InvalidCredentials)?;
    if admin_only && !user.is_admin() {
        return Err(ApiError::validation("Not Authorised"));
    }

    let token = Uuid::new_v4().simple().to_string();
    state.db.create_session(&token, &user.id, SESSION_TTL_DAYS)?;
    info!(user = %user.id, admin = admin_only, "session opened");

    Ok(LoginResponse {
        id: user.id,
        firstname: user.firstname,
        lastname: user.lastname,
        email: user.email,
        mobile: user.mobile,
        token,
    })
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    Ok(Json(open_session(&state, &payload, false)?))
}

pub async fn admin_login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    Ok(Json(open_session(&state, &payload, true)?))
}

pub async fn logout(auth: AuthUser, State(state): State<AppState>) -> ApiResult<StatusCode> {
    state.db.delete_session(&auth.token)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn edit_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<EditUserRequest>,
) -> ApiResult<Json<Option<User>>> {
    if let Some(email) = payload.email.as_deref() {
        if let Some(other) = state.db.get_user_by_email(email)? {
            if other.id != auth.user.id {
                return Err(ApiError::validation("User Already Exists"));
            }
        }
    }

    let changes = UserChanges {
        firstname: payload.firstname,
        lastname: payload.lastname,
        email: payload.email,
        mobile: payload.mobile,
    };
    Ok(Json(state.db.update_user(&auth.user.id, &changes)?))
}

pub async fn all_users(_admin: AdminUser, State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.db.list_users()?))
}

pub async fn get_user(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Option<User>>> {
    check_id(&id)?;
    Ok(Json(state.db.get_user_by_id(&id)?))
}

/// The shopper's wishlist with product documents in place of ids.
pub async fn wishlist(auth: AuthUser, State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let mut products = Vec::with_capacity(auth.user.wishlist.len());
    for id in &auth.user.wishlist {
        if let Some(doc) = state.db.get_document("product", id)? {
            products.push(doc);
        }
    }
    Ok(Json(json!({ "_id": auth.user.id, "wishlist": products })))
}

/// Open route: the backend lets anyone delete an account by id.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Option<User>>> {
    check_id(&id)?;
    let removed = state.db.delete_user(&id)?;
    if removed.is_some() {
        info!(user = %id, "user deleted");
    }
    Ok(Json(removed))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/admin-login", post(admin_login))
        .route("/logout", get(logout))
        .route("/edit-user", put(edit_user))
        .route("/all-users", get(all_users))
        .route("/wishlist", get(wishlist))
        .route("/:id", get(get_user).delete(delete_user))
}
