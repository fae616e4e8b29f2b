use std::sync::Arc;

use http::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::client::{ApiClient, ApiResponse};
use crate::error::{HarnessError, Result};

pub const ADMIN_LOGIN_PATH: &str = "user/admin-login";
pub const USER_LOGIN_PATH: &str = "user/login";

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.to_string(),
            password: password.to_string(),
        }
    }
}

/// Admin accounts must use the admin login route; everyone else the regular one.
pub fn login_path(email: &str, admin_email: &str) -> &'static str {
    if email.eq_ignore_ascii_case(admin_email) {
        ADMIN_LOGIN_PATH
    } else {
        USER_LOGIN_PATH
    }
}

/// A successful login: the token plus the full body (which carries `_id`).
#[derive(Debug, Clone)]
pub struct Login {
    pub token: String,
    pub body: Value,
}

impl Login {
    pub fn user_id(&self) -> Option<&str> {
        self.body.get("_id").and_then(Value::as_str)
    }
}

/// Single login attempt. Anything but 200 with a non-empty `token` is fatal
/// for the caller; the error carries the status and raw body.
pub async fn log_in(
    client: &dyn ApiClient,
    credentials: &Credentials,
    admin_email: &str,
) -> Result<Login> {
    if credentials.email.is_empty() || credentials.password.is_empty() {
        return Err(HarnessError::Precondition(
            "email and password must not be empty".to_string(),
        ));
    }

    let path = login_path(&credentials.email, admin_email);
    let body = serde_json::to_value(credentials)
        .map_err(|e| HarnessError::Precondition(e.to_string()))?;
    let resp = client.send(Method::POST, path, None, Some(&body)).await?;

    if resp.status != StatusCode::OK {
        return Err(HarnessError::Authentication {
            status: resp.status,
            body: resp.body,
        });
    }

    let parsed = resp.json().unwrap_or(Value::Null);
    let token = parsed
        .get("token")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    match token {
        Some(token) => {
            info!(email = %credentials.email, route = path, "authenticated");
            Ok(Login { token, body: parsed })
        }
        None => Err(HarnessError::Authentication {
            status: resp.status,
            body: resp.body,
        }),
    }
}

pub async fn authenticate(
    client: &dyn ApiClient,
    credentials: &Credentials,
    admin_email: &str,
) -> Result<String> {
    log_in(client, credentials, admin_email)
        .await
        .map(|login| login.token)
}

/// A client plus, once logged in, the bearer token for privileged calls.
#[derive(Clone)]
pub struct Session {
    client: Arc<dyn ApiClient>,
    token: Option<String>,
}

impl Session {
    pub fn anonymous(client: Arc<dyn ApiClient>) -> Self {
        Self { client, token: None }
    }

    pub fn with_token(client: Arc<dyn ApiClient>, token: impl Into<String>) -> Self {
        Self {
            client,
            token: Some(token.into()),
        }
    }

    pub async fn open(
        client: Arc<dyn ApiClient>,
        credentials: &Credentials,
        admin_email: &str,
    ) -> Result<Self> {
        let token = authenticate(client.as_ref(), credentials, admin_email).await?;
        Ok(Self::with_token(client, token))
    }

    pub fn base_url(&self) -> &str {
        self.client.base_url()
    }

    pub fn client(&self) -> &Arc<dyn ApiClient> {
        &self.client
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Token for a privileged call; an empty or absent token is refused.
    pub fn bearer(&self) -> Result<&str> {
        match self.token.as_deref() {
            Some(t) if !t.is_empty() => Ok(t),
            _ => Err(HarnessError::MissingToken),
        }
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        authed: bool,
        body: Option<&Value>,
    ) -> Result<ApiResponse> {
        let token = if authed { Some(self.bearer()?) } else { None };
        self.client.send(method, path, token, body).await
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.request(Method::GET, path, false, None).await
    }

    pub async fn get_authed(&self, path: &str) -> Result<ApiResponse> {
        self.request(Method::GET, path, true, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.request(Method::POST, path, true, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.request(Method::PUT, path, true, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.request(Method::DELETE, path, true, None).await
    }
}
