use std::time::Duration;

use crate::session::Credentials;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@gmail.com";
pub const DEFAULT_USER_EMAIL: &str = "jordan@gmail.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Where the backend lives and who to log in as.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub base_url: String,
    pub admin: Credentials,
    pub user: Credentials,
    pub timeout: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }
}

impl HarnessConfig {
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            admin: Credentials::new(DEFAULT_ADMIN_EMAIL, DEFAULT_ADMIN_EMAIL),
            user: Credentials::new(DEFAULT_USER_EMAIL, DEFAULT_USER_EMAIL),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn from_env() -> Self {
        let base_url = std::env::var("SHOPCHECK_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let admin_email = std::env::var("SHOPCHECK_ADMIN_EMAIL")
            .unwrap_or_else(|_| DEFAULT_ADMIN_EMAIL.to_string());
        let admin_password = std::env::var("SHOPCHECK_ADMIN_PASSWORD")
            .unwrap_or_else(|_| DEFAULT_ADMIN_EMAIL.to_string());
        let user_email = std::env::var("SHOPCHECK_USER_EMAIL")
            .unwrap_or_else(|_| DEFAULT_USER_EMAIL.to_string());
        let user_password = std::env::var("SHOPCHECK_USER_PASSWORD")
            .unwrap_or_else(|_| DEFAULT_USER_EMAIL.to_string());
        let timeout_secs: u64 = std::env::var("SHOPCHECK_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            base_url: normalize_base_url(&base_url),
            admin: Credentials::new(&admin_email, &admin_password),
            user: Credentials::new(&user_email, &user_password),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// The admin address decides which login route a credential pair uses.
    pub fn admin_email(&self) -> &str {
        &self.admin.email
    }
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
