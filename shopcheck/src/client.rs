use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use http::header::AUTHORIZATION;
use http::{Method, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};

/// Status and raw body of one API call. The body is kept as text because the
/// backend answers some reads with an empty body or the literal `null`.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Parsed body, or `None` when it is not JSON.
    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

#[async_trait]
pub trait ApiClient: Send + Sync {
    fn base_url(&self) -> &str;

    async fn send(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> Result<ApiResponse>;
}

pub struct HttpApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpApiClient {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, client })
    }

    pub fn from_config(config: &HarnessConfig) -> Result<Self> {
        Self::new(config.base_url.clone(), config.timeout)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

#[async_trait]
impl ApiClient for HttpApiClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> Result<ApiResponse> {
        let url = self.url(path);
        let mut req = self.client.request(method.clone(), &url);

        if let Some(token) = token {
            req = req.header(AUTHORIZATION, bearer(token));
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        debug!(%method, %url, status = status.as_u16(), "api call");

        Ok(ApiResponse::new(status, text))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub token: Option<String>,
    pub body: Option<Value>,
}

/// Replays scripted responses in order and records every request.
#[derive(Default)]
pub struct MockApiClient {
    pub responses: Mutex<VecDeque<ApiResponse>>,
    pub requests: Mutex<Vec<RecordedRequest>>,
}

impl MockApiClient {
    pub fn enqueue(&self, status: StatusCode, body: impl Into<String>) {
        self.responses
            .lock()
            .unwrap()
            .push_back(ApiResponse::new(status, body));
    }

    pub fn enqueue_json(&self, status: StatusCode, body: &Value) {
        self.enqueue(status, body.to_string());
    }

    /// `"METHOD path"` for every request seen so far.
    pub fn calls(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| format!("{} {}", r.method, r.path))
            .collect()
    }
}

#[async_trait]
impl ApiClient for MockApiClient {
    fn base_url(&self) -> &str {
        "mock://shop/api"
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> Result<ApiResponse> {
        self.requests.lock().unwrap().push(RecordedRequest {
            method: method.clone(),
            path: path.to_string(),
            token: token.map(str::to_string),
            body: body.cloned(),
        });
        self.responses.lock().unwrap().pop_front().ok_or_else(|| {
            HarnessError::Precondition(format!("No mock response scripted for {} {}", method, path))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn mock_client_records_calls_and_replays_in_order() {
        let mock = MockApiClient::default();
        mock.enqueue_json(StatusCode::OK, &json!({"_id": "a1"}));
        mock.enqueue(StatusCode::OK, "null");

        let first = mock
            .send(Method::POST, "color", Some("tok"), Some(&json!({"title": "Red"})))
            .await
            .unwrap();
        let second = mock.send(Method::GET, "color/a1", None, None).await.unwrap();

        assert_eq!(first.json().unwrap()["_id"], "a1");
        assert_eq!(second.body, "null");
        assert_eq!(mock.calls(), vec!["POST color", "GET color/a1"]);

        let requests = mock.requests.lock().unwrap();
        assert_eq!(requests[0].token.as_deref(), Some("tok"));
        assert_eq!(requests[1].token, None);
    }

    #[tokio::test]
    async fn mock_client_errors_when_script_is_exhausted() {
        let mock = MockApiClient::default();
        let err = mock.send(Method::DELETE, "blog/x", None, None).await.unwrap_err();
        assert!(matches!(err, HarnessError::Precondition(_)));
    }

    #[test]
    fn http_client_joins_paths_without_double_slash() {
        let client =
            HttpApiClient::new("http://localhost:5000/api".to_string(), Duration::from_secs(5))
                .unwrap();
        assert_eq!(client.url("/blog/1"), "http://localhost:5000/api/blog/1");
        assert_eq!(client.url("user/login"), "http://localhost:5000/api/user/login");
        assert_eq!(client.base_url(), "http://localhost:5000/api");
    }

    #[test]
    fn bearer_header_format() {
        assert_eq!(bearer("InvalidToken"), "Bearer InvalidToken");
    }

    #[test]
    fn non_json_body_parses_to_none() {
        assert!(ApiResponse::new(StatusCode::OK, "").json().is_none());
        assert_eq!(ApiResponse::new(StatusCode::OK, "null").json(), Some(Value::Null));
    }
}
