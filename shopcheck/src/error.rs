use std::fmt;

use http::StatusCode;
use thiserror::Error;

/// One failed expectation against a response.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub step: String,
    pub field: Option<String>,
    pub expected: String,
    pub actual: String,
}

impl Mismatch {
    pub fn new(step: impl Into<String>, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            field: None,
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn on_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn status(step: &str, expected: &str, actual: StatusCode, body: &str) -> Self {
        Self::new(step, expected, format!("{} with body {}", actual, truncate(body)))
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(
                f,
                "{}: field '{}' expected {}, got {}",
                self.step, field, self.expected, self.actual
            ),
            None => write!(f, "{}: expected {}, got {}", self.step, self.expected, self.actual),
        }
    }
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Authentication failed with status code: {status} content: {body}")]
    Authentication { status: StatusCode, body: String },

    #[error("session holds no bearer token for a privileged call")]
    MissingToken,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{0}")]
    Assertion(Mismatch),

    #[error("precondition not met: {0}")]
    Precondition(String),
}

impl From<Mismatch> for HarnessError {
    fn from(mismatch: Mismatch) -> Self {
        HarnessError::Assertion(mismatch)
    }
}

impl HarnessError {
    pub fn mismatch(&self) -> Option<&Mismatch> {
        match self {
            HarnessError::Assertion(m) => Some(m),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;

const MAX_BODY_IN_MESSAGE: usize = 300;

pub(crate) fn truncate(body: &str) -> String {
    if body.is_empty() {
        return "<empty>".to_string();
    }
    if body.chars().count() <= MAX_BODY_IN_MESSAGE {
        return body.to_string();
    }
    let cut: String = body.chars().take(MAX_BODY_IN_MESSAGE).collect();
    format!("{}…", cut)
}
