//! End-to-end checks for the shop REST API.
//!
//! Resource suites drive a create/read/update/delete lifecycle per resource
//! type plus a negative pass with a bad token and a bogus id. Flow suites
//! chain calls across resources (cart, orders, accounts, ratings).

pub mod assertions;
pub mod client;
pub mod config;
pub mod error;
pub mod flows;
pub mod lifecycle;
pub mod negative;
pub mod resources;
pub mod session;
pub mod suites;

pub use client::{ApiClient, ApiResponse, HttpApiClient, MockApiClient};
pub use config::HarnessConfig;
pub use error::{HarnessError, Mismatch, Result};
pub use session::{Credentials, Session};
pub use suites::{run_suite, run_suites, Suite, SuiteContext, SuiteReport};
