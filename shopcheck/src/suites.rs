//! Named groups of checks, as the runner and the integration tests see them.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::client::{ApiClient, HttpApiClient};
use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};
use crate::flows;
use crate::lifecycle::{check_listing, run_lifecycle};
use crate::negative::{run_negative_lifecycle, INVALID_TOKEN};
use crate::resources::{self, fixture_tag};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Suite {
    Blog,
    Brand,
    Category,
    Color,
    Coupon,
    Product,
    Cart,
    Account,
    Engagement,
}

impl Suite {
    pub const ALL: [Suite; 9] = [
        Suite::Blog,
        Suite::Brand,
        Suite::Category,
        Suite::Color,
        Suite::Coupon,
        Suite::Product,
        Suite::Cart,
        Suite::Account,
        Suite::Engagement,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Suite::Blog => "blog",
            Suite::Brand => "brand",
            Suite::Category => "category",
            Suite::Color => "color",
            Suite::Coupon => "coupon",
            Suite::Product => "product",
            Suite::Cart => "cart",
            Suite::Account => "account",
            Suite::Engagement => "engagement",
        }
    }
}

impl fmt::Display for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Suite {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        Suite::ALL
            .into_iter()
            .find(|suite| suite.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let known: Vec<&str> = Suite::ALL.iter().map(|s| s.name()).collect();
                HarnessError::Precondition(format!("unknown suite '{}', expected one of {}", s, known.join(", ")))
            })
    }
}

#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub name: String,
    pub error: Option<String>,
}

impl CheckOutcome {
    pub fn passed(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct SuiteReport {
    pub suite: Suite,
    pub checks: Vec<CheckOutcome>,
}

impl SuiteReport {
    fn new(suite: Suite) -> Self {
        Self {
            suite,
            checks: Vec::new(),
        }
    }

    pub fn passed(&self) -> bool {
        self.checks.iter().all(CheckOutcome::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.checks.iter().filter(|c| !c.passed())
    }

    /// Records the outcome of one check. Failures inside a check, including
    /// a throwaway account that cannot log in, never stop the suite; only the
    /// shared admin and user sessions are fatal, and those are opened outside.
    fn record<T>(&mut self, name: impl Into<String>, outcome: Result<T>) {
        let name = name.into();
        match outcome {
            Ok(_) => {
                info!(suite = %self.suite, check = %name, "passed");
                self.checks.push(CheckOutcome { name, error: None });
            }
            Err(e) => {
                warn!(suite = %self.suite, check = %name, error = %e, "failed");
                self.checks.push(CheckOutcome {
                    name,
                    error: Some(e.to_string()),
                });
            }
        }
    }
}

/// Shared client plus lazily opened admin and shopper sessions. Each login
/// happens at most once per context.
pub struct SuiteContext {
    config: HarnessConfig,
    client: Arc<dyn ApiClient>,
    admin: OnceCell<Session>,
    user: OnceCell<Session>,
}

impl SuiteContext {
    pub fn new(config: HarnessConfig, client: Arc<dyn ApiClient>) -> Self {
        Self {
            config,
            client,
            admin: OnceCell::new(),
            user: OnceCell::new(),
        }
    }

    pub fn from_config(config: HarnessConfig) -> Result<Self> {
        let client = HttpApiClient::from_config(&config)?;
        Ok(Self::new(config, Arc::new(client)))
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn anonymous(&self) -> Session {
        Session::anonymous(self.client.clone())
    }

    pub async fn admin(&self) -> Result<&Session> {
        self.admin
            .get_or_try_init(|| Session::open(self.client.clone(), &self.config.admin, self.config.admin_email()))
            .await
    }

    pub async fn user(&self) -> Result<&Session> {
        self.user
            .get_or_try_init(|| Session::open(self.client.clone(), &self.config.user, self.config.admin_email()))
            .await
    }
}

fn invalid_id_for(name: &str) -> String {
    let mut chars = name.chars();
    let capitalized: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    format!("Invalid{}Id", capitalized)
}

pub async fn run_suite(suite: Suite, ctx: &SuiteContext) -> Result<SuiteReport> {
    let mut report = SuiteReport::new(suite);
    let tag = fixture_tag();

    match suite {
        Suite::Cart => {
            let admin = ctx.admin().await?;
            let user = ctx.user().await?;
            report.record("apply coupon to cart", flows::coupon_cart_flow(admin, user).await);
            report.record("cash order and cancel", flows::cash_order_flow(admin, user).await);
        }
        Suite::Account => {
            let anonymous = ctx.anonymous();
            report.record(
                "register, edit and delete user",
                flows::user_account_flow(&anonymous, ctx.config().admin_email()).await,
            );
        }
        Suite::Engagement => {
            let admin = ctx.admin().await?;
            let user = ctx.user().await?;
            report.record(
                "rate, wishlist and upload product",
                flows::product_engagement_flow(admin, user).await,
            );
        }
        resource => {
            let spec = resources::by_name(resource.name(), &tag)
                .ok_or_else(|| HarnessError::Precondition(format!("no descriptor for {}", resource)))?;
            let admin = ctx.admin().await?;

            report.record(
                format!("create, update and delete {}", spec.name),
                run_lifecycle(&spec, admin).await,
            );
            if !spec.listing_fields.is_empty() {
                report.record(format!("list {}", spec.name), check_listing(&spec, admin).await);
            }
            report.record(
                format!("{} with invalid token", spec.name),
                run_negative_lifecycle(&spec, ctx.client.clone(), INVALID_TOKEN, &invalid_id_for(spec.name)).await,
            );
        }
    }

    Ok(report)
}

pub async fn run_suites(suites: &[Suite], ctx: &SuiteContext) -> Result<Vec<SuiteReport>> {
    let mut reports = Vec::with_capacity(suites.len());
    for suite in suites {
        reports.push(run_suite(*suite, ctx).await?);
    }
    Ok(reports)
}
