//! Multi-step business flows that chain calls across resource types.
//!
//! Every flow registers the fixtures it creates in a [`FixtureScope`]. When a
//! step fails the scope deletes whatever is still registered before the
//! failure is returned, so a broken flow does not leave coupons or products
//! behind on the backend.

mod account;
mod cart;
mod engagement;

pub use account::{user_account_flow, UserAccountReport};
pub use cart::{cash_order_flow, coupon_cart_flow, CashOrderReport, CouponCartReport};
pub use engagement::{product_engagement_flow, EngagementReport};

use std::collections::HashSet;

use http::{Method, StatusCode};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::assertions::{expect_array, expect_document, expect_identity, expect_status, expect_success, identity_of};
use crate::client::ApiResponse;
use crate::error::{HarnessError, Result};
use crate::resources::future_date;
use crate::session::Session;

#[derive(Debug, Clone, PartialEq)]
struct Fixture {
    path: String,
    authed: bool,
}

/// Fixtures created during a flow, deleted through `owner` on failure.
pub struct FixtureScope {
    owner: Session,
    fixtures: Vec<Fixture>,
}

impl FixtureScope {
    pub fn new(owner: &Session) -> Self {
        Self {
            owner: owner.clone(),
            fixtures: Vec::new(),
        }
    }

    pub fn track(&mut self, path: impl Into<String>) {
        self.fixtures.push(Fixture {
            path: path.into(),
            authed: true,
        });
    }

    /// For routes the backend exposes without authentication.
    pub fn track_public(&mut self, path: impl Into<String>) {
        self.fixtures.push(Fixture {
            path: path.into(),
            authed: false,
        });
    }

    /// The flow deleted it itself.
    pub fn release(&mut self, path: &str) {
        self.fixtures.retain(|f| f.path != path);
    }

    pub fn pending(&self) -> Vec<String> {
        self.fixtures.iter().map(|f| f.path.clone()).collect()
    }

    pub async fn teardown(self) {
        for fixture in self.fixtures.iter().rev() {
            match self
                .owner
                .request(Method::DELETE, &fixture.path, fixture.authed, None)
                .await
            {
                Ok(resp) if resp.is_success() => info!(path = %fixture.path, "fixture removed after failure"),
                Ok(resp) => warn!(path = %fixture.path, status = resp.status.as_u16(), "fixture teardown refused"),
                Err(e) => warn!(path = %fixture.path, error = %e, "fixture teardown failed"),
            }
        }
    }

    /// Passes `outcome` through, tearing down leftovers when it is an error.
    pub async fn finish<T>(self, outcome: Result<T>) -> Result<T> {
        if outcome.is_err() {
            self.teardown().await;
        }
        outcome
    }
}

pub(crate) async fn product_ids(session: &Session) -> Result<Vec<String>> {
    let step = "fetch products";
    let resp = session.get("product").await?;
    expect_success(step, &resp)?;
    let doc = expect_document(step, &resp)?;
    let mut ids: Vec<String> = expect_array(step, &doc)?
        .iter()
        .filter_map(|p| identity_of(p, "_id"))
        .collect();
    let mut seen = HashSet::new();
    ids.retain(|id| seen.insert(id.clone()));
    Ok(ids)
}

pub(crate) fn need_products(ids: &[String], at_least: usize) -> Result<()> {
    if ids.len() < at_least {
        return Err(HarnessError::Precondition(format!(
            "need at least {} products on the backend, found {}",
            at_least,
            ids.len()
        )));
    }
    Ok(())
}

pub(crate) async fn create_coupon(admin: &Session, name: &str, discount: u32) -> Result<String> {
    let step = "create coupon";
    let resp = admin
        .post(
            "coupon",
            &json!({ "name": name, "discount": discount, "expiry": future_date(365) }),
        )
        .await?;
    expect_success(step, &resp)?;
    let doc = expect_document(step, &resp)?;
    Ok(expect_identity(step, &doc, "_id")?)
}

pub(crate) struct CartLine<'a> {
    pub product_id: &'a str,
    pub count: u32,
    pub color: &'a str,
}

pub(crate) async fn fill_cart(user: &Session, lines: &[CartLine<'_>]) -> Result<Value> {
    let step = "add to cart";
    let cart: Vec<Value> = lines
        .iter()
        .map(|l| json!({ "_id": l.product_id, "count": l.count, "color": l.color }))
        .collect();
    let resp = user.post("user/cart", &json!({ "cart": cart })).await?;
    expect_success(step, &resp)?;
    Ok(resp.json().unwrap_or(Value::Null))
}

pub(crate) async fn apply_coupon(user: &Session, name: &str) -> Result<ApiResponse> {
    let resp = user
        .post("user/cart/applycoupon", &json!({ "coupon": name }))
        .await?;
    expect_status("apply coupon", &resp, StatusCode::OK)?;
    Ok(resp)
}

pub(crate) async fn delete_fixture(
    admin: &Session,
    scope: &mut FixtureScope,
    step: &str,
    path: &str,
) -> Result<()> {
    let resp = admin.delete(path).await?;
    expect_success(step, &resp)?;
    scope.release(path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockApiClient;
    use std::sync::Arc;

    #[tokio::test]
    async fn product_ids_drops_repeats_anywhere_in_the_listing() {
        let mock = Arc::new(MockApiClient::default());
        mock.enqueue_json(
            StatusCode::OK,
            &json!([{ "_id": "p1" }, { "_id": "p2" }, { "_id": "p1" }, { "title": "no id" }, { "_id": "p3" }]),
        );
        let user = Session::with_token(mock.clone(), "user");

        let ids = product_ids(&user).await.unwrap();
        assert_eq!(ids, vec!["p1", "p2", "p3"]);
    }

    #[tokio::test]
    async fn teardown_deletes_pending_fixtures_newest_first() {
        let mock = Arc::new(MockApiClient::default());
        mock.enqueue(StatusCode::OK, "{}");
        mock.enqueue(StatusCode::OK, "{}");
        let admin = Session::with_token(mock.clone(), "admin");

        let mut scope = FixtureScope::new(&admin);
        scope.track("coupon/1");
        scope.track("product/2");
        scope.track("coupon/3");
        scope.release("coupon/3");
        assert_eq!(scope.pending(), vec!["coupon/1", "product/2"]);

        scope.teardown().await;
        assert_eq!(mock.calls(), vec!["DELETE product/2", "DELETE coupon/1"]);
    }

    #[tokio::test]
    async fn finish_leaves_fixtures_alone_on_success() {
        let mock = Arc::new(MockApiClient::default());
        let admin = Session::with_token(mock.clone(), "admin");
        let mut scope = FixtureScope::new(&admin);
        scope.track("coupon/1");

        let value = scope.finish(Ok(7)).await.unwrap();
        assert_eq!(value, 7);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn public_fixtures_are_deleted_without_token() {
        let mock = Arc::new(MockApiClient::default());
        mock.enqueue(StatusCode::OK, "{}");
        let admin = Session::with_token(mock.clone(), "admin");
        let mut scope = FixtureScope::new(&admin);
        scope.track_public("user/u1");

        let outcome: Result<()> = Err(HarnessError::Precondition("boom".into()));
        assert!(scope.finish(outcome).await.is_err());
        assert_eq!(mock.requests.lock().unwrap()[0].token, None);
    }

    #[test]
    fn too_few_products_is_a_precondition_failure() {
        let ids = vec!["a".to_string()];
        assert!(matches!(need_products(&ids, 2), Err(HarnessError::Precondition(_))));
        assert!(need_products(&ids, 1).is_ok());
    }
}
