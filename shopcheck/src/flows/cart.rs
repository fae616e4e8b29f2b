use rand::seq::SliceRandom;
use serde_json::{json, Value};
use tracing::info;

use super::{apply_coupon, create_coupon, delete_fixture, fill_cart, need_products, product_ids, CartLine, FixtureScope};
use crate::assertions::{check_field, expect_document, expect_success, identity_of, Absence, FieldMatch};
use crate::error::{Mismatch, Result};
use crate::lifecycle::verify_absent;
use crate::resources;
use crate::session::Session;

#[derive(Debug, Clone)]
pub struct CouponCartReport {
    pub coupon_name: String,
    pub coupon_id: String,
    pub product_ids: Vec<String>,
    /// Whatever the backend answered to the coupon application, usually the
    /// discounted total.
    pub apply_response: Option<Value>,
    pub absence: Absence,
}

/// Admin creates a coupon, the shopper fills a cart with two distinct random
/// products and applies it, then the admin deletes the coupon and the read
/// comes back empty.
pub async fn coupon_cart_flow(admin: &Session, user: &Session) -> Result<CouponCartReport> {
    let mut scope = FixtureScope::new(admin);
    let outcome = coupon_cart_steps(admin, user, &mut scope).await;
    scope.finish(outcome).await
}

async fn coupon_cart_steps(
    admin: &Session,
    user: &Session,
    scope: &mut FixtureScope,
) -> Result<CouponCartReport> {
    let ids = product_ids(user).await?;
    need_products(&ids, 2)?;
    let picked: Vec<String> = {
        let mut rng = rand::thread_rng();
        ids.choose_multiple(&mut rng, 2).cloned().collect()
    };

    let tag = resources::fixture_tag();
    let coupon_name = format!("CART{}", tag).to_uppercase();
    let coupon_id = create_coupon(admin, &coupon_name, 20).await?;
    let coupon_path = format!("coupon/{}", coupon_id);
    scope.track(&coupon_path);
    info!(coupon = %coupon_name, id = %coupon_id, "coupon created for cart flow");

    fill_cart(
        user,
        &[
            CartLine {
                product_id: &picked[0],
                count: 1,
                color: "red",
            },
            CartLine {
                product_id: &picked[1],
                count: 2,
                color: "blue",
            },
        ],
    )
    .await?;

    let applied = apply_coupon(user, &coupon_name).await?;

    delete_fixture(admin, scope, "delete coupon", &coupon_path).await?;
    let absence = verify_absent(&resources::coupon(&tag), admin, &coupon_id).await?;

    Ok(CouponCartReport {
        coupon_name,
        coupon_id,
        product_ids: picked,
        apply_response: applied.json(),
        absence,
    })
}

#[derive(Debug, Clone)]
pub struct CashOrderReport {
    pub order_id: String,
    pub order_status: String,
}

pub const CANCELLED: &str = "Cancelled";

/// Cart, coupon, cash-on-delivery order, then the admin cancels that order.
pub async fn cash_order_flow(admin: &Session, user: &Session) -> Result<CashOrderReport> {
    let mut scope = FixtureScope::new(admin);
    let outcome = cash_order_steps(admin, user, &mut scope).await;
    scope.finish(outcome).await
}

async fn cash_order_steps(
    admin: &Session,
    user: &Session,
    scope: &mut FixtureScope,
) -> Result<CashOrderReport> {
    let ids = product_ids(user).await?;
    need_products(&ids, 1)?;
    let product_id = {
        let mut rng = rand::thread_rng();
        ids.choose(&mut rng).cloned().unwrap_or_default()
    };

    let coupon_name = format!("COD{}", resources::fixture_tag()).to_uppercase();
    let coupon_id = create_coupon(admin, &coupon_name, 10).await?;
    let coupon_path = format!("coupon/{}", coupon_id);
    scope.track(&coupon_path);

    fill_cart(
        user,
        &[CartLine {
            product_id: &product_id,
            count: 2,
            color: "Red",
        }],
    )
    .await?;
    apply_coupon(user, &coupon_name).await?;

    let step = "place cash order";
    let resp = user
        .post("user/cart/cash-order", &json!({ "COD": true, "couponApplied": true }))
        .await?;
    expect_success(step, &resp)?;

    let step = "fetch orders";
    let resp = user.get_authed("user/get-orders").await?;
    expect_success(step, &resp)?;
    let orders = expect_document(step, &resp)?;
    let order_id = latest_order_id(&orders)
        .ok_or_else(|| Mismatch::new(step, "an order with an _id", crate::error::truncate(&resp.body)))?;
    info!(order = %order_id, "cash order placed");

    let step = "cancel order";
    let status = json!(CANCELLED);
    let resp = admin
        .put(
            &format!("user/order/update-order/{}", order_id),
            &json!({ "status": CANCELLED }),
        )
        .await?;
    expect_success(step, &resp)?;
    let updated = expect_document(step, &resp)?;
    check_field(step, &updated, "orderStatus", &status, FieldMatch::Exact)?;

    delete_fixture(admin, scope, "delete coupon", &coupon_path).await?;

    Ok(CashOrderReport {
        order_id,
        order_status: CANCELLED.to_string(),
    })
}

/// `get-orders` answers with the shopper's order object; a list of orders is
/// accepted too, in which case the newest (last) one counts.
fn latest_order_id(orders: &Value) -> Option<String> {
    match orders {
        Value::Array(list) => list.iter().rev().find_map(|o| identity_of(o, "_id")),
        other => identity_of(other, "_id"),
    }
}
