use serde_json::{json, Value};
use tracing::info;

use super::{delete_fixture, FixtureScope};
use crate::assertions::{
    check_field, expect_array, expect_document, expect_identity, expect_success, field, Absence, FieldMatch,
};
use crate::error::{Mismatch, Result};
use crate::lifecycle::verify_absent;
use crate::resources::{self, fixture_tag};
use crate::session::Session;

#[derive(Debug, Clone)]
pub struct EngagementReport {
    pub product_id: String,
    pub total_rating: Value,
    pub absence: Absence,
}

/// A fresh product is rated, wishlisted, un-wishlisted and given images, then
/// removed again. Working on an own fixture keeps seeded catalog ratings intact.
pub async fn product_engagement_flow(admin: &Session, user: &Session) -> Result<EngagementReport> {
    let mut scope = FixtureScope::new(admin);
    let outcome = engagement_steps(admin, user, &mut scope).await;
    scope.finish(outcome).await
}

async fn engagement_steps(admin: &Session, user: &Session, scope: &mut FixtureScope) -> Result<EngagementReport> {
    let spec = resources::product(&fixture_tag());

    let step = "create product";
    let resp = admin.post(&spec.collection_path, &spec.create_body).await?;
    expect_success(step, &resp)?;
    let product_id = expect_identity(step, &expect_document(step, &resp)?, "_id")?;
    let product_path = spec.item_path(&product_id);
    scope.track(&product_path);

    let step = "rate product";
    let resp = user
        .put(
            "product/rating",
            &json!({ "star": 5, "prodId": product_id, "comment": "Great product!" }),
        )
        .await?;
    expect_success(step, &resp)?;
    let rated = expect_document(step, &resp)?;
    // only rating on a fresh product, so the average is the star itself
    check_field(step, &rated, "totalrating", &json!(5), FieldMatch::Number)?;
    let total_rating = rated["totalrating"].clone();

    let listed = toggle_wishlist(user, "add to wishlist", &product_id).await?;
    if !listed {
        return Err(Mismatch::new("add to wishlist", "product in wishlist", "absent")
            .on_field("wishlist")
            .into());
    }

    let step = "upload images";
    let resp = admin
        .put(
            &format!("product/upload/{}", product_id),
            &json!({ "images": ["image1.jpg", "image2.jpg"] }),
        )
        .await?;
    expect_success(step, &resp)?;

    let listed = toggle_wishlist(user, "remove from wishlist", &product_id).await?;
    if listed {
        return Err(Mismatch::new("remove from wishlist", "product gone from wishlist", "still present")
            .on_field("wishlist")
            .into());
    }

    delete_fixture(admin, scope, "delete product", &product_path).await?;
    let absence = verify_absent(&spec, admin, &product_id).await?;
    info!(product = %product_id, "engagement flow complete");

    Ok(EngagementReport {
        product_id,
        total_rating,
        absence,
    })
}

/// Returns whether the product is on the wishlist after the toggle.
async fn toggle_wishlist(user: &Session, step: &str, product_id: &str) -> Result<bool> {
    let resp = user.put("product/wishlist", &json!({ "prodId": product_id })).await?;
    expect_success(step, &resp)?;
    let owner = expect_document(step, &resp)?;
    let wishlist = expect_array(step, field(step, &owner, "wishlist")?)?;
    Ok(wishlist.iter().any(|entry| match entry {
        Value::String(id) => id == product_id,
        other => other.get("_id").and_then(Value::as_str) == Some(product_id),
    }))
}
