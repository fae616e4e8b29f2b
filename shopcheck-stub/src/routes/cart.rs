//! Cart, coupon application and cash-on-delivery orders under `/user`.

use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::info;

use super::catalog::check_id;
use crate::db::documents::{now_iso, ID_FIELD};
use crate::db::new_object_id;
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::{AdminUser, AuthUser};
use crate::AppState;

const CARTS: &str = "cart";
const ORDERS: &str = "order";
const PRODUCTS: &str = "product";
const COUPONS: &str = "coupon";
const CASH_ON_DELIVERY: &str = "Cash on Delivery";

#[derive(Debug, Deserialize)]
pub struct CartLine {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default = "one")]
    count: u32,
    #[serde(default)]
    color: Option<String>,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct CartRequest {
    #[serde(default)]
    cart: Vec<CartLine>,
}

#[derive(Debug, Deserialize)]
pub struct CouponRequest {
    #[serde(default)]
    coupon: String,
}

#[derive(Debug, Deserialize)]
pub struct CashOrderRequest {
    #[serde(rename = "COD", default)]
    cod: bool,
    #[serde(rename = "couponApplied", default)]
    coupon_applied: bool,
}

#[derive(Debug, Deserialize)]
pub struct OrderStatusRequest {
    #[serde(default)]
    status: String,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn doc_id(doc: &Value) -> &str {
    doc.get(ID_FIELD).and_then(Value::as_str).unwrap_or_default()
}

fn current_cart(state: &AppState, user_id: &str) -> ApiResult<Option<Value>> {
    Ok(state.db.find_documents(CARTS, "orderby", user_id)?.pop())
}

fn drop_carts(state: &AppState, user_id: &str) -> ApiResult<Option<Value>> {
    let mut removed = None;
    for cart in state.db.find_documents(CARTS, "orderby", user_id)? {
        removed = state.db.delete_document(CARTS, doc_id(&cart))?;
    }
    Ok(removed)
}

/// Replaces the shopper's cart. Prices come from the catalog, not the request.
pub async fn save_cart(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CartRequest>,
) -> ApiResult<Json<Value>> {
    let mut products = Vec::with_capacity(payload.cart.len());
    let mut total = 0.0;
    for line in &payload.cart {
        check_id(&line.id)?;
        let product = state
            .db
            .get_document(PRODUCTS, &line.id)?
            .ok_or_else(|| ApiError::validation(format!("Product {} not found", line.id)))?;
        let price = product.get("price").and_then(Value::as_f64).unwrap_or_default();
        total += price * f64::from(line.count);
        products.push(json!({
            "product": line.id,
            "count": line.count,
            "color": line.color,
            "price": price,
        }));
    }

    drop_carts(&state, &auth.user.id)?;
    let cart = state.db.insert_document(
        CARTS,
        object(json!({
            "products": products,
            "cartTotal": round2(total),
            "orderby": auth.user.id,
        })),
    )?;
    Ok(Json(cart))
}

pub async fn get_cart(auth: AuthUser, State(state): State<AppState>) -> ApiResult<Json<Option<Value>>> {
    Ok(Json(current_cart(&state, &auth.user.id)?))
}

pub async fn empty_cart(auth: AuthUser, State(state): State<AppState>) -> ApiResult<Json<Option<Value>>> {
    Ok(Json(drop_carts(&state, &auth.user.id)?))
}

/// Answers with the discounted total as a bare number.
pub async fn apply_coupon(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CouponRequest>,
) -> ApiResult<Json<f64>> {
    let coupon = state
        .db
        .find_documents(COUPONS, "name", &payload.coupon)?
        .pop()
        .ok_or_else(|| ApiError::validation("Invalid Coupon"))?;
    let cart = current_cart(&state, &auth.user.id)?.ok_or_else(|| ApiError::validation("No cart"))?;

    let discount = coupon.get("discount").and_then(Value::as_f64).unwrap_or_default();
    let cart_total = cart.get("cartTotal").and_then(Value::as_f64).unwrap_or_default();
    let after = round2(cart_total - cart_total * discount / 100.0);

    let mut patch = Map::new();
    patch.insert("totalAfterDiscount".to_string(), json!(after));
    state.db.update_document(CARTS, doc_id(&cart), patch)?;

    info!(user = %auth.user.id, coupon = %payload.coupon, after, "coupon applied");
    Ok(Json(after))
}

/// Turns the cart into a COD order and moves stock from quantity to sold.
pub async fn cash_order(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CashOrderRequest>,
) -> ApiResult<Json<Value>> {
    if !payload.cod {
        return Err(ApiError::validation("Create cash order failed"));
    }
    let cart = current_cart(&state, &auth.user.id)?.ok_or_else(|| ApiError::validation("No cart"))?;

    let discounted = cart.get("totalAfterDiscount").and_then(Value::as_f64);
    let amount = match (payload.coupon_applied, discounted) {
        (true, Some(after)) => after,
        _ => cart.get("cartTotal").and_then(Value::as_f64).unwrap_or_default(),
    };
    let products = cart.get("products").cloned().unwrap_or_else(|| json!([]));

    let order = state.db.insert_document(
        ORDERS,
        object(json!({
            "products": products,
            "paymentIntent": {
                "id": new_object_id(),
                "method": "COD",
                "amount": amount,
                "status": CASH_ON_DELIVERY,
                "created": now_iso(),
                "currency": "usd",
            },
            "orderStatus": CASH_ON_DELIVERY,
            "orderby": auth.user.id,
        })),
    )?;

    for line in products.as_array().into_iter().flatten() {
        let Some(product_id) = line.get("product").and_then(Value::as_str) else {
            continue;
        };
        let count = line.get("count").and_then(Value::as_f64).unwrap_or_default();
        if let Some(product) = state.db.get_document(PRODUCTS, product_id)? {
            let quantity = product.get("quantity").and_then(Value::as_f64).unwrap_or_default();
            let sold = product.get("sold").and_then(Value::as_f64).unwrap_or_default();
            let mut patch = Map::new();
            patch.insert("quantity".to_string(), json!(quantity - count));
            patch.insert("sold".to_string(), json!(sold + count));
            state.db.update_document(PRODUCTS, product_id, patch)?;
        }
    }

    info!(user = %auth.user.id, order = doc_id(&order), amount, "cash order placed");
    Ok(Json(json!({ "message": "success" })))
}

fn with_products(state: &AppState, mut order: Value) -> ApiResult<Value> {
    if let Some(lines) = order.get_mut("products").and_then(Value::as_array_mut) {
        for line in lines {
            let Some(id) = line.get("product").and_then(Value::as_str).map(str::to_string) else {
                continue;
            };
            if let Some(product) = state.db.get_document(PRODUCTS, &id)? {
                line["product"] = product;
            }
        }
    }
    Ok(order)
}

/// The shopper's most recent order, products expanded; `null` when none.
pub async fn get_orders(auth: AuthUser, State(state): State<AppState>) -> ApiResult<Json<Option<Value>>> {
    match state.db.find_documents(ORDERS, "orderby", &auth.user.id)?.pop() {
        Some(order) => Ok(Json(Some(with_products(&state, order)?))),
        None => Ok(Json(None)),
    }
}

pub async fn all_orders(_admin: AdminUser, State(state): State<AppState>) -> ApiResult<Json<Vec<Value>>> {
    let orders = state.db.list_documents(ORDERS)?;
    Ok(Json(
        orders
            .into_iter()
            .map(|o| with_products(&state, o))
            .collect::<ApiResult<Vec<_>>>()?,
    ))
}

pub async fn update_order(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<OrderStatusRequest>,
) -> ApiResult<Json<Option<Value>>> {
    check_id(&id)?;
    if payload.status.trim().is_empty() {
        return Err(ApiError::validation("Order status is required"));
    }
    let Some(order) = state.db.get_document(ORDERS, &id)? else {
        return Ok(Json(None));
    };

    let mut intent = order.get("paymentIntent").cloned().unwrap_or_else(|| json!({}));
    intent["status"] = json!(payload.status);
    let mut patch = Map::new();
    patch.insert("orderStatus".to_string(), json!(payload.status));
    patch.insert("paymentIntent".to_string(), intent);

    let updated = state.db.update_document(ORDERS, &id, patch)?;
    info!(order = %id, status = %payload.status, "order status updated");
    Ok(Json(updated))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cart", post(save_cart).get(get_cart))
        .route("/empty-cart", delete(empty_cart))
        .route("/cart/applycoupon", post(apply_coupon))
        .route("/cart/cash-order", post(cash_order))
        .route("/get-orders", get(get_orders))
        .route("/getallorders", get(all_orders))
        .route("/order/update-order/:id", put(update_order))
}
