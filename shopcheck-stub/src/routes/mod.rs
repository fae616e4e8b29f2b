pub mod cart;
pub mod catalog;
pub mod products;
pub mod users;

use axum::Router;

use crate::AppState;
use catalog::Collection;

/// Everything under `/api`.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/blog", catalog::router(Collection::Blog))
        .nest("/brand", catalog::router(Collection::Brand))
        .nest("/category", catalog::router(Collection::Category))
        .nest("/color", catalog::router(Collection::Color))
        .nest("/coupon", catalog::router(Collection::Coupon))
        .nest(
            "/product",
            catalog::router(Collection::Product).merge(products::router()),
        )
        .nest("/user", users::router().merge(cart::router()))
}
