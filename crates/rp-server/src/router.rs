//! Axum router construction.
//!
//! Builds the full application router with all route groups and middleware
//! layers.

use axum::routing::{get, post};
use axum::{middleware, Extension, Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::context::AppContext;
use crate::middleware::auth::auth_middleware;
use crate::middleware::rate_limit::rate_limit_middleware;
use crate::middleware::request_id::request_id_middleware;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health_check,
        routes::access::check_access,
        routes::stream::stream_asset,
        routes::orders::create_order,
        routes::orders::confirm_order,
        routes::orders::list_orders,
        routes::orders::get_order,
        routes::orders::cancel_order,
    ),
    components(schemas(
        routes::health::HealthResponse,
        routes::access::AccessResponse,
        routes::orders::CreateOrderRequest,
        routes::orders::OrderResponse,
        crate::orders::Checkout,
        crate::orders::AssetSummary,
        crate::orders::ConfirmPayment,
        crate::payment::GatewayOrder,
    ))
)]
pub struct ApiDoc;

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Order routes share one quota.
    let order_routes = Router::new()
        .route(
            "/orders",
            get(routes::orders::list_orders).post(routes::orders::create_order),
        )
        .route("/orders/confirm", post(routes::orders::confirm_order))
        .route("/orders/{id}", get(routes::orders::get_order))
        .route("/orders/{id}/cancel", post(routes::orders::cancel_order))
        .layer(middleware::from_fn(rate_limit_middleware))
        .layer(Extension(ctx.order_limiter.clone()));

    let protected_routes = Router::new()
        .route("/access/{asset_id}", get(routes::access::check_access))
        .route("/stream/{asset_id}", get(routes::stream::stream_asset))
        .merge(order_routes)
        .layer(middleware::from_fn_with_state(ctx.clone(), auth_middleware));

    let openapi = ApiDoc::openapi();

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route(
            "/api-docs/openapi.json",
            get(move || {
                let doc = openapi.clone();
                async move { Json(doc) }
            }),
        )
        .nest("/api", protected_routes)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
