//! Order route handlers: checkout, confirmation, lookup and cancellation.

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::Json;
use rp_core::{AssetId, Identity, OrderId};
use serde::{Deserialize, Serialize};

use crate::context::AppContext;
use crate::error::AppError;
use crate::orders::{Checkout, ConfirmPayment};
use crate::routes::parse_path_id;

// ---------------------------------------------------------------------------
// Request / response schemas
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateOrderRequest {
    #[schema(value_type = String)]
    pub asset_id: AssetId,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct OrderResponse {
    pub id: String,
    pub asset_id: String,
    pub status: String,
    pub amount: i64,
    pub currency: String,
    pub gateway_order_id: Option<String>,
    pub payment_ref: Option<String>,
    pub created_at: String,
    pub paid_at: Option<String>,
}

impl OrderResponse {
    fn from_model(o: &rp_db::models::Order) -> Self {
        Self {
            id: o.id.to_string(),
            asset_id: o.asset_id.to_string(),
            status: o.status.to_string(),
            amount: o.amount,
            currency: o.currency.clone(),
            gateway_order_id: o.gateway_order_id.clone(),
            payment_ref: o.payment_ref.clone(),
            created_at: o.created_at.clone(),
            paid_at: o.paid_at.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/orders
#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Checkout opened", body = Checkout),
        (status = 400, description = "Asset cannot be purchased"),
        (status = 404, description = "Asset not found"),
        (status = 429, description = "Rate limited"),
        (status = 502, description = "Payment gateway failure")
    )
)]
pub async fn create_order(
    State(ctx): State<AppContext>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Checkout>), AppError> {
    let checkout = ctx.orders.initiate(&identity, req.asset_id).await?;
    Ok((StatusCode::CREATED, Json(checkout)))
}

/// POST /api/orders/confirm
#[utoipa::path(
    post,
    path = "/api/orders/confirm",
    request_body = ConfirmPayment,
    responses(
        (status = 200, description = "Payment recorded", body = OrderResponse),
        (status = 400, description = "Missing payment reference"),
        (status = 401, description = "Invalid payment signature"),
        (status = 404, description = "Asset not found"),
        (status = 409, description = "Payment reference already used")
    )
)]
pub async fn confirm_order(
    State(ctx): State<AppContext>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<ConfirmPayment>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = ctx.orders.confirm(&identity, req).await?;
    Ok(Json(OrderResponse::from_model(&order)))
}

/// GET /api/orders
#[utoipa::path(
    get,
    path = "/api/orders",
    responses(
        (status = 200, description = "Caller's orders, newest first", body = Vec<OrderResponse>)
    )
)]
pub async fn list_orders(
    State(ctx): State<AppContext>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<OrderResponse>>, AppError> {
    let orders = ctx.orders.list(&identity)?;
    Ok(Json(orders.iter().map(OrderResponse::from_model).collect()))
}

/// GET /api/orders/{id}
#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = String, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order", body = OrderResponse),
        (status = 404, description = "Order not found")
    )
)]
pub async fn get_order(
    State(ctx): State<AppContext>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, AppError> {
    let order_id: OrderId = parse_path_id(&id, "order id")?;
    let order = ctx.orders.get(&identity, order_id)?;
    Ok(Json(OrderResponse::from_model(&order)))
}

/// POST /api/orders/{id}/cancel
#[utoipa::path(
    post,
    path = "/api/orders/{id}/cancel",
    params(("id" = String, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order abandoned", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order is not pending")
    )
)]
pub async fn cancel_order(
    State(ctx): State<AppContext>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, AppError> {
    let order_id: OrderId = parse_path_id(&id, "order id")?;
    let order = ctx.orders.cancel(&identity, order_id)?;
    Ok(Json(OrderResponse::from_model(&order)))
}
