//! Access query route.

use axum::extract::{Extension, Path, State};
use axum::Json;
use rp_core::{AssetId, Identity};
use serde::Serialize;

use crate::context::AppContext;
use crate::error::AppError;
use crate::routes::parse_path_id;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AccessResponse {
    pub asset_id: String,
    pub access: bool,
}

/// GET /api/access/{asset_id}
#[utoipa::path(
    get,
    path = "/api/access/{asset_id}",
    params(("asset_id" = String, Path, description = "Asset ID")),
    responses(
        (status = 200, description = "Whether the caller may stream the asset", body = AccessResponse),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Asset not found")
    )
)]
pub async fn check_access(
    State(ctx): State<AppContext>,
    Extension(identity): Extension<Identity>,
    Path(asset_id): Path<String>,
) -> Result<Json<AccessResponse>, AppError> {
    let id: AssetId = parse_path_id(&asset_id, "asset_id")?;
    let access = ctx.access.can_stream(&identity, id)?;
    Ok(Json(AccessResponse {
        asset_id: id.to_string(),
        access,
    }))
}
