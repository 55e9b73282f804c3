//! Entitlement-gated range streaming.

use axum::extract::{Extension, Path, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use rp_core::{AssetId, Identity};

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;
use crate::routes::parse_path_id;
use crate::streaming;

/// GET /api/stream/{asset_id}
///
/// The access grant is checked before any blob is opened, so a denied
/// caller never receives body bytes.
#[utoipa::path(
    get,
    path = "/api/stream/{asset_id}",
    params(
        ("asset_id" = String, Path, description = "Asset ID"),
        ("Range" = Option<String>, Header, description = "Single byte range, bytes=start-[end]")
    ),
    responses(
        (status = 200, description = "Whole asset"),
        (status = 206, description = "Requested byte window"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Payment required"),
        (status = 404, description = "Asset or its stored bytes not found"),
        (status = 416, description = "Range not satisfiable"),
        (status = 501, description = "Multi-range requests are not served")
    )
)]
pub async fn stream_asset(
    State(ctx): State<AppContext>,
    Extension(identity): Extension<Identity>,
    request_id: Option<Extension<RequestId>>,
    Path(asset_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let tag = |e: rp_core::Error| {
        let err = AppError::new(e);
        match &request_id {
            Some(Extension(RequestId(id))) => err.with_request_id(id.clone()),
            None => err,
        }
    };

    let id: AssetId = parse_path_id(&asset_id, "asset_id").map_err(tag)?;
    let asset = ctx.access.authorize_stream(&identity, id).map_err(tag)?;

    // A non-ASCII header value parses as malformed rather than absent.
    let range = headers
        .get(header::RANGE)
        .map(|v| v.to_str().unwrap_or_default());
    let streaming_cfg = &ctx.config.streaming;

    let reply = streaming::serve(
        ctx.blobs.as_ref(),
        &asset,
        range,
        &streaming_cfg.content_type,
    )
    .await
    .map_err(tag)?
    .with_chunk_size(streaming_cfg.effective_chunk_size());

    Ok(reply.into_response())
}
