//! Authentication middleware.
//!
//! Resolves `Authorization: Bearer <token>` to an [`Identity`] via the
//! `auth_tokens` table and injects it into request extensions so that
//! downstream handlers can extract it with `Extension<Identity>`.

use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use rp_core::{Error, Identity, Result};
use rp_db::pool::DbPool;

use crate::context::AppContext;
use crate::error::AppError;

/// Extract the token from a `Bearer` authorization value.
pub fn bearer_token(authorization: &str) -> Option<&str> {
    let (scheme, token) = authorization.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Resolve an `Authorization` header value to an identity.
///
/// A missing header and an unusable credential are distinct failures so
/// clients can tell "log in" apart from "log in again".
pub fn resolve_identity(db: &DbPool, authorization: Option<&str>) -> Result<Identity> {
    let Some(value) = authorization else {
        return Err(Error::Unauthorized("Authentication required".into()));
    };
    let Some(token) = bearer_token(value) else {
        return Err(Error::Unauthorized("Invalid token".into()));
    };

    let conn = rp_db::pool::get_conn(db)?;
    let now = rp_db::queries::now_timestamp();
    rp_db::queries::auth::resolve_identity(&conn, token, &now)?
        .ok_or_else(|| Error::Unauthorized("Invalid token".into()))
}

/// Authentication middleware. Applied to protected routes only.
///
/// On success, inserts the resolved [`Identity`] into request extensions.
pub async fn auth_middleware(
    State(ctx): State<AppContext>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let authorization = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_owned());

    let db = ctx.db.clone();
    let resolved = tokio::task::spawn_blocking(move || {
        resolve_identity(&db, authorization.as_deref())
    })
    .await
    .unwrap_or_else(|e| Err(Error::Internal(format!("auth task failed: {e}"))));

    match resolved {
        Ok(identity) => {
            tracing::trace!(user_id = %identity.user_id, role = %identity.role, "Authenticated");
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => AppError::new(e).into_response(),
    }
}
