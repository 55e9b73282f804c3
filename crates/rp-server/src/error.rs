//! Error-to-HTTP response conversion.
//!
//! Implements `IntoResponse` for [`rp_core::Error`] so that route handlers
//! can return `Result<T, AppError>` and use `?` on core results.

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::range::unsatisfied_content_range;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError {
    inner: rp_core::Error,
    request_id: Option<String>,
}

impl AppError {
    pub fn new(inner: rp_core::Error) -> Self {
        Self {
            inner,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, id: String) -> Self {
        self.request_id = Some(id);
        self
    }
}

impl From<rp_core::Error> for AppError {
    fn from(e: rp_core::Error) -> Self {
        Self::new(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if self.inner.is_operational_fault() {
            tracing::error!(
                status = %status,
                code = self.inner.code(),
                error = %self.inner,
                "Server-side fault in API handler"
            );
        }

        // Range failures carry no body at all.
        match &self.inner {
            rp_core::Error::RangeNotSatisfiable { total } => {
                return (
                    status,
                    [(header::CONTENT_RANGE, unsatisfied_content_range(*total))],
                    Body::empty(),
                )
                    .into_response();
            }
            rp_core::Error::NotImplemented(_) => {
                return (status, Body::empty()).into_response();
            }
            _ => {}
        }

        let body = json!({
            "error": self.inner.to_string(),
            "code": self.inner.code(),
            "request_id": self.request_id,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use rp_core::Error;

    async fn body_bytes(response: Response) -> Vec<u8> {
        response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec()
    }

    #[test]
    fn not_found_produces_404() {
        let response = AppError::new(Error::not_found("asset", "abc")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn forbidden_produces_403() {
        let response = AppError::new(Error::Forbidden("payment required".into())).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unsatisfiable_range_has_header_and_empty_body() {
        let response = AppError::new(Error::RangeNotSatisfiable { total: 1000 }).into_response();
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */1000");
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn multi_range_is_501_without_body() {
        let response = AppError::new(Error::NotImplemented("multi".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn storage_integrity_is_404_with_distinct_code() {
        let response = AppError::new(Error::StorageIntegrity("gone".into()))
            .with_request_id("req-1".into())
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(json["code"], "storage_integrity_error");
        assert_eq!(json["request_id"], "req-1");
    }

    #[test]
    fn gateway_is_502() {
        let response = AppError::new(Error::Gateway("down".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
