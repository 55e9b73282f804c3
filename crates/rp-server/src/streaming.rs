//! Range-streaming responder.
//!
//! Turns an asset plus an optional `Range` header into a [`StreamReply`]:
//! the status, headers and a bounded body reader over the asset's blob.
//! Reads are chunked through `ReaderStream` so memory stays bounded
//! regardless of file size.

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use rp_core::{Error, Result};
use rp_db::models::Asset;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::io::ReaderStream;

use crate::blob::BlobStore;
use crate::range::{ByteWindow, RangeRequest};

const DEFAULT_CHUNK: usize = 64 * 1024;

/// Guess the MIME type from a storage key's extension.
pub fn guess_content_type(storage_key: &str) -> Option<&'static str> {
    let ext = storage_key.rsplit_once('.')?.1.to_ascii_lowercase();
    let ct = match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "ts" => "video/mp2t",
        "avi" => "video/x-msvideo",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        _ => return None,
    };
    Some(ct)
}

/// Content type for `storage_key`, falling back to `fallback` and then to
/// `application/octet-stream` if the configured value is not a valid header.
fn content_type_header(storage_key: &str, fallback: &str) -> HeaderValue {
    if let Some(ct) = guess_content_type(storage_key) {
        return HeaderValue::from_static(ct);
    }
    HeaderValue::from_str(fallback).unwrap_or_else(|e| {
        tracing::warn!(content_type = fallback, error = %e, "Invalid streaming.content_type");
        HeaderValue::from_static("application/octet-stream")
    })
}

/// A resolved streaming response. Owns the blob reader, so dropping the
/// reply (or the body stream it becomes) releases the file handle.
pub struct StreamReply {
    window: ByteWindow,
    content_type: HeaderValue,
    chunk_size: usize,
    body: Box<dyn AsyncRead + Send + Unpin>,
}

impl std::fmt::Debug for StreamReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamReply")
            .field("window", &self.window)
            .field("content_type", &self.content_type)
            .finish()
    }
}

impl StreamReply {
    pub fn status(&self) -> StatusCode {
        if self.window.partial {
            StatusCode::PARTIAL_CONTENT
        } else {
            StatusCode::OK
        }
    }

    pub fn window(&self) -> ByteWindow {
        self.window
    }

    pub fn content_type(&self) -> &HeaderValue {
        &self.content_type
    }

    /// Number of body bytes this reply will produce.
    pub fn content_length(&self) -> u64 {
        self.window.len()
    }

    /// Header pairs for this reply, in emission order.
    pub fn headers(&self) -> Vec<(HeaderName, HeaderValue)> {
        let mut headers = vec![
            (header::CONTENT_TYPE, self.content_type.clone()),
            (header::CONTENT_LENGTH, HeaderValue::from(self.content_length())),
            (header::ACCEPT_RANGES, HeaderValue::from_static("bytes")),
        ];
        if self.window.partial {
            let range = self.window.content_range();
            match HeaderValue::try_from(range) {
                Ok(v) => headers.push((header::CONTENT_RANGE, v)),
                Err(e) => tracing::error!(error = %e, "Content-Range is not a valid header"),
            }
        }
        headers
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        if chunk_size > 0 {
            self.chunk_size = chunk_size;
        }
        self
    }

    /// Copy the body into an arbitrary sink. Returns the number of bytes
    /// written.
    pub async fn write_to<W>(mut self, sink: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let n = tokio::io::copy(&mut self.body, sink).await?;
        Ok(n)
    }
}

impl IntoResponse for StreamReply {
    fn into_response(self) -> Response {
        let status = self.status();
        let headers = self.headers();
        let stream = ReaderStream::with_capacity(self.body, self.chunk_size);

        let mut response = Response::new(Body::from_stream(stream));
        *response.status_mut() = status;
        for (name, value) in headers {
            response.headers_mut().insert(name, value);
        }
        response
    }
}

/// Serve `asset`'s bytes for an optional `Range` header.
///
/// The caller must already hold an access grant for `asset`; this function
/// does not consult entitlements.
///
/// `fallback_content_type` is used when the storage key's extension does not
/// name a known media type.
pub async fn serve(
    blobs: &dyn BlobStore,
    asset: &Asset,
    range_header: Option<&str>,
    fallback_content_type: &str,
) -> Result<StreamReply> {
    let handle = match blobs.open(&asset.storage_key).await {
        Ok(h) => h,
        Err(e @ Error::StorageIntegrity(_)) => {
            tracing::error!(
                asset_id = %asset.id,
                storage_key = %asset.storage_key,
                error = %e,
                "Asset has no stored bytes"
            );
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    let window = RangeRequest::parse(range_header).resolve(handle.len)?;

    tracing::debug!(
        asset_id = %asset.id,
        start = window.start,
        end = window.end,
        total = window.total,
        partial = window.partial,
        "Streaming window"
    );

    let content_type = content_type_header(&asset.storage_key, fallback_content_type);
    let body = handle.into_window_reader(window).await?;

    Ok(StreamReply {
        window,
        content_type,
        chunk_size: DEFAULT_CHUNK,
        body: Box::new(body),
    })
}
