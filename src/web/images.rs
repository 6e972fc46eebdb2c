use std::io::Cursor;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::http::header::{
    CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH,
    LAST_MODIFIED,
};
use axum::http::response::Builder;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use base64::Engine;
use base64::engine::general_purpose;
use chrono::NaiveDateTime;
use httpdate::{fmt_http_date, parse_http_date};
use image::ImageFormat;

use crate::constants::IMAGE_CACHE_CONTROL;
use crate::error::SophiaError;

/// Raw image bytes recovered from a data URI.
#[derive(Clone, Debug)]
pub(crate) struct BackdropPayload {
    pub(crate) bytes: Vec<u8>,
    pub(crate) content_type: String,
}

/// Splits a `data:<mime>;base64,<payload>` URI into bytes. Anything that is
/// not a data URI returns `None`; the caller decides between redirecting and
/// fetching the external URL.
pub(crate) fn decode_data_uri(image_url: &str) -> Result<Option<BackdropPayload>, SophiaError> {
    let Some(rest) = image_url.strip_prefix("data:") else {
        return Ok(None);
    };
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| SophiaError::InternalServerError("malformed data URI".to_string()))?;
    let content_type = meta.strip_suffix(";base64").unwrap_or(meta);
    let content_type = if content_type.is_empty() {
        "image/png"
    } else {
        content_type
    };
    let bytes = general_purpose::STANDARD
        .decode(payload.as_bytes())
        .map_err(|err| SophiaError::InternalServerError(format!("data URI base64: {err}")))?;
    Ok(Some(BackdropPayload {
        bytes,
        content_type: content_type.to_string(),
    }))
}

/// Cache validators for a stored favorite backdrop, derived from the payload
/// size and the row's save time.
#[derive(Clone, Debug)]
pub(crate) struct CacheValidators {
    etag: Option<HeaderValue>,
    last_modified: Option<HeaderValue>,
    modified_at: SystemTime,
}

impl CacheValidators {
    pub(crate) fn new(size: u64, created_at: NaiveDateTime) -> Self {
        let saved_secs = created_at.and_utc().timestamp().max(0) as u64;
        let modified_at = UNIX_EPOCH + Duration::from_secs(saved_secs);
        let etag = HeaderValue::from_str(&format!("W/\"{}-{}\"", size, saved_secs)).ok();
        let last_modified = HeaderValue::from_str(&fmt_http_date(modified_at)).ok();
        Self {
            etag,
            last_modified,
            modified_at,
        }
    }

    fn apply(&self, mut builder: Builder) -> Builder {
        builder = builder.header(CACHE_CONTROL, IMAGE_CACHE_CONTROL.as_str());
        if let Some(etag) = &self.etag {
            builder = builder.header(ETAG, etag.clone());
        }
        if let Some(last_modified) = &self.last_modified {
            builder = builder.header(LAST_MODIFIED, last_modified.clone());
        }
        builder
    }

    /// True when the request's conditional headers match these validators.
    pub(crate) fn request_is_fresh(&self, headers: &HeaderMap) -> bool {
        if let Some(if_none_match) = headers.get(IF_NONE_MATCH) {
            if let Ok(value) = if_none_match.to_str() {
                let value = value.trim();
                if value == "*" {
                    return true;
                }
                if let Some(etag) = self.etag.as_ref().and_then(|value| value.to_str().ok())
                    && value.split(',').any(|candidate| candidate.trim() == etag)
                {
                    return true;
                }
            }
            return false;
        }

        if let Some(if_modified_since) = headers.get(IF_MODIFIED_SINCE)
            && let Ok(value) = if_modified_since.to_str()
            && let Ok(since) = parse_http_date(value)
            && self.modified_at <= since
        {
            return true;
        }

        false
    }

    /// Builds a 304 that preserves cache headers.
    pub(crate) fn not_modified(&self) -> Result<Response, SophiaError> {
        self.apply(Response::builder().status(StatusCode::NOT_MODIFIED))
            .body(Body::empty())
            .map_err(SophiaError::from)
    }

    /// Builds a 200 carrying the payload and cache headers.
    pub(crate) fn payload_response(&self, payload: BackdropPayload) -> Result<Response, SophiaError> {
        self.apply(Response::builder().status(StatusCode::OK))
            .header(CONTENT_TYPE, payload.content_type)
            .body(Body::from(payload.bytes))
            .map_err(SophiaError::from)
    }
}

/// Re-encodes arbitrary image bytes as PNG for the card download.
pub(crate) fn encode_png(bytes: &[u8]) -> Result<Vec<u8>, SophiaError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|err| SophiaError::InternalServerError(format!("decode backdrop: {err}")))?;
    let mut out = Cursor::new(Vec::new());
    decoded
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|err| SophiaError::InternalServerError(format!("encode png: {err}")))?;
    Ok(out.into_inner())
}

/// Attachment download response for an exported card.
pub(crate) fn png_download(filename: &str, png: Vec<u8>) -> Result<Response, SophiaError> {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "image/png")
        .header(
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}.png\""),
        )
        .body(Body::from(png))
        .map_err(SophiaError::from)
}
