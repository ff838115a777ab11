//! Content delivery endpoints.

use crate::error::{ApiError, ApiResult};
use crate::metrics::{self, RunningStream};
use crate::range::{RangeRequest, parse_range};
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header::{
    ACCEPT_RANGES, ACCESS_CONTROL_EXPOSE_HEADERS, CACHE_CONTROL, CONTENT_DISPOSITION,
    CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, LAST_MODIFIED, RANGE,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use serde::Deserialize;
use spool_core::ContentDescriptor;
use spool_player::{PlayerError, Stream, throttle_stream};
use std::ops::Range;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

const X_POWERED_BY: HeaderName = HeaderName::from_static("x-powered-by");
const CACHE_FOREVER: &str = "public, max-age=31536000";

const HTTP_DATE: &[BorrowedFormatItem<'static>] = format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    #[serde(default)]
    pub download: Option<String>,
}

impl StreamQuery {
    fn wants_download(&self) -> bool {
        self.download.as_deref().is_some_and(|d| !d.is_empty())
    }
}

/// GET|HEAD /content/claims/{claim_name}/{claim_id}/{filename}
pub async fn get_claim_content(
    State(state): State<AppState>,
    Path((claim_name, claim_id, _filename)): Path<(String, String, String)>,
    Query(query): Query<StreamQuery>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    serve(&state, &claim_name, &claim_id, "", &query, &method, &headers).await
}

/// GET|HEAD /api/v3/streams/free/{claim_name}/{claim_id}
pub async fn get_free_stream(
    State(state): State<AppState>,
    Path((claim_name, claim_id)): Path<(String, String)>,
    Query(query): Query<StreamQuery>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    serve(&state, &claim_name, &claim_id, "", &query, &method, &headers).await
}

/// GET|HEAD /api/v3/streams/paid/{claim_name}/{claim_id}/{token}
pub async fn get_paid_stream(
    State(state): State<AppState>,
    Path((claim_name, claim_id, token)): Path<(String, String, String)>,
    Query(query): Query<StreamQuery>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    serve(&state, &claim_name, &claim_id, &token, &query, &method, &headers).await
}

async fn serve(
    state: &AppState,
    claim_name: &str,
    claim_id: &str,
    token: &str,
    query: &StreamQuery,
    method: &Method,
    headers: &HeaderMap,
) -> Response {
    let uri = ContentDescriptor::uri_for(claim_name, claim_id);
    let response = match play(state, &uri, token, query, method, headers).await {
        Ok(response) => response,
        Err(err) => {
            metrics::record_stream_error(err.kind().as_str());
            state.reporter.report(&uri, &err);
            err.into_response()
        }
    };
    metrics::record_request(response.status());
    response
}

async fn play(
    state: &AppState,
    uri: &str,
    token: &str,
    query: &StreamQuery,
    method: &Method,
    headers: &HeaderMap,
) -> ApiResult<Response> {
    let mut stream = state.player.resolve_stream(uri).await?;
    state.player.verify_access(&stream, token)?;
    stream.prepare_for_reading().await?;

    let size = stream.size();
    let range = match parse_range(headers.get(RANGE), size) {
        RangeRequest::Unsatisfiable => return Err(ApiError::RangeNotSatisfiable { size }),
        RangeRequest::Full => None,
        RangeRequest::Partial(range) => Some(range),
    };

    let mut response = Response::new(Body::empty());
    *response.status_mut() = if range.is_some() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };
    let body_range = range.clone().unwrap_or(0..size);
    write_headers(
        response.headers_mut(),
        state,
        &stream,
        query,
        range.as_ref().map(|r| (r, size)),
        body_range.end - body_range.start,
    );

    if *method == Method::HEAD || body_range.is_empty() {
        return Ok(response);
    }

    *response.body_mut() = body(state, &stream, body_range, uri).await?;
    Ok(response)
}

/// Throttled body over `range`. The first chunk is read before returning.
async fn body(state: &AppState, stream: &Stream, range: Range<u64>, uri: &str) -> ApiResult<Body> {
    let chunks = stream.byte_stream(range).await?;
    let paced = throttle_stream(chunks, state.player.new_throttle());

    let running = RunningStream::start();
    let reporter = state.reporter.clone();
    let uri = uri.to_string();
    let body = paced.map(move |item| {
        let _running = &running;
        match item {
            Ok(bytes) => {
                metrics::BYTES_SERVED.inc_by(bytes.len() as u64);
                Ok(bytes)
            }
            Err(e) => {
                let err = ApiError::from(PlayerError::from(e));
                metrics::record_stream_error(err.kind().as_str());
                reporter.report(&uri, &err);
                Err(std::io::Error::other(err.to_string()))
            }
        }
    });
    Ok(Body::from_stream(body))
}

fn write_headers(
    headers: &mut HeaderMap,
    state: &AppState,
    stream: &Stream,
    query: &StreamQuery,
    partial: Option<(&Range<u64>, u64)>,
    content_length: u64,
) {
    headers.insert(CONTENT_LENGTH, HeaderValue::from(content_length));
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_str(stream.content_type())
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(CACHE_FOREVER));
    headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    if let Some(modified) = http_date(stream.timestamp())
        && let Ok(value) = HeaderValue::from_str(&modified)
    {
        headers.insert(LAST_MODIFIED, value);
    }
    if let Ok(value) = HeaderValue::from_str(&state.instance_name) {
        headers.insert(X_POWERED_BY, value);
    }
    headers.insert(
        ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("X-Powered-By"),
    );
    if let Some((range, size)) = partial
        && let Ok(value) =
            HeaderValue::from_str(&format!("bytes {}-{}/{size}", range.start, range.end - 1))
    {
        headers.insert(CONTENT_RANGE, value);
    }
    if query.wants_download()
        && let Ok(value) = HeaderValue::from_str(&format!(
            "attachment; filename=\"{}\"",
            header_safe(&stream.filename())
        ))
    {
        headers.insert(CONTENT_DISPOSITION, value);
    }
}

/// RFC 7231 IMF-fixdate.
pub fn http_date(at: OffsetDateTime) -> Option<String> {
    at.to_offset(UtcOffset::UTC).format(HTTP_DATE).ok()
}

/// Make a file name safe inside a quoted header parameter.
fn header_safe(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect()
}
