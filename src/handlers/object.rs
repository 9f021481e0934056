//! Object-level S3 API handlers.
//!
//! Covers upload/download with conditional and range semantics, copy,
//! single and batch delete, the canned ACL response, and the
//! static-website behaviors (index document, error document, routing
//! rule redirects).

use std::io;
use std::sync::Arc;
use std::time::SystemTime;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use percent_encoding::percent_decode_str;
use tracing::{debug, warn};

use super::bucket::resolve_bucket;
use crate::config::RoutingRule;
use crate::errors::S3Error;
use crate::fs::adapter::ByteStream;
use crate::store::{MetaHeader, ObjectAttrs, ObjectMeta, ObjectRead};
use crate::xml;
use crate::AppState;

/// Body of the built-in 404 page served when no error document applies.
const NOT_FOUND_HTML: &str = "<!DOCTYPE html>\n\
<html><head><title>404 - Resource Not Found</title></head>\n\
<body><h1>404 - Resource Not Found</h1></body></html>\n";

// ── Range parsing ───────────────────────────────────────────────────

/// Parse a Range header of the form `bytes=start-end` or `bytes=start-`.
///
/// Suffix ranges and multi-range requests are not supported and yield
/// `None`, which callers treat as "serve the full body".
fn parse_range_header(value: &str) -> Option<(u64, Option<u64>)> {
    let spec = value.trim().strip_prefix("bytes=")?;
    if spec.contains(',') {
        return None;
    }
    let (start, end) = spec.split_once('-')?;
    let start: u64 = start.parse().ok()?;
    let end = if end.is_empty() {
        None
    } else {
        Some(end.parse().ok()?)
    };
    Some((start, end))
}

fn range_of(headers: &HeaderMap) -> Option<(u64, Option<u64>)> {
    headers
        .get("range")
        .and_then(|v| v.to_str().ok())
        .and_then(parse_range_header)
}

// ── Conditional request evaluation ──────────────────────────────────

/// Evaluate `If-None-Match` then `If-Modified-Since` against an object.
///
/// `If-Modified-Since` replies 304 when the timestamps are equal at
/// second precision.
fn evaluate_conditions(headers: &HeaderMap, meta: &ObjectMeta) -> Result<(), S3Error> {
    if let Some(if_none_match) = headers.get("if-none-match").and_then(|v| v.to_str().ok()) {
        let if_none_match = if_none_match.trim();
        if if_none_match == "*" || if_none_match == format!("\"{}\"", meta.md5) {
            return Err(S3Error::NotModified);
        }
    }

    if let Some(if_modified) = headers
        .get("if-modified-since")
        .and_then(|v| v.to_str().ok())
    {
        if let Ok(since) = httpdate::parse_http_date(if_modified) {
            let since: DateTime<Utc> = since.into();
            if since.timestamp() >= meta.modified_date.timestamp() {
                return Err(S3Error::NotModified);
            }
        }
    }

    Ok(())
}

// ── Header extraction ───────────────────────────────────────────────

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

/// Pull the preserved upload headers out of the request.
fn extract_attrs(headers: &HeaderMap) -> ObjectAttrs {
    let mut custom_meta_data = Vec::new();
    for (name, value) in headers {
        if name.as_str().starts_with("x-amz-meta-") {
            if let Ok(value) = value.to_str() {
                custom_meta_data.push(MetaHeader {
                    name: name.as_str().to_string(),
                    value: value.to_string(),
                });
            }
        }
    }

    ObjectAttrs {
        content_type: header_str(headers, "content-type"),
        content_encoding: header_str(headers, "content-encoding"),
        content_disposition: header_str(headers, "content-disposition"),
        custom_meta_data,
    }
}

/// Adapt the HTTP request body into the store's stream type.
fn body_stream(body: Body) -> ByteStream {
    Box::pin(body.into_data_stream().map_err(io::Error::other))
}

// ── Response building ───────────────────────────────────────────────

/// Build a body-bearing object response: metadata headers, range
/// arithmetic, preserved custom headers.  `status` is overridden to 206
/// when a resolved range is present.  For HEAD, the body is omitted but
/// the headers (including Content-Length) are identical.
fn object_response(status: StatusCode, read: ObjectRead, head_only: bool) -> Response {
    let ObjectRead { meta, range, body } = read;

    let status = if range.is_some() {
        StatusCode::PARTIAL_CONTENT
    } else {
        status
    };
    let body = if head_only {
        Body::empty()
    } else {
        Body::from_stream(body)
    };

    let mut response = (status, body).into_response();
    let hdrs = response.headers_mut();

    hdrs.insert(
        "etag",
        HeaderValue::from_str(&format!("\"{}\"", meta.md5)).unwrap(),
    );
    hdrs.insert(
        "last-modified",
        HeaderValue::from_str(&httpdate::fmt_http_date(SystemTime::from(meta.modified_date)))
            .unwrap(),
    );
    hdrs.insert(
        "content-type",
        HeaderValue::from_str(&meta.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    match range {
        Some((start, end)) => {
            hdrs.insert(
                "content-range",
                HeaderValue::from_str(&format!("bytes {start}-{end}/{}", meta.size)).unwrap(),
            );
            hdrs.insert("accept-ranges", HeaderValue::from_static("bytes"));
            hdrs.insert(
                "content-length",
                HeaderValue::from_str(&(end - start + 1).to_string()).unwrap(),
            );
        }
        None => {
            hdrs.insert(
                "content-length",
                HeaderValue::from_str(&meta.size.to_string()).unwrap(),
            );
        }
    }

    if let Some(encoding) = &meta.content_encoding {
        if let Ok(value) = HeaderValue::from_str(encoding) {
            hdrs.insert("content-encoding", value);
        }
    }
    if let Some(disposition) = &meta.content_disposition {
        if let Ok(value) = HeaderValue::from_str(disposition) {
            hdrs.insert("content-disposition", value);
        }
    }

    for header in &meta.custom_meta_data {
        if let (Ok(name), Ok(value)) = (
            axum::http::header::HeaderName::from_bytes(header.name.as_bytes()),
            HeaderValue::from_str(&header.value),
        ) {
            hdrs.insert(name, value);
        }
    }

    response
}

// ── Static-site behaviors ───────────────────────────────────────────

/// Redirect response for a configured routing rule.  `HostName` is used
/// verbatim when present (it may carry a port); otherwise the request
/// Host header stands in.
fn redirect_response(rule: &RoutingRule, key: &str, headers: &HeaderMap) -> Response {
    let redirect = &rule.redirect;
    let host = redirect
        .host_name
        .clone()
        .or_else(|| header_str(headers, "host"))
        .unwrap_or_else(|| "localhost".to_string());
    let location = format!(
        "{}://{host}/{}{key}",
        redirect.protocol, redirect.replace_key_prefix_with
    );
    let status = StatusCode::from_u16(redirect.http_redirect_code)
        .unwrap_or(StatusCode::MOVED_PERMANENTLY);

    let mut response = status.into_response();
    response
        .headers_mut()
        .insert("location", HeaderValue::from_str(&location).unwrap());
    response
}

/// Error-document fallback: serve the configured error document with
/// status 404, or the built-in HTML page when it is absent or missing.
async fn website_fallback(state: &AppState, bucket: &str) -> Result<Response, S3Error> {
    if let Some(error_document) = &state.config.website.error_document {
        match state.store.get_object(bucket, error_document, None).await {
            Ok(Some(read)) => return Ok(object_response(StatusCode::NOT_FOUND, read, false)),
            Ok(None) => {}
            Err(err) => warn!(bucket, error = %err, "error document unreadable"),
        }
    }

    Ok((
        StatusCode::NOT_FOUND,
        [("content-type", "text/html")],
        NOT_FOUND_HTML,
    )
        .into_response())
}

/// Serve the index document for a bucket root, falling back to the
/// error-document chain when it is missing.
pub(crate) async fn serve_bucket_index(
    state: &AppState,
    bucket: &str,
    index: &str,
) -> Result<Response, S3Error> {
    match state.store.get_object(bucket, index, None).await {
        Ok(Some(read)) => Ok(object_response(StatusCode::OK, read, false)),
        Ok(None) => website_fallback(state, bucket).await,
        Err(err) => Err(S3Error::InternalError(err.into())),
    }
}

/// A GET missed: redirect per routing rule, retry as a directory index,
/// or fall back to the error document.
async fn get_object_miss(
    state: &AppState,
    bucket: &str,
    key: &str,
    headers: &HeaderMap,
) -> Result<Response, S3Error> {
    if let Some(rule) = &state.config.website.routing_rule {
        return Ok(redirect_response(rule, key, headers));
    }

    if let Some(index) = &state.config.website.index_document {
        let retry = format!("{key}/{index}");
        if let Ok(Some(read)) = state.store.get_object(bucket, &retry, None).await {
            return Ok(object_response(StatusCode::OK, read, false));
        }
    }

    website_fallback(state, bucket).await
}

// ── Handlers ────────────────────────────────────────────────────────

/// `GET /{bucket}/{key}` -- Retrieve an object (or its canned ACL).
pub async fn get_object(
    state: Arc<AppState>,
    bucket: &str,
    key: &str,
    headers: &HeaderMap,
    query: &std::collections::HashMap<String, String>,
) -> Result<Response, S3Error> {
    resolve_bucket(&state, bucket).await?;

    if query.contains_key("acl") {
        let body = xml::render_access_control_policy();
        return Ok((StatusCode::OK, [("content-type", "application/xml")], body).into_response());
    }

    let range = range_of(headers);
    match state.store.get_object(bucket, key, range).await {
        Ok(Some(read)) => {
            evaluate_conditions(headers, &read.meta)?;
            Ok(object_response(StatusCode::OK, read, false))
        }
        Ok(None) => get_object_miss(&state, bucket, key, headers).await,
        Err(err) => Err(S3Error::InternalError(err.into())),
    }
}

/// `HEAD /{bucket}/{key}` -- Object metadata without the body.
pub async fn head_object(
    state: Arc<AppState>,
    bucket: &str,
    key: &str,
    headers: &HeaderMap,
) -> Result<Response, S3Error> {
    resolve_bucket(&state, bucket).await?;

    match state.store.get_object(bucket, key, range_of(headers)).await {
        Ok(Some(read)) => {
            evaluate_conditions(headers, &read.meta)?;
            Ok(object_response(StatusCode::OK, read, true))
        }
        // HEAD responses carry no body, so no XML error envelope.
        Ok(None) => Ok(StatusCode::NOT_FOUND.into_response()),
        Err(err) => Err(S3Error::InternalError(err.into())),
    }
}

/// `PUT /{bucket}/{key}` -- Upload an object, or copy when
/// `x-amz-copy-source` is present.
pub async fn put_object(
    state: Arc<AppState>,
    bucket: &str,
    key: &str,
    headers: &HeaderMap,
    body: Body,
) -> Result<Response, S3Error> {
    resolve_bucket(&state, bucket).await?;

    if headers.contains_key("x-amz-copy-source") {
        return copy_object(state, bucket, key, headers).await;
    }

    store_object(&state, bucket, key, headers, body).await
}

/// `POST /{bucket}/{key}` -- Form-style upload; same storage path as PUT.
pub async fn post_object(
    state: Arc<AppState>,
    bucket: &str,
    key: &str,
    headers: &HeaderMap,
    body: Body,
) -> Result<Response, S3Error> {
    resolve_bucket(&state, bucket).await?;
    store_object(&state, bucket, key, headers, body).await
}

async fn store_object(
    state: &AppState,
    bucket: &str,
    key: &str,
    headers: &HeaderMap,
    body: Body,
) -> Result<Response, S3Error> {
    let attrs = extract_attrs(headers);
    let meta = state
        .store
        .put_object(bucket, key, attrs, body_stream(body))
        .await
        .map_err(|err| S3Error::InternalError(err.into()))?;
    debug!(bucket, key, size = meta.size, "object stored");

    let mut response = StatusCode::OK.into_response();
    response.headers_mut().insert(
        "etag",
        HeaderValue::from_str(&format!("\"{}\"", meta.md5)).unwrap(),
    );
    Ok(response)
}

/// `PUT /{bucket}/{key}` with `x-amz-copy-source` -- Copy an object.
async fn copy_object(
    state: Arc<AppState>,
    dst_bucket: &str,
    dst_key: &str,
    headers: &HeaderMap,
) -> Result<Response, S3Error> {
    let source = header_str(headers, "x-amz-copy-source")
        .ok_or_else(|| S3Error::InternalError(anyhow::anyhow!("missing copy source")))?;
    let decoded = percent_decode_str(&source).decode_utf8_lossy().into_owned();
    let (src_bucket, src_key) = decoded
        .trim_start_matches('/')
        .split_once('/')
        .ok_or_else(|| {
            S3Error::InternalError(anyhow::anyhow!("malformed copy source: {decoded}"))
        })?;

    resolve_bucket(&state, src_bucket).await?;
    let exists = state
        .store
        .object_exists(src_bucket, src_key)
        .await
        .map_err(|err| S3Error::InternalError(err.into()))?;
    if !exists {
        return Err(S3Error::NoSuchKey {
            key: src_key.to_string(),
        });
    }

    let replace_metadata = header_str(headers, "x-amz-metadata-directive")
        .is_some_and(|directive| directive == "REPLACE");
    let attrs = extract_attrs(headers);

    let meta = state
        .store
        .copy_object(src_bucket, src_key, dst_bucket, dst_key, replace_metadata, attrs)
        .await
        .map_err(|err| S3Error::InternalError(err.into()))?
        .ok_or_else(|| S3Error::NoSuchKey {
            key: src_key.to_string(),
        })?;
    debug!(
        src_bucket,
        src_key, dst_bucket, dst_key, "object copied"
    );

    let body = xml::render_copy_object_result(&meta.md5, &meta.modified_date);
    Ok((StatusCode::OK, [("content-type", "application/xml")], body).into_response())
}

/// `DELETE /{bucket}/{key}` -- Delete a single object.
pub async fn delete_object(
    state: Arc<AppState>,
    bucket: &str,
    key: &str,
) -> Result<Response, S3Error> {
    resolve_bucket(&state, bucket).await?;

    let exists = state
        .store
        .object_exists(bucket, key)
        .await
        .map_err(|err| S3Error::InternalError(err.into()))?;
    if !exists {
        return Err(S3Error::NoSuchKey {
            key: key.to_string(),
        });
    }

    state
        .store
        .delete_object(bucket, key)
        .await
        .map_err(|err| S3Error::from_store(err, bucket, key))?;
    debug!(bucket, key, "object deleted");

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// `POST /{bucket}?delete` -- Batch delete.
///
/// Two phases: every key is checked for existence before any delete
/// runs, so a missing key fails the whole batch with `NoSuchKey` and no
/// side effects.  The delete phase stops at the first failure; keys
/// already removed stay removed.
pub async fn delete_objects(
    state: Arc<AppState>,
    bucket: &str,
    body: &[u8],
) -> Result<Response, S3Error> {
    resolve_bucket(&state, bucket).await?;

    let keys = parse_delete_xml(body)?;

    for key in &keys {
        let exists = state
            .store
            .object_exists(bucket, key)
            .await
            .map_err(|err| S3Error::InternalError(err.into()))?;
        if !exists {
            return Err(S3Error::NoSuchKey { key: key.clone() });
        }
    }

    for key in &keys {
        state
            .store
            .delete_object(bucket, key)
            .await
            .map_err(|err| S3Error::InternalError(err.into()))?;
    }
    debug!(bucket, count = keys.len(), "batch delete completed");

    let body = xml::render_delete_result(&keys);
    Ok((StatusCode::OK, [("content-type", "application/xml")], body).into_response())
}

/// Parse a `<Delete>` envelope into its keys, in document order.
///
/// The reader does not validate well-formedness on its own: it reports
/// a mismatched end tag, but a truncated body just runs into `Eof` with
/// tags still open.  The open-tag depth is tracked so truncation is
/// reported as an error too.
fn parse_delete_xml(body: &[u8]) -> Result<Vec<String>, S3Error> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_reader(body);
    reader.trim_text(true);

    let mut keys = Vec::new();
    let mut current_tag = String::new();
    let mut in_object = false;
    let mut depth = 0usize;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag == "Object" {
                    in_object = true;
                }
                current_tag = tag;
                depth += 1;
            }
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == b"Object" {
                    in_object = false;
                }
                current_tag.clear();
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Text(ref e)) => {
                if in_object && current_tag == "Key" {
                    let text = e
                        .unescape()
                        .map_err(|err| S3Error::InternalError(err.into()))?;
                    keys.push(text.into_owned());
                }
            }
            Ok(Event::Eof) => {
                if depth != 0 {
                    return Err(S3Error::InternalError(anyhow::anyhow!(
                        "truncated Delete body: {depth} unclosed element(s)"
                    )));
                }
                break;
            }
            Err(err) => return Err(S3Error::InternalError(err.into())),
            _ => {}
        }
        buf.clear();
    }

    Ok(keys)
}

// ── Tests ───────────────────────────────────────────────────────────
