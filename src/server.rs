//! Axum router construction and S3 route mapping.
//!
//! The [`app`] function wires every endpoint to its handler and
//! returns a ready-to-serve [`axum::Router`].
//!
//! S3 distinguishes some operations by query parameters rather than
//! method+path (`POST /:bucket?delete` is batch delete, `GET
//! /:bucket/key?acl` is an ACL read), so each dispatcher parses the raw
//! query and routes internally.

use axum::{
    extract::{DefaultBodyLimit, Path, RawQuery, State},
    http::{HeaderMap, HeaderValue, Request},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, head, post, put},
    Router,
};
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::{generate_request_id, S3Error};
use crate::AppState;

/// Build the axum [`Router`] with all routes.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        // Service-level: GET / -> ListBuckets
        .route("/", get(handle_get_service))
        // Bucket-level routes
        .route("/:bucket", get(handle_get_bucket))
        .route("/:bucket", put(handle_put_bucket))
        .route("/:bucket", delete(handle_delete_bucket))
        .route("/:bucket", post(handle_post_bucket))
        // Bucket root with a trailing slash serves the website index.
        .route("/:bucket/", get(handle_get_bucket))
        // Object-level routes (wildcard key captures slashes)
        .route("/:bucket/*key", get(handle_get_object))
        .route("/:bucket/*key", head(handle_head_object))
        .route("/:bucket/*key", put(handle_put_object))
        .route("/:bucket/*key", post(handle_post_object))
        .route("/:bucket/*key", delete(handle_delete_object))
        .with_state(state)
        .layer(middleware::from_fn(common_headers_middleware))
        // Disable the default 2MB body size limit (objects can be large).
        .layer(DefaultBodyLimit::disable())
}

// ── Common headers middleware ───────────────────────────────────────

/// Stamps every outgoing response with the headers shared by all
/// operations: a generated `x-amz-request-id` (kept if already set),
/// the `Date` and `Server` identification pair, and the wildcard
/// `Access-Control-Allow-Origin`.
async fn common_headers_middleware(req: Request<axum::body::Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    if !headers.contains_key("x-amz-request-id") {
        let request_id = generate_request_id();
        headers.insert(
            "x-amz-request-id",
            HeaderValue::from_str(&request_id).unwrap(),
        );
    }

    let date = httpdate::fmt_http_date(std::time::SystemTime::now());
    headers.insert("date", HeaderValue::from_str(&date).unwrap());
    headers.insert("server", HeaderValue::from_static("ShelfStore"));
    headers.insert(
        "access-control-allow-origin",
        HeaderValue::from_static("*"),
    );

    response
}

// ── Query parameter parsing helper ──────────────────────────────────

/// Parse a raw query string into a map.  Value-less parameters such as
/// `?delete` and `?acl` map to empty strings.
fn parse_query(raw: Option<String>) -> HashMap<String, String> {
    let mut map = HashMap::new();
    if let Some(qs) = raw {
        for part in qs.split('&') {
            if let Some((k, v)) = part.split_once('=') {
                let decoded_k = percent_encoding::percent_decode_str(k)
                    .decode_utf8_lossy()
                    .into_owned();
                let decoded_v = percent_encoding::percent_decode_str(v)
                    .decode_utf8_lossy()
                    .into_owned();
                map.insert(decoded_k, decoded_v);
            } else if !part.is_empty() {
                let decoded = percent_encoding::percent_decode_str(part)
                    .decode_utf8_lossy()
                    .into_owned();
                map.insert(decoded, String::new());
            }
        }
    }
    map
}

// ── Service-level dispatch ──────────────────────────────────────────

/// `GET /` -- ListBuckets
async fn handle_get_service(State(state): State<Arc<AppState>>) -> Result<Response, S3Error> {
    crate::handlers::bucket::list_buckets(state).await
}

// ── Bucket-level dispatch ───────────────────────────────────────────

/// `GET /:bucket` -- list objects, or serve the website index.
async fn handle_get_bucket(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
    RawQuery(raw_query): RawQuery,
) -> Result<Response, S3Error> {
    let query = parse_query(raw_query);
    crate::handlers::bucket::get_bucket(state, &bucket, &query).await
}

/// `PUT /:bucket` -- CreateBucket
async fn handle_put_bucket(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
) -> Result<Response, S3Error> {
    crate::handlers::bucket::create_bucket(state, &bucket).await
}

/// `DELETE /:bucket` -- DeleteBucket
async fn handle_delete_bucket(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
) -> Result<Response, S3Error> {
    crate::handlers::bucket::delete_bucket(state, &bucket).await
}

/// `POST /:bucket` -- dispatches based on query params:
/// - `?delete` -> DeleteObjects (batch delete)
async fn handle_post_bucket(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
    RawQuery(raw_query): RawQuery,
    body: axum::body::Bytes,
) -> Result<Response, S3Error> {
    let query = parse_query(raw_query);

    if query.contains_key("delete") {
        crate::handlers::object::delete_objects(state, &bucket, &body).await
    } else {
        Err(S3Error::InternalError(anyhow::anyhow!(
            "unsupported bucket POST"
        )))
    }
}

// ── Object-level dispatch ───────────────────────────────────────────

/// `GET /:bucket/*key` -- GetObject (or GetObjectAcl with `?acl`).
async fn handle_get_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
) -> Result<Response, S3Error> {
    let query = parse_query(raw_query);
    crate::handlers::object::get_object(state, &bucket, &key, &headers, &query).await
}

/// `HEAD /:bucket/*key` -- HeadObject
async fn handle_head_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, S3Error> {
    crate::handlers::object::head_object(state, &bucket, &key, &headers).await
}

/// `PUT /:bucket/*key` -- PutObject, or CopyObject when the
/// `x-amz-copy-source` header is present.
async fn handle_put_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<Response, S3Error> {
    crate::handlers::object::put_object(state, &bucket, &key, &headers, body).await
}

/// `POST /:bucket/*key` -- form-style upload.
async fn handle_post_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<Response, S3Error> {
    crate::handlers::object::post_object(state, &bucket, &key, &headers, body).await
}

/// `DELETE /:bucket/*key` -- DeleteObject
async fn handle_delete_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, S3Error> {
    crate::handlers::object::delete_object(state, &bucket, &key).await
}
