//! Bucket-level S3 API handlers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::errors::S3Error;
use crate::store::{Bucket, ListOptions, DEFAULT_MAX_KEYS};
use crate::xml;
use crate::AppState;

// ── Bucket name validation ──────────────────────────────────────────

/// Bucket name pattern.  The optional separator byte matches any
/// character, not just dot or dash; length is checked separately.
static BUCKET_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(.?[-a-z0-9]+)*$").expect("bucket name pattern"));

/// Validate a bucket name: 3-63 characters matching [`BUCKET_NAME`].
pub fn validate_bucket_name(name: &str) -> Result<(), S3Error> {
    if !(3..=63).contains(&name.len()) || !BUCKET_NAME.is_match(name) {
        return Err(S3Error::InvalidBucketName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Look up a bucket, translating a miss into `404 NoSuchBucket`.
///
/// Every bucket-scoped route except CreateBucket goes through here
/// before doing any object work.
pub(crate) async fn resolve_bucket(state: &AppState, bucket: &str) -> Result<Bucket, S3Error> {
    match state.store.get_bucket(bucket).await {
        Ok(Some(bucket)) => Ok(bucket),
        Ok(None) => Err(S3Error::NoSuchBucket {
            bucket: bucket.to_string(),
        }),
        Err(err) => Err(S3Error::InternalError(err.into())),
    }
}

/// Translate listing query parameters into [`ListOptions`].
fn parse_list_options(query: &HashMap<String, String>) -> ListOptions {
    ListOptions {
        prefix: query.get("prefix").filter(|p| !p.is_empty()).cloned(),
        marker: query.get("marker").filter(|m| !m.is_empty()).cloned(),
        max_keys: query
            .get("max-keys")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_KEYS),
        delimiter: query.get("delimiter").filter(|d| !d.is_empty()).cloned(),
    }
}

// ── Handlers ────────────────────────────────────────────────────────

/// `GET /` -- List all buckets.
pub async fn list_buckets(state: Arc<AppState>) -> Result<Response, S3Error> {
    let buckets = state
        .store
        .get_buckets()
        .await
        .map_err(|err| S3Error::InternalError(err.into()))?;

    let body = xml::render_list_buckets(&buckets);
    Ok((StatusCode::OK, [("content-type", "application/xml")], body).into_response())
}

/// `PUT /{bucket}` -- Create a new bucket.
pub async fn create_bucket(state: Arc<AppState>, bucket: &str) -> Result<Response, S3Error> {
    validate_bucket_name(bucket)?;

    let exists = state
        .store
        .get_bucket(bucket)
        .await
        .map_err(|err| S3Error::InternalError(err.into()))?
        .is_some();
    if exists {
        return Err(S3Error::BucketAlreadyExists {
            bucket: bucket.to_string(),
        });
    }

    state
        .store
        .put_bucket(bucket)
        .await
        .map_err(|err| S3Error::InternalError(err.into()))?;
    debug!(bucket, "bucket created");

    let mut response = StatusCode::OK.into_response();
    response.headers_mut().insert(
        "location",
        HeaderValue::from_str(&format!("/{bucket}")).unwrap(),
    );
    Ok(response)
}

/// `DELETE /{bucket}` -- Delete an existing bucket (must be empty).
pub async fn delete_bucket(state: Arc<AppState>, bucket: &str) -> Result<Response, S3Error> {
    resolve_bucket(&state, bucket).await?;

    state
        .store
        .delete_bucket(bucket)
        .await
        .map_err(|err| S3Error::from_store(err, bucket, ""))?;
    debug!(bucket, "bucket deleted");

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// `GET /{bucket}` -- List objects, or serve the index document when
/// static-website mode is configured.
pub async fn get_bucket(
    state: Arc<AppState>,
    bucket: &str,
    query: &HashMap<String, String>,
) -> Result<Response, S3Error> {
    resolve_bucket(&state, bucket).await?;

    if let Some(index) = state.config.website.index_document.clone() {
        return super::object::serve_bucket_index(&state, bucket, &index).await;
    }

    let options = parse_list_options(query);
    let listing = state
        .store
        .list_objects(bucket, &options)
        .await
        .map_err(|err| S3Error::InternalError(err.into()))?;

    let body = xml::render_list_bucket_result(bucket, &options, &listing);
    Ok((StatusCode::OK, [("content-type", "application/xml")], body).into_response())
}

// ── Tests ───────────────────────────────────────────────────────────
