//! Wire-level error handling.
//!
//! [`S3Error`] covers the handful of failure shapes this server can
//! produce: bucket name/existence conflicts, missing keys, the bodiless
//! 304, and an internal-error catch-all wrapping [`anyhow::Error`].
//! Converting into an [`axum::response::Response`] renders the S3 XML
//! `<Error>` envelope with the matching status code, which lets a
//! handler bail out with `?` at any point.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::store::StoreError;
use crate::xml::render_error;

/// Random request ID: 16 uppercase hex characters.
pub fn generate_request_id() -> String {
    let bytes: [u8; 8] = rand::random();
    hex::encode(bytes).to_uppercase()
}

/// S3 error codes expressed as a Rust enum.
#[derive(Debug, Error)]
pub enum S3Error {
    /// The specified bucket does not exist.
    #[error("The specified bucket does not exist")]
    NoSuchBucket { bucket: String },

    /// The specified key does not exist.
    #[error("The specified key does not exist")]
    NoSuchKey { key: String },

    /// A bucket with the requested name already exists.
    #[error("The requested bucket already exists")]
    BucketAlreadyExists { bucket: String },

    /// The bucket you tried to delete is not empty.
    #[error("The bucket you tried to delete is not empty")]
    BucketNotEmpty { bucket: String },

    /// An invalid bucket name was provided.
    #[error("Bucket name is invalid")]
    InvalidBucketName { name: String },

    /// Not modified (304 response for conditional requests).
    #[error("Not Modified")]
    NotModified,

    /// Catch-all for unexpected internal errors.
    #[error("We encountered an internal error, please try again.")]
    InternalError(#[from] anyhow::Error),
}

impl S3Error {
    /// Return the S3 XML error code string.
    pub fn code(&self) -> &'static str {
        match self {
            S3Error::NoSuchBucket { .. } => "NoSuchBucket",
            S3Error::NoSuchKey { .. } => "NoSuchKey",
            S3Error::BucketAlreadyExists { .. } => "BucketAlreadyExists",
            S3Error::BucketNotEmpty { .. } => "BucketNotEmpty",
            S3Error::InvalidBucketName { .. } => "InvalidBucketName",
            S3Error::NotModified => "NotModified",
            S3Error::InternalError(_) => "InternalError",
        }
    }

    /// Return the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            S3Error::NoSuchBucket { .. } => StatusCode::NOT_FOUND,
            S3Error::NoSuchKey { .. } => StatusCode::NOT_FOUND,
            S3Error::BucketAlreadyExists { .. } => StatusCode::CONFLICT,
            S3Error::BucketNotEmpty { .. } => StatusCode::CONFLICT,
            S3Error::InvalidBucketName { .. } => StatusCode::BAD_REQUEST,
            S3Error::NotModified => StatusCode::NOT_MODIFIED,
            S3Error::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The resource string embedded in the XML error body.
    fn resource(&self) -> &str {
        match self {
            S3Error::NoSuchBucket { bucket } => bucket,
            S3Error::NoSuchKey { key } => key,
            S3Error::BucketAlreadyExists { bucket } => bucket,
            S3Error::BucketNotEmpty { bucket } => bucket,
            S3Error::InvalidBucketName { name } => name,
            _ => "",
        }
    }

    /// Translate a store-level failure into its wire representation,
    /// filling in the bucket/key the handler was working on.
    pub fn from_store(err: StoreError, bucket: &str, key: &str) -> Self {
        match err {
            StoreError::NotFound if key.is_empty() => S3Error::NoSuchBucket {
                bucket: bucket.to_string(),
            },
            StoreError::NotFound => S3Error::NoSuchKey {
                key: key.to_string(),
            },
            StoreError::BucketNotEmpty => S3Error::BucketNotEmpty {
                bucket: bucket.to_string(),
            },
            other => S3Error::InternalError(other.into()),
        }
    }
}

impl IntoResponse for S3Error {
    fn into_response(self) -> Response {
        let request_id = generate_request_id();
        let status = self.status_code();

        // 304 Not Modified responses must not have a body.
        if matches!(self, S3Error::NotModified) {
            return (status, [("x-amz-request-id", request_id)]).into_response();
        }

        let body = render_error(self.code(), &self.to_string(), self.resource(), &request_id);

        (
            status,
            [
                ("content-type", "application/xml".to_string()),
                ("x-amz-request-id", request_id),
            ],
            body,
        )
            .into_response()
    }
}
