//! Error types for the warmup service.

use std::time::Duration;

use prewarm_types::Method;
use thiserror::Error;

/// Errors from a single warmup request, reported in [`Response::error`](crate::Response::error).
#[derive(Debug, Error)]
pub enum TransportError {
    /// The target answered an HTTP request with a status outside of `2xx`.
    #[error("{method} {url} returned {status} {text}, expected 2xx")]
    UnexpectedStatus {
        /// Method of the failed request.
        method: Method,
        /// Full URL of the failed request.
        url: String,
        /// Numeric status code of the response.
        status: u16,
        /// Text of the response body.
        text: String,
    },

    /// Any error emitted from the underlying [`reqwest`] client.
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    /// The gRPC channel could not be created or became unavailable.
    #[error("gRPC transport error: {0}")]
    Connect(#[from] tonic::transport::Error),

    /// The target answered a gRPC call with a non-OK status.
    #[error("{service_method} returned {}: {}", status.code(), status.message())]
    Status {
        /// The fully qualified method that was called.
        service_method: String,
        /// The status returned by the target.
        status: Box<tonic::Status>,
    },

    /// The gRPC method name does not form a valid request path.
    #[error("invalid gRPC service method {0:?}")]
    InvalidServiceMethod(String),

    /// A gRPC header is not of the form `key: value`, or contains invalid characters.
    #[error("invalid gRPC header {0:?}, expected `key: value`")]
    InvalidHeader(String),

    /// The gRPC client was already closed.
    #[error("gRPC client is closed")]
    Closed,
}

/// Errors that prevent a [`Target`](crate::Target) from being constructed.
#[derive(Debug, Error)]
pub enum TargetError {
    /// A readiness check was configured without a client to run it.
    #[error("readiness check for {0} configured, but no {0} readiness client given")]
    MissingReadinessClient(&'static str),

    /// The target did not become ready within the configured timeout.
    #[error("target was not ready after {0:?}")]
    ReadinessTimeout(Duration),

    /// Waiting for readiness was cancelled.
    #[error("readiness check cancelled")]
    Cancelled,
}

/// Errors that prevent a [`Warmup`](crate::Warmup) session from starting.
#[derive(Debug, Error)]
pub enum WarmupError {
    /// The warmup target could not be constructed.
    #[error("new target: {0}")]
    Target(#[from] TargetError),

    /// The warmup options are invalid.
    #[error("invalid options: {0}")]
    InvalidOptions(&'static str),
}
