use std::any::Any;
use std::error::Error;
use std::io;

use thiserror::Error;

/// The failure type an application may return, or raise while producing its body.
pub type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: GatewayError,
    },
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("malformed request line: {line:?}")]
    MalformedRequestLine { line: String },

    #[error("line exceeds the limit of {max_size} bytes")]
    LineTooLong { max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn malformed_request_line<S: ToString>(line: S) -> Self {
        Self::MalformedRequestLine { line: line.to_string() }
    }

    pub fn line_too_long(max_size: usize) -> Self {
        Self::LineTooLong { max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// Returns true for failures caused by the client's bytes rather than by the transport.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, Self::Io { .. })
    }
}

/// Failures raised while an application drives a response.
///
/// The first three variants are contract violations: the application called the
/// response-initiation or write capability out of order. `Reraised` hands an
/// application's own failure back to it when it tries to restart a response whose
/// headers are already on the wire.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("headers already set")]
    HeadersAlreadySet,

    #[error("write before start")]
    WriteBeforeStart,

    #[error("invalid status {status:?}: {reason}")]
    InvalidStatus { status: String, reason: &'static str },

    #[error("headers already sent, re-raising: {source}")]
    Reraised { source: BoxError },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl GatewayError {
    pub fn invalid_status<S: ToString>(status: S, reason: &'static str) -> Self {
        Self::InvalidStatus { status: status.to_string(), reason }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// Returns true if this is a programming error in the application.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::HeadersAlreadySet | Self::WriteBeforeStart | Self::InvalidStatus { .. })
    }
}

/// Turns a caught panic payload into an application failure.
pub(crate) fn panic_error(payload: Box<dyn Any + Send>) -> BoxError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned());
    format!("application panicked: {message}").into()
}
