//! Request line and header decoding into a [`RequestContext`].
//!
//! The decoder performs no I/O, the connection handler reads the raw lines and
//! hands them over. Decoding happens in three steps:
//!
//! 1. Tokenize the request line into `method path [version]`
//! 2. Parse the header lines into a [`HeaderSet`](crate::protocol::HeaderSet)
//! 3. Derive the request metadata from the base environment, the request and
//!    its headers

use percent_encoding::percent_decode_str;
use tracing::trace;

use crate::codec::header_decoder::decode_headers;
use crate::config::GatewayConfig;
use crate::protocol::environ::{
    CONTENT_LENGTH, CONTENT_TYPE, PATH_INFO, QUERY_STRING, REMOTE_ADDR, REMOTE_HOST, REQUEST_METHOD, SERVER_PROTOCOL,
    fold_headers,
};
use crate::protocol::{DEFAULT_REQUEST_VERSION, ParseError, PeerInfo, RequestContext};

/// The three parts of a request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine<'a> {
    pub method: &'a str,
    pub target: &'a str,
    pub version: &'a str,
}

impl<'a> RequestLine<'a> {
    /// Splits a request line on whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::MalformedRequestLine`] unless the line has exactly two
    /// or three tokens. Two tokens get [`DEFAULT_REQUEST_VERSION`].
    pub fn parse(line: &'a str) -> Result<Self, ParseError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut tokens = line.split_whitespace();
        match (tokens.next(), tokens.next(), tokens.next(), tokens.next()) {
            (Some(method), Some(target), version, None) => {
                Ok(Self { method, target, version: version.unwrap_or(DEFAULT_REQUEST_VERSION) })
            }
            _ => Err(ParseError::malformed_request_line(line)),
        }
    }
}

/// Splits a request target on the first `?` into the decoded path and the raw query.
pub fn split_target(target: &str) -> (String, String) {
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    (percent_decode_str(path).decode_utf8_lossy().into_owned(), query.to_owned())
}

/// Builds [`RequestContext`]s for one connection.
#[derive(Debug)]
pub struct RequestDecoder<'a> {
    config: &'a GatewayConfig,
    peer: &'a PeerInfo,
}

impl<'a> RequestDecoder<'a> {
    pub fn new(config: &'a GatewayConfig, peer: &'a PeerInfo) -> Self {
        Self { config, peer }
    }

    /// Decodes a raw request line and its raw header lines.
    ///
    /// # Errors
    ///
    /// Returns a malformed-request [`ParseError`] if the request line does not
    /// tokenize or a header line is invalid. The caller must then drop the
    /// request without running an application.
    pub fn decode<S: AsRef<str>>(&self, request_line: &str, header_lines: &[S]) -> Result<RequestContext, ParseError> {
        let line = RequestLine::parse(request_line)?;
        let headers = decode_headers(header_lines, self.config.header_limit())?;

        let (path, query) = split_target(line.target);
        let close_connection = !headers.get("Connection").is_some_and(|value| value.eq_ignore_ascii_case("keep-alive"));
        trace!(method = line.method, path = %path, close_connection, "decoded request");

        let mut request = RequestContext {
            request_line: request_line.trim_end_matches(['\r', '\n']).to_owned(),
            method: line.method.to_owned(),
            raw_path: line.target.to_owned(),
            path,
            query,
            protocol_version: line.version.to_owned(),
            headers,
            peer: self.peer.clone(),
            close_connection,
            metadata: self.config.base().to_metadata(),
        };
        populate_metadata(&mut request);
        Ok(request)
    }
}

fn populate_metadata(request: &mut RequestContext) {
    let RequestContext { method, path, query, protocol_version, headers, peer, metadata, .. } = request;

    metadata.insert(SERVER_PROTOCOL.to_owned(), protocol_version.clone());
    metadata.insert(REQUEST_METHOD.to_owned(), method.clone());
    metadata.insert(PATH_INFO.to_owned(), path.clone());
    metadata.insert(QUERY_STRING.to_owned(), query.clone());

    if peer.host() != peer.address() {
        metadata.insert(REMOTE_HOST.to_owned(), peer.host().to_owned());
    }
    metadata.insert(REMOTE_ADDR.to_owned(), peer.address().to_owned());

    if let Some(content_type) = headers.get("Content-Type") {
        metadata.insert(CONTENT_TYPE.to_owned(), content_type.to_owned());
    }
    // an empty length keeps the base default
    if let Some(content_length) = headers.get("Content-Length").filter(|value| !value.is_empty()) {
        metadata.insert(CONTENT_LENGTH.to_owned(), content_length.to_owned());
    }

    fold_headers(metadata, headers);
}
