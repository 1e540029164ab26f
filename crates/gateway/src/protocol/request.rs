//! The normalized request context.
//!
//! A [`RequestContext`] is produced once per request by
//! [`RequestDecoder`](crate::codec::RequestDecoder) and is read-only afterwards.

use crate::protocol::{HeaderSet, Metadata};

/// Default protocol version for two-token request lines.
pub const DEFAULT_REQUEST_VERSION: &str = "HTTP/1.1";

/// Connection-derived identity of the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    address: String,
    host: String,
}

impl PeerInfo {
    /// A peer known only by its address, the address doubles as host name.
    pub fn new<S: Into<String>>(address: S) -> Self {
        let address = address.into();
        Self { host: address.clone(), address }
    }

    #[must_use]
    pub fn with_host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = host.into();
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub(crate) request_line: String,
    pub(crate) method: String,
    pub(crate) raw_path: String,
    pub(crate) path: String,
    pub(crate) query: String,
    pub(crate) protocol_version: String,
    pub(crate) headers: HeaderSet,
    pub(crate) peer: PeerInfo,
    pub(crate) close_connection: bool,
    pub(crate) metadata: Metadata,
}

impl RequestContext {
    /// The request line as received, without its line terminator.
    pub fn request_line(&self) -> &str {
        &self.request_line
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// The request target before splitting off the query and decoding.
    pub fn raw_path(&self) -> &str {
        &self.raw_path
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    pub fn headers(&self) -> &HeaderSet {
        &self.headers
    }

    pub fn peer_address(&self) -> &str {
        self.peer.address()
    }

    pub fn peer_host(&self) -> &str {
        self.peer.host()
    }

    /// Whether the client asked to close the connection after this response.
    ///
    /// Only `Connection: keep-alive` clears it.
    pub fn close_connection(&self) -> bool {
        self.close_connection
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}
