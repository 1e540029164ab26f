//! Request metadata and the environment handed to applications.
//!
//! [`BaseEnvironment`] holds the server-fixed fields, built once when the server
//! binds and shared read-only afterwards. Every request seeds its metadata from
//! it, overlays the request-derived fields and finally folds in one `HTTP_*`
//! entry per inbound header name.
//!
//! [`Environ`] is the per-call view an application receives: typed access to
//! the request, the merged metadata, the request body reader and the error sink.

use std::collections::BTreeMap;
use std::io::Read;

use crate::config::GatewayConfig;
use crate::gateway::ErrorLog;
use crate::protocol::{HeaderSet, RequestContext};

/// String keyed metadata, ordered by key.
pub type Metadata = BTreeMap<String, String>;

pub const SERVER_NAME: &str = "SERVER_NAME";
pub const GATEWAY_INTERFACE: &str = "GATEWAY_INTERFACE";
pub const SERVER_PORT: &str = "SERVER_PORT";
pub const SERVER_PROTOCOL: &str = "SERVER_PROTOCOL";
pub const SCRIPT_NAME: &str = "SCRIPT_NAME";
pub const REQUEST_METHOD: &str = "REQUEST_METHOD";
pub const PATH_INFO: &str = "PATH_INFO";
pub const QUERY_STRING: &str = "QUERY_STRING";
pub const CONTENT_TYPE: &str = "CONTENT_TYPE";
pub const CONTENT_LENGTH: &str = "CONTENT_LENGTH";
pub const REMOTE_HOST: &str = "REMOTE_HOST";
pub const REMOTE_ADDR: &str = "REMOTE_ADDR";
pub const HTTPS: &str = "HTTPS";

/// Prefix of header-derived metadata keys.
pub const HEADER_PREFIX: &str = "HTTP_";

const CGI_VERSION: &str = "CGI/1.1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseEnvironment {
    server_name: String,
    server_port: u16,
    gateway_interface: String,
    script_name: String,
}

impl BaseEnvironment {
    pub fn new<S: Into<String>>(server_name: S, server_port: u16) -> Self {
        Self {
            server_name: server_name.into(),
            server_port,
            gateway_interface: CGI_VERSION.to_owned(),
            script_name: String::new(),
        }
    }

    #[must_use]
    pub fn with_script_name<S: Into<String>>(mut self, script_name: S) -> Self {
        self.script_name = script_name.into();
        self
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    pub fn script_name(&self) -> &str {
        &self.script_name
    }

    /// The server-fixed metadata every request starts from.
    pub fn to_metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert(SERVER_NAME.to_owned(), self.server_name.clone());
        metadata.insert(GATEWAY_INTERFACE.to_owned(), self.gateway_interface.clone());
        metadata.insert(SERVER_PORT.to_owned(), self.server_port.to_string());
        metadata.insert(REMOTE_HOST.to_owned(), String::new());
        metadata.insert(CONTENT_LENGTH.to_owned(), String::new());
        metadata.insert(SCRIPT_NAME.to_owned(), self.script_name.clone());
        metadata
    }
}

impl Default for BaseEnvironment {
    fn default() -> Self {
        Self::new("localhost", 80)
    }
}

/// Maps a header name to its metadata key, e.g. `X-Forwarded-For` to `X_FORWARDED_FOR`.
///
/// The result carries no prefix, see [`HEADER_PREFIX`].
pub fn header_key(name: &str) -> String {
    name.replace('-', "_").to_ascii_uppercase()
}

/// Folds `headers` into `metadata`.
///
/// A header whose unprefixed key is already present (`CONTENT_TYPE`,
/// `CONTENT_LENGTH`, ...) is skipped, a prefixed key that was not produced by a
/// previous header is never touched, repeated headers are joined with `,`.
pub(crate) fn fold_headers(metadata: &mut Metadata, headers: &HeaderSet) {
    let mut folded: Vec<String> = Vec::new();
    for (name, value) in headers.iter() {
        let key = header_key(name);
        if metadata.contains_key(&key) {
            continue;
        }
        let key = format!("{HEADER_PREFIX}{key}");
        let value = value.trim();
        match metadata.get_mut(&key) {
            Some(existing) if folded.contains(&key) => {
                existing.push(',');
                existing.push_str(value);
            }
            Some(_) => {}
            None => {
                metadata.insert(key.clone(), value.to_owned());
                folded.push(key);
            }
        }
    }
}

/// What an application sees of the request it is serving.
pub struct Environ<'a> {
    config: &'a GatewayConfig,
    request: &'a RequestContext,
    vars: &'a Metadata,
    input: &'a mut dyn Read,
    errors: &'a mut ErrorLog,
}

impl<'a> Environ<'a> {
    pub(crate) fn new(
        config: &'a GatewayConfig,
        request: &'a RequestContext,
        vars: &'a Metadata,
        input: &'a mut dyn Read,
        errors: &'a mut ErrorLog,
    ) -> Self {
        Self { config, request, vars, input, errors }
    }

    pub fn request(&self) -> &RequestContext {
        self.request
    }

    pub fn method(&self) -> &str {
        self.request.method()
    }

    /// Percent-decoded request path.
    pub fn path(&self) -> &str {
        self.request.path()
    }

    /// Raw query string, still percent-encoded.
    pub fn query(&self) -> &str {
        self.request.query()
    }

    pub fn protocol_version(&self) -> &str {
        self.request.protocol_version()
    }

    pub fn headers(&self) -> &HeaderSet {
        self.request.headers()
    }

    /// The merged metadata: inherited variables overlaid by the request's own.
    pub fn vars(&self) -> &Metadata {
        self.vars
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// The request body stream.
    pub fn input(&mut self) -> &mut dyn Read {
        &mut *self.input
    }

    /// Sink for application diagnostics, lines end up in the server log.
    pub fn errors(&mut self) -> &mut ErrorLog {
        &mut *self.errors
    }

    pub fn url_scheme(&self) -> &'static str {
        match self.get(HTTPS) {
            Some("yes" | "on" | "1") => "https",
            _ => "http",
        }
    }

    /// Version of the gateway interface contract.
    pub fn version(&self) -> (u8, u8) {
        (1, 0)
    }

    pub fn multithread(&self) -> bool {
        self.config.multithread()
    }

    pub fn multiprocess(&self) -> bool {
        self.config.multiprocess()
    }

    pub fn run_once(&self) -> bool {
        self.config.run_once()
    }
}

impl std::fmt::Debug for Environ<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environ").field("request", self.request).field("vars", self.vars).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_metadata() {
        let metadata = BaseEnvironment::new("example.org", 8000).with_script_name("/app").to_metadata();

        assert_eq!(metadata[SERVER_NAME], "example.org");
        assert_eq!(metadata[SERVER_PORT], "8000");
        assert_eq!(metadata[GATEWAY_INTERFACE], "CGI/1.1");
        assert_eq!(metadata[SCRIPT_NAME], "/app");
        assert_eq!(metadata[REMOTE_HOST], "");
        assert_eq!(metadata[CONTENT_LENGTH], "");
    }

    #[test]
    fn header_keys() {
        assert_eq!(header_key("X-Forwarded-For"), "X_FORWARDED_FOR");
        assert_eq!(header_key("accept"), "ACCEPT");
    }

    #[test]
    fn fold_joins_duplicates() {
        let mut metadata = Metadata::new();
        let headers: HeaderSet = [("Accept", "text/html"), ("X-Tag", "a"), ("x-tag", " b ")].into_iter().collect();

        fold_headers(&mut metadata, &headers);

        assert_eq!(metadata["HTTP_ACCEPT"], "text/html");
        assert_eq!(metadata["HTTP_X_TAG"], "a,b");
    }

    #[test]
    fn fold_never_overwrites_existing_keys() {
        let mut metadata = BaseEnvironment::default().to_metadata();
        metadata.insert(CONTENT_TYPE.to_owned(), "text/plain".to_owned());
        metadata.insert("HTTP_PROXY".to_owned(), "configured".to_owned());
        let headers: HeaderSet =
            [("Content-Type", "application/json"), ("Content-Length", "12"), ("Server-Name", "evil"), ("Proxy", "evil")]
                .into_iter()
                .collect();

        fold_headers(&mut metadata, &headers);

        assert_eq!(metadata[CONTENT_TYPE], "text/plain");
        assert_eq!(metadata[CONTENT_LENGTH], "");
        assert_eq!(metadata[SERVER_NAME], "localhost");
        assert_eq!(metadata["HTTP_PROXY"], "configured");
        assert!(!metadata.contains_key("HTTP_CONTENT_TYPE"));
        assert!(!metadata.contains_key("HTTP_SERVER_NAME"));
    }
}
