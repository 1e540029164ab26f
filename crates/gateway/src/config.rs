//! Immutable configuration shared by every connection.
//!
//! A [`GatewayConfig`] is built once at startup, typically after the listening
//! socket is bound so the base environment knows its name and port, and is then
//! only ever read.

use crate::protocol::{BaseEnvironment, Metadata};

/// Upper bound for the request line and each header line, terminator included.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 65537;

/// Maximum number of request headers.
pub const DEFAULT_MAX_HEADERS: usize = 64;

/// Value of the `Server` header unless the application sets one.
pub const DEFAULT_SERVER_SOFTWARE: &str = concat!("micro-gateway/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    base: BaseEnvironment,
    inherited: Metadata,
    server_software: String,
    http_version: String,
    multithread: bool,
    multiprocess: bool,
    run_once: bool,
    max_line_length: usize,
    max_headers: usize,
}

impl GatewayConfig {
    pub fn new(base: BaseEnvironment) -> Self {
        Self {
            base,
            inherited: Metadata::new(),
            server_software: DEFAULT_SERVER_SOFTWARE.to_owned(),
            http_version: "1.1".to_owned(),
            multithread: false,
            multiprocess: false,
            run_once: false,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            max_headers: DEFAULT_MAX_HEADERS,
        }
    }

    /// Variables every request inherits beneath its own metadata.
    #[must_use]
    pub fn inherit<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.inherited.extend(vars.into_iter().map(|(key, value)| (key.into(), value.into())));
        self
    }

    #[must_use]
    pub fn server_software<S: Into<String>>(mut self, server_software: S) -> Self {
        self.server_software = server_software.into();
        self
    }

    /// Version written in the response status line, e.g. `1.1`.
    #[must_use]
    pub fn http_version<S: Into<String>>(mut self, http_version: S) -> Self {
        self.http_version = http_version.into();
        self
    }

    #[must_use]
    pub fn concurrency(mut self, multithread: bool, multiprocess: bool) -> Self {
        self.multithread = multithread;
        self.multiprocess = multiprocess;
        self
    }

    #[must_use]
    pub fn with_run_once(mut self, run_once: bool) -> Self {
        self.run_once = run_once;
        self
    }

    #[must_use]
    pub fn max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    #[must_use]
    pub fn max_headers(mut self, max_headers: usize) -> Self {
        self.max_headers = max_headers;
        self
    }

    pub fn base(&self) -> &BaseEnvironment {
        &self.base
    }

    pub fn inherited(&self) -> &Metadata {
        &self.inherited
    }

    pub fn software(&self) -> &str {
        &self.server_software
    }

    pub fn version(&self) -> &str {
        &self.http_version
    }

    pub fn multithread(&self) -> bool {
        self.multithread
    }

    pub fn multiprocess(&self) -> bool {
        self.multiprocess
    }

    pub fn run_once(&self) -> bool {
        self.run_once
    }

    pub fn line_limit(&self) -> usize {
        self.max_line_length
    }

    pub fn header_limit(&self) -> usize {
        self.max_headers
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::new(BaseEnvironment::default())
    }
}
