use std::net::SocketAddr;
use std::time::Duration;

use micro_gateway::config::{DEFAULT_SERVER_SOFTWARE, GatewayConfig};
use micro_gateway::protocol::{BaseEnvironment, Metadata};

/// Read and write timeout applied to every accepted connection.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Pending connections the kernel queues before refusing new ones.
pub const DEFAULT_BACKLOG: u32 = 5;

/// Listener settings collected by [`ServerBuilder`](crate::ServerBuilder).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub(crate) address: Vec<SocketAddr>,
    pub(crate) timeout: Duration,
    pub(crate) backlog: u32,
    pub(crate) server_name: Option<String>,
    pub(crate) server_software: String,
    pub(crate) extra: Metadata,
}

impl ServerConfig {
    pub fn address(&self) -> &[SocketAddr] {
        &self.address
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn backlog(&self) -> u32 {
        self.backlog
    }

    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    pub fn server_software(&self) -> &str {
        &self.server_software
    }

    pub fn extra(&self) -> &Metadata {
        &self.extra
    }

    /// The gateway configuration for a listener bound to `local_addr`.
    ///
    /// Without an explicit server name the bound IP address is used, no name
    /// lookup is performed.
    pub fn gateway_config(&self, local_addr: SocketAddr) -> GatewayConfig {
        let server_name = self.server_name.clone().unwrap_or_else(|| local_addr.ip().to_string());
        GatewayConfig::new(BaseEnvironment::new(server_name, local_addr.port()))
            .inherit(self.extra.clone())
            .server_software(self.server_software.clone())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            backlog: DEFAULT_BACKLOG,
            server_name: None,
            server_software: DEFAULT_SERVER_SOFTWARE.to_owned(),
            extra: Metadata::new(),
        }
    }
}
