use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use micro_gateway::config::GatewayConfig;
use micro_gateway::connection::ConnectionHandler;
use micro_gateway::handler::Application;
use micro_gateway::protocol::PeerInfo;
use thiserror::Error;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;

/// An application shared between the acceptor and the blocking pool.
pub type SharedApplication = Arc<dyn Application + Send + Sync>;

pub struct ServerBuilder {
    config: ServerConfig,
    address: Option<io::Result<Vec<SocketAddr>>>,
    application: Option<SharedApplication>,
}

impl ServerBuilder {
    fn new() -> Self {
        Self { config: ServerConfig::default(), address: None, application: None }
    }

    pub fn address<A: ToSocketAddrs>(mut self, address: A) -> Self {
        self.address = Some(address.to_socket_addrs().map(Iterator::collect));
        self
    }

    pub fn application<A: Application + Send + Sync + 'static>(mut self, application: A) -> Self {
        self.application = Some(Arc::new(application));
        self
    }

    /// Read and write timeout of accepted connections, zero disables it.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn backlog(mut self, backlog: u32) -> Self {
        self.config.backlog = backlog;
        self
    }

    /// `SERVER_NAME` reported to applications instead of the bound IP address.
    pub fn server_name<S: Into<String>>(mut self, server_name: S) -> Self {
        self.config.server_name = Some(server_name.into());
        self
    }

    pub fn server_software<S: Into<String>>(mut self, server_software: S) -> Self {
        self.config.server_software = server_software.into();
        self
    }

    /// Extra variables every request inherits.
    pub fn inherit<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.config.extra.extend(vars.into_iter().map(|(key, value)| (key.into(), value.into())));
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let address = self.address.ok_or(ServerBuildError::MissingAddress)??;
        if address.is_empty() {
            return Err(ServerBuildError::MissingAddress);
        }
        let application = self.application.ok_or(ServerBuildError::MissingApplication)?;
        Ok(Server { config: ServerConfig { address, ..self.config }, application, shutdown: CancellationToken::new() })
    }
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("application must be set")]
    MissingApplication,
    #[error("address must be set")]
    MissingAddress,
    #[error("invalid address: {source}")]
    InvalidAddress {
        #[from]
        source: io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind { address: SocketAddr, source: io::Error },

    #[error("failed to install the log subscriber: {source}")]
    Logging {
        #[from]
        source: tracing::subscriber::SetGlobalDefaultError,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

/// Stops a running server once the connection in flight is done.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    token: CancellationToken,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }
}

pub struct Server {
    config: ServerConfig,
    application: SharedApplication,
    shutdown: CancellationToken,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle { token: self.shutdown.clone() }
    }

    /// Binds the listening socket, trying each configured address in turn.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] for the last address if none could be bound.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime, the listener registers
    /// with its reactor.
    pub fn bind(self) -> Result<Listening, ServerError> {
        let mut last_error = None;
        for &address in &self.config.address {
            match listen(address, self.config.backlog) {
                Ok(listener) => {
                    let local_addr = listener.local_addr()?;
                    info!(address = %local_addr, backlog = self.config.backlog, "start listening");
                    let gateway = Arc::new(self.config.gateway_config(local_addr));
                    return Ok(Listening {
                        listener,
                        local_addr,
                        gateway,
                        timeout: self.config.timeout,
                        application: self.application,
                        shutdown: self.shutdown,
                    });
                }
                Err(source) => {
                    warn!(%address, cause = %source, "bind failed");
                    last_error = Some(ServerError::Bind { address, source });
                }
            }
        }
        Err(last_error.unwrap_or_else(|| ServerError::Io { source: io::ErrorKind::AddrNotAvailable.into() }))
    }

    /// Binds and serves until shut down.
    pub async fn start(self) -> Result<(), ServerError> {
        self.bind()?.serve().await
    }
}

fn listen(address: SocketAddr, backlog: u32) -> io::Result<TcpListener> {
    let socket = if address.is_ipv4() { TcpSocket::new_v4()? } else { TcpSocket::new_v6()? };
    socket.set_reuseaddr(true)?;
    socket.bind(address)?;
    socket.listen(backlog)
}

/// A bound server, ready to accept connections.
pub struct Listening {
    listener: TcpListener,
    local_addr: SocketAddr,
    gateway: Arc<GatewayConfig>,
    timeout: Duration,
    application: SharedApplication,
    shutdown: CancellationToken,
}

impl Listening {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn gateway_config(&self) -> &GatewayConfig {
        &self.gateway
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle { token: self.shutdown.clone() }
    }

    /// Accepts connections one at a time until shut down.
    ///
    /// Each connection is handled on the blocking pool and awaited before the
    /// next accept. Accept failures, connection failures and panics are logged
    /// and never end the loop.
    pub async fn serve(self) -> Result<(), ServerError> {
        loop {
            let (stream, remote_addr) = select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!(address = %self.local_addr, "shutdown requested, stop accepting");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(stream_and_addr) => stream_and_addr,
                    Err(e) => {
                        warn!(cause = %e, "failed to accept");
                        continue;
                    }
                },
            };

            self.dispatch(stream, remote_addr).await;
        }
    }

    async fn dispatch(&self, stream: TcpStream, remote_addr: SocketAddr) {
        let stream = match into_blocking(stream, self.timeout) {
            Ok(stream) => stream,
            Err(e) => {
                warn!(peer = %remote_addr, cause = %e, "failed to prepare connection");
                return;
            }
        };

        let gateway = Arc::clone(&self.gateway);
        let application = Arc::clone(&self.application);
        let task = tokio::task::spawn_blocking(move || {
            let handler = ConnectionHandler::new(&gateway, PeerInfo::new(remote_addr.ip().to_string()));
            handler.handle_tcp(stream, &*application)
        });

        match task.await {
            Ok(Ok(())) => debug!(peer = %remote_addr, "finished process, connection shutdown"),
            Ok(Err(e)) => error!(peer = %remote_addr, cause = %e, "connection failed"),
            Err(e) if e.is_panic() => error!(peer = %remote_addr, "connection handler panicked"),
            Err(e) => warn!(peer = %remote_addr, cause = %e, "connection task cancelled"),
        }
    }
}

impl std::fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("config", &self.config)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server").field("config", &self.config).finish_non_exhaustive()
    }
}

impl std::fmt::Debug for Listening {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listening")
            .field("local_addr", &self.local_addr)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn into_blocking(stream: TcpStream, timeout: Duration) -> io::Result<std::net::TcpStream> {
    stream.set_nodelay(true)?;
    let stream = stream.into_std()?;
    stream.set_nonblocking(false)?;

    let timeout = Some(timeout).filter(|timeout| !timeout.is_zero());
    stream.set_read_timeout(timeout)?;
    stream.set_write_timeout(timeout)?;
    Ok(stream)
}
