//! The acceptor for `micro-gateway` applications.
//!
//! [`Server`] binds a listening socket and hands accepted connections to a
//! [`ConnectionHandler`](micro_gateway::connection::ConnectionHandler) one at a
//! time. Connections are serviced on tokio's blocking pool because the gateway
//! itself is synchronous.
//!
//! ```no_run
//! use micro_gateway::handler::make_application;
//! use micro_gateway::protocol::{Body, BoxError};
//! use micro_gateway_server::{Server, init_logging};
//! use tracing::Level;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging(Level::INFO)?;
//!
//!     let app = make_application(|_environ, start_response| {
//!         start_response.start("200 OK", [("Content-Type", "text/plain")])?;
//!         Ok::<_, BoxError>(Body::single("Hello world!"))
//!     });
//!
//!     Server::builder().address("127.0.0.1:8000").application(app).build()?.start().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod logging;
mod server;

pub use config::DEFAULT_BACKLOG;
pub use config::DEFAULT_TIMEOUT;
pub use config::ServerConfig;
pub use logging::init_logging;
pub use server::Listening;
pub use server::Server;
pub use server::ServerBuildError;
pub use server::ServerBuilder;
pub use server::ServerError;
pub use server::SharedApplication;
pub use server::ShutdownHandle;
