//! A minimal blocking HTTP/1.1 application gateway
//!
//! This crate accepts one HTTP request over a byte stream pair, turns it into a
//! per-request environment, invokes an application with that environment and
//! a response-initiation capability, and streams the application's body back.
//! Applications never see sockets, they only see [`protocol::Environ`] and
//! [`gateway::StartResponse`].
//!
//! # Features
//!
//! - Request line and header parsing with bounded line length and header count
//! - CGI-style request metadata (`REQUEST_METHOD`, `PATH_INFO`, `HTTP_*` ...)
//! - Deferred headers: the status line goes out with the first body byte
//! - `Content-Length` inferred for single-chunk bodies
//! - Generic `500` page for application failures raised before the headers left
//! - Panics inside applications are contained
//!
//! # Example
//!
//! ```
//! use std::io::Cursor;
//!
//! use micro_gateway::config::GatewayConfig;
//! use micro_gateway::connection::ConnectionHandler;
//! use micro_gateway::handler::make_application;
//! use micro_gateway::protocol::{Body, BoxError, PeerInfo};
//!
//! let app = make_application(|environ, start_response| {
//!     let greeting = format!("Hello {}!", environ.path().trim_start_matches('/'));
//!     start_response.start("200 OK", [("Content-Type", "text/plain")])?;
//!     Ok::<_, BoxError>(Body::single(greeting))
//! });
//!
//! let config = GatewayConfig::default();
//! let handler = ConnectionHandler::new(&config, PeerInfo::new("127.0.0.1"));
//!
//! let request = Cursor::new(b"GET /world HTTP/1.1\r\nHost: localhost\r\n\r\n".to_vec());
//! let mut response = Vec::new();
//! handler.handle(request, &mut response, &app).unwrap();
//!
//! let response = String::from_utf8(response).unwrap();
//! assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
//! assert!(response.contains("Content-Length: 12\r\n"));
//! assert!(response.ends_with("\r\n\r\nHello world!"));
//! ```
//!
//! # Architecture
//!
//! - [`connection`]: reads one request off a connection and tears it down
//! - [`codec`]: line reading, header decoding and response head encoding
//! - [`gateway`]: the per-request state machine and response capabilities
//! - [`handler`]: the [`Application`](handler::Application) contract
//! - [`protocol`]: headers, request context, environment, body and errors
//! - [`config`]: immutable gateway configuration shared by every connection
//!
//! # Limitations
//!
//! - One request per connection, keep-alive is never honoured
//! - No chunked transfer encoding, multi-chunk bodies are close-delimited
//! - Maximum request line length: 65537 bytes
//! - Maximum number of headers: 64

pub mod codec;
pub mod config;
pub mod connection;
pub mod gateway;
pub mod handler;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
