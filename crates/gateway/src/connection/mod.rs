//! Connection handling.
//!
//! [`ConnectionHandler`] owns an accepted connection end to end: it reads a
//! single request, runs it through a [`Gateway`](crate::gateway::Gateway) and
//! closes the connection. Requests the client never finished sending, or that
//! are malformed, are dropped without a response.

mod connection_handler;

pub use connection_handler::ConnectionHandler;
