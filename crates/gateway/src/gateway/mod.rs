//! Per-request response orchestration.
//!
//! A [`Gateway`] owns the response state of one request. Applications see it
//! through two capabilities: the [`Environ`](crate::protocol::Environ) and the
//! [`StartResponse`] handle, which in turn hands out a [`ResponseWriter`].

mod error_log;
#[allow(clippy::module_inception, reason = "the state machine is the heart of the module")]
mod gateway;
mod start_response;
mod state;

pub use error_log::ErrorLog;
pub use gateway::ERROR_BODY;
pub use gateway::Gateway;
pub use start_response::ResponseWriter;
pub use start_response::StartResponse;
pub use state::Phase;
