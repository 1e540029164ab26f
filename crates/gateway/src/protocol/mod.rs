//! Core protocol types shared by the codec and the gateway.
//!
//! - [`HeaderSet`]: ordered, case-insensitive header collection, plus [`is_hop_by_hop`]
//! - [`RequestContext`]: the normalized, read-only description of one request
//! - [`BaseEnvironment`], [`Metadata`] and [`Environ`]: the environment-like
//!   mapping applications read their request from
//! - [`Body`]: what an application returns, one chunk or a stream of chunks
//! - [`Status`]: validated status line and the reason phrase table
//! - Errors: [`HttpError`], [`ParseError`], [`GatewayError`]

mod header_set;
pub use header_set::HeaderSet;
pub use header_set::is_hop_by_hop;

mod request;
pub use request::DEFAULT_REQUEST_VERSION;
pub use request::PeerInfo;
pub use request::RequestContext;

pub mod environ;
pub use environ::BaseEnvironment;
pub use environ::Environ;
pub use environ::Metadata;

mod body;
pub use body::Body;
pub use body::ChunkStream;

mod status;
pub use status::Status;
pub use status::explanation;
pub use status::reason_phrase;

mod error;
pub use error::BoxError;
pub use error::GatewayError;
pub use error::HttpError;
pub use error::ParseError;
pub(crate) use error::panic_error;
