//! Wire-level reading and writing.
//!
//! - Request side:
//!   - [`read_line`] / [`read_header_lines`]: bounded line reading off the connection
//!   - [`decode_headers`]: header lines into a [`HeaderSet`](crate::protocol::HeaderSet)
//!   - [`RequestDecoder`]: request line and headers into a
//!     [`RequestContext`](crate::protocol::RequestContext)
//!
//! - Response side:
//!   - [`HeaderEncoder`]: status line, `Date`, `Server` and the header block
//!
//! # Example
//!
//! ```
//! use micro_gateway::codec::RequestDecoder;
//! use micro_gateway::config::GatewayConfig;
//! use micro_gateway::protocol::PeerInfo;
//!
//! let config = GatewayConfig::default();
//! let peer = PeerInfo::new("127.0.0.1");
//! let request = RequestDecoder::new(&config, &peer)
//!     .decode("GET /hello%20world?x=1 HTTP/1.0", &["Host: localhost"])
//!     .unwrap();
//!
//! assert_eq!(request.path(), "/hello world");
//! assert_eq!(request.query(), "x=1");
//! assert_eq!(request.metadata()["HTTP_HOST"], "localhost");
//! ```

mod header_decoder;
mod header_encoder;
mod line_reader;
mod request_decoder;

pub use header_decoder::decode_header_block;
pub use header_decoder::decode_headers;
pub use header_encoder::HeaderEncoder;
pub use line_reader::read_header_lines;
pub use line_reader::read_line;
pub use request_decoder::RequestDecoder;
pub use request_decoder::RequestLine;
pub use request_decoder::split_target;
