//! Shows how failures reach the client.
//!
//! - `/before`: fails before any byte is sent, the client gets the generic 500
//! - `/after`: fails mid-stream, the client gets a truncated response
//! - `/panic`: panics, handled like `/before`
//! - anything else: 404

use bytes::Bytes;
use http::StatusCode;
use micro_gateway::handler::make_application;
use micro_gateway::protocol::{Body, BoxError, Status};
use micro_gateway_server::{Server, init_logging};
use tracing::Level;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(Level::INFO)?;

    let app = make_application(|environ, start_response| match environ.path() {
        "/before" => Err::<Body, BoxError>("backend unavailable".into()),
        "/after" => {
            start_response.start("200 OK", [("Content-Type", mime::TEXT_PLAIN.as_ref())])?;
            let chunks: Vec<Result<Bytes, BoxError>> =
                vec![Ok(Bytes::from_static(b"first half\n")), Err("lost the second half".into())];
            Ok(Body::stream(chunks))
        }
        "/panic" => panic!("unexpected state"),
        path => {
            let status = Status::from_code(StatusCode::NOT_FOUND);
            start_response.start(status.as_str(), [("Content-Type", mime::TEXT_PLAIN.as_ref())])?;
            Ok(Body::single(format!("{path} not found\n")))
        }
    });

    Server::builder().address("127.0.0.1:8000").application(app).build()?.start().await?;
    Ok(())
}
