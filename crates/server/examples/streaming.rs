//! Streams a multi-chunk body. Without a Content-Length the client reads the
//! response until the connection closes.

use std::thread;
use std::time::Duration;

use bytes::Bytes;
use micro_gateway::handler::make_application;
use micro_gateway::protocol::{Body, BoxError};
use micro_gateway_server::{Server, init_logging};
use tracing::{Level, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(Level::INFO)?;

    let app = make_application(|environ, start_response| {
        let count = environ.query().parse::<usize>().unwrap_or(5);
        start_response.start("200 OK", [("Content-Type", mime::TEXT_PLAIN.as_ref()), ("Cache-Control", "no-cache")])?;

        let chunks = (1..=count).map(|i| {
            thread::sleep(Duration::from_millis(200));
            Ok::<_, BoxError>(Bytes::from(format!("chunk {i}\n")))
        });
        Ok::<_, BoxError>(Body::stream(chunks).on_release(move || info!(count, "stream released")))
    });

    Server::builder().address("127.0.0.1:8000").application(app).build()?.start().await?;
    Ok(())
}
