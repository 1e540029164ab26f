//! Prints the request environment back to the client, followed by the body.

use std::fmt::Write as _;
use std::io::Read;

use micro_gateway::handler::make_application;
use micro_gateway::protocol::{Body, BoxError};
use micro_gateway_server::{Server, init_logging};
use tracing::Level;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(Level::DEBUG)?;

    let app = make_application(|environ, start_response| {
        let mut page = String::new();
        writeln!(page, "url_scheme = {}", environ.url_scheme())?;
        writeln!(page, "version = {:?}", environ.version())?;
        for (key, value) in environ.vars() {
            writeln!(page, "{key} = {value}")?;
        }

        let length = environ.get("CONTENT_LENGTH").and_then(|value| value.parse::<u64>().ok()).unwrap_or(0);
        let mut payload = String::new();
        environ.input().take(length).read_to_string(&mut payload)?;
        if !payload.is_empty() {
            writeln!(page, "\n{payload}")?;
        }

        start_response.start("200 OK", [("Content-Type", mime::TEXT_PLAIN.as_ref())])?;
        Ok::<_, BoxError>(Body::single(page))
    });

    Server::builder()
        .address("127.0.0.1:8000")
        .server_name("echo.local")
        .inherit([("DEMO", "echo")])
        .application(app)
        .build()?
        .start()
        .await?;
    Ok(())
}
