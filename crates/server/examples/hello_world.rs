use micro_gateway::handler::make_application;
use micro_gateway::protocol::{Body, BoxError};
use micro_gateway_server::{Server, init_logging};
use tracing::{Level, error};

#[tokio::main]
async fn main() {
    if let Err(e) = init_logging(Level::INFO) {
        eprintln!("{e}");
        return;
    }

    let app = make_application(|_environ, start_response| {
        start_response.start("200 OK", [("Content-Type", mime::TEXT_PLAIN_UTF_8.as_ref())])?;
        Ok::<_, BoxError>(Body::single("Hello world!\n"))
    });

    let server = match Server::builder().address("127.0.0.1:8000").application(app).build() {
        Ok(server) => server,
        Err(e) => {
            error!(cause = %e, "invalid server configuration");
            return;
        }
    };

    if let Err(e) = server.start().await {
        error!(cause = %e, "server stopped");
    }
}
