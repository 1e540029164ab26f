//! One request's trip through an application.
//!
//! [`Gateway::run`] builds the environment, invokes the application, streams
//! the returned body and recovers from application failures with a generic
//! `500` page whenever the client has not seen any part of the response yet.

use std::error::Error;
use std::io::{Read, Write};
use std::panic;
use std::panic::AssertUnwindSafe;

use http::StatusCode;
use tracing::{error, info, warn};

use crate::config::GatewayConfig;
use crate::gateway::state::{Phase, ResponseState};
use crate::gateway::{ErrorLog, StartResponse};
use crate::handler::Application;
use crate::protocol::{Body, BoxError, Environ, GatewayError, Metadata, RequestContext, Status, panic_error};

/// Body of the fallback error page.
pub const ERROR_BODY: &str = "A server error occurred.  Please contact the administrator.";

/// Drives an [`Application`] for a single request over a byte stream pair.
pub struct Gateway<'a, R, W> {
    config: &'a GatewayConfig,
    request: &'a RequestContext,
    input: R,
    output: W,
    errors: ErrorLog,
    vars: Metadata,
    state: ResponseState,
}

/// Why a response could not be produced.
enum Failure {
    /// The application or its body failed, the client may still get a 500.
    Application(BoxError),
    /// The client stream is broken, nothing more can be sent.
    Transport(GatewayError),
}

impl Failure {
    fn classify(error: BoxError) -> Self {
        match error.downcast::<GatewayError>() {
            Ok(error) => Self::from(*error),
            Err(error) => Self::Application(error),
        }
    }
}

impl From<GatewayError> for Failure {
    fn from(error: GatewayError) -> Self {
        match error {
            GatewayError::Io { .. } => Self::Transport(error),
            error => Self::Application(Box::new(error)),
        }
    }
}

impl<'a, R: Read, W: Write> Gateway<'a, R, W> {
    pub fn new(config: &'a GatewayConfig, request: &'a RequestContext, input: R, output: W) -> Self {
        Self {
            config,
            request,
            input,
            output,
            errors: ErrorLog::for_peer(request.peer_address()),
            vars: Metadata::new(),
            state: ResponseState::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Serves the request with `application`.
    ///
    /// Application failures are logged and answered with a 500 when possible,
    /// they never surface here. The per-request state is cleared before
    /// returning so the gateway may run again.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Io`] when writing to the client fails.
    pub fn run<A: Application + ?Sized>(&mut self, application: &A) -> Result<(), GatewayError> {
        let result = self.dispatch(application);
        self.close();
        result
    }

    fn dispatch<A: Application + ?Sized>(&mut self, application: &A) -> Result<(), GatewayError> {
        self.setup_environ();

        let failure = match self.invoke(application) {
            Ok(body) => match self.finish_response(body) {
                Ok(()) => return Ok(()),
                Err(failure) => failure,
            },
            Err(error) => Failure::classify(error),
        };

        match failure {
            Failure::Application(error) => self.handle_error(error),
            Failure::Transport(error) => Err(error),
        }
    }

    fn setup_environ(&mut self) {
        let mut vars = self.config.inherited().clone();
        vars.extend(self.request.metadata().iter().map(|(key, value)| (key.clone(), value.clone())));
        self.vars = vars;
        self.state.phase = Phase::EnvironmentReady;
    }

    fn invoke<A: Application + ?Sized>(&mut self, application: &A) -> Result<Body, BoxError> {
        let Self { config, request, input, output, errors, vars, state } = self;
        state.phase = Phase::AwaitingStart;

        let mut environ = Environ::new(*config, *request, vars, input, errors);
        let mut start_response = StartResponse::new(state, output, *config);
        panic::catch_unwind(AssertUnwindSafe(|| application.call(&mut environ, &mut start_response)))
            .unwrap_or_else(|payload| Err(panic_error(payload)))
    }

    fn finish_response(&mut self, mut body: Body) -> Result<(), Failure> {
        self.state.chunk_count = body.chunk_count();
        let result = self.stream_body(&mut body);
        if let Err(error) = body.release() {
            log_failure(self.request, &*error);
        }
        result
    }

    fn stream_body(&mut self, body: &mut Body) -> Result<(), Failure> {
        let mut start_response = StartResponse::new(&mut self.state, &mut self.output, self.config);
        loop {
            let next = panic::catch_unwind(AssertUnwindSafe(|| body.next_chunk()))
                .unwrap_or_else(|payload| Some(Err(panic_error(payload))));
            match next {
                Some(Ok(chunk)) => start_response.write(&chunk)?,
                Some(Err(error)) => return Err(Failure::classify(error)),
                None => break,
            }
        }
        start_response.finish()?;
        Ok(())
    }

    fn handle_error(&mut self, error: BoxError) -> Result<(), GatewayError> {
        self.state.phase = Phase::ErrorRecovery;
        log_failure(self.request, &*error);

        if self.state.headers_sent {
            warn!(
                peer = self.request.peer_address(),
                bytes_sent = self.state.bytes_sent,
                "response already started, truncating"
            );
            return Ok(());
        }

        let body = {
            let mut start_response = StartResponse::new(&mut self.state, &mut self.output, self.config);
            error_output(&mut start_response, error)
        };
        let body = match body {
            Ok(body) => body,
            Err(error) => {
                log_failure(self.request, &error);
                return Ok(());
            }
        };

        match self.finish_response(body) {
            Ok(()) => Ok(()),
            Err(Failure::Transport(error)) => Err(error),
            Err(Failure::Application(error)) => {
                log_failure(self.request, &*error);
                Ok(())
            }
        }
    }

    fn close(&mut self) {
        if let Some(status) = &self.state.status {
            info!(
                peer = self.request.peer_address(),
                request = self.request.request_line(),
                status = status.code().as_u16(),
                bytes_sent = self.state.bytes_sent,
                "request completed"
            );
        }
        let _ = self.errors.flush();
        self.vars.clear();
        self.state.reset();
    }
}

impl<R, W> std::fmt::Debug for Gateway<'_, R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("request", &self.request.request_line())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Starts the fallback error response, handing `failure` to the capability.
fn error_output(start_response: &mut StartResponse<'_>, failure: BoxError) -> Result<Body, GatewayError> {
    let status = Status::from_code(StatusCode::INTERNAL_SERVER_ERROR);
    start_response.start_with_failure(status.as_str(), [("Content-Type", mime::TEXT_PLAIN.essence_str())], failure)?;
    Ok(Body::single(ERROR_BODY))
}

fn log_failure(request: &RequestContext, error: &(dyn Error + 'static)) {
    let mut sources = Vec::new();
    let mut source = error.source();
    while let Some(cause) = source {
        sources.push(cause.to_string());
        source = cause.source();
    }
    error!(
        peer = request.peer_address(),
        request = request.request_line(),
        cause = %error,
        ?sources,
        "application failed"
    );
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::io::Cursor;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use bytes::Bytes;

    use super::*;
    use crate::codec::RequestDecoder;
    use crate::config::DEFAULT_SERVER_SOFTWARE;
    use crate::handler::make_application;
    use crate::protocol::PeerInfo;

    fn request(request_line: &str, headers: &[&str]) -> RequestContext {
        let peer = PeerInfo::new("127.0.0.1");
        RequestDecoder::new(&GatewayConfig::default(), &peer).decode(request_line, headers).unwrap()
    }

    fn serve<A: Application>(application: &A) -> (Result<(), GatewayError>, String) {
        serve_with_input(application, "")
    }

    fn serve_with_input<A: Application>(application: &A, input: &str) -> (Result<(), GatewayError>, String) {
        let config = GatewayConfig::default();
        let request = request("GET /hello?x=1 HTTP/1.1", &["Host: localhost"]);
        let mut output = Vec::new();
        let input = Cursor::new(input.as_bytes().to_vec());
        let result = Gateway::new(&config, &request, input, &mut output).run(application);
        (result, String::from_utf8(output).unwrap())
    }

    fn split(response: &str) -> (&str, &str) {
        response.split_once("\r\n\r\n").unwrap()
    }

    fn assert_server_error(response: &str) {
        let (head, body) = split(response);
        assert!(head.starts_with("HTTP/1.1 500 Internal Server Error\r\n"), "{head}");
        assert!(head.contains("\r\nContent-Type: text/plain"));
        assert!(head.contains(&format!("\r\nContent-Length: {}", ERROR_BODY.len())));
        assert_eq!(body, ERROR_BODY);
    }

    #[test]
    fn single_chunk_response() {
        let app = make_application(|_environ, start_response| {
            start_response.start("200 OK", [("Content-Type", "text/plain")])?;
            Ok::<_, BoxError>(Body::single("Hello world!"))
        });

        let (result, response) = serve(&app);
        result.unwrap();

        let (head, body) = split(&response);
        let mut lines = head.lines();
        assert_eq!(lines.next(), Some("HTTP/1.1 200 OK"));
        assert!(lines.next().unwrap().starts_with("Date: "));
        assert_eq!(lines.next(), Some(format!("Server: {DEFAULT_SERVER_SOFTWARE}").as_str()));
        assert_eq!(lines.next(), Some("Content-Type: text/plain"));
        assert_eq!(lines.next(), Some("Content-Length: 12"));
        assert_eq!(lines.next(), None);
        assert_eq!(body, "Hello world!");
    }

    #[test]
    fn multi_chunk_response_has_no_length() {
        let app = make_application(|_environ, start_response| {
            start_response.start("200 OK", [("Content-Type", "text/plain")])?;
            Ok::<_, BoxError>(Body::chunks(["a", "b"]))
        });

        let (result, response) = serve(&app);
        result.unwrap();

        let (head, body) = split(&response);
        assert!(!head.contains("Content-Length"));
        assert_eq!(body, "ab");
    }

    #[test]
    fn empty_body_still_sends_headers() {
        let app = make_application(|_environ, start_response| {
            start_response.start("204 No Content", [("X-Empty", "1")])?;
            Ok::<_, BoxError>(Body::empty())
        });

        let (result, response) = serve(&app);
        result.unwrap();

        let (head, body) = split(&response);
        assert!(head.starts_with("HTTP/1.1 204 No Content\r\n"));
        assert!(head.ends_with("X-Empty: 1"));
        assert!(body.is_empty());
    }

    #[test]
    fn direct_writes_come_before_body() {
        let app = make_application(|_environ, start_response| {
            let mut writer = start_response.start("200 OK", [("Content-Type", "text/plain")])?;
            writer.write(b"early ")?;
            Ok::<_, BoxError>(Body::single("late"))
        });

        let (result, response) = serve(&app);
        result.unwrap();

        let (head, body) = split(&response);
        assert!(!head.contains("Content-Length"));
        assert_eq!(body, "early late");
    }

    #[test]
    fn failure_before_start() {
        let app = make_application(|_environ, _start_response| Err::<Body, _>(io::Error::other("database down")));

        let (result, response) = serve(&app);
        result.unwrap();
        assert_server_error(&response);
    }

    #[test]
    fn failure_after_start_before_write() {
        let app = make_application(|_environ, start_response| {
            start_response.start("200 OK", [("X-Partial", "yes")])?;
            Err::<Body, BoxError>("late failure".into())
        });

        let (result, response) = serve(&app);
        result.unwrap();
        assert_server_error(&response);
        assert!(!response.contains("X-Partial"));
    }

    #[test]
    fn start_twice_yields_server_error() {
        let second = Arc::new(AtomicBool::new(false));
        let seen = Arc::clone(&second);
        let app = make_application(move |_environ, start_response| {
            start_response.start("200 OK", [("A", "1")])?;
            let err = start_response.start("201 Created", [("B", "2")]).unwrap_err();
            seen.store(matches!(err, GatewayError::HeadersAlreadySet), Ordering::SeqCst);
            Err::<Body, BoxError>(Box::new(err))
        });

        let (result, response) = serve(&app);
        result.unwrap();
        assert!(second.load(Ordering::SeqCst));
        assert_server_error(&response);
    }

    #[test]
    fn write_before_start_yields_server_error() {
        let app = make_application(|_environ, start_response| {
            start_response.write(b"oops")?;
            Ok::<_, BoxError>(Body::empty())
        });

        let (result, response) = serve(&app);
        result.unwrap();
        assert_server_error(&response);
    }

    #[test]
    fn never_started_empty_body_yields_server_error() {
        let app = make_application(|_environ, _start_response| Ok::<_, BoxError>(Body::empty()));

        let (result, response) = serve(&app);
        result.unwrap();
        assert_server_error(&response);
    }

    #[test]
    fn invalid_status_yields_server_error() {
        let app = make_application(|_environ, start_response| {
            start_response.start("OK", [("A", "1")])?;
            Ok::<_, BoxError>(Body::empty())
        });

        let (result, response) = serve(&app);
        result.unwrap();
        assert_server_error(&response);
    }

    #[test]
    fn failure_mid_stream_truncates() {
        let app = make_application(|_environ, start_response| {
            start_response.start("200 OK", [("Content-Type", "text/plain")])?;
            let chunks: Vec<Result<Bytes, BoxError>> =
                vec![Ok(Bytes::from_static(b"first")), Err("stream broke".into())];
            Ok::<_, BoxError>(Body::stream(chunks))
        });

        let (result, response) = serve(&app);
        result.unwrap();

        assert_eq!(response.matches("HTTP/1.1 ").count(), 1);
        let (head, body) = split(&response);
        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert_eq!(body, "first");
    }

    #[test]
    fn failure_after_direct_write_is_reraised() {
        let app = make_application(|_environ, start_response| {
            start_response.start("200 OK", [("Content-Type", "text/plain")])?.write(b"partial")?;
            let err = start_response
                .start_with_failure("500 Internal Server Error", [("Content-Type", "text/plain")], "boom".into())
                .unwrap_err();
            assert!(matches!(err, GatewayError::Reraised { .. }));
            Err::<Body, BoxError>(Box::new(err))
        });

        let (result, response) = serve(&app);
        result.unwrap();
        assert_eq!(response.matches("HTTP/1.1 ").count(), 1);
        assert!(response.ends_with("\r\n\r\npartial"));
    }

    #[test]
    fn stream_failure_before_first_chunk() {
        let app = make_application(|_environ, start_response| {
            start_response.start("200 OK", [("Content-Type", "text/html")])?;
            let chunks: Vec<Result<Bytes, BoxError>> = vec![Err("no data".into())];
            Ok::<_, BoxError>(Body::stream(chunks))
        });

        let (result, response) = serve(&app);
        result.unwrap();
        assert_server_error(&response);
    }

    #[test]
    fn panics_are_contained() {
        let app = make_application(|_environ, _start_response| -> Result<Body, BoxError> { panic!("kaboom") });

        let (result, response) = serve(&app);
        result.unwrap();
        assert_server_error(&response);
    }

    #[test]
    fn release_runs_on_success_and_failure() {
        let released = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&released);
        let ok = make_application(move |_environ, start_response| {
            start_response.start("200 OK", [("A", "1")])?;
            let counter = Arc::clone(&counter);
            Ok::<_, BoxError>(Body::chunks(["x", "y"]).on_release(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
        });
        serve(&ok).0.unwrap();
        assert_eq!(released.load(Ordering::SeqCst), 1);

        let counter = Arc::clone(&released);
        let failing = make_application(move |_environ, start_response| {
            start_response.start("200 OK", [("A", "1")])?;
            let counter = Arc::clone(&counter);
            let chunks: Vec<Result<Bytes, BoxError>> = vec![Err("broken".into())];
            Ok::<_, BoxError>(Body::stream(chunks).on_release(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
        });
        serve(&failing).0.unwrap();
        assert_eq!(released.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn panicking_release_hook_still_closes() {
        let config = GatewayConfig::default();
        let request = request("GET / HTTP/1.1", &[]);
        let app = make_application(|_environ, start_response| {
            start_response.start("200 OK", [("A", "1")])?;
            Ok::<_, BoxError>(Body::single("x").on_release(|| panic!("release bug")))
        });

        let mut gateway = Gateway::new(&config, &request, io::empty(), Vec::new());
        gateway.run(&app).unwrap();
        assert_eq!(gateway.phase(), Phase::Closed);

        let response = String::from_utf8(gateway.into_output()).unwrap();
        assert_eq!(response.matches("HTTP/1.1 ").count(), 1);
        assert!(response.ends_with("\r\n\r\nx"), "{response}");
    }

    #[test]
    fn environ_exposes_request_and_input() {
        let app = make_application(|environ, start_response| {
            let mut payload = String::new();
            environ.input().read_to_string(&mut payload)?;
            let summary = format!(
                "{} {} {} {} {}",
                environ.method(),
                environ.path(),
                environ.query(),
                environ.get("HTTP_HOST").unwrap_or("-"),
                payload
            );
            let path = environ.path().to_owned();
            writeln!(environ.errors(), "served {path}")?;
            start_response.start("200 OK", [("Content-Type", "text/plain")])?;
            Ok::<_, BoxError>(Body::single(summary))
        });

        let (result, response) = serve_with_input(&app, "payload");
        result.unwrap();
        assert_eq!(split(&response).1, "GET /hello x=1 localhost payload");
    }

    #[test]
    fn inherited_vars_are_overridden_by_request() {
        let config = GatewayConfig::default().inherit([("CUSTOM", "yes"), ("PATH_INFO", "/inherited")]);
        let request = request("GET /real HTTP/1.1", &[]);
        let app = make_application(|environ, start_response| {
            let body = format!("{} {}", environ.get("CUSTOM").unwrap_or("-"), environ.get("PATH_INFO").unwrap_or("-"));
            start_response.start("200 OK", [("A", "1")])?;
            Ok::<_, BoxError>(Body::single(body))
        });

        let mut output = Vec::new();
        Gateway::new(&config, &request, io::empty(), &mut output).run(&app).unwrap();
        let response = String::from_utf8(output).unwrap();
        assert_eq!(split(&response).1, "yes /real");
    }

    #[test]
    fn url_scheme_and_concurrency_flags() {
        let request = request("GET / HTTP/1.1", &[]);
        let app = make_application(|environ, start_response| {
            let body = format!(
                "{} {} {} {} {:?}",
                environ.url_scheme(),
                environ.multithread(),
                environ.multiprocess(),
                environ.run_once(),
                environ.version()
            );
            start_response.start("200 OK", [("A", "1")])?;
            Ok::<_, BoxError>(Body::single(body))
        });

        let cases = [
            (Some("yes"), "https"),
            (Some("on"), "https"),
            (Some("1"), "https"),
            (Some("off"), "http"),
            (Some("YES"), "http"),
            (None, "http"),
        ];
        for (https, scheme) in cases {
            let mut config = GatewayConfig::default().concurrency(true, false).with_run_once(true);
            if let Some(https) = https {
                config = config.inherit([("HTTPS", https)]);
            }

            let mut output = Vec::new();
            Gateway::new(&config, &request, io::empty(), &mut output).run(&app).unwrap();
            let response = String::from_utf8(output).unwrap();
            assert_eq!(split(&response).1, format!("{scheme} true false true (1, 0)"), "{https:?}");
        }

        let config = GatewayConfig::default();
        assert!(!config.multithread());
        assert!(!config.multiprocess());
        assert!(!config.run_once());
        let config = config.concurrency(false, true);
        assert!(!config.multithread());
        assert!(config.multiprocess());
    }

    #[test]
    fn state_is_reset_between_runs() {
        let config = GatewayConfig::default();
        let request = request("GET / HTTP/1.1", &[]);
        let app = make_application(|_environ, start_response| {
            start_response.start("200 OK", [("A", "1")])?;
            Ok::<_, BoxError>(Body::single("again"))
        });

        let mut gateway = Gateway::new(&config, &request, io::empty(), Vec::new());
        assert_eq!(gateway.phase(), Phase::Created);
        gateway.run(&app).unwrap();
        assert_eq!(gateway.phase(), Phase::Closed);
        gateway.run(&app).unwrap();

        let response = String::from_utf8(gateway.into_output()).unwrap();
        assert_eq!(response.matches("HTTP/1.1 200 OK").count(), 2);
        assert_eq!(response.matches("Content-Length: 5").count(), 2);
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "client went away"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn transport_errors_propagate() {
        let config = GatewayConfig::default();
        let request = request("GET / HTTP/1.1", &[]);
        let app = make_application(|_environ, start_response| {
            start_response.start("200 OK", [("A", "1")])?;
            Ok::<_, BoxError>(Body::single("lost"))
        });

        let err = Gateway::new(&config, &request, io::empty(), BrokenPipe).run(&app).unwrap_err();
        assert!(matches!(err, GatewayError::Io { .. }));
    }
}
