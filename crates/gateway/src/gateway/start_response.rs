use std::io;
use std::io::Write;
use std::time::SystemTime;

use bytes::BytesMut;
use tracing::{debug, trace};

use crate::codec::HeaderEncoder;
use crate::config::GatewayConfig;
use crate::gateway::state::{Phase, ResponseState};
use crate::protocol::{BoxError, GatewayError, HeaderSet, Status};

const CONTENT_LENGTH: &str = "Content-Length";

/// The response-initiation capability passed to an application.
///
/// Headers are buffered until the first body byte is written, or until the
/// gateway finishes the response, whichever happens first.
pub struct StartResponse<'a> {
    state: &'a mut ResponseState,
    output: &'a mut dyn Write,
    encoder: HeaderEncoder<'a>,
}

impl<'a> StartResponse<'a> {
    pub(crate) fn new(state: &'a mut ResponseState, output: &'a mut dyn Write, config: &'a GatewayConfig) -> Self {
        Self { state, output, encoder: HeaderEncoder::new(config.version(), config.software()) }
    }

    /// Records the response status and headers.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::HeadersAlreadySet`] if a status was already recorded
    /// - [`GatewayError::InvalidStatus`] if `status` is not `"<3 digits> <reason>"`
    pub fn start<I, N, V>(&mut self, status: &str, headers: I) -> Result<ResponseWriter<'_, 'a>, GatewayError>
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        if self.state.headers.is_some() {
            return Err(GatewayError::HeadersAlreadySet);
        }
        self.install(status, headers)
    }

    /// Replaces a status that was recorded but not yet sent, typically while
    /// reporting an error.
    ///
    /// # Errors
    ///
    /// If the headers already went out, `failure` comes back wrapped in
    /// [`GatewayError::Reraised`] and nothing is replaced.
    pub fn start_with_failure<I, N, V>(
        &mut self,
        status: &str,
        headers: I,
        failure: BoxError,
    ) -> Result<ResponseWriter<'_, 'a>, GatewayError>
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        if self.state.headers_sent {
            return Err(GatewayError::Reraised { source: failure });
        }
        debug!(cause = %failure, "replacing response status");
        self.install(status, headers)
    }

    fn install<I, N, V>(&mut self, status: &str, headers: I) -> Result<ResponseWriter<'_, 'a>, GatewayError>
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        let status = Status::parse(status)?;
        let headers: HeaderSet = headers.into_iter().collect();
        trace!(status = %status, headers = headers.len(), "response started");

        self.state.status = Some(status);
        self.state.headers = Some(headers);
        self.state.phase = Phase::HeadersSet;
        Ok(ResponseWriter { inner: self })
    }

    /// Writes a body chunk, sending the headers first if they are still pending.
    ///
    /// # Errors
    ///
    /// [`GatewayError::WriteBeforeStart`] if no status was recorded, or the I/O
    /// error of the underlying stream.
    pub fn write(&mut self, chunk: &[u8]) -> Result<(), GatewayError> {
        if self.state.status.is_none() {
            return Err(GatewayError::WriteBeforeStart);
        }

        if self.state.headers_sent {
            self.state.bytes_sent += chunk.len();
        } else {
            self.state.bytes_sent = chunk.len();
            self.send_headers()?;
        }

        self.output.write_all(chunk)?;
        self.output.flush()?;
        Ok(())
    }

    pub fn headers_sent(&self) -> bool {
        self.state.headers_sent
    }

    pub fn bytes_sent(&self) -> usize {
        self.state.bytes_sent
    }

    /// Completes a response whose body produced no bytes.
    pub(crate) fn finish(&mut self) -> Result<(), GatewayError> {
        if self.state.headers_sent {
            return Ok(());
        }
        self.send_headers()?;
        self.output.flush()?;
        Ok(())
    }

    fn send_headers(&mut self) -> Result<(), GatewayError> {
        let ResponseState { phase, status, headers, headers_sent, bytes_sent, chunk_count } = &mut *self.state;
        let (Some(status), Some(headers)) = (status.as_ref(), headers.as_mut()) else {
            return Err(GatewayError::WriteBeforeStart);
        };

        if !headers.contains(CONTENT_LENGTH) && *chunk_count == Some(1) {
            headers.set(CONTENT_LENGTH, bytes_sent.to_string());
        }
        *headers_sent = true;
        *phase = Phase::Streaming;

        let mut head = BytesMut::new();
        self.encoder.encode(status, headers, SystemTime::now(), &mut head);
        self.output.write_all(&head)?;
        Ok(())
    }
}

impl std::fmt::Debug for StartResponse<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartResponse")
            .field("state", &self.state)
            .field("encoder", &self.encoder)
            .finish_non_exhaustive()
    }
}

/// The write capability returned by a successful [`StartResponse::start`].
#[derive(Debug)]
pub struct ResponseWriter<'s, 'a> {
    inner: &'s mut StartResponse<'a>,
}

impl ResponseWriter<'_, '_> {
    /// See [`StartResponse::write`].
    pub fn write(&mut self, chunk: &[u8]) -> Result<(), GatewayError> {
        self.inner.write(chunk)
    }

    pub fn headers_sent(&self) -> bool {
        self.inner.headers_sent()
    }
}

impl Write for ResponseWriter<'_, '_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.inner.write(buf) {
            Ok(()) => Ok(buf.len()),
            Err(GatewayError::Io { source }) => Err(source),
            Err(e) => Err(io::Error::other(e)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_start_response<F>(chunk_count: Option<usize>, f: F) -> (ResponseState, String)
    where
        F: FnOnce(&mut StartResponse<'_>),
    {
        let config = GatewayConfig::default().server_software("test/1.0");
        let mut state = ResponseState { chunk_count, ..ResponseState::default() };
        let mut output = Vec::new();
        f(&mut StartResponse::new(&mut state, &mut output, &config));
        (state, String::from_utf8(output).unwrap())
    }

    #[test]
    fn start_twice_is_rejected() {
        let (state, output) = with_start_response(None, |start_response| {
            start_response.start("200 OK", [("A", "1")]).unwrap();
            let err = start_response.start("404 Not Found", Vec::<(String, String)>::new()).unwrap_err();
            assert!(matches!(err, GatewayError::HeadersAlreadySet));
        });

        assert_eq!(state.status.unwrap().as_str(), "200 OK");
        assert_eq!(state.headers.unwrap().get("A"), Some("1"));
        assert_eq!(state.phase, Phase::HeadersSet);
        assert!(output.is_empty());
    }

    #[test]
    fn invalid_status_records_nothing() {
        let (state, _) = with_start_response(None, |start_response| {
            for status in ["200", "2000 OK", "abc OK", "20 OK"] {
                let err = start_response.start(status, [("A", "1")]).unwrap_err();
                assert!(matches!(err, GatewayError::InvalidStatus { .. }), "{status}");
            }
        });
        assert!(state.status.is_none());
        assert!(state.headers.is_none());
    }

    #[test]
    fn write_before_start() {
        let (state, output) = with_start_response(None, |start_response| {
            let err = start_response.write(b"early").unwrap_err();
            assert!(matches!(err, GatewayError::WriteBeforeStart));
        });
        assert_eq!(state.bytes_sent, 0);
        assert!(output.is_empty());
    }

    #[test]
    fn first_write_sends_headers_once() {
        let (state, output) = with_start_response(None, |start_response| {
            let mut writer = start_response.start("200 OK", [("Content-Type", "text/plain"), ("Date", "now")]).unwrap();
            assert!(!writer.headers_sent());
            writer.write(b"abc").unwrap();
            assert!(writer.headers_sent());
            writer.write(b"de").unwrap();
        });

        assert_eq!(output, "HTTP/1.1 200 OK\r\nServer: test/1.0\r\nContent-Type: text/plain\r\nDate: now\r\n\r\nabcde");
        assert_eq!(state.bytes_sent, 5);
        assert!(state.headers_sent);
        assert_eq!(state.phase, Phase::Streaming);
    }

    #[test]
    fn single_chunk_gets_content_length() {
        let (_, output) = with_start_response(Some(1), |start_response| {
            start_response.start("200 OK", [("Date", "now")]).unwrap();
            start_response.write(b"Hello world!").unwrap();
        });
        assert_eq!(
            output,
            "HTTP/1.1 200 OK\r\nServer: test/1.0\r\nDate: now\r\nContent-Length: 12\r\n\r\nHello world!"
        );
    }

    #[test]
    fn explicit_content_length_is_kept() {
        let (_, output) = with_start_response(Some(1), |start_response| {
            start_response.start("200 OK", [("Date", "now"), ("content-length", "3")]).unwrap();
            start_response.write(b"abc").unwrap();
        });
        assert_eq!(output, "HTTP/1.1 200 OK\r\nServer: test/1.0\r\nDate: now\r\ncontent-length: 3\r\n\r\nabc");
    }

    #[test]
    fn failure_replaces_pending_status() {
        let (state, output) = with_start_response(None, |start_response| {
            start_response.start("200 OK", [("X-Partial", "yes")]).unwrap();
            start_response
                .start_with_failure("500 Internal Server Error", [("Content-Type", "text/plain")], "boom".into())
                .unwrap();
        });

        assert_eq!(state.status.unwrap().code(), http::StatusCode::INTERNAL_SERVER_ERROR);
        let headers = state.headers.unwrap();
        assert!(!headers.contains("X-Partial"));
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert!(output.is_empty());
    }

    #[test]
    fn failure_after_headers_sent_is_reraised() {
        let (state, output) = with_start_response(None, |start_response| {
            start_response.start("200 OK", [("Date", "now")]).unwrap().write(b"partial").unwrap();
            let err = start_response
                .start_with_failure("500 Internal Server Error", Vec::<(String, String)>::new(), "boom".into())
                .unwrap_err();
            match err {
                GatewayError::Reraised { source } => assert_eq!(source.to_string(), "boom"),
                other => panic!("unexpected {other:?}"),
            }
        });

        assert_eq!(state.status.unwrap().as_str(), "200 OK");
        assert_eq!(output.matches("HTTP/1.1").count(), 1);
    }

    #[test]
    fn finish_sends_pending_headers() {
        let (state, output) = with_start_response(Some(0), |start_response| {
            start_response.start("204 No Content", [("Date", "now")]).unwrap();
            start_response.finish().unwrap();
            start_response.finish().unwrap();
        });
        assert_eq!(output, "HTTP/1.1 204 No Content\r\nServer: test/1.0\r\nDate: now\r\n\r\n");
        assert!(state.headers_sent);
    }

    #[test]
    fn io_write_adapter() {
        let (_, output) = with_start_response(None, |start_response| {
            let mut writer = start_response.start("200 OK", [("Date", "now")]).unwrap();
            write!(writer, "{}-{}", 1, 2).unwrap();
        });
        assert!(output.ends_with("\r\n\r\n1-2"));
    }
}
