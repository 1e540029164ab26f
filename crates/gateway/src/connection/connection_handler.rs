use std::io::{BufRead, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream};

use tracing::{debug, info};

use crate::codec::{RequestDecoder, read_header_lines, read_line};
use crate::config::GatewayConfig;
use crate::gateway::Gateway;
use crate::handler::Application;
use crate::protocol::{HttpError, ParseError, PeerInfo, RequestContext};

/// Serves exactly one request per accepted connection.
///
/// The handler reads the request line and headers, runs the application
/// through a [`Gateway`] and tears the streams down afterwards. The connection
/// is always closed once the response is out.
#[derive(Debug)]
pub struct ConnectionHandler<'a> {
    config: &'a GatewayConfig,
    peer: PeerInfo,
}

impl<'a> ConnectionHandler<'a> {
    pub fn new(config: &'a GatewayConfig, peer: PeerInfo) -> Self {
        Self { config, peer }
    }

    pub fn peer(&self) -> &PeerInfo {
        &self.peer
    }

    /// Handles a connection given as separate read and write halves.
    ///
    /// A client that sends nothing, or whose request line is unreadable or
    /// malformed, is dropped without a response and without error.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::RequestError`] on I/O failures or limits hit while
    /// reading headers and [`HttpError::ResponseError`] when the response could
    /// not be written.
    pub fn handle<R, W, A>(&self, reader: R, writer: W, application: &A) -> Result<(), HttpError>
    where
        R: Read,
        W: Write,
        A: Application + ?Sized,
    {
        let mut streams = StreamPair::new(BufReader::new(reader), writer);

        let Some(request) = self.read_request(&mut streams.input)? else {
            return Ok(());
        };

        let mut gateway = Gateway::new(self.config, &request, &mut streams.input, &mut streams.output);
        gateway.run(application)?;
        drop(gateway);

        streams.finish();
        Ok(())
    }

    /// Handles an accepted TCP connection, shutting the socket down afterwards.
    ///
    /// # Errors
    ///
    /// See [`handle`](Self::handle). Cloning the socket handle can fail too.
    pub fn handle_tcp<A: Application + ?Sized>(&self, stream: TcpStream, application: &A) -> Result<(), HttpError> {
        let reader = stream.try_clone().map_err(ParseError::io)?;
        let result = self.handle(reader, &stream, application);
        if let Err(e) = stream.shutdown(Shutdown::Both) {
            debug!(peer = self.peer.address(), cause = %e, "socket shutdown failed");
        }
        result
    }

    fn read_request<B: BufRead>(&self, input: &mut B) -> Result<Option<RequestContext>, HttpError> {
        let request_line = match read_line(input, self.config.line_limit()) {
            Ok(Some(line)) if !line.trim().is_empty() => line,
            Ok(_) => {
                debug!(peer = self.peer.address(), "connection closed before a request was sent");
                return Ok(None);
            }
            Err(e) => {
                debug!(peer = self.peer.address(), cause = %e, "unreadable request line");
                return Ok(None);
            }
        };

        let header_lines = read_header_lines(input, self.config.line_limit(), self.config.header_limit())?;

        match RequestDecoder::new(self.config, &self.peer).decode(&request_line, &header_lines) {
            Ok(request) => {
                info!(peer = self.peer.address(), request = request.request_line(), "receive request");
                Ok(Some(request))
            }
            Err(e) if e.is_malformed() => {
                debug!(peer = self.peer.address(), cause = %e, "dropping malformed request");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// The connection's stream pair, flushed on every exit path.
struct StreamPair<R, W: Write> {
    input: R,
    output: W,
}

impl<R, W: Write> StreamPair<R, W> {
    fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn finish(&mut self) {
        if let Err(e) = self.output.flush() {
            debug!(cause = %e, "flush on close failed");
        }
    }
}

impl<R, W: Write> Drop for StreamPair<R, W> {
    fn drop(&mut self) {
        self.finish();
    }
}
