use crate::protocol::{HeaderSet, Status};

/// Where a [`Gateway`](crate::gateway::Gateway) is in serving its request.
///
/// ```text
/// Created -> EnvironmentReady -> AwaitingStart -> HeadersSet -> Streaming -> Closed
/// ```
///
/// A failure moves any phase to `ErrorRecovery`, which goes on through
/// `HeadersSet` and `Streaming` for the fallback response, then to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Created,
    EnvironmentReady,
    AwaitingStart,
    HeadersSet,
    Streaming,
    ErrorRecovery,
    Closed,
}

/// Per-request response bookkeeping.
#[derive(Debug, Default)]
pub(crate) struct ResponseState {
    pub(crate) phase: Phase,
    pub(crate) status: Option<Status>,
    pub(crate) headers: Option<HeaderSet>,
    pub(crate) headers_sent: bool,
    pub(crate) bytes_sent: usize,
    /// Chunk count of the body being streamed, when known up front.
    pub(crate) chunk_count: Option<usize>,
}

impl ResponseState {
    pub(crate) fn reset(&mut self) {
        self.status = None;
        self.headers = None;
        self.headers_sent = false;
        self.bytes_sent = 0;
        self.chunk_count = None;
        self.phase = Phase::Closed;
    }
}
