//! The body producer an application returns.
//!
//! A [`Body`] is either a single chunk, whose length is known before anything
//! is written, or a forward-only stream of chunks. Streams may fail part way,
//! each item is a `Result`. An optional release hook runs exactly once, after
//! the last chunk has been consumed or when the body is abandoned early.

use std::fmt;
use std::panic;
use std::panic::AssertUnwindSafe;

use bytes::Bytes;
use tracing::warn;

use crate::protocol::{BoxError, panic_error};

/// Iterator type backing [`Body::stream`].
pub type ChunkStream = Box<dyn Iterator<Item = Result<Bytes, BoxError>> + Send>;

type ReleaseHook = Box<dyn FnOnce() + Send>;

enum Kind {
    Single(Option<Bytes>),
    Stream(ChunkStream),
}

pub struct Body {
    kind: Kind,
    release: Option<ReleaseHook>,
}

impl Body {
    /// A body made of exactly one chunk.
    pub fn single<B: Into<Bytes>>(chunk: B) -> Self {
        Self { kind: Kind::Single(Some(chunk.into())), release: None }
    }

    /// A body without any chunk.
    pub fn empty() -> Self {
        Self::chunks(std::iter::empty::<Bytes>())
    }

    /// A body that yields the given chunks, none of which can fail.
    pub fn chunks<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        I::IntoIter: Send + 'static,
        B: Into<Bytes>,
    {
        Self::stream(chunks.into_iter().map(|chunk| Ok::<Bytes, BoxError>(chunk.into())))
    }

    /// A body backed by a fallible chunk iterator.
    pub fn stream<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = Result<B, BoxError>>,
        I::IntoIter: Send + 'static,
        B: Into<Bytes>,
    {
        let stream: ChunkStream = Box::new(chunks.into_iter().map(|chunk| chunk.map(Into::<Bytes>::into)));
        Self { kind: Kind::Stream(stream), release: None }
    }

    /// Registers a hook run when the body is released.
    #[must_use]
    pub fn on_release<F: FnOnce() + Send + 'static>(mut self, hook: F) -> Self {
        self.release = Some(Box::new(hook));
        self
    }

    /// Number of chunks, when it is known without consuming the body.
    pub fn chunk_count(&self) -> Option<usize> {
        match &self.kind {
            Kind::Single(_) => Some(1),
            Kind::Stream(_) => None,
        }
    }

    /// Pulls the next chunk.
    pub fn next_chunk(&mut self) -> Option<Result<Bytes, BoxError>> {
        match &mut self.kind {
            Kind::Single(chunk) => chunk.take().map(Ok),
            Kind::Stream(stream) => stream.next(),
        }
    }

    /// Runs the release hook if it has not run yet.
    ///
    /// # Errors
    ///
    /// Returns the hook's panic as a failure. The hook counts as run either way.
    pub fn release(&mut self) -> Result<(), BoxError> {
        match self.release.take() {
            Some(hook) => panic::catch_unwind(AssertUnwindSafe(hook)).map_err(panic_error),
            None => Ok(()),
        }
    }
}

impl Drop for Body {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(cause = %e, "body release hook failed");
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            Kind::Single(_) => "Single",
            Kind::Stream(_) => "Stream",
        };
        f.debug_struct("Body").field("kind", &kind).field("has_release", &self.release.is_some()).finish()
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self::single(bytes)
    }
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Self::single(value)
    }
}

impl From<&'static str> for Body {
    fn from(value: &'static str) -> Self {
        Self::single(value)
    }
}

impl From<Vec<u8>> for Body {
    fn from(value: Vec<u8>) -> Self {
        Self::single(value)
    }
}
