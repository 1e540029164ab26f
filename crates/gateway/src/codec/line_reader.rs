//! Bounded line reading off the connection.
//!
//! Request lines and header lines are read one at a time, each capped at the
//! configured length so a client can't make the server buffer without limit.

use std::io::{BufRead, Read};

use tracing::trace;

use crate::ensure;
use crate::protocol::ParseError;

/// Reads one line, returning it without its `\r\n` or `\n` terminator.
///
/// Returns `Ok(None)` when the stream is already at EOF. A final line without
/// terminator is returned as is.
///
/// # Errors
///
/// Returns [`ParseError::LineTooLong`] if no terminator shows up within
/// `max_size` bytes, and [`ParseError::Io`] if reading fails.
pub fn read_line<R: BufRead>(reader: &mut R, max_size: usize) -> Result<Option<String>, ParseError> {
    let mut buf = Vec::new();
    let limit = u64::try_from(max_size).unwrap_or(u64::MAX);
    let read = reader.by_ref().take(limit).read_until(b'\n', &mut buf)?;
    if read == 0 {
        return Ok(None);
    }

    ensure!(buf.ends_with(b"\n") || read < max_size, ParseError::line_too_long(max_size));

    if buf.ends_with(b"\n") {
        buf.pop();
        if buf.ends_with(b"\r") {
            buf.pop();
        }
    }
    trace!(line_size = read, "read line");
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

/// Reads header lines up to the blank line that ends the header section, or EOF.
///
/// # Errors
///
/// Fails like [`read_line`], and with [`ParseError::TooManyHeaders`] once more
/// than `max_headers` lines were read.
pub fn read_header_lines<R: BufRead>(
    reader: &mut R,
    max_size: usize,
    max_headers: usize,
) -> Result<Vec<String>, ParseError> {
    let mut lines = Vec::new();
    while let Some(line) = read_line(reader, max_size)? {
        if line.is_empty() {
            break;
        }
        ensure!(lines.len() < max_headers, ParseError::too_many_headers(max_headers));
        lines.push(line);
    }
    Ok(lines)
}
