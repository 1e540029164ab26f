//! Header section parsing into a [`HeaderSet`].
//!
//! The raw header lines are reassembled into a CRLF terminated block and handed
//! to `httparse`, which validates names and values and trims the values.
//! Names and values are copied into the set with their original casing.

use httparse::Status;
use tracing::trace;

use crate::ensure;
use crate::protocol::{HeaderSet, ParseError};

/// Parses raw header lines (without terminators) into a [`HeaderSet`].
///
/// # Errors
///
/// Returns [`ParseError::TooManyHeaders`] above `max_headers` entries and
/// [`ParseError::InvalidHeader`] for lines `httparse` rejects.
pub fn decode_headers<S: AsRef<str>>(lines: &[S], max_headers: usize) -> Result<HeaderSet, ParseError> {
    ensure!(lines.len() <= max_headers, ParseError::too_many_headers(max_headers));

    let mut block = String::with_capacity(lines.iter().map(|line| line.as_ref().len() + 2).sum::<usize>() + 2);
    for line in lines {
        block.push_str(line.as_ref());
        block.push_str("\r\n");
    }
    block.push_str("\r\n");

    decode_header_block(block.as_bytes(), max_headers)
}

/// Parses a complete, blank-line terminated header block.
///
/// # Errors
///
/// See [`decode_headers`].
pub fn decode_header_block(block: &[u8], max_headers: usize) -> Result<HeaderSet, ParseError> {
    let mut headers = vec![httparse::EMPTY_HEADER; max_headers];

    let parsed = httparse::parse_headers(block, &mut headers).map_err(|e| match e {
        httparse::Error::TooManyHeaders => ParseError::too_many_headers(max_headers),
        e => ParseError::invalid_header(e.to_string()),
    })?;

    match parsed {
        Status::Complete((offset, parsed_headers)) => {
            trace!(header_size = offset, header_count = parsed_headers.len(), "parsed headers");
            let mut header_set = HeaderSet::new();
            for header in parsed_headers {
                header_set.append(header.name, String::from_utf8_lossy(header.value).into_owned());
            }
            Ok(header_set)
        }
        Status::Partial => Err(ParseError::invalid_header("incomplete header section")),
    }
}
