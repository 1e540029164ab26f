//! Response preamble encoding.
//!
//! Serializes the status line, the `Date` and `Server` headers when the
//! application did not provide them, and the application's own header block.

use std::time::SystemTime;

use bytes::{BufMut, BytesMut};

use crate::protocol::{HeaderSet, Status};

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 1024;

pub const DATE: &str = "Date";
pub const SERVER: &str = "Server";

/// Writer for the head of a response.
#[derive(Debug)]
pub struct HeaderEncoder<'a> {
    http_version: &'a str,
    server_software: &'a str,
}

impl<'a> HeaderEncoder<'a> {
    pub fn new(http_version: &'a str, server_software: &'a str) -> Self {
        Self { http_version, server_software }
    }

    /// Encodes the full response head into `dst`, status line to blank line.
    pub fn encode(&self, status: &Status, headers: &HeaderSet, now: SystemTime, dst: &mut BytesMut) {
        dst.reserve(INIT_HEADER_SIZE);

        put_line(dst, &["HTTP/", self.http_version, " ", status.as_str()]);
        if !headers.contains(DATE) {
            let date = httpdate::fmt_http_date(now);
            put_line(dst, &[DATE, ": ", date.as_str()]);
        }
        if !headers.contains(SERVER) {
            put_line(dst, &[SERVER, ": ", self.server_software]);
        }
        dst.put_slice(headers.serialize().as_bytes());
    }
}

fn put_line(dst: &mut BytesMut, parts: &[&str]) {
    for part in parts {
        dst.put_slice(part.as_bytes());
    }
    dst.put_slice(b"\r\n");
}
