//! Response status lines and the reason phrase table.
//!
//! Applications pass their status as a `"<code> <reason>"` string. [`Status`]
//! validates that shape once at response-initiation so the preamble can be
//! written verbatim later.

use std::fmt;

use http::StatusCode;

use crate::protocol::GatewayError;

/// A validated `"<code> <reason>"` status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    line: String,
    code: StatusCode,
}

impl Status {
    /// Parses an application supplied status.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidStatus`] unless the string is at least four
    /// characters long and starts with a valid three digit code followed by a space.
    pub fn parse<S: Into<String>>(status: S) -> Result<Self, GatewayError> {
        let line = status.into();
        let bytes = line.as_bytes();
        if bytes.len() < 4 {
            return Err(GatewayError::invalid_status(line, "status must be at least 4 characters"));
        }
        if bytes[3] != b' ' {
            return Err(GatewayError::invalid_status(line, "status code must be followed by a space"));
        }
        match StatusCode::from_bytes(&bytes[..3]) {
            Ok(code) => Ok(Self { line, code }),
            Err(_) => Err(GatewayError::invalid_status(line, "status must start with a 3 digit code")),
        }
    }

    /// Builds the status for `code` using the reason phrase from the table.
    pub fn from_code(code: StatusCode) -> Self {
        let reason = reason_phrase(code.as_u16()).or(code.canonical_reason()).unwrap_or("Unknown");
        Self { line: format!("{} {}", code.as_str(), reason), code }
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn as_str(&self) -> &str {
        &self.line
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line)
    }
}

/// `(code, reason, explanation)` for every status the server knows by name.
const RESPONSES: &[(u16, &str, &str)] = &[
    (100, "Continue", "Request received, please continue"),
    (101, "Switching Protocols", "Switching to new protocol; obey Upgrade header"),
    (200, "OK", "Request fulfilled, document follows"),
    (201, "Created", "Document created, URL follows"),
    (202, "Accepted", "Request accepted, processing continues off-line"),
    (203, "Non-Authoritative Information", "Request fulfilled from cache"),
    (204, "No Content", "Request fulfilled, nothing follows"),
    (205, "Reset Content", "Clear input form for further input."),
    (206, "Partial Content", "Partial content follows."),
    (300, "Multiple Choices", "Object has several resources -- see URI list"),
    (301, "Moved Permanently", "Object moved permanently -- see URI list"),
    (302, "Found", "Object moved temporarily -- see URI list"),
    (303, "See Other", "Object moved -- see Method and URL list"),
    (304, "Not Modified", "Document has not changed since given time"),
    (305, "Use Proxy", "You must use proxy specified in Location to access this resource."),
    (307, "Temporary Redirect", "Object moved temporarily -- see URI list"),
    (400, "Bad Request", "Bad request syntax or unsupported method"),
    (401, "Unauthorized", "No permission -- see authorization schemes"),
    (402, "Payment Required", "No payment -- see charging schemes"),
    (403, "Forbidden", "Request forbidden -- authorization will not help"),
    (404, "Not Found", "Nothing matches the given URI"),
    (405, "Method Not Allowed", "Specified method is invalid for this resource."),
    (406, "Not Acceptable", "URI not available in preferred format."),
    (407, "Proxy Authentication Required", "You must authenticate with this proxy before proceeding."),
    (408, "Request Timeout", "Request timed out; try again later."),
    (409, "Conflict", "Request conflict."),
    (410, "Gone", "URI no longer exists and has been permanently removed."),
    (411, "Length Required", "Client must specify Content-Length."),
    (412, "Precondition Failed", "Precondition in headers is false."),
    (413, "Request Entity Too Large", "Entity is too large."),
    (414, "Request-URI Too Long", "URI is too long."),
    (415, "Unsupported Media Type", "Entity body in unsupported format."),
    (416, "Requested Range Not Satisfiable", "Cannot satisfy request range."),
    (417, "Expectation Failed", "Expect condition could not be satisfied."),
    (500, "Internal Server Error", "Server got itself in trouble"),
    (501, "Not Implemented", "Server does not support this operation"),
    (502, "Bad Gateway", "Invalid responses from another server/proxy."),
    (503, "Service Unavailable", "The server cannot process the request due to a high load"),
    (504, "Gateway Timeout", "The gateway server did not receive a timely response"),
    (505, "HTTP Version Not Supported", "Cannot fulfill request."),
];

fn lookup(code: u16) -> Option<&'static (u16, &'static str, &'static str)> {
    RESPONSES.iter().find(|(known, _, _)| *known == code)
}

/// Short reason phrase for `code`, e.g. `"Not Found"` for 404.
pub fn reason_phrase(code: u16) -> Option<&'static str> {
    lookup(code).map(|(_, reason, _)| *reason)
}

/// Longer human readable explanation for `code`.
pub fn explanation(code: u16) -> Option<&'static str> {
    lookup(code).map(|(_, _, explain)| *explain)
}
