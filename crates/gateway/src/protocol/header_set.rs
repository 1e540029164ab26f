//! Ordered, case-insensitive, multi-valued header collection.
//!
//! [`HeaderSet`] keeps every `(name, value)` pair in insertion order with the
//! original casing of the name. Lookups and deletions compare names
//! case-insensitively. The same type carries the parsed request headers and the
//! headers an application hands to the gateway for its response.
//!
//! All operations are linear scans, the number of headers per message is small.

use std::fmt;
use std::fmt::Write;

/// Header names that only concern the immediate connection.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// Returns true if `name` is an HTTP/1.1 hop-by-hop header.
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|hop| hop.eq_ignore_ascii_case(name))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    headers: Vec<(String, String)>,
}

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, duplicates included.
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Replaces every entry named `name` by a single `(name, value)` entry at the end.
    pub fn set<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        let name = name.into();
        self.remove(&name);
        self.headers.push((name, value.into()));
    }

    /// Removes every entry named `name`, absent names are ignored.
    pub fn remove(&mut self, name: &str) {
        self.headers.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
    }

    /// Returns the first stored value for `name`.
    ///
    /// Use [`HeaderSet::get_all`] when a header may occur more than once.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, value)| value.as_str())
    }

    /// Returns every value stored for `name`, in stored order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.headers.iter().filter(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, value)| value.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Adds an entry without touching existing ones.
    pub fn append<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        self.headers.push((name.into(), value.into()));
    }

    /// Adds an entry whose value is followed by `; `-separated parameters.
    ///
    /// A parameter whose value is `None` or empty is rendered as the bare key,
    /// any other as `key="value"` with `\` and `"` escaped.
    ///
    /// ```
    /// use micro_gateway::protocol::HeaderSet;
    ///
    /// let mut headers = HeaderSet::new();
    /// headers.append_with_params("Content-Disposition", "attachment", [("filename", Some("bud.gif"))]);
    /// assert_eq!(headers.get("content-disposition"), Some(r#"attachment; filename="bud.gif""#));
    /// ```
    pub fn append_with_params<N, V, K, P, I>(&mut self, name: N, value: V, params: I)
    where
        N: Into<String>,
        V: Into<String>,
        K: AsRef<str>,
        P: AsRef<str>,
        I: IntoIterator<Item = (K, Option<P>)>,
    {
        let mut rendered = value.into();
        for (key, param) in params {
            if !rendered.is_empty() {
                rendered.push_str("; ");
            }
            let param: Option<&str> = param.as_ref().map(AsRef::as_ref);
            match param {
                Some(param) if !param.is_empty() => {
                    let escaped = param.replace('\\', "\\\\").replace('"', "\\\"");
                    let _ = write!(rendered, "{}=\"{}\"", key.as_ref(), escaped);
                }
                _ => rendered.push_str(key.as_ref()),
            }
        }
        self.headers.push((name.into(), rendered));
    }

    /// Returns the first value for `name`, appending `(name, value)` when there is none.
    pub fn set_default<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) -> &str {
        let name = name.into();
        let index = match self.headers.iter().position(|(key, _)| key.eq_ignore_ascii_case(&name)) {
            Some(index) => index,
            None => {
                self.headers.push((name, value.into()));
                self.headers.len() - 1
            }
        };
        &self.headers[index].1
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Header names in stored order, duplicates included.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.headers.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.headers.iter().map(|(_, value)| value.as_str())
    }

    /// Renders the wire form: `Name: Value` lines joined by CRLF followed by a blank line.
    pub fn serialize(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for HeaderSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.headers {
            write!(f, "{name}: {value}\r\n")?;
        }
        f.write_str("\r\n")
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for HeaderSet {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        Self { headers: iter.into_iter().map(|(name, value)| (name.into(), value.into())).collect() }
    }
}

impl<N: Into<String>, V: Into<String>> Extend<(N, V)> for HeaderSet {
    fn extend<T: IntoIterator<Item = (N, V)>>(&mut self, iter: T) {
        self.headers.extend(iter.into_iter().map(|(name, value)| (name.into(), value.into())));
    }
}
