//! CGI style request environment.
//!
//! The development server and the test client both describe an incoming
//! request as an [`Environ`]: a flat map of `REQUEST_METHOD`, `PATH_INFO`,
//! `HTTP_*` and friends plus the raw body. [`crate::Request`] is built on top
//! of it.

use std::{collections::BTreeMap, num::ParseIntError};

use bytes::Bytes;

pub const REQUEST_METHOD: &str = "REQUEST_METHOD";
pub const PATH_INFO: &str = "PATH_INFO";
pub const QUERY_STRING: &str = "QUERY_STRING";
pub const SCRIPT_NAME: &str = "SCRIPT_NAME";
pub const SERVER_NAME: &str = "SERVER_NAME";
pub const SERVER_PORT: &str = "SERVER_PORT";
pub const SERVER_PROTOCOL: &str = "SERVER_PROTOCOL";
pub const REMOTE_ADDR: &str = "REMOTE_ADDR";
pub const CONTENT_LENGTH: &str = "CONTENT_LENGTH";
pub const CONTENT_TYPE: &str = "CONTENT_TYPE";
pub const URL_SCHEME: &str = "wsgi.url_scheme";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environ {
    vars: BTreeMap<String, String>,
    body: Bytes,
}

impl Default for Environ {
    fn default() -> Self {
        let vars = [
            (REQUEST_METHOD, "GET"),
            (PATH_INFO, "/"),
            (QUERY_STRING, ""),
            (SERVER_NAME, "localhost"),
            (SERVER_PORT, "9001"),
            (SERVER_PROTOCOL, "HTTP/1.1"),
            (URL_SCHEME, "http"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            vars,
            body: Bytes::new(),
        }
    }
}

impl Environ {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an environment from the request line and header block.
    ///
    /// `head` is everything before the blank line that ends the headers.
    /// Bytes that aren't valid UTF-8 are replaced.
    #[must_use]
    pub fn parse_head(head: &[u8]) -> Self {
        let text = String::from_utf8_lossy(head);
        let mut lines = text.split("\r\n");
        let mut environ = Self::new();

        let request_line = lines.next().unwrap_or_default();
        let mut parts = request_line.split_whitespace();
        if let (Some(method), Some(target)) = (parts.next(), parts.next()) {
            environ.set(REQUEST_METHOD, method);
            environ.set_target(target);
            if let Some(protocol) = parts.next() {
                environ.set(SERVER_PROTOCOL, protocol);
            }
        }

        for line in lines {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            environ.set_header(name.trim(), value.trim());
        }

        environ
    }

    /// Split a request target into `PATH_INFO` and `QUERY_STRING`.
    ///
    /// The path is percent-decoded, the query string is kept as is.
    pub fn set_target(&mut self, target: &str) {
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        let path = urlencoding::decode_binary(path.as_bytes());
        self.set(PATH_INFO, String::from_utf8_lossy(&path));
        self.set(QUERY_STRING, query);
    }

    /// Store a header under its CGI name.
    ///
    /// `Content-Length` and `Content-Type` are stored without the `HTTP_`
    /// prefix.
    pub fn set_header(&mut self, name: &str, value: &str) {
        let key = name.to_ascii_uppercase().replace('-', "_");
        if key == CONTENT_LENGTH || key == CONTENT_TYPE {
            self.set(key, value);
        } else {
            self.set(format!("HTTP_{key}"), value);
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn method(&self) -> &str {
        self.get(REQUEST_METHOD).unwrap_or("GET")
    }

    #[must_use]
    pub fn path(&self) -> &str {
        self.get(PATH_INFO).unwrap_or("/")
    }

    #[must_use]
    pub fn query_string(&self) -> &str {
        self.get(QUERY_STRING).unwrap_or_default()
    }

    #[must_use]
    pub fn protocol(&self) -> &str {
        self.get(SERVER_PROTOCOL).unwrap_or("HTTP/1.1")
    }

    pub fn set_server(&mut self, name: impl Into<String>, port: u16) {
        self.set(SERVER_NAME, name);
        self.set(SERVER_PORT, port.to_string());
    }

    pub fn set_remote_addr(&mut self, addr: impl Into<String>) {
        self.set(REMOTE_ADDR, addr);
    }

    pub fn set_script_name(&mut self, root_path: impl Into<String>) {
        self.set(SCRIPT_NAME, root_path);
    }

    pub fn set_url_scheme(&mut self, scheme: impl Into<String>) {
        self.set(URL_SCHEME, scheme);
    }

    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    /// # Errors
    ///
    /// * If `CONTENT_LENGTH` is set to something other than a number
    pub fn content_length(&self) -> Result<Option<usize>, ParseIntError> {
        self.get(CONTENT_LENGTH)
            .filter(|x| !x.is_empty())
            .map(str::parse)
            .transpose()
    }
}
