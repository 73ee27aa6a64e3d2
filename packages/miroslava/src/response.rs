use std::fmt;

use bytes::Bytes;
use miroslava_datastructures::Headers;
use miroslava_http_models::{InvalidStatusError, Status, StatusCode};

pub const DEFAULT_MIMETYPE: &str = "text/html";
pub const DEFAULT_CHARSET: &str = "utf-8";

const CHARSET_MIMETYPES: &[&str] = &[
    "application/ecmascript",
    "application/javascript",
    "application/sql",
    "application/xml",
];

/// Append the charset to textual mimetypes.
///
/// ```rust
/// use miroslava::response::get_content_type;
///
/// assert_eq!(get_content_type("text/plain", "utf-8"), "text/plain; charset=utf-8");
/// assert_eq!(get_content_type("image/png", "utf-8"), "image/png");
/// ```
#[must_use]
pub fn get_content_type(mimetype: &str, charset: &str) -> String {
    if mimetype.starts_with("text/") || CHARSET_MIMETYPES.contains(&mimetype) {
        format!("{mimetype}; charset={charset}")
    } else {
        mimetype.to_string()
    }
}

/// An outgoing HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: Status,
    headers: Headers,
    data: Bytes,
    direct_passthrough: bool,
}

impl Response {
    /// A `200 OK` response with the default `text/html` content type.
    #[must_use]
    pub fn new(body: impl Into<Bytes>) -> Self {
        let mut headers = Headers::new();
        headers.set(
            "Content-Type",
            get_content_type(DEFAULT_MIMETYPE, DEFAULT_CHARSET),
        );

        Self {
            status: Status::default(),
            headers,
            data: body.into(),
            direct_passthrough: false,
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::new(Bytes::new())
    }

    #[must_use]
    pub fn with_status(mut self, status: impl Into<Status>) -> Self {
        self.status = status.into();
        self
    }

    /// # Errors
    ///
    /// * If the status doesn't start with an integer code
    pub fn with_status_str(mut self, status: &str) -> Result<Self, InvalidStatusError> {
        self.status = Status::parse(status)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    #[must_use]
    pub fn with_headers<K: Into<String>, V: Into<String>>(
        mut self,
        headers: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        for (name, value) in headers {
            self.headers.set(name, value);
        }
        self
    }

    /// Set the content type from a mimetype, adding the charset for textual
    /// types.
    #[must_use]
    pub fn with_mimetype(mut self, mimetype: &str) -> Self {
        self.headers
            .set("Content-Type", get_content_type(mimetype, DEFAULT_CHARSET));
        self
    }

    /// Set the content type verbatim.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.headers.set("Content-Type", content_type);
        self
    }

    #[must_use]
    pub const fn with_direct_passthrough(mut self, direct_passthrough: bool) -> Self {
        self.direct_passthrough = direct_passthrough;
        self
    }

    #[must_use]
    pub const fn status(&self) -> &Status {
        &self.status
    }

    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.status.code()
    }

    pub fn set_status(&mut self, status: impl Into<Status>) {
        self.status = status.into();
    }

    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    pub const fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("Content-Type")
    }

    #[must_use]
    pub const fn data(&self) -> &Bytes {
        &self.data
    }

    /// The body decoded as UTF-8, lossily.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    /// Replace the body and update `Content-Length`.
    pub fn set_data(&mut self, data: impl Into<Bytes>) {
        self.data = data.into();
        self.headers
            .set("Content-Length", self.data.len().to_string());
    }

    #[must_use]
    pub const fn direct_passthrough(&self) -> bool {
        self.direct_passthrough
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status
            .status_code()
            .is_some_and(|x| StatusCode::is_success(&x))
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Response {} bytes [{}]>", self.data.len(), self.status)
    }
}
