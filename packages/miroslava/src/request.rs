use std::{fmt, str::FromStr as _, sync::OnceLock};

use bytes::Bytes;
use miroslava_datastructures::{Headers, MultiDict};
use miroslava_http_models::{Method, StatusCode};
use serde_json::Value;

use crate::{
    Error,
    environ::{self, Environ},
    exceptions::HttpException,
};

/// An incoming request.
///
/// Created once per request from an [`Environ`] and shared read-only with
/// the view through an `Arc`. The form and JSON bodies are parsed on first
/// access.
#[derive(Debug)]
pub struct Request {
    environ: Environ,
    method: Method,
    scheme: String,
    server: Option<(String, u16)>,
    root_path: String,
    path: String,
    query_string: String,
    headers: Headers,
    remote_addr: Option<String>,
    form: OnceLock<MultiDict<String, String>>,
    json: OnceLock<Option<Value>>,
}

impl Request {
    /// # Errors
    ///
    /// * If the request method is not a known HTTP method
    pub fn new(environ: Environ) -> Result<Self, Error> {
        let method = Method::from_str(environ.method())
            .map_err(|_| Error::UnsupportedMethod(environ.method().to_string()))?;

        let server = environ.get(environ::SERVER_NAME).map(|name| {
            let port = environ
                .get(environ::SERVER_PORT)
                .and_then(|x| x.parse().ok())
                .unwrap_or(9001);
            (name.to_string(), port)
        });

        let mut headers = Headers::new();
        for (key, value) in environ.iter() {
            if let Some(name) = key.strip_prefix("HTTP_") {
                headers.add(title_case(name), value);
            } else if key == environ::CONTENT_LENGTH || key == environ::CONTENT_TYPE {
                headers.add(title_case(key), value);
            }
        }

        Ok(Self {
            method,
            scheme: environ.get(environ::URL_SCHEME).unwrap_or("http").to_string(),
            server,
            root_path: environ.get(environ::SCRIPT_NAME).unwrap_or_default().to_string(),
            path: environ.path().to_string(),
            query_string: environ.query_string().to_string(),
            headers,
            remote_addr: environ.get(environ::REMOTE_ADDR).map(ToString::to_string),
            form: OnceLock::new(),
            json: OnceLock::new(),
            environ,
        })
    }

    #[must_use]
    pub const fn environ(&self) -> &Environ {
        &self.environ
    }

    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    #[must_use]
    pub fn server(&self) -> Option<(&str, u16)> {
        self.server.as_ref().map(|(name, port)| (name.as_str(), *port))
    }

    #[must_use]
    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn query_string(&self) -> &str {
        &self.query_string
    }

    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    #[must_use]
    pub fn remote_addr(&self) -> Option<&str> {
        self.remote_addr.as_deref()
    }

    /// Raw request body.
    #[must_use]
    pub const fn data(&self) -> &Bytes {
        self.environ.body()
    }

    #[must_use]
    pub fn protocol(&self) -> &str {
        self.environ.protocol()
    }

    /// Parsed query string, blank values included.
    #[must_use]
    pub fn args(&self) -> MultiDict<String, String> {
        MultiDict::from_query_string(&self.query_string)
    }

    /// Parsed body of an urlencoded form submission.
    ///
    /// Empty for any other content type.
    pub fn form(&self) -> &MultiDict<String, String> {
        self.form.get_or_init(|| {
            if self.content_type_contains("application/x-www-form-urlencoded") {
                MultiDict::from_urlencoded(self.data())
            } else {
                MultiDict::new()
            }
        })
    }

    /// Parsed body of a JSON request.
    ///
    /// `None` when the content type isn't JSON or the body fails to parse.
    pub fn json(&self) -> Option<&Value> {
        self.json
            .get_or_init(|| {
                if !self.content_type_contains("application/json") {
                    return None;
                }
                match serde_json::from_slice(self.data()) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        log::debug!("Failed to decode JSON body: {e:?}");
                        None
                    }
                }
            })
            .as_ref()
    }

    /// Like [`Request::json`], but a missing or broken body is a
    /// `400 Bad Request`.
    ///
    /// # Errors
    ///
    /// * If the request doesn't carry a valid JSON body
    pub fn get_json(&self) -> Result<&Value, Error> {
        self.json().ok_or_else(|| {
            HttpException::new(StatusCode::BadRequest)
                .with_description("Failed to decode JSON object")
                .into()
        })
    }

    #[must_use]
    pub fn full_path(&self) -> String {
        format!("{}?{}", self.path, self.query_string)
    }

    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.scheme == "https"
    }

    /// The `Host` header, or the server address when it's missing.
    #[must_use]
    pub fn host(&self) -> String {
        if let Some(host) = self.headers.get("Host") {
            return host.to_string();
        }
        match &self.server {
            Some((name, port)) => format!("{name}:{port}"),
            None => "localhost".to_string(),
        }
    }

    #[must_use]
    pub fn url(&self) -> String {
        get_current_url(
            &self.scheme,
            &self.host(),
            Some(&self.root_path),
            Some(&self.path),
            Some(&self.query_string),
        )
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("Content-Type")
    }

    /// The content type without parameters, lower-cased.
    #[must_use]
    pub fn mimetype(&self) -> String {
        self.content_type()
            .and_then(|x| x.split(';').next())
            .map(|x| x.trim().to_ascii_lowercase())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn content_length(&self) -> Option<usize> {
        self.headers.get_as("Content-Length")
    }

    fn content_type_contains(&self, needle: &str) -> bool {
        self.content_type().is_some_and(|x| x.contains(needle))
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Request {} [{}]>", self.url(), self.method)
    }
}

/// Rebuild a URL from its request parts.
///
/// A missing root path or path ends the URL with `/`.
#[must_use]
pub fn get_current_url(
    scheme: &str,
    host: &str,
    root_path: Option<&str>,
    path: Option<&str>,
    query_string: Option<&str>,
) -> String {
    let mut url = format!("{scheme}://{host}");
    let Some(root_path) = root_path else {
        url.push('/');
        return url;
    };
    url.push_str(root_path.trim_end_matches('/'));
    let Some(path) = path else {
        url.push('/');
        return url;
    };
    url.push('/');
    url.push_str(path.trim_start_matches('/'));
    if let Some(query_string) = query_string.filter(|x| !x.is_empty()) {
        url.push('?');
        url.push_str(query_string);
    }
    url
}

fn title_case(name: &str) -> String {
    name.split(['_', '-'])
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
            })
        })
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn make_request(head: &str, body: &str) -> Request {
        let mut environ = Environ::parse_head(head.as_bytes());
        environ.set_body(body.to_string());
        Request::new(environ).unwrap()
    }

    #[test_log::test]
    fn headers_are_title_cased() {
        let request = make_request(
            "GET / HTTP/1.1\r\nx-requested-with: tests\r\ncontent-type: text/plain",
            "",
        );
        assert_eq!(request.headers().get("X-Requested-With"), Some("tests"));
        assert_eq!(
            request.headers().iter().find(|(k, _)| *k == "X-Requested-With"),
            Some(("X-Requested-With", "tests"))
        );
        assert_eq!(request.mimetype(), "text/plain");
    }

    #[test_log::test]
    fn unknown_method_is_rejected() {
        let environ = Environ::parse_head(b"BREW /pot HTTP/1.1");
        assert!(matches!(Request::new(environ), Err(Error::UnsupportedMethod(x)) if x == "BREW"));
    }

    #[test_log::test]
    fn args_keep_repeated_and_blank_values() {
        let request = make_request("GET /search?q=titan&q=colossal&page= HTTP/1.1", "");
        let args = request.args();
        assert_eq!(args.get_all("q"), ["titan".to_string(), "colossal".to_string()]);
        assert_eq!(args.get("page").map(String::as_str), Some(""));
        assert_eq!(request.full_path(), "/search?q=titan&q=colossal&page=");
    }

    #[test_log::test]
    fn form_is_parsed_for_urlencoded_bodies() {
        let request = make_request(
            "POST /login HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded",
            "user=levi&squad=special+ops",
        );
        assert_eq!(request.form().get("squad").map(String::as_str), Some("special ops"));

        let request = make_request("POST /login HTTP/1.1\r\nContent-Type: text/plain", "user=levi");
        assert!(request.form().is_empty());
    }

    #[test_log::test]
    fn json_is_silent_on_errors() {
        let request = make_request(
            "POST /api HTTP/1.1\r\nContent-Type: application/json",
            r#"{"titan": "attack"}"#,
        );
        assert_eq!(request.json().unwrap()["titan"], "attack");

        let request = make_request("POST /api HTTP/1.1\r\nContent-Type: application/json", "{");
        assert!(request.json().is_none());
        let err = request.get_json().unwrap_err();
        assert!(matches!(err, Error::Http(e) if e.status().code() == 400));
    }

    #[test_log::test]
    fn url_is_rebuilt_from_host_header() {
        let request = make_request("GET /wish/you?x=1 HTTP/1.1\r\nHost: example.com", "");
        assert_eq!(request.host(), "example.com");
        assert_eq!(request.url(), "http://example.com/wish/you?x=1");
        assert_eq!(request.to_string(), "<Request http://example.com/wish/you?x=1 [GET]>");
        assert!(!request.is_secure());
    }

    #[test_log::test]
    fn host_falls_back_to_server_address() {
        let request = make_request("GET / HTTP/1.1", "");
        assert_eq!(request.host(), "localhost:9001");
        assert_eq!(request.server(), Some(("localhost", 9001)));
    }

    #[test_log::test]
    fn current_url_handles_missing_parts() {
        assert_eq!(get_current_url("https", "a.b", None, None, None), "https://a.b/");
        assert_eq!(get_current_url("https", "a.b", Some("/app/"), None, None), "https://a.b/app/");
        assert_eq!(
            get_current_url("https", "a.b", Some("/app/"), Some("/x"), Some("")),
            "https://a.b/app/x"
        );
    }
}
