//! In-process client for testing applications.
//!
//! Requests are turned into an [`Environ`] and dispatched exactly like the
//! development server does, minus the socket.

use std::sync::Arc;

use bytes::Bytes;
use miroslava_http_models::{Method, StatusCode};
use serde_json::Value;

use crate::{
    Miroslava,
    environ::{self, Environ},
    exceptions::HttpException,
    request::Request,
    response::Response,
};

/// Request body of a [`TestRequestBuilder`].
#[derive(Debug, Clone)]
pub enum RequestBody {
    Bytes(Bytes),
    Text(String),
    Json(Value),
    Form(Vec<(String, String)>),
}

impl RequestBody {
    /// Encoded body and its default content type.
    #[must_use]
    pub fn to_bytes_and_content_type(&self) -> (Bytes, &'static str) {
        match self {
            Self::Bytes(bytes) => (bytes.clone(), "application/octet-stream"),
            Self::Text(text) => (Bytes::from(text.clone()), "text/plain; charset=utf-8"),
            Self::Json(value) => (Bytes::from(value.to_string()), "application/json"),
            Self::Form(form) => (
                Bytes::from(encode_pairs(form)),
                "application/x-www-form-urlencoded",
            ),
        }
    }
}

fn encode_pairs(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

#[derive(Debug, Clone)]
pub struct TestClient {
    app: Arc<Miroslava>,
}

impl TestClient {
    #[must_use]
    pub const fn new(app: Arc<Miroslava>) -> Self {
        Self { app }
    }

    #[must_use]
    pub const fn app(&self) -> &Arc<Miroslava> {
        &self.app
    }

    #[must_use]
    pub fn open(&self, method: Method, path: &str) -> TestRequestBuilder {
        TestRequestBuilder {
            app: self.app.clone(),
            method,
            path: path.to_string(),
            query: vec![],
            headers: vec![],
            body: None,
        }
    }

    #[must_use]
    pub fn get(&self, path: &str) -> TestRequestBuilder {
        self.open(Method::Get, path)
    }

    #[must_use]
    pub fn post(&self, path: &str) -> TestRequestBuilder {
        self.open(Method::Post, path)
    }

    #[must_use]
    pub fn put(&self, path: &str) -> TestRequestBuilder {
        self.open(Method::Put, path)
    }

    #[must_use]
    pub fn delete(&self, path: &str) -> TestRequestBuilder {
        self.open(Method::Delete, path)
    }

    #[must_use]
    pub fn patch(&self, path: &str) -> TestRequestBuilder {
        self.open(Method::Patch, path)
    }

    #[must_use]
    pub fn head(&self, path: &str) -> TestRequestBuilder {
        self.open(Method::Head, path)
    }

    #[must_use]
    pub fn options(&self, path: &str) -> TestRequestBuilder {
        self.open(Method::Options, path)
    }
}

#[derive(Debug, Clone)]
#[must_use]
pub struct TestRequestBuilder {
    app: Arc<Miroslava>,
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<RequestBody>,
}

impl TestRequestBuilder {
    /// Append a query string parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(RequestBody::Bytes(body.into()));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Text(text.into()));
        self
    }

    pub fn json(mut self, value: Value) -> Self {
        self.body = Some(RequestBody::Json(value));
        self
    }

    pub fn form<K: Into<String>, V: Into<String>>(
        mut self,
        data: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        self.body = Some(RequestBody::Form(
            data.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        ));
        self
    }

    fn environ(self) -> Environ {
        let mut target = self.path;
        if !self.query.is_empty() {
            target.push(if target.contains('?') { '&' } else { '?' });
            target.push_str(&encode_pairs(&self.query));
        }

        let mut environ = Environ::new();
        environ.set(environ::REQUEST_METHOD, self.method.as_ref());
        environ.set_target(&target);
        environ.set_remote_addr("127.0.0.1");

        if let Some(body) = &self.body {
            let (data, content_type) = body.to_bytes_and_content_type();
            environ.set(environ::CONTENT_TYPE, content_type);
            environ.set(environ::CONTENT_LENGTH, data.len().to_string());
            environ.set_body(data);
        }

        for (name, value) in &self.headers {
            environ.set_header(name, value);
        }

        environ
    }

    /// Dispatch the request through the app.
    pub async fn send(self) -> Response {
        let app = self.app.clone();

        log::trace!("Test request {} {}", self.method, self.path);

        match Request::new(self.environ()) {
            Ok(request) => Miroslava::full_dispatch(&app, request).await,
            Err(e) => {
                log::debug!("Invalid test request: {e}");
                HttpException::new(StatusCode::NotImplemented).to_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn builder() -> TestRequestBuilder {
        Miroslava::new("test_client").test_client().post("/submit?a=1")
    }

    #[test_log::test]
    fn query_is_appended_to_existing_query_string() {
        let environ = builder().query("b", "two words").environ();
        assert_eq!(environ.path(), "/submit");
        assert_eq!(environ.query_string(), "a=1&b=two%20words");
    }

    #[test_log::test]
    fn body_sets_content_headers() {
        let environ = builder().json(json!({"x": 1})).environ();
        assert_eq!(environ.get(environ::CONTENT_TYPE), Some("application/json"));
        assert_eq!(environ.get(environ::CONTENT_LENGTH), Some("7"));
        assert_eq!(environ.body().as_ref(), br#"{"x":1}"#);
    }

    #[test_log::test]
    fn explicit_header_wins_over_body_content_type() {
        let environ = builder()
            .text("hi")
            .header("Content-Type", "text/csv")
            .header("X-Titan", "colossal")
            .environ();
        assert_eq!(environ.get(environ::CONTENT_TYPE), Some("text/csv"));
        assert_eq!(environ.get("HTTP_X_TITAN"), Some("colossal"));
    }

    #[test_log::test]
    fn form_is_urlencoded() {
        let (data, content_type) =
            RequestBody::Form(vec![("name".into(), "Armin A".into()), ("x".into(), "&".into())])
                .to_bytes_and_content_type();
        assert_eq!(content_type, "application/x-www-form-urlencoded");
        assert_eq!(data.as_ref(), b"name=Armin%20A&x=%26");
    }
}
