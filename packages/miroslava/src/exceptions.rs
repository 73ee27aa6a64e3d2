use std::fmt;

use miroslava_http_models::Status;

use crate::{Error, response::Response};

/// An error that maps directly onto an HTTP response.
///
/// Returning one from a view (usually through [`abort`]) short-circuits the
/// view and sends its [`HttpException::to_response`] to the client.
#[derive(Debug, Clone)]
pub struct HttpException {
    status: Status,
    description: Option<String>,
    response: Option<Box<Response>>,
}

impl HttpException {
    #[must_use]
    pub fn new(status: impl Into<Status>) -> Self {
        Self {
            status: status.into(),
            description: None,
            response: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Send this response instead of the generated one.
    #[must_use]
    pub fn with_response(mut self, response: Response) -> Self {
        self.response = Some(Box::new(response));
        self
    }

    #[must_use]
    pub const fn status(&self) -> &Status {
        &self.status
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn to_response(&self) -> Response {
        if let Some(response) = &self.response {
            return response.as_ref().clone();
        }

        let body = self
            .description
            .as_deref()
            .filter(|x| !x.is_empty())
            .unwrap_or_else(|| self.status.phrase())
            .to_string();

        Response::new(body).with_status(self.status.clone())
    }
}

impl fmt::Display for HttpException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(description) => write!(f, "{}: {description}", self.status),
            None => write!(f, "{}", self.status),
        }
    }
}

impl std::error::Error for HttpException {}

impl From<HttpException> for Response {
    fn from(value: HttpException) -> Self {
        value.to_response()
    }
}

/// Stop the view with an HTTP error.
///
/// ```rust
/// use miroslava::{Error, abort};
///
/// fn brew(drink: &str) -> Result<String, Error> {
///     if drink == "coffee" {
///         return Err(abort(418));
///     }
///     Ok(format!("Let's have some {drink}!"))
/// }
///
/// assert!(brew("coffee").is_err());
/// ```
#[must_use]
pub fn abort(status: impl Into<Status>) -> Error {
    HttpException::new(status).into()
}

#[cfg(test)]
mod tests {
    use miroslava_http_models::StatusCode;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test_log::test]
    fn body_defaults_to_reason_phrase() {
        let response = HttpException::new(418).to_response();
        assert_eq!(response.status_code(), 418);
        assert_eq!(response.text(), "I'm a Teapot");
    }

    #[test_log::test]
    fn description_replaces_reason_phrase() {
        let exception = HttpException::new(StatusCode::BadRequest).with_description("Missing name");
        assert_eq!(exception.to_response().text(), "Missing name");
        assert_eq!(exception.to_string(), "400 Bad Request: Missing name");
    }

    #[test_log::test]
    fn custom_response_is_used_verbatim() {
        let exception = HttpException::new(403)
            .with_response(Response::new("go away").with_status(403).with_header("X-Reason", "nope"));
        let response = exception.to_response();
        assert_eq!(response.text(), "go away");
        assert_eq!(response.headers().get("x-reason"), Some("nope"));
    }

    #[test_log::test]
    fn abort_wraps_exception() {
        assert!(matches!(abort(404), Error::Http(e) if e.status().code() == 404));
    }
}
