#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! A lightweight, Flask-like web application framework.
//!
//! ```rust,no_run
//! use miroslava::{Error, Miroslava, RunOptions, ViewArgs};
//!
//! async fn index(_: ViewArgs) -> Result<&'static str, Error> {
//!     Ok("<h1>Hello, world!</h1>")
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut app = Miroslava::new("hello");
//! app.route("/", index)?;
//! app.run(RunOptions::default()).await?;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod config;
pub mod ctx;
pub mod environ;
pub mod exceptions;
pub mod json;
pub mod request;
pub mod response;
pub mod routing;
pub mod server;
pub mod static_files;
pub mod templating;
pub mod test_client;
pub mod view;

pub use app::{AppOptions, Miroslava};
pub use bytes::Bytes;
pub use config::Config;
pub use ctx::{current_app, g, request, session};
pub use exceptions::{HttpException, abort};
pub use json::jsonify;
pub use miroslava_datastructures::{Headers, MultiDict};
pub use miroslava_http_models::{Method, Status, StatusCode};
pub use request::Request;
pub use response::Response;
pub use routing::{RouteOptions, UrlValue};
pub use server::{MiroslavaServer, RunOptions, ServerHandle};
pub use static_files::send_from_directory;
pub use templating::{render_template, render_template_string};
pub use test_client::TestClient;
pub use view::{IntoResponse, ViewArgs};

use config::ConfigError;
use ctx::ContextError;
use miroslava_http_models::InvalidStatusError;
use routing::RoutingError;
use templating::TemplateError;
use thiserror::Error;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] HttpException),
    #[error(transparent)]
    Routing(#[from] RoutingError),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Status(#[from] InvalidStatusError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error("Unsupported request method '{0}'")]
    UnsupportedMethod(String),
    #[error("No view function registered for endpoint '{0}'")]
    MissingView(String),
    #[error("{0}")]
    View(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wrap an application error raised by a view.
    pub fn view(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::View(error.into())
    }
}

/// Turn a view return value into a [`Response`] with the current app, or
/// with the default JSON provider outside an application context.
///
/// # Errors
///
/// * If the status is invalid
/// * If a JSON body fails to serialize
pub fn make_response(rv: impl IntoResponse) -> Result<Response, Error> {
    match current_app() {
        Ok(app) => app.make_response(rv),
        Err(_) => Miroslava::new("miroslava").make_response(rv),
    }
}

/// Build the URL of `endpoint` with the current app.
///
/// ```rust,no_run
/// use miroslava::{Error, ViewArgs, url_for};
///
/// async fn profile(_: ViewArgs) -> Result<String, Error> {
///     url_for("user", [("name", "levi")])
/// }
/// ```
///
/// # Errors
///
/// * If called outside of an application context
/// * If the endpoint is unknown or the values don't fit any of its rules
pub fn url_for<K: Into<String>, V: Into<UrlValue>>(
    endpoint: &str,
    values: impl IntoIterator<Item = (K, V)>,
) -> Result<String, Error> {
    current_app()?.url_for(endpoint, values)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test_log::test]
    fn make_response_works_outside_of_context() {
        let response = make_response(("teapot", 418)).unwrap();
        assert_eq!(response.status_code(), 418);
        assert_eq!(response.text(), "teapot");
    }

    #[test_log::test]
    fn url_for_needs_an_app() {
        let err = url_for("index", Vec::<(String, UrlValue)>::new()).unwrap_err();
        assert!(matches!(err, Error::Context(ContextError::NoAppContext)));
    }

    #[test_log::test]
    fn view_errors_keep_their_message() {
        let err = Error::view("the walls have fallen");
        assert_eq!(err.to_string(), "the walls have fallen");
    }
}
