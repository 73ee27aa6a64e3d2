//! View functions and the values they may return.
//!
//! A view is any `Fn(ViewArgs) -> impl Future<Output = Result<R, Error>>`
//! where `R` implements [`IntoResponse`]. Besides a full [`Response`], views
//! may return a body (`&str`, `String`, `Vec<u8>`, `Bytes`, a JSON
//! [`Value`]) or a tuple adding a status and/or headers:
//!
//! * `(body, status)`
//! * `(body, headers)`
//! * `(body, status, headers)`
//!
//! where the status is a `u16`, [`StatusCode`], [`Status`] or a status line
//! like `"404 Not Found"`.

use std::{collections::BTreeMap, future::Future, pin::Pin, sync::Arc};

use bytes::Bytes;
use miroslava_datastructures::Headers;
use miroslava_http_models::{InvalidStatusError, Status, StatusCode};
use serde_json::Value;

use crate::{
    Error,
    request::Request,
    response::Response,
    routing::{UrlValue, UrlValues},
};

pub type ViewFuture = Pin<Box<dyn Future<Output = Result<ReturnValue, Error>> + Send>>;
pub type ViewFunction = Arc<dyn Fn(ViewArgs) -> ViewFuture + Send + Sync>;

/// Arguments passed to a view: the URL variables of the matched rule
/// (defaults included) and the current request.
#[derive(Debug, Clone)]
pub struct ViewArgs {
    values: UrlValues,
    request: Arc<Request>,
}

impl ViewArgs {
    #[must_use]
    pub const fn new(values: UrlValues, request: Arc<Request>) -> Self {
        Self { values, request }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&UrlValue> {
        self.values.get(name)
    }

    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(UrlValue::as_str)
    }

    #[must_use]
    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(UrlValue::as_int)
    }

    #[must_use]
    pub const fn values(&self) -> &UrlValues {
        &self.values
    }

    #[must_use]
    pub const fn request(&self) -> &Arc<Request> {
        &self.request
    }
}

pub trait IntoView {
    fn into_view(self) -> ViewFunction;
}

impl<F, Fut, R> IntoView for F
where
    F: Fn(ViewArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: IntoResponse + 'static,
{
    fn into_view(self) -> ViewFunction {
        Arc::new(move |args: ViewArgs| -> ViewFuture {
            let future = (self)(args);
            Box::pin(async move { future.await?.into_return_value() })
        })
    }
}

/// Body part of a [`ReturnValue`].
#[derive(Debug, Clone)]
pub enum ResponseBody {
    Response(Box<Response>),
    Data(Bytes),
    Json(Value),
}

/// A view return value split into its parts, before it's turned into a
/// [`Response`] by [`crate::Miroslava::make_response`].
#[derive(Debug, Clone)]
pub struct ReturnValue {
    pub body: ResponseBody,
    pub status: Option<Status>,
    pub headers: Option<Headers>,
}

impl ReturnValue {
    #[must_use]
    pub const fn new(body: ResponseBody) -> Self {
        Self {
            body,
            status: None,
            headers: None,
        }
    }
}

pub trait IntoResponse {
    /// # Errors
    ///
    /// * If the status part of the value is not a valid status
    fn into_return_value(self) -> Result<ReturnValue, Error>;
}

impl IntoResponse for ReturnValue {
    fn into_return_value(self) -> Result<ReturnValue, Error> {
        Ok(self)
    }
}

pub trait IntoBody {
    fn into_body(self) -> ResponseBody;
}

impl IntoBody for Response {
    fn into_body(self) -> ResponseBody {
        ResponseBody::Response(Box::new(self))
    }
}

impl IntoBody for &str {
    fn into_body(self) -> ResponseBody {
        ResponseBody::Data(Bytes::copy_from_slice(self.as_bytes()))
    }
}

impl IntoBody for String {
    fn into_body(self) -> ResponseBody {
        ResponseBody::Data(self.into())
    }
}

impl IntoBody for Vec<u8> {
    fn into_body(self) -> ResponseBody {
        ResponseBody::Data(self.into())
    }
}

impl IntoBody for Bytes {
    fn into_body(self) -> ResponseBody {
        ResponseBody::Data(self)
    }
}

impl IntoBody for Value {
    fn into_body(self) -> ResponseBody {
        ResponseBody::Json(self)
    }
}

pub trait IntoStatus {
    /// # Errors
    ///
    /// * If the value is a status line without a leading integer code
    fn into_status(self) -> Result<Status, InvalidStatusError>;
}

impl IntoStatus for u16 {
    fn into_status(self) -> Result<Status, InvalidStatusError> {
        Ok(self.into())
    }
}

impl IntoStatus for i32 {
    fn into_status(self) -> Result<Status, InvalidStatusError> {
        Ok(self.into())
    }
}

impl IntoStatus for StatusCode {
    fn into_status(self) -> Result<Status, InvalidStatusError> {
        Ok(self.into())
    }
}

impl IntoStatus for Status {
    fn into_status(self) -> Result<Status, InvalidStatusError> {
        Ok(self)
    }
}

impl IntoStatus for &str {
    fn into_status(self) -> Result<Status, InvalidStatusError> {
        Status::parse(self)
    }
}

/// A header value; lists are joined with `", "`.
pub trait IntoHeaderValue {
    fn into_header_value(self) -> String;
}

impl IntoHeaderValue for &str {
    fn into_header_value(self) -> String {
        self.to_string()
    }
}

impl IntoHeaderValue for String {
    fn into_header_value(self) -> String {
        self
    }
}

impl<T: AsRef<str>> IntoHeaderValue for Vec<T> {
    fn into_header_value(self) -> String {
        self.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", ")
    }
}

impl<T: AsRef<str>, const N: usize> IntoHeaderValue for [T; N] {
    fn into_header_value(self) -> String {
        self.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", ")
    }
}

pub trait IntoHeaders {
    fn into_headers(self) -> Headers;
}

impl IntoHeaders for Headers {
    fn into_headers(self) -> Headers {
        self
    }
}

impl<K: Into<String>, V: IntoHeaderValue> IntoHeaders for Vec<(K, V)> {
    fn into_headers(self) -> Headers {
        self.into_iter()
            .map(|(k, v)| (k.into(), v.into_header_value()))
            .collect()
    }
}

impl<K: Into<String>, V: IntoHeaderValue, const N: usize> IntoHeaders for [(K, V); N] {
    fn into_headers(self) -> Headers {
        self.into_iter()
            .map(|(k, v)| (k.into(), v.into_header_value()))
            .collect()
    }
}

impl<K: Into<String>, V: IntoHeaderValue> IntoHeaders for BTreeMap<K, V> {
    fn into_headers(self) -> Headers {
        self.into_iter()
            .map(|(k, v)| (k.into(), v.into_header_value()))
            .collect()
    }
}

macro_rules! impl_into_response_for_body {
    ($($body:ty),+ $(,)?) => {
        $(
            impl IntoResponse for $body {
                fn into_return_value(self) -> Result<ReturnValue, Error> {
                    Ok(ReturnValue::new(self.into_body()))
                }
            }
        )+
    };
}

impl_into_response_for_body!(Response, &str, String, Vec<u8>, Bytes, Value);

macro_rules! impl_into_response_with_status {
    ($($status:ty),+ $(,)?) => {
        $(
            impl<B: IntoBody> IntoResponse for (B, $status) {
                fn into_return_value(self) -> Result<ReturnValue, Error> {
                    let (body, status) = self;
                    Ok(ReturnValue {
                        body: body.into_body(),
                        status: Some(status.into_status()?),
                        headers: None,
                    })
                }
            }
        )+
    };
}

impl_into_response_with_status!(u16, i32, StatusCode, Status, &str);

impl<B: IntoBody> IntoResponse for (B, Headers) {
    fn into_return_value(self) -> Result<ReturnValue, Error> {
        let (body, headers) = self;
        Ok(ReturnValue {
            body: body.into_body(),
            status: None,
            headers: Some(headers),
        })
    }
}

impl<B: IntoBody, K: Into<String>, V: IntoHeaderValue> IntoResponse for (B, Vec<(K, V)>) {
    fn into_return_value(self) -> Result<ReturnValue, Error> {
        let (body, headers) = self;
        Ok(ReturnValue {
            body: body.into_body(),
            status: None,
            headers: Some(headers.into_headers()),
        })
    }
}

impl<B: IntoBody, K: Into<String>, V: IntoHeaderValue, const N: usize> IntoResponse
    for (B, [(K, V); N])
{
    fn into_return_value(self) -> Result<ReturnValue, Error> {
        let (body, headers) = self;
        Ok(ReturnValue {
            body: body.into_body(),
            status: None,
            headers: Some(headers.into_headers()),
        })
    }
}

impl<B: IntoBody, K: Into<String>, V: IntoHeaderValue> IntoResponse for (B, BTreeMap<K, V>) {
    fn into_return_value(self) -> Result<ReturnValue, Error> {
        let (body, headers) = self;
        Ok(ReturnValue {
            body: body.into_body(),
            status: None,
            headers: Some(headers.into_headers()),
        })
    }
}

impl<B: IntoBody, S: IntoStatus, H: IntoHeaders> IntoResponse for (B, S, H) {
    fn into_return_value(self) -> Result<ReturnValue, Error> {
        let (body, status, headers) = self;
        Ok(ReturnValue {
            body: body.into_body(),
            status: Some(status.into_status()?),
            headers: Some(headers.into_headers()),
        })
    }
}
