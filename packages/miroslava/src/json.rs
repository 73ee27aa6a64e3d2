use std::io::{Read, Write};

use serde::Serialize;
use serde_json::Value;

use crate::{Error, ctx, response::Response};

pub const JSON_MIMETYPE: &str = "application/json";

/// JSON (de)serialization used by an application.
///
/// Install a custom one with [`crate::Miroslava::with_json_provider`].
pub trait JsonProvider: Send + Sync {
    /// # Errors
    ///
    /// * If the value fails to serialize
    fn dumps(&self, value: &Value) -> Result<String, serde_json::Error>;

    /// # Errors
    ///
    /// * If the input is not valid JSON
    fn loads(&self, input: &str) -> Result<Value, serde_json::Error>;

    /// # Errors
    ///
    /// * If the value fails to serialize
    /// * If writing to `writer` fails
    fn dump(&self, value: &Value, writer: &mut dyn Write) -> Result<(), serde_json::Error> {
        writer
            .write_all(self.dumps(value)?.as_bytes())
            .map_err(serde_json::Error::io)
    }

    /// # Errors
    ///
    /// * If reading from `reader` fails
    /// * If the input is not valid JSON
    fn load(&self, reader: &mut dyn Read) -> Result<Value, serde_json::Error> {
        let mut input = String::new();
        reader
            .read_to_string(&mut input)
            .map_err(serde_json::Error::io)?;
        self.loads(&input)
    }

    fn mimetype(&self) -> &str {
        JSON_MIMETYPE
    }

    /// Serialize `value` into a response body.
    ///
    /// # Errors
    ///
    /// * If the value fails to serialize
    fn response(&self, value: &Value) -> Result<Response, serde_json::Error> {
        Ok(Response::new(self.dumps(value)?).with_mimetype(self.mimetype()))
    }
}

/// The provider used unless the app installs another one.
///
/// Responses are pretty-printed with a 2 space indent unless `compact` is
/// `Some(true)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultJsonProvider {
    pub compact: Option<bool>,
}

impl DefaultJsonProvider {
    #[must_use]
    pub const fn new(compact: Option<bool>) -> Self {
        Self { compact }
    }
}

impl JsonProvider for DefaultJsonProvider {
    fn dumps(&self, value: &Value) -> Result<String, serde_json::Error> {
        serde_json::to_string(value)
    }

    fn loads(&self, input: &str) -> Result<Value, serde_json::Error> {
        serde_json::from_str(input)
    }

    fn response(&self, value: &Value) -> Result<Response, serde_json::Error> {
        let body = if self.compact == Some(true) {
            serde_json::to_string(value)?
        } else {
            serde_json::to_string_pretty(value)?
        };
        Ok(Response::new(body).with_mimetype(self.mimetype()))
    }
}

/// Serialize `value` into a JSON response.
///
/// Uses the provider of the current app, or [`DefaultJsonProvider`] outside
/// an application context.
///
/// # Errors
///
/// * If the value fails to serialize
pub fn jsonify(value: &impl Serialize) -> Result<Response, Error> {
    let value = serde_json::to_value(value)?;
    let response = match ctx::current_app() {
        Ok(app) => app.json_provider().response(&value)?,
        Err(_) => DefaultJsonProvider::default().response(&value)?,
    };
    Ok(response)
}
