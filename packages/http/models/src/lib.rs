#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! HTTP value types shared by the Miroslava crates.
//!
//! * [`Method`] is the request method of an incoming request.
//! * [`StatusCode`] enumerates the status codes Miroslava knows a reason
//!   phrase for.
//! * [`Status`] is the status line value carried by a response. Unlike
//!   [`StatusCode`] it can hold any numeric code and a custom phrase.

mod status;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString};

pub use status::{InvalidStatusError, STATUS_CODE_RANGE, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumString, AsRefStr)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Connect,
    Trace,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown HTTP status code {0}")]
pub struct TryFromU16StatusCodeError(pub u16);

macro_rules! status_codes {
    ($($variant:ident = $code:literal, $phrase:literal;)+) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumString, AsRefStr, EnumIter,
        )]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        #[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
        #[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
        pub enum StatusCode {
            $($variant,)+
        }

        impl StatusCode {
            #[must_use]
            pub const fn as_u16(&self) -> u16 {
                match self {
                    $(Self::$variant => $code,)+
                }
            }

            /// Standard reason phrase, e.g. `"Not Found"` for `404`.
            #[must_use]
            pub const fn reason_phrase(&self) -> &'static str {
                match self {
                    $(Self::$variant => $phrase,)+
                }
            }
        }

        impl TryFrom<u16> for StatusCode {
            type Error = TryFromU16StatusCodeError;

            fn try_from(value: u16) -> Result<Self, Self::Error> {
                Ok(match value {
                    $($code => Self::$variant,)+
                    _ => {
                        return Err(TryFromU16StatusCodeError(value));
                    }
                })
            }
        }
    };
}

status_codes! {
    Continue = 100, "Continue";
    SwitchingProtocols = 101, "Switching Protocols";
    Processing = 102, "Processing";
    EarlyHints = 103, "Early Hints";
    Ok = 200, "OK";
    Created = 201, "Created";
    Accepted = 202, "Accepted";
    NonAuthoritativeInformation = 203, "Non-Authoritative Information";
    NoContent = 204, "No Content";
    ResetContent = 205, "Reset Content";
    PartialContent = 206, "Partial Content";
    MultiStatus = 207, "Multi-Status";
    AlreadyReported = 208, "Already Reported";
    ImUsed = 226, "IM Used";
    MultipleChoices = 300, "Multiple Choices";
    MovedPermanently = 301, "Moved Permanently";
    Found = 302, "Found";
    SeeOther = 303, "See Other";
    NotModified = 304, "Not Modified";
    UseProxy = 305, "Use Proxy";
    SwitchProxy = 306, "Switch Proxy";
    TemporaryRedirect = 307, "Temporary Redirect";
    PermanentRedirect = 308, "Permanent Redirect";
    BadRequest = 400, "Bad Request";
    Unauthorized = 401, "Unauthorized";
    PaymentRequired = 402, "Payment Required";
    Forbidden = 403, "Forbidden";
    NotFound = 404, "Not Found";
    MethodNotAllowed = 405, "Method Not Allowed";
    NotAcceptable = 406, "Not Acceptable";
    ProxyAuthenticationRequired = 407, "Proxy Authentication Required";
    RequestTimeout = 408, "Request Timeout";
    Conflict = 409, "Conflict";
    Gone = 410, "Gone";
    LengthRequired = 411, "Length Required";
    PreconditionFailed = 412, "Precondition Failed";
    RequestEntityTooLarge = 413, "Request Entity Too Large";
    RequestUriTooLong = 414, "Request-URI Too Long";
    UnsupportedMediaType = 415, "Unsupported Media Type";
    RequestedRangeNotSatisfiable = 416, "Requested Range Not Satisfiable";
    ExpectationFailed = 417, "Expectation Failed";
    ImATeapot = 418, "I'm a Teapot";
    MisdirectedRequest = 421, "Misdirected Request";
    UnprocessableEntity = 422, "Unprocessable Entity";
    Locked = 423, "Locked";
    FailedDependency = 424, "Failed Dependency";
    TooEarly = 425, "Too Early";
    UpgradeRequired = 426, "Upgrade Required";
    PreconditionRequired = 428, "Precondition Required";
    TooManyRequests = 429, "Too Many Requests";
    RequestHeaderFieldsTooLarge = 431, "Request Header Fields Too Large";
    RetryWith = 449, "Retry With";
    UnavailableForLegalReasons = 451, "Unavailable For Legal Reasons";
    InternalServerError = 500, "Internal Server Error";
    NotImplemented = 501, "Not Implemented";
    BadGateway = 502, "Bad Gateway";
    ServiceUnavailable = 503, "Service Unavailable";
    GatewayTimeout = 504, "Gateway Timeout";
    HttpVersionNotSupported = 505, "HTTP Version Not Supported";
    VariantAlsoNegotiates = 506, "Variant Also Negotiates";
    InsufficientStorage = 507, "Insufficient Storage";
    LoopDetected = 508, "Loop Detected";
    NotExtended = 510, "Not Extended";
    NetworkAuthenticationRequired = 511, "Network Authentication Required";
}

impl From<StatusCode> for u16 {
    fn from(value: StatusCode) -> Self {
        value.as_u16()
    }
}

impl StatusCode {
    /// Check if status is within 100-199.
    #[inline]
    #[must_use]
    pub const fn is_informational(&self) -> bool {
        matches!(self.as_u16(), 100..200)
    }

    /// Check if status is within 200-299.
    #[inline]
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.as_u16(), 200..300)
    }

    /// Check if status is within 300-399.
    #[inline]
    #[must_use]
    pub const fn is_redirection(&self) -> bool {
        matches!(self.as_u16(), 300..400)
    }

    /// Check if status is within 400-499.
    #[inline]
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self.as_u16(), 400..500)
    }

    /// Check if status is within 500-599.
    #[inline]
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(self.as_u16(), 500..600)
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.reason_phrase())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator as _;

    use super::*;

    #[test_log::test]
    fn method_parses_case_insensitively() {
        assert_eq!(Method::from_str("get").unwrap(), Method::Get);
        assert_eq!(Method::from_str("PATCH").unwrap(), Method::Patch);
        assert_eq!(Method::from_str("Options").unwrap(), Method::Options);
        assert!(Method::from_str("BREW").is_err());
    }

    #[test_log::test]
    fn method_displays_upper_case() {
        assert_eq!(Method::Delete.to_string(), "DELETE");
        assert_eq!(Method::Get.as_ref(), "GET");
    }

    #[test_log::test]
    fn every_status_code_round_trips_through_u16() {
        for code in StatusCode::iter() {
            assert_eq!(StatusCode::try_from(code.as_u16()).unwrap(), code);
        }
    }

    #[test_log::test]
    fn unknown_status_code_is_rejected() {
        let err = StatusCode::try_from(799).unwrap_err();
        assert_eq!(err.0, 799);
    }

    #[test_log::test]
    fn status_code_display_includes_reason_phrase() {
        assert_eq!(StatusCode::NotFound.to_string(), "404 Not Found");
        assert_eq!(StatusCode::ImATeapot.reason_phrase(), "I'm a Teapot");
    }

    #[test_log::test]
    fn status_code_classes() {
        assert!(StatusCode::EarlyHints.is_informational());
        assert!(StatusCode::NoContent.is_success());
        assert!(StatusCode::Found.is_redirection());
        assert!(StatusCode::MethodNotAllowed.is_client_error());
        assert!(StatusCode::BadGateway.is_server_error());
        assert!(!StatusCode::Ok.is_client_error());
    }
}
