use std::{borrow::Cow, fmt, ops::RangeInclusive, str::FromStr};

use crate::StatusCode;

/// Codes that fit the three digit status line field.
pub const STATUS_CODE_RANGE: RangeInclusive<u16> = 100..=999;

#[derive(Debug, thiserror::Error)]
#[error("Status must start with an integer code between 100 and 999, got '{0}'")]
pub struct InvalidStatusError(pub String);

/// Status line value of a response: a numeric code plus reason phrase.
///
/// Codes without a known reason phrase are allowed and display as the bare
/// number. Codes outside [`STATUS_CODE_RANGE`] become
/// `500 Internal Server Error`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Status {
    code: u16,
    phrase: Cow<'static, str>,
}

impl Status {
    #[must_use]
    pub fn new(code: u16, phrase: impl Into<Cow<'static, str>>) -> Self {
        if !STATUS_CODE_RANGE.contains(&code) {
            return StatusCode::InternalServerError.into();
        }
        Self {
            code,
            phrase: phrase.into(),
        }
    }

    #[must_use]
    pub const fn code(&self) -> u16 {
        self.code
    }

    #[must_use]
    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    /// The matching [`StatusCode`], if the code is a known one.
    #[must_use]
    pub fn status_code(&self) -> Option<StatusCode> {
        StatusCode::try_from(self.code).ok()
    }

    /// Parses `"404"` or `"404 Custom Phrase"`.
    ///
    /// A missing phrase is filled in from the known reason phrases.
    ///
    /// # Errors
    ///
    /// * If the value doesn't start with an integer code
    pub fn parse(value: &str) -> Result<Self, InvalidStatusError> {
        let value = value.trim();
        let (code, phrase) = value
            .split_once(' ')
            .map_or((value, ""), |(code, phrase)| (code, phrase.trim()));

        let code = code
            .parse::<u16>()
            .ok()
            .filter(|x| STATUS_CODE_RANGE.contains(x))
            .ok_or_else(|| InvalidStatusError(value.to_string()))?;

        if phrase.is_empty() {
            Ok(Self::from(code))
        } else {
            Ok(Self::new(code, phrase.to_string()))
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        StatusCode::Ok.into()
    }
}

impl From<u16> for Status {
    fn from(code: u16) -> Self {
        let phrase = StatusCode::try_from(code).map_or("", |x| x.reason_phrase());
        Self::new(code, phrase)
    }
}

/// Integer literals default to `i32`. Values outside the `u16` range become
/// `500 Internal Server Error`.
impl From<i32> for Status {
    fn from(code: i32) -> Self {
        u16::try_from(code).map_or_else(|_| StatusCode::InternalServerError.into(), Self::from)
    }
}

impl From<StatusCode> for Status {
    fn from(value: StatusCode) -> Self {
        Self {
            code: value.as_u16(),
            phrase: value.reason_phrase().into(),
        }
    }
}

impl FromStr for Status {
    type Err = InvalidStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.phrase.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} {}", self.code, self.phrase)
        }
    }
}

impl PartialEq<u16> for Status {
    fn eq(&self, other: &u16) -> bool {
        self.code == *other
    }
}

impl PartialEq<StatusCode> for Status {
    fn eq(&self, other: &StatusCode) -> bool {
        self.code == other.as_u16()
    }
}
