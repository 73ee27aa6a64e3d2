#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error;

#[derive(Debug, Error)]
#[error("Invalid boolean value '{0}'")]
pub struct ParseBoolError(pub String);

/// Parse the usual spellings of a boolean flag.
///
/// `1`, `true`, `yes`, `on` are `true`; `0`, `false`, `no`, `off` and the
/// empty string are `false`. Case is ignored.
///
/// # Errors
///
/// * If the value is none of the accepted spellings
pub fn parse_bool(value: &str) -> Result<bool, ParseBoolError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ParseBoolError(value.to_string())),
    }
}

/// # Errors
///
/// * If the variable is set to an unrecognized boolean value
pub fn option_env_bool(name: &str) -> Result<Option<bool>, ParseBoolError> {
    match std::env::var(name) {
        Ok(value) => Ok(Some(parse_bool(&value)?)),
        Err(_) => Ok(None),
    }
}

#[must_use]
pub fn default_env_bool(name: &str, default: bool) -> bool {
    option_env_bool(name).ok().flatten().unwrap_or(default)
}

#[derive(Debug, Error)]
pub enum OptionEnvU16Error {
    #[error(transparent)]
    ParseInt(#[from] std::num::ParseIntError),
}

/// # Errors
///
/// * If encounters an invalid digit in the value
pub fn option_env_u16(name: &str) -> Result<Option<u16>, OptionEnvU16Error> {
    match std::env::var(name) {
        Ok(value) => Ok(Some(value.trim().parse::<u16>()?)),
        Err(_) => Ok(None),
    }
}

#[must_use]
pub fn default_env(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

#[macro_export]
macro_rules! default_env {
    ($name:expr, $default:expr $(,)?) => {
        match option_env!($name) {
            Some(v) => v,
            None => $default,
        }
    };
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    use super::*;

    #[test_log::test]
    fn parse_bool_accepts_common_spellings() {
        for value in ["1", "true", "TRUE", "yes", "On"] {
            assert!(parse_bool(value).unwrap(), "{value}");
        }
        for value in ["0", "false", "No", "off", ""] {
            assert!(!parse_bool(value).unwrap(), "{value}");
        }
    }

    #[test_log::test]
    fn parse_bool_rejects_garbage() {
        let err = parse_bool("maybe").unwrap_err();
        assert_eq!(err.0, "maybe");
    }

    #[test_log::test]
    #[serial]
    fn option_env_bool_reads_variable() {
        // SAFETY: serialized with every other test touching the environment
        unsafe { std::env::set_var("MIROSLAVA_ENV_UTILS_TEST_BOOL", "yes") };
        assert_eq!(option_env_bool("MIROSLAVA_ENV_UTILS_TEST_BOOL").unwrap(), Some(true));

        // SAFETY: see above
        unsafe { std::env::remove_var("MIROSLAVA_ENV_UTILS_TEST_BOOL") };
        assert_eq!(option_env_bool("MIROSLAVA_ENV_UTILS_TEST_BOOL").unwrap(), None);
        assert!(default_env_bool("MIROSLAVA_ENV_UTILS_TEST_BOOL", true));
    }

    #[test_log::test]
    #[serial]
    fn option_env_u16_parses_port() {
        // SAFETY: serialized with every other test touching the environment
        unsafe { std::env::set_var("MIROSLAVA_ENV_UTILS_TEST_PORT", "9001") };
        assert_eq!(option_env_u16("MIROSLAVA_ENV_UTILS_TEST_PORT").unwrap(), Some(9001));

        // SAFETY: see above
        unsafe { std::env::set_var("MIROSLAVA_ENV_UTILS_TEST_PORT", "not-a-port") };
        assert!(option_env_u16("MIROSLAVA_ENV_UTILS_TEST_PORT").is_err());

        // SAFETY: see above
        unsafe { std::env::remove_var("MIROSLAVA_ENV_UTILS_TEST_PORT") };
    }

    #[test_log::test]
    fn default_env_falls_back() {
        assert_eq!(
            default_env("MIROSLAVA_ENV_UTILS_TEST_UNSET", "fallback"),
            "fallback"
        );
        assert_eq!(default_env!("MIROSLAVA_ENV_UTILS_TEST_UNSET", "compiled"), "compiled");
    }
}
