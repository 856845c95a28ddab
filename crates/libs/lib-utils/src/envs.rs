//! # Environment Variables
//!
//! Typed access to the `GREENSTAKE_*` environment variables.

use std::env;
use std::str::FromStr;

/// Get a required environment variable by name.
pub fn get_env(name: &'static str) -> Result<String, Error> {
    env::var(name).map_err(|_| Error::MissingEnv(name))
}

/// Get an optional environment variable. Empty values count as unset.
pub fn get_env_opt(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Get and parse an environment variable, falling back to `default` when unset.
///
/// A value that is present but unparsable is still an error.
pub fn get_env_parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, Error> {
    match get_env_opt(name) {
        Some(val) => val.trim().parse::<T>().map_err(|_| Error::WrongFormat(name)),
        None => Ok(default),
    }
}

// region:    --- Error
#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    MissingEnv(&'static str),
    WrongFormat(&'static str),
}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::MissingEnv(name) => write!(fmt, "{name} must be set in environment"),
            Error::WrongFormat(name) => write!(fmt, "{name} has an invalid format"),
        }
    }
}

impl std::error::Error for Error {}
// endregion: --- Error

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_variable_is_reported_by_name() {
        let err = get_env("GREENSTAKE_TEST_DEFINITELY_UNSET").unwrap_err();
        assert_eq!(err, Error::MissingEnv("GREENSTAKE_TEST_DEFINITELY_UNSET"));
        assert!(err.to_string().contains("GREENSTAKE_TEST_DEFINITELY_UNSET"));
    }

    #[test]
    fn parse_or_falls_back_when_unset() {
        let value: u64 = get_env_parse_or("GREENSTAKE_TEST_UNSET_INTERVAL", 30).unwrap();
        assert_eq!(value, 30);
    }

    #[test]
    fn parse_or_rejects_garbage() {
        env::set_var("GREENSTAKE_TEST_BAD_INTERVAL", "thirty");
        let result: Result<u64, _> = get_env_parse_or("GREENSTAKE_TEST_BAD_INTERVAL", 30);
        assert_eq!(result, Err(Error::WrongFormat("GREENSTAKE_TEST_BAD_INTERVAL")));
        env::remove_var("GREENSTAKE_TEST_BAD_INTERVAL");
    }
}
