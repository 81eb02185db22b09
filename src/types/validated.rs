//! Validated string types that enforce invariants at construction time

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Validation errors for configuration values
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("hostname cannot be empty or whitespace")]
    EmptyHostName,

    #[error("invalid hostname: {0}")]
    InvalidHostName(String),

    #[error("scheme cannot be empty or whitespace")]
    EmptyScheme,

    #[error("port cannot be 0")]
    InvalidPort,

    #[error("limit cannot be 0")]
    ZeroLimit,

    #[error("not a number: {0}")]
    InvalidNumber(String),

    #[error("unknown selection strategy: {0}")]
    UnknownStrategy(String),
}

/// Declares a string newtype that is checked, and optionally normalized,
/// on construction
///
/// `check` runs on the normalized value. Deserialization goes through
/// `TryFrom<String>`, so a bad value fails config loading instead of
/// reaching the pool.
macro_rules! validated_string {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            normalize: $normalize:expr,
            check: $check:expr $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        $vis struct $name(String);

        impl $name {
            pub fn new(value: String) -> Result<Self, ValidationError> {
                let normalize: fn(String) -> String = $normalize;
                let check: fn(&str) -> Result<(), ValidationError> = $check;
                let value = normalize(value);
                check(&value)?;
                Ok(Self(value))
            }

            #[must_use]
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;

            #[inline]
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

fn check_host(host: &str) -> Result<(), ValidationError> {
    if host.is_empty() {
        Err(ValidationError::EmptyHostName)
    } else if host.chars().any(char::is_whitespace) {
        Err(ValidationError::InvalidHostName(host.to_string()))
    } else {
        Ok(())
    }
}

fn check_scheme(scheme: &str) -> Result<(), ValidationError> {
    if scheme.is_empty() {
        return Err(ValidationError::EmptyScheme);
    }
    Ok(())
}

validated_string! {
    /// Destination host: a name or address without whitespace
    ///
    /// Surrounding whitespace is trimmed.
    ///
    /// # Examples
    /// ```
    /// use muxpool::types::HostName;
    ///
    /// let host = HostName::new(" api.example.com ".to_string()).unwrap();
    /// assert_eq!(host.as_str(), "api.example.com");
    ///
    /// assert!(HostName::new("".to_string()).is_err());
    /// assert!(HostName::new("   ".to_string()).is_err());
    /// assert!(HostName::new("bad host".to_string()).is_err());
    /// ```
    #[doc(alias = "host")]
    pub struct HostName {
        normalize: |s| s.trim().to_string(),
        check: check_host,
    }
}

validated_string! {
    /// A URI scheme such as `http` or `h2c`, stored lowercase
    pub struct SchemeName {
        normalize: |s| s.trim().to_ascii_lowercase(),
        check: check_scheme,
    }
}

impl SchemeName {
    /// The `http` scheme
    #[must_use]
    pub fn http() -> Self {
        Self("http".to_string())
    }
}

impl Default for SchemeName {
    fn default() -> Self {
        Self::http()
    }
}

impl Default for HostName {
    fn default() -> Self {
        Self("localhost".to_string())
    }
}
