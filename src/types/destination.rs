//! Pool destination identity

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{HostName, Port, SchemeName};

/// The remote endpoint a pool is bound to
///
/// Opaque to the pool beyond being a key and a label in logs; it is handed
/// to the [`ConnectionFactory`](crate::pool::ConnectionFactory) unchanged.
///
/// # Examples
/// ```
/// use muxpool::types::{Destination, HostName, Port, SchemeName};
///
/// let dest = Destination::new(
///     SchemeName::new("https".to_string()).unwrap(),
///     HostName::new("api.example.com".to_string()).unwrap(),
///     Port::HTTPS,
/// );
/// assert_eq!(dest.to_string(), "https://api.example.com:443");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    scheme: SchemeName,
    host: HostName,
    port: Port,
}

impl Destination {
    #[must_use]
    pub fn new(scheme: SchemeName, host: HostName, port: Port) -> Self {
        Self { scheme, host, port }
    }

    #[must_use]
    #[inline]
    pub fn scheme(&self) -> &SchemeName {
        &self.scheme
    }

    #[must_use]
    #[inline]
    pub fn host(&self) -> &HostName {
        &self.host
    }

    #[must_use]
    #[inline]
    pub fn port(&self) -> Port {
        self.port
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}
