//! Pool size and multiplex limits

use std::num::NonZeroUsize;

nonzero_newtype! {
    /// A non-zero maximum number of entries in one pool
    ///
    /// Counts pending and active entries together, so a pool can never
    /// open more connections to its destination than this.
    ///
    /// # Examples
    /// ```
    /// use muxpool::types::MaxConnections;
    ///
    /// let max = MaxConnections::new(10).unwrap();
    /// assert_eq!(max.get(), 10);
    ///
    /// assert!(MaxConnections::new(0).is_none());
    /// ```
    #[doc(alias = "pool_size")]
    #[doc(alias = "connection_limit")]
    pub struct MaxConnections(NonZeroUsize: usize, serialize as serialize_u64, zero => ZeroLimit);
}

impl MaxConnections {
    /// Default maximum connections per destination
    pub const DEFAULT: Self = Self(NonZeroUsize::new(64).unwrap());
}

impl Default for MaxConnections {
    fn default() -> Self {
        Self::DEFAULT
    }
}

nonzero_newtype! {
    /// A non-zero number of concurrent requests one connection carries
    ///
    /// Used as the default capacity of entries whose connection does not
    /// report its own limit.
    ///
    /// # Examples
    /// ```
    /// use muxpool::types::MaxMultiplex;
    ///
    /// let multiplex = MaxMultiplex::new(100).unwrap();
    /// assert_eq!(multiplex.get(), 100);
    ///
    /// assert!(MaxMultiplex::new(0).is_none());
    /// ```
    #[doc(alias = "max_concurrent_streams")]
    pub struct MaxMultiplex(NonZeroUsize: usize, serialize as serialize_u64, zero => ZeroLimit);
}

impl MaxMultiplex {
    /// Default multiplex when a connection does not report one
    pub const DEFAULT: Self = Self(NonZeroUsize::new(16).unwrap());

    /// One request at a time
    pub const SINGLE: Self = Self(NonZeroUsize::new(1).unwrap());
}

impl Default for MaxMultiplex {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValidationError;

    mod max_connections {
        use super::*;
        crate::test_nonzero_newtype_full!(
            MaxConnections,
            default: 64,
            test_value: 8,
            ordering: (8, 256),
            from_str: ("32", 32, "lots")
        );
    }

    mod max_multiplex {
        use super::*;
        crate::test_nonzero_newtype!(MaxMultiplex, 16, 128);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("12".parse::<MaxConnections>().unwrap().get(), 12);
        assert_eq!(" 3 ".parse::<MaxMultiplex>().unwrap().get(), 3);
    }

    #[test]
    fn test_from_str_rejects_zero() {
        assert_eq!(
            "0".parse::<MaxMultiplex>().unwrap_err(),
            ValidationError::ZeroLimit
        );
    }

    #[test]
    fn test_from_str_rejects_garbage() {
        assert!(matches!(
            "many".parse::<MaxConnections>(),
            Err(ValidationError::InvalidNumber(_))
        ));
    }

    #[test]
    fn test_deserialize_rejects_zero() {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            #[allow(dead_code)]
            value: MaxMultiplex,
        }
        let result: Result<Wrapper, _> = toml::from_str("value = 0");
        assert!(result.is_err());
    }
}
