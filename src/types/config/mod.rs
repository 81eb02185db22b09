//! Non-zero configuration values
//!
//! Pool limits that must never be zero are enforced at the type level with
//! `NonZero*` wrappers, so a pool can never be configured with zero
//! connections or zero multiplex capacity.

/// Declares a `NonZero*`-backed limit
///
/// Generates `new`/`get`, `Display`, conversion to the primitive, string
/// parsing (`zero` names the [`ValidationError`](crate::types::ValidationError)
/// returned for `0`) and serde support that rejects zero at load time.
macro_rules! nonzero_newtype {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident($nonzero:ty : $primitive:ty, serialize as $ser_fn:ident, zero => $zero:ident);
    ) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        $vis struct $name($nonzero);

        impl $name {
            /// `None` for zero
            #[must_use]
            pub const fn new(value: $primitive) -> Option<Self> {
                match <$nonzero>::new(value) {
                    Some(nz) => Some(Self(nz)),
                    None => None,
                }
            }

            #[must_use]
            #[inline]
            pub const fn get(&self) -> $primitive {
                self.0.get()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<$name> for $primitive {
            fn from(val: $name) -> Self {
                val.get()
            }
        }

        impl TryFrom<$primitive> for $name {
            type Error = $crate::types::ValidationError;

            fn try_from(value: $primitive) -> Result<Self, Self::Error> {
                Self::new(value).ok_or($crate::types::ValidationError::$zero)
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::types::ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value = s.trim().parse::<$primitive>().map_err(|_| {
                    $crate::types::ValidationError::InvalidNumber(s.to_string())
                })?;
                Self::try_from(value)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.$ser_fn(self.get() as _)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = <$primitive>::deserialize(deserializer)?;
                Self::try_from(value).map_err(|e| {
                    serde::de::Error::custom(format_args!("{}: {e}", stringify!($name)))
                })
            }
        }
    };
}

mod limits;
mod network;

pub use limits::{MaxConnections, MaxMultiplex};
pub use network::Port;
