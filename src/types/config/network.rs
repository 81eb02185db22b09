//! Destination port

use std::num::NonZeroU16;

nonzero_newtype! {
    /// A validated network port number that cannot be zero
    ///
    /// # Examples
    /// ```
    /// use muxpool::types::Port;
    ///
    /// let port = Port::new(8443).unwrap();
    /// assert_eq!(port.get(), 8443);
    ///
    /// assert!(Port::new(0).is_none());
    /// ```
    #[doc(alias = "tcp_port")]
    pub struct Port(NonZeroU16: u16, serialize as serialize_u16, zero => InvalidPort);
}

impl Port {
    pub const HTTP: Self = Self(NonZeroU16::new(80).unwrap());

    pub const HTTPS: Self = Self(NonZeroU16::new(443).unwrap());

    /// Well-known port for a scheme, if there is one
    #[must_use]
    pub fn for_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "http" | "ws" => Some(Self::HTTP),
            "https" | "wss" => Some(Self::HTTPS),
            _ => None,
        }
    }
}

impl Default for Port {
    fn default() -> Self {
        Self::HTTP
    }
}
