/// A chunk of request content
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Content {
    pub data: Vec<u8>,
    /// No content follows this chunk
    pub last: bool,
}

impl Content {
    #[must_use]
    pub fn new(data: impl Into<Vec<u8>>, last: bool) -> Self {
        Self {
            data: data.into(),
            last,
        }
    }

    /// Bytes carried by this chunk
    #[must_use]
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len()
    }
}

/// Response metadata sent with the first chunk of a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
}

impl ResponseHead {
    #[must_use]
    pub const fn new(status: u16) -> Self {
        Self { status }
    }
}
