use binrw::binrw;

use super::Utf8;

/// A `string` as defined in the SSH protocol,
/// prefixed with it's `size` as a [`u32`],
/// restricted to valid **ASCII**.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4251#section-5>.
#[binrw]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[brw(big, assert(self_0.is_ascii()))]
pub struct Ascii(Utf8);

impl Ascii {
    /// Create a new [`Ascii`] string from a [`String`].
    ///
    /// Non-ASCII characters are a construction error surfaced
    /// at write time through the serialization assert.
    pub fn new(text: impl Into<String>) -> Self {
        Self(Utf8::new(text))
    }

    /// Extract the [`Ascii`] into a [`String`].
    pub fn into_string(self) -> String {
        self.0.into_string()
    }
}

impl std::fmt::Display for Ascii {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::ops::Deref for Ascii {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for Ascii {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<T: Into<String>> From<T> for Ascii {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}
