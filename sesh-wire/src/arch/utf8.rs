use binrw::binrw;

use super::Bytes;

/// A `string` as defined in the SSH protocol,
/// prefixed with it's `size` as a [`u32`],
/// restricted to valid **UTF-8**.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4251#section-5>.
#[binrw]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[brw(big)]
pub struct Utf8(
    #[br(try_map = |bytes: Bytes| String::from_utf8(bytes.into_vec()))]
    #[bw(map = |text| Bytes::new(text.as_bytes()))]
    String,
);

impl Utf8 {
    /// Create a new [`Utf8`] string from a [`String`].
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Extract the [`Utf8`] into a [`String`].
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Utf8 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::ops::Deref for Utf8 {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for Utf8 {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<T: Into<String>> From<T> for Utf8 {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use binrw::BinRead;

    use super::*;

    #[test]
    fn it_rejects_non_utf8() {
        let mut buffer = std::io::Cursor::new([0u8, 0, 0, 2, 0xff, 0xfe]);

        Utf8::read(&mut buffer).unwrap_err();
    }
}
