use binrw::binrw;

use super::Bytes;

/// A `mpint` as defined in the SSH protocol: a two's-complement
/// big-endian integer, with a leading zero octet only when the
/// sign bit would otherwise be set.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4251#section-5>.
#[binrw]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[brw(big)]
pub struct MpInt(Bytes);

impl MpInt {
    /// Create a [`MpInt`] from raw _bytes_, used verbatim.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Create a [`MpInt`] from the magnitude of a positive integer,
    /// prefixing a zero octet when the sign bit would be set otherwise.
    pub fn positive(value: &[u8]) -> Self {
        let value = value
            .iter()
            .position(|&byte| byte != 0)
            .map_or(&[] as &[u8], |start| &value[start..]);

        match value.first() {
            Some(byte) if *byte & 0x80 != 0 => {
                let mut buffer = vec![0u8; value.len() + 1];
                buffer[1..].copy_from_slice(value);

                Self(Bytes::new(buffer))
            }
            _ => Self(Bytes::new(value)),
        }
    }

    /// The magnitude of the integer, leading sign octet stripped.
    pub fn as_positive_bytes(&self) -> &[u8] {
        match &**self {
            [0, rest @ ..] => rest,
            whole => whole,
        }
    }
}

impl std::ops::Deref for MpInt {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[u8]> for MpInt {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use binrw::BinWrite;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(&[], &[0, 0, 0, 0])]
    #[case(&[0x7f], &[0, 0, 0, 1, 0x7f])]
    // A set sign bit grows the encoding by a zero octet.
    #[case(&[0x80], &[0, 0, 0, 2, 0x00, 0x80])]
    #[case(&[0x9a, 0x37, 0x8f, 0x9a, 0x2b], &[0, 0, 0, 6, 0x00, 0x9a, 0x37, 0x8f, 0x9a, 0x2b])]
    // Redundant leading zeroes are dropped before encoding.
    #[case(&[0x00, 0x00, 0x7f], &[0, 0, 0, 1, 0x7f])]
    fn it_encodes_with_a_minimal_sign_prefix(#[case] value: &[u8], #[case] wire: &[u8]) {
        let mut buffer = std::io::Cursor::new(Vec::new());
        MpInt::positive(value).write(&mut buffer).unwrap();

        assert_eq!(buffer.get_ref(), wire);
    }
}
