use binrw::binrw;

/// A `string` as defined in the SSH protocol,
/// prefixed with it's `size` as a [`u32`].
///
/// see <https://datatracker.ietf.org/doc/html/rfc4251#section-5>.
#[binrw]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[brw(big)]
pub struct Bytes {
    #[bw(calc = payload.len() as u32)]
    size: u32,

    #[br(count = size)]
    payload: Vec<u8>,
}

impl Bytes {
    /// Create new [`Bytes`] from a [`Vec`].
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Extract the [`Bytes`] into a [`Vec`].
    pub fn into_vec(self) -> Vec<u8> {
        self.payload
    }
}

impl std::ops::Deref for Bytes {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.payload.as_ref()
    }
}

impl AsRef<[u8]> for Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.payload
    }
}

impl<T: Into<Vec<u8>>> From<T> for Bytes {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use binrw::{BinRead, BinWrite};
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(&[], &[0, 0, 0, 0])]
    #[case(b"ssh", &[0, 0, 0, 3, b's', b's', b'h'])]
    fn it_encodes_symmetrically(#[case] payload: &[u8], #[case] wire: &[u8]) {
        let mut buffer = std::io::Cursor::new(Vec::new());
        Bytes::new(payload).write(&mut buffer).unwrap();
        assert_eq!(buffer.get_ref(), wire);

        buffer.set_position(0);
        assert_eq!(&*Bytes::read(&mut buffer).unwrap(), payload);
    }

    #[test]
    fn it_rejects_truncated_lengths() {
        // Declared size of 8, only 2 bytes remaining.
        let mut buffer = std::io::Cursor::new([0u8, 0, 0, 8, 1, 2]);

        Bytes::read(&mut buffer).unwrap_err();
    }
}
