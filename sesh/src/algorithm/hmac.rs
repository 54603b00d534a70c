use digest::OutputSizeUser;
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use strum::{AsRefStr, EnumString};

use sesh_wire::Mac;

/// The tag size of the truncated `-96` MAC variants.
const TRUNCATED_SIZE: usize = 12;

/// SSH hmac algorithms.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Hmac {
    /// HMAC with sha-2-512 digest on encrypted message.
    #[strum(serialize = "hmac-sha2-512-etm@openssh.com")]
    HmacSha512Etm,

    /// HMAC with sha-2-256 digest on encrypted message.
    #[strum(serialize = "hmac-sha2-256-etm@openssh.com")]
    HmacSha256Etm,

    /// HMAC with sha-2-512 digest.
    #[strum(serialize = "hmac-sha2-512")]
    HmacSha512,

    /// HMAC with sha-2-256 digest.
    #[strum(serialize = "hmac-sha2-256")]
    HmacSha256,

    /// HMAC with sha-1 digest on encrypted message.
    #[strum(serialize = "hmac-sha1-etm@openssh.com")]
    HmacSha1Etm,

    /// HMAC with sha-1 digest.
    HmacSha1,

    /// HMAC with sha-1 digest, tag truncated to 96 bits.
    #[strum(serialize = "hmac-sha1-96")]
    HmacSha196,

    /// HMAC with md5 digest.
    HmacMd5,

    /// HMAC with md5 digest, tag truncated to 96 bits.
    #[strum(serialize = "hmac-md5-96")]
    HmacMd596,

    /// No HMAC algorithm.
    #[default]
    None,
}

impl Hmac {
    pub(crate) fn verify(
        &self,
        seq: u32,
        buf: &[u8],
        key: &[u8],
        mac: &[u8],
    ) -> Result<(), digest::MacError> {
        fn verify<D: digest::Mac + digest::KeyInit>(
            seq: u32,
            buf: &[u8],
            key: &[u8],
            mac: &[u8],
            truncated: bool,
        ) -> Result<(), digest::MacError> {
            let computed = <D as digest::Mac>::new_from_slice(key)
                .map_err(|_| digest::MacError)?
                .chain_update(seq.to_be_bytes())
                .chain_update(buf);

            if truncated {
                computed.verify_truncated_left(mac)
            } else {
                computed.verify(mac.into())
            }
        }

        match self {
            Self::HmacSha512Etm | Self::HmacSha512 => {
                verify::<hmac::Hmac<Sha512>>(seq, buf, key, mac, false)
            }
            Self::HmacSha256Etm | Self::HmacSha256 => {
                verify::<hmac::Hmac<Sha256>>(seq, buf, key, mac, false)
            }
            Self::HmacSha1Etm | Self::HmacSha1 => {
                verify::<hmac::Hmac<Sha1>>(seq, buf, key, mac, false)
            }
            Self::HmacSha196 => verify::<hmac::Hmac<Sha1>>(seq, buf, key, mac, true),
            Self::HmacMd5 => verify::<hmac::Hmac<Md5>>(seq, buf, key, mac, false),
            Self::HmacMd596 => verify::<hmac::Hmac<Md5>>(seq, buf, key, mac, true),
            Self::None => Ok(()),
        }
    }

    pub(crate) fn sign(&self, seq: u32, buf: &[u8], key: &[u8]) -> Vec<u8> {
        fn sign<D: digest::Mac + digest::KeyInit>(seq: u32, buf: &[u8], key: &[u8]) -> Vec<u8> {
            <D as digest::Mac>::new_from_slice(key)
                .expect("HMACs accept keys of any size")
                .chain_update(seq.to_be_bytes())
                .chain_update(buf)
                .finalize()
                .into_bytes()
                .to_vec()
        }

        let mut tag = match self {
            Self::HmacSha512Etm | Self::HmacSha512 => sign::<hmac::Hmac<Sha512>>(seq, buf, key),
            Self::HmacSha256Etm | Self::HmacSha256 => sign::<hmac::Hmac<Sha256>>(seq, buf, key),
            Self::HmacSha1Etm | Self::HmacSha1 | Self::HmacSha196 => {
                sign::<hmac::Hmac<Sha1>>(seq, buf, key)
            }
            Self::HmacMd5 | Self::HmacMd596 => sign::<hmac::Hmac<Md5>>(seq, buf, key),
            Self::None => Default::default(),
        };

        tag.truncate(self.size());
        tag
    }
}

impl Mac for Hmac {
    fn size(&self) -> usize {
        match self {
            Self::HmacSha512Etm | Self::HmacSha512 => Sha512::output_size(),
            Self::HmacSha256Etm | Self::HmacSha256 => Sha256::output_size(),
            Self::HmacSha1Etm | Self::HmacSha1 => Sha1::output_size(),
            Self::HmacMd5 => Md5::output_size(),
            Self::HmacSha196 | Self::HmacMd596 => TRUNCATED_SIZE,
            Self::None => 0,
        }
    }

    fn etm(&self) -> bool {
        matches!(
            self,
            Self::HmacSha512Etm | Self::HmacSha256Etm | Self::HmacSha1Etm
        )
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Hmac::HmacSha256, 32)]
    #[case(Hmac::HmacSha512, 64)]
    #[case(Hmac::HmacSha1, 20)]
    #[case(Hmac::HmacSha196, 12)]
    #[case(Hmac::HmacMd596, 12)]
    #[case(Hmac::None, 0)]
    fn it_sizes_tags_correctly(#[case] hmac: Hmac, #[case] size: usize) {
        assert_eq!(hmac.sign(0, b"payload", b"key").len(), size);
        assert_eq!(hmac.size(), size);
    }

    #[rstest]
    #[case(Hmac::HmacSha256)]
    #[case(Hmac::HmacSha196)]
    #[case(Hmac::HmacMd5)]
    fn it_detects_any_single_bit_flip(#[case] hmac: Hmac) {
        let (key, payload) = (b"0123456789abcdef", b"some sealed payload".to_vec());
        let tag = hmac.sign(42, &payload, key);

        hmac.verify(42, &payload, key, &tag)
            .expect("pristine payload should verify");

        for bit in 0..payload.len() * 8 {
            let mut tampered = payload.clone();
            tampered[bit / 8] ^= 1 << (bit % 8);

            hmac.verify(42, &tampered, key, &tag)
                .expect_err("tampered payload should not verify");
        }
    }

    #[test]
    fn it_binds_the_sequence_number() {
        let hmac = Hmac::HmacSha256;
        let tag = hmac.sign(0, b"payload", b"key");

        hmac.verify(1, b"payload", b"key", &tag)
            .expect_err("a shifted sequence number should not verify");
    }
}
