//! Structures that get signed and verified as part of the protocol.

use binrw::binwrite;

use crate::arch;

/// The data that gets _signed_ and _verified_ to prove the possession of the
/// private key in the `publickey` authentication method, computed from the
/// concatenation of the following.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4252#section-7>.
#[binwrite]
#[derive(Debug)]
#[bw(big)]
pub struct PublickeySignature<'s> {
    /// The session identifier issued by the first key-exchange.
    pub session_id: &'s arch::Bytes,

    #[bw(calc = 50)]
    magic: u8,

    /// Username for the auth request.
    pub username: &'s arch::Utf8,

    /// Service name to start after authentication.
    pub service_name: &'s arch::Ascii,

    #[bw(calc = arch::Ascii::new("publickey"))]
    method: arch::Ascii,

    #[bw(calc = arch::Bool(true))]
    signed: arch::Bool,

    /// Public key algorithm's name.
    pub algorithm: &'s arch::Bytes,

    /// Public key blob.
    pub blob: &'s arch::Bytes,
}

impl PublickeySignature<'_> {
    #[cfg(feature = "signature")]
    fn to_bytes(&self) -> Vec<u8> {
        use binrw::BinWrite;

        let mut buffer = std::io::Cursor::new(Vec::new());
        self.write(&mut buffer)
            .expect("signature structures serialize infallibly to memory");

        buffer.into_inner()
    }

    /// Verify the structure against the provided `signature` with the `key`.
    #[cfg(feature = "signature")]
    #[cfg_attr(docsrs, doc(cfg(feature = "signature")))]
    pub fn verify<S, K: signature::Verifier<S>>(
        &self,
        key: &K,
        signature: &S,
    ) -> signature::Result<()> {
        K::verify(key, &self.to_bytes(), signature)
    }

    /// Sign the structure with the provided `key` to produce a signature.
    #[cfg(feature = "signature")]
    #[cfg_attr(docsrs, doc(cfg(feature = "signature")))]
    pub fn sign<S, K: signature::Signer<S>>(&self, key: &K) -> S {
        K::sign(key, &self.to_bytes())
    }
}
