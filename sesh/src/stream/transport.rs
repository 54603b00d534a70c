use rand::Rng;
use sesh_wire::{Mac, OpeningCipher, SealingCipher};

use crate::{
    algorithm::{self, Cipher, CipherState},
    Error,
};

use super::Keys;

/// Both directions of the negotiated transport algorithms.
#[derive(Debug, Default)]
pub struct TransportPair {
    /// Transmission side of the transport.
    pub tx: Transport,

    /// Reception side of the transport.
    pub rx: Transport,
}

/// One direction of the transport: negotiated algorithms,
/// derived keys and running cipher state.
#[derive(Debug, Default)]
pub struct Transport {
    /// The negotiated compression algorithm.
    pub compress: algorithm::Compress,

    /// The negotiated encryption algorithm.
    pub cipher: algorithm::Cipher,

    /// The negotiated MAC algorithm.
    pub hmac: algorithm::Hmac,

    /// The running cipher state, lazily built from the keys.
    pub state: Option<CipherState>,

    /// The derived key material.
    pub chain: Keys,
}

impl Transport {
    fn padding(&self, payload: usize) -> u8 {
        const MIN_PAD_SIZE: usize = 4;
        const MIN_ALIGN: usize = 8;

        let align = self.cipher.block_size().max(MIN_ALIGN);

        // With ETM MACs the length field is left out of the alignment.
        let size = if self.hmac.etm() {
            std::mem::size_of::<u8>() + payload
        } else {
            std::mem::size_of::<u32>() + std::mem::size_of::<u8>() + payload
        };
        let padding = align - size % align;

        let padding = if padding < MIN_PAD_SIZE {
            padding + align
        } else {
            padding
        };

        if size + padding < self.cipher.block_size().max(sesh_wire::PACKET_MIN_SIZE) {
            (padding + align) as u8
        } else {
            padding as u8
        }
    }
}

impl OpeningCipher for Transport {
    type Err = Error;
    type Mac = algorithm::Hmac;

    fn mac(&self) -> &Self::Mac {
        &self.hmac
    }

    fn block_size(&self) -> usize {
        self.cipher.block_size()
    }

    fn decrypt(&mut self, buf: &mut [u8]) -> Result<(), Self::Err> {
        if self.cipher != Cipher::None {
            self.cipher
                .decrypt(&mut self.state, &self.chain.key, &self.chain.iv, buf)?;
        }

        Ok(())
    }

    fn open(&mut self, buf: &[u8], mac: Vec<u8>, seq: u32) -> Result<(), Self::Err> {
        if self.hmac.size() > 0 {
            self.hmac.verify(seq, buf, &self.chain.hmac, &mac)?;
        }

        Ok(())
    }

    fn decompress(&mut self, buf: Vec<u8>) -> Result<Vec<u8>, Self::Err> {
        self.compress.decompress(buf)
    }
}

impl SealingCipher for Transport {
    type Err = Error;
    type Mac = algorithm::Hmac;

    fn mac(&self) -> &Self::Mac {
        &self.hmac
    }

    fn block_size(&self) -> usize {
        self.cipher.block_size()
    }

    fn compress(&mut self, buf: &[u8]) -> Result<Vec<u8>, Self::Err> {
        self.compress.compress(buf)
    }

    fn pad(&mut self, mut buf: Vec<u8>) -> Result<Vec<u8>, Self::Err> {
        let mut rng = rand::thread_rng();

        let padding = self.padding(buf.len());

        // prefix with the padding size
        let mut padded = vec![padding];
        padded.append(&mut buf);

        // fill with random padding
        padded.resize_with(padded.len() + padding as usize, || rng.gen());

        Ok(padded)
    }

    fn encrypt(&mut self, buf: &mut [u8]) -> Result<(), Self::Err> {
        if self.cipher != Cipher::None {
            self.cipher
                .encrypt(&mut self.state, &self.chain.key, &self.chain.iv, buf)?;
        }

        Ok(())
    }

    fn seal(&mut self, buf: &[u8], seq: u32) -> Result<Vec<u8>, Self::Err> {
        Ok(self.hmac.sign(seq, buf, &self.chain.hmac))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use futures::io::Cursor;
    use rstest::rstest;
    use sesh_wire::Packet;

    use super::*;

    async fn roundtrip(pair: &mut TransportPair, payload: &[u8]) -> Packet {
        let mut wire = Vec::new();
        Packet {
            payload: payload.to_vec(),
        }
        .to_async_writer(&mut wire, &mut pair.tx, 0)
        .await
        .unwrap();

        Packet::from_async_reader(&mut Cursor::new(wire), &mut pair.rx, 0)
            .await
            .unwrap()
    }

    #[rstest]
    #[case(&[])]
    #[case(b"\x15")]
    #[case(&[0x5a; 243])]
    #[case(&[0xa5; 32768])]
    #[async_std::test]
    async fn it_roundtrips_in_the_clear(#[case] payload: &[u8]) {
        let mut pair = TransportPair::default();

        assert_eq!(roundtrip(&mut pair, payload).await.payload, payload);
    }

    #[rstest]
    #[async_std::test]
    async fn it_aligns_packets_to_the_block_size() {
        let mut pair = TransportPair::default();

        let mut wire = Vec::new();
        Packet {
            payload: b"sesh".to_vec(),
        }
        .to_async_writer(&mut wire, &mut pair.tx, 0)
        .await
        .unwrap();

        assert_eq!(wire.len() % 8, 0);
        assert!(wire.len() >= sesh_wire::PACKET_MIN_SIZE);
    }

    #[rstest]
    #[async_std::test]
    async fn it_rejects_an_out_of_bounds_length() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&(sesh_wire::PACKET_MAX_SIZE as u32).to_be_bytes());
        wire.resize(64, 0);

        let result =
            Packet::from_async_reader(&mut Cursor::new(wire), &mut Transport::default(), 0).await;

        assert!(matches!(
            result,
            Err(Error::Wire(sesh_wire::Error::PacketLength(_)))
        ));
    }
}
