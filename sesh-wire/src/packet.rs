use binrw::{
    meta::{ReadEndian, WriteEndian},
    BinRead, BinWrite,
};

use crate::{Error, PACKET_MAX_SIZE, PACKET_MIN_LENGTH, PAYLOAD_MAX_SIZE};

/// Alignment floor for the padded packet, used when the
/// cipher's block size is smaller than 8 bytes.
const MIN_ALIGN: usize = 8;

/// The algorithm parameters for the _Message Authentication Code_.
pub trait Mac {
    /// The size of the MAC at the end of the SSH packet.
    fn size(&self) -> usize;

    /// Whether the MAC is computed over encrypted data.
    fn etm(&self) -> bool;
}

/// A cipher able to `open` a received [`Packet`] to retrieve it's payload.
pub trait OpeningCipher {
    /// The associated error type returned by the methods.
    type Err: From<Error>;

    /// The [`Mac`] parameters in use for received packets.
    type Mac: Mac;

    /// Access the [`Mac`] parameters.
    fn mac(&self) -> &Self::Mac;

    /// The cipher's block size, in bytes.
    fn block_size(&self) -> usize;

    /// Decrypt the received `buf` in place.
    fn decrypt(&mut self, buf: &mut [u8]) -> Result<(), Self::Err>;

    /// Verify the received `mac` against the (sequence number ‖ `buf`) pair.
    fn open(&mut self, buf: &[u8], mac: Vec<u8>, seq: u32) -> Result<(), Self::Err>;

    /// Decompress the received payload.
    fn decompress(&mut self, buf: Vec<u8>) -> Result<Vec<u8>, Self::Err>;
}

/// A cipher able to `seal` a payload to produce a [`Packet`]'s binary form.
pub trait SealingCipher {
    /// The associated error type returned by the methods.
    type Err: From<Error>;

    /// The [`Mac`] parameters in use for sent packets.
    type Mac: Mac;

    /// Access the [`Mac`] parameters.
    fn mac(&self) -> &Self::Mac;

    /// The cipher's block size, in bytes.
    fn block_size(&self) -> usize;

    /// Compress the payload.
    fn compress(&mut self, buf: &[u8]) -> Result<Vec<u8>, Self::Err>;

    /// Prefix the `padding_length` byte and append random padding, so the
    /// total aligns to the block size with at least 4 bytes of padding.
    fn pad(&mut self, buf: Vec<u8>) -> Result<Vec<u8>, Self::Err>;

    /// Encrypt the `buf` in place.
    fn encrypt(&mut self, buf: &mut [u8]) -> Result<(), Self::Err>;

    /// Produce the MAC over the (sequence number ‖ `buf`) pair.
    fn seal(&mut self, buf: &[u8], seq: u32) -> Result<Vec<u8>, Self::Err>;
}

/// A SSH 2.0 binary packet in it's decrypted, decompressed form.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4253#section-6>.
#[derive(Debug, Clone)]
pub struct Packet {
    /// The packet's decrypted, decompressed payload.
    pub payload: Vec<u8>,
}

impl Packet {
    /// The message number of the payload, if any.
    pub fn message_id(&self) -> Option<u8> {
        self.payload.first().copied()
    }

    /// Try to deserialize the [`Packet`] into `T`.
    pub fn to<T>(&self) -> Result<T, Error>
    where
        T: for<'r> BinRead<Args<'r> = ()> + ReadEndian,
    {
        Ok(T::read(&mut std::io::Cursor::new(&self.payload))?)
    }

    /// Read a [`Packet`] from the provided asynchronous `reader`.
    #[cfg(feature = "futures")]
    #[cfg_attr(docsrs, doc(cfg(feature = "futures")))]
    pub async fn from_async_reader<R, C>(
        reader: &mut R,
        cipher: &mut C,
        seq: u32,
    ) -> Result<Self, C::Err>
    where
        R: futures::io::AsyncRead + Unpin,
        C: OpeningCipher,
    {
        use futures::io::AsyncReadExt;

        let align = cipher.block_size().max(MIN_ALIGN);

        let mut buf = vec![0u8; align];
        reader
            .read_exact(&mut buf[..])
            .await
            .map_err(Error::from)?;

        if !cipher.mac().etm() {
            cipher.decrypt(&mut buf[..])?;
        }

        let len = u32::from_be_bytes(
            buf[..4]
                .try_into()
                .expect("the buffer of size 4 was not of size 4"),
        );

        if (len as usize) < PACKET_MIN_LENGTH || len as usize + 4 > PACKET_MAX_SIZE {
            return Err(Error::PacketLength(len).into());
        }

        // Without ETM the length field takes part in the alignment.
        let aligned = if cipher.mac().etm() {
            len as usize
        } else {
            len as usize + 4
        };
        if aligned % align != 0 {
            return Err(Error::PacketLength(len).into());
        }

        buf.resize(std::mem::size_of_val(&len) + len as usize, 0);
        reader
            .read_exact(&mut buf[align..])
            .await
            .map_err(Error::from)?;

        let mut mac = vec![0u8; cipher.mac().size()];
        reader.read_exact(&mut mac[..]).await.map_err(Error::from)?;

        if cipher.mac().etm() {
            cipher.open(&buf, mac, seq)?;
            cipher.decrypt(&mut buf[4..])?;
        } else {
            cipher.decrypt(&mut buf[align..])?;
            cipher.open(&buf, mac, seq)?;
        }

        let padlen = buf[4];
        if padlen as usize + 1 > len as usize {
            return Err(Error::PaddingLength(padlen).into());
        }

        let payload = buf[4 + 1..4 + len as usize - padlen as usize].to_vec();
        let payload = cipher.decompress(payload)?;

        if payload.len() > PAYLOAD_MAX_SIZE {
            return Err(Error::PacketLength(len).into());
        }

        Ok(Self { payload })
    }

    /// Write the [`Packet`] to the provided asynchronous `writer`.
    #[cfg(feature = "futures")]
    #[cfg_attr(docsrs, doc(cfg(feature = "futures")))]
    pub async fn to_async_writer<W, C>(
        &self,
        writer: &mut W,
        cipher: &mut C,
        seq: u32,
    ) -> Result<(), C::Err>
    where
        W: futures::io::AsyncWrite + Unpin,
        C: SealingCipher,
    {
        use futures::io::AsyncWriteExt;

        if self.payload.len() > PAYLOAD_MAX_SIZE {
            return Err(Error::PacketLength(self.payload.len() as u32).into());
        }

        let compressed = cipher.compress(&self.payload)?;
        let padded = cipher.pad(compressed)?;

        let mut buf = [(padded.len() as u32).to_be_bytes().to_vec(), padded].concat();

        let (buf, mac) = if cipher.mac().etm() {
            cipher.encrypt(&mut buf[4..])?;
            let mac = cipher.seal(&buf, seq)?;

            (buf, mac)
        } else {
            let mac = cipher.seal(&buf, seq)?;
            cipher.encrypt(&mut buf[..])?;

            (buf, mac)
        };

        writer.write_all(&buf).await.map_err(Error::from)?;
        writer.write_all(&mac).await.map_err(Error::from)?;

        Ok(())
    }
}

/// Conversion of typed messages into a [`Packet`].
pub trait IntoPacket {
    /// Convert `self` into a [`Packet`].
    fn into_packet(self) -> Packet;
}

impl IntoPacket for Packet {
    fn into_packet(self) -> Packet {
        self
    }
}

impl IntoPacket for &Packet {
    fn into_packet(self) -> Packet {
        self.clone()
    }
}

impl<T> IntoPacket for &T
where
    T: for<'w> BinWrite<Args<'w> = ()> + WriteEndian,
{
    fn into_packet(self) -> Packet {
        let mut buffer = std::io::Cursor::new(Vec::new());
        self.write(&mut buffer).unwrap_or_else(|err| {
            panic!(
                "failed to serialize `{}`: {err}",
                std::any::type_name::<T>()
            )
        });

        Packet {
            payload: buffer.into_inner(),
        }
    }
}
