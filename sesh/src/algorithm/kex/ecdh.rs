use digest::{Digest, FixedOutputReset};
use sesh_wire::{
    arch::{Bytes, MpInt},
    kex,
    trans::{KexEcdhInit, KexEcdhReply, KexInit},
    Id, IntoPacket,
};
use signature::{SignatureEncoding, Signer, Verifier};
use ssh_key::{PrivateKey, Signature};

use crate::{
    algorithm::Negotiated,
    stream::{Buffered, Keys, Stream},
    Error, Result,
};

use super::Verify;

fn exchange_hash<D: Digest>(
    v_c: &Id,
    v_s: &Id,
    i_c: &KexInit,
    i_s: &KexInit,
    k_s: &Bytes,
    q_c: &[u8],
    q_s: &[u8],
    secret: &MpInt,
) -> digest::Output<D> {
    kex::Ecdh {
        v_c: v_c.to_string().into_bytes().into(),
        v_s: v_s.to_string().into_bytes().into(),
        i_c: i_c.into_packet().payload.into(),
        i_s: i_s.into_packet().payload.into(),
        k_s: k_s.clone(),
        q_c: q_c.into(),
        q_s: q_s.into(),
        k: secret.clone(),
    }
    .hash::<D>()
}

pub(super) async fn curve25519_client<H: Digest + FixedOutputReset>(
    stream: &mut Stream<impl Buffered>,
    v_c: &Id,
    v_s: &Id,
    i_c: &KexInit,
    i_s: &KexInit,
    negotiated: &Negotiated,
    verify: &Verify<'_>,
) -> Result<(Keys, Keys)> {
    let e_c = x25519_dalek::EphemeralSecret::random_from_rng(rand::thread_rng());
    let q_c = x25519_dalek::PublicKey::from(&e_c);

    stream
        .send(&KexEcdhInit {
            q_c: q_c.as_ref().into(),
        })
        .await?;

    let ecdh: KexEcdhReply = stream.recv().await?.to()?;
    let q_s = x25519_dalek::PublicKey::from(
        <[u8; 32]>::try_from(ecdh.q_s.as_ref()).map_err(|_| Error::KexError)?,
    );

    let secret = MpInt::positive(e_c.diffie_hellman(&q_s).as_bytes());

    let k_s = ssh_key::PublicKey::from_bytes(&ecdh.k_s)?;
    let hash = exchange_hash::<H>(
        v_c,
        v_s,
        i_c,
        i_s,
        &ecdh.k_s,
        q_c.as_ref(),
        q_s.as_ref(),
        &secret,
    );

    verify(&k_s)?;
    Verifier::verify(&k_s, &hash, &Signature::try_from(ecdh.signature.as_ref())?)?;

    Ok(super::derive::<H>(stream, &secret, &hash, negotiated))
}

pub(super) async fn curve25519_server<H: Digest + FixedOutputReset>(
    stream: &mut Stream<impl Buffered>,
    v_c: &Id,
    v_s: &Id,
    i_c: &KexInit,
    i_s: &KexInit,
    negotiated: &Negotiated,
    key: &PrivateKey,
) -> Result<(Keys, Keys)> {
    let ecdh: KexEcdhInit = stream.recv().await?.to()?;

    let e_s = x25519_dalek::EphemeralSecret::random_from_rng(rand::thread_rng());
    let q_s = x25519_dalek::PublicKey::from(&e_s);

    let q_c = x25519_dalek::PublicKey::from(
        <[u8; 32]>::try_from(ecdh.q_c.as_ref()).map_err(|_| Error::KexError)?,
    );

    let secret = MpInt::positive(e_s.diffie_hellman(&q_c).as_bytes());

    let k_s: Bytes = key.public_key().to_bytes()?.into();
    let hash = exchange_hash::<H>(v_c, v_s, i_c, i_s, &k_s, q_c.as_ref(), q_s.as_ref(), &secret);

    let signature: Signature = Signer::sign(key, &hash);

    stream
        .send(&KexEcdhReply {
            k_s,
            q_s: q_s.as_ref().into(),
            signature: signature.to_vec().into(),
        })
        .await?;

    Ok(super::derive::<H>(stream, &secret, &hash, negotiated))
}

/// The NIST curves share their exchange flow, modulo the curve types,
/// so the client and server procedures are stamped out per curve.
macro_rules! nistp {
    ($client:ident, $server:ident, $curve:ident) => {
        pub(super) async fn $client<H: Digest + FixedOutputReset>(
            stream: &mut Stream<impl Buffered>,
            v_c: &Id,
            v_s: &Id,
            i_c: &KexInit,
            i_s: &KexInit,
            negotiated: &Negotiated,
            verify: &Verify<'_>,
        ) -> Result<(Keys, Keys)> {
            use $curve::elliptic_curve::sec1::ToEncodedPoint;

            let e_c = $curve::ecdh::EphemeralSecret::random(&mut rand::thread_rng());
            let q_c = e_c.public_key().to_encoded_point(false);

            stream
                .send(&KexEcdhInit {
                    q_c: q_c.as_bytes().into(),
                })
                .await?;

            let ecdh: KexEcdhReply = stream.recv().await?.to()?;
            let peer = $curve::PublicKey::from_sec1_bytes(ecdh.q_s.as_ref())
                .map_err(|_| Error::KexError)?;

            let secret = MpInt::positive(e_c.diffie_hellman(&peer).raw_secret_bytes());

            let k_s = ssh_key::PublicKey::from_bytes(&ecdh.k_s)?;
            let hash = exchange_hash::<H>(
                v_c,
                v_s,
                i_c,
                i_s,
                &ecdh.k_s,
                q_c.as_bytes(),
                ecdh.q_s.as_ref(),
                &secret,
            );

            verify(&k_s)?;
            Verifier::verify(&k_s, &hash, &Signature::try_from(ecdh.signature.as_ref())?)?;

            Ok(super::derive::<H>(stream, &secret, &hash, negotiated))
        }

        pub(super) async fn $server<H: Digest + FixedOutputReset>(
            stream: &mut Stream<impl Buffered>,
            v_c: &Id,
            v_s: &Id,
            i_c: &KexInit,
            i_s: &KexInit,
            negotiated: &Negotiated,
            key: &PrivateKey,
        ) -> Result<(Keys, Keys)> {
            use $curve::elliptic_curve::sec1::ToEncodedPoint;

            let ecdh: KexEcdhInit = stream.recv().await?.to()?;
            let peer = $curve::PublicKey::from_sec1_bytes(ecdh.q_c.as_ref())
                .map_err(|_| Error::KexError)?;

            let e_s = $curve::ecdh::EphemeralSecret::random(&mut rand::thread_rng());
            let q_s = e_s.public_key().to_encoded_point(false);

            let secret = MpInt::positive(e_s.diffie_hellman(&peer).raw_secret_bytes());

            let k_s: Bytes = key.public_key().to_bytes()?.into();
            let hash = exchange_hash::<H>(
                v_c,
                v_s,
                i_c,
                i_s,
                &k_s,
                ecdh.q_c.as_ref(),
                q_s.as_bytes(),
                &secret,
            );

            let signature: Signature = Signer::sign(key, &hash);

            stream
                .send(&KexEcdhReply {
                    k_s,
                    q_s: q_s.as_bytes().into(),
                    signature: signature.to_vec().into(),
                })
                .await?;

            Ok(super::derive::<H>(stream, &secret, &hash, negotiated))
        }
    };
}

nistp!(nistp256_client, nistp256_server, p256);
nistp!(nistp384_client, nistp384_server, p384);
nistp!(nistp521_client, nistp521_server, p521);
