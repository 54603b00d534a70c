use digest::{Digest, FixedOutputReset};
use num_bigint_dig::{BigUint, RandBigInt};
use sesh_wire::{
    arch::{Bytes, MpInt},
    kex,
    trans::{
        KexDhGexGroup, KexDhGexInit, KexDhGexReply, KexDhGexRequest, KexDhInit, KexDhReply,
        KexInit,
    },
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

/// The group sizes asked for in a group exchange request.
const GEX_MIN_BITS: u32 = 1024;
const GEX_PREFERRED_BITS: u32 = 2048;
const GEX_MAX_BITS: u32 = 8192;

/// The generator shared by all supported MODP groups.
const GENERATOR: u32 = 2;

/// The 1024-bit Oakley Group 2 prime, used by `diffie-hellman-group1-sha1`.
///
/// see <https://datatracker.ietf.org/doc/html/rfc2409#section-6.2>.
pub(super) const GROUP1_P: [u8; 128] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xc9, 0x0f, 0xda, 0xa2,
    0x21, 0x68, 0xc2, 0x34, 0xc4, 0xc6, 0x62, 0x8b, 0x80, 0xdc, 0x1c, 0xd1,
    0x29, 0x02, 0x4e, 0x08, 0x8a, 0x67, 0xcc, 0x74, 0x02, 0x0b, 0xbe, 0xa6,
    0x3b, 0x13, 0x9b, 0x22, 0x51, 0x4a, 0x08, 0x79, 0x8e, 0x34, 0x04, 0xdd,
    0xef, 0x95, 0x19, 0xb3, 0xcd, 0x3a, 0x43, 0x1b, 0x30, 0x2b, 0x0a, 0x6d,
    0xf2, 0x5f, 0x14, 0x37, 0x4f, 0xe1, 0x35, 0x6d, 0x6d, 0x51, 0xc2, 0x45,
    0xe4, 0x85, 0xb5, 0x76, 0x62, 0x5e, 0x7e, 0xc6, 0xf4, 0x4c, 0x42, 0xe9,
    0xa6, 0x37, 0xed, 0x6b, 0x0b, 0xff, 0x5c, 0xb6, 0xf4, 0x06, 0xb7, 0xed,
    0xee, 0x38, 0x6b, 0xfb, 0x5a, 0x89, 0x9f, 0xa5, 0xae, 0x9f, 0x24, 0x11,
    0x7c, 0x4b, 0x1f, 0xe6, 0x49, 0x28, 0x66, 0x51, 0xec, 0xe6, 0x53, 0x81,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
];

/// The 2048-bit MODP group 14 prime, used by `diffie-hellman-group14-sha1`
/// and as the preferred group-exchange group.
///
/// see <https://datatracker.ietf.org/doc/html/rfc3526#section-3>.
pub(super) const GROUP14_P: [u8; 256] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xc9, 0x0f, 0xda, 0xa2,
    0x21, 0x68, 0xc2, 0x34, 0xc4, 0xc6, 0x62, 0x8b, 0x80, 0xdc, 0x1c, 0xd1,
    0x29, 0x02, 0x4e, 0x08, 0x8a, 0x67, 0xcc, 0x74, 0x02, 0x0b, 0xbe, 0xa6,
    0x3b, 0x13, 0x9b, 0x22, 0x51, 0x4a, 0x08, 0x79, 0x8e, 0x34, 0x04, 0xdd,
    0xef, 0x95, 0x19, 0xb3, 0xcd, 0x3a, 0x43, 0x1b, 0x30, 0x2b, 0x0a, 0x6d,
    0xf2, 0x5f, 0x14, 0x37, 0x4f, 0xe1, 0x35, 0x6d, 0x6d, 0x51, 0xc2, 0x45,
    0xe4, 0x85, 0xb5, 0x76, 0x62, 0x5e, 0x7e, 0xc6, 0xf4, 0x4c, 0x42, 0xe9,
    0xa6, 0x37, 0xed, 0x6b, 0x0b, 0xff, 0x5c, 0xb6, 0xf4, 0x06, 0xb7, 0xed,
    0xee, 0x38, 0x6b, 0xfb, 0x5a, 0x89, 0x9f, 0xa5, 0xae, 0x9f, 0x24, 0x11,
    0x7c, 0x4b, 0x1f, 0xe6, 0x49, 0x28, 0x66, 0x51, 0xec, 0xe4, 0x5b, 0x3d,
    0xc2, 0x00, 0x7c, 0xb8, 0xa1, 0x63, 0xbf, 0x05, 0x98, 0xda, 0x48, 0x36,
    0x1c, 0x55, 0xd3, 0x9a, 0x69, 0x16, 0x3f, 0xa8, 0xfd, 0x24, 0xcf, 0x5f,
    0x83, 0x65, 0x5d, 0x23, 0xdc, 0xa3, 0xad, 0x96, 0x1c, 0x62, 0xf3, 0x56,
    0x20, 0x85, 0x52, 0xbb, 0x9e, 0xd5, 0x29, 0x07, 0x70, 0x96, 0x96, 0x6d,
    0x67, 0x0c, 0x35, 0x4e, 0x4a, 0xbc, 0x98, 0x04, 0xf1, 0x74, 0x6c, 0x08,
    0xca, 0x18, 0x21, 0x7c, 0x32, 0x90, 0x5e, 0x46, 0x2e, 0x36, 0xce, 0x3b,
    0xe3, 0x9e, 0x77, 0x2c, 0x18, 0x0e, 0x86, 0x03, 0x9b, 0x27, 0x83, 0xa2,
    0xec, 0x07, 0xa2, 0x8f, 0xb5, 0xc5, 0x5d, 0xf0, 0x6f, 0x4c, 0x52, 0xc9,
    0xde, 0x2b, 0xcb, 0xf6, 0x95, 0x58, 0x17, 0x18, 0x39, 0x95, 0x49, 0x7c,
    0xea, 0x95, 0x6a, 0xe5, 0x15, 0xd2, 0x26, 0x18, 0x98, 0xfa, 0x05, 0x10,
    0x15, 0x72, 0x8e, 0x5a, 0x8a, 0xac, 0xaa, 0x68, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff,
];

/// Draw a private exponent `x` with `1 < x < (p - 1) / 2`.
fn private_exponent(p: &BigUint) -> BigUint {
    let ceiling = (p - 1_u8) >> 1_usize;

    loop {
        let x = rand::thread_rng().gen_biguint_below(&ceiling);
        if x > BigUint::from(1_u8) {
            break x;
        }
    }
}

/// Check a received public value per RFC 4253 section 8: `1 < v < p - 1`.
fn check_public(v: &BigUint, p: &BigUint) -> Result<()> {
    if *v <= BigUint::from(1_u8) || *v >= p - 1_u8 {
        return Err(Error::KexError);
    }

    Ok(())
}

fn dh_hash<D: Digest>(
    v_c: &Id,
    v_s: &Id,
    i_c: &KexInit,
    i_s: &KexInit,
    k_s: &Bytes,
    e: &MpInt,
    f: &MpInt,
    secret: &MpInt,
) -> digest::Output<D> {
    kex::Dh {
        v_c: v_c.to_string().into_bytes().into(),
        v_s: v_s.to_string().into_bytes().into(),
        i_c: i_c.into_packet().payload.into(),
        i_s: i_s.into_packet().payload.into(),
        k_s: k_s.clone(),
        e: e.clone(),
        f: f.clone(),
        k: secret.clone(),
    }
    .hash::<D>()
}

#[allow(clippy::too_many_arguments)]
pub(super) async fn group_client<H: Digest + FixedOutputReset>(
    stream: &mut Stream<impl Buffered>,
    v_c: &Id,
    v_s: &Id,
    i_c: &KexInit,
    i_s: &KexInit,
    negotiated: &Negotiated,
    verify: &Verify<'_>,
    group: &[u8],
) -> Result<(Keys, Keys)> {
    let p = BigUint::from_bytes_be(group);
    let g = BigUint::from(GENERATOR);

    let x = private_exponent(&p);
    let e = g.modpow(&x, &p);

    stream
        .send(&KexDhInit {
            e: MpInt::positive(&e.to_bytes_be()),
        })
        .await?;

    let reply: KexDhReply = stream.recv().await?.to()?;

    let f = BigUint::from_bytes_be(reply.f.as_positive_bytes());
    check_public(&f, &p)?;

    let secret = MpInt::positive(&f.modpow(&x, &p).to_bytes_be());

    let k_s = ssh_key::PublicKey::from_bytes(&reply.k_s)?;
    let hash = dh_hash::<H>(
        v_c,
        v_s,
        i_c,
        i_s,
        &reply.k_s,
        &MpInt::positive(&e.to_bytes_be()),
        &reply.f,
        &secret,
    );

    verify(&k_s)?;
    Verifier::verify(&k_s, &hash, &Signature::try_from(reply.signature.as_ref())?)?;

    Ok(super::derive::<H>(stream, &secret, &hash, negotiated))
}

#[allow(clippy::too_many_arguments)]
pub(super) async fn group_server<H: Digest + FixedOutputReset>(
    stream: &mut Stream<impl Buffered>,
    v_c: &Id,
    v_s: &Id,
    i_c: &KexInit,
    i_s: &KexInit,
    negotiated: &Negotiated,
    key: &PrivateKey,
    group: &[u8],
) -> Result<(Keys, Keys)> {
    let p = BigUint::from_bytes_be(group);
    let g = BigUint::from(GENERATOR);

    let init: KexDhInit = stream.recv().await?.to()?;

    let e = BigUint::from_bytes_be(init.e.as_positive_bytes());
    check_public(&e, &p)?;

    let y = private_exponent(&p);
    let f = g.modpow(&y, &p);

    let secret = MpInt::positive(&e.modpow(&y, &p).to_bytes_be());

    let k_s: Bytes = key.public_key().to_bytes()?.into();
    let f = MpInt::positive(&f.to_bytes_be());
    let hash = dh_hash::<H>(v_c, v_s, i_c, i_s, &k_s, &init.e, &f, &secret);

    let signature: Signature = Signer::sign(key, &hash);

    stream
        .send(&KexDhReply {
            k_s,
            f,
            signature: signature.to_vec().into(),
        })
        .await?;

    Ok(super::derive::<H>(stream, &secret, &hash, negotiated))
}

#[allow(clippy::too_many_arguments)]
fn gex_hash<D: Digest>(
    v_c: &Id,
    v_s: &Id,
    i_c: &KexInit,
    i_s: &KexInit,
    k_s: &Bytes,
    request: &KexDhGexRequest,
    p: &MpInt,
    g: &MpInt,
    e: &MpInt,
    f: &MpInt,
    secret: &MpInt,
) -> digest::Output<D> {
    kex::DhGex {
        v_c: v_c.to_string().into_bytes().into(),
        v_s: v_s.to_string().into_bytes().into(),
        i_c: i_c.into_packet().payload.into(),
        i_s: i_s.into_packet().payload.into(),
        k_s: k_s.clone(),
        min: request.min,
        n: request.n,
        max: request.max,
        p: p.clone(),
        g: g.clone(),
        e: e.clone(),
        f: f.clone(),
        k: secret.clone(),
    }
    .hash::<D>()
}

pub(super) async fn gex_client<H: Digest + FixedOutputReset>(
    stream: &mut Stream<impl Buffered>,
    v_c: &Id,
    v_s: &Id,
    i_c: &KexInit,
    i_s: &KexInit,
    negotiated: &Negotiated,
    verify: &Verify<'_>,
) -> Result<(Keys, Keys)> {
    let request = KexDhGexRequest {
        min: GEX_MIN_BITS,
        n: GEX_PREFERRED_BITS,
        max: GEX_MAX_BITS,
    };
    stream.send(&request).await?;

    let group: KexDhGexGroup = stream.recv().await?.to()?;

    let p = BigUint::from_bytes_be(group.p.as_positive_bytes());
    let g = BigUint::from_bytes_be(group.g.as_positive_bytes());

    let bits = p.bits() as u32;
    if !(GEX_MIN_BITS..=GEX_MAX_BITS).contains(&bits) {
        return Err(Error::KexError);
    }

    let x = private_exponent(&p);
    let e = g.modpow(&x, &p);
    let e = MpInt::positive(&e.to_bytes_be());

    stream.send(&KexDhGexInit { e: e.clone() }).await?;

    let reply: KexDhGexReply = stream.recv().await?.to()?;

    let f = BigUint::from_bytes_be(reply.f.as_positive_bytes());
    check_public(&f, &p)?;

    let secret = MpInt::positive(&f.modpow(&x, &p).to_bytes_be());

    let k_s = ssh_key::PublicKey::from_bytes(&reply.k_s)?;
    let hash = gex_hash::<H>(
        v_c, v_s, i_c, i_s, &reply.k_s, &request, &group.p, &group.g, &e, &reply.f, &secret,
    );

    verify(&k_s)?;
    Verifier::verify(&k_s, &hash, &Signature::try_from(reply.signature.as_ref())?)?;

    Ok(super::derive::<H>(stream, &secret, &hash, negotiated))
}

pub(super) async fn gex_server<H: Digest + FixedOutputReset>(
    stream: &mut Stream<impl Buffered>,
    v_c: &Id,
    v_s: &Id,
    i_c: &KexInit,
    i_s: &KexInit,
    negotiated: &Negotiated,
    key: &PrivateKey,
) -> Result<(Keys, Keys)> {
    let request: KexDhGexRequest = stream.recv().await?.to()?;

    // Serve the largest supported group that fits the client's range.
    let group: &[u8] = if request.max >= GEX_PREFERRED_BITS {
        &GROUP14_P
    } else if (request.min..=request.max).contains(&GEX_MIN_BITS) {
        &GROUP1_P
    } else {
        return Err(Error::KexError);
    };

    let p = BigUint::from_bytes_be(group);
    let g = BigUint::from(GENERATOR);

    let (p_wire, g_wire) = (
        MpInt::positive(&p.to_bytes_be()),
        MpInt::positive(&g.to_bytes_be()),
    );

    stream
        .send(&KexDhGexGroup {
            p: p_wire.clone(),
            g: g_wire.clone(),
        })
        .await?;

    let init: KexDhGexInit = stream.recv().await?.to()?;

    let e = BigUint::from_bytes_be(init.e.as_positive_bytes());
    check_public(&e, &p)?;

    let y = private_exponent(&p);
    let f = MpInt::positive(&g.modpow(&y, &p).to_bytes_be());

    let secret = MpInt::positive(&e.modpow(&y, &p).to_bytes_be());

    let k_s: Bytes = key.public_key().to_bytes()?.into();
    let hash = gex_hash::<H>(
        v_c, v_s, i_c, i_s, &k_s, &request, &p_wire, &g_wire, &init.e, &f, &secret,
    );

    let signature: Signature = Signer::sign(key, &hash);

    stream
        .send(&KexDhGexReply {
            k_s,
            f,
            signature: signature.to_vec().into(),
        })
        .await?;

    Ok(super::derive::<H>(stream, &secret, &hash, negotiated))
}
