#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use async_std::net::TcpStream;
use rstest::rstest;

use sesh::{
    algorithm::{Algorithms, Registry},
    side::client::Client,
    Error, Session,
};
use sesh_wire::{
    connect::{ChannelOpen, ChannelOpenConfirmation, ChannelOpenContext},
    trans::{Disconnect, DisconnectReason, ServiceAccept, ServiceRequest},
    userauth,
};

mod common;

fn client(cipher: &str, mac: &str, kex: &str) -> Client {
    Client {
        algorithms: Algorithms {
            kexs: Registry::new([kex.parse().unwrap()]),
            ciphers: Registry::new([cipher.parse().unwrap()]),
            macs: Registry::new([mac.parse().unwrap()]),
            ..Default::default()
        },
        verifier: Arc::new(|_: &str, _: u16, _: &ssh_key::PublicKey| true),
        ..Default::default()
    }
}

#[rstest]
#[case("aes128-cbc", "hmac-sha1", "curve25519-sha256")]
#[case("aes192-cbc", "hmac-sha2-256", "curve25519-sha256")]
#[case("aes256-cbc", "hmac-sha2-512", "curve25519-sha256")]
#[case("aes128-cbc", "hmac-sha1-etm@openssh.com", "curve25519-sha256")]
#[case("aes192-cbc", "hmac-sha2-256-etm@openssh.com", "curve25519-sha256")]
#[case("aes256-cbc", "hmac-sha2-512-etm@openssh.com", "curve25519-sha256")]
#[case("aes128-ctr", "hmac-sha1", "curve25519-sha256")]
#[case("aes192-ctr", "hmac-sha2-256", "curve25519-sha256")]
#[case("aes256-ctr", "hmac-sha2-512", "curve25519-sha256")]
#[case("aes128-ctr", "hmac-sha1-96", "curve25519-sha256")]
#[case("aes128-ctr", "hmac-md5", "curve25519-sha256")]
#[case("aes128-ctr", "hmac-md5-96", "curve25519-sha256")]
#[case("aes128-ctr", "hmac-sha2-256", "ecdh-sha2-nistp256")]
#[case("aes192-ctr", "hmac-sha2-256", "ecdh-sha2-nistp384")]
#[case("aes256-ctr", "hmac-sha2-256", "ecdh-sha2-nistp521")]
#[case("aes128-ctr", "hmac-sha1", "diffie-hellman-group1-sha1")]
#[case("aes128-ctr", "hmac-sha1", "diffie-hellman-group14-sha1")]
#[case("aes128-ctr", "hmac-sha2-256", "diffie-hellman-group-exchange-sha256")]
#[async_std::test]
async fn end_to_end(
    #[case] cipher: &str,
    #[case] mac: &str,
    #[case] kex: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let (addr, handle) = common::server().await?;

    tracing::info!("cipher::{cipher}, mac::{mac}, kex::{kex}, bound to {addr}");

    let stream = TcpStream::connect(addr).await?;
    let mut client = Session::new(stream, client(cipher, mac, kex)).await?;
    client.claim("ssh-userauth", 50..=79);
    client.claim("ssh-connection", 80..=127);

    client
        .send(&ServiceRequest {
            service_name: "ssh-userauth".into(),
        })
        .await?;
    client
        .recv()
        .await?
        .to::<ServiceAccept>()
        .expect("Service refused by peer");

    let first_session_id = client.session_id().map(<[u8]>::to_vec);
    assert!(first_session_id.is_some());

    client
        .send(&userauth::Request {
            username: "user".into(),
            service_name: "ssh-connection".into(),
            method: userauth::Method::None,
        })
        .await?;
    client
        .recv()
        .await?
        .to::<userauth::Success>()
        .expect("Auth refused by peer");

    client
        .send(&ChannelOpen {
            sender_channel: 0,
            initial_window_size: 128,
            maximum_packet_size: 128,
            context: ChannelOpenContext::Session,
        })
        .await?;
    client
        .recv()
        .await?
        .to::<ChannelOpenConfirmation>()
        .expect("Channel open refused by peer");

    // The server's oversized ignore forced a re-exchange along the way,
    // and the session identifier stuck to the first exchange hash.
    assert_eq!(
        first_session_id,
        client.session_id().map(<[u8]>::to_vec),
    );

    client
        .send(&Disconnect {
            reason: DisconnectReason::ByApplication,
            description: "bbbb".into(),
            language: Default::default(),
        })
        .await?;

    let message = handle.await;

    tracing::info!("message: {message:?}");

    assert!(matches!(message, Err(Error::Disconnected(_))));

    Ok(())
}

#[async_std::test]
async fn strict_verifier_rejects_by_default() -> Result<(), Box<dyn std::error::Error>> {
    let (addr, _handle) = common::server().await?;

    let stream = TcpStream::connect(addr).await?;
    let client = Session::new(
        stream,
        Client {
            // The default verifier accepts no host key at all.
            ..Default::default()
        },
    )
    .await?;

    // The first exchange runs lazily on the first send.
    let mut client = client;
    let result = client
        .send(&ServiceRequest {
            service_name: "ssh-userauth".into(),
        })
        .await;

    assert!(matches!(result, Err(Error::HostKeyRejected)));

    Ok(())
}

#[async_std::test]
async fn no_common_algorithm_fails_negotiation() -> Result<(), Box<dyn std::error::Error>> {
    let (addr, _handle) = common::server().await?;

    let stream = TcpStream::connect(addr).await?;
    let mut client = Session::new(
        stream,
        Client {
            algorithms: Algorithms {
                macs: Registry::new([]),
                ..Default::default()
            },
            verifier: Arc::new(|_: &str, _: u16, _: &ssh_key::PublicKey| true),
            ..Default::default()
        },
    )
    .await?;

    let result = client
        .send(&ServiceRequest {
            service_name: "ssh-userauth".into(),
        })
        .await;

    assert!(matches!(result, Err(Error::NoCommonHmac)));

    Ok(())
}
