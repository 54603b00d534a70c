use std::net::SocketAddr;

use async_std::{net::TcpListener, stream::StreamExt};

use sesh::{
    side::server::Server,
    stream::RekeyThresholds,
    Result, Session,
};
use sesh_wire::{
    connect::{ChannelOpen, ChannelOpenConfirmation},
    trans::Ignore,
    userauth, Packet,
};

/// Spawn a single-connection server that accepts any `ssh-userauth`
/// exchange, confirms one channel open and returns the next packet.
pub async fn server() -> Result<(SocketAddr, impl futures::Future<Output = Result<Packet>>)> {
    let socket = TcpListener::bind(("127.0.0.1", 0)).await?;
    let addr = socket.local_addr()?;

    let handle = async_std::task::spawn_local(async move {
        let stream = socket.incoming().next().await.unwrap()?;

        let server = Server {
            keys: vec![ssh_key::PrivateKey::random(
                &mut rand::thread_rng(),
                ssh_key::Algorithm::Ed25519,
            )
            .unwrap()],
            // A tiny byte threshold so the oversized ignore below
            // forces a key re-exchange mid-session.
            rekey: RekeyThresholds {
                bytes: 1024,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut session = Session::new(stream, server).await?;
        session.claim("ssh-userauth", 50..=79);
        session.claim("ssh-connection", 80..=127);

        session
            .send(&Ignore {
                data: vec![0; 8192].into(),
            })
            .await?;

        let request = session.recv().await?;
        request
            .to::<sesh_wire::trans::ServiceRequest>()
            .expect("Expected a service request");

        session
            .send(&sesh_wire::trans::ServiceAccept {
                service_name: "ssh-userauth".into(),
            })
            .await?;

        let request = session.recv().await?;
        if request.to::<userauth::Request>().is_ok() {
            session.send(&userauth::Success).await?;
        }

        let open = session.recv().await?;
        if let Ok(open) = open.to::<ChannelOpen>() {
            session
                .send(&ChannelOpenConfirmation {
                    recipient_channel: open.sender_channel,
                    sender_channel: 0,
                    initial_window_size: open.initial_window_size,
                    maximum_packet_size: open.maximum_packet_size,
                })
                .await?;
        }

        session.recv().await
    });

    Ok((addr, handle))
}
