#![allow(clippy::unwrap_used)]

use async_compat::{Compat, CompatExt};
use futures::{future::BoxFuture, AsyncReadExt, AsyncWriteExt, FutureExt, TryStreamExt};
use rand::{Rng, SeedableRng};
use sha1::Digest;
use tokio::io::DuplexStream;

use sesh::{
    side::{client::Client, server::Server},
    Session,
};
use sesh_connect::{channel, channel_open, Service};
use sesh_wire::connect::{ChannelOpenContext, ChannelRequestContext};

type IO = Compat<DuplexStream>;

async fn io<S, C>(serverside: S, clientside: C) -> Result<(), Box<dyn std::error::Error>>
where
    S: for<'c> Fn(&'c channel::Channel<'c, IO, Server>) -> BoxFuture<'c, ()>,
    C: for<'c> Fn(&'c channel::Channel<'c, IO, Client>) -> BoxFuture<'c, ()>,
{
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let duplex = tokio::io::duplex(sesh_wire::PACKET_MAX_SIZE * 16);
    let keys = vec![ssh_key::PrivateKey::random(
        &mut rand::thread_rng(),
        ssh_key::Algorithm::Ed25519,
    )?];

    tokio::try_join!(
        async {
            let server = Server {
                keys,
                ..Default::default()
            };
            let session = Session::new(duplex.0.compat(), server).await?;

            let connect = session.handle(Service::default()).await?;
            {
                let channel = connect
                    .channel_opens()
                    .try_next()
                    .await?
                    .expect("Disconnected before opening at least one channel")
                    .accept()
                    .await?;

                serverside(&channel).await;

                channel.close().await?;
            }

            Ok::<_, Box<dyn std::error::Error>>(())
        },
        async {
            let client = Client {
                verifier: std::sync::Arc::new(|_: &str, _: u16, _: &ssh_key::PublicKey| true),
                ..Default::default()
            };
            let session = Session::new(duplex.1.compat(), client).await?;

            let connect = session.request(Service::default()).await?;
            let channel_open::Response::Success(channel) =
                connect.channel_open(ChannelOpenContext::Session).await?
            else {
                panic!("Channel opening rejected server-side")
            };

            clientside(&channel).await;

            channel.close().await?;

            Ok::<_, Box<dyn std::error::Error>>(())
        },
    )?;

    Ok(())
}

#[tokio::test]
async fn echo_small() -> Result<(), Box<dyn std::error::Error>> {
    io(
        |channel| {
            async move {
                let (mut reader, mut writer) = (channel.as_reader(), channel.as_writer());
                futures::io::copy(&mut reader, &mut writer).await.unwrap();
                writer.flush().await.unwrap();

                channel.eof().await.unwrap();
            }
            .boxed()
        },
        |channel| {
            async move {
                let mut rng = rand::rngs::SmallRng::from_entropy();
                let (mut local, mut recvd) = (sha1::Sha1::new(), sha1::Sha1::new());

                futures::join!(
                    async {
                        let mut buffer = [0u8; 8192];
                        rng.fill(&mut buffer[..]);
                        local.update(buffer);

                        futures::io::copy(&mut &buffer[..], &mut channel.as_writer())
                            .await
                            .unwrap();

                        channel.eof().await.unwrap();
                    },
                    async {
                        futures::io::copy(
                            &mut channel.as_reader(),
                            &mut futures::io::AllowStdIo::new(&mut recvd),
                        )
                        .await
                        .unwrap();
                    }
                );

                assert_eq!(local.finalize(), recvd.finalize())
            }
            .boxed()
        },
    )
    .await
}

#[tokio::test]
async fn echo_large() -> Result<(), Box<dyn std::error::Error>> {
    io(
        |channel| {
            async move {
                let (mut reader, mut writer) = (channel.as_reader(), channel.as_writer());
                futures::io::copy(&mut reader, &mut writer).await.unwrap();
                writer.flush().await.unwrap();

                channel.eof().await.unwrap();
            }
            .boxed()
        },
        |channel| {
            async move {
                let mut rng = rand::rngs::SmallRng::from_entropy();
                let (mut local, mut recvd) = (sha1::Sha1::new(), sha1::Sha1::new());

                futures::join!(
                    async {
                        const BYTES_TO_SEND: u64 = 0xFFFFF * 2;
                        let mut current = 0;

                        while current < BYTES_TO_SEND {
                            let mut buffer = [0u8; 65535];
                            rng.fill(&mut buffer[..]);
                            local.update(buffer);

                            current +=
                                futures::io::copy(&mut &buffer[..], &mut channel.as_writer())
                                    .await
                                    .unwrap();
                        }

                        channel.eof().await.unwrap();
                    },
                    async {
                        futures::io::copy(
                            &mut channel.as_reader(),
                            &mut futures::io::AllowStdIo::new(&mut recvd),
                        )
                        .await
                        .unwrap();
                    }
                );

                assert_eq!(local.finalize(), recvd.finalize())
            }
            .boxed()
        },
    )
    .await
}

#[tokio::test]
async fn exec_with_exit_status() -> Result<(), Box<dyn std::error::Error>> {
    io(
        |channel| {
            async move {
                let request = channel
                    .requests()
                    .try_next()
                    .await
                    .unwrap()
                    .expect("Expected an exec request");

                let ChannelRequestContext::Exec { command } = request.cx() else {
                    panic!("Expected an exec request, got {:?}", request.cx());
                };
                assert_eq!(command.as_ref(), b"echo hello".as_slice());
                request.accept().await.unwrap();

                let mut writer = channel.as_writer();
                writer.write_all(b"hello\n").await.unwrap();
                writer.flush().await.unwrap();
                channel.eof().await.unwrap();

                channel
                    .request(ChannelRequestContext::ExitStatus { code: 0 })
                    .await
                    .unwrap();
            }
            .boxed()
        },
        |channel| {
            async move {
                // Register for requests before any can arrive, the
                // exit status lands after the data stream ends.
                let mut requests = channel.requests();

                channel
                    .request_wait(ChannelRequestContext::Exec {
                        command: "echo hello".into(),
                    })
                    .await
                    .expect("The exec request should be accepted");

                let mut stdout = Vec::new();
                channel
                    .as_reader()
                    .read_to_end(&mut stdout)
                    .await
                    .unwrap();
                assert_eq!(stdout, b"hello\n");

                let request = requests
                    .try_next()
                    .await
                    .unwrap()
                    .expect("Expected an exit-status request");
                let ChannelRequestContext::ExitStatus { code } = request.cx() else {
                    panic!("Expected an exit status, got {:?}", request.cx());
                };
                assert_eq!(*code, 0);
                request.accept().await.unwrap();
            }
            .boxed()
        },
    )
    .await
}
