#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use async_std::net::{TcpListener, TcpStream};
use async_std::stream::StreamExt;

use sesh::{
    side::{client::Client, server::Server, Side},
    DisconnectedBy, Error, Pipe, Session,
};
use sesh_auth::{handler, request};
use sesh_wire::trans::DisconnectReason;

/// A terminal `ssh-connection` stub that simply hands the session back.
struct Connection;

impl sesh::service::Request for Connection {
    type Err = Error;
    type Ok<I: Pipe, S: Side> = Session<I, S>;

    const SERVICE_NAME: &'static str = "ssh-connection";
    const CLAIM: std::ops::RangeInclusive<u8> = 80..=127;

    async fn on_accept<I: Pipe, S: Side>(
        self,
        session: Session<I, S>,
    ) -> Result<Session<I, S>, Error> {
        Ok(session)
    }
}

impl sesh::service::Handler for Connection {
    type Err = Error;
    type Ok<I: Pipe, S: Side> = Session<I, S>;

    const SERVICE_NAME: &'static str = "ssh-connection";
    const CLAIM: std::ops::RangeInclusive<u8> = 80..=127;

    async fn on_request<I: Pipe, S: Side>(
        self,
        session: Session<I, S>,
    ) -> Result<Session<I, S>, Error> {
        Ok(session)
    }
}

async fn io<F, H>(
    handler: F,
    request: request::Auth<Connection>,
) -> (Result<(), Error>, Result<(), Error>)
where
    F: FnOnce(handler::Auth<Connection>) -> H + Send + 'static,
    H: sesh::service::Handler<Err = Error> + Send,
{
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let socket = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = socket.local_addr().unwrap();

    let serverside = async_std::task::spawn_local(async move {
        let stream = socket.incoming().next().await.unwrap()?;

        let server = Server {
            keys: vec![ssh_key::PrivateKey::random(
                &mut rand::thread_rng(),
                ssh_key::Algorithm::Ed25519,
            )
            .unwrap()],
            ..Default::default()
        };

        let session = Session::new(stream, server).await?;
        session.handle(handler(handler::Auth::new(Connection))).await?;

        Ok::<_, Error>(())
    });

    let clientside = async {
        let stream = TcpStream::connect(addr).await?;

        let client = Client {
            verifier: Arc::new(|_: &str, _: u16, _: &ssh_key::PublicKey| true),
            ..Default::default()
        };

        let session = Session::new(stream, client).await?;
        session.request(request).await?;

        Ok::<_, Error>(())
    };

    let clientside = clientside.await;
    let serverside = serverside.await;

    (serverside, clientside)
}

#[async_std::test]
async fn password_accepted() {
    let (serverside, clientside) = io(
        |auth| auth.password(|user: &str, password: &str| user == "smx" && password == "smx"),
        request::Auth::new("smx", Connection).password("smx"),
    )
    .await;

    clientside.expect("the client should be authenticated");
    serverside.expect("the server should have accepted the exchange");
}

#[async_std::test]
async fn password_rejected() {
    let (_, clientside) = io(
        |auth| auth.password(|user: &str, password: &str| user == "smx" && password == "smx"),
        request::Auth::new("smx", Connection).password("wrong"),
    )
    .await;

    match clientside {
        Err(Error::Disconnected(err)) => {
            assert_eq!(err.by, DisconnectedBy::Us);
            assert_eq!(err.reason, DisconnectReason::NoMoreAuthMethodsAvailable);
        }
        other => panic!("expected an auth exhaustion disconnect, got {other:?}"),
    }
}

#[async_std::test]
async fn unknown_key_then_password() {
    let key =
        ssh_key::PrivateKey::random(&mut rand::thread_rng(), ssh_key::Algorithm::Ed25519).unwrap();

    let (serverside, clientside) = io(
        |auth| {
            auth.publickey(|_: &str, _: &ssh_key::PublicKey| false)
                .password(|user: &str, password: &str| user == "smx" && password == "smx")
        },
        request::Auth::new("smx", Connection)
            .publickey(key)
            .password("smx"),
    )
    .await;

    clientside.expect("the password fallback should authenticate");
    serverside.expect("the server should have accepted the exchange");
}

#[async_std::test]
async fn partial_success_requires_both_methods() {
    let key =
        ssh_key::PrivateKey::random(&mut rand::thread_rng(), ssh_key::Algorithm::Ed25519).unwrap();
    let authorized = key.public_key().clone();

    let (serverside, clientside) = io(
        move |auth| {
            auth.require(["publickey", "password"])
                .publickey(move |user: &str, key: &ssh_key::PublicKey| {
                    user == "smx" && key == &authorized
                })
                .password(|user: &str, password: &str| user == "smx" && password == "smx")
        },
        request::Auth::new("smx", Connection)
            .publickey(key)
            .password("smx"),
    )
    .await;

    clientside.expect("both methods together should authenticate");
    serverside.expect("the server should have accepted the exchange");
}

#[async_std::test]
async fn keyboard_interactive_round() {
    let (serverside, clientside) = io(
        |auth| {
            auth.keyboard_interactive(Quiz)
        },
        request::Auth::new("smx", Connection).keyboard_interactive(
            |_: &str, _: &str, prompts: &[(String, bool)]| {
                prompts.iter().map(|_| "blue".to_string()).collect()
            },
        ),
    )
    .await;

    clientside.expect("the answered challenge should authenticate");
    serverside.expect("the server should have accepted the exchange");
}

struct Quiz;

impl handler::interactive::Interactive for Quiz {
    fn challenge(&mut self, _: &str) -> handler::Challenge {
        handler::Challenge {
            name: "quiz".into(),
            instruction: "answer wisely".into(),
            prompts: vec![("favorite color?".into(), true)],
        }
    }

    fn verify(&mut self, _: &str, responses: &[String]) -> bool {
        responses == ["blue"]
    }
}
