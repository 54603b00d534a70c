//! Authentication _request_ mechanics, client side.

use sesh::{service::Request, side::Side, Error, Pipe, Result, Session};
use sesh_wire::{
    arch::{Ascii, Bytes, NameList, Utf8},
    cryptography::PublickeySignature,
    trans::DisconnectReason,
    userauth, Packet,
};
use signature::SignatureEncoding;

mod method;
use method::Method;
pub use method::{PasswordProvider, PromptResponder};

#[doc(no_inline)]
pub use ssh_key::PrivateKey;

/// The authentication service [`Request`] for sessions.
///
/// Wraps the service to run once authenticated, most often
/// the `ssh-connection` service.
pub struct Auth<R> {
    username: String,
    service: R,

    methods: Vec<Method>,
}

impl<R: Request> Auth<R> {
    /// Create an [`Auth`] request for the provided _username_,
    /// to access the provided _service_.
    ///
    /// # Note
    /// The request always starts with the `none` authentication method
    /// to discover the methods available on the server.
    pub fn new(username: impl Into<String>, service: R) -> Self {
        Self {
            username: username.into(),
            service,

            methods: Vec::new(),
        }
    }

    /// Attempt to authenticate with the `password` method.
    ///
    /// Only the last provided provider is kept.
    pub fn password(mut self, provider: impl PasswordProvider + 'static) -> Self {
        self.methods
            .retain(|method| !matches!(method, Method::Password { .. }));
        self.methods.push(Method::Password {
            provider: Box::new(provider),
        });

        self
    }

    /// Attempt to authenticate with the `publickey` method.
    ///
    /// May be called multiple times to try several keys, in order.
    pub fn publickey(mut self, key: impl Into<PrivateKey>) -> Self {
        self.methods.push(Method::Publickey {
            key: Box::new(key.into()),
        });

        self
    }

    /// Attempt to authenticate with the `keyboard-interactive` method.
    ///
    /// Only the last provided responder is kept.
    pub fn keyboard_interactive(mut self, responder: impl PromptResponder + 'static) -> Self {
        self.methods
            .retain(|method| !matches!(method, Method::KeyboardInteractive { .. }));
        self.methods.push(Method::KeyboardInteractive {
            responder: Box::new(responder),
        });

        self
    }

    /// Extract the next attemptable method among those the server
    /// advertised as able to continue.
    fn next_method(&mut self, continue_with: &NameList) -> Option<Method> {
        let index = self
            .methods
            .iter()
            .position(|method| continue_with.contains(method.name()))?;

        Some(self.methods.remove(index))
    }

    /// Receive the next authentication response, surfacing
    /// banners along the way.
    async fn recv_response<IO: Pipe, S: Side>(
        session: &mut Session<IO, S>,
    ) -> Result<Packet> {
        loop {
            let packet = session.recv().await?;

            if let Ok(banner) = packet.to::<userauth::Banner>() {
                tracing::info!("Server banner: {}", &*banner.message);

                continue;
            }

            break Ok(packet);
        }
    }

    async fn attempt<IO: Pipe, S: Side>(
        &self,
        session: &mut Session<IO, S>,
        method: &Method,
    ) -> Result<Packet> {
        let build = |method| userauth::Request {
            username: self.username.clone().into(),
            service_name: R::SERVICE_NAME.into(),
            method,
        };

        match method {
            Method::None => {
                session.send(&build(userauth::Method::None)).await?;

                Self::recv_response(session).await
            }
            Method::Publickey { key } => {
                let algorithm: Bytes = key.algorithm().as_str().as_bytes().into();
                let blob: Bytes = key.public_key().to_bytes()?.into();

                // Probe the server to know whether this key is acceptable.
                session
                    .send(&build(userauth::Method::Publickey {
                        algorithm: algorithm.clone(),
                        blob: blob.clone(),
                        signature: None,
                    }))
                    .await?;

                let response = Self::recv_response(session).await?;
                if let Ok(userauth::PkOk { algorithm, blob }) = response.to() {
                    // The key is acceptable, commit with an actual signature.
                    let session_id: Bytes = session
                        .session_id()
                        .ok_or(Error::UnexpectedMessage)?
                        .to_vec()
                        .into();
                    let username: Utf8 = self.username.clone().into();
                    let service_name: Ascii = R::SERVICE_NAME.into();

                    let signature: ssh_key::Signature = PublickeySignature {
                        session_id: &session_id,
                        username: &username,
                        service_name: &service_name,
                        algorithm: &algorithm,
                        blob: &blob,
                    }
                    .sign(&**key);

                    session
                        .send(&build(userauth::Method::Publickey {
                            algorithm,
                            blob,
                            signature: Some(signature.to_vec().into()),
                        }))
                        .await?;

                    Self::recv_response(session).await
                } else {
                    Ok(response)
                }
            }
            Method::Password { provider } => {
                session
                    .send(&build(userauth::Method::Password {
                        password: provider.password().into(),
                        new: None,
                    }))
                    .await?;

                let response = Self::recv_response(session).await?;
                if let Ok(userauth::PasswdChangereq { prompt, .. }) = response.to() {
                    match provider.renewal(&prompt) {
                        Some(new) => {
                            session
                                .send(&build(userauth::Method::Password {
                                    password: provider.password().into(),
                                    new: Some(new.into()),
                                }))
                                .await?;

                            Self::recv_response(session).await
                        }
                        None => {
                            tracing::warn!(
                                "Server requires a password change, abandoning the method"
                            );

                            // Elicit a fresh failure so the exchange moves on.
                            session.send(&build(userauth::Method::None)).await?;

                            Self::recv_response(session).await
                        }
                    }
                } else {
                    Ok(response)
                }
            }
            Method::KeyboardInteractive { responder } => {
                session
                    .send(&build(userauth::Method::KeyboardInteractive {
                        language: Default::default(),
                        submethods: Default::default(),
                    }))
                    .await?;

                loop {
                    let response = Self::recv_response(session).await?;

                    let Ok(info) = response.to::<userauth::InfoRequest>() else {
                        break Ok(response);
                    };

                    let prompts = info
                        .prompts
                        .iter()
                        .map(|prompt| (prompt.prompt.to_string(), *prompt.echo))
                        .collect::<Vec<_>>();

                    // The protocol requires exactly one response per prompt.
                    let mut responses =
                        responder.respond(&info.name, &info.instruction, &prompts);
                    responses.resize(prompts.len(), String::new());

                    session
                        .send(&userauth::InfoResponse {
                            responses: responses.into_iter().map(Into::into).collect(),
                        })
                        .await?;
                }
            }
        }
    }
}

impl<R: Request> Request for Auth<R> {
    type Err = R::Err;
    type Ok<IO: Pipe, S: Side> = R::Ok<IO, S>;

    const SERVICE_NAME: &'static str = crate::SERVICE_NAME;
    const CLAIM: std::ops::RangeInclusive<u8> = crate::CLAIM;

    async fn on_accept<IO, S>(
        mut self,
        mut session: Session<IO, S>,
    ) -> Result<Self::Ok<IO, S>, Self::Err>
    where
        IO: Pipe,
        S: Side,
    {
        let mut method = Method::None;

        loop {
            let response = self.attempt(&mut session, &method).await?;

            if response.to::<userauth::Success>().is_ok() {
                tracing::debug!("Authentication successful for `{}`", self.username);

                session.claim(R::SERVICE_NAME, R::CLAIM);

                break self.service.on_accept(session).await;
            } else if let Ok(userauth::Failure {
                continue_with,
                partial_success,
            }) = response.to()
            {
                if *partial_success {
                    tracing::debug!(
                        "Method `{}` satisfied, the server requires more",
                        method.name()
                    );
                }

                if let Some(next) = self.next_method(&continue_with) {
                    method = next;
                } else {
                    break Err(Error::from(
                        session
                            .disconnect(
                                DisconnectReason::NoMoreAuthMethodsAvailable,
                                "Exhausted available authentication methods",
                            )
                            .await,
                    )
                    .into());
                }
            } else {
                break Err(Error::from(
                    session
                        .disconnect(
                            DisconnectReason::ProtocolError,
                            format!(
                                "Unexpected message in the context of the `{}` service request",
                                Self::SERVICE_NAME
                            ),
                        )
                        .await,
                )
                .into());
            }
        }
    }
}
