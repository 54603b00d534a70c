//! Authentication _handling_ mechanics, server side.

use sesh::{service::Handler, side::Side, Error, Pipe, Result, Session};
use sesh_wire::{
    arch::{Ascii, Bytes, NameList, Utf8},
    cryptography::PublickeySignature,
    trans::DisconnectReason,
    userauth,
};

pub mod interactive;
pub mod password;
pub mod publickey;

pub use interactive::Challenge;

/// The authentication service [`Handler`] for sessions.
///
/// Wraps the service to start once authenticated and rejects
/// every authentication method by default.
pub struct Auth<H, P = (), PK = (), KI = ()> {
    banner: Option<String>,
    max_attempts: usize,
    required: Vec<&'static str>,
    advertised: Vec<&'static str>,

    handler: H,

    password: P,
    publickey: PK,
    interactive: KI,
}

impl<H: Handler> Auth<H> {
    /// Create an [`Auth`] handler wrapping the provided _service_.
    pub fn new(handler: H) -> Self {
        Self {
            banner: None,
            max_attempts: crate::MAX_ATTEMPTS,
            required: Vec::new(),
            advertised: Vec::new(),

            handler,

            password: (),
            publickey: (),
            interactive: (),
        }
    }
}

impl<H, P, PK, KI> Auth<H, P, PK, KI>
where
    H: Handler,
    P: password::Password,
    PK: publickey::Publickey,
    KI: interactive::Interactive,
{
    /// Set the banner text displayed upon authentication.
    pub fn banner(mut self, banner: impl Into<String>) -> Self {
        self.banner = Some(banner.into());

        self
    }

    /// Cap the authentication attempts before disconnection.
    pub fn max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;

        self
    }

    /// Require _all_ of the named methods to succeed, driving the
    /// `partial success` flag in between.
    ///
    /// When unset, any single succeeding method authenticates the user.
    pub fn require(mut self, methods: impl IntoIterator<Item = &'static str>) -> Self {
        self.required = methods.into_iter().collect();

        self
    }

    /// Set the handler for the `password` method.
    pub fn password<T: password::Password>(self, password: T) -> Auth<H, T, PK, KI> {
        let Self {
            banner,
            max_attempts,
            required,
            mut advertised,
            handler,
            password: _,
            publickey,
            interactive,
        } = self;

        advertised.push("password");

        Auth {
            banner,
            max_attempts,
            required,
            advertised,
            handler,
            password,
            publickey,
            interactive,
        }
    }

    /// Set the handler for the `publickey` method.
    pub fn publickey<T: publickey::Publickey>(self, publickey: T) -> Auth<H, P, T, KI> {
        let Self {
            banner,
            max_attempts,
            required,
            mut advertised,
            handler,
            password,
            publickey: _,
            interactive,
        } = self;

        advertised.push("publickey");

        Auth {
            banner,
            max_attempts,
            required,
            advertised,
            handler,
            password,
            publickey,
            interactive,
        }
    }

    /// Set the handler for the `keyboard-interactive` method.
    pub fn keyboard_interactive<T: interactive::Interactive>(
        self,
        interactive: T,
    ) -> Auth<H, P, PK, T> {
        let Self {
            banner,
            max_attempts,
            required,
            mut advertised,
            handler,
            password,
            publickey,
            interactive: _,
        } = self;

        advertised.push("keyboard-interactive");

        Auth {
            banner,
            max_attempts,
            required,
            advertised,
            handler,
            password,
            publickey,
            interactive,
        }
    }

    /// The methods still able to authenticate this session.
    fn continue_with(&self, satisfied: &[&'static str]) -> NameList {
        self.advertised
            .iter()
            .filter(|method| !satisfied.contains(method))
            .collect()
    }

    /// Whether the session is fully authenticated given the
    /// methods satisfied so far.
    fn authenticated(&self, satisfied: &[&'static str]) -> bool {
        if self.required.is_empty() {
            !satisfied.is_empty()
        } else {
            self.required
                .iter()
                .all(|method| satisfied.contains(method))
        }
    }
}

impl<H, P, PK, KI> Handler for Auth<H, P, PK, KI>
where
    H: Handler,
    P: password::Password,
    PK: publickey::Publickey,
    KI: interactive::Interactive,
{
    type Err = H::Err;
    type Ok<IO: Pipe, S: Side> = H::Ok<IO, S>;

    const SERVICE_NAME: &'static str = crate::SERVICE_NAME;
    const CLAIM: std::ops::RangeInclusive<u8> = crate::CLAIM;

    async fn on_request<IO, S>(
        mut self,
        mut session: Session<IO, S>,
    ) -> Result<Self::Ok<IO, S>, Self::Err>
    where
        IO: Pipe,
        S: Side,
    {
        if let Some(banner) = self.banner.take() {
            session
                .send(&userauth::Banner {
                    message: banner.into(),
                    language: Default::default(),
                })
                .await
                .map_err(H::Err::from)?;
        }

        let mut satisfied: Vec<&'static str> = Vec::new();
        let mut attempts = 0usize;

        loop {
            let packet = session.recv().await.map_err(H::Err::from)?;

            let Ok(request) = packet.to::<userauth::Request>() else {
                break Err(Error::from(
                    session
                        .disconnect(
                            DisconnectReason::ProtocolError,
                            format!(
                                "Unexpected message in the context of the `{}` service",
                                Self::SERVICE_NAME
                            ),
                        )
                        .await,
                )
                .into());
            };

            if &*request.service_name != H::SERVICE_NAME {
                break Err(Error::from(
                    session
                        .disconnect(
                            DisconnectReason::ServiceNotAvailable,
                            "Requested service is unknown",
                        )
                        .await,
                )
                .into());
            }

            let username = request.username.to_string();
            let method = request.method.as_str();

            let granted = match request.method {
                userauth::Method::None => false,
                userauth::Method::Password { password, .. } => {
                    attempts += 1;

                    self.advertised.contains(&"password")
                        && self.password.check(&username, &password)
                }
                userauth::Method::Publickey {
                    algorithm,
                    blob,
                    signature,
                } => {
                    let key = ssh_key::PublicKey::from_bytes(&blob).ok();
                    let acceptable = self.advertised.contains(&"publickey")
                        && key
                            .as_ref()
                            .is_some_and(|key| self.publickey.check(&username, key));

                    match signature {
                        None if acceptable => {
                            // Only a probe, answer it without burning an attempt.
                            session
                                .send(&userauth::PkOk { algorithm, blob })
                                .await
                                .map_err(H::Err::from)?;

                            continue;
                        }
                        None => {
                            attempts += 1;

                            false
                        }
                        Some(signature) => {
                            attempts += 1;

                            let verified = || -> Option<()> {
                                let session_id: Bytes =
                                    session.session_id()?.to_vec().into();
                                let username: Utf8 = username.clone().into();
                                let service_name: Ascii = H::SERVICE_NAME.into();

                                let signature =
                                    ssh_key::Signature::try_from(signature.as_ref()).ok()?;

                                PublickeySignature {
                                    session_id: &session_id,
                                    username: &username,
                                    service_name: &service_name,
                                    algorithm: &algorithm,
                                    blob: &blob,
                                }
                                .verify(key.as_ref()?, &signature)
                                .ok()
                            };

                            acceptable && verified().is_some()
                        }
                    }
                }
                userauth::Method::KeyboardInteractive { .. } => {
                    attempts += 1;

                    if self.advertised.contains(&"keyboard-interactive") {
                        let challenge = self.interactive.challenge(&username);

                        session
                            .send(&userauth::InfoRequest {
                                name: challenge.name.into(),
                                instruction: challenge.instruction.into(),
                                language: Default::default(),
                                prompts: challenge
                                    .prompts
                                    .into_iter()
                                    .map(|(prompt, echo)| userauth::InfoRequestPrompt {
                                        prompt: prompt.into(),
                                        echo: echo.into(),
                                    })
                                    .collect(),
                            })
                            .await
                            .map_err(H::Err::from)?;

                        let response = session.recv().await.map_err(H::Err::from)?;
                        match response.to::<userauth::InfoResponse>() {
                            Ok(info) => {
                                let responses = info
                                    .responses
                                    .iter()
                                    .map(ToString::to_string)
                                    .collect::<Vec<_>>();

                                self.interactive.verify(&username, &responses)
                            }
                            Err(_) => false,
                        }
                    } else {
                        false
                    }
                }
                userauth::Method::Hostbased { .. } => {
                    attempts += 1;

                    false
                }
            };

            if granted {
                if !satisfied.contains(&method) {
                    satisfied.push(method);
                }

                if self.authenticated(&satisfied) {
                    session.send(&userauth::Success).await.map_err(H::Err::from)?;

                    tracing::debug!("Authentication successful for `{username}`");

                    session.claim(H::SERVICE_NAME, H::CLAIM);

                    break self.handler.on_request(session).await;
                }

                // One required method down, more to go.
                session
                    .send(&userauth::Failure {
                        continue_with: self.continue_with(&satisfied),
                        partial_success: true.into(),
                    })
                    .await
                    .map_err(H::Err::from)?;

                continue;
            }

            if attempts >= self.max_attempts {
                break Err(Error::from(
                    session
                        .disconnect(
                            DisconnectReason::NoMoreAuthMethodsAvailable,
                            "Too many authentication attempts",
                        )
                        .await,
                )
                .into());
            }

            session
                .send(&userauth::Failure {
                    continue_with: self.continue_with(&satisfied),
                    partial_success: false.into(),
                })
                .await
                .map_err(H::Err::from)?;
        }
    }
}
