use ssh_key::PrivateKey;

/// Provider of the secret for the `password` method,
/// including optional renewal on a server change request.
pub trait PasswordProvider: Send + Sync {
    /// The password to present to the server.
    fn password(&self) -> String;

    /// A replacement password when the server requires a change,
    /// `None` abandons the method.
    fn renewal(&self, _prompt: &str) -> Option<String> {
        None
    }
}

impl PasswordProvider for String {
    fn password(&self) -> String {
        self.clone()
    }
}

impl PasswordProvider for &'static str {
    fn password(&self) -> String {
        (*self).to_owned()
    }
}

/// Responder for `keyboard-interactive` challenges.
pub trait PromptResponder: Send + Sync {
    /// Produce one response per prompt, in order.
    ///
    /// Prompts are `(text, echo)` pairs, where `echo` tells whether
    /// the typed response may be displayed back.
    fn respond(&self, name: &str, instruction: &str, prompts: &[(String, bool)]) -> Vec<String>;
}

impl<F> PromptResponder for F
where
    F: Fn(&str, &str, &[(String, bool)]) -> Vec<String> + Send + Sync,
{
    fn respond(&self, name: &str, instruction: &str, prompts: &[(String, bool)]) -> Vec<String> {
        (self)(name, instruction, prompts)
    }
}

/// Possible authentication methods on the requesting side.
pub(super) enum Method {
    /// The SSH `none` authentication method, used as a probe.
    None,

    /// The SSH `publickey` authentication method.
    Publickey { key: Box<PrivateKey> },

    /// The SSH `password` authentication method.
    Password { provider: Box<dyn PasswordProvider> },

    /// The SSH `keyboard-interactive` authentication method.
    KeyboardInteractive { responder: Box<dyn PromptResponder> },
}

impl Method {
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Publickey { .. } => "publickey",
            Self::Password { .. } => "password",
            Self::KeyboardInteractive { .. } => "keyboard-interactive",
        }
    }
}

impl std::fmt::Debug for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
