//! The `keyboard-interactive` method handler.

/// A challenge to submit to the authenticating user.
#[derive(Debug, Clone, Default)]
pub struct Challenge {
    /// Name of the challenge.
    pub name: String,

    /// Instructions for the challenge.
    pub instruction: String,

    /// The `(text, echo)` prompts to display, in order.
    pub prompts: Vec<(String, bool)>,
}

/// Validator for the `keyboard-interactive` authentication method.
pub trait Interactive: Send + Sync {
    /// Produce the challenge for this user.
    fn challenge(&mut self, username: &str) -> Challenge;

    /// Whether the responses, one per prompt, grant access.
    fn verify(&mut self, username: &str, responses: &[String]) -> bool;
}

impl Interactive for () {
    fn challenge(&mut self, _: &str) -> Challenge {
        Challenge::default()
    }

    fn verify(&mut self, _: &str, _: &[String]) -> bool {
        false
    }
}
