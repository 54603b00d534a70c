//! The `publickey` method handler.

/// Validator for the `publickey` authentication method.
///
/// The signature itself is verified by the service beforehand;
/// implementations only decide whether the key is authorized.
pub trait Publickey: Send + Sync {
    /// Whether the `(username, key)` pair grants access.
    fn check(&mut self, username: &str, key: &ssh_key::PublicKey) -> bool;
}

impl<F> Publickey for F
where
    F: FnMut(&str, &ssh_key::PublicKey) -> bool + Send + Sync,
{
    fn check(&mut self, username: &str, key: &ssh_key::PublicKey) -> bool {
        (self)(username, key)
    }
}

impl Publickey for () {
    fn check(&mut self, _: &str, _: &ssh_key::PublicKey) -> bool {
        false
    }
}
