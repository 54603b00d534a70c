use crate::{Error, Result};

/// An ordered set of enabled algorithms, extendable at runtime with
/// vendor aliases for the built-in entries.
///
/// Extension names are matched case-insensitively, and registration
/// rejects collisions with built-in names and with prior extensions.
#[derive(Debug, Clone)]
pub struct Registry<T> {
    builtin: Vec<T>,
    extensions: Vec<(String, T)>,
}

impl<T> Registry<T>
where
    T: Clone + AsRef<str> + std::str::FromStr,
{
    /// Create a [`Registry`] from built-in entries, most preferred first.
    pub fn new(builtin: impl IntoIterator<Item = T>) -> Self {
        Self {
            builtin: builtin.into_iter().collect(),
            extensions: Vec::new(),
        }
    }

    /// Register an extension `name` resolving to `entry`.
    ///
    /// The name is appended to the announced preference list, after
    /// the built-in entries and previously registered extensions.
    pub fn register(&mut self, name: impl Into<String>, entry: T) -> Result<()> {
        let name = name.into();

        let collides = |known: &str| known.eq_ignore_ascii_case(&name);
        if self.builtin.iter().any(|entry| collides(entry.as_ref()))
            || self.extensions.iter().any(|(known, _)| collides(known))
        {
            return Err(Error::AlgorithmCollision(name));
        }

        self.extensions.push((name, entry));

        Ok(())
    }

    /// All announced names, built-ins first, in preference order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.builtin
            .iter()
            .map(AsRef::as_ref)
            .chain(self.extensions.iter().map(|(name, _)| name.as_str()))
    }

    /// Resolve a negotiated `name` to its algorithm, looking through
    /// the built-in entries first and extensions second.
    pub fn resolve(&self, name: &str) -> Option<T> {
        if self.builtin.iter().any(|entry| entry.as_ref() == name) {
            return name.parse().ok();
        }

        self.extensions
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(name))
            .map(|(_, entry)| entry.clone())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::algorithm::Kex;

    #[test]
    fn it_rejects_collisions_with_builtins() {
        let mut registry = Registry::new([Kex::Curve25519Sha256]);

        registry
            .register("Curve25519-Sha256", Kex::Curve25519Sha256)
            .unwrap_err();
    }

    #[test]
    fn it_rejects_collisions_with_prior_extensions() {
        let mut registry = Registry::new([Kex::Curve25519Sha256]);

        registry
            .register("kex@vendor.example", Kex::Curve25519Sha256)
            .unwrap();
        registry
            .register("KEX@vendor.example", Kex::Curve25519Sha256)
            .unwrap_err();
    }

    #[test]
    fn it_resolves_extensions_to_their_algorithm() {
        let mut registry = Registry::new([Kex::Curve25519Sha256]);

        registry
            .register("nistp256@vendor.example", Kex::EcdhSha2Nistp256)
            .unwrap();

        assert_eq!(
            registry.resolve("nistp256@vendor.example"),
            Some(Kex::EcdhSha2Nistp256)
        );
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            ["curve25519-sha256", "nistp256@vendor.example"]
        );
    }
}
