use binrw::binrw;

use super::Ascii;

/// A `name-list` as defined in the SSH protocol,
/// a `,`-separated list of non-empty, printable **ASCII** identifiers.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4251#section-5>.
#[binrw]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[brw(big, assert(self_0.chars().all(|c| c.is_ascii_graphic())))]
pub struct NameList(Ascii);

impl NameList {
    /// Retrieve the first name from `self` that is also in `other`.
    pub fn preferred_in(&self, other: &Self) -> Option<&str> {
        self.into_iter()
            .find(|&name| other.into_iter().any(|n| name == n))
    }

    /// Whether the name `name` appears in the list.
    pub fn contains(&self, name: &str) -> bool {
        self.into_iter().any(|n| n == name)
    }

    /// Whether the list holds no names at all.
    pub fn is_empty(&self) -> bool {
        self.into_iter().next().is_none()
    }
}

impl<A> FromIterator<A> for NameList
where
    A: AsRef<str>,
{
    fn from_iter<T: IntoIterator<Item = A>>(iter: T) -> Self {
        Self(Ascii::new(
            iter.into_iter()
                .map(|name| {
                    debug_assert!(
                        !name.as_ref().contains(','),
                        "`,` is the name separator and cannot appear in a name"
                    );

                    name.as_ref().to_owned()
                })
                .filter(|name| !name.is_empty())
                .collect::<Vec<_>>()
                .join(","),
        ))
    }
}

impl<'n> IntoIterator for &'n NameList {
    type Item = &'n str;

    type IntoIter = std::iter::Filter<std::str::Split<'n, char>, for<'f> fn(&'f &'n str) -> bool>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.split(',').filter(|name| !name.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(&["aes128-ctr", "aes256-ctr"], &["aes256-ctr", "aes128-ctr"], Some("aes128-ctr"))]
    #[case(&["hmac-sha2-256"], &["hmac-sha1", "hmac-sha2-256"], Some("hmac-sha2-256"))]
    #[case(&["curve25519-sha256"], &["diffie-hellman-group14-sha1"], None)]
    #[case(&[], &["anything"], None)]
    fn it_prefers_the_first_of_ours(
        #[case] ours: &[&str],
        #[case] theirs: &[&str],
        #[case] expected: Option<&str>,
    ) {
        let (ours, theirs) = (
            ours.iter().collect::<NameList>(),
            theirs.iter().collect::<NameList>(),
        );

        assert_eq!(ours.preferred_in(&theirs), expected);
    }

    #[test]
    fn it_skips_empty_names() {
        let list = ["", "ssh-ed25519", ""].iter().collect::<NameList>();

        assert_eq!(list.into_iter().collect::<Vec<_>>(), vec!["ssh-ed25519"]);
    }
}
