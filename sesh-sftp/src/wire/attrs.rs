use binrw::binrw;
use sesh_wire::arch::{Ascii, Bytes};

bitflags::bitflags! {
    /// The validity bitset prefixing the attribute fields: only the
    /// fields whose bit is set are present on the wire.
    ///
    /// Unrecognised bits are retained verbatim so a re-encoded bitset
    /// matches the received one.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct AttrFlags: u32 {
        /// `SSH_FILEXFER_ATTR_SIZE`.
        const SIZE = 0x00000001;

        /// `SSH_FILEXFER_ATTR_UIDGID`.
        const UIDGID = 0x00000002;

        /// `SSH_FILEXFER_ATTR_PERMISSIONS`.
        const PERMISSIONS = 0x00000004;

        /// `SSH_FILEXFER_ATTR_ACMODTIME`.
        const ACMODTIME = 0x00000008;

        /// `SSH_FILEXFER_ATTR_EXTENDED`.
        const EXTENDED = 0x80000000;

        const _ = !0;
    }
}

/// The file attributes, as defined in
/// [draft-ietf-secsh-filexfer-02 section 5](https://datatracker.ietf.org/doc/html/draft-ietf-secsh-filexfer-02#section-5).
///
/// Modelled as a validity bitset plus sparse fields rather than a
/// union of variants, so unknown validity bits survive a round-trip.
#[binrw]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[brw(big)]
pub struct Attributes {
    /// The validity bitset for the fields below.
    #[br(map = AttrFlags::from_bits_retain)]
    #[bw(map = |flags| flags.bits())]
    pub flags: AttrFlags,

    /// Size of the file, in bytes.
    #[br(if(flags.contains(AttrFlags::SIZE)))]
    pub size: Option<u64>,

    /// Owner's user identifier.
    #[br(if(flags.contains(AttrFlags::UIDGID)))]
    pub uid: Option<u32>,

    /// Owner's group identifier.
    #[br(if(flags.contains(AttrFlags::UIDGID)))]
    pub gid: Option<u32>,

    /// POSIX permission bits.
    #[br(if(flags.contains(AttrFlags::PERMISSIONS)))]
    pub permissions: Option<u32>,

    /// Access time, in seconds since the epoch.
    #[br(if(flags.contains(AttrFlags::ACMODTIME)))]
    pub atime: Option<u32>,

    /// Modification time, in seconds since the epoch.
    #[br(if(flags.contains(AttrFlags::ACMODTIME)))]
    pub mtime: Option<u32>,

    /// Implementation-specific extended attributes.
    #[br(if(flags.contains(AttrFlags::EXTENDED)))]
    pub extended: Option<ExtendedAttrs>,
}

impl Attributes {
    /// Attributes carrying only a file size.
    pub fn with_size(size: u64) -> Self {
        Self {
            flags: AttrFlags::SIZE,
            size: Some(size),
            ..Default::default()
        }
    }

    /// Attributes carrying only POSIX permissions.
    pub fn with_permissions(permissions: u32) -> Self {
        Self {
            flags: AttrFlags::PERMISSIONS,
            permissions: Some(permissions),
            ..Default::default()
        }
    }

    /// Attributes carrying only access and modification times,
    /// each taken from its own timestamp.
    pub fn with_times(atime: u32, mtime: u32) -> Self {
        Self {
            flags: AttrFlags::ACMODTIME,
            atime: Some(atime),
            mtime: Some(mtime),
            ..Default::default()
        }
    }
}

/// The count-prefixed extended attribute pairs.
#[binrw]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[brw(big)]
pub struct ExtendedAttrs {
    #[bw(calc = pairs.len() as u32)]
    count: u32,

    /// The `(type, data)` pairs.
    #[br(count = count)]
    pub pairs: Vec<ExtendedAttr>,
}

/// A single extended attribute pair.
#[binrw]
#[derive(Debug, Clone, PartialEq, Eq)]
#[brw(big)]
pub struct ExtendedAttr {
    /// The attribute's type, in `name@domain` format.
    pub kind: Ascii,

    /// The attribute's opaque data.
    pub data: Bytes,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use binrw::{BinRead, BinWrite};
    use rstest::rstest;

    use super::*;

    fn roundtrip(bytes: &[u8]) -> Vec<u8> {
        let attrs = Attributes::read(&mut std::io::Cursor::new(bytes)).unwrap();

        let mut buffer = std::io::Cursor::new(Vec::new());
        attrs.write(&mut buffer).unwrap();

        buffer.into_inner()
    }

    #[rstest]
    // No field at all.
    #[case(&[0, 0, 0, 0])]
    // A size field.
    #[case(&[0, 0, 0, 1, 0, 0, 0, 0, 0, 0x10, 0, 0])]
    // Access and modification times, distinct values.
    #[case(&[0, 0, 0, 8, 0, 0, 0, 1, 0, 0, 0, 2])]
    // An unknown validity bit with no field bytes attached.
    #[case(&[0x40, 0, 0, 0])]
    fn it_reencodes_identically(#[case] wire: &[u8]) {
        assert_eq!(roundtrip(wire), wire);
    }

    #[test]
    fn it_decodes_each_time_from_its_own_integer() {
        let wire = [0u8, 0, 0, 8, 0, 0, 0, 7, 0, 0, 0, 9];
        let attrs = Attributes::read(&mut std::io::Cursor::new(&wire)).unwrap();

        assert_eq!(attrs.atime, Some(7));
        assert_eq!(attrs.mtime, Some(9));
    }

    #[test]
    fn it_roundtrips_extended_pairs() {
        let attrs = Attributes {
            flags: AttrFlags::EXTENDED,
            extended: Some(ExtendedAttrs {
                pairs: vec![ExtendedAttr {
                    kind: "acl@example.com".into(),
                    data: vec![1, 2, 3].into(),
                }],
            }),
            ..Default::default()
        };

        let mut buffer = std::io::Cursor::new(Vec::new());
        attrs.write(&mut buffer).unwrap();
        buffer.set_position(0);

        assert_eq!(Attributes::read(&mut buffer).unwrap(), attrs);
    }
}
