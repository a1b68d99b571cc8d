use std::fmt;

use serde::{Serialize, Serializer};

/// Chunk type tag.
///
/// Declaration order is the canonical sort order of resources within a
/// table-of-contents group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Toc,
    Raw,
    Texture,
    OctTreeSceneMgr,
    Model,
    Track,
    Hierarchy,
    AnimSet,
    ActorDesc,
    TriMesh,
    Generic,
    EntityInst,
    NamedHash,
    ActionSequence,
    /// A tag this reader does not know. The bytes are carried through untouched.
    Unrecognized([u8; 4]),
}

const KNOWN: [(ResourceKind, [u8; 4]); 14] = [
    (ResourceKind::Toc, *b"TOC\0"),
    (ResourceKind::Raw, *b"RAW\0"),
    (ResourceKind::Texture, *b"TEX\0"),
    (ResourceKind::OctTreeSceneMgr, *b"OTT\0"),
    (ResourceKind::Model, *b"6YTV"),
    (ResourceKind::Track, *b"fEAB"),
    (ResourceKind::Hierarchy, *b"fEHB"),
    (ResourceKind::AnimSet, *b"ASET"),
    (ResourceKind::ActorDesc, *b"ACTD"),
    (ResourceKind::TriMesh, *b"RTM\0"),
    (ResourceKind::Generic, *b"GEN\0"),
    (ResourceKind::EntityInst, *b"NTI\0"),
    (ResourceKind::NamedHash, *b"NHT\0"),
    (ResourceKind::ActionSequence, *b"ASEQ"),
];

impl ResourceKind {
    pub fn from_magic(magic: [u8; 4]) -> Self {
        KNOWN
            .iter()
            .find(|(_, m)| *m == magic)
            .map(|(kind, _)| *kind)
            .unwrap_or(ResourceKind::Unrecognized(magic))
    }

    pub fn magic(self) -> [u8; 4] {
        match self {
            ResourceKind::Unrecognized(magic) => magic,
            known => KNOWN
                .iter()
                .find(|(kind, _)| *kind == known)
                .map(|(_, m)| *m)
                .unwrap_or([0; 4]),
        }
    }

    /// Position in the canonical sort order. Unrecognized tags sort last.
    pub fn ordinal(self) -> usize {
        KNOWN
            .iter()
            .position(|(kind, _)| *kind == self)
            .unwrap_or(KNOWN.len())
    }

    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::Toc => "TOC",
            ResourceKind::Raw => "RAW",
            ResourceKind::Texture => "TEXTURE",
            ResourceKind::OctTreeSceneMgr => "OCTTREESCENEMGR",
            ResourceKind::Model => "MODEL",
            ResourceKind::Track => "TRACK",
            ResourceKind::Hierarchy => "HIERARCHY",
            ResourceKind::AnimSet => "ANIMSET",
            ResourceKind::ActorDesc => "ACTORDESC",
            ResourceKind::TriMesh => "TRIMESH",
            ResourceKind::Generic => "GENERIC",
            ResourceKind::EntityInst => "ENTITYINST",
            ResourceKind::NamedHash => "NAMEDHASH",
            ResourceKind::ActionSequence => "ACTIONSEQUENCE",
            ResourceKind::Unrecognized(_) => "UNRECOGNIZED",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Unrecognized(magic) => {
                let text: String = magic
                    .iter()
                    .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
                    .collect();
                write!(f, "UNRECOGNIZED({text})")
            }
            known => f.write_str(known.name()),
        }
    }
}

impl Serialize for ResourceKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_round_trip() {
        for (kind, magic) in KNOWN {
            assert_eq!(ResourceKind::from_magic(magic), kind);
            assert_eq!(kind.magic(), magic);
        }
    }

    #[test]
    fn unknown_magic_is_preserved() {
        let kind = ResourceKind::from_magic(*b"ZZZ\0");
        assert_eq!(kind, ResourceKind::Unrecognized(*b"ZZZ\0"));
        assert_eq!(kind.magic(), *b"ZZZ\0");
        assert_eq!(kind.to_string(), "UNRECOGNIZED(ZZZ.)");
        assert!(kind.ordinal() > ResourceKind::ActionSequence.ordinal());
    }
}
