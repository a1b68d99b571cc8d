use serde::Serialize;
use tracing::warn;

use crate::cursor::{Cursor, Writer};
use crate::error::{Error, Result};
use crate::hash::NameHash;
use crate::kind::ResourceKind;

/// One table-of-contents chunk and the resources that follow it.
///
/// Chunks carry no hash of their own; each one takes the next unused hash
/// from the most recent table.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TocGroup {
    /// Name field of the TOC chunk itself.
    pub name: String,
    #[serde(skip)]
    pub offset: Option<usize>,
    /// Hashes listed by the table.
    pub declared: Vec<NameHash>,
    /// Hashes of the chunks assigned to this group, in order.
    pub members: Vec<NameHash>,
}

impl TocGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn parse(name: String, payload: &[u8], offset: usize) -> Result<Self> {
        if payload.len() % 4 != 0 {
            return Err(Error::TocInconsistent {
                offset,
                message: format!("payload of {} bytes is not a list of hashes", payload.len()),
            });
        }
        let mut c = Cursor::with_base(payload, offset);
        let declared = c.read_vec(payload.len() / 4, |c| c.read_u32().map(NameHash))?;
        Ok(Self {
            name,
            offset: Some(offset),
            declared,
            members: Vec::new(),
        })
    }

    /// The hash for the next chunk in this group, if the table has one left.
    pub fn next_hash(&self) -> Option<NameHash> {
        self.declared.get(self.members.len()).copied()
    }

    /// Check that every declared hash received a chunk.
    pub fn finish(&self, strict: bool) -> Result<()> {
        if self.members.len() == self.declared.len() {
            return Ok(());
        }
        let message = format!(
            "table '{}' lists {} hashes but {} chunks follow it",
            self.name,
            self.declared.len(),
            self.members.len()
        );
        if strict {
            return Err(Error::TocInconsistent {
                offset: self.offset.unwrap_or(0),
                message,
            });
        }
        warn!("{message}");
        Ok(())
    }

    /// Payload of the TOC chunk as it will be saved.
    pub fn write(&self, w: &mut Writer) {
        for hash in &self.members {
            w.write_u32(hash.0);
        }
    }
}

/// Canonical order of resources within a group: kind, then case-insensitive name.
pub fn sort_key(kind: ResourceKind, name: &str) -> (usize, String) {
    (kind.ordinal(), name.to_ascii_lowercase())
}

/// Warn about the first out-of-order neighbour pair, if any.
pub fn warn_if_unsorted(group: &str, entries: &[(ResourceKind, &str)]) -> bool {
    let unsorted = entries
        .windows(2)
        .find(|pair| sort_key(pair[0].0, pair[0].1) > sort_key(pair[1].0, pair[1].1));
    if let Some(pair) = unsorted {
        warn!(
            group,
            "resources are not in canonical order: {} '{}' precedes {} '{}'",
            pair[0].0,
            pair[0].1,
            pair[1].0,
            pair[1].1
        );
    }
    unsorted.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_handed_out_in_order() {
        let mut w = Writer::new();
        w.write_u32_slice(&[0xAAAA, 0xBBBB]);
        let mut group = TocGroup::parse("level".into(), &w.into_bytes(), 0).unwrap();
        assert_eq!(group.next_hash(), Some(NameHash(0xAAAA)));
        group.members.push(NameHash(0xAAAA));
        assert_eq!(group.next_hash(), Some(NameHash(0xBBBB)));
        assert!(matches!(group.finish(true), Err(Error::TocInconsistent { .. })));
        assert!(group.finish(false).is_ok());
        group.members.push(NameHash(0xBBBB));
        assert_eq!(group.next_hash(), None);
        assert!(group.finish(true).is_ok());
    }

    #[test]
    fn ragged_payload_is_rejected() {
        assert!(matches!(
            TocGroup::parse(String::new(), &[0; 6], 0x10),
            Err(Error::TocInconsistent { offset: 0x10, .. })
        ));
    }

    #[test]
    fn sort_order() {
        assert!(!warn_if_unsorted(
            "g",
            &[(ResourceKind::Raw, "b"), (ResourceKind::Texture, "A"), (ResourceKind::Texture, "b")]
        ));
        assert!(warn_if_unsorted("g", &[(ResourceKind::EntityInst, "a"), (ResourceKind::Raw, "z")]));
        assert!(warn_if_unsorted("g", &[(ResourceKind::Raw, "B"), (ResourceKind::Raw, "a")]));
    }
}
