//! Typed chunk payloads.
//!
//! Every chunk decodes to a [`ChunkData`]. Kinds without a dedicated
//! decoder, and tags this crate does not recognize, stay [`Opaque`].

pub mod action_sequence;
pub mod entity;
pub mod named_hash;
pub mod opaque;

use serde::Serialize;
use tracing::warn;

use crate::config::LoadConfig;
use crate::cursor::{Cursor, Writer};
use crate::error::Result;
use crate::hash::NameHash;
use crate::kind::ResourceKind;
use crate::reference::{Ref, References};
use crate::script::list::ScriptList;

pub use action_sequence::{sequence_name, ActionSequence};
pub use entity::{EntityInst, Placement};
pub use named_hash::{NamedHashEntry, NamedHashTable};
pub use opaque::Opaque;

/// One resource: a tagged, named, hashed payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub kind: ResourceKind,
    pub hash: NameHash,
    pub name: String,
    /// File offset of the chunk header, for chunks that came from a file.
    pub offset: Option<usize>,
    pub data: ChunkData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "payload", rename_all = "snake_case")]
pub enum ChunkData {
    Opaque(Opaque),
    NamedHash(NamedHashTable),
    EntityInst(EntityInst),
    ActionSequence(ActionSequence),
    ScriptList(ScriptList),
}

impl Chunk {
    /// A new chunk whose hash is computed from its name.
    pub fn new(kind: ResourceKind, name: impl Into<String>, data: ChunkData) -> Self {
        let name = name.into();
        Self {
            kind,
            hash: NameHash::of(&name),
            name,
            offset: None,
            data,
        }
    }

    /// A chunk with an explicit hash, e.g. one whose name is unknown.
    pub fn with_hash(kind: ResourceKind, hash: NameHash, name: impl Into<String>, data: ChunkData) -> Self {
        Self {
            kind,
            hash,
            name: name.into(),
            offset: None,
            data,
        }
    }

    pub fn entity(&self) -> Option<&EntityInst> {
        match &self.data {
            ChunkData::EntityInst(e) => Some(e),
            _ => None,
        }
    }

    pub fn script_list(&self) -> Option<&ScriptList> {
        match &self.data {
            ChunkData::ScriptList(s) => Some(s),
            _ => None,
        }
    }
}

impl ChunkData {
    /// Decode a payload according to the chunk's tag and name.
    ///
    /// `base` is the payload's offset in the file, for error context.
    pub fn decode(
        kind: ResourceKind,
        name: &str,
        hash: NameHash,
        payload: &[u8],
        base: usize,
        config: &LoadConfig,
    ) -> Result<Self> {
        let mut c = Cursor::with_base(payload, base);
        let strict = config.strict_arity;
        Ok(match kind {
            ResourceKind::Raw if ScriptList::is_script_chunk(name, hash) => {
                ChunkData::ScriptList(ScriptList::parse(&mut c, strict, hash)?)
            }
            ResourceKind::EntityInst => match EntityInst::parse(&mut c)? {
                Some(entity) => ChunkData::EntityInst(entity),
                None => {
                    warn!(%hash, name, size = payload.len(), "entity instance of unknown size kept opaque");
                    ChunkData::Opaque(Opaque::new(payload))
                }
            },
            ResourceKind::NamedHash => ChunkData::NamedHash(NamedHashTable::parse(&mut c, hash)?),
            ResourceKind::ActionSequence => ChunkData::ActionSequence(ActionSequence::parse(&mut c, strict, hash)?),
            ResourceKind::Unrecognized(_) => {
                warn!(%hash, name, tag = %kind, "unrecognized chunk tag; carrying bytes through");
                ChunkData::Opaque(Opaque::new(payload))
            }
            _ => ChunkData::Opaque(Opaque::new(payload)),
        })
    }

    /// Write the payload. `hash` is the owning chunk, for error context.
    pub fn encode(&self, w: &mut Writer, hash: NameHash, padding: u8) -> Result<()> {
        match self {
            ChunkData::Opaque(o) => w.write_bytes(&o.bytes),
            ChunkData::NamedHash(t) => t.write(w, padding)?,
            ChunkData::EntityInst(e) => e.write(w),
            ChunkData::ActionSequence(s) => s.write(w, hash)?,
            ChunkData::ScriptList(s) => s.write(w, hash)?,
        }
        Ok(())
    }

    /// Check every script command against its declared operands.
    pub fn validate_argument_count(&self, hash: NameHash) -> Result<()> {
        match self {
            ChunkData::ActionSequence(s) => s.validate_argument_count(hash),
            ChunkData::ScriptList(s) => s.validate_argument_count(hash),
            _ => Ok(()),
        }
    }
}

impl References for ChunkData {
    fn for_each_ref(&self, f: &mut dyn FnMut(&Ref)) {
        match self {
            ChunkData::Opaque(_) => {}
            ChunkData::NamedHash(t) => t.for_each_ref(f),
            ChunkData::EntityInst(e) => e.for_each_ref(f),
            ChunkData::ActionSequence(s) => s.for_each_ref(f),
            ChunkData::ScriptList(s) => s.for_each_ref(f),
        }
    }

    fn for_each_ref_mut(&mut self, f: &mut dyn FnMut(&mut Ref)) {
        match self {
            ChunkData::Opaque(_) => {}
            ChunkData::NamedHash(t) => t.for_each_ref_mut(f),
            ChunkData::EntityInst(e) => e.for_each_ref_mut(f),
            ChunkData::ActionSequence(s) => s.for_each_ref_mut(f),
            ChunkData::ScriptList(s) => s.for_each_ref_mut(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scriptdata_raw_chunk_is_a_script_list() {
        let mut w = Writer::new();
        ScriptList::default().write(&mut w, NameHash(1)).unwrap();
        let payload = w.into_bytes();
        let hash = NameHash::of("scriptdata");
        let data = ChunkData::decode(ResourceKind::Raw, "ScriptData", hash, &payload, 0, &LoadConfig::default()).unwrap();
        assert!(matches!(data, ChunkData::ScriptList(_)));

        let other = ChunkData::decode(ResourceKind::Raw, "blob", NameHash(2), &payload, 0, &LoadConfig::default()).unwrap();
        assert!(matches!(other, ChunkData::Opaque(_)));
    }

    #[test]
    fn unknown_tag_bytes_survive() {
        let payload = [1, 2, 3, 4, 5];
        let kind = ResourceKind::Unrecognized(*b"ZZZZ");
        let data = ChunkData::decode(kind, "x", NameHash(3), &payload, 0, &LoadConfig::default()).unwrap();
        let mut w = Writer::new();
        data.encode(&mut w, NameHash(3), 0).unwrap();
        assert_eq!(w.into_bytes(), payload);
    }
}
