use indexmap::IndexMap;

use crate::chunks::Chunk;
use crate::error::{Error, Result};
use crate::hash::NameHash;

/// Hash → chunk map of one container, in load order.
///
/// The registry is the only owner of chunk data; everything else refers to
/// chunks by hash.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    chunks: IndexMap<NameHash, Chunk>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a chunk under its hash.
    pub fn register(&mut self, chunk: Chunk) -> Result<()> {
        if chunk.hash.is_null() {
            return Err(Error::InvalidHash {
                hash: chunk.hash,
                tag: chunk.kind,
                name: chunk.name,
            });
        }
        if self.chunks.contains_key(&chunk.hash) {
            return Err(Error::DuplicateHash {
                hash: chunk.hash,
                tag: chunk.kind,
                offset: chunk.offset.unwrap_or(0),
            });
        }
        self.chunks.insert(chunk.hash, chunk);
        Ok(())
    }

    pub fn resolve(&self, hash: NameHash) -> Option<&Chunk> {
        self.chunks.get(&hash)
    }

    pub fn resolve_mut(&mut self, hash: NameHash) -> Option<&mut Chunk> {
        self.chunks.get_mut(&hash)
    }

    /// Remove a chunk, keeping the order of the rest.
    pub fn remove(&mut self, hash: NameHash) -> Option<Chunk> {
        self.chunks.shift_remove(&hash)
    }

    pub fn contains(&self, hash: NameHash) -> bool {
        self.chunks.contains_key(&hash)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Chunk> {
        self.chunks.values_mut()
    }

    pub fn hashes(&self) -> impl Iterator<Item = NameHash> + '_ {
        self.chunks.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
