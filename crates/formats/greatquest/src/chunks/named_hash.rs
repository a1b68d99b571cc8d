use serde::Serialize;
use tracing::warn;

use crate::cursor::{Cursor, Writer};
use crate::error::{Error, Result};
use crate::hash::NameHash;
use crate::reader::NAME_SIZE;
use crate::reference::{Ref, References};

/// Key → action sequence table attached to an actor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedHashTable {
    pub version: u32,
    pub reserved: [u32; 2],
    pub entries: Vec<NamedHashEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedHashEntry {
    pub key: String,
    /// Usually an action sequence stored in another container.
    pub value: Ref,
}

impl NamedHashEntry {
    pub fn new(key: impl Into<String>, value: NameHash) -> Self {
        Self {
            key: key.into(),
            value: Ref::optional(value, "value"),
        }
    }

    pub fn key_hash(&self) -> NameHash {
        NameHash::of(&self.key)
    }
}

impl NamedHashTable {
    pub fn parse(c: &mut Cursor<'_>, owner: NameHash) -> Result<Self> {
        let version = c.read_u32()?;
        let count = c.read_u32()? as usize;
        let reserved = c.read_u32_array::<2>()?;
        if version != 0 || reserved != [0, 0] {
            warn!(%owner, version, ?reserved, "named hash header has unexpected values");
        }

        let entries = c.read_vec(count, |c| {
            let offset = c.file_offset();
            let key_hash = NameHash(c.read_u32()?);
            let value = NameHash(c.read_u32()?);
            let key = c.read_fixed_string(NAME_SIZE)?;
            if NameHash::of(&key) != key_hash {
                return Err(Error::Parse {
                    context: "named hash",
                    message: format!(
                        "entry at {offset:#x}: key {key:?} hashes to {}, stored {key_hash}",
                        NameHash::of(&key)
                    ),
                });
            }
            Ok(NamedHashEntry::new(key, value))
        })?;

        if !c.is_empty() {
            warn!(%owner, "{} trailing bytes after named hash entries", c.remaining());
        }
        Ok(Self {
            version,
            reserved,
            entries,
        })
    }

    /// Key hashes are recomputed from the key names.
    pub fn write(&self, w: &mut Writer, padding: u8) -> Result<()> {
        w.write_u32(self.version);
        w.write_u32(self.entries.len() as u32);
        w.write_u32_slice(&self.reserved);
        for entry in &self.entries {
            w.write_u32(entry.key_hash().0);
            w.write_u32(entry.value.hash.0);
            w.write_fixed_string(&entry.key, NAME_SIZE, padding)?;
        }
        Ok(())
    }

    /// Case-insensitive lookup by key.
    pub fn get(&self, key: &str) -> Option<&NamedHashEntry> {
        let hash = NameHash::of(key);
        self.entries.iter().find(|e| e.key_hash() == hash)
    }
}

impl References for NamedHashTable {
    fn for_each_ref(&self, f: &mut dyn FnMut(&Ref)) {
        for entry in &self.entries {
            f(&entry.value);
        }
    }

    fn for_each_ref_mut(&mut self, f: &mut dyn FnMut(&mut Ref)) {
        for entry in &mut self.entries {
            f(&mut entry.value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> NamedHashTable {
        NamedHashTable {
            version: 0,
            reserved: [0, 0],
            entries: vec![
                NamedHashEntry::new("Walk", NameHash(0x5000)),
                NamedHashEntry::new("Idle", NameHash::ZERO),
            ],
        }
    }

    #[test]
    fn round_trip_and_lookup() {
        let mut w = Writer::new();
        table().write(&mut w, 0).unwrap();
        let data = w.into_bytes();
        assert_eq!(data.len(), 16 + 2 * (8 + NAME_SIZE));

        let parsed = NamedHashTable::parse(&mut Cursor::new(&data), NameHash(1)).unwrap();
        assert_eq!(parsed, table());
        assert_eq!(parsed.get("WALK").unwrap().value.hash, NameHash(0x5000));
        assert!(parsed.get("Run").is_none());
    }

    #[test]
    fn latin1_key_matches_stored_hash() {
        let mut w = Writer::new();
        w.write_u32_slice(&[0, 1, 0, 0]);
        w.write_u32(0x0002_5789);
        w.write_u32(0);
        w.write_bytes(b"caf\xe9");
        w.write_padding(NAME_SIZE - 4, 0);
        let data = w.into_bytes();

        let parsed = NamedHashTable::parse(&mut Cursor::new(&data), NameHash(1)).unwrap();
        assert_eq!(parsed.entries[0].key, "caf\u{e9}");
        let mut out = Writer::new();
        parsed.write(&mut out, 0).unwrap();
        assert_eq!(out.into_bytes(), data);
    }

    #[test]
    fn key_hash_mismatch_is_error() {
        let mut w = Writer::new();
        table().write(&mut w, 0).unwrap();
        let mut data = w.into_bytes();
        data[16] ^= 0xFF;
        assert!(matches!(
            NamedHashTable::parse(&mut Cursor::new(&data), NameHash(1)),
            Err(Error::Parse { context: "named hash", .. })
        ));
    }
}
