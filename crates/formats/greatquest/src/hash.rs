use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 32-bit resource name hash.
///
/// This is the only form in which resources refer to each other; the names
/// themselves are frequently missing from shipped files.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NameHash(pub u32);

impl NameHash {
    /// Null written as zero.
    pub const ZERO: NameHash = NameHash(0);
    /// Null written as -1.
    pub const NONE: NameHash = NameHash(u32::MAX);

    /// Hash a resource name as it is stored: one byte per character.
    ///
    /// Characters above U+00FF cannot be stored and are hashed by their UTF-8 bytes.
    pub fn of(name: &str) -> Self {
        let mut bytes = Vec::with_capacity(name.len());
        for ch in name.chars() {
            match u8::try_from(ch) {
                Ok(b) => bytes.push(b),
                Err(_) => bytes.extend_from_slice(ch.encode_utf8(&mut [0; 4]).as_bytes()),
            }
        }
        NameHash(hash_bytes(&bytes))
    }

    /// Both null encodings; neither ever resolves to a resource.
    pub fn is_null(self) -> bool {
        self.0 == 0 || self.0 == u32::MAX
    }

    pub fn from_i32(v: i32) -> Self {
        NameHash(v as u32)
    }

    pub fn as_i32(self) -> i32 {
        self.0 as i32
    }
}

impl fmt::Display for NameHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}

impl fmt::Debug for NameHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NameHash({:08X})", self.0)
    }
}

impl From<u32> for NameHash {
    fn from(v: u32) -> Self {
        NameHash(v)
    }
}

/// Case-insensitive name hash: seeded with the length, then rotate-left by one
/// nibble and xor in each lower-cased byte.
pub fn hash_bytes(name: &[u8]) -> u32 {
    let mut h = name.len() as u32;
    for &b in name {
        h = h.rotate_left(4) ^ b.to_ascii_lowercase() as u32;
    }
    h
}

/// Best-effort reverse lookup from hash to name, for display only.
///
/// Never consulted during resolution: a hash resolves through the registry
/// whether or not its name is known.
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    names: HashMap<NameHash, String>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `name` under its computed hash. Returns the hash.
    pub fn insert(&mut self, name: &str) -> NameHash {
        let hash = NameHash::of(name);
        self.names.entry(hash).or_insert_with(|| name.to_string());
        hash
    }

    /// Record `name` for `hash` only when the two agree.
    pub fn insert_if_matches(&mut self, hash: NameHash, name: &str) -> bool {
        if NameHash::of(name) != hash {
            return false;
        }
        self.names.entry(hash).or_insert_with(|| name.to_string());
        true
    }

    pub fn get(&self, hash: NameHash) -> Option<&str> {
        self.names.get(&hash).map(String::as_str)
    }

    /// The known name, quoted, or the hash in hex.
    pub fn display(&self, hash: NameHash) -> String {
        match self.get(hash) {
            Some(name) => format!("\"{name}\""),
            None => hash.to_string(),
        }
    }

    pub fn merge(&mut self, other: &NameTable) {
        for (hash, name) in &other.names {
            self.names.entry(*hash).or_insert_with(|| name.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
