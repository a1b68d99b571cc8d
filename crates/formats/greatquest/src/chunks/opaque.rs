use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Payload bytes kept exactly as read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Opaque {
    pub bytes: Vec<u8>,
}

impl Opaque {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self { bytes: bytes.into() }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// Dumps show the size, not the bytes.
impl Serialize for Opaque {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Opaque", 1)?;
        s.serialize_field("length", &self.bytes.len())?;
        s.end()
    }
}
