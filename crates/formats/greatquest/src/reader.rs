use crate::cursor::{Cursor, Writer};
use crate::error::{Error, Result};
use crate::kind::ResourceKind;

/// Width of the fixed name field that opens every chunk body.
pub const NAME_SIZE: usize = 0x20;

/// Tag + declared length.
pub const PREFIX_SIZE: usize = 8;

/// A single chunk header in the file.
#[derive(Debug, Clone, Copy)]
pub struct ChunkEntry {
    /// 4-byte ASCII magic identifying the chunk type.
    pub magic: [u8; 4],
    /// Absolute byte offset of the chunk header (magic field) in the file.
    pub offset: usize,
    /// Declared payload length. Excludes the 8-byte prefix and the name field.
    pub length: usize,
}

impl ChunkEntry {
    pub fn kind(&self) -> ResourceKind {
        ResourceKind::from_magic(self.magic)
    }

    /// Absolute offset of the fixed name field.
    pub fn name_offset(&self) -> usize {
        self.offset + PREFIX_SIZE
    }

    /// Absolute offset where the payload begins (after the name field).
    pub fn data_offset(&self) -> usize {
        self.name_offset() + NAME_SIZE
    }

    /// Absolute offset one past the last payload byte.
    pub fn end(&self) -> usize {
        self.data_offset() + self.length
    }

    /// Magic as a string (for display).
    pub fn magic_str(&self) -> &str {
        std::str::from_utf8(&self.magic).unwrap_or("????")
    }
}

/// Index of every chunk header in a container.
///
/// Headers are interleaved with payloads; there is no directory at the
/// start of the file. This layer knows nothing about chunk internals.
pub struct ChunkIndex {
    /// Ordered list of chunks as they appear in the file.
    chunks: Vec<ChunkEntry>,
}

impl ChunkIndex {
    /// Walk the chunk headers of an entire container file.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let mut chunks = Vec::new();

        while !cursor.is_empty() {
            let offset = cursor.position();
            let magic = cursor.read_magic()?;
            let length = cursor.read_u32()? as usize;
            let entry = ChunkEntry {
                magic,
                offset,
                length,
            };

            // The whole body must be present; a short final chunk is not recoverable.
            if entry.end() > data.len() {
                return Err(Error::OutOfBounds {
                    offset: entry.name_offset(),
                    need: NAME_SIZE + length,
                    have: data.len() - entry.name_offset().min(data.len()),
                });
            }
            chunks.push(entry);
            cursor.seek(entry.end())?;
        }

        Ok(Self { chunks })
    }

    /// All chunks in file order.
    pub fn chunks(&self) -> &[ChunkEntry] {
        &self.chunks
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Find the first chunk of a given kind.
    pub fn find(&self, kind: ResourceKind) -> Option<&ChunkEntry> {
        self.chunks.iter().find(|c| c.kind() == kind)
    }

    /// Decode the name field of a chunk.
    pub fn name(&self, data: &[u8], entry: &ChunkEntry) -> Result<String> {
        let field = &data[entry.name_offset()..entry.data_offset()];
        Cursor::with_base(field, entry.name_offset()).read_fixed_string(NAME_SIZE)
    }

    /// The payload bytes of a chunk.
    pub fn payload<'a>(&self, data: &'a [u8], entry: &ChunkEntry) -> &'a [u8] {
        &data[entry.data_offset()..entry.end()]
    }
}

/// Write one chunk: tag, length placeholder, name field, payload, then patch the length.
///
/// The declared length always comes from what `payload` actually wrote.
pub fn write_chunk(
    w: &mut Writer,
    kind: ResourceKind,
    name: &str,
    padding: u8,
    payload: impl FnOnce(&mut Writer) -> Result<()>,
) -> Result<()> {
    w.write_magic(&kind.magic());
    let length_pos = w.position();
    w.write_u32(0);
    w.write_fixed_string(name, NAME_SIZE, padding)?;
    let start = w.position();
    payload(w)?;
    let length = w.position() - start;
    w.patch_u32(length_pos, length as u32);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_chunks() -> Vec<u8> {
        let mut w = Writer::new();
        write_chunk(&mut w, ResourceKind::Toc, "", 0, |w| {
            w.write_u32(0x1234);
            Ok(())
        })
        .unwrap();
        write_chunk(&mut w, ResourceKind::Raw, "blob", 0xCD, |w| {
            w.write_bytes(&[1, 2, 3]);
            Ok(())
        })
        .unwrap();
        w.into_bytes()
    }

    #[test]
    fn index_walks_interleaved_headers() {
        let data = two_chunks();
        let index = ChunkIndex::parse(&data).unwrap();
        assert_eq!(index.len(), 2);

        let toc = index.chunks()[0];
        assert_eq!(toc.kind(), ResourceKind::Toc);
        assert_eq!(toc.offset, 0);
        assert_eq!(toc.length, 4);

        let raw = index.chunks()[1];
        assert_eq!(raw.offset, PREFIX_SIZE + NAME_SIZE + 4);
        assert_eq!(raw.magic_str(), "RAW\0");
        assert_eq!(index.name(&data, &raw).unwrap(), "blob");
        assert_eq!(index.payload(&data, &raw), &[1, 2, 3]);
        assert_eq!(raw.end(), data.len());
    }

    #[test]
    fn zero_length_payload_is_legal() {
        let mut w = Writer::new();
        write_chunk(&mut w, ResourceKind::Generic, "marker", 0, |_| Ok(())).unwrap();
        let data = w.into_bytes();
        let index = ChunkIndex::parse(&data).unwrap();
        assert_eq!(index.chunks()[0].length, 0);
        assert!(index.payload(&data, &index.chunks()[0]).is_empty());
    }

    #[test]
    fn truncated_chunk_is_out_of_bounds() {
        let mut data = two_chunks();
        data.pop();
        assert!(matches!(ChunkIndex::parse(&data), Err(Error::OutOfBounds { .. })));
    }

    #[test]
    fn unknown_magic_is_indexed() {
        let mut w = Writer::new();
        write_chunk(&mut w, ResourceKind::Unrecognized(*b"ZZZZ"), "x", 0, |_| Ok(())).unwrap();
        let data = w.into_bytes();
        let index = ChunkIndex::parse(&data).unwrap();
        assert_eq!(index.chunks()[0].kind(), ResourceKind::Unrecognized(*b"ZZZZ"));
    }
}
