use thiserror::Error;

use crate::hash::NameHash;
use crate::kind::ResourceKind;

#[derive(Debug, Error)]
pub enum Error {
    #[error("out of bounds at offset {offset:#x} (need {need} bytes, have {have})")]
    OutOfBounds {
        offset: usize,
        need: usize,
        have: usize,
    },

    #[error("fixed string at offset {offset:#x} has no terminator within {width} bytes")]
    MalformedString { offset: usize, width: usize },

    #[error("string {text:?} does not fit a {width}-byte field")]
    StringTooLong { text: String, width: usize },

    #[error("{context} at offset {offset:#x} declares {declared} bytes, found {actual}")]
    SizeMismatch {
        context: &'static str,
        offset: usize,
        declared: usize,
        actual: usize,
    },

    #[error("duplicate hash {hash} on {tag} chunk at offset {offset:#x}")]
    DuplicateHash {
        hash: NameHash,
        tag: ResourceKind,
        offset: usize,
    },

    #[error("invalid resource hash {hash} on {tag} chunk '{name}'")]
    InvalidHash {
        hash: NameHash,
        tag: ResourceKind,
        name: String,
    },

    #[error("{tag} chunk {owner} has unresolved required reference '{field}' -> {target}")]
    UnresolvedReference {
        target: NameHash,
        owner: NameHash,
        tag: ResourceKind,
        field: &'static str,
    },

    #[error("{context} in chunk {owner}: expected {expected} arguments, found {found}")]
    ArityMismatch {
        context: String,
        owner: NameHash,
        expected: usize,
        found: usize,
    },

    #[error("cannot encode {tag} chunk {hash}: {reason}")]
    UnencodableChunk {
        tag: ResourceKind,
        hash: NameHash,
        reason: String,
    },

    #[error("table of contents at offset {offset:#x}: {message}")]
    TocInconsistent { offset: usize, message: String },

    #[error("script {index} is claimed by both {first} and {second}")]
    ScriptOwnerConflict {
        index: usize,
        first: NameHash,
        second: NameHash,
    },

    #[error("{context}: {message}")]
    Parse {
        context: &'static str,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Attach chunk context to an encoding failure raised below the chunk layer.
    pub(crate) fn into_unencodable(self, tag: ResourceKind, hash: NameHash) -> Self {
        match self {
            Error::StringTooLong { text, width } => Error::UnencodableChunk {
                tag,
                hash,
                reason: format!("name {text:?} exceeds its {width}-byte field"),
            },
            Error::Parse { context, message } => Error::UnencodableChunk {
                tag,
                hash,
                reason: format!("{context}: {message}"),
            },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
