//! Reader/writer for Great Quest chunked resource containers.
//!
//! Four-layer architecture:
//! - **Layer 1** (`cursor`/`reader`): Raw chunk I/O: fixed strings, tag/length/name headers
//! - **Layer 2** (`chunks`, `script`): Typed payloads and the trigger script codec
//! - **Layer 3** (`registry`, `toc`, `session`): Hash-keyed registries and three-phase
//!   cross-container reference resolution
//! - **Layer 4** (`container`, `script::engine`): Load/save/edit of whole files and
//!   cause → effect → action execution

pub mod chunks;
pub mod config;
pub mod container;
pub mod cursor;
pub mod error;
pub mod hash;
pub mod kind;
pub mod reader;
pub mod reference;
pub mod registry;
pub mod script;
pub mod session;
pub mod toc;

pub use chunks::{Chunk, ChunkData};
pub use config::{LoadConfig, ScriptConfig};
pub use container::Container;
pub use error::{Error, Result};
pub use hash::{NameHash, NameTable};
pub use kind::ResourceKind;
pub use reader::ChunkIndex;
pub use reference::{Ref, References, Requirement, Resolution};
pub use registry::Registry;
pub use session::{Archive, LoadSession, ResolutionMiss};
