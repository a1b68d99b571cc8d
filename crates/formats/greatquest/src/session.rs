//! Loading several containers as one session.
//!
//! Loading runs in three phases:
//!
//! 0. **Decode.** Every container is parsed on its own (in parallel when
//!    enabled). Nothing is shared, so no reference is looked up yet.
//! 1. **Local resolution.** Each container resolves references against its
//!    own registry and links scripts to their owning entities. References it
//!    cannot satisfy are queued in the [`LoadContext`].
//! 2. **Deferred resolution.** Queued references are looked up across every
//!    container of the session in load order. A required reference that is
//!    found nowhere fails the whole session; an optional one is recorded as
//!    a [`ResolutionMiss`].
//!
//! A session either yields every container fully resolved or nothing.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::chunks::Chunk;
use crate::config::LoadConfig;
use crate::container::Container;
use crate::error::{Error, Result};
use crate::hash::NameHash;
use crate::kind::ResourceKind;
use crate::reference::{Ref, References, Requirement, Resolution};

/// An optional reference that no container of the session could satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionMiss {
    /// Load index of the container holding the reference.
    pub container: usize,
    pub owner: NameHash,
    pub tag: ResourceKind,
    pub field: &'static str,
    pub target: NameHash,
}

struct Source {
    label: String,
    bytes: Vec<u8>,
}

/// Collects container files, then loads them together.
pub struct LoadSession {
    config: LoadConfig,
    sources: Vec<Source>,
}

impl LoadSession {
    pub fn new(config: LoadConfig) -> Self {
        Self {
            config,
            sources: Vec::new(),
        }
    }

    /// Queue a container. Returns its load index.
    pub fn add(&mut self, label: impl Into<String>, bytes: Vec<u8>) -> usize {
        self.sources.push(Source {
            label: label.into(),
            bytes,
        });
        self.sources.len() - 1
    }

    /// Read and queue a container file.
    pub fn add_file(&mut self, path: &Path) -> Result<usize> {
        let bytes = std::fs::read(path)?;
        Ok(self.add(path.display().to_string(), bytes))
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Run all three phases.
    pub fn finish(self) -> Result<Archive> {
        let containers = self.decode_all()?;
        let mut context = LoadContext::new(containers);
        context.resolve_local()?;
        context.resolve_deferred()?;
        let archive = context.into_archive();
        info!(
            containers = archive.containers.len(),
            misses = archive.misses().count(),
            "session loaded"
        );
        Ok(archive)
    }

    fn decode_all(&self) -> Result<Vec<Container>> {
        let decode = |(index, source): (usize, &Source)| {
            Container::decode(index, source.label.clone(), &source.bytes, &self.config)
        };
        if self.config.parallel_decode && self.sources.len() > 1 {
            self.sources.par_iter().enumerate().map(decode).collect()
        } else {
            self.sources.iter().enumerate().map(decode).collect()
        }
    }
}

/// A reference phase 1 could not satisfy locally.
#[derive(Debug, Clone)]
struct Deferred {
    container: usize,
    owner: NameHash,
    tag: ResourceKind,
    /// Position of the reference in the owner's visiting order.
    slot: usize,
    target: NameHash,
    field: &'static str,
    requirement: Requirement,
}

/// State shared between the phases of one session.
struct LoadContext {
    containers: Vec<Container>,
    deferred: Vec<Deferred>,
}

impl LoadContext {
    fn new(containers: Vec<Container>) -> Self {
        Self {
            containers,
            deferred: Vec::new(),
        }
    }

    /// Phase 1.
    fn resolve_local(&mut self) -> Result<()> {
        let deferred = &mut self.deferred;
        for (index, container) in self.containers.iter_mut().enumerate() {
            container.assign_script_owners()?;

            let local: HashSet<NameHash> = container.registry().hashes().collect();
            let before = deferred.len();
            for chunk in container.registry_mut().iter_mut() {
                let (owner, tag) = (chunk.hash, chunk.kind);
                let mut slot = 0;
                chunk.data.for_each_ref_mut(&mut |r| {
                    if r.resolution == Resolution::Pending {
                        if local.contains(&r.hash) {
                            r.resolution = Resolution::Local;
                        } else {
                            deferred.push(Deferred {
                                container: index,
                                owner,
                                tag,
                                slot,
                                target: r.hash,
                                field: r.field,
                                requirement: r.requirement,
                            });
                        }
                    }
                    slot += 1;
                });
            }
            debug!(container = index, deferred = deferred.len() - before, "resolved locally");
        }
        Ok(())
    }

    /// Phase 2.
    fn resolve_deferred(&mut self) -> Result<()> {
        let mut index: HashMap<NameHash, usize> = HashMap::new();
        for (i, container) in self.containers.iter().enumerate() {
            for hash in container.registry().hashes() {
                index.entry(hash).or_insert(i);
            }
        }

        let mut updates: HashMap<(usize, NameHash), HashMap<usize, Resolution>> = HashMap::new();
        for d in std::mem::take(&mut self.deferred) {
            let resolution = match (index.get(&d.target), d.requirement) {
                (Some(&container), _) => Resolution::External { container },
                (None, Requirement::Required) => {
                    return Err(Error::UnresolvedReference {
                        target: d.target,
                        owner: d.owner,
                        tag: d.tag,
                        field: d.field,
                    })
                }
                (None, Requirement::Optional) => {
                    warn!(
                        container = d.container,
                        owner = %d.owner,
                        target = %d.target,
                        "optional reference '{}' resolved nowhere",
                        d.field
                    );
                    self.containers[d.container].misses.push(ResolutionMiss {
                        container: d.container,
                        owner: d.owner,
                        tag: d.tag,
                        field: d.field,
                        target: d.target,
                    });
                    Resolution::Missing
                }
            };
            updates.entry((d.container, d.owner)).or_default().insert(d.slot, resolution);
        }

        for ((container, owner), slots) in updates {
            let Some(chunk) = self.containers[container].registry_mut().resolve_mut(owner) else {
                continue;
            };
            let mut slot = 0;
            chunk.data.for_each_ref_mut(&mut |r| {
                if let Some(resolution) = slots.get(&slot) {
                    r.resolution = *resolution;
                }
                slot += 1;
            });
        }
        Ok(())
    }

    fn into_archive(self) -> Archive {
        Archive {
            containers: self.containers,
        }
    }
}

/// Every container of a finished session.
#[derive(Debug, Clone)]
pub struct Archive {
    containers: Vec<Container>,
}

impl Archive {
    pub fn containers(&self) -> &[Container] {
        &self.containers
    }

    pub fn container(&self, index: usize) -> Option<&Container> {
        self.containers.get(index)
    }

    pub fn container_mut(&mut self, index: usize) -> Option<&mut Container> {
        self.containers.get_mut(index)
    }

    /// Find a container by the label it was added with.
    pub fn find(&self, label: &str) -> Option<&Container> {
        self.containers.iter().find(|c| c.label() == label)
    }

    pub fn into_containers(self) -> Vec<Container> {
        self.containers
    }

    /// The first container in load order that holds `hash`, and the chunk.
    pub fn resolve(&self, hash: NameHash) -> Option<(usize, &Chunk)> {
        self.containers
            .iter()
            .enumerate()
            .find_map(|(i, c)| c.resolve(hash).map(|chunk| (i, chunk)))
    }

    /// Follow a reference held by container `from`.
    pub fn follow(&self, from: usize, r: &Ref) -> Option<&Chunk> {
        match r.resolution {
            Resolution::Local => self.containers.get(from)?.resolve(r.hash),
            Resolution::External { container } => self.containers.get(container)?.resolve(r.hash),
            _ => None,
        }
    }

    pub fn misses(&self) -> impl Iterator<Item = &ResolutionMiss> {
        self.containers.iter().flat_map(|c| c.misses())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunks::{ChunkData, EntityInst, Opaque};

    fn container_with(label: &str, chunks: Vec<Chunk>) -> Vec<u8> {
        let mut container = Container::new(label);
        for chunk in chunks {
            container.add_resource(chunk).unwrap();
        }
        container.save().unwrap()
    }

    fn desc(name: &str) -> Chunk {
        Chunk::new(ResourceKind::ActorDesc, name, ChunkData::Opaque(Opaque::default()))
    }

    fn entity(name: &str, description: &str) -> Chunk {
        let entity = EntityInst::new(NameHash::of(description));
        Chunk::new(ResourceKind::EntityInst, name, ChunkData::EntityInst(entity))
    }

    #[test]
    fn cross_container_reference_is_external() {
        let shared = container_with("shared", vec![desc("goblin")]);
        let level = container_with("level", vec![entity("g1", "goblin")]);

        let mut session = LoadSession::new(LoadConfig::default());
        session.add("level", level);
        session.add("shared", shared);
        let archive = session.finish().unwrap();

        let (index, chunk) = archive.resolve(NameHash::of("g1")).unwrap();
        assert_eq!(index, 0);
        let description = &chunk.entity().unwrap().description;
        assert_eq!(description.resolution, Resolution::External { container: 1 });
        assert_eq!(archive.follow(index, description).unwrap().name, "goblin");
        assert_eq!(archive.misses().count(), 0);
    }

    #[test]
    fn missing_required_reference_fails_session() {
        let level = container_with("level", vec![entity("g1", "goblin")]);
        let other = container_with("other", vec![desc("troll")]);
        let mut session = LoadSession::new(LoadConfig::default());
        session.add("level", level);
        session.add("other", other);
        assert!(matches!(
            session.finish(),
            Err(Error::UnresolvedReference { field: "description", .. })
        ));
    }

    #[test]
    fn sequential_decode_matches_parallel() {
        let shared = container_with("shared", vec![desc("goblin")]);
        let level = container_with("level", vec![entity("g1", "goblin")]);
        let load = |config: LoadConfig| {
            let mut session = LoadSession::new(config);
            session.add("level", level.clone());
            session.add("shared", shared.clone());
            let archive = session.finish().unwrap();
            archive.containers().iter().map(|c| c.save().unwrap()).collect::<Vec<_>>()
        };
        assert_eq!(load(LoadConfig::default()), load(LoadConfig::from_skip_list(&["parallel"])));
    }
}
