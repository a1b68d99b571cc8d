use std::collections::HashSet;

use tracing::{debug, warn};

use crate::chunks::{Chunk, ChunkData};
use crate::config::LoadConfig;
use crate::cursor::Writer;
use crate::error::{Error, Result};
use crate::hash::{NameHash, NameTable};
use crate::kind::ResourceKind;
use crate::reader::{write_chunk, ChunkIndex};
use crate::reference::{Ref, References, Requirement, Resolution};
use crate::registry::Registry;
use crate::script::list::ScriptList;
use crate::session::{LoadSession, ResolutionMiss};
use crate::toc::{warn_if_unsorted, TocGroup};

/// One loaded resource file.
#[derive(Debug, Clone)]
pub struct Container {
    /// Position in the session that loaded it.
    pub(crate) index: usize,
    label: String,
    registry: Registry,
    groups: Vec<TocGroup>,
    names: NameTable,
    pub(crate) misses: Vec<ResolutionMiss>,
    padding: u8,
}

impl Container {
    /// An empty container. The first added resource opens an unnamed table of contents.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            index: 0,
            label: label.into(),
            registry: Registry::new(),
            groups: Vec::new(),
            names: NameTable::new(),
            misses: Vec::new(),
            padding: 0,
        }
    }

    /// Load a single file. References it cannot satisfy itself are treated
    /// as missing from the whole session.
    pub fn load(bytes: &[u8], config: &LoadConfig) -> Result<Self> {
        let mut session = LoadSession::new(config.clone());
        session.add("<memory>", bytes.to_vec());
        session
            .finish()?
            .into_containers()
            .pop()
            .ok_or_else(|| Error::Parse {
                context: "container",
                message: "session produced no container".into(),
            })
    }

    /// Phase 0: walk chunks, assign hashes from the tables of contents, decode payloads.
    pub(crate) fn decode(index: usize, label: String, bytes: &[u8], config: &LoadConfig) -> Result<Self> {
        let chunk_index = ChunkIndex::parse(bytes)?;
        let mut container = Self::new(label);
        container.index = index;
        container.padding = config.name_padding;

        let mut current: Option<TocGroup> = None;
        for entry in chunk_index.chunks() {
            let kind = entry.kind();
            let name = chunk_index.name(bytes, entry)?;
            let payload = chunk_index.payload(bytes, entry);

            if kind == ResourceKind::Toc {
                if let Some(group) = current.take() {
                    container.close_group(group, config)?;
                }
                current = Some(TocGroup::parse(name, payload, entry.offset)?);
                continue;
            }

            let Some(group) = current.as_mut() else {
                return Err(Error::TocInconsistent {
                    offset: entry.offset,
                    message: format!("{kind} chunk '{name}' precedes the first table of contents"),
                });
            };
            let hash = match group.next_hash() {
                Some(hash) => hash,
                None if !config.strict_toc => {
                    let hash = NameHash::of(&name);
                    warn!(offset = entry.offset, "table '{}' is exhausted; hashing {kind} chunk '{name}' by name", group.name);
                    hash
                }
                None => {
                    return Err(Error::TocInconsistent {
                        offset: entry.offset,
                        message: format!("table '{}' has no hash left for {kind} chunk '{name}'", group.name),
                    })
                }
            };
            if !name.is_empty() && !container.names.insert_if_matches(hash, &name) {
                warn!(%hash, offset = entry.offset, "{kind} chunk name '{name}' does not hash to its table entry");
            }

            let data = ChunkData::decode(kind, &name, hash, payload, entry.data_offset(), config)?;
            group.members.push(hash);
            container.registry.register(Chunk {
                kind,
                hash,
                name,
                offset: Some(entry.offset),
                data,
            })?;
        }
        if let Some(group) = current {
            container.close_group(group, config)?;
        }

        for chunk in container.registry.iter() {
            if let ChunkData::NamedHash(table) = &chunk.data {
                for entry in &table.entries {
                    container.names.insert(&entry.key);
                }
            }
        }
        debug!(
            label = %container.label,
            chunks = container.registry.len(),
            groups = container.groups.len(),
            "decoded container"
        );
        Ok(container)
    }

    fn close_group(&mut self, group: TocGroup, config: &LoadConfig) -> Result<()> {
        group.finish(config.strict_toc)?;
        if config.warn_unsorted {
            let entries: Vec<(ResourceKind, &str)> = group
                .members
                .iter()
                .filter_map(|h| self.registry.resolve(*h))
                .map(|c| (c.kind, c.name.as_str()))
                .collect();
            warn_if_unsorted(&group.name, &entries);
        }
        self.groups.push(group);
        Ok(())
    }

    /// Encode the container: each table of contents followed by its chunks.
    pub fn save(&self) -> Result<Vec<u8>> {
        for chunk in self.registry.iter() {
            chunk.data.validate_argument_count(chunk.hash)?;
        }

        let listed: HashSet<NameHash> = self.groups.iter().flat_map(|g| g.members.iter().copied()).collect();
        if let Some(chunk) = self.registry.iter().find(|c| !listed.contains(&c.hash)) {
            return Err(Error::TocInconsistent {
                offset: chunk.offset.unwrap_or(0),
                message: format!("{} '{}' ({}) is not listed in any table", chunk.kind, chunk.name, chunk.hash),
            });
        }

        let mut w = Writer::new();
        for group in &self.groups {
            write_chunk(&mut w, ResourceKind::Toc, &group.name, self.padding, |w| {
                group.write(w);
                Ok(())
            })
            .map_err(|e| e.into_unencodable(ResourceKind::Toc, NameHash::ZERO))?;

            for &hash in &group.members {
                let chunk = self.registry.resolve(hash).ok_or_else(|| Error::TocInconsistent {
                    offset: group.offset.unwrap_or(0),
                    message: format!("table '{}' lists {hash} but no such resource exists", group.name),
                })?;
                write_chunk(&mut w, chunk.kind, &chunk.name, self.padding, |w| {
                    chunk.data.encode(w, chunk.hash, self.padding)
                })
                .map_err(|e| e.into_unencodable(chunk.kind, chunk.hash))?;
            }
        }
        Ok(w.into_bytes())
    }

    /// Add a resource to the last table of contents, creating one if needed.
    ///
    /// Its references stay pending until [`Container::re_resolve`].
    pub fn add_resource(&mut self, chunk: Chunk) -> Result<()> {
        if chunk.kind == ResourceKind::Toc {
            return Err(Error::TocInconsistent {
                offset: chunk.offset.unwrap_or(0),
                message: format!("table of contents '{}' cannot be added as a resource", chunk.name),
            });
        }
        let hash = chunk.hash;
        if !chunk.name.is_empty() {
            self.names.insert_if_matches(hash, &chunk.name);
        }
        self.registry.register(chunk)?;
        if self.groups.is_empty() {
            self.groups.push(TocGroup::new(""));
        }
        if let Some(group) = self.groups.last_mut() {
            group.declared.push(hash);
            group.members.push(hash);
        }
        Ok(())
    }

    /// Remove a resource and its table entry. References to it dangle until
    /// the next [`Container::re_resolve`].
    pub fn remove_resource(&mut self, hash: NameHash) -> Option<Chunk> {
        let chunk = self.registry.remove(hash)?;
        for group in &mut self.groups {
            group.members.retain(|h| *h != hash);
            group.declared.retain(|h| *h != hash);
        }
        Some(chunk)
    }

    /// Resolve references again after edits, against this container only.
    ///
    /// References resolved into other containers are left alone. Fails
    /// without changing anything when a required reference has no target.
    pub fn re_resolve(&mut self) -> Result<()> {
        let local: HashSet<NameHash> = self.registry.hashes().collect();
        let needs_lookup = |r: &Ref| !r.is_null() && !matches!(r.resolution, Resolution::External { .. });

        for chunk in self.registry.iter() {
            let mut dangling: Option<Ref> = None;
            chunk.data.for_each_ref(&mut |r| {
                if dangling.is_none()
                    && r.requirement == Requirement::Required
                    && needs_lookup(r)
                    && !local.contains(&r.hash)
                {
                    dangling = Some(r.clone());
                }
            });
            if let Some(r) = dangling {
                return Err(Error::UnresolvedReference {
                    target: r.hash,
                    owner: chunk.hash,
                    tag: chunk.kind,
                    field: r.field,
                });
            }
        }

        self.assign_script_owners()?;
        let index = self.index;
        let mut misses = Vec::new();
        for chunk in self.registry.iter_mut() {
            let (owner, tag) = (chunk.hash, chunk.kind);
            chunk.data.for_each_ref_mut(&mut |r| {
                if !needs_lookup(&*r) {
                    return;
                }
                if local.contains(&r.hash) {
                    r.resolution = Resolution::Local;
                } else {
                    r.resolution = Resolution::Missing;
                    misses.push(ResolutionMiss {
                        container: index,
                        owner,
                        tag,
                        field: r.field,
                        target: r.hash,
                    });
                }
            });
        }
        self.misses = misses;
        Ok(())
    }

    /// Link each script to the entity whose `script_index` selects it.
    pub(crate) fn assign_script_owners(&mut self) -> Result<()> {
        let claims: Vec<(NameHash, usize)> = self
            .registry
            .iter()
            .filter_map(|c| c.entity().and_then(|e| e.script_index()).map(|i| (c.hash, i)))
            .collect();
        let list = self.registry.iter_mut().find_map(|c| {
            let hash = c.hash;
            match &mut c.data {
                ChunkData::ScriptList(list) => Some((hash, list)),
                _ => None,
            }
        });
        match list {
            Some((hash, list)) => list.assign_owners(&claims, hash),
            None => {
                if !claims.is_empty() {
                    warn!(label = %self.label, "{} entities select scripts but there is no script list", claims.len());
                }
                Ok(())
            }
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn resolve(&self, hash: NameHash) -> Option<&Chunk> {
        self.registry.resolve(hash)
    }

    /// Mutable access for edits. Call [`Container::re_resolve`] after changing references.
    pub fn resolve_mut(&mut self, hash: NameHash) -> Option<&mut Chunk> {
        self.registry.resolve_mut(hash)
    }

    /// Follow a reference resolved within this container.
    pub fn follow(&self, r: &Ref) -> Option<&Chunk> {
        match r.resolution {
            Resolution::Local => self.registry.resolve(r.hash),
            _ => None,
        }
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.registry.iter()
    }

    pub fn groups(&self) -> &[TocGroup] {
        &self.groups
    }

    /// Every table-of-contents hash, in file order.
    pub fn toc_hashes(&self) -> Vec<NameHash> {
        self.groups.iter().flat_map(|g| g.members.iter().copied()).collect()
    }

    pub fn names(&self) -> &NameTable {
        &self.names
    }

    /// Optional references that resolved nowhere.
    pub fn misses(&self) -> &[ResolutionMiss] {
        &self.misses
    }

    /// The script list and the hash of the chunk holding it.
    pub fn script_list(&self) -> Option<(NameHash, &ScriptList)> {
        self.registry.iter().find_map(|c| c.script_list().map(|s| (c.hash, s)))
    }

    pub fn padding(&self) -> u8 {
        self.padding
    }

    pub fn set_padding(&mut self, padding: u8) {
        self.padding = padding;
    }
}
