use serde::Serialize;
use tracing::{debug, warn};

use crate::cursor::{Cursor, Writer};
use crate::error::{Error, Result};
use crate::hash::NameHash;
use crate::reference::{Ref, References};

use super::cause::Cause;
use super::effect::Effect;

/// Name of the raw chunk holding a container's scripts.
pub const SCRIPT_LIST_NAME: &str = "scriptdata";

/// Cause record words before the extras: size, type, effect offset, effect count, sub.
const CAUSE_FIXED_WORDS: usize = 5;

/// A cause and the effects it runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptFunction {
    pub cause: Cause,
    pub effects: Vec<Effect>,
}

/// All functions attached to one entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Script {
    /// Entity whose `script_index` selects this script, filled in while loading.
    pub owner: Option<NameHash>,
    pub functions: Vec<ScriptFunction>,
}

impl Script {
    /// Union of every function's cause type bit.
    pub fn cause_types(&self) -> u32 {
        self.functions.iter().fold(0, |mask, f| mask | f.cause.type_value())
    }

    pub fn effect_count(&self) -> usize {
        self.functions.iter().map(|f| f.effects.len()).sum()
    }
}

/// Every script of a container, decoded from the `scriptdata` raw chunk.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ScriptList {
    pub scripts: Vec<Script>,
    /// Bytes after the last effect record.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trailing: Vec<u8>,
}

/// Decoded effect records and the byte offset of each within the effect pool.
struct EffectPool<'a> {
    effects: &'a [Effect],
    offsets: &'a [usize],
    len: usize,
}

impl EffectPool<'_> {
    /// The `count` effects starting at byte `offset`.
    ///
    /// A cause with no effects may point anywhere in the pool, including its end.
    fn slice(&self, offset: usize, count: usize) -> std::result::Result<Vec<Effect>, String> {
        if count == 0 {
            if offset > self.len {
                return Err(format!("effect offset {offset:#x} is past the effect pool"));
            }
            return Ok(Vec::new());
        }
        let first = self
            .offsets
            .binary_search(&offset)
            .map_err(|_| format!("effect offset {offset:#x} is not an effect boundary"))?;
        self.effects
            .get(first..first + count)
            .map(<[Effect]>::to_vec)
            .ok_or_else(|| format!("{count} effects at {offset:#x} run past the list"))
    }
}

struct Entry {
    cause_types: u32,
    cause_start: usize,
    cause_count: usize,
    effect_count: usize,
}

impl ScriptList {
    pub fn is_script_chunk(name: &str, hash: NameHash) -> bool {
        name.eq_ignore_ascii_case(SCRIPT_LIST_NAME) || hash == NameHash::of(SCRIPT_LIST_NAME)
    }

    /// Decode the interim layout: header counts, script entries, the cause
    /// value array, then the effect records that cause records point into.
    pub fn parse(c: &mut Cursor<'_>, strict: bool, owner: NameHash) -> Result<Self> {
        let entry_count = c.read_u32()? as usize;
        let value_count = c.read_u32()? as usize;
        let effect_count = c.read_u32()? as usize;

        let entries = c.read_vec(entry_count, |c| {
            Ok(Entry {
                cause_types: c.read_u32()?,
                cause_start: c.read_u32()? as usize,
                cause_count: c.read_u32()? as usize,
                effect_count: c.read_u32()? as usize,
            })
        })?;
        let values = c.read_vec(value_count, |c| c.read_i32())?;

        let effects_start = c.position();
        let mut effects = Vec::with_capacity(effect_count);
        let mut effect_offsets = Vec::with_capacity(effect_count);
        for _ in 0..effect_count {
            effect_offsets.push(c.position() - effects_start);
            effects.push(Effect::read(c, strict, owner)?);
        }
        let effects_len = c.position() - effects_start;
        let trailing = c.read_rest().to_vec();
        if !trailing.is_empty() {
            warn!(%owner, "{} trailing bytes after script effects", trailing.len());
        }

        let mut scripts = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let pool = EffectPool {
                effects: &effects,
                offsets: &effect_offsets,
                len: effects_len,
            };
            let script = Self::parse_script(index, entry, &values, &pool, strict, owner)?;
            scripts.push(script);
        }
        debug!(%owner, scripts = scripts.len(), effects = effects.len(), "decoded script list");
        Ok(Self { scripts, trailing })
    }

    fn parse_script(
        index: usize,
        entry: &Entry,
        values: &[i32],
        pool: &EffectPool<'_>,
        strict: bool,
        owner: NameHash,
    ) -> Result<Script> {
        let mut functions = Vec::with_capacity(entry.cause_count);
        let mut pos = entry.cause_start;
        for _ in 0..entry.cause_count {
            let record = values
                .get(pos..)
                .and_then(|rest| rest.first().map(|&size| (size, rest)))
                .ok_or_else(|| script_error(index, format!("cause record at value {pos} is past the end")))?;
            let (size, rest) = record;
            let words = usize::try_from(size).unwrap_or(0) / 4;
            if size % 4 != 0 || words < CAUSE_FIXED_WORDS || words > rest.len() {
                return Err(script_error(index, format!("cause record at value {pos} has bad size {size}")));
            }
            let record = &rest[..words];
            let raw_type = record[1] as u32;
            let effect_offset = (record[2] as u32 as usize) * 4;
            let count = record[3] as u32 as usize;
            let sub = record[4];
            let cause = Cause::decode(raw_type, sub, &record[CAUSE_FIXED_WORDS..], strict, owner)?;

            let effects = pool.slice(effect_offset, count).map_err(|message| script_error(index, message))?;

            functions.push(ScriptFunction { cause, effects });
            pos += words;
        }

        let script = Script { owner: None, functions };
        if script.cause_types() != entry.cause_types {
            return Err(script_error(
                index,
                format!(
                    "declared cause types {:#x} but causes give {:#x}",
                    entry.cause_types,
                    script.cause_types()
                ),
            ));
        }
        if script.effect_count() != entry.effect_count {
            warn!(
                %owner,
                "script {index} declares {} effects but its causes reference {}",
                entry.effect_count,
                script.effect_count()
            );
        }
        Ok(script)
    }

    /// Encode in the interim layout. Effects are laid out in function order.
    pub fn write(&self, w: &mut Writer, owner: NameHash) -> Result<()> {
        let mut values: Vec<i32> = Vec::new();
        let mut effects = Writer::new();
        let mut effect_total = 0usize;
        let mut entries = Vec::with_capacity(self.scripts.len());

        for script in &self.scripts {
            let cause_start = values.len();
            for function in &script.functions {
                let offset = effects.position();
                if offset % 4 != 0 {
                    return Err(Error::Parse {
                        context: "script list",
                        message: format!("effect offset {offset:#x} is not 4-byte aligned"),
                    });
                }
                let extras = function.cause.extra_values(owner)?;
                values.push(((CAUSE_FIXED_WORDS + extras.len()) * 4) as i32);
                values.push(function.cause.type_value() as i32);
                values.push((offset / 4) as i32);
                values.push(function.effects.len() as i32);
                values.push(function.cause.sub());
                values.extend(extras);
                for effect in &function.effects {
                    effect.write(&mut effects, owner)?;
                }
                effect_total += function.effects.len();
            }
            entries.push(Entry {
                cause_types: script.cause_types(),
                cause_start,
                cause_count: script.functions.len(),
                effect_count: script.effect_count(),
            });
        }

        w.write_u32(entries.len() as u32);
        w.write_u32(values.len() as u32);
        w.write_u32(effect_total as u32);
        for entry in &entries {
            w.write_u32(entry.cause_types);
            w.write_u32(entry.cause_start as u32);
            w.write_u32(entry.cause_count as u32);
            w.write_u32(entry.effect_count as u32);
        }
        for v in values {
            w.write_i32(v);
        }
        w.write_bytes(&effects.into_bytes());
        w.write_bytes(&self.trailing);
        Ok(())
    }

    pub fn validate_argument_count(&self, owner: NameHash) -> Result<()> {
        for function in self.scripts.iter().flat_map(|s| &s.functions) {
            function.cause.validate_argument_count(owner)?;
            for effect in &function.effects {
                effect.validate_argument_count(owner)?;
            }
        }
        Ok(())
    }

    /// Record which entity owns each script.
    ///
    /// `claims` pairs an entity hash with its script index, in load order.
    pub fn assign_owners(&mut self, claims: &[(NameHash, usize)], container: NameHash) -> Result<()> {
        let mut owners: Vec<Option<NameHash>> = vec![None; self.scripts.len()];
        for &(entity, index) in claims {
            let Some(slot) = owners.get_mut(index) else {
                warn!(%container, %entity, "entity claims script {index} but only {} exist", self.scripts.len());
                continue;
            };
            if let Some(first) = *slot {
                return Err(Error::ScriptOwnerConflict {
                    index,
                    first,
                    second: entity,
                });
            }
            *slot = Some(entity);
        }
        for (script, owner) in self.scripts.iter_mut().zip(owners) {
            script.owner = owner;
        }
        Ok(())
    }
}

fn script_error(index: usize, message: String) -> Error {
    Error::Parse {
        context: "script list",
        message: format!("script {index}: {message}"),
    }
}

impl References for ScriptList {
    fn for_each_ref(&self, f: &mut dyn FnMut(&Ref)) {
        for function in self.scripts.iter().flat_map(|s| &s.functions) {
            function.cause.for_each_ref(f);
            function.effects.for_each_ref(f);
        }
    }

    fn for_each_ref_mut(&mut self, f: &mut dyn FnMut(&mut Ref)) {
        for function in self.scripts.iter_mut().flat_map(|s| &mut s.functions) {
            function.cause.for_each_ref_mut(f);
            function.effects.for_each_ref_mut(f);
        }
    }
}
