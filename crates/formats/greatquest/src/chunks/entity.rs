use serde::Serialize;

use crate::cursor::{Cursor, Writer};
use crate::error::{Error, Result};
use crate::hash::NameHash;
use crate::reference::{Ref, References};

/// Payload size of a plain entity instance.
pub const BASE_SIZE: usize = 28;
/// Payload size of an entity instance with a 3D placement.
pub const ENTITY_3D_SIZE: usize = 240;

/// One placed entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityInst {
    /// Actor or prop description the entity is created from.
    pub description: Ref,
    pub priority: i32,
    pub group: u32,
    /// Script in the container's script list, or -1.
    pub script_index: i32,
    pub target_entity: Ref,
    pub reserved: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement: Option<Placement>,
}

/// The 3D extension of an entity instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placement {
    pub flags: u32,
    pub billboard_axis: u32,
    pub position: [f32; 4],
    pub rotation: [f32; 4],
    pub scale: [f32; 4],
    pub reserved: [u32; 7],
    #[serde(skip)]
    pub padding: [u32; 32],
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            flags: 0,
            billboard_axis: 0,
            position: [0.0, 0.0, 0.0, 1.0],
            rotation: [0.0; 4],
            scale: [1.0, 1.0, 1.0, 1.0],
            reserved: [0; 7],
            padding: [0; 32],
        }
    }
}

impl EntityInst {
    pub fn new(description: NameHash) -> Self {
        Self {
            description: Ref::required(description, "description"),
            priority: 0,
            group: 0,
            script_index: -1,
            target_entity: Ref::optional(NameHash::ZERO, "target_entity"),
            reserved: 0,
            placement: None,
        }
    }

    /// Decode a payload of a known size. Returns `None` for any other size.
    pub fn parse(c: &mut Cursor<'_>) -> Result<Option<Self>> {
        let offset = c.file_offset();
        let size = c.peek_at(0, |c| c.read_u32())? as usize;
        if size != c.len() {
            return Err(Error::SizeMismatch {
                context: "entity instance",
                offset,
                declared: size,
                actual: c.len(),
            });
        }
        if size != BASE_SIZE && size != ENTITY_3D_SIZE {
            return Ok(None);
        }

        c.skip(4)?;
        let mut entity = Self {
            description: Ref::required(NameHash(c.read_u32()?), "description"),
            priority: c.read_i32()?,
            group: c.read_u32()?,
            script_index: c.read_i32()?,
            target_entity: Ref::optional(NameHash(c.read_u32()?), "target_entity"),
            reserved: c.read_u32()?,
            placement: None,
        };
        if size == ENTITY_3D_SIZE {
            entity.placement = Some(Placement {
                flags: c.read_u32()?,
                billboard_axis: c.read_u32()?,
                position: c.read_f32_array::<4>()?,
                rotation: c.read_f32_array::<4>()?,
                scale: c.read_f32_array::<4>()?,
                reserved: c.read_u32_array::<7>()?,
                padding: c.read_u32_array::<32>()?,
            });
        }
        Ok(Some(entity))
    }

    pub fn encoded_size(&self) -> usize {
        if self.placement.is_some() {
            ENTITY_3D_SIZE
        } else {
            BASE_SIZE
        }
    }

    pub fn write(&self, w: &mut Writer) {
        w.write_u32(self.encoded_size() as u32);
        w.write_u32(self.description.hash.0);
        w.write_i32(self.priority);
        w.write_u32(self.group);
        w.write_i32(self.script_index);
        w.write_u32(self.target_entity.hash.0);
        w.write_u32(self.reserved);
        if let Some(p) = &self.placement {
            w.write_u32(p.flags);
            w.write_u32(p.billboard_axis);
            w.write_f32_slice(&p.position);
            w.write_f32_slice(&p.rotation);
            w.write_f32_slice(&p.scale);
            w.write_u32_slice(&p.reserved);
            w.write_u32_slice(&p.padding);
        }
    }

    pub fn script_index(&self) -> Option<usize> {
        usize::try_from(self.script_index).ok()
    }
}

impl References for EntityInst {
    fn for_each_ref(&self, f: &mut dyn FnMut(&Ref)) {
        f(&self.description);
        f(&self.target_entity);
    }

    fn for_each_ref_mut(&mut self, f: &mut dyn FnMut(&mut Ref)) {
        f(&mut self.description);
        f(&mut self.target_entity);
    }
}
