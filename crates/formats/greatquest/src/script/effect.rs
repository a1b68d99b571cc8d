use std::fmt;

use serde::Serialize;

use crate::cursor::{Cursor, Writer};
use crate::error::{Error, Result};
use crate::hash::NameHash;
use crate::reference::{Ref, References, Requirement};

use super::action::{Action, ActionContext};
use super::param::{
    decode_operands, encode_operands, op, validate_operands, Operand, OperandSpec, Param, ParamKind,
    MAX_ARGUMENT_COUNT,
};

/// Fixed part of an effect record: size, kind, command, target, four params.
pub const EFFECT_HEADER_SIZE: usize = 0x20;

/// Which command table an effect's command id is looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Actor,
    Entity,
    Camera,
    Ai,
    Other(u32),
}

impl EffectKind {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => EffectKind::Actor,
            1 => EffectKind::Entity,
            2 => EffectKind::Camera,
            3 => EffectKind::Ai,
            other => EffectKind::Other(other),
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            EffectKind::Actor => 0,
            EffectKind::Entity => 1,
            EffectKind::Camera => 2,
            EffectKind::Ai => 3,
            EffectKind::Other(raw) => raw,
        }
    }
}

pub const CAMERA_PARAMS: &[&str] = &["distance", "height", "pitch", "yaw", "fov", "lag"];

/// Commands understood by camera effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CameraEffect {
    ActivateCamera,
    DeactivateCamera,
    SetCameraTarget,
    SetCameraPivot,
    SetCameraParam,
}

const CAMERA_EFFECTS: [CameraEffect; 5] = [
    CameraEffect::ActivateCamera,
    CameraEffect::DeactivateCamera,
    CameraEffect::SetCameraTarget,
    CameraEffect::SetCameraPivot,
    CameraEffect::SetCameraParam,
];

impl CameraEffect {
    pub fn from_id(id: u32) -> Option<Self> {
        CAMERA_EFFECTS.get(id as usize).copied()
    }

    pub fn id(self) -> u32 {
        self as u32
    }

    pub fn operands(self) -> &'static [OperandSpec] {
        const TICKS: &[OperandSpec] = &[op("ticks", ParamKind::Int)];
        const TARGET: &[OperandSpec] = &[op("entity", ParamKind::Ref(Requirement::Optional))];
        const PARAM: &[OperandSpec] = &[
            op("param", ParamKind::Enum(CAMERA_PARAMS)),
            op("value", ParamKind::Float),
        ];
        match self {
            CameraEffect::ActivateCamera | CameraEffect::DeactivateCamera => TICKS,
            CameraEffect::SetCameraTarget | CameraEffect::SetCameraPivot => TARGET,
            CameraEffect::SetCameraParam => PARAM,
        }
    }
}

impl fmt::Display for CameraEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The command carried by an effect, decoded through its kind's table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "table", rename_all = "snake_case")]
pub enum EffectCommand {
    Action {
        action: Action,
    },
    Camera {
        id: CameraEffect,
        args: Vec<Operand>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        extra: Vec<Param>,
    },
    /// No table knows this command; parameters are kept verbatim.
    Unhandled {
        command: u32,
        params: [Param; MAX_ARGUMENT_COUNT],
    },
}

impl EffectCommand {
    pub fn name(&self) -> String {
        match self {
            EffectCommand::Action { action } => action.name(),
            EffectCommand::Camera { id, .. } => id.to_string(),
            EffectCommand::Unhandled { command, .. } => format!("Unhandled({command:#x})"),
        }
    }

    fn decode(
        kind: EffectKind,
        command: u32,
        params: [Param; MAX_ARGUMENT_COUNT],
        strict: bool,
        owner: NameHash,
    ) -> Result<Self> {
        match kind {
            EffectKind::Actor | EffectKind::Entity | EffectKind::Ai => Ok(EffectCommand::Action {
                action: Action::decode(command, params, ActionContext::Script, strict, owner)?,
            }),
            EffectKind::Camera => match CameraEffect::from_id(command) {
                Some(id) => {
                    let decoded = decode_operands(id.operands(), &params, strict, || id.to_string(), owner)?;
                    Ok(EffectCommand::Camera {
                        id,
                        args: decoded.args,
                        extra: decoded.extra,
                    })
                }
                None => Ok(EffectCommand::Unhandled { command, params }),
            },
            EffectKind::Other(_) => Ok(EffectCommand::Unhandled { command, params }),
        }
    }

    fn encode(&self, owner: NameHash) -> Result<(u32, [Param; MAX_ARGUMENT_COUNT])> {
        match self {
            EffectCommand::Action { action } => action.encode(ActionContext::Script, owner),
            EffectCommand::Camera { id, args, extra } => {
                let params = encode_operands(id.operands(), args, extra, MAX_ARGUMENT_COUNT, || id.to_string(), owner)?;
                let mut block = [Param::ZERO; MAX_ARGUMENT_COUNT];
                block.copy_from_slice(&params);
                Ok((id.id(), block))
            }
            EffectCommand::Unhandled { command, params } => Ok((*command, *params)),
        }
    }

    fn validate_argument_count(&self, owner: NameHash) -> Result<()> {
        match self {
            EffectCommand::Action { action } => action.validate_argument_count(ActionContext::Script, owner),
            EffectCommand::Camera { id, args, .. } => validate_operands(id.operands(), args, || id.to_string(), owner),
            EffectCommand::Unhandled { .. } => Ok(()),
        }
    }
}

/// The action half of a script function: one command aimed at an entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Effect {
    pub kind: EffectKind,
    /// Entity the command runs on. Null means the script's owner.
    pub target: Ref,
    pub command: EffectCommand,
    /// Record bytes past the fixed header.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trailing: Vec<u8>,
}

impl Effect {
    pub fn action(target: NameHash, action: Action) -> Self {
        Self {
            kind: EffectKind::Entity,
            target: Ref::optional(target, "target"),
            command: EffectCommand::Action { action },
            trailing: Vec::new(),
        }
    }

    pub fn encoded_size(&self) -> usize {
        EFFECT_HEADER_SIZE + self.trailing.len()
    }

    pub fn read(c: &mut Cursor<'_>, strict: bool, owner: NameHash) -> Result<Self> {
        let offset = c.file_offset();
        let size = c.read_u32()? as usize;
        if size < EFFECT_HEADER_SIZE {
            return Err(Error::SizeMismatch {
                context: "effect record",
                offset,
                declared: size,
                actual: EFFECT_HEADER_SIZE,
            });
        }
        let kind = EffectKind::from_raw(c.read_u32()?);
        let command = c.read_u32()?;
        let target = Ref::optional(NameHash(c.read_u32()?), "target");
        let params = Param::read_block(c)?;
        let trailing = c.read_bytes(size - EFFECT_HEADER_SIZE)?.to_vec();
        Ok(Self {
            kind,
            target,
            command: EffectCommand::decode(kind, command, params, strict, owner)?,
            trailing,
        })
    }

    pub fn write(&self, w: &mut Writer, owner: NameHash) -> Result<()> {
        let (command, params) = self.command.encode(owner)?;
        w.write_u32(self.encoded_size() as u32);
        w.write_u32(self.kind.raw());
        w.write_u32(command);
        w.write_u32(self.target.hash.0);
        for p in params {
            p.write(w);
        }
        w.write_bytes(&self.trailing);
        Ok(())
    }

    pub fn validate_argument_count(&self, owner: NameHash) -> Result<()> {
        self.command.validate_argument_count(owner)
    }
}

impl References for Effect {
    fn for_each_ref(&self, f: &mut dyn FnMut(&Ref)) {
        f(&self.target);
        match &self.command {
            EffectCommand::Action { action } => action.for_each_ref(f),
            EffectCommand::Camera { args, .. } => args.for_each_ref(f),
            EffectCommand::Unhandled { .. } => {}
        }
    }

    fn for_each_ref_mut(&mut self, f: &mut dyn FnMut(&mut Ref)) {
        f(&mut self.target);
        match &mut self.command {
            EffectCommand::Action { action } => action.for_each_ref_mut(f),
            EffectCommand::Camera { args, .. } => args.for_each_ref_mut(f),
            EffectCommand::Unhandled { .. } => {}
        }
    }
}
