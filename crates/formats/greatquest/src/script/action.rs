use std::fmt;

use serde::Serialize;

use crate::cursor::{Cursor, Writer};
use crate::error::Result;
use crate::hash::NameHash;
use crate::reference::{Ref, References, Requirement};

use super::param::{
    decode_operands, encode_operands, op, validate_operands, Operand, OperandSpec, Param, ParamKind,
    MAX_ARGUMENT_COUNT,
};

/// Where a command is decoded. A few commands lay out their operands
/// differently inside an action sequence than inside a script effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionContext {
    Script,
    Sequence,
}

/// What kind of entity a command operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTarget {
    Any,
    Entity3D,
    Actor,
    Prop,
}

pub const AXES: &[&str] = &["x", "y", "z"];
pub const ATTACH_TYPES: &[&str] = &["none", "effect", "sensor", "attack", "bump", "particle"];
pub const AI_GOALS: &[&str] = &["none", "idle", "wander", "follow", "flee", "attack", "guard", "return_home"];
pub const ANIMATION_MODES: &[&str] = &["play_once", "loop", "hold", "ping_pong"];

const NONE: &[OperandSpec] = &[];
const FLAG_MASK: &[OperandSpec] = &[op("flagMask", ParamKind::UInt)];
const ACTIVE: &[OperandSpec] = &[op("active", ParamKind::Bool)];
const VECTOR: &[OperandSpec] = &[
    op("x", ParamKind::Float),
    op("y", ParamKind::Float),
    op("z", ParamKind::Float),
];
const AXIS_VALUE: &[OperandSpec] = &[op("axis", ParamKind::Enum(AXES)), op("value", ParamKind::Float)];
const ANGLE: &[OperandSpec] = &[op("angle", ParamKind::Float)];
const TICKS: &[OperandSpec] = &[op("ticks", ParamKind::Int)];
const VARIABLE: &[OperandSpec] = &[op("variable", ParamKind::Int), op("value", ParamKind::Int)];
const ATTACH: &[OperandSpec] = &[
    op("attachType", ParamKind::Enum(ATTACH_TYPES)),
    op("boneId", ParamKind::Int),
    op("effect", ParamKind::Ref(Requirement::Optional)),
    op("collideWith", ParamKind::UInt),
];
const DETACH: &[OperandSpec] = &[op("attachType", ParamKind::Enum(ATTACH_TYPES))];
const ANIMATION_SCRIPT: &[OperandSpec] = &[
    op("track", ParamKind::Ref(Requirement::Optional)),
    op("mode", ParamKind::Enum(ANIMATION_MODES)),
    op("startTime", ParamKind::Int),
    op("transitionTime", ParamKind::Int),
];
const ANIMATION_SEQUENCE: &[OperandSpec] = &[
    op("track", ParamKind::Ref(Requirement::Optional)),
    op("startTime", ParamKind::Int),
    op("transitionTime", ParamKind::Int),
    op("mode", ParamKind::Enum(ANIMATION_MODES)),
];
const SEQUENCE: &[OperandSpec] = &[
    op("sequence", ParamKind::Hash),
    op("ignoreIfAlreadyActive", ParamKind::Bool),
    op("openBoneChannel", ParamKind::Bool),
];

/// Static description of one opcode.
#[derive(Debug)]
pub struct ActionInfo {
    pub id: ActionId,
    pub opcode: u32,
    pub name: &'static str,
    pub target: ActionTarget,
    pub operands: &'static [OperandSpec],
    /// Layout inside action sequences, when it differs from the script layout.
    pub sequence_operands: Option<&'static [OperandSpec]>,
}

impl ActionInfo {
    pub fn operands(&self, context: ActionContext) -> &'static [OperandSpec] {
        match (context, self.sequence_operands) {
            (ActionContext::Sequence, Some(ops)) => ops,
            _ => self.operands,
        }
    }
}

macro_rules! actions {
    ($( $opcode:literal $id:ident $target:ident $ops:expr $(, seq = $seq:expr)?; )*) => {
        /// Known command opcodes shared by script effects and action sequences.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum ActionId {
            $($id,)*
        }

        pub static ACTIONS: &[ActionInfo] = &[
            $(ActionInfo {
                id: ActionId::$id,
                opcode: $opcode,
                name: stringify!($id),
                target: ActionTarget::$target,
                operands: $ops,
                sequence_operands: actions!(@seq $($seq)?),
            },)*
        ];
    };
    (@seq) => { None };
    (@seq $seq:expr) => { Some($seq) };
}

actions! {
    0x00 DoNothing Any NONE;
    0x01 EndScript Any NONE;
    0x02 SetActive Any ACTIVE;
    0x03 SetEnable Any ACTIVE;
    0x04 TerminateEntity Any NONE;
    0x05 InitFlags Any FLAG_MASK;
    0x06 SetFlags Any FLAG_MASK;
    0x07 ClearFlags Any FLAG_MASK;
    0x08 SetState Any &[op("state", ParamKind::Int)];
    0x09 SetTarget Entity3D &[op("target", ParamKind::Ref(Requirement::Optional))];
    0x0A SetAnimationSpeed Actor &[op("speed", ParamKind::Float)];
    0x0B SetPositionOnAxis Entity3D AXIS_VALUE;
    0x0C SetPosition Entity3D VECTOR;
    0x0D AddPositionOnAxis Entity3D AXIS_VALUE;
    0x0E AddPosition Entity3D VECTOR;
    0x0F SetRotationOnAxis Entity3D AXIS_VALUE;
    0x10 SetRotation Entity3D VECTOR;
    0x11 AddRotationOnAxis Entity3D AXIS_VALUE;
    0x12 AddRotation Entity3D VECTOR;
    0x13 RotateRight Entity3D ANGLE;
    0x14 RotateLeft Entity3D ANGLE;
    0x15 MakeTargetLookAtMe Entity3D NONE;
    0x16 SetAnimation Actor ANIMATION_SCRIPT, seq = ANIMATION_SEQUENCE;
    0x17 SetSequence Actor SEQUENCE;
    0x18 Wait Any TICKS;
    0x19 WaitForAxisRotation Entity3D &[op("axis", ParamKind::Enum(AXES))];
    0x1A WaitForFullRotation Entity3D NONE;
    0x1B WaitForAnimation Actor NONE;
    0x1C Loop Any &[op("count", ParamKind::Int)];
    0x1D ApplyMotionImpulse Entity3D VECTOR;
    0x1E Damage Actor &[op("amount", ParamKind::Int), op("damageFlags", ParamKind::UInt)];
    0x1F Prompt Any &[op("prompt", ParamKind::Hash)];
    0x20 ShowDialog Any &[op("dialog", ParamKind::Hash)];
    0x21 SetAlarm Any &[op("alarm", ParamKind::Int), op("ticks", ParamKind::Int)];
    0x22 SetPlayerHasItem Any &[op("item", ParamKind::UInt), op("give", ParamKind::Bool)];
    0x23 TriggerIfPlayerHasItem Any &[op("item", ParamKind::UInt)];
    0x24 SpawnParticleEffect Entity3D &[op("effect", ParamKind::Ref(Requirement::Optional))];
    0x25 KillParticleEffect Entity3D NONE;
    0x26 Launcher Entity3D NONE;
    0x27 SetSavePoint Any &[op("savePoint", ParamKind::Int)];
    0x28 SetUpdatesEnabled Any ACTIVE;
    0x29 SetAiGoal Actor &[op("goal", ParamKind::Enum(AI_GOALS))];
    0x33 TriggerEvent Any &[op("event", ParamKind::Hash)];
    0x34 PlaySound Any &[op("sound", ParamKind::UInt)];
    0x35 SetVariable Any VARIABLE;
    0x36 AddToVariable Any VARIABLE;
    0x37 TriggerByNumber Any &[op("number", ParamKind::Int)];
    0x3D TakeDamage Actor &[op("damageFlags", ParamKind::UInt), op("amount", ParamKind::Int)];
    0x41 AttachSensor Prop ATTACH;
    0x42 DetachSensor Prop DETACH;
    0x43 Attach Actor ATTACH;
    0x44 Detach Actor DETACH;
    0x45 SetWorldActive Any ACTIVE;
}

impl ActionId {
    pub fn from_opcode(opcode: u32) -> Option<ActionId> {
        ACTIONS.iter().find(|info| info.opcode == opcode).map(|info| info.id)
    }

    pub fn info(self) -> &'static ActionInfo {
        // The table is generated alongside the enum, one row per variant, in order.
        &ACTIONS[self as usize]
    }

    pub fn opcode(self) -> u32 {
        self.info().opcode
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One decoded command: an opcode plus its four parameter slots.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Known {
        id: ActionId,
        args: Vec<Operand>,
        /// Non-zero slots past the declared operands, kept when arity checks are relaxed.
        #[serde(skip_serializing_if = "Vec::is_empty")]
        extra: Vec<Param>,
    },
    /// Opcode with no table entry. Parameters are carried through verbatim.
    Unhandled { opcode: u32, params: [Param; MAX_ARGUMENT_COUNT] },
}

impl Action {
    pub fn new(id: ActionId, args: Vec<Operand>) -> Self {
        Action::Known {
            id,
            args,
            extra: Vec::new(),
        }
    }

    pub fn id(&self) -> Option<ActionId> {
        match self {
            Action::Known { id, .. } => Some(*id),
            Action::Unhandled { .. } => None,
        }
    }

    pub fn opcode(&self) -> u32 {
        match self {
            Action::Known { id, .. } => id.opcode(),
            Action::Unhandled { opcode, .. } => *opcode,
        }
    }

    pub fn args(&self) -> &[Operand] {
        match self {
            Action::Known { args, .. } => args,
            Action::Unhandled { .. } => &[],
        }
    }

    pub fn name(&self) -> String {
        match self {
            Action::Known { id, .. } => id.name().to_string(),
            Action::Unhandled { opcode, .. } => format!("Unhandled({opcode:#04x})"),
        }
    }

    pub fn decode(
        opcode: u32,
        params: [Param; MAX_ARGUMENT_COUNT],
        context: ActionContext,
        strict: bool,
        owner: NameHash,
    ) -> Result<Self> {
        let Some(id) = ActionId::from_opcode(opcode) else {
            return Ok(Action::Unhandled { opcode, params });
        };
        let decoded = decode_operands(id.info().operands(context), &params, strict, || id.to_string(), owner)?;
        Ok(Action::Known {
            id,
            args: decoded.args,
            extra: decoded.extra,
        })
    }

    pub fn encode(&self, context: ActionContext, owner: NameHash) -> Result<(u32, [Param; MAX_ARGUMENT_COUNT])> {
        match self {
            Action::Known { id, args, extra } => {
                let specs = id.info().operands(context);
                let params = encode_operands(specs, args, extra, MAX_ARGUMENT_COUNT, || id.to_string(), owner)?;
                let mut block = [Param::ZERO; MAX_ARGUMENT_COUNT];
                block.copy_from_slice(&params);
                Ok((id.opcode(), block))
            }
            Action::Unhandled { opcode, params } => Ok((*opcode, *params)),
        }
    }

    /// Check operand count and types against the declaration for `context`.
    pub fn validate_argument_count(&self, context: ActionContext, owner: NameHash) -> Result<()> {
        match self {
            Action::Known { id, args, extra } => {
                validate_operands(id.info().operands(context), args, || id.to_string(), owner)?;
                if args.len() + extra.len() > MAX_ARGUMENT_COUNT {
                    return Err(crate::error::Error::ArityMismatch {
                        context: id.to_string(),
                        owner,
                        expected: args.len(),
                        found: args.len() + extra.len(),
                    });
                }
                Ok(())
            }
            Action::Unhandled { .. } => Ok(()),
        }
    }

    /// Read an opcode followed by four parameters.
    pub fn read(c: &mut Cursor<'_>, context: ActionContext, strict: bool, owner: NameHash) -> Result<Self> {
        let opcode = c.read_u32()?;
        let params = Param::read_block(c)?;
        Self::decode(opcode, params, context, strict, owner)
    }

    pub fn write(&self, w: &mut Writer, context: ActionContext, owner: NameHash) -> Result<()> {
        let (opcode, params) = self.encode(context, owner)?;
        w.write_u32(opcode);
        for p in params {
            p.write(w);
        }
        Ok(())
    }
}

impl References for Action {
    fn for_each_ref(&self, f: &mut dyn FnMut(&Ref)) {
        if let Action::Known { args, .. } = self {
            args.for_each_ref(f);
        }
    }

    fn for_each_ref_mut(&mut self, f: &mut dyn FnMut(&mut Ref)) {
        if let Action::Known { args, .. } = self {
            args.for_each_ref_mut(f);
        }
    }
}
