use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::error::{Error, Result};
use crate::hash::NameHash;
use crate::reference::{Ref, References, Requirement};

use super::param::{decode_operands, op, validate_operands, Operand, OperandSpec, Param, ParamKind};

/// What makes a script function run. Values are bits so a script can
/// summarize all its cause types in one mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CauseType {
    Level,
    Player,
    Actor,
    Timer,
    Prompt,
    Event,
    Dialog,
    Number,
    Entity3D,
    WhenItem,
}

const CAUSE_TYPES: [CauseType; 10] = [
    CauseType::Level,
    CauseType::Player,
    CauseType::Actor,
    CauseType::Timer,
    CauseType::Prompt,
    CauseType::Event,
    CauseType::Dialog,
    CauseType::Number,
    CauseType::Entity3D,
    CauseType::WhenItem,
];

impl CauseType {
    pub fn value(self) -> u32 {
        1 << (self as u32)
    }

    pub fn from_value(value: u32) -> Option<Self> {
        CAUSE_TYPES.iter().copied().find(|t| t.value() == value)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        CAUSE_TYPES.iter().copied().find(|t| t.name().eq_ignore_ascii_case(name))
    }

    pub fn name(self) -> &'static str {
        match self {
            CauseType::Level => "Level",
            CauseType::Player => "Player",
            CauseType::Actor => "Actor",
            CauseType::Timer => "Timer",
            CauseType::Prompt => "Prompt",
            CauseType::Event => "Event",
            CauseType::Dialog => "Dialog",
            CauseType::Number => "Number",
            CauseType::Entity3D => "Entity3D",
            CauseType::WhenItem => "WhenItem",
        }
    }

    /// Operands stored after the sub-trigger.
    pub fn extras(self) -> &'static [OperandSpec] {
        const HASH: &[OperandSpec] = &[op("name", ParamKind::Hash)];
        const NUMBER: &[OperandSpec] = &[op("value", ParamKind::Int)];
        const ENTITY: &[OperandSpec] = &[op("entity", ParamKind::Ref(Requirement::Optional))];
        match self {
            CauseType::Prompt | CauseType::Dialog => HASH,
            CauseType::Number => NUMBER,
            CauseType::Entity3D => ENTITY,
            _ => &[],
        }
    }

    /// Whether the cause only fires for the entity owning the script.
    pub fn is_entity_scoped(self) -> bool {
        !matches!(self, CauseType::Level | CauseType::Event)
    }
}

impl fmt::Display for CauseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Comparison selected by the sub-trigger of a `Number` cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl Comparison {
    pub fn from_sub(sub: i32) -> Option<Self> {
        Some(match sub {
            0 => Comparison::Equal,
            1 => Comparison::NotEqual,
            2 => Comparison::Less,
            3 => Comparison::LessOrEqual,
            4 => Comparison::Greater,
            5 => Comparison::GreaterOrEqual,
            _ => return None,
        })
    }

    pub fn test(self, lhs: i32, rhs: i32) -> bool {
        match self {
            Comparison::Equal => lhs == rhs,
            Comparison::NotEqual => lhs != rhs,
            Comparison::Less => lhs < rhs,
            Comparison::LessOrEqual => lhs <= rhs,
            Comparison::Greater => lhs > rhs,
            Comparison::GreaterOrEqual => lhs >= rhs,
        }
    }
}

/// The trigger half of a script function.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Cause {
    Known {
        kind: CauseType,
        sub: i32,
        args: Vec<Operand>,
    },
    /// A cause type with no table entry; its values are kept verbatim.
    Unhandled { raw_type: u32, sub: i32, values: Vec<i32> },
}

impl Cause {
    pub fn new(kind: CauseType, sub: i32, args: Vec<Operand>) -> Self {
        Cause::Known { kind, sub, args }
    }

    /// Decode a cause from its stored type, sub-trigger, and trailing values.
    ///
    /// Cause records have no spare slots, so a value count that disagrees
    /// with the declaration is an arity error when `strict`; otherwise the
    /// cause is kept unhandled.
    pub fn decode(raw_type: u32, sub: i32, values: &[i32], strict: bool, owner: NameHash) -> Result<Self> {
        let Some(kind) = CauseType::from_value(raw_type) else {
            warn!(%owner, "unknown cause type {raw_type:#x}");
            return Ok(Cause::Unhandled {
                raw_type,
                sub,
                values: values.to_vec(),
            });
        };

        let specs = kind.extras();
        if values.len() != specs.len() {
            if strict {
                return Err(Error::ArityMismatch {
                    context: format!("{kind} cause"),
                    owner,
                    expected: specs.len(),
                    found: values.len(),
                });
            }
            warn!(%owner, "{kind} cause has {} values, expected {}; keeping it unhandled", values.len(), specs.len());
            return Ok(Cause::Unhandled {
                raw_type,
                sub,
                values: values.to_vec(),
            });
        }

        let params: Vec<Param> = values.iter().map(|&v| Param::from_i32(v)).collect();
        let decoded = decode_operands(specs, &params, strict, || format!("{kind} cause"), owner)?;
        Ok(Cause::Known {
            kind,
            sub,
            args: decoded.args,
        })
    }

    pub fn type_value(&self) -> u32 {
        match self {
            Cause::Known { kind, .. } => kind.value(),
            Cause::Unhandled { raw_type, .. } => *raw_type,
        }
    }

    pub fn kind(&self) -> Option<CauseType> {
        match self {
            Cause::Known { kind, .. } => Some(*kind),
            Cause::Unhandled { .. } => None,
        }
    }

    pub fn sub(&self) -> i32 {
        match self {
            Cause::Known { sub, .. } | Cause::Unhandled { sub, .. } => *sub,
        }
    }

    /// Values written after the sub-trigger.
    pub fn extra_values(&self, owner: NameHash) -> Result<Vec<i32>> {
        self.validate_argument_count(owner)?;
        Ok(match self {
            Cause::Known { args, .. } => args.iter().map(Operand::as_i32).collect(),
            Cause::Unhandled { values, .. } => values.clone(),
        })
    }

    pub fn validate_argument_count(&self, owner: NameHash) -> Result<()> {
        match self {
            Cause::Known { kind, args, .. } => validate_operands(kind.extras(), args, || format!("{kind} cause"), owner),
            Cause::Unhandled { .. } => Ok(()),
        }
    }
}

impl References for Cause {
    fn for_each_ref(&self, f: &mut dyn FnMut(&Ref)) {
        if let Cause::Known { args, .. } = self {
            args.for_each_ref(f);
        }
    }

    fn for_each_ref_mut(&mut self, f: &mut dyn FnMut(&mut Ref)) {
        if let Cause::Known { args, .. } = self {
            args.for_each_ref_mut(f);
        }
    }
}
