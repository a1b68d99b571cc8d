use std::fmt;

use serde::{Serialize, Serializer};
use tracing::warn;

use crate::cursor::{Cursor, Writer};
use crate::error::{Error, Result};
use crate::hash::NameHash;
use crate::reference::{Ref, References, Requirement};

/// Number of parameter slots in every encoded command.
pub const MAX_ARGUMENT_COUNT: usize = 4;

/// One raw 4-byte command parameter. Its meaning depends on the command.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Param(pub [u8; 4]);

impl Param {
    pub const ZERO: Param = Param([0; 4]);

    pub fn from_i32(v: i32) -> Self {
        Param(v.to_le_bytes())
    }

    pub fn from_u32(v: u32) -> Self {
        Param(v.to_le_bytes())
    }

    pub fn from_f32(v: f32) -> Self {
        Param(v.to_bits().to_le_bytes())
    }

    pub fn from_bool(v: bool) -> Self {
        Param::from_u32(v as u32)
    }

    pub fn as_i32(self) -> i32 {
        i32::from_le_bytes(self.0)
    }

    pub fn as_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    pub fn as_f32(self) -> f32 {
        f32::from_bits(self.as_u32())
    }

    pub fn as_bool(self) -> bool {
        self.as_u32() != 0
    }

    pub fn is_zero(self) -> bool {
        self == Param::ZERO
    }

    pub fn read(c: &mut Cursor<'_>) -> Result<Self> {
        Ok(Param(c.read_u32()?.to_le_bytes()))
    }

    pub fn write(self, w: &mut Writer) {
        w.write_bytes(&self.0);
    }

    pub fn read_block(c: &mut Cursor<'_>) -> Result<[Param; MAX_ARGUMENT_COUNT]> {
        let mut params = [Param::ZERO; MAX_ARGUMENT_COUNT];
        for p in &mut params {
            *p = Param::read(c)?;
        }
        Ok(params)
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Param({:#010x})", self.as_u32())
    }
}

impl Serialize for Param {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.as_u32())
    }
}

/// How a parameter slot is interpreted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamKind {
    Int,
    UInt,
    Float,
    Bool,
    /// Index into a list of names.
    Enum(&'static [&'static str]),
    /// A name hash that is not a registry resource (sounds, events, named-hash keys).
    Hash,
    /// A resource hash resolved through the load phases.
    Ref(Requirement),
}

/// Declared operand of a command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperandSpec {
    pub name: &'static str,
    pub kind: ParamKind,
}

pub const fn op(name: &'static str, kind: ParamKind) -> OperandSpec {
    OperandSpec { name, kind }
}

/// A decoded operand.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Operand {
    Int(i32),
    UInt(u32),
    Float(f32),
    Bool(bool),
    Enum(u32),
    Hash(NameHash),
    Ref(Ref),
}

impl Operand {
    /// Decode one slot. Booleans other than 0/1 stay integers so re-encoding is exact.
    pub fn decode(spec: &OperandSpec, p: Param) -> Operand {
        match spec.kind {
            ParamKind::Int => Operand::Int(p.as_i32()),
            ParamKind::UInt => Operand::UInt(p.as_u32()),
            ParamKind::Float => Operand::Float(p.as_f32()),
            ParamKind::Bool => match p.as_u32() {
                0 => Operand::Bool(false),
                1 => Operand::Bool(true),
                _ => Operand::Int(p.as_i32()),
            },
            ParamKind::Enum(_) => Operand::Enum(p.as_u32()),
            ParamKind::Hash => Operand::Hash(NameHash(p.as_u32())),
            ParamKind::Ref(requirement) => Operand::Ref(Ref::new(NameHash(p.as_u32()), spec.name, requirement)),
        }
    }

    pub fn to_param(&self) -> Param {
        match self {
            Operand::Int(v) => Param::from_i32(*v),
            Operand::UInt(v) | Operand::Enum(v) => Param::from_u32(*v),
            Operand::Float(v) => Param::from_f32(*v),
            Operand::Bool(v) => Param::from_bool(*v),
            Operand::Hash(h) => Param::from_u32(h.0),
            Operand::Ref(r) => Param::from_u32(r.hash.0),
        }
    }

    /// Whether this operand can fill a slot of `kind`.
    pub fn fits(&self, kind: ParamKind) -> bool {
        matches!(
            (self, kind),
            (Operand::Int(_), ParamKind::Int)
                | (Operand::Int(_), ParamKind::Bool)
                | (Operand::UInt(_), ParamKind::UInt)
                | (Operand::Float(_), ParamKind::Float)
                | (Operand::Bool(_), ParamKind::Bool)
                | (Operand::Enum(_), ParamKind::Enum(_))
                | (Operand::Hash(_), ParamKind::Hash)
                | (Operand::Ref(_), ParamKind::Ref(_))
        )
    }

    pub fn as_i32(&self) -> i32 {
        self.to_param().as_i32()
    }

    pub fn as_bool(&self) -> bool {
        self.to_param().as_bool()
    }

    pub fn hash(&self) -> NameHash {
        NameHash(self.to_param().as_u32())
    }
}

impl References for Operand {
    fn for_each_ref(&self, f: &mut dyn FnMut(&Ref)) {
        if let Operand::Ref(r) = self {
            f(r);
        }
    }

    fn for_each_ref_mut(&mut self, f: &mut dyn FnMut(&mut Ref)) {
        if let Operand::Ref(r) = self {
            f(r);
        }
    }
}

/// Decoded operands plus any non-zero slots past the declared arity.
#[derive(Debug)]
pub(crate) struct DecodedOperands {
    pub args: Vec<Operand>,
    pub extra: Vec<Param>,
}

/// Split a parameter block into declared operands and trailing slots.
///
/// Non-zero slots past the declared operands are an arity error when
/// `strict`; otherwise they are kept verbatim up to the last non-zero one.
pub(crate) fn decode_operands(
    specs: &[OperandSpec],
    params: &[Param],
    strict: bool,
    context: impl FnOnce() -> String,
    owner: NameHash,
) -> Result<DecodedOperands> {
    if specs.len() > params.len() {
        return Err(Error::ArityMismatch {
            context: context(),
            owner,
            expected: specs.len(),
            found: params.len(),
        });
    }
    let args = specs.iter().zip(params).map(|(spec, &p)| Operand::decode(spec, p)).collect();
    let rest = &params[specs.len()..];
    let used = rest.iter().rposition(|p| !p.is_zero()).map_or(0, |i| i + 1);
    if used == 0 {
        return Ok(DecodedOperands { args, extra: Vec::new() });
    }

    let context = context();
    if strict {
        return Err(Error::ArityMismatch {
            context,
            owner,
            expected: specs.len(),
            found: specs.len() + used,
        });
    }
    warn!(%owner, "{context}: keeping {used} argument(s) beyond the declared {}", specs.len());
    Ok(DecodedOperands {
        args,
        extra: rest[..used].to_vec(),
    })
}

/// Check operands against their declaration and lay them out in `slots` parameters.
pub(crate) fn encode_operands(
    specs: &[OperandSpec],
    args: &[Operand],
    extra: &[Param],
    slots: usize,
    context: impl FnOnce() -> String,
    owner: NameHash,
) -> Result<Vec<Param>> {
    validate_operands(specs, args, context, owner)?;
    let mut params: Vec<Param> = args.iter().map(Operand::to_param).collect();
    params.extend_from_slice(extra);
    if params.len() > slots {
        return Err(Error::Parse {
            context: "operands",
            message: format!("{} parameters do not fit {} slots", params.len(), slots),
        });
    }
    params.resize(slots, Param::ZERO);
    Ok(params)
}

pub(crate) fn validate_operands(
    specs: &[OperandSpec],
    args: &[Operand],
    context: impl FnOnce() -> String,
    owner: NameHash,
) -> Result<()> {
    if specs.len() != args.len() {
        return Err(Error::ArityMismatch {
            context: context(),
            owner,
            expected: specs.len(),
            found: args.len(),
        });
    }
    if let Some((spec, arg)) = specs.iter().zip(args).find(|(spec, arg)| !arg.fits(spec.kind)) {
        return Err(Error::Parse {
            context: "operands",
            message: format!("{}: operand '{}' cannot hold {:?}", context(), spec.name, arg),
        });
    }
    Ok(())
}
