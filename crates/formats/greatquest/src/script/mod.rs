//! Cause → effect → action scripts.
//!
//! A [`ScriptList`] is decoded from the `scriptdata` raw chunk. Each
//! [`Script`] belongs to the entity whose `script_index` selects it and holds
//! functions: one [`Cause`] and the [`Effect`]s it runs. Effects and action
//! sequences share the [`Action`] opcode table.

pub mod action;
pub mod cause;
pub mod effect;
pub mod engine;
pub mod list;
pub mod param;

pub use action::{Action, ActionContext, ActionId};
pub use cause::{Cause, CauseType};
pub use effect::{CameraEffect, Effect, EffectCommand, EffectKind};
pub use engine::{EntityState, ExecutedEffect, ScriptContext, ScriptEngine, Trigger};
pub use list::{Script, ScriptFunction, ScriptList, SCRIPT_LIST_NAME};
pub use param::{Operand, OperandSpec, Param, ParamKind};
