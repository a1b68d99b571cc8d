use std::collections::{HashMap, VecDeque};

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::config::ScriptConfig;
use crate::error::Result;
use crate::hash::NameHash;

use super::action::{Action, ActionId};
use super::cause::{Cause, CauseType, Comparison};
use super::effect::{Effect, EffectCommand};
use super::list::{Script, ScriptList};

/// An occurrence that may satisfy script causes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trigger {
    pub cause: CauseType,
    /// Entity the trigger happened to. `None` matches every owner.
    pub subject: Option<NameHash>,
    /// Compared with the cause's sub-trigger (ignored for `Number`).
    pub sub: i32,
    /// The number for `Number` causes, or the hash for causes that carry one.
    pub value: i32,
}

impl Trigger {
    pub fn new(cause: CauseType) -> Self {
        Self {
            cause,
            subject: None,
            sub: 0,
            value: 0,
        }
    }

    pub fn on(mut self, subject: NameHash) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn with_sub(mut self, sub: i32) -> Self {
        self.sub = sub;
        self
    }

    pub fn with_value(mut self, value: i32) -> Self {
        self.value = value;
        self
    }

    /// Whether a function with `cause`, owned by `owner`, runs for this trigger.
    pub fn matches(&self, cause: &Cause, owner: Option<NameHash>) -> bool {
        let Cause::Known { kind, sub, args } = cause else {
            return false;
        };
        if *kind != self.cause {
            return false;
        }
        if kind.is_entity_scoped() {
            if let Some(subject) = self.subject {
                if owner != Some(subject) {
                    return false;
                }
            }
        }
        match kind {
            CauseType::Number => {
                let stored = args.first().map_or(0, |a| a.as_i32());
                Comparison::from_sub(*sub).is_some_and(|cmp| cmp.test(self.value, stored))
            }
            CauseType::Prompt | CauseType::Dialog | CauseType::Entity3D => {
                *sub == self.sub && args.first().is_some_and(|a| a.as_i32() == self.value)
            }
            _ => *sub == self.sub,
        }
    }
}

/// Runtime state of one entity as seen by scripts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityState {
    pub active: bool,
    pub enabled: bool,
    pub terminated: bool,
    pub updates_enabled: bool,
    pub flags: u32,
    pub state: i32,
    pub variables: HashMap<i32, i32>,
}

impl Default for EntityState {
    fn default() -> Self {
        Self {
            active: true,
            enabled: true,
            terminated: false,
            updates_enabled: true,
            flags: 0,
            state: 0,
            variables: HashMap::new(),
        }
    }
}

/// Mutable world state that script effects act on.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptContext {
    entities: HashMap<NameHash, EntityState>,
    pub world_active: bool,
}

impl ScriptContext {
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
            world_active: true,
        }
    }

    pub fn entities(&self) -> impl Iterator<Item = (&NameHash, &EntityState)> {
        self.entities.iter()
    }

    pub fn entity(&self, hash: NameHash) -> Option<&EntityState> {
        self.entities.get(&hash)
    }

    pub fn entity_mut(&mut self, hash: NameHash) -> &mut EntityState {
        self.entities.entry(hash).or_default()
    }

    pub fn is_terminated(&self, hash: NameHash) -> bool {
        self.entities.get(&hash).is_some_and(|e| e.terminated)
    }
}

impl Default for ScriptContext {
    fn default() -> Self {
        Self::new()
    }
}

/// One effect that ran, for callers that trace script behaviour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutedEffect {
    pub script: usize,
    pub function: usize,
    pub effect: usize,
    /// Entity the effect acted on: its own target, else the script owner.
    pub target: Option<NameHash>,
    pub command: String,
    /// Depth of the trigger in the cascade; 0 for the fired trigger.
    pub depth: usize,
}

/// Runs script functions whose causes match a trigger.
pub struct ScriptEngine<'a> {
    scripts: &'a ScriptList,
    config: ScriptConfig,
    owner: NameHash,
}

impl<'a> ScriptEngine<'a> {
    /// `owner` is the hash of the chunk holding the scripts, for error context.
    pub fn new(scripts: &'a ScriptList, owner: NameHash, config: ScriptConfig) -> Self {
        Self { scripts, config, owner }
    }

    /// Execute every matching function in script then declaration order.
    ///
    /// Triggers raised by effects are handled after the current one, up to
    /// `max_cascade` of them.
    pub fn fire(&self, trigger: Trigger, ctx: &mut ScriptContext) -> Result<Vec<ExecutedEffect>> {
        let mut queue = VecDeque::from([(trigger, 0usize)]);
        let mut raised = 0usize;
        let mut executed = Vec::new();

        while let Some((trigger, depth)) = queue.pop_front() {
            trace!(?trigger, depth, "firing trigger");
            for (script_index, script) in self.scripts.scripts.iter().enumerate() {
                if script.owner.is_some_and(|owner| ctx.is_terminated(owner)) {
                    continue;
                }
                for (function_index, function) in script.functions.iter().enumerate() {
                    if !trigger.matches(&function.cause, script.owner) {
                        continue;
                    }
                    for (effect_index, effect) in function.effects.iter().enumerate() {
                        effect.validate_argument_count(self.owner)?;
                        let target = effect_target(effect, script);
                        executed.push(ExecutedEffect {
                            script: script_index,
                            function: function_index,
                            effect: effect_index,
                            target,
                            command: effect.command.name(),
                            depth,
                        });
                        match apply(effect, target, ctx) {
                            Outcome::Continue => {}
                            Outcome::EndScript => break,
                            Outcome::Raise(next) => {
                                if raised >= self.config.max_cascade {
                                    warn!(?next, "cascade limit {} reached; dropping trigger", self.config.max_cascade);
                                } else {
                                    raised += 1;
                                    queue.push_back((next, depth + 1));
                                }
                            }
                        }
                    }
                }
            }
        }

        debug!(effects = executed.len(), raised, "trigger handled");
        Ok(executed)
    }
}

fn effect_target(effect: &Effect, script: &Script) -> Option<NameHash> {
    if effect.target.is_null() {
        script.owner
    } else {
        Some(effect.target.hash)
    }
}

enum Outcome {
    Continue,
    EndScript,
    Raise(Trigger),
}

fn apply(effect: &Effect, target: Option<NameHash>, ctx: &mut ScriptContext) -> Outcome {
    let EffectCommand::Action {
        action: Action::Known { id, args, .. },
    } = &effect.command
    else {
        return Outcome::Continue;
    };
    let arg = |i: usize| args.get(i).map_or(0, |a| a.as_i32());

    match id {
        ActionId::EndScript => return Outcome::EndScript,
        ActionId::TriggerEvent => {
            return Outcome::Raise(Trigger::new(CauseType::Event).with_sub(arg(0)));
        }
        ActionId::TriggerByNumber => {
            let mut next = Trigger::new(CauseType::Number).with_value(arg(0));
            next.subject = target;
            return Outcome::Raise(next);
        }
        ActionId::SetWorldActive => {
            ctx.world_active = arg(0) != 0;
            return Outcome::Continue;
        }
        _ => {}
    }

    let Some(target) = target else {
        return Outcome::Continue;
    };
    let entity = ctx.entity_mut(target);
    match id {
        ActionId::SetActive => entity.active = arg(0) != 0,
        ActionId::SetEnable => entity.enabled = arg(0) != 0,
        ActionId::TerminateEntity => entity.terminated = true,
        ActionId::InitFlags => entity.flags = arg(0) as u32,
        ActionId::SetFlags => entity.flags |= arg(0) as u32,
        ActionId::ClearFlags => entity.flags &= !(arg(0) as u32),
        ActionId::SetState => entity.state = arg(0),
        ActionId::SetUpdatesEnabled => entity.updates_enabled = arg(0) != 0,
        ActionId::SetVariable => {
            entity.variables.insert(arg(0), arg(1));
        }
        ActionId::AddToVariable => {
            *entity.variables.entry(arg(0)).or_insert(0) += arg(1);
        }
        _ => {}
    }
    Outcome::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::list::ScriptFunction;
    use crate::script::param::Operand;

    const HERO: NameHash = NameHash(0x100);

    fn act(id: ActionId, args: Vec<Operand>) -> Effect {
        Effect::action(NameHash::ZERO, Action::new(id, args))
    }

    fn list(functions: Vec<ScriptFunction>) -> ScriptList {
        ScriptList {
            scripts: vec![Script {
                owner: Some(HERO),
                functions,
            }],
            trailing: Vec::new(),
        }
    }

    #[test]
    fn player_cause_sets_flags_on_owner() {
        let scripts = list(vec![ScriptFunction {
            cause: Cause::new(CauseType::Player, 2, vec![]),
            effects: vec![
                act(ActionId::InitFlags, vec![Operand::UInt(0x1)]),
                act(ActionId::SetFlags, vec![Operand::UInt(0x4)]),
                act(ActionId::ClearFlags, vec![Operand::UInt(0x1)]),
            ],
        }]);
        let engine = ScriptEngine::new(&scripts, NameHash(1), ScriptConfig::default());
        let mut ctx = ScriptContext::new();

        let ran = engine
            .fire(Trigger::new(CauseType::Player).on(HERO).with_sub(2), &mut ctx)
            .unwrap();
        assert_eq!(ran.len(), 3);
        assert_eq!(ran[0].target, Some(HERO));
        assert_eq!(ctx.entity(HERO).unwrap().flags, 0x4);

        let other = engine
            .fire(Trigger::new(CauseType::Player).on(NameHash(0x200)).with_sub(2), &mut ctx)
            .unwrap();
        assert!(other.is_empty());
    }

    #[test]
    fn end_script_stops_function() {
        let scripts = list(vec![ScriptFunction {
            cause: Cause::new(CauseType::Level, 0, vec![]),
            effects: vec![
                act(ActionId::SetVariable, vec![Operand::Int(1), Operand::Int(5)]),
                act(ActionId::EndScript, vec![]),
                act(ActionId::SetVariable, vec![Operand::Int(1), Operand::Int(9)]),
            ],
        }]);
        let engine = ScriptEngine::new(&scripts, NameHash(1), ScriptConfig::default());
        let mut ctx = ScriptContext::new();
        let ran = engine.fire(Trigger::new(CauseType::Level), &mut ctx).unwrap();
        assert_eq!(ran.len(), 2);
        assert_eq!(ctx.entity(HERO).unwrap().variables[&1], 5);
    }

    #[test]
    fn event_cascade_is_bounded() {
        // An event that re-raises itself.
        let scripts = list(vec![ScriptFunction {
            cause: Cause::new(CauseType::Event, 0x77, vec![]),
            effects: vec![act(ActionId::TriggerEvent, vec![Operand::Hash(NameHash(0x77))])],
        }]);
        let engine = ScriptEngine::new(&scripts, NameHash(1), ScriptConfig { max_cascade: 3 });
        let mut ctx = ScriptContext::new();
        let ran = engine
            .fire(Trigger::new(CauseType::Event).with_sub(0x77), &mut ctx)
            .unwrap();
        assert_eq!(ran.len(), 4);
        assert_eq!(ran.last().unwrap().depth, 3);
    }

    #[test]
    fn number_cause_uses_sub_as_operator() {
        let scripts = list(vec![ScriptFunction {
            // value >= 10
            cause: Cause::new(CauseType::Number, 5, vec![Operand::Int(10)]),
            effects: vec![act(ActionId::TerminateEntity, vec![])],
        }]);
        let engine = ScriptEngine::new(&scripts, NameHash(1), ScriptConfig::default());
        let mut ctx = ScriptContext::new();
        assert!(engine
            .fire(Trigger::new(CauseType::Number).with_value(9), &mut ctx)
            .unwrap()
            .is_empty());
        assert_eq!(
            engine
                .fire(Trigger::new(CauseType::Number).with_value(12), &mut ctx)
                .unwrap()
                .len(),
            1
        );
        assert!(ctx.is_terminated(HERO));
    }

    #[test]
    fn invalid_arity_fails_before_running() {
        let scripts = list(vec![ScriptFunction {
            cause: Cause::new(CauseType::Level, 0, vec![]),
            effects: vec![act(ActionId::SetVariable, vec![Operand::Int(1)])],
        }]);
        let engine = ScriptEngine::new(&scripts, NameHash(1), ScriptConfig::default());
        assert!(engine.fire(Trigger::new(CauseType::Level), &mut ScriptContext::new()).is_err());
    }
}
