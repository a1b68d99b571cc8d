mod common;

use common::{effect, entity, script_list, CauseRecord, ContainerBuilder};
use greatquest::chunks::ChunkData;
use greatquest::script::{
    Action, ActionId, CauseType, EffectCommand, Operand, ScriptContext, ScriptEngine, Trigger,
};
use greatquest::{Container, Error, LoadConfig, NameHash, Resolution, ResourceKind, ScriptConfig};

const ENTITY_EFFECT: u32 = 1;
const EVENT: u32 = 0x77;

fn h(name: &str) -> u32 {
    NameHash::of(name).0
}

/// hero runs script 0: on Player sub 0 set flag 0x4 and raise event 0x77;
/// on event 0x77 set variable 1 = 42 on itself.
fn hero_scripts(extra_effects: &[Vec<u8>]) -> Vec<u8> {
    let mut effects = vec![
        effect(ENTITY_EFFECT, 0x06, 0, [0x4, 0, 0, 0]),
        effect(ENTITY_EFFECT, 0x33, 0, [EVENT, 0, 0, 0]),
        effect(ENTITY_EFFECT, 0x35, h("hero"), [1, 42, 0, 0]),
    ];
    effects.extend_from_slice(extra_effects);
    let causes = vec![
        CauseRecord {
            cause_type: CauseType::Player.value(),
            sub: 0,
            extras: vec![],
            first_effect: 0,
            effect_count: 2,
        },
        CauseRecord {
            cause_type: CauseType::Event.value(),
            sub: EVENT as i32,
            extras: vec![],
            first_effect: 2,
            effect_count: 1 + extra_effects.len(),
        },
    ];
    script_list(&[causes], &effects)
}

fn level(scripts: &[u8]) -> Vec<u8> {
    ContainerBuilder::new()
        .toc("", &[h("scriptdata"), h("hero_desc"), h("hero")])
        .chunk(ResourceKind::Raw, "scriptdata", scripts)
        .chunk(ResourceKind::ActorDesc, "hero_desc", &[])
        .chunk(ResourceKind::EntityInst, "hero", &entity(h("hero_desc"), 0, 0))
        .build()
}

#[test]
fn script_list_round_trips_and_knows_its_owner() {
    let bytes = level(&hero_scripts(&[]));
    let container = Container::load(&bytes, &LoadConfig::default()).expect("load");
    let (_, list) = container.script_list().expect("script list");
    assert_eq!(list.scripts.len(), 1);
    assert_eq!(list.scripts[0].owner, Some(NameHash::of("hero")));
    assert_eq!(list.scripts[0].functions.len(), 2);

    let explicit = &list.scripts[0].functions[1].effects[0].target;
    assert_eq!(explicit.resolution, Resolution::Local);
    assert_eq!(container.save().expect("save"), bytes);
}

#[test]
fn firing_a_trigger_runs_effects_and_cascades() {
    let container = Container::load(&level(&hero_scripts(&[])), &LoadConfig::default()).expect("load");
    let (owner, list) = container.script_list().expect("script list");
    let engine = ScriptEngine::new(list, owner, ScriptConfig::default());
    let mut ctx = ScriptContext::new();

    let hero = NameHash::of("hero");
    let ran = engine
        .fire(Trigger::new(CauseType::Player).on(hero), &mut ctx)
        .expect("fire");
    let commands: Vec<&str> = ran.iter().map(|e| e.command.as_str()).collect();
    assert_eq!(commands, ["SetFlags", "TriggerEvent", "SetVariable"]);
    assert_eq!(ran[2].depth, 1);

    let state = ctx.entity(hero).expect("hero state");
    assert_eq!(state.flags, 0x4);
    assert_eq!(state.variables.get(&1), Some(&42));
}

#[test]
fn trigger_for_another_entity_runs_nothing() {
    let container = Container::load(&level(&hero_scripts(&[])), &LoadConfig::default()).expect("load");
    let (owner, list) = container.script_list().expect("script list");
    let engine = ScriptEngine::new(list, owner, ScriptConfig::default());
    let ran = engine
        .fire(Trigger::new(CauseType::Player).on(NameHash(0x4242)), &mut ScriptContext::new())
        .expect("fire");
    assert!(ran.is_empty());
}

#[test]
fn extra_operand_fails_strict_load() {
    // SetVariable declares two operands; this one carries three.
    let bytes = level(&hero_scripts(&[effect(ENTITY_EFFECT, 0x35, 0, [1, 2, 3, 0])]));
    match Container::load(&bytes, &LoadConfig::default()) {
        Err(Error::ArityMismatch { expected, found, owner, .. }) => {
            assert_eq!((expected, found), (2, 3));
            assert_eq!(owner, NameHash::of("scriptdata"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn extra_operand_is_preserved_when_relaxed() {
    let bytes = level(&hero_scripts(&[effect(ENTITY_EFFECT, 0x35, 0, [1, 2, 3, 0])]));
    let config = LoadConfig::from_skip_list(&["strict-arity"]);
    let container = Container::load(&bytes, &config).expect("relaxed load");
    assert_eq!(container.save().expect("save"), bytes);
}

#[test]
fn edited_arity_fails_save() {
    let bytes = level(&hero_scripts(&[]));
    let mut container = Container::load(&bytes, &LoadConfig::default()).expect("load");
    let chunk = container.resolve_mut(NameHash::of("scriptdata")).expect("scriptdata");
    let ChunkData::ScriptList(list) = &mut chunk.data else {
        panic!("scriptdata is not a script list");
    };
    list.scripts[0].functions[0].effects[0].command = EffectCommand::Action {
        action: Action::new(
            ActionId::SetVariable,
            vec![Operand::Int(1), Operand::Int(2), Operand::Int(3)],
        ),
    };
    assert!(matches!(
        container.save(),
        Err(Error::ArityMismatch { expected: 2, found: 3, .. })
    ));
}

#[test]
fn unknown_opcode_survives_load_save_and_runs_as_unhandled() {
    let bytes = level(&hero_scripts(&[effect(ENTITY_EFFECT, 0x7E, 0, [5, 6, 7, 8])]));
    let container = Container::load(&bytes, &LoadConfig::default()).expect("load");
    assert_eq!(container.save().expect("save"), bytes);

    let (owner, list) = container.script_list().expect("script list");
    let engine = ScriptEngine::new(list, owner, ScriptConfig::default());
    let ran = engine
        .fire(Trigger::new(CauseType::Event).with_sub(EVENT as i32), &mut ScriptContext::new())
        .expect("fire");
    assert_eq!(ran.last().expect("ran").command, "Unhandled(0x7e)");
}

#[test]
fn unknown_cause_type_survives_load_save_and_never_fires() {
    let effects = vec![
        effect(ENTITY_EFFECT, 0x06, 0, [0x1, 0, 0, 0]),
        effect(ENTITY_EFFECT, 0x06, 0, [0x2, 0, 0, 0]),
    ];
    let causes = vec![
        CauseRecord {
            cause_type: 0x400,
            sub: 3,
            extras: vec![7, -1, 0x1234],
            first_effect: 0,
            effect_count: 1,
        },
        CauseRecord {
            cause_type: CauseType::Level.value(),
            sub: 0,
            extras: vec![],
            first_effect: 1,
            effect_count: 1,
        },
    ];
    let bytes = level(&script_list(&[causes], &effects));
    let container = Container::load(&bytes, &LoadConfig::default()).expect("load");
    assert_eq!(container.save().expect("save"), bytes);

    let (owner, list) = container.script_list().expect("script list");
    let unknown = &list.scripts[0].functions[0].cause;
    assert_eq!(unknown.kind(), None);
    assert_eq!(unknown.type_value(), 0x400);
    assert_eq!(unknown.sub(), 3);

    let engine = ScriptEngine::new(list, owner, ScriptConfig::default());
    let hero = NameHash::of("hero");
    let all = [
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
    for cause in all {
        for sub in [0, 3] {
            let trigger = Trigger::new(cause).on(hero).with_sub(sub).with_value(7);
            let ran = engine.fire(trigger, &mut ScriptContext::new()).expect("fire");
            assert!(ran.iter().all(|e| e.function != 0), "{cause:?} sub {sub} ran the unknown cause");
        }
    }
    let ran = engine
        .fire(Trigger::new(CauseType::Level), &mut ScriptContext::new())
        .expect("fire");
    assert_eq!(ran.len(), 1);
    assert_eq!(ran[0].function, 1);
}

#[test]
fn function_without_effects_survives_load_save() {
    let causes = vec![
        CauseRecord {
            cause_type: CauseType::Player.value(),
            sub: 0,
            extras: vec![],
            first_effect: 0,
            effect_count: 1,
        },
        CauseRecord {
            cause_type: CauseType::Level.value(),
            sub: 0,
            extras: vec![],
            first_effect: 1,
            effect_count: 0,
        },
    ];
    let effects = vec![effect(ENTITY_EFFECT, 0x06, 0, [0x4, 0, 0, 0])];
    let bytes = level(&script_list(&[causes], &effects));
    let container = Container::load(&bytes, &LoadConfig::default()).expect("load");
    let (_, list) = container.script_list().expect("script list");
    assert!(list.scripts[0].functions[1].effects.is_empty());
    assert_eq!(container.save().expect("save"), bytes);
}

#[test]
fn cause_type_mask_must_match() {
    let mut scripts = hero_scripts(&[]);
    // The entry mask follows the three header counts.
    scripts[12] = 0x01;
    assert!(matches!(
        Container::load(&level(&scripts), &LoadConfig::default()),
        Err(Error::Parse { context: "script list", .. })
    ));
}

#[test]
fn two_entities_claiming_one_script_conflict() {
    let bytes = ContainerBuilder::new()
        .toc("", &[h("scriptdata"), h("hero_desc"), h("hero"), h("twin")])
        .chunk(ResourceKind::Raw, "scriptdata", &hero_scripts(&[]))
        .chunk(ResourceKind::ActorDesc, "hero_desc", &[])
        .chunk(ResourceKind::EntityInst, "hero", &entity(h("hero_desc"), 0, 0))
        .chunk(ResourceKind::EntityInst, "twin", &entity(h("hero_desc"), 0, 0))
        .build();
    match Container::load(&bytes, &LoadConfig::default()) {
        Err(Error::ScriptOwnerConflict { index, first, second }) => {
            assert_eq!(index, 0);
            assert_eq!(first, NameHash::of("hero"));
            assert_eq!(second, NameHash::of("twin"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn action_sequence_uses_sequence_layout() {
    // SetAnimation in a sequence: track, startTime, transitionTime, mode.
    let mut payload = Vec::new();
    for word in [0x16u32, h("walk_track"), 10, 20, 1] {
        payload.extend_from_slice(&word.to_le_bytes());
    }
    let bytes = ContainerBuilder::new()
        .toc("", &[h("walk_track"), h("Hero[Walk]")])
        .chunk(ResourceKind::Track, "walk_track", &[])
        .chunk(ResourceKind::ActionSequence, "Hero[Walk]", &payload)
        .build();
    let container = Container::load(&bytes, &LoadConfig::default()).expect("load");
    let chunk = container.resolve(NameHash::of("Hero[Walk]")).expect("sequence");
    let ChunkData::ActionSequence(sequence) = &chunk.data else {
        panic!("not an action sequence");
    };
    let args = sequence.actions[0].args();
    assert_eq!(args[1], Operand::Int(10));
    assert_eq!(args[3], Operand::Enum(1));
    match &args[0] {
        Operand::Ref(track) => assert_eq!(track.resolution, Resolution::Local),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(greatquest::chunks::sequence_name(&chunk.name), Some("Walk"));
    assert_eq!(container.save().expect("save"), bytes);
}
