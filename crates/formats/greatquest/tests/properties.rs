//! Property tests for the codec and resolution guarantees.

mod common;

use common::{entity, ContainerBuilder};
use greatquest::cursor::{Cursor, Writer};
use greatquest::hash::hash_bytes;
use greatquest::reader::NAME_SIZE;
use greatquest::script::action::{Action, ActionContext};
use greatquest::script::Param;
use greatquest::{Container, LoadConfig, NameHash, References, ResourceKind};
use proptest::prelude::*;

fn name_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_]{1,31}"
}

fn latin1_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(1u8..=255, 0..NAME_SIZE).prop_map(|bytes| bytes.into_iter().map(char::from).collect())
}

proptest! {
    /// Case never changes a hash.
    #[test]
    fn prop_hash_ignores_ascii_case(name in name_strategy()) {
        prop_assert_eq!(hash_bytes(name.to_ascii_uppercase().as_bytes()), hash_bytes(name.as_bytes()));
        prop_assert_eq!(NameHash::of(&name.to_ascii_lowercase()), NameHash::of(&name));
    }

    /// Any Latin-1 name shorter than the field survives, whatever the padding byte.
    #[test]
    fn prop_fixed_string_is_lossless(text in latin1_strategy(), padding in any::<u8>()) {
        let mut w = Writer::new();
        w.write_fixed_string(&text, NAME_SIZE, padding).unwrap();
        let bytes = w.into_bytes();
        prop_assert_eq!(bytes.len(), NAME_SIZE);
        prop_assert_eq!(Cursor::new(&bytes).read_fixed_string(NAME_SIZE).unwrap(), text);
    }

    /// A decoded name hashes the same as the bytes it was read from.
    #[test]
    fn prop_decoded_name_hashes_like_its_bytes(text in latin1_strategy()) {
        let mut w = Writer::new();
        w.write_fixed_string(&text, NAME_SIZE, 0).unwrap();
        let bytes = w.into_bytes();
        let stored = &bytes[..text.chars().count()];
        let decoded = Cursor::new(&bytes).read_fixed_string(NAME_SIZE).unwrap();
        prop_assert_eq!(NameHash::of(&decoded), NameHash(hash_bytes(stored)));
    }

    /// With arity checks relaxed, any command decodes and re-encodes to the same words.
    #[test]
    fn prop_actions_are_lossless(
        opcode in 0u32..0x50,
        words in prop::array::uniform4(any::<u32>()),
        sequence in any::<bool>(),
    ) {
        let context = if sequence { ActionContext::Sequence } else { ActionContext::Script };
        let params = words.map(Param::from_u32);
        let action = Action::decode(opcode, params, context, false, NameHash(1)).unwrap();
        prop_assert_eq!(action.encode(context, NameHash(1)).unwrap(), (opcode, params));
    }

    /// Loading then saving an unedited container reproduces it byte for byte.
    #[test]
    fn prop_raw_containers_round_trip(
        chunks in prop::collection::btree_map(name_strategy(), prop::collection::vec(any::<u8>(), 0..64), 1..8),
    ) {
        // Distinct names can still collide case-insensitively.
        let mut seen = std::collections::HashSet::new();
        let chunks: Vec<_> = chunks.into_iter().filter(|(n, _)| seen.insert(NameHash::of(n))).collect();
        let hashes: Vec<u32> = chunks.iter().map(|(n, _)| NameHash::of(n).0).collect();
        let bytes = chunks
            .iter()
            .fold(ContainerBuilder::new().toc("", &hashes), |b, (n, p)| b.chunk(ResourceKind::Raw, n, p))
            .build();

        let config = LoadConfig::from_skip_list(&["sort-warnings"]);
        let container = Container::load(&bytes, &config).unwrap();
        prop_assert_eq!(container.save().unwrap(), bytes);
    }

    /// Shuffling chunks within a file never changes what references resolve to.
    #[test]
    fn prop_resolution_ignores_physical_order(
        order in Just((0..6usize).collect::<Vec<_>>()).prop_shuffle(),
    ) {
        let descs = [0xD1u32, 0xD2, 0xD3];
        let entities = [(0xE1u32, 0xD1u32, 0xE2u32), (0xE2, 0xD2, 0xF0), (0xE3, 0xD3, 0xE1)];
        let mut chunks: Vec<(u32, ResourceKind, Vec<u8>)> = descs
            .iter()
            .map(|&d| (d, ResourceKind::ActorDesc, Vec::new()))
            .collect();
        chunks.extend(entities.iter().map(|&(e, d, t)| (e, ResourceKind::EntityInst, entity(d, -1, t))));

        let shuffled: Vec<_> = order.iter().map(|&i| chunks[i].clone()).collect();
        let build = |list: &[(u32, ResourceKind, Vec<u8>)]| {
            let hashes: Vec<u32> = list.iter().map(|c| c.0).collect();
            list.iter()
                .fold(ContainerBuilder::new().toc("", &hashes), |b, (_, kind, payload)| b.chunk(*kind, "", payload))
                .build()
        };
        let graph = |bytes: Vec<u8>| {
            let config = LoadConfig::from_skip_list(&["sort-warnings"]);
            let container = Container::load(&bytes, &config).unwrap();
            let mut edges = Vec::new();
            for chunk in container.chunks() {
                chunk.data.for_each_ref(&mut |r| edges.push((chunk.hash, r.field, r.hash, r.resolution)));
            }
            edges.sort_by_key(|e| (e.0, e.1));
            edges
        };
        prop_assert_eq!(graph(build(&chunks[..])), graph(build(&shuffled[..])));
    }
}
