#![allow(dead_code)]

use greatquest::cursor::Writer;
use greatquest::reader::write_chunk;
use greatquest::ResourceKind;

/// Assembles container bytes chunk by chunk, with explicit TOC hashes.
pub struct ContainerBuilder {
    w: Writer,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self { w: Writer::new() }
    }

    pub fn toc(mut self, name: &str, hashes: &[u32]) -> Self {
        write_chunk(&mut self.w, ResourceKind::Toc, name, 0, |w| {
            w.write_u32_slice(hashes);
            Ok(())
        })
        .expect("toc chunk");
        self
    }

    pub fn chunk(mut self, kind: ResourceKind, name: &str, payload: &[u8]) -> Self {
        write_chunk(&mut self.w, kind, name, 0, |w| {
            w.write_bytes(payload);
            Ok(())
        })
        .expect("chunk");
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.w.into_bytes()
    }
}

/// A 28-byte entity instance payload.
pub fn entity(description: u32, script_index: i32, target: u32) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_u32(28);
    w.write_u32(description);
    w.write_i32(0);
    w.write_u32(0);
    w.write_i32(script_index);
    w.write_u32(target);
    w.write_u32(0);
    w.into_bytes()
}

/// One effect record of the script list layout.
pub fn effect(kind: u32, command: u32, target: u32, params: [u32; 4]) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_u32(0x20);
    w.write_u32(kind);
    w.write_u32(command);
    w.write_u32(target);
    w.write_u32_slice(&params);
    w.into_bytes()
}

/// A cause record: type, sub-trigger, extras, pointing at effects by index.
pub struct CauseRecord {
    pub cause_type: u32,
    pub sub: i32,
    pub extras: Vec<i32>,
    pub first_effect: usize,
    pub effect_count: usize,
}

/// A script list with one script per entry of `scripts`. Every effect record
/// is 0x20 bytes, so effect indices map directly to offsets.
pub fn script_list(scripts: &[Vec<CauseRecord>], effects: &[Vec<u8>]) -> Vec<u8> {
    let mut values: Vec<i32> = Vec::new();
    let mut entries = Vec::new();
    for causes in scripts {
        let start = values.len();
        let mut mask = 0;
        let mut effect_total = 0;
        for cause in causes {
            values.push(((5 + cause.extras.len()) * 4) as i32);
            values.push(cause.cause_type as i32);
            values.push((cause.first_effect * 0x20 / 4) as i32);
            values.push(cause.effect_count as i32);
            values.push(cause.sub);
            values.extend(&cause.extras);
            mask |= cause.cause_type;
            effect_total += cause.effect_count;
        }
        entries.push([mask, start as u32, causes.len() as u32, effect_total as u32]);
    }

    let mut w = Writer::new();
    w.write_u32(entries.len() as u32);
    w.write_u32(values.len() as u32);
    w.write_u32(effects.len() as u32);
    for entry in &entries {
        w.write_u32_slice(entry);
    }
    for v in values {
        w.write_i32(v);
    }
    for e in effects {
        w.write_bytes(e);
    }
    w.into_bytes()
}
