use serde::Serialize;

use crate::hash::NameHash;

/// Whether a reference must resolve for its chunk to load.
///
/// Null hashes (0 and -1) mean "no reference" for both kinds and are never
/// looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    Required,
    Optional,
}

/// Where a reference ended up after the resolution phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Resolution {
    /// Decoded but not yet looked up.
    Pending,
    /// The hash is a null encoding.
    Null,
    /// Found in the same container.
    Local,
    /// Found in another container of the session, by load index.
    External { container: usize },
    /// Looked up everywhere and not found (optional references only).
    Missing,
}

/// A weak link to another resource: a hash plus where it resolved.
///
/// Nothing but the registry owns chunk memory, so following a `Ref` always
/// goes back through a registry lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ref {
    pub hash: NameHash,
    /// Field name, for diagnostics.
    pub field: &'static str,
    pub requirement: Requirement,
    pub resolution: Resolution,
}

impl Ref {
    pub fn new(hash: NameHash, field: &'static str, requirement: Requirement) -> Self {
        Self {
            hash,
            field,
            requirement,
            resolution: if hash.is_null() {
                Resolution::Null
            } else {
                Resolution::Pending
            },
        }
    }

    pub fn required(hash: NameHash, field: &'static str) -> Self {
        Self::new(hash, field, Requirement::Required)
    }

    pub fn optional(hash: NameHash, field: &'static str) -> Self {
        Self::new(hash, field, Requirement::Optional)
    }

    /// Point at a different resource; resolution starts over.
    pub fn set_hash(&mut self, hash: NameHash) {
        *self = Self::new(hash, self.field, self.requirement);
    }

    /// Forget a previous lookup so the next resolution pass retries it.
    pub fn reset(&mut self) {
        self.set_hash(self.hash);
    }

    pub fn is_null(&self) -> bool {
        self.hash.is_null()
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.resolution, Resolution::Local | Resolution::External { .. })
    }
}

/// Implemented by anything that carries resource references.
///
/// Both visitors must walk references in the same order.
pub trait References {
    fn for_each_ref(&self, f: &mut dyn FnMut(&Ref));
    fn for_each_ref_mut(&mut self, f: &mut dyn FnMut(&mut Ref));
}

impl<T: References> References for [T] {
    fn for_each_ref(&self, f: &mut dyn FnMut(&Ref)) {
        for item in self {
            item.for_each_ref(f);
        }
    }

    fn for_each_ref_mut(&mut self, f: &mut dyn FnMut(&mut Ref)) {
        for item in self {
            item.for_each_ref_mut(f);
        }
    }
}

impl<T: References> References for Vec<T> {
    fn for_each_ref(&self, f: &mut dyn FnMut(&Ref)) {
        self.as_slice().for_each_ref(f);
    }

    fn for_each_ref_mut(&mut self, f: &mut dyn FnMut(&mut Ref)) {
        self.as_mut_slice().for_each_ref_mut(f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_hash_starts_null() {
        assert_eq!(Ref::required(NameHash::ZERO, "x").resolution, Resolution::Null);
        assert_eq!(Ref::optional(NameHash::NONE, "x").resolution, Resolution::Null);
        assert_eq!(Ref::optional(NameHash(5), "x").resolution, Resolution::Pending);
    }

    #[test]
    fn set_hash_restarts_resolution() {
        let mut r = Ref::optional(NameHash(5), "target");
        r.resolution = Resolution::Local;
        assert!(r.is_resolved());
        r.set_hash(NameHash(6));
        assert_eq!(r.resolution, Resolution::Pending);
        assert_eq!(r.field, "target");
    }
}
