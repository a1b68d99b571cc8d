use serde::Serialize;

use crate::cursor::{Cursor, Writer};
use crate::error::Result;
use crate::hash::NameHash;
use crate::reference::{Ref, References};
use crate::script::action::{Action, ActionContext};

/// Size of one encoded action: opcode plus four params.
pub const ACTION_SIZE: usize = 20;

/// A named list of actions an actor plays, e.g. `Hero[Walk]`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ActionSequence {
    pub actions: Vec<Action>,
}

impl ActionSequence {
    pub fn parse(c: &mut Cursor<'_>, strict: bool, owner: NameHash) -> Result<Self> {
        let mut actions = Vec::with_capacity(c.remaining() / ACTION_SIZE);
        while !c.is_empty() {
            actions.push(Action::read(c, ActionContext::Sequence, strict, owner)?);
        }
        Ok(Self { actions })
    }

    pub fn write(&self, w: &mut Writer, owner: NameHash) -> Result<()> {
        for action in &self.actions {
            action.write(w, ActionContext::Sequence, owner)?;
        }
        Ok(())
    }

    pub fn validate_argument_count(&self, owner: NameHash) -> Result<()> {
        self.actions
            .iter()
            .try_for_each(|a| a.validate_argument_count(ActionContext::Sequence, owner))
    }
}

/// The bracketed part of a sequence chunk name: `Hero[Walk]` → `Walk`.
pub fn sequence_name(chunk_name: &str) -> Option<&str> {
    let start = chunk_name.find('[')? + 1;
    let end = chunk_name.rfind(']')?;
    (start <= end).then(|| &chunk_name[start..end])
}

impl References for ActionSequence {
    fn for_each_ref(&self, f: &mut dyn FnMut(&Ref)) {
        self.actions.for_each_ref(f);
    }

    fn for_each_ref_mut(&mut self, f: &mut dyn FnMut(&mut Ref)) {
        self.actions.for_each_ref_mut(f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn bracketed_name() {
        assert_eq!(sequence_name("Hero[Walk]"), Some("Walk"));
        assert_eq!(sequence_name("Hero[]"), Some(""));
        assert_eq!(sequence_name("Hero"), None);
        assert_eq!(sequence_name("]Hero["), None);
    }

    #[test]
    fn partial_action_is_out_of_bounds() {
        let data = [0u8; ACTION_SIZE + 4];
        assert!(matches!(
            ActionSequence::parse(&mut Cursor::new(&data), true, NameHash(1)),
            Err(Error::OutOfBounds { .. })
        ));
    }
}
