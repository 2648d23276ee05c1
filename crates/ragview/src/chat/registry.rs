use std::collections::BTreeMap;

use super::message::{Citation, TurnId};

/// Citations indexed by owning turn and ordinal.
///
/// Entries live as long as the session; nothing is ever evicted.
#[derive(Debug, Clone, Default)]
pub struct CitationRegistry {
    turns: BTreeMap<TurnId, Vec<Citation>>,
}

impl CitationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the citations of one assistant turn in service order.
    pub fn register(&mut self, turn_id: TurnId, citations: Vec<Citation>) {
        if let Some(previous) = self.turns.insert(turn_id, citations) {
            tracing::warn!(
                turn_id = turn_id.0,
                replaced = previous.len(),
                "citations re-registered for turn"
            );
        }
    }

    /// Looks up a citation by its 1-based ordinal.
    pub fn get(&self, turn_id: TurnId, ordinal: u32) -> Option<&Citation> {
        let index = usize::try_from(ordinal.checked_sub(1)?).ok()?;
        self.turns.get(&turn_id)?.get(index)
    }

    pub fn citations(&self, turn_id: TurnId) -> &[Citation] {
        self.turns.get(&turn_id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.turns.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
