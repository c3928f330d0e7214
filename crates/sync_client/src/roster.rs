//! Entity roster driven by explicit `active` flags.

use std::collections::BTreeSet;

use contracts::RosterChange;

/// Set of entity ids known to be active
///
/// Membership changes only on explicit flags; entries are never aged out.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    members: BTreeSet<String>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an explicit `active` flag
    ///
    /// Returns `true` when membership changed: a join for an unknown id
    /// flagged active, or a despawn for a known id flagged inactive.
    pub fn apply(&mut self, entity_id: &str, active: bool) -> bool {
        if active {
            if self.members.contains(entity_id) {
                return false;
            }
            self.members.insert(entity_id.to_owned())
        } else {
            self.members.remove(entity_id)
        }
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.members.contains(entity_id)
    }

    /// Member ids in ascending order
    pub fn ids(&self) -> Vec<String> {
        self.members.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Accumulates membership changes across one snapshot
#[derive(Debug, Default)]
pub(crate) struct RosterDelta {
    joined: Vec<String>,
    left: Vec<String>,
}

impl RosterDelta {
    /// Apply a flag to `roster`, remembering the net change
    ///
    /// A join and a despawn of the same id within one delta cancel out.
    pub(crate) fn apply(&mut self, roster: &mut Roster, entity_id: &str, active: bool) {
        if !roster.apply(entity_id, active) {
            return;
        }
        let (added, cancelled) = if active {
            (&mut self.joined, &mut self.left)
        } else {
            (&mut self.left, &mut self.joined)
        };
        match cancelled.iter().position(|id| id == entity_id) {
            Some(index) => {
                cancelled.remove(index);
            }
            None => added.push(entity_id.to_owned()),
        }
    }

    pub(crate) fn finish(self, roster: &Roster) -> Option<RosterChange> {
        let change = RosterChange {
            joined: self.joined,
            left: self.left,
            entity_ids: roster.ids(),
        };
        (!change.is_empty()).then_some(change)
    }
}
