//! Reactions on a message

use std::collections::BTreeSet;

use crate::value_objects::{ReactionKind, Snowflake};

/// One user's reaction of one kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reaction {
    pub user_id: Snowflake,
    pub kind: ReactionKind,
}

impl Reaction {
    pub fn new(user_id: Snowflake, kind: ReactionKind) -> Self {
        Self { user_id, kind }
    }
}

/// Set of reactions keyed by `(user, kind)`
///
/// A user may hold several kinds on the same message, but never the same kind twice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactionSet(BTreeSet<Reaction>);

impl ReactionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove the reaction if present, add it otherwise.
    ///
    /// Returns `true` if the reaction is now present.
    pub fn toggle(&mut self, user_id: Snowflake, kind: ReactionKind) -> bool {
        let reaction = Reaction::new(user_id, kind);
        if self.0.remove(&reaction) {
            false
        } else {
            self.0.insert(reaction);
            true
        }
    }

    pub fn contains(&self, user_id: Snowflake, kind: ReactionKind) -> bool {
        self.0.contains(&Reaction::new(user_id, kind))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reaction> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Ordered list form used at the storage and wire boundaries
    pub fn to_vec(&self) -> Vec<Reaction> {
        self.0.iter().copied().collect()
    }
}

impl FromIterator<Reaction> for ReactionSet {
    fn from_iter<I: IntoIterator<Item = Reaction>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
