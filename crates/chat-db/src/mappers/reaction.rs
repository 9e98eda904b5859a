//! Reaction entity <-> model mapper

use chat_core::entities::{Reaction, ReactionSet};
use chat_core::value_objects::{ReactionKind, ReactionKindParseError, Snowflake};

use crate::models::ReactionModel;

impl TryFrom<ReactionModel> for Reaction {
    type Error = ReactionKindParseError;

    fn try_from(model: ReactionModel) -> Result<Self, Self::Error> {
        let kind: ReactionKind = model.kind.parse()?;
        Ok(Reaction::new(Snowflake::new(model.user_id), kind))
    }
}

/// Column arrays for a bulk `UNNEST` insert of a reaction set
pub struct ReactionColumns {
    pub user_ids: Vec<i64>,
    pub kinds: Vec<&'static str>,
}

impl ReactionColumns {
    pub fn new(reactions: &ReactionSet) -> Self {
        let (user_ids, kinds) = reactions
            .iter()
            .map(|r| (r.user_id.into_inner(), r.kind.as_str()))
            .unzip();
        Self { user_ids, kinds }
    }
}
