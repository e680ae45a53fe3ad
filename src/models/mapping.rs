// file: src/models/mapping.rs
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A link between one sink group (Canvas course) and one source group
/// (TimeEdit object). Keyed by `(sink_group, source_group)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct GroupMapping {
    pub sink_group: String,
    pub source_group: String,
    pub source_kind: String,
    pub delete_flag: bool,
}

impl GroupMapping {
    pub fn new(sink_group: &str, source_group: &str, source_kind: &str) -> Self {
        Self {
            sink_group: sink_group.to_string(),
            source_group: source_group.to_string(),
            source_kind: source_kind.to_string(),
            delete_flag: false,
        }
    }

    pub fn state(&self) -> MappingState {
        if self.delete_flag {
            MappingState::FlaggedForDeletion
        } else {
            MappingState::Active
        }
    }
}

/// Lifecycle of a mapping row. Removal happens only inside a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MappingState {
    Active,
    FlaggedForDeletion,
}

/// "We created sink event X from source record Y for group G."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DerivedEventLink {
    pub sink_event_id: String,
    pub source_record_id: String,
    pub sink_group: String,
}
