use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    Created,
    Updated,
    Deleted,
}

/// One entry of the repository change log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub object_id: String,
    pub change_type: ChangeType,
    /// Ordering position assigned by the change log.
    pub position: u64,
}

impl ChangeEvent {
    pub fn new(object_id: impl Into<String>, change_type: ChangeType, position: u64) -> Self {
        Self {
            object_id: object_id.into(),
            change_type,
            position,
        }
    }
}

/// A page of change events, oldest first, with the token marking its last event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEventPage {
    pub events: Vec<ChangeEvent>,
    pub latest_token: String,
}
