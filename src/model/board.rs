use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::custom_field::{CustomFieldDefinition, CustomFieldValue};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardList {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<DateTime<Utc>>,
    pub closed: bool,
    pub list_id: String,
    pub board_id: String,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub member_ids: Vec<String>,
    /// Custom field values as fetched alongside the card. Option ids inside
    /// are board-local; resolve them against the owning board's definitions.
    #[serde(default)]
    pub field_values: Vec<CustomFieldValue>,
    pub url: String,
}

/// Explicit partial update for a card. Only the fields eligible for update
/// are enumerated; `None` leaves the remote value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_list: Option<String>,
}

impl CardPatch {
    pub fn description(desc: impl Into<String>) -> Self {
        CardPatch {
            desc: Some(desc.into()),
            ..CardPatch::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.desc.is_none() && self.due.is_none() && self.id_list.is_none()
    }
}

/// A point-in-time fetch of one board, served unchanged until the freshness
/// window elapses. Replaced wholesale on refresh, never partially mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardSnapshot {
    pub board: Board,
    pub lists: Vec<BoardList>,
    pub cards: Vec<Card>,
    pub custom_fields: Vec<CustomFieldDefinition>,
    pub captured_at: DateTime<Utc>,
}
