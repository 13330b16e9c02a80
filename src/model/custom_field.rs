use serde::{Deserialize, Serialize};

/// A board-scoped custom field: either free text or an enumerated option set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFieldDefinition {
    pub id: String,
    pub name: String,
    pub kind: CustomFieldKind,
    /// Ordered option set; empty for text fields.
    #[serde(default)]
    pub options: Vec<FieldOption>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomFieldKind {
    Text,
    List,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    pub id: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// A value set on one card for one custom field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFieldValue {
    pub field_id: String,
    pub payload: FieldPayload,
}

/// Either a raw text payload or a reference to one option on the defining
/// field's option set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldPayload {
    Text(String),
    OptionRef(String),
}

impl CustomFieldValue {
    pub fn text(field_id: impl Into<String>, text: impl Into<String>) -> Self {
        CustomFieldValue {
            field_id: field_id.into(),
            payload: FieldPayload::Text(text.into()),
        }
    }

    pub fn option(field_id: impl Into<String>, option_id: impl Into<String>) -> Self {
        CustomFieldValue {
            field_id: field_id.into(),
            payload: FieldPayload::OptionRef(option_id.into()),
        }
    }
}
