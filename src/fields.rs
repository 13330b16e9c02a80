use std::collections::HashMap;

use crate::model::custom_field::{CustomFieldDefinition, CustomFieldValue, FieldPayload};

/// Decode a card's raw custom field values into `{field name: display text}`.
///
/// Option references resolve against the defining field's option set; a
/// reference to an option that no longer exists is silently omitted, since
/// options may be deleted after a value was set. Text payloads pass through
/// verbatim. Fields absent on the card are simply not present in the result.
///
/// Option ids are board-local, so this must be re-run per (board definitions,
/// card values) pair; never reuse a resolution across boards.
pub fn resolve_fields(
    definitions: &[CustomFieldDefinition],
    values: &[CustomFieldValue],
) -> HashMap<String, String> {
    let mut resolved = HashMap::new();

    for value in values {
        let Some(def) = definitions.iter().find(|d| d.id == value.field_id) else {
            continue;
        };
        match &value.payload {
            FieldPayload::Text(text) => {
                resolved.insert(def.name.clone(), text.clone());
            }
            FieldPayload::OptionRef(option_id) => {
                if let Some(option) = def.options.iter().find(|o| &o.id == option_id) {
                    resolved.insert(def.name.clone(), option.text.clone());
                }
            }
        }
    }

    resolved
}
