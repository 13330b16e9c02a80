use serde::{Deserialize, Serialize};
use tracing::debug;

/// Inbound webhook payload from the remote board system:
/// `{action: {type, data: {card?, list?, member?, old?}}, model: {id, name}}`.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub action: WebhookAction,
    #[serde(default)]
    pub model: ModelRef,
}

#[derive(Debug, Deserialize)]
pub struct WebhookAction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: ActionData,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActionData {
    pub card: Option<CardRef>,
    pub list: Option<ListRef>,
    pub member: Option<MemberRef>,
    pub old: Option<OldValues>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ModelRef {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CardRef {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListRef {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MemberRef {
    pub id: Option<String>,
    #[serde(rename = "fullName")]
    pub full_name: Option<String>,
}

/// The previous field values carried on an update notification.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct OldValues {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,
    #[serde(rename = "idList", skip_serializing_if = "Option::is_none")]
    pub id_list: Option<String>,
}

/// A normalized change event forwarded to downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WebhookEvent {
    CardCreated {
        card_id: Option<String>,
        card_name: Option<String>,
        list_name: Option<String>,
        board_id: Option<String>,
        board_name: Option<String>,
    },
    CardUpdated {
        card_id: Option<String>,
        card_name: Option<String>,
        changes: OldValues,
        board_id: Option<String>,
        board_name: Option<String>,
    },
    CardMoved {
        card_id: Option<String>,
        card_name: Option<String>,
        new_list: Option<String>,
        board_id: Option<String>,
        board_name: Option<String>,
    },
    CardDeleted {
        card_id: Option<String>,
        card_name: Option<String>,
        board_id: Option<String>,
        board_name: Option<String>,
    },
    MemberAdded {
        card_id: Option<String>,
        card_name: Option<String>,
        member_id: Option<String>,
        member_name: Option<String>,
        board_id: Option<String>,
        board_name: Option<String>,
    },
    MemberRemoved {
        card_id: Option<String>,
        card_name: Option<String>,
        member_id: Option<String>,
        member_name: Option<String>,
        board_id: Option<String>,
        board_name: Option<String>,
    },
    Ignored {
        action_type: String,
    },
}

impl WebhookEvent {
    pub fn status(&self) -> &'static str {
        match self {
            WebhookEvent::Ignored { .. } => "ignored",
            _ => "success",
        }
    }

    /// Flat JSON form `{status, action, ...}` as sent downstream.
    pub fn to_json(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert("status".into(), serde_json::json!(self.status()));
        }
        value
    }
}

/// Normalize a raw webhook payload into a flat event. Unrecognized action
/// types produce `Ignored` rather than an error; the relay never fails on
/// input it does not understand.
pub fn normalize(payload: WebhookPayload) -> WebhookEvent {
    let WebhookAction { kind, data } = payload.action;
    let board_id = payload.model.id;
    let board_name = payload.model.name;
    let (card_id, card_name) = match data.card {
        Some(card) => (card.id, card.name),
        None => (None, None),
    };

    debug!(action = %kind, board = board_name.as_deref().unwrap_or("unknown"), "webhook received");

    match kind.as_str() {
        "createCard" => WebhookEvent::CardCreated {
            card_id,
            card_name,
            list_name: data.list.and_then(|l| l.name),
            board_id,
            board_name,
        },
        "updateCard" => WebhookEvent::CardUpdated {
            card_id,
            card_name,
            changes: data.old.unwrap_or_default(),
            board_id,
            board_name,
        },
        "moveCardFromBoard" => WebhookEvent::CardMoved {
            card_id,
            card_name,
            new_list: data.list.and_then(|l| l.name),
            board_id,
            board_name,
        },
        "deleteCard" => WebhookEvent::CardDeleted {
            card_id,
            card_name,
            board_id,
            board_name,
        },
        "addMemberToCard" => {
            let (member_id, member_name) = match data.member {
                Some(m) => (m.id, m.full_name),
                None => (None, None),
            };
            WebhookEvent::MemberAdded {
                card_id,
                card_name,
                member_id,
                member_name,
                board_id,
                board_name,
            }
        }
        "removeMemberFromCard" => {
            let (member_id, member_name) = match data.member {
                Some(m) => (m.id, m.full_name),
                None => (None, None),
            };
            WebhookEvent::MemberRemoved {
                card_id,
                card_name,
                member_id,
                member_name,
                board_id,
                board_name,
            }
        }
        _ => WebhookEvent::Ignored { action_type: kind },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> WebhookEvent {
        normalize(serde_json::from_str(raw).unwrap())
    }

    #[test]
    fn create_card_normalizes_to_flat_event() {
        let event = parse(
            r#"{
                "action": {
                    "type": "createCard",
                    "data": {
                        "card": {"id": "c1", "name": "Login flow"},
                        "list": {"name": "Todo"}
                    }
                },
                "model": {"id": "b1", "name": "design"}
            }"#,
        );

        assert_eq!(event.status(), "success");
        assert_eq!(
            event,
            WebhookEvent::CardCreated {
                card_id: Some("c1".into()),
                card_name: Some("Login flow".into()),
                list_name: Some("Todo".into()),
                board_id: Some("b1".into()),
                board_name: Some("design".into()),
            }
        );
    }

    #[test]
    fn update_card_carries_old_values_as_changes() {
        let event = parse(
            r#"{
                "action": {
                    "type": "updateCard",
                    "data": {
                        "card": {"id": "c1", "name": "Login flow v2"},
                        "old": {"name": "Login flow", "idList": "l1"}
                    }
                },
                "model": {"id": "b1", "name": "design"}
            }"#,
        );

        let WebhookEvent::CardUpdated { changes, .. } = &event else {
            panic!("expected CardUpdated, got {event:?}");
        };
        assert_eq!(changes.name.as_deref(), Some("Login flow"));
        assert_eq!(changes.id_list.as_deref(), Some("l1"));
        assert_eq!(changes.desc, None);
    }

    #[test]
    fn move_and_delete_and_member_actions_are_recognized() {
        let moved = parse(
            r#"{"action": {"type": "moveCardFromBoard", "data": {"card": {"id": "c1", "name": "x"}, "list": {"name": "Done"}}}, "model": {"id": "b1", "name": "design"}}"#,
        );
        assert!(matches!(moved, WebhookEvent::CardMoved { ref new_list, .. } if new_list.as_deref() == Some("Done")));

        let deleted = parse(
            r#"{"action": {"type": "deleteCard", "data": {"card": {"id": "c1", "name": "x"}}}, "model": {}}"#,
        );
        assert!(matches!(deleted, WebhookEvent::CardDeleted { .. }));

        let added = parse(
            r#"{"action": {"type": "addMemberToCard", "data": {"card": {"id": "c1", "name": "x"}, "member": {"id": "m1", "fullName": "Sam Doe"}}}, "model": {}}"#,
        );
        assert!(matches!(added, WebhookEvent::MemberAdded { ref member_name, .. } if member_name.as_deref() == Some("Sam Doe")));

        let removed = parse(
            r#"{"action": {"type": "removeMemberFromCard", "data": {"card": {"id": "c1", "name": "x"}, "member": {"id": "m1", "fullName": "Sam Doe"}}}, "model": {}}"#,
        );
        assert!(matches!(removed, WebhookEvent::MemberRemoved { .. }));
    }

    #[test]
    fn unrecognized_action_is_ignored_not_failed() {
        let event = parse(r#"{"action": {"type": "addChecklistToCard", "data": {}}, "model": {}}"#);

        assert_eq!(event.status(), "ignored");
        assert_eq!(
            event,
            WebhookEvent::Ignored {
                action_type: "addChecklistToCard".into()
            }
        );
        assert_eq!(
            event.to_json(),
            serde_json::json!({"status": "ignored", "action": "ignored", "action_type": "addChecklistToCard"})
        );
    }

    #[test]
    fn flat_json_form_includes_status_and_action() {
        let event = parse(
            r#"{"action": {"type": "createCard", "data": {"card": {"id": "c1", "name": "x"}}}, "model": {"id": "b1", "name": "design"}}"#,
        );
        let json = event.to_json();
        assert_eq!(json["status"], "success");
        assert_eq!(json["action"], "card_created");
        assert_eq!(json["card_id"], "c1");
    }
}
