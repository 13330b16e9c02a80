use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use super::{BoardGateway, Result};
use crate::error::GatewayError;
use crate::model::board::{Board, BoardList, Card, CardPatch, Label};
use crate::model::custom_field::{
    CustomFieldDefinition, CustomFieldKind, CustomFieldValue, FieldOption, FieldPayload,
};

const BASE_URL: &str = "https://api.trello.com/1";

const CARD_FIELDS: &str = "id,name,desc,due,closed,idList,idBoard,shortUrl,labels,idMembers";

/// HTTP gateway against the Trello REST API, authenticated by a static
/// application key plus a per-user token passed as query parameters.
pub struct TrelloGateway {
    api_key: String,
    token: String,
    client: reqwest::Client,
    base_url: String,
}

impl TrelloGateway {
    pub fn new(api_key: String, token: String) -> Self {
        Self {
            api_key,
            token,
            client: reqwest::Client::new(),
            base_url: BASE_URL.to_string(),
        }
    }

    fn auth_params(&self) -> [(&str, &str); 2] {
        [("key", &self.api_key), ("token", &self.token)]
    }

    async fn execute(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let resp = builder.send().await.map_err(GatewayError::unavailable)?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(GatewayError::RemoteRejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, extra: &[(&str, &str)]) -> Result<T> {
        let builder = self
            .client
            .get(format!("{}/{path}", self.base_url))
            .query(&self.auth_params())
            .query(extra);
        let resp = self.execute(builder).await?;
        resp.json().await.map_err(GatewayError::unavailable)
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &serde_json::Value) -> Result<T> {
        let builder = self
            .client
            .post(format!("{}/{path}", self.base_url))
            .query(&self.auth_params())
            .json(body);
        let resp = self.execute(builder).await?;
        resp.json().await.map_err(GatewayError::unavailable)
    }

    async fn put(&self, path: &str, body: &serde_json::Value) -> Result<()> {
        let builder = self
            .client
            .put(format!("{}/{path}", self.base_url))
            .query(&self.auth_params())
            .json(body);
        self.execute(builder).await?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct TrelloBoard {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct TrelloList {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct TrelloLabel {
    id: String,
    name: String,
    color: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrelloCard {
    id: String,
    name: String,
    desc: Option<String>,
    due: Option<DateTime<Utc>>,
    #[serde(default)]
    closed: bool,
    id_list: Option<String>,
    id_board: Option<String>,
    short_url: Option<String>,
    labels: Option<Vec<TrelloLabel>>,
    #[serde(default)]
    id_members: Vec<String>,
    #[serde(default)]
    custom_field_items: Vec<TrelloFieldItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrelloCustomField {
    id: String,
    name: String,
    #[serde(rename = "type")]
    kind: String,
    options: Option<Vec<TrelloOption>>,
}

#[derive(Deserialize)]
struct TrelloOption {
    id: String,
    value: TrelloOptionValue,
    color: Option<String>,
}

#[derive(Deserialize)]
struct TrelloOptionValue {
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrelloFieldItem {
    id_custom_field: String,
    id_value: Option<String>,
    value: Option<serde_json::Value>,
}

impl From<TrelloLabel> for Label {
    fn from(label: TrelloLabel) -> Self {
        Label {
            id: label.id,
            name: label.name,
            color: label.color,
        }
    }
}

impl From<TrelloCard> for Card {
    fn from(card: TrelloCard) -> Self {
        Card {
            id: card.id,
            name: card.name,
            desc: card.desc.unwrap_or_default(),
            due: card.due,
            closed: card.closed,
            list_id: card.id_list.unwrap_or_default(),
            board_id: card.id_board.unwrap_or_default(),
            labels: card
                .labels
                .unwrap_or_default()
                .into_iter()
                .map(Label::from)
                .collect(),
            member_ids: card.id_members,
            field_values: card
                .custom_field_items
                .into_iter()
                .filter_map(field_value_from_item)
                .collect(),
            url: card.short_url.unwrap_or_default(),
        }
    }
}

impl From<TrelloCustomField> for CustomFieldDefinition {
    fn from(field: TrelloCustomField) -> Self {
        let kind = match field.kind.as_str() {
            "list" => CustomFieldKind::List,
            _ => CustomFieldKind::Text,
        };
        CustomFieldDefinition {
            id: field.id,
            name: field.name,
            kind,
            options: field
                .options
                .unwrap_or_default()
                .into_iter()
                .map(|opt| FieldOption {
                    id: opt.id,
                    text: opt.value.text,
                    color: opt.color,
                })
                .collect(),
        }
    }
}

/// Option-backed values arrive as `idValue`; everything else as a `value`
/// object keyed by type (`{"text": ...}`, `{"number": ...}`). Items with
/// neither are dropped.
fn field_value_from_item(item: TrelloFieldItem) -> Option<CustomFieldValue> {
    if let Some(option_id) = item.id_value {
        return Some(CustomFieldValue::option(item.id_custom_field, option_id));
    }
    let value = item.value?;
    let text = value
        .get("text")
        .and_then(|t| t.as_str())
        .map(str::to_string)
        .or_else(|| {
            value
                .as_object()?
                .values()
                .find_map(|v| v.as_str().map(str::to_string))
        })?;
    Some(CustomFieldValue::text(item.id_custom_field, text))
}

#[async_trait]
impl BoardGateway for TrelloGateway {
    async fn list_boards(&self) -> Result<Vec<Board>> {
        let boards: Vec<TrelloBoard> = self
            .get_json(
                "members/me/boards",
                &[("fields", "id,name"), ("filter", "open")],
            )
            .await?;
        Ok(boards
            .into_iter()
            .map(|b| Board {
                id: b.id,
                name: b.name,
            })
            .collect())
    }

    async fn get_board(&self, board_id: &str) -> Result<Board> {
        let board: TrelloBoard = self
            .get_json(&format!("boards/{board_id}"), &[("fields", "id,name")])
            .await?;
        Ok(Board {
            id: board.id,
            name: board.name,
        })
    }

    async fn list_lists(&self, board_id: &str) -> Result<Vec<BoardList>> {
        let lists: Vec<TrelloList> = self
            .get_json(&format!("boards/{board_id}/lists"), &[("fields", "id,name")])
            .await?;
        Ok(lists
            .into_iter()
            .map(|l| BoardList {
                id: l.id,
                name: l.name,
            })
            .collect())
    }

    async fn list_cards(&self, board_id: &str) -> Result<Vec<Card>> {
        let cards: Vec<TrelloCard> = self
            .get_json(
                &format!("boards/{board_id}/cards"),
                &[("fields", CARD_FIELDS), ("customFieldItems", "true")],
            )
            .await?;
        Ok(cards.into_iter().map(Card::from).collect())
    }

    async fn list_labels(&self, board_id: &str) -> Result<Vec<Label>> {
        let labels: Vec<TrelloLabel> = self
            .get_json(&format!("boards/{board_id}/labels"), &[])
            .await?;
        Ok(labels.into_iter().map(Label::from).collect())
    }

    async fn list_custom_fields(&self, board_id: &str) -> Result<Vec<CustomFieldDefinition>> {
        let fields: Vec<TrelloCustomField> = self
            .get_json(&format!("boards/{board_id}/customFields"), &[])
            .await?;
        Ok(fields.into_iter().map(CustomFieldDefinition::from).collect())
    }

    async fn list_custom_field_values(&self, card_id: &str) -> Result<Vec<CustomFieldValue>> {
        let items: Vec<TrelloFieldItem> = self
            .get_json(&format!("cards/{card_id}/customFieldItems"), &[])
            .await?;
        Ok(items.into_iter().filter_map(field_value_from_item).collect())
    }

    async fn create_card(
        &self,
        list_id: &str,
        name: &str,
        desc: &str,
        due: Option<DateTime<Utc>>,
    ) -> Result<Card> {
        let mut body = json!({
            "name": name,
            "desc": desc,
            "idList": list_id,
            "pos": "bottom",
        });
        if let Some(due) = due {
            body["due"] = json!(due.to_rfc3339());
        }
        let card: TrelloCard = self.post_json("cards", &body).await?;
        Ok(Card::from(card))
    }

    async fn update_card(&self, card_id: &str, patch: &CardPatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let body = serde_json::to_value(patch).map_err(GatewayError::unavailable)?;
        self.put(&format!("cards/{card_id}"), &body).await
    }

    async fn move_card(
        &self,
        card_id: &str,
        target_list_id: &str,
        target_board_id: Option<&str>,
    ) -> Result<()> {
        let mut body = json!({ "idList": target_list_id });
        if let Some(board_id) = target_board_id {
            body["idBoard"] = json!(board_id);
        }
        self.put(&format!("cards/{card_id}"), &body).await
    }

    async fn create_label(&self, board_id: &str, name: &str, color: &str) -> Result<Label> {
        let body = json!({
            "name": name,
            "color": color,
            "idBoard": board_id,
        });
        let label: TrelloLabel = self.post_json("labels", &body).await?;
        Ok(Label::from(label))
    }

    async fn attach_label(&self, card_id: &str, label_id: &str) -> Result<()> {
        let body = json!({ "value": label_id });
        let _: serde_json::Value = self
            .post_json(&format!("cards/{card_id}/idLabels"), &body)
            .await?;
        Ok(())
    }

    async fn set_custom_field_value(
        &self,
        card_id: &str,
        field_id: &str,
        value: &FieldPayload,
    ) -> Result<()> {
        let body = match value {
            FieldPayload::Text(text) => json!({ "value": { "text": text } }),
            FieldPayload::OptionRef(option_id) => json!({ "idValue": option_id }),
        };
        self.put(&format!("cards/{card_id}/customField/{field_id}/item"), &body)
            .await
    }
}
