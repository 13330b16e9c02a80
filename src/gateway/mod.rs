pub mod trello;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::GatewayError;
use crate::model::board::{Board, BoardList, Card, CardPatch, Label};
use crate::model::custom_field::{CustomFieldDefinition, CustomFieldValue, FieldPayload};

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Minimal client abstraction over the remote board system. Owns transport
/// and error mapping only; no synchronization logic lives here.
///
/// `create_card` is NOT idempotent: a blind retry creates a duplicate.
/// `update_card`, `attach_label` and `set_custom_field_value` are safe to
/// repeat with the same arguments.
#[async_trait]
pub trait BoardGateway: Send + Sync {
    async fn list_boards(&self) -> Result<Vec<Board>>;
    async fn get_board(&self, board_id: &str) -> Result<Board>;
    async fn list_lists(&self, board_id: &str) -> Result<Vec<BoardList>>;
    async fn list_cards(&self, board_id: &str) -> Result<Vec<Card>>;
    async fn list_labels(&self, board_id: &str) -> Result<Vec<Label>>;
    async fn list_custom_fields(&self, board_id: &str) -> Result<Vec<CustomFieldDefinition>>;
    /// Fresh per-card field values; `Card::field_values` carries the same
    /// data as of the card fetch.
    async fn list_custom_field_values(&self, card_id: &str) -> Result<Vec<CustomFieldValue>>;
    async fn create_card(
        &self,
        list_id: &str,
        name: &str,
        desc: &str,
        due: Option<DateTime<Utc>>,
    ) -> Result<Card>;
    async fn update_card(&self, card_id: &str, patch: &CardPatch) -> Result<()>;
    async fn move_card(
        &self,
        card_id: &str,
        target_list_id: &str,
        target_board_id: Option<&str>,
    ) -> Result<()>;
    async fn create_label(&self, board_id: &str, name: &str, color: &str) -> Result<Label>;
    async fn attach_label(&self, card_id: &str, label_id: &str) -> Result<()>;
    async fn set_custom_field_value(
        &self,
        card_id: &str,
        field_id: &str,
        value: &FieldPayload,
    ) -> Result<()>;
}
