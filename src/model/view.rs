use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::board::{Card, Label};

/// A derived, filtered view of the master board. Ephemeral: rebuilt per
/// request from the cached snapshot, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectView {
    pub name: String,
    pub filters: BTreeMap<String, String>,
    pub cards: Vec<Card>,
    pub milestones: Vec<MilestoneSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MilestoneSummary {
    pub id: String,
    pub name: String,
    pub cards: Vec<Card>,
    /// Completion percentage over the cards above; 0 when the list is empty.
    pub progress: f64,
}

/// Summary form of a view, without full card payloads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewSummary {
    pub name: String,
    pub filters: BTreeMap<String, String>,
    pub card_count: usize,
    pub milestone_count: usize,
}

impl ViewSummary {
    pub fn of(view: &ProjectView) -> Self {
        ViewSummary {
            name: view.name.clone(),
            filters: view.filters.clone(),
            card_count: view.cards.len(),
            milestone_count: view.milestones.len(),
        }
    }
}

/// Structural report on a single board: list/card totals, cards grouped by
/// list, and a completion rate when the board has done-style lists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardAnalysis {
    pub board_id: String,
    pub board_name: String,
    pub total_cards: usize,
    pub total_lists: usize,
    pub lists: Vec<ListBreakdown>,
    pub labels: Vec<Label>,
    /// `None` when the board has no done-style list to measure against.
    pub completion_rate: Option<f64>,
}

/// One list and the cards currently on it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListBreakdown {
    pub id: String,
    pub name: String,
    pub cards: Vec<Card>,
}
