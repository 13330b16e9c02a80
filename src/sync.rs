use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::GatewayError;
use crate::gateway::BoardGateway;
use crate::model::board::{Card, CardPatch};

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// One source board to mirror from.
#[derive(Debug, Clone)]
pub struct SourceBoard {
    pub name: String,
    pub id: String,
}

/// Static sync configuration, validated at startup.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub master_board_id: String,
    pub sources: Vec<SourceBoard>,
    /// Source board name -> master list name. A source missing here is
    /// counted as unmapped at sync time, not rejected at load time.
    pub list_mapping: HashMap<String, String>,
}

/// Counts for one sync pass. `unmapped` cards are excluded from the mirror
/// in a way distinguishable from `skipped` (already present).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    pub synced: usize,
    pub skipped: usize,
    pub unmapped: usize,
    pub refreshed: usize,
    pub total: usize,
}

/// The mirror identity: the expected master-board title for a source card.
///
/// This reconstructed title is the sole deduplication key within a sync
/// pass. Two distinct source cards on different boards can collide after
/// board-name prefixing; the key derivation is isolated here so it can later
/// be swapped for a persisted source-id table.
pub fn mirror_title(source_board: &str, card_title: &str) -> String {
    format!("[{}] {}", source_board.to_uppercase(), card_title)
}

struct CreateMirror {
    source_board: String,
    title: String,
    target_list_id: String,
    original_desc: String,
    original_url: String,
}

struct MirrorPlan {
    creates: Vec<CreateMirror>,
    skipped: usize,
    unmapped: usize,
    total: usize,
}

/// Mirrors cards from the configured source boards into designated lists on
/// the master board. Stateless between passes: everything is recomputed from
/// current remote data.
pub struct SyncEngine {
    gateway: Arc<dyn BoardGateway>,
    config: SyncConfig,
    clock: Clock,
}

impl SyncEngine {
    pub fn new(gateway: Arc<dyn BoardGateway>, config: SyncConfig) -> Self {
        Self {
            gateway,
            config,
            clock: Box::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Run one full sync pass: create mirrors for new source cards, then
    /// refresh the descriptions of all previously mirrored cards.
    ///
    /// Not safe to run concurrently with itself: two passes can both decide
    /// to create the same mirror before either writes. The caller must
    /// guarantee at most one invocation at a time.
    pub async fn run_full_sync(&self) -> Result<SyncReport, GatewayError> {
        info!("starting full sync pass");

        let source_cards = self.fetch_source_cards().await;
        let master_lists = self.master_lists().await?;
        let master_cards = self.gateway.list_cards(&self.config.master_board_id).await?;
        let mut existing_titles: HashSet<String> =
            master_cards.iter().map(|c| c.name.clone()).collect();

        let plan = Self::plan(&self.config, &source_cards, &master_lists, &mut existing_titles);

        let mut synced = 0;
        for create in &plan.creates {
            let desc = self.mirror_description(
                &create.source_board,
                &create.original_url,
                &create.original_desc,
            );
            match self
                .gateway
                .create_card(&create.target_list_id, &create.title, &desc, None)
                .await
            {
                Ok(_) => synced += 1,
                Err(err) => {
                    warn!(title = %create.title, error = %err, "failed to create mirror card");
                }
            }
        }

        let refreshed = self.refresh_existing(&source_cards, &master_cards).await;

        let report = SyncReport {
            synced,
            skipped: plan.skipped,
            unmapped: plan.unmapped,
            refreshed,
            total: plan.total,
        };
        info!(
            synced = report.synced,
            skipped = report.skipped,
            unmapped = report.unmapped,
            refreshed = report.refreshed,
            total = report.total,
            "sync pass complete"
        );
        Ok(report)
    }

    /// Pull all cards from every configured source board. A board whose
    /// fetch fails contributes nothing to this pass but does not abort it.
    async fn fetch_source_cards(&self) -> Vec<(String, Card)> {
        let mut all = Vec::new();
        for source in &self.config.sources {
            match self.gateway.list_cards(&source.id).await {
                Ok(cards) => {
                    info!(board = %source.name, count = cards.len(), "fetched source cards");
                    all.extend(cards.into_iter().map(|c| (source.name.clone(), c)));
                }
                Err(err) => {
                    warn!(board = %source.name, error = %err, "skipping source board this pass");
                }
            }
        }
        all
    }

    async fn master_lists(&self) -> Result<HashMap<String, String>, GatewayError> {
        let lists = self.gateway.list_lists(&self.config.master_board_id).await?;
        Ok(lists.into_iter().map(|l| (l.name, l.id)).collect())
    }

    /// Decide per source card whether its mirror must be created, already
    /// exists, or has no configured target. Pure over fetched state; the set
    /// of existing titles grows as creates are planned, so identical source
    /// cards within one pass plan a single create.
    fn plan(
        config: &SyncConfig,
        source_cards: &[(String, Card)],
        master_lists: &HashMap<String, String>,
        existing_titles: &mut HashSet<String>,
    ) -> MirrorPlan {
        let mut creates = Vec::new();
        let mut skipped = 0;
        let mut unmapped = 0;

        for (source_board, card) in source_cards {
            let title = mirror_title(source_board, &card.name);

            if existing_titles.contains(&title) {
                skipped += 1;
                continue;
            }
            let Some(list_name) = config.list_mapping.get(source_board) else {
                warn!(board = %source_board, "no master list mapping for source board");
                unmapped += 1;
                continue;
            };
            let Some(list_id) = master_lists.get(list_name) else {
                warn!(list = %list_name, "mapped list not present on master board");
                unmapped += 1;
                continue;
            };

            existing_titles.insert(title.clone());
            creates.push(CreateMirror {
                source_board: source_board.clone(),
                title,
                target_list_id: list_id.clone(),
                original_desc: card.desc.clone(),
                original_url: card.url.clone(),
            });
        }

        MirrorPlan {
            creates,
            skipped,
            unmapped,
            total: source_cards.len(),
        }
    }

    /// The synthesized header prepended to every mirror description. The
    /// refresh contract is "advance the timestamp", not a content diff.
    fn mirror_description(&self, source_board: &str, url: &str, original: &str) -> String {
        let now = (self.clock)();
        format!(
            "Synced from {source_board} board\nLast synced: {}\nOriginal card: {url}\n\n{original}",
            now.format("%Y-%m-%d %H:%M")
        )
    }

    /// Overwrite the description of every master card whose title matches a
    /// currently-known source card's mirror title, regardless of whether
    /// content changed.
    async fn refresh_existing(
        &self,
        source_cards: &[(String, Card)],
        master_cards: &[Card],
    ) -> usize {
        let lookup: HashMap<String, &(String, Card)> = source_cards
            .iter()
            .map(|entry| (mirror_title(&entry.0, &entry.1.name), entry))
            .collect();

        let mut refreshed = 0;
        for master_card in master_cards {
            let Some((source_board, source_card)) = lookup.get(&master_card.name).map(|e| (&e.0, &e.1))
            else {
                continue;
            };
            let desc = self.mirror_description(source_board, &source_card.url, &source_card.desc);
            match self
                .gateway
                .update_card(&master_card.id, &CardPatch::description(desc))
                .await
            {
                Ok(()) => refreshed += 1,
                Err(err) => {
                    warn!(card = %master_card.name, error = %err, "failed to refresh mirror card");
                }
            }
        }
        refreshed
    }
}
