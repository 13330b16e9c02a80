use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::GatewayError;
use crate::fields::resolve_fields;
use crate::gateway::BoardGateway;
use crate::model::board::{BoardSnapshot, Card};
use crate::model::view::{BoardAnalysis, ListBreakdown, MilestoneSummary, ProjectView, ViewSummary};

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Snapshots older than this are refetched on access.
const FRESHNESS_WINDOW_SECS: i64 = 300;

/// The custom fields a view can filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Client,
    Project,
    Assignee,
    Milestone,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::Client,
        Dimension::Project,
        Dimension::Assignee,
        Dimension::Milestone,
    ];

    /// The custom field name this dimension filters on.
    pub fn field_name(self) -> &'static str {
        match self {
            Dimension::Client => "Client",
            Dimension::Project => "Project",
            Dimension::Assignee => "Assignee",
            Dimension::Milestone => "Milestone",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Dimension::Client => "client",
            Dimension::Project => "project",
            Dimension::Assignee => "assignee",
            Dimension::Milestone => "milestone",
        }
    }

    fn view_name(self, value: &str) -> String {
        match self {
            Dimension::Client | Dimension::Project => format!("{value} Project View"),
            Dimension::Assignee => format!("{value} Work View"),
            Dimension::Milestone => format!("Milestone {value} View"),
        }
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Dimension::Client),
            "project" => Ok(Dimension::Project),
            "assignee" => Ok(Dimension::Assignee),
            "milestone" => Ok(Dimension::Milestone),
            other => Err(format!(
                "unknown dimension '{other}' (expected client, project, assignee or milestone)"
            )),
        }
    }
}

/// Completion percentage for a card collection: closed / total x 100,
/// 0 when the collection is empty.
pub fn progress(cards: &[Card]) -> f64 {
    if cards.is_empty() {
        return 0.0;
    }
    let closed = cards.iter().filter(|c| c.closed).count();
    (closed as f64 / cards.len() as f64) * 100.0
}

/// List names that mark a list as holding finished work.
const DONE_LIST_KEYWORDS: [&str; 4] = ["done", "completed", "finished", "closed"];

fn is_done_list(name: &str) -> bool {
    let lowered = name.to_lowercase();
    DONE_LIST_KEYWORDS.iter().any(|kw| lowered.contains(kw))
}

/// Structural report on one board: totals, cards grouped by list, labels,
/// and a completion rate measured over the done-style lists (`None` when the
/// board has no such list).
pub async fn analyze_board(
    gateway: &dyn BoardGateway,
    board_id: &str,
) -> Result<BoardAnalysis, GatewayError> {
    let (board, lists, cards, labels) = tokio::try_join!(
        gateway.get_board(board_id),
        gateway.list_lists(board_id),
        gateway.list_cards(board_id),
        gateway.list_labels(board_id),
    )?;

    let breakdowns: Vec<ListBreakdown> = lists
        .iter()
        .map(|list| ListBreakdown {
            id: list.id.clone(),
            name: list.name.clone(),
            cards: cards.iter().filter(|c| c.list_id == list.id).cloned().collect(),
        })
        .collect();
    let completion_rate = completion_rate(&breakdowns);

    Ok(BoardAnalysis {
        board_id: board.id,
        board_name: board.name,
        total_cards: cards.len(),
        total_lists: lists.len(),
        lists: breakdowns,
        labels,
        completion_rate,
    })
}

/// Analyze every board visible to the configured credentials. A board whose
/// analysis fails is logged and skipped; the rest are still reported.
pub async fn analyze_all_boards(
    gateway: &dyn BoardGateway,
) -> Result<Vec<BoardAnalysis>, GatewayError> {
    let boards = gateway.list_boards().await?;
    let mut analyses = Vec::with_capacity(boards.len());
    for board in boards {
        match analyze_board(gateway, &board.id).await {
            Ok(analysis) => analyses.push(analysis),
            Err(err) => warn!(board = %board.name, error = %err, "board analysis failed, skipping"),
        }
    }
    Ok(analyses)
}

/// Share of cards sitting on a done-style list, over all listed cards.
/// `None` when no list qualifies; 0 when the qualifying lists exist but the
/// board holds no cards.
fn completion_rate(lists: &[ListBreakdown]) -> Option<f64> {
    if !lists.iter().any(|l| is_done_list(&l.name)) {
        return None;
    }
    let total: usize = lists.iter().map(|l| l.cards.len()).sum();
    if total == 0 {
        return Some(0.0);
    }
    let done: usize = lists
        .iter()
        .filter(|l| is_done_list(&l.name))
        .map(|l| l.cards.len())
        .sum();
    Some((done as f64 / total as f64) * 100.0)
}

/// Serves filtered, aggregated read views over a cached master-board
/// snapshot. Holds the single cache slot for that board; the snapshot is
/// replaced atomically as a whole, never partially mutated.
pub struct ViewManager {
    gateway: Arc<dyn BoardGateway>,
    master_board_id: String,
    freshness: Duration,
    clock: Clock,
    cache: RwLock<Option<BoardSnapshot>>,
}

impl ViewManager {
    pub fn new(gateway: Arc<dyn BoardGateway>, master_board_id: impl Into<String>) -> Self {
        Self {
            gateway,
            master_board_id: master_board_id.into(),
            freshness: Duration::seconds(FRESHNESS_WINDOW_SECS),
            clock: Box::new(Utc::now),
            cache: RwLock::new(None),
        }
    }

    pub fn with_freshness(mut self, window: Duration) -> Self {
        self.freshness = window;
        self
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Return the cached snapshot while it is fresh; otherwise refetch and
    /// replace the cache. Refreshes are serialized behind the write lock, so
    /// concurrent callers trigger at most one underlying fetch.
    ///
    /// If the remote fetch fails and a previous snapshot exists, the stale
    /// snapshot is served instead of propagating the error.
    pub async fn snapshot(&self, force_refresh: bool) -> Result<BoardSnapshot, GatewayError> {
        if !force_refresh {
            let guard = self.cache.read().await;
            if let Some(snap) = guard.as_ref() {
                if self.is_fresh(snap) {
                    return Ok(snap.clone());
                }
            }
        }

        let mut guard = self.cache.write().await;
        // Another caller may have refreshed while we waited for the lock.
        if !force_refresh {
            if let Some(snap) = guard.as_ref() {
                if self.is_fresh(snap) {
                    return Ok(snap.clone());
                }
            }
        }

        match self.fetch_snapshot().await {
            Ok(snap) => {
                *guard = Some(snap.clone());
                Ok(snap)
            }
            Err(err) => match guard.as_ref() {
                Some(stale) => {
                    warn!(error = %err, "refresh failed, serving stale snapshot");
                    Ok(stale.clone())
                }
                None => Err(err),
            },
        }
    }

    fn is_fresh(&self, snap: &BoardSnapshot) -> bool {
        (self.clock)() - snap.captured_at < self.freshness
    }

    async fn fetch_snapshot(&self) -> Result<BoardSnapshot, GatewayError> {
        let id = &self.master_board_id;
        let (board, lists, cards, custom_fields) = tokio::try_join!(
            self.gateway.get_board(id),
            self.gateway.list_lists(id),
            self.gateway.list_cards(id),
            self.gateway.list_custom_fields(id),
        )?;
        Ok(BoardSnapshot {
            board,
            lists,
            cards,
            custom_fields,
            captured_at: (self.clock)(),
        })
    }

    /// Cards whose resolved value for the dimension's field equals `value`,
    /// plus milestone summaries scoped to those cards.
    pub async fn view_by(&self, dimension: Dimension, value: &str) -> Result<ProjectView, GatewayError> {
        let snap = self.snapshot(false).await?;
        Ok(Self::build_view(&snap, dimension, value))
    }

    /// One view per distinct resolved value per dimension, from a single
    /// snapshot scan.
    pub async fn all_views(&self) -> Result<Vec<ProjectView>, GatewayError> {
        let snap = self.snapshot(false).await?;
        let mut views = Vec::new();
        for dimension in Dimension::ALL {
            let mut values = BTreeSet::new();
            for card in &snap.cards {
                let resolved = resolve_fields(&snap.custom_fields, &card.field_values);
                if let Some(value) = resolved.get(dimension.field_name()) {
                    values.insert(value.clone());
                }
            }
            for value in values {
                views.push(Self::build_view(&snap, dimension, &value));
            }
        }
        Ok(views)
    }

    /// Summary form of `all_views`, without full card payloads.
    pub async fn list_views(&self) -> Result<Vec<ViewSummary>, GatewayError> {
        Ok(self.all_views().await?.iter().map(ViewSummary::of).collect())
    }

    /// Cards carrying a label literally equal to the week identifier.
    pub async fn weekly_view(&self, week_label: &str) -> Result<ProjectView, GatewayError> {
        let snap = self.snapshot(false).await?;
        let cards = snap
            .cards
            .iter()
            .filter(|c| c.labels.iter().any(|l| l.name == week_label))
            .cloned()
            .collect();
        Ok(ProjectView {
            name: format!("Week of {week_label} Planning"),
            filters: BTreeMap::from([("week".to_string(), week_label.to_string())]),
            cards,
            milestones: vec![],
        })
    }

    fn build_view(snap: &BoardSnapshot, dimension: Dimension, value: &str) -> ProjectView {
        let field = dimension.field_name();
        let cards: Vec<Card> = snap
            .cards
            .iter()
            .filter(|card| {
                resolve_fields(&snap.custom_fields, &card.field_values)
                    .get(field)
                    .is_some_and(|resolved| resolved == value)
            })
            .cloned()
            .collect();
        let milestones = Self::milestone_summaries(snap, &cards);
        ProjectView {
            name: dimension.view_name(value),
            filters: BTreeMap::from([(dimension.key().to_string(), value.to_string())]),
            cards,
            milestones,
        }
    }

    /// Lists whose name contains "Milestone", each with the subset of the
    /// filtered cards it holds and that subset's completion percentage.
    fn milestone_summaries(snap: &BoardSnapshot, cards: &[Card]) -> Vec<MilestoneSummary> {
        snap.lists
            .iter()
            .filter(|list| list.name.contains("Milestone"))
            .map(|list| {
                let in_list: Vec<Card> = cards
                    .iter()
                    .filter(|c| c.list_id == list.id)
                    .cloned()
                    .collect();
                let progress = progress(&in_list);
                MilestoneSummary {
                    id: list.id.clone(),
                    name: list.name.clone(),
                    cards: in_list,
                    progress,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::tests::{card, MockGateway};
    use crate::model::board::Label;
    use crate::model::custom_field::{
        CustomFieldDefinition, CustomFieldKind, CustomFieldValue, FieldOption,
    };
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicI64, Ordering};

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 27, 9, 0, 0).unwrap()
    }

    fn client_field() -> CustomFieldDefinition {
        CustomFieldDefinition {
            id: "f-client".into(),
            name: "Client".into(),
            kind: CustomFieldKind::List,
            options: vec![
                FieldOption {
                    id: "opt-acme".into(),
                    text: "Acme".into(),
                    color: None,
                },
                FieldOption {
                    id: "opt-globex".into(),
                    text: "Globex".into(),
                    color: None,
                },
            ],
        }
    }

    fn text_field(id: &str, name: &str) -> CustomFieldDefinition {
        CustomFieldDefinition {
            id: id.to_string(),
            name: name.to_string(),
            kind: CustomFieldKind::Text,
            options: vec![],
        }
    }

    /// Master board with a backlog, a milestone list and four cards spread
    /// over two clients and one milestone.
    fn seeded_gateway() -> Arc<MockGateway> {
        let gw = MockGateway::new();
        gw.add_board("m", "master");
        gw.add_list("m", "l-backlog", "Backlog");
        gw.add_list("m", "l-m1", "Milestone 1");
        gw.set_fields(
            "m",
            vec![
                client_field(),
                text_field("f-project", "Project"),
                text_field("f-assignee", "Assignee"),
                text_field("f-milestone", "Milestone"),
            ],
        );

        let mut c1 = card("c1", "Login flow", "l-m1", "m");
        c1.field_values = vec![
            CustomFieldValue::option("f-client", "opt-acme"),
            CustomFieldValue::text("f-milestone", "1"),
        ];
        let mut c2 = card("c2", "Signup flow", "l-m1", "m");
        c2.closed = true;
        c2.field_values = vec![
            CustomFieldValue::option("f-client", "opt-acme"),
            CustomFieldValue::text("f-milestone", "1"),
        ];
        let mut c3 = card("c3", "Data import", "l-backlog", "m");
        c3.field_values = vec![
            CustomFieldValue::option("f-client", "opt-globex"),
            CustomFieldValue::text("f-project", "iLitigate 2.0"),
            CustomFieldValue::text("f-assignee", "sam"),
        ];
        let mut c4 = card("c4", "Retro notes", "l-backlog", "m");
        c4.labels = vec![Label {
            id: "lb1".into(),
            name: "week-35".into(),
            color: None,
        }];

        for c in [c1, c2, c3, c4] {
            gw.add_card(c);
        }
        Arc::new(gw)
    }

    /// Manager with a clock that advances by whatever is stored in `offset`.
    fn manager_with_offset(gw: Arc<MockGateway>) -> (ViewManager, Arc<AtomicI64>) {
        let offset = Arc::new(AtomicI64::new(0));
        let handle = offset.clone();
        let manager = ViewManager::new(gw, "m").with_clock(move || {
            base_time() + Duration::seconds(handle.load(Ordering::SeqCst))
        });
        (manager, offset)
    }

    #[test]
    fn progress_of_empty_collection_is_zero() {
        assert_eq!(progress(&[]), 0.0);
    }

    #[test]
    fn progress_counts_closed_cards() {
        let mut cards = vec![
            card("c1", "a", "l", "m"),
            card("c2", "b", "l", "m"),
            card("c3", "c", "l", "m"),
            card("c4", "d", "l", "m"),
        ];
        cards[0].closed = true;
        assert_eq!(progress(&cards), 25.0);
    }

    #[test]
    fn dimension_parses_from_query_strings() {
        assert_eq!("client".parse::<Dimension>().unwrap(), Dimension::Client);
        assert_eq!("milestone".parse::<Dimension>().unwrap(), Dimension::Milestone);
        assert!("sprint".parse::<Dimension>().is_err());
    }

    #[tokio::test]
    async fn snapshot_within_window_serves_cache_and_fetches_once() {
        let gw = seeded_gateway();
        let (manager, _) = manager_with_offset(gw.clone());

        let first = manager.snapshot(false).await.unwrap();
        let second = manager.snapshot(false).await.unwrap();

        assert_eq!(first.captured_at, second.captured_at);
        assert_eq!(gw.card_fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn snapshot_past_window_triggers_exactly_one_refetch() {
        let gw = seeded_gateway();
        let (manager, offset) = manager_with_offset(gw.clone());

        let first = manager.snapshot(false).await.unwrap();
        offset.store(FRESHNESS_WINDOW_SECS + 1, Ordering::SeqCst);
        let second = manager.snapshot(false).await.unwrap();

        assert_ne!(first.captured_at, second.captured_at);
        assert_eq!(gw.card_fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_snapshot_requests_share_one_fetch() {
        let gw = seeded_gateway();
        let (manager, offset) = manager_with_offset(gw.clone());

        // Cold cache: four simultaneous callers, one underlying fetch.
        let (a, b, c, d) = tokio::join!(
            manager.snapshot(false),
            manager.snapshot(false),
            manager.snapshot(false),
            manager.snapshot(false),
        );
        let first = a.unwrap();
        for snap in [b.unwrap(), c.unwrap(), d.unwrap()] {
            assert_eq!(snap.captured_at, first.captured_at);
        }
        assert_eq!(gw.card_fetches.load(Ordering::SeqCst), 1);

        // Expired cache: the burst again resolves to a single refresh.
        offset.store(FRESHNESS_WINDOW_SECS + 1, Ordering::SeqCst);
        let (a, b, c, d) = tokio::join!(
            manager.snapshot(false),
            manager.snapshot(false),
            manager.snapshot(false),
            manager.snapshot(false),
        );
        let refreshed = a.unwrap();
        assert_ne!(refreshed.captured_at, first.captured_at);
        for snap in [b.unwrap(), c.unwrap(), d.unwrap()] {
            assert_eq!(snap.captured_at, refreshed.captured_at);
        }
        assert_eq!(gw.card_fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn force_refresh_bypasses_a_fresh_cache() {
        let gw = seeded_gateway();
        let (manager, _) = manager_with_offset(gw.clone());

        manager.snapshot(false).await.unwrap();
        manager.snapshot(true).await.unwrap();
        assert_eq!(gw.card_fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_refresh_falls_back_to_stale_snapshot() {
        let gw = seeded_gateway();
        let (manager, offset) = manager_with_offset(gw.clone());

        let first = manager.snapshot(false).await.unwrap();
        gw.set_offline(true);
        offset.store(FRESHNESS_WINDOW_SECS + 1, Ordering::SeqCst);

        let stale = manager.snapshot(false).await.unwrap();
        assert_eq!(stale.captured_at, first.captured_at);
    }

    #[tokio::test]
    async fn fetch_failure_without_prior_snapshot_propagates() {
        let gw = seeded_gateway();
        gw.set_offline(true);
        let (manager, _) = manager_with_offset(gw);

        let err = manager.snapshot(false).await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn client_view_filters_cards_and_scopes_milestones() {
        let gw = seeded_gateway();
        let (manager, _) = manager_with_offset(gw);

        let view = manager.view_by(Dimension::Client, "Acme").await.unwrap();

        assert_eq!(view.name, "Acme Project View");
        assert_eq!(view.filters.get("client"), Some(&"Acme".to_string()));
        let names: Vec<_> = view.cards.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Login flow", "Signup flow"]);

        assert_eq!(view.milestones.len(), 1);
        let milestone = &view.milestones[0];
        assert_eq!(milestone.name, "Milestone 1");
        assert_eq!(milestone.cards.len(), 2);
        assert_eq!(milestone.progress, 50.0);
    }

    #[tokio::test]
    async fn milestone_view_compares_string_form() {
        let gw = seeded_gateway();
        let (manager, _) = manager_with_offset(gw);

        let view = manager.view_by(Dimension::Milestone, "1").await.unwrap();
        assert_eq!(view.name, "Milestone 1 View");
        assert_eq!(view.cards.len(), 2);
    }

    #[tokio::test]
    async fn view_with_no_matching_cards_has_empty_milestones_at_zero() {
        let gw = seeded_gateway();
        let (manager, _) = manager_with_offset(gw);

        let view = manager.view_by(Dimension::Client, "Globex").await.unwrap();
        assert_eq!(view.cards.len(), 1);
        // The milestone list holds none of the filtered cards.
        assert_eq!(view.milestones[0].cards.len(), 0);
        assert_eq!(view.milestones[0].progress, 0.0);
    }

    #[tokio::test]
    async fn all_views_covers_each_distinct_value_per_dimension() {
        let gw = seeded_gateway();
        let (manager, _) = manager_with_offset(gw.clone());

        let views = manager.all_views().await.unwrap();

        // Clients: Acme, Globex. Project: iLitigate 2.0. Assignee: sam.
        // Milestone: 1.
        assert_eq!(views.len(), 5);
        assert!(views.iter().any(|v| v.name == "Acme Project View"));
        assert!(views.iter().any(|v| v.name == "iLitigate 2.0 Project View"));
        assert!(views.iter().any(|v| v.name == "sam Work View"));
        assert!(views.iter().any(|v| v.name == "Milestone 1 View"));
        // One snapshot scan: the whole enumeration needed a single fetch.
        assert_eq!(gw.card_fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn list_views_returns_summaries_without_cards() {
        let gw = seeded_gateway();
        let (manager, _) = manager_with_offset(gw);

        let summaries = manager.list_views().await.unwrap();
        let acme = summaries.iter().find(|s| s.name == "Acme Project View").unwrap();
        assert_eq!(acme.card_count, 2);
        assert_eq!(acme.milestone_count, 1);
    }

    #[tokio::test]
    async fn analysis_groups_cards_by_list_with_completion_rate() {
        let gw = MockGateway::new();
        gw.add_board("b", "design");
        gw.add_list("b", "l-todo", "To Do");
        gw.add_list("b", "l-done", "Done");
        gw.add_card(card("c1", "Login flow", "l-todo", "b"));
        gw.add_card(card("c2", "Signup flow", "l-todo", "b"));
        gw.add_card(card("c3", "Wireframes", "l-done", "b"));
        gw.add_card(card("c4", "Kickoff notes", "l-done", "b"));

        let analysis = analyze_board(&gw, "b").await.unwrap();

        assert_eq!(analysis.board_name, "design");
        assert_eq!(analysis.total_cards, 4);
        assert_eq!(analysis.total_lists, 2);
        let todo = analysis.lists.iter().find(|l| l.name == "To Do").unwrap();
        assert_eq!(todo.cards.len(), 2);
        // Half the cards sit on the Done list.
        assert_eq!(analysis.completion_rate, Some(50.0));
    }

    #[tokio::test]
    async fn analysis_without_a_done_list_has_no_completion_rate() {
        let gw = MockGateway::new();
        gw.add_board("b", "design");
        gw.add_list("b", "l-todo", "To Do");
        gw.add_card(card("c1", "Login flow", "l-todo", "b"));

        let analysis = analyze_board(&gw, "b").await.unwrap();
        assert_eq!(analysis.completion_rate, None);
    }

    #[tokio::test]
    async fn analysis_of_an_empty_board_with_a_done_list_reads_zero() {
        let gw = MockGateway::new();
        gw.add_board("b", "design");
        gw.add_list("b", "l-done", "Completed");

        let analysis = analyze_board(&gw, "b").await.unwrap();
        assert_eq!(analysis.total_cards, 0);
        assert_eq!(analysis.completion_rate, Some(0.0));
    }

    #[tokio::test]
    async fn analyze_all_boards_skips_a_failing_board() {
        let gw = MockGateway::new();
        gw.add_board("b1", "design");
        gw.add_list("b1", "l1", "To Do");
        gw.add_board("b2", "dev");
        gw.add_list("b2", "l2", "To Do");
        gw.add_card(card("c1", "API sketch", "l2", "b2"));
        gw.fail_card_fetch("b1");

        let analyses = analyze_all_boards(&gw).await.unwrap();
        assert_eq!(analyses.len(), 1);
        assert_eq!(analyses[0].board_name, "dev");
        assert_eq!(analyses[0].total_cards, 1);
    }

    #[tokio::test]
    async fn weekly_view_matches_label_literally() {
        let gw = seeded_gateway();
        let (manager, _) = manager_with_offset(gw);

        let view = manager.weekly_view("week-35").await.unwrap();
        assert_eq!(view.name, "Week of week-35 Planning");
        assert_eq!(view.cards.len(), 1);
        assert_eq!(view.cards[0].name, "Retro notes");
        assert!(view.milestones.is_empty());

        let other = manager.weekly_view("week-36").await.unwrap();
        assert!(other.cards.is_empty());
    }
}
