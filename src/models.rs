use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Editorial/political classification of a media source. Used only as
/// analysis context, never as a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Leaning {
    Principlist,
    Reformist,
    State,
    Economic,
    Moderate,
}

impl Leaning {
    pub fn label(&self) -> &'static str {
        match self {
            Leaning::Principlist => "Principlist",
            Leaning::Reformist => "Reformist",
            Leaning::State => "State",
            Leaning::Economic => "Economic",
            Leaning::Moderate => "Moderate",
        }
    }
}

impl std::fmt::Display for Leaning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// An allow-listed news outlet. Domain is the natural key.
#[derive(Debug, Clone)]
pub struct MediaSource {
    pub id: String,
    pub domain: String,
    pub name: String,
    pub leaning: Leaning,
    pub active: bool,
    pub description: Option<String>,
}

/// Publication-date window for a watchlist item's search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    /// Relative lookback from now (e.g., "24h", "7d").
    Window(std::time::Duration),
    /// Explicit bounds.
    Between { start: DateTime<Utc>, end: DateTime<Utc> },
}

/// A topic under monitoring. Immutable during a run.
#[derive(Debug, Clone)]
pub struct WatchlistItem {
    pub id: String,
    pub topic: String,
    pub description: String,
    /// Pre-optimized Persian query; skips the translation stage when set.
    pub query: Option<String>,
    pub range: Option<TimeRange>,
}

/// A single search hit. Produced only by the search adapter, never mutated.
/// Field names match the upstream wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleResult {
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub text: String,
    pub domain: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ReportStatus {
    /// Terminal states are never transitioned out of; a rerun replaces the
    /// whole report instead.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReportStatus::Completed | ReportStatus::Failed | ReportStatus::Cancelled)
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReportStatus::Idle => "idle",
            ReportStatus::Running => "running",
            ReportStatus::Completed => "completed",
            ReportStatus::Failed => "failed",
            ReportStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Result of one monitoring pass over one watchlist item.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub id: String,
    pub watchlist_item_id: String,
    pub topic: String,
    pub created_at: DateTime<Utc>,
    pub status: ReportStatus,
    /// Human-readable pipeline stage while running.
    pub stage: String,
    pub query: Option<String>,
    pub summary: Option<String>,
    pub articles: Vec<ArticleResult>,
    pub error: Option<String>,
}

impl Report {
    pub fn new(item: &WatchlistItem, stage: &str) -> Self {
        Report {
            id: Uuid::new_v4().to_string(),
            watchlist_item_id: item.id.clone(),
            topic: item.topic.clone(),
            created_at: Utc::now(),
            status: ReportStatus::Running,
            stage: stage.to_string(),
            query: None,
            summary: None,
            articles: Vec::new(),
            error: None,
        }
    }

    /// Merge a partial update into this report.
    pub fn apply(&mut self, patch: &ReportPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(ref stage) = patch.stage {
            self.stage = stage.clone();
        }
        if let Some(ref query) = patch.query {
            self.query = Some(query.clone());
        }
        if let Some(ref articles) = patch.articles {
            self.articles = articles.clone();
        }
        if let Some(ref summary) = patch.summary {
            self.summary = Some(summary.clone());
        }
        if let Some(ref error) = patch.error {
            self.error = Some(error.clone());
        }
    }
}

/// Partial report update emitted by the orchestrator as a stage completes.
#[derive(Debug, Clone, Default)]
pub struct ReportPatch {
    pub status: Option<ReportStatus>,
    pub stage: Option<String>,
    pub query: Option<String>,
    pub articles: Option<Vec<ArticleResult>>,
    pub summary: Option<String>,
    pub error: Option<String>,
}
