use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::analyze;
use crate::error::MonitorError;
use crate::exa::{ExaClient, SearchParams};
use crate::gemini::GeminiClient;
use crate::models::{Report, ReportPatch, ReportStatus, TimeRange, WatchlistItem};
use crate::store::RunToken;
use crate::translate;

pub const STAGE_INITIALIZING: &str = "Initializing";
pub const STAGE_TRANSLATING: &str = "Translating";
pub const STAGE_SCANNING: &str = "Scanning";
pub const STAGE_ANALYZING: &str = "Analyzing";
pub const STAGE_COMPLETE: &str = "Complete";
pub const STAGE_FAILED: &str = "Failed";
pub const STAGE_CANCELLED: &str = "Cancelled";

/// Pause between the translate and search stages. Also the window in which
/// a cancellation lands before any search request goes out.
const INTER_STAGE_DELAY: Duration = Duration::from_millis(500);

/// Search lookback when an item has no explicit time range.
const DEFAULT_LOOKBACK_HOURS: i64 = 24;

/// Lifecycle event emitted by the orchestrator. The caller applies these to
/// a [`crate::store::ReportStore`] (or asserts on them directly in tests).
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    Init(Report),
    Update { item_id: String, patch: ReportPatch },
}

/// Inputs for one monitoring pass.
#[derive(Debug)]
pub struct MonitorParams {
    pub items: Vec<WatchlistItem>,
    /// Domains requested for this run (active sources).
    pub active_domains: Vec<String>,
    /// Registry allow-list; the search adapter gates against it.
    pub allowed_domains: HashSet<String>,
    /// Normalized domain → leaning label, analysis context only.
    pub leanings: HashMap<String, String>,
    pub num_results: u32,
    pub translation_model: String,
    pub analysis_model: String,
}

/// Run the three-stage pipeline for every watchlist item, one item at a
/// time. One item's failure never aborts the loop; cancellation is polled
/// via the run token before and after every stage.
pub async fn run_monitoring(
    gemini: &GeminiClient,
    exa: &ExaClient,
    params: &MonitorParams,
    token: &RunToken,
    events: &UnboundedSender<MonitorEvent>,
) {
    for item in &params.items {
        if token.is_cancelled() {
            send_update(events, &item.id, cancelled_patch());
            continue;
        }

        let report = Report::new(item, STAGE_INITIALIZING);
        let _ = events.send(MonitorEvent::Init(report));
        info!(topic = %item.topic, "monitoring topic");

        match run_item(gemini, exa, params, item, token, events).await {
            Ok(()) => {
                info!(topic = %item.topic, "topic complete");
            }
            Err(MonitorError::Cancelled) => {
                info!(topic = %item.topic, "topic cancelled");
                send_update(events, &item.id, cancelled_patch());
            }
            Err(MonitorError::Adapter(e)) => {
                warn!(topic = %item.topic, error = %e, "topic failed");
                send_update(
                    events,
                    &item.id,
                    ReportPatch {
                        status: Some(ReportStatus::Failed),
                        stage: Some(STAGE_FAILED.to_string()),
                        error: Some(e.to_string()),
                        ..Default::default()
                    },
                );
            }
        }
    }
}

async fn run_item(
    gemini: &GeminiClient,
    exa: &ExaClient,
    params: &MonitorParams,
    item: &WatchlistItem,
    token: &RunToken,
    events: &UnboundedSender<MonitorEvent>,
) -> Result<(), MonitorError> {
    send_update(
        events,
        &item.id,
        ReportPatch {
            stage: Some(STAGE_TRANSLATING.to_string()),
            ..Default::default()
        },
    );

    // A pre-optimized query skips the translation call.
    let query = match item.query.as_deref().map(str::trim) {
        Some(q) if !q.is_empty() => q.to_string(),
        _ => translate::translate_topic(gemini, &params.translation_model, &item.topic).await?,
    };
    ensure_live(token)?;

    send_update(
        events,
        &item.id,
        ReportPatch {
            query: Some(query.clone()),
            stage: Some(STAGE_SCANNING.to_string()),
            ..Default::default()
        },
    );

    tokio::time::sleep(INTER_STAGE_DELAY).await;
    ensure_live(token)?;

    let (start_published, end_published) = search_window(item.range.as_ref(), Utc::now());
    let articles = exa
        .search(
            &params.allowed_domains,
            &SearchParams {
                query: &query,
                include_domains: &params.active_domains,
                num_results: params.num_results,
                start_published,
                end_published,
            },
        )
        .await?;
    ensure_live(token)?;

    send_update(
        events,
        &item.id,
        ReportPatch {
            articles: Some(articles.clone()),
            stage: Some(STAGE_ANALYZING.to_string()),
            ..Default::default()
        },
    );

    let summary =
        analyze::analyze_articles(gemini, &params.analysis_model, &item.topic, &articles, &params.leanings).await?;
    ensure_live(token)?;

    send_update(
        events,
        &item.id,
        ReportPatch {
            summary: Some(summary),
            status: Some(ReportStatus::Completed),
            stage: Some(STAGE_COMPLETE.to_string()),
            ..Default::default()
        },
    );

    Ok(())
}

/// Publication-date bounds for the search stage. No explicit range means
/// "the last 24 hours", with the end left open.
fn search_window(range: Option<&TimeRange>, now: DateTime<Utc>) -> (Option<String>, Option<String>) {
    match range {
        Some(TimeRange::Between { start, end }) => (Some(to_iso(start)), Some(to_iso(end))),
        Some(TimeRange::Window(window)) => {
            let lookback = chrono::Duration::from_std(*window)
                .unwrap_or_else(|_| chrono::Duration::hours(DEFAULT_LOOKBACK_HOURS));
            (Some(to_iso(&(now - lookback))), None)
        }
        None => (Some(to_iso(&(now - chrono::Duration::hours(DEFAULT_LOOKBACK_HOURS)))), None),
    }
}

fn to_iso(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn ensure_live(token: &RunToken) -> Result<(), MonitorError> {
    if token.is_cancelled() {
        Err(MonitorError::Cancelled)
    } else {
        Ok(())
    }
}

fn cancelled_patch() -> ReportPatch {
    ReportPatch {
        status: Some(ReportStatus::Cancelled),
        stage: Some(STAGE_CANCELLED.to_string()),
        ..Default::default()
    }
}

fn send_update(events: &UnboundedSender<MonitorEvent>, item_id: &str, patch: ReportPatch) {
    let _ = events.send(MonitorEvent::Update {
        item_id: item_id.to_string(),
        patch,
    });
}
