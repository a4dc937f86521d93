use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::history::search_type_param;
use super::{ok, ApiError, ApiResult, AppState};
use crate::analysis::{canonicalize, insight_count, InsightDetail};
use crate::types::SearchType;
use crate::util::format_timestamp;

const DEFAULT_HOURS: i64 = 24;
const MAX_HOURS: i64 = 720;

#[derive(Debug, Deserialize)]
pub struct InsightHistoryQuery {
    pub hours: Option<i64>,
    pub platform: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightHistoryItem {
    pub id: i64,
    pub analysis_id: i64,
    pub keyword: String,
    #[serde(rename = "type")]
    pub search_type: SearchType,
    pub search_time: String,
    pub article_count: i64,
    pub insight_count: usize,
    pub model_used: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightHistory {
    pub items: Vec<InsightHistoryItem>,
    pub total: usize,
    pub hours: i64,
    pub since: String,
}

pub async fn insight_history(
    State(state): State<AppState>,
    query: Result<Query<InsightHistoryQuery>, QueryRejection>,
) -> ApiResult<InsightHistory> {
    let Query(query) = query?;
    let hours = query.hours.unwrap_or(DEFAULT_HOURS);
    if !(1..=MAX_HOURS).contains(&hours) {
        return Err(ApiError::validation(
            "INVALID_PARAMS",
            format!("hours 必须在 1 到 {} 之间", MAX_HOURS),
        ));
    }
    let platform = search_type_param(query.platform.as_deref())?;

    let since = format_timestamp(Utc::now() - Duration::hours(hours));
    let rows = state.db.recent_completed_analyses(&since, platform).await?;

    let items: Vec<InsightHistoryItem> = rows
        .into_iter()
        .map(|(history, row)| InsightHistoryItem {
            id: history.id,
            analysis_id: row.id,
            insight_count: insight_count(&row),
            model_used: row.ai_model_used,
            keyword: history.keyword,
            search_type: history.search_type,
            search_time: history.search_time,
            article_count: history.article_count,
        })
        .collect();

    ok(InsightHistory {
        total: items.len(),
        items,
        hours,
        since,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightDetailResponse {
    pub id: i64,
    pub keyword: String,
    pub total: usize,
    #[serde(flatten)]
    pub detail: InsightDetail,
}

/// Normalized insight cards for one search's analysis. `id` is the search history id.
pub async fn insight_detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<InsightDetailResponse> {
    let not_found = || ApiError::NotFound("分析结果不存在".to_string());
    let history = state.db.get_history(id).await?.ok_or_else(not_found)?;
    let row = state.db.get_analysis_for_history(id).await?;
    let canonical = canonicalize(&history, row.as_ref()).ok_or_else(not_found)?;

    // Generated ids are stable per analysis rather than per request.
    let timestamp_ms = DateTime::parse_from_rfc3339(&canonical.metadata.timestamp)
        .map(|at| at.timestamp_millis())
        .unwrap_or_else(|_| Utc::now().timestamp_millis());
    let detail = InsightDetail::build(&canonical.structured_topic_insights, timestamp_ms);

    ok(InsightDetailResponse {
        id,
        keyword: history.keyword,
        total: detail.insights.len(),
        detail,
    })
}
