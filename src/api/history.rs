use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ok, page_params, ApiError, ApiResult, AppState, Paginated};
use crate::analysis::{canonicalize, insight_count, CompleteAnalysisResult};
use crate::db::HistoryFilter;
use crate::types::{AnalysisResultRow, SearchHistory, SearchType};
use crate::TARGET_WEB_REQUEST;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(rename = "type")]
    pub search_type: Option<String>,
    pub keyword: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Inline summary of a history row's analysis in the list view.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    pub id: i64,
    pub insight_count: usize,
    pub ai_model_used: Option<String>,
    pub analysis_version: Option<String>,
    pub processing_time: Option<i64>,
    pub ai_analysis_status: Option<String>,
    pub created_at: String,
}

impl From<&AnalysisResultRow> for ResultSummary {
    fn from(row: &AnalysisResultRow) -> Self {
        ResultSummary {
            id: row.id,
            insight_count: insight_count(row),
            ai_model_used: row.ai_model_used.clone(),
            analysis_version: row.analysis_version.clone(),
            processing_time: row.processing_time,
            ai_analysis_status: row.ai_analysis_status.clone(),
            created_at: row.created_at.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub history: SearchHistory,
    pub result: Option<ResultSummary>,
}

#[derive(Debug, Serialize)]
pub struct HistoryDetail {
    #[serde(flatten)]
    pub history: SearchHistory,
    pub result: Option<CompleteAnalysisResult>,
}

/// Parses an optional platform filter; an unknown value is rejected before any query runs.
pub fn search_type_param(value: Option<&str>) -> Result<Option<SearchType>, ApiError> {
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => SearchType::parse(value).map(Some).map_err(|_| {
            ApiError::validation(
                "INVALID_TYPE",
                format!("无效的平台类型: {}，可选值为 wechat 或 xiaohongshu", value),
            )
        }),
    }
}

pub async fn list_history(
    State(state): State<AppState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult<Paginated<HistoryEntry>> {
    let Query(query) = query?;
    let search_type = search_type_param(query.search_type.as_deref())?;
    let (page, limit) = page_params(query.page, query.limit)?;

    let filter = HistoryFilter {
        search_type,
        keyword: query.keyword.filter(|keyword| !keyword.trim().is_empty()),
        page,
        limit,
    };
    let found = state.db.list_history(&filter).await?;

    let items = found
        .items
        .into_iter()
        .map(|item| HistoryEntry {
            result: item.result.as_ref().map(ResultSummary::from),
            history: item.history,
        })
        .collect();
    ok(Paginated::new(items, found.total, page, limit))
}

pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<HistoryDetail> {
    let history = state
        .db
        .get_history(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("搜索记录不存在".to_string()))?;
    let row = state.db.get_analysis_for_history(id).await?;

    let result = canonicalize(&history, row.as_ref());
    ok(HistoryDetail { history, result })
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub id: i64,
    pub deleted: bool,
}

pub async fn delete_history(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Deleted> {
    if !state.db.delete_history(id).await? {
        return Err(ApiError::NotFound("搜索记录不存在".to_string()));
    }
    info!(target: TARGET_WEB_REQUEST, "Deleted search history {}", id);
    ok(Deleted { id, deleted: true })
}
