use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono::{NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::{ok, ApiError, ApiResult, AppState};
use crate::db::{Database, NewAnalysis, NewSearchHistory};
use crate::encoding::{repair_text, repair_value};
use crate::types::{SearchStatus, SearchType};
use crate::util::format_timestamp;
use crate::TARGET_WEB_REQUEST;

/// Body of `POST /analysis/save`. Legacy names are accepted but stored under
/// the current ones; when both are sent the current name wins.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveAnalysisRequest {
    pub keyword: Option<String>,
    #[serde(rename = "type")]
    pub search_type: Option<String>,
    pub platform: Option<String>,
    pub articles: Option<Value>,
    pub article_count: Option<i64>,
    pub avg_read: Option<f64>,
    pub avg_like: Option<f64>,
    pub original_rate: Option<f64>,
    pub avg_interaction: Option<f64>,
    pub duration: Option<i64>,
    pub word_cloud: Option<Value>,
    pub top_liked_articles: Option<Value>,
    pub top_interaction_articles: Option<Value>,
    pub ai_summaries: Option<Value>,
    pub structured_info: Option<Value>,
    pub ai_insights: Option<Value>,
    pub ai_generated_insights: Option<Value>,
    pub rule_based_insights: Option<Value>,
    pub rule_insights: Option<Value>,
    pub structured_topic_insights: Option<Value>,
    pub analysis_version: Option<String>,
    pub ai_model_used: Option<String>,
    pub processing_time: Option<i64>,
    pub ai_analysis_status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedAnalysis {
    pub search_history_id: i64,
    pub analysis_result_id: i64,
    pub keyword: String,
}

#[derive(Debug, Serialize)]
pub struct Quota {
    pub limit: i64,
    pub used: i64,
    pub remaining: i64,
}

async fn quota_status(db: &Database, limit: i64) -> Result<Quota, sqlx::Error> {
    let day_start = format_timestamp(Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc());
    let used = db.count_history_since(&day_start).await?;
    Ok(Quota {
        limit,
        used,
        remaining: (limit - used).max(0),
    })
}

pub async fn quota(State(state): State<AppState>) -> ApiResult<Quota> {
    ok(quota_status(&state.db, state.settings.analysis_daily_quota).await?)
}

fn repaired(value: Option<Value>) -> Option<Value> {
    value.map(|value| repair_value(&value))
}

pub async fn save_analysis(
    State(state): State<AppState>,
    body: Result<Json<SaveAnalysisRequest>, JsonRejection>,
) -> ApiResult<SavedAnalysis> {
    let Json(body) = body?;

    let keyword = body
        .keyword
        .as_deref()
        .map(str::trim)
        .filter(|keyword| !keyword.is_empty())
        .map(repair_text)
        .ok_or_else(|| ApiError::missing("缺少必要参数: keyword"))?;
    let articles = match body.articles {
        Some(Value::Array(articles)) => articles,
        Some(_) => return Err(ApiError::missing("articles 必须是数组")),
        None => return Err(ApiError::missing("缺少必要参数: articles")),
    };
    let search_type = match body.search_type.as_deref().or(body.platform.as_deref()) {
        Some(value) => SearchType::parse(value).map_err(|_| {
            ApiError::validation("INVALID_TYPE", format!("无效的平台类型: {}", value))
        })?,
        None => SearchType::Wechat,
    };

    let quota = quota_status(&state.db, state.settings.analysis_daily_quota).await?;
    if quota.remaining == 0 {
        warn!(target: TARGET_WEB_REQUEST, "Analysis quota exhausted ({} of {})", quota.used, quota.limit);
        return Err(ApiError::QuotaExceeded(format!(
            "今日分析次数已达上限（{}次）",
            quota.limit
        )));
    }

    let history = NewSearchHistory {
        search_type,
        keyword: keyword.clone(),
        article_count: body.article_count.unwrap_or(articles.len() as i64),
        avg_read: body.avg_read.unwrap_or(0.0),
        avg_like: body.avg_like.unwrap_or(0.0),
        original_rate: body.original_rate.unwrap_or(0.0),
        avg_interaction: body.avg_interaction.unwrap_or(0.0),
        status: SearchStatus::Completed,
        error_message: None,
        duration: body.duration,
    };
    let analysis = NewAnalysis {
        word_cloud: repaired(body.word_cloud),
        all_articles: Some(repair_value(&Value::Array(articles))),
        top_liked_articles: repaired(body.top_liked_articles),
        top_interaction_articles: repaired(body.top_interaction_articles),
        ai_summaries: repaired(body.ai_summaries),
        structured_info: repaired(body.structured_info),
        ai_insights: repaired(body.ai_insights.or(body.ai_generated_insights)),
        rule_based_insights: repaired(body.rule_based_insights.or(body.rule_insights)),
        structured_topic_insights: repaired(body.structured_topic_insights),
        analysis_version: body.analysis_version,
        ai_model_used: body.ai_model_used,
        processing_time: body.processing_time,
        ai_analysis_status: body.ai_analysis_status,
    };

    let (search_history_id, analysis_result_id) =
        state.db.save_analysis(&history, &analysis).await?;
    info!(target: TARGET_WEB_REQUEST, "Saved analysis for '{}' as history {}", keyword, search_history_id);

    ok(SavedAnalysis {
        search_history_id,
        analysis_result_id,
        keyword,
    })
}
