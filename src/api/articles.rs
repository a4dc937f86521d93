use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::history::Deleted;
use super::{ok, page_params, ApiError, ApiResult, AppState, Paginated};
use crate::db::{ArticleFilter, ArticleUpdate};
use crate::types::{ArticleStatus, PublishRecord};
use crate::TARGET_WEB_REQUEST;

pub const ARTICLE_NOT_FOUND: &str = "文章不存在";

fn article_not_found() -> ApiError {
    ApiError::NotFound(ARTICLE_NOT_FOUND.to_string())
}

fn status_param(value: Option<&str>) -> Result<Option<ArticleStatus>, ApiError> {
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => ArticleStatus::parse(value).map(Some).map_err(|_| {
            ApiError::validation("INVALID_STATUS", format!("无效的文章状态: {}", value))
        }),
    }
}

#[derive(Debug, Deserialize)]
pub struct ArticleQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub platform: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_articles(
    State(state): State<AppState>,
    query: Result<Query<ArticleQuery>, QueryRejection>,
) -> ApiResult<Paginated<Value>> {
    let Query(query) = query?;
    let (page, limit) = page_params(query.page, query.limit)?;
    let filter = ArticleFilter {
        search: query.search.filter(|search| !search.trim().is_empty()),
        status: status_param(query.status.as_deref())?,
        platform: query.platform.filter(|platform| !platform.trim().is_empty()),
        page,
        limit,
    };

    let found = state.db.list_articles(&filter).await?;
    let items = found.items.iter().map(|article| article.to_json()).collect();
    ok(Paginated::new(items, found.total, page, limit))
}

pub async fn get_article(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Value> {
    let article = state.db.get_article(id).await?.ok_or_else(article_not_found)?;
    ok(article.to_json())
}

/// Only these four fields can be edited after creation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateArticleRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub status: Option<String>,
    pub custom_instructions: Option<String>,
}

pub async fn update_article(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Result<Json<UpdateArticleRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = body?;
    if body.title.as_deref().is_some_and(|title| title.trim().is_empty()) {
        return Err(ApiError::validation("VALIDATION_ERROR", "标题不能为空"));
    }

    let update = ArticleUpdate {
        title: body.title,
        content: body.content,
        status: status_param(body.status.as_deref())?,
        custom_instructions: body.custom_instructions,
    };
    let article = state
        .db
        .update_article(id, &update)
        .await?
        .ok_or_else(article_not_found)?;

    info!(target: TARGET_WEB_REQUEST, "Updated article {}", id);
    ok(article.to_json())
}

pub async fn delete_article(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Deleted> {
    if !state.db.delete_article(id).await? {
        return Err(article_not_found());
    }
    info!(target: TARGET_WEB_REQUEST, "Deleted article {}", id);
    ok(Deleted { id, deleted: true })
}

pub async fn publish_records(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Vec<PublishRecord>> {
    if state.db.get_article(id).await?.is_none() {
        return Err(article_not_found());
    }
    ok(state.db.list_publish_records(id).await?)
}

pub async fn withdraw_publish_record(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<PublishRecord> {
    let record = state
        .db
        .get_publish_record(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("发布记录不存在".to_string()))?;

    let withdrawn = state
        .db
        .withdraw_publish_record(id)
        .await?
        .ok_or_else(|| {
            ApiError::Conflict(format!(
                "只有已发布的记录可以撤回，当前状态: {}",
                record.status
            ))
        })?;

    info!(target: TARGET_WEB_REQUEST, "Withdrew publish record {} of article {}", id, withdrawn.article_id);
    ok(withdrawn)
}
