//! HTTP surface. Each handler validates its input, talks to the store or an
//! external adapter, and answers with `{success: true, data}` or an [`ApiError`].

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

mod analysis;
mod articles;
mod content;
pub mod error;
mod history;
mod insights;
mod wechat;

#[cfg(test)]
mod tests;

pub use self::error::ApiError;

use crate::db::Database;
use crate::environment::Settings;
use crate::image::ImageGenerator;
use crate::llm::LLMClient;
use crate::wechat::WechatClient;
use crate::TARGET_WEB_REQUEST;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Shared handles every handler receives through `State`.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub settings: Arc<Settings>,
    pub llm: Option<LLMClient>,
    pub images: ImageGenerator,
    pub wechat: WechatClient,
}

impl AppState {
    pub fn new(db: Database, settings: Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.http_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(AppState {
            db,
            llm: LLMClient::from_settings(&settings.ai),
            images: ImageGenerator::new(http.clone(), settings.image.clone()),
            wechat: WechatClient::new(http, settings.wechat.clone()),
            settings: Arc::new(settings),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

pub fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse {
        success: true,
        data,
    }))
}

/// One page of results plus what is needed to render pagination.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, page: i64, limit: i64) -> Self {
        Paginated {
            items,
            total,
            page,
            limit,
            total_pages: (total + limit - 1) / limit,
        }
    }
}

/// Resolves `page`/`limit` query values, rejecting anything out of range.
pub fn page_params(page: Option<i64>, limit: Option<i64>) -> Result<(i64, i64), ApiError> {
    let page = page.unwrap_or(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if page < 1 {
        return Err(ApiError::validation("INVALID_PARAMS", "page 必须大于等于 1"));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(ApiError::validation(
            "INVALID_PARAMS",
            format!("limit 必须在 1 到 {} 之间", MAX_PAGE_SIZE),
        ));
    }
    Ok((page, limit))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/history", get(history::list_history))
        .route(
            "/history/{id}",
            get(history::get_history).delete(history::delete_history),
        )
        .route("/insights/history", get(insights::insight_history))
        .route("/insights/detail/{id}", get(insights::insight_detail))
        .route("/analysis/save", post(analysis::save_analysis))
        .route("/analysis/quota", get(analysis::quota))
        .route("/articles", get(articles::list_articles))
        .route(
            "/articles/{id}",
            get(articles::get_article)
                .put(articles::update_article)
                .delete(articles::delete_article),
        )
        .route(
            "/articles/{id}/publish-records",
            get(articles::publish_records),
        )
        .route(
            "/publish-records/{id}/withdraw",
            post(articles::withdraw_publish_record),
        )
        .route("/content/save-to-publish", post(content::save_to_publish))
        .route("/content/generate", post(content::generate))
        .route("/content/regenerate-image", post(content::regenerate_image))
        .route("/wechat/accounts", get(wechat::accounts))
        .route("/wechat/publish", post(wechat::publish))
        .with_state(state)
}

/// Binds the listener and serves until the process is stopped.
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let app = create_router(state);
    let addr = format!("0.0.0.0:{}", port);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!(target: TARGET_WEB_REQUEST, "Server running on http://{}", addr);
    axum::serve(listener, app.into_make_service())
        .await
        .context("Server error")?;

    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Health {
    status: &'static str,
    database: bool,
    ai_enabled: bool,
    wechat_enabled: bool,
    version: &'static str,
}

async fn health(axum::extract::State(state): axum::extract::State<AppState>) -> ApiResult<Health> {
    let database = sqlx::query("SELECT 1").execute(state.db.pool()).await.is_ok();
    ok(Health {
        status: if database { "ok" } else { "degraded" },
        database,
        ai_enabled: state.llm.is_some(),
        wechat_enabled: state.wechat.is_configured(),
        version: env!("CARGO_PKG_VERSION"),
    })
}
