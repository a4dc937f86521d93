use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{error, info};

use super::{ok, ApiError, ApiResult, AppState};
use crate::db::NewArticle;
use crate::image::{GeneratedImage, ImageRequest};
use crate::llm::split_generated_article;
use crate::prompts::{article_generation_prompt, ArticleBrief, WRITER_SYSTEM};
use crate::types::ArticleStatus;
use crate::TARGET_WEB_REQUEST;

const DEFAULT_IMAGE_WIDTH: u32 = 900;
const DEFAULT_IMAGE_HEIGHT: u32 = 500;

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, ApiError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::missing(format!("缺少必要参数: {}", name)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveToPublishRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub html_content: Option<String>,
    pub summary: Option<String>,
    pub platform: Option<String>,
    pub style: Option<String>,
    pub length: Option<String>,
    pub target_platforms: Option<Vec<String>>,
    #[serde(default)]
    pub has_images: bool,
    pub image_config: Option<Value>,
    pub sections: Option<Value>,
    pub insight_id: Option<String>,
    pub custom_instructions: Option<String>,
}

/// Stores a finished article as `pending`, ready for publishing.
pub async fn save_to_publish(
    State(state): State<AppState>,
    body: Result<Json<SaveToPublishRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = body?;
    let title = required(&body.title, "title")?;
    let content = required(&body.content, "content")?;
    let platform = required(&body.platform, "platform")?;
    let style = required(&body.style, "style")?;

    let target_platforms = body
        .target_platforms
        .clone()
        .filter(|platforms| !platforms.is_empty())
        .unwrap_or_else(|| vec![platform.to_string()]);

    let article = state
        .db
        .create_article(&NewArticle {
            title: title.to_string(),
            content: content.to_string(),
            html_content: body.html_content.clone(),
            summary: body.summary.clone(),
            platform: platform.to_string(),
            style: style.to_string(),
            length: body.length.clone(),
            target_platforms,
            status: ArticleStatus::Pending,
            has_images: body.has_images,
            image_config: body.image_config.clone(),
            sections: body.sections.clone(),
            insight_id: body.insight_id.clone(),
            custom_instructions: body.custom_instructions.clone(),
        })
        .await?;

    info!(target: TARGET_WEB_REQUEST, "Saved article {} for publishing on {}", article.id, article.platform);
    ok(article.to_json())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub topic: Option<String>,
    /// An insight card from the insight detail view.
    pub insight: Option<Value>,
    pub insight_id: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub style: Option<String>,
    pub length: Option<String>,
    pub platform: Option<String>,
    pub custom_instructions: Option<String>,
    /// Also store the result as a pending article.
    #[serde(default)]
    pub save: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedContent {
    pub title: String,
    pub content: String,
    pub platform: String,
    pub style: String,
    pub length: Option<String>,
    pub model: String,
    pub article: Option<Value>,
}

fn insight_text<'a>(insight: Option<&'a Value>, key: &str) -> Option<&'a str> {
    insight
        .and_then(|insight| insight.get(key))
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
}

pub async fn generate(
    State(state): State<AppState>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> ApiResult<GeneratedContent> {
    let Json(body) = body?;
    let insight = body.insight.as_ref();
    let topic = body
        .topic
        .as_deref()
        .map(str::trim)
        .filter(|topic| !topic.is_empty())
        .or_else(|| insight_text(insight, "title"))
        .ok_or_else(|| ApiError::missing("缺少必要参数: topic"))?
        .to_string();
    let llm = state
        .llm
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("AI 服务未启用".to_string()))?;

    let style = body.style.clone().unwrap_or_else(|| "professional".to_string());
    let platform = body.platform.clone().unwrap_or_else(|| "wechat".to_string());
    let mut keywords = body.keywords.clone();
    if let Some(high_frequency) = insight
        .and_then(|insight| insight.pointer("/keywordAnalysis/highFrequency"))
        .and_then(Value::as_array)
    {
        keywords.extend(high_frequency.iter().filter_map(Value::as_str).map(str::to_string));
    }
    let mut seen = HashSet::new();
    keywords.retain(|keyword| seen.insert(keyword.clone()));

    let prompt = article_generation_prompt(&ArticleBrief {
        topic: &topic,
        core_finding: insight_text(insight, "coreFinding"),
        keywords: &keywords,
        style: &style,
        length: body.length.as_deref(),
        platform: &platform,
        custom_instructions: body.custom_instructions.as_deref(),
    });

    let text = llm.complete(WRITER_SYSTEM, &prompt).await.map_err(|err| {
        error!(target: TARGET_WEB_REQUEST, "Content generation for '{}' failed: {:?}", topic, err);
        ApiError::upstream(format!("AI 生成失败: {}", err))
    })?;
    let generated = split_generated_article(&text, &topic);

    let article = if body.save {
        let article = state
            .db
            .create_article(&NewArticle {
                title: generated.title.clone(),
                content: generated.content.clone(),
                html_content: None,
                summary: None,
                platform: platform.clone(),
                style: style.clone(),
                length: body.length.clone(),
                target_platforms: vec![platform.clone()],
                status: ArticleStatus::Pending,
                has_images: false,
                image_config: None,
                sections: None,
                insight_id: body
                    .insight_id
                    .clone()
                    .or_else(|| insight_text(insight, "id").map(str::to_string)),
                custom_instructions: body.custom_instructions.clone(),
            })
            .await?;
        Some(article.to_json())
    } else {
        None
    };

    info!(target: TARGET_WEB_REQUEST, "Generated {} article '{}' with {}", platform, generated.title, llm.model());
    ok(GeneratedContent {
        title: generated.title,
        content: generated.content,
        platform,
        style,
        length: body.length,
        model: llm.model().to_string(),
        article,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerateImageRequest {
    pub image_id: Option<String>,
    pub description: Option<String>,
    pub style: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Always answers with an image; failures come back as a tagged placeholder.
pub async fn regenerate_image(
    State(state): State<AppState>,
    body: Result<Json<RegenerateImageRequest>, JsonRejection>,
) -> ApiResult<GeneratedImage> {
    let Json(body) = body?;
    let image_id = required(&body.image_id, "imageId")?;
    let description = required(&body.description, "description")?;

    let request = ImageRequest {
        id: image_id.to_string(),
        prompt: description.to_string(),
        style: body.style.clone(),
        width: body.width.filter(|w| *w > 0).unwrap_or(DEFAULT_IMAGE_WIDTH),
        height: body.height.filter(|h| *h > 0).unwrap_or(DEFAULT_IMAGE_HEIGHT),
    };
    ok(state.images.generate(&request).await)
}
