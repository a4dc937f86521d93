use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;
use std::fmt;
use thiserror::Error;

/// Raised when a persisted or requested enum value is not recognised.
#[derive(Debug, Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Implements the string mapping used for both TEXT columns and request parameters.
macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            pub fn parse(value: &str) -> Result<Self, UnknownVariant> {
                match value.trim().to_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(UnknownVariant {
                        kind: $kind,
                        value: value.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl TryFrom<String> for $name {
            type Error = UnknownVariant;

            fn try_from(value: String) -> Result<Self, UnknownVariant> {
                $name::parse(&value)
            }
        }
    };
}

/// Source platform a search was run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    Wechat,
    Xiaohongshu,
}

text_enum!(SearchType, "search type", {
    Wechat => "wechat",
    Xiaohongshu => "xiaohongshu",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStatus {
    Pending,
    Completed,
    Error,
}

text_enum!(SearchStatus, "search status", {
    Pending => "pending",
    Completed => "completed",
    Error => "error",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    Draft,
    Pending,
    Published,
    Withdrawn,
}

text_enum!(ArticleStatus, "article status", {
    Draft => "draft",
    Pending => "pending",
    Published => "published",
    Withdrawn => "withdrawn",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    Pending,
    Published,
    Failed,
    Withdrawn,
}

text_enum!(PublishStatus, "publish status", {
    Pending => "pending",
    Published => "published",
    Failed => "failed",
    Withdrawn => "withdrawn",
});

/// One keyword search against a platform.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SearchHistory {
    pub id: i64,
    #[serde(rename = "type")]
    #[sqlx(rename = "type", try_from = "String")]
    pub search_type: SearchType,
    pub keyword: String,
    pub search_time: String,
    pub article_count: i64,
    pub avg_read: f64,
    pub avg_like: f64,
    pub original_rate: f64,
    pub avg_interaction: f64,
    #[sqlx(try_from = "String")]
    pub status: SearchStatus,
    pub error_message: Option<String>,
    pub duration: Option<i64>,
}

/// Raw analysis row; JSON columns are still serialized text and may be malformed.
#[derive(Debug, Clone, Default, FromRow)]
pub struct AnalysisResultRow {
    pub id: i64,
    pub search_history_id: i64,
    pub word_cloud: Option<String>,
    pub all_articles: Option<String>,
    pub top_liked_articles: Option<String>,
    pub top_interaction_articles: Option<String>,
    pub ai_summaries: Option<String>,
    pub structured_info: Option<String>,
    pub ai_insights: Option<String>,
    pub ai_generated_insights: Option<String>,
    pub rule_based_insights: Option<String>,
    pub rule_insights: Option<String>,
    pub structured_topic_insights: Option<String>,
    pub analysis_version: Option<String>,
    pub ai_model_used: Option<String>,
    pub processing_time: Option<i64>,
    pub ai_analysis_status: Option<String>,
    pub created_at: String,
}

/// A generated, publishable piece of content.
#[derive(Debug, Clone, FromRow)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub html_content: Option<String>,
    pub plain_content: String,
    pub summary: Option<String>,
    pub platform: String,
    pub style: String,
    pub length: Option<String>,
    pub target_platforms: String,
    #[sqlx(try_from = "String")]
    pub status: ArticleStatus,
    pub has_images: bool,
    pub image_config: Option<String>,
    pub sections: Option<String>,
    pub estimated_reading_time: Option<i64>,
    pub insight_id: Option<String>,
    pub custom_instructions: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Article {
    /// Response shape with JSON columns expanded in place.
    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "title": self.title,
            "content": self.content,
            "htmlContent": self.html_content,
            "plainContent": self.plain_content,
            "summary": self.summary,
            "platform": self.platform,
            "style": self.style,
            "length": self.length,
            "targetPlatforms": parse_json_column(Some(&self.target_platforms))
                .unwrap_or_else(|| json!([])),
            "status": self.status,
            "hasImages": self.has_images,
            "imageConfig": parse_json_column(self.image_config.as_deref()),
            "sections": parse_json_column(self.sections.as_deref()),
            "estimatedReadingTime": self.estimated_reading_time,
            "insightId": self.insight_id,
            "customInstructions": self.custom_instructions,
            "createdAt": self.created_at,
            "updatedAt": self.updated_at,
        })
    }
}

/// One attempt to publish an article to one platform.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PublishRecord {
    pub id: i64,
    pub article_id: i64,
    pub platform: String,
    #[sqlx(try_from = "String")]
    pub status: PublishStatus,
    pub published_url: Option<String>,
    pub published_at: Option<String>,
    pub withdrawn_at: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: i64,
    #[serde(skip)]
    pub platform_data: Option<String>,
    pub created_at: String,
}

fn parse_json_column(raw: Option<&str>) -> Option<Value> {
    raw.and_then(|text| serde_json::from_str(text).ok())
}
