use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::TARGET_ANALYSIS;
use crate::types::{AnalysisResultRow, SearchHistory};
use crate::util::truncate_chars;

pub const UNKNOWN_TITLE: &str = "未知标题";
pub const DEFAULT_ENGAGEMENT: &str = "medium";
const SUMMARY_CHARS: usize = 200;

/// JSON text columns of an analysis row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisField {
    WordCloud,
    AllArticles,
    TopLikedArticles,
    TopInteractionArticles,
    AiSummaries,
    StructuredInfo,
    AiInsights,
    AiGeneratedInsights,
    RuleBasedInsights,
    RuleInsights,
    StructuredTopicInsights,
}

impl AnalysisField {
    pub fn name(self) -> &'static str {
        match self {
            AnalysisField::WordCloud => "wordCloud",
            AnalysisField::AllArticles => "allArticles",
            AnalysisField::TopLikedArticles => "topLikedArticles",
            AnalysisField::TopInteractionArticles => "topInteractionArticles",
            AnalysisField::AiSummaries => "aiSummaries",
            AnalysisField::StructuredInfo => "structuredInfo",
            AnalysisField::AiInsights => "aiInsights",
            AnalysisField::AiGeneratedInsights => "aiGeneratedInsights",
            AnalysisField::RuleBasedInsights => "ruleBasedInsights",
            AnalysisField::RuleInsights => "ruleInsights",
            AnalysisField::StructuredTopicInsights => "structuredTopicInsights",
        }
    }

    /// Raw serialized text of this field, if the column is set.
    pub fn raw(self, row: &AnalysisResultRow) -> Option<&str> {
        let column = match self {
            AnalysisField::WordCloud => &row.word_cloud,
            AnalysisField::AllArticles => &row.all_articles,
            AnalysisField::TopLikedArticles => &row.top_liked_articles,
            AnalysisField::TopInteractionArticles => &row.top_interaction_articles,
            AnalysisField::AiSummaries => &row.ai_summaries,
            AnalysisField::StructuredInfo => &row.structured_info,
            AnalysisField::AiInsights => &row.ai_insights,
            AnalysisField::AiGeneratedInsights => &row.ai_generated_insights,
            AnalysisField::RuleBasedInsights => &row.rule_based_insights,
            AnalysisField::RuleInsights => &row.rule_insights,
            AnalysisField::StructuredTopicInsights => &row.structured_topic_insights,
        };
        column.as_deref()
    }
}

/// Sources for `aiInsights`, current name first.
pub const AI_INSIGHTS_PRECEDENCE: &[AnalysisField] =
    &[AnalysisField::AiInsights, AnalysisField::AiGeneratedInsights];

/// Sources for `ruleInsights`, current name first.
pub const RULE_INSIGHTS_PRECEDENCE: &[AnalysisField] =
    &[AnalysisField::RuleBasedInsights, AnalysisField::RuleInsights];

/// Sources for `structuredTopicInsights`.
pub const STRUCTURED_TOPIC_PRECEDENCE: &[AnalysisField] = &[
    AnalysisField::StructuredTopicInsights,
    AnalysisField::AiGeneratedInsights,
    AnalysisField::AiInsights,
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicStats {
    pub avg_read: f64,
    pub avg_like: f64,
    pub original_rate: f64,
    pub avg_interaction: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredInfo {
    pub keywords: Vec<Value>,
    pub topics: Vec<Value>,
    pub entities: Vec<Value>,
    pub sentiments: Vec<Value>,
    pub content_types: Vec<Value>,
    pub audiences: Vec<Value>,
    pub trends: Vec<Value>,
}

impl StructuredInfo {
    fn from_value(value: Option<Value>) -> Self {
        let Some(Value::Object(map)) = value else {
            return StructuredInfo::default();
        };
        let list = |key: &str| array_or_empty(map.get(key));
        StructuredInfo {
            keywords: list("keywords"),
            topics: list("topics"),
            entities: list("entities"),
            sentiments: list("sentiments"),
            content_types: list("contentTypes"),
            audiences: list("audiences"),
            trends: list("trends"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopArticleInsight {
    pub article_id: String,
    pub title: String,
    pub summary: String,
    pub key_points: Vec<Value>,
    pub highlights: Vec<Value>,
    pub target_audience: Vec<Value>,
    pub content_strategy: Vec<Value>,
    pub keywords: Vec<Value>,
    pub engagement_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetadata {
    pub model_used: String,
    pub processing_time: i64,
    pub analysis_version: String,
    pub timestamp: String,
}

/// Fully defaulted, precedence-resolved view of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteAnalysisResult {
    pub keyword: String,
    pub total_articles: i64,
    pub processed_articles: i64,
    pub basic_stats: BasicStats,
    pub word_cloud: Vec<Value>,
    pub top_article_insights: Vec<TopArticleInsight>,
    pub structured_topic_insights: Vec<Value>,
    pub ai_summaries: Vec<Value>,
    pub ai_insights: Vec<Value>,
    pub structured_info: StructuredInfo,
    pub rule_insights: Vec<Value>,
    pub metadata: AnalysisMetadata,
}

/// Builds the canonical view of a history row and its analysis.
///
/// Returns `None` when the history has no analysis yet. Each JSON column is
/// parsed on its own; a malformed column falls back to its default and is
/// logged without affecting the others.
pub fn canonicalize(
    history: &SearchHistory,
    result: Option<&AnalysisResultRow>,
) -> Option<CompleteAnalysisResult> {
    let row = result?;

    let all_articles = parse_array(row, AnalysisField::AllArticles);
    let top_liked = parse_array(row, AnalysisField::TopLikedArticles);

    Some(CompleteAnalysisResult {
        keyword: history.keyword.clone(),
        total_articles: history.article_count,
        processed_articles: all_articles.len() as i64,
        basic_stats: BasicStats {
            avg_read: history.avg_read,
            avg_like: history.avg_like,
            original_rate: history.original_rate,
            avg_interaction: history.avg_interaction,
        },
        word_cloud: parse_array(row, AnalysisField::WordCloud),
        top_article_insights: derive_top_article_insights(&top_liked),
        structured_topic_insights: resolve_array(row, STRUCTURED_TOPIC_PRECEDENCE),
        ai_summaries: parse_array(row, AnalysisField::AiSummaries),
        ai_insights: resolve_array(row, AI_INSIGHTS_PRECEDENCE),
        structured_info: StructuredInfo::from_value(parse_field(row, AnalysisField::StructuredInfo)),
        rule_insights: resolve_array(row, RULE_INSIGHTS_PRECEDENCE),
        metadata: AnalysisMetadata {
            model_used: non_empty(row.ai_model_used.as_deref()).unwrap_or("unknown").to_string(),
            processing_time: row.processing_time.unwrap_or(0),
            analysis_version: non_empty(row.analysis_version.as_deref())
                .unwrap_or("1.0")
                .to_string(),
            timestamp: row.created_at.clone(),
        },
    })
}

/// Number of structured topic insights after precedence resolution.
pub fn insight_count(row: &AnalysisResultRow) -> usize {
    resolve_array(row, STRUCTURED_TOPIC_PRECEDENCE).len()
}

/// Per-article insight cards for the most liked articles.
pub fn derive_top_article_insights(articles: &[Value]) -> Vec<TopArticleInsight> {
    let empty = Map::new();
    articles
        .iter()
        .enumerate()
        .map(|(index, article)| {
            let fields = article.as_object().unwrap_or(&empty);
            let text = |key: &str| non_empty(fields.get(key).and_then(Value::as_str));

            let article_id = fields
                .get("articleId")
                .or_else(|| fields.get("id"))
                .and_then(id_to_string)
                .unwrap_or_else(|| format!("article_{}", index));
            let summary = text("summary")
                .map(str::to_string)
                .or_else(|| text("content").map(|c| truncate_chars(c, SUMMARY_CHARS)))
                .unwrap_or_default();

            TopArticleInsight {
                article_id,
                title: text("title").unwrap_or(UNKNOWN_TITLE).to_string(),
                summary,
                key_points: array_or_empty(fields.get("keyPoints")),
                highlights: array_or_empty(fields.get("highlights")),
                target_audience: array_or_empty(fields.get("targetAudience")),
                content_strategy: array_or_empty(fields.get("contentStrategy")),
                keywords: array_or_empty(fields.get("keywords")),
                engagement_level: text("engagementLevel")
                    .unwrap_or(DEFAULT_ENGAGEMENT)
                    .to_string(),
            }
        })
        .collect()
}

/// First non-empty array among `chain`, in order.
fn resolve_array(row: &AnalysisResultRow, chain: &[AnalysisField]) -> Vec<Value> {
    chain
        .iter()
        .map(|field| parse_array(row, *field))
        .find(|items| !items.is_empty())
        .unwrap_or_default()
}

fn parse_array(row: &AnalysisResultRow, field: AnalysisField) -> Vec<Value> {
    match parse_field(row, field) {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            warn!(
                target: TARGET_ANALYSIS,
                "analysis {} field {} is not an array (found {}), using []",
                row.id,
                field.name(),
                json_kind(&other)
            );
            Vec::new()
        }
    }
}

fn parse_field(row: &AnalysisResultRow, field: AnalysisField) -> Option<Value> {
    let raw = field.raw(row)?;
    if raw.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(
                target: TARGET_ANALYSIS,
                "analysis {} field {} is not valid JSON, using default: {}",
                row.id,
                field.name(),
                err
            );
            None
        }
    }
}

fn array_or_empty(value: Option<&Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SearchStatus, SearchType};
    use serde_json::json;

    fn history() -> SearchHistory {
        SearchHistory {
            id: 7,
            search_type: SearchType::Wechat,
            keyword: "测试".to_string(),
            search_time: "2024-05-01T10:00:00.000Z".to_string(),
            article_count: 25,
            avg_read: 1200.5,
            avg_like: 33.0,
            original_rate: 0.4,
            avg_interaction: 0.0,
            status: SearchStatus::Completed,
            error_message: None,
            duration: Some(1500),
        }
    }

    fn row() -> AnalysisResultRow {
        AnalysisResultRow {
            id: 3,
            search_history_id: 7,
            created_at: "2024-05-01T10:00:02.000Z".to_string(),
            ..Default::default()
        }
    }

    fn text(value: Value) -> Option<String> {
        Some(value.to_string())
    }

    #[test]
    fn test_missing_result_yields_none() {
        assert!(canonicalize(&history(), None).is_none());
    }

    #[test]
    fn test_empty_row_is_fully_defaulted() {
        let result = canonicalize(&history(), Some(&row())).unwrap();
        assert_eq!(result.keyword, "测试");
        assert_eq!(result.total_articles, 25);
        assert_eq!(result.processed_articles, 0);
        assert_eq!(result.basic_stats.avg_read, 1200.5);
        assert_eq!(result.basic_stats.avg_interaction, 0.0);
        assert!(result.word_cloud.is_empty());
        assert!(result.ai_insights.is_empty());
        assert!(result.rule_insights.is_empty());
        assert!(result.structured_topic_insights.is_empty());
        assert_eq!(result.structured_info, StructuredInfo::default());
        assert_eq!(result.metadata.model_used, "unknown");
        assert_eq!(result.metadata.processing_time, 0);
        assert_eq!(result.metadata.analysis_version, "1.0");
        assert_eq!(result.metadata.timestamp, "2024-05-01T10:00:02.000Z");
    }

    #[test]
    fn test_malformed_field_does_not_affect_others() {
        let mut row = row();
        row.word_cloud = Some("[{\"word\": \"测试\"".to_string());
        row.structured_info = Some("not json".to_string());
        row.all_articles = text(json!([{"title": "a"}, {"title": "b"}]));
        row.ai_summaries = text(json!(["summary"]));
        row.ai_model_used = Some("gpt-4o".to_string());

        let result = canonicalize(&history(), Some(&row)).unwrap();
        assert!(result.word_cloud.is_empty());
        assert_eq!(result.structured_info, StructuredInfo::default());
        assert_eq!(result.processed_articles, 2);
        assert_eq!(result.ai_summaries, vec![json!("summary")]);
        assert_eq!(result.metadata.model_used, "gpt-4o");
    }

    #[test]
    fn test_non_array_payload_defaults_to_empty() {
        let mut row = row();
        row.word_cloud = text(json!({"word": "x"}));
        row.ai_insights = text(json!("just a string"));
        let result = canonicalize(&history(), Some(&row)).unwrap();
        assert!(result.word_cloud.is_empty());
        assert!(result.ai_insights.is_empty());
    }

    #[test]
    fn test_ai_insights_prefers_current_field() {
        let mut row = row();
        row.ai_insights = text(json!([{"title": "current"}]));
        row.ai_generated_insights = text(json!([{"title": "legacy"}, {"title": "legacy 2"}]));
        let result = canonicalize(&history(), Some(&row)).unwrap();
        assert_eq!(result.ai_insights, vec![json!({"title": "current"})]);
    }

    #[test]
    fn test_ai_insights_falls_back_to_legacy() {
        let mut row = row();
        row.ai_insights = Some("[]".to_string());
        row.ai_generated_insights = text(json!([{"title": "legacy"}]));
        let result = canonicalize(&history(), Some(&row)).unwrap();
        assert_eq!(result.ai_insights, vec![json!({"title": "legacy"})]);
    }

    #[test]
    fn test_rule_insights_precedence() {
        let mut row = row();
        row.rule_based_insights = text(json!(["rule based"]));
        row.rule_insights = text(json!(["legacy rule"]));
        let result = canonicalize(&history(), Some(&row)).unwrap();
        assert_eq!(result.rule_insights, vec![json!("rule based")]);

        row.rule_based_insights = Some("{broken".to_string());
        let result = canonicalize(&history(), Some(&row)).unwrap();
        assert_eq!(result.rule_insights, vec![json!("legacy rule")]);
    }

    #[test]
    fn test_structured_topic_precedence_chain() {
        let mut row = row();
        row.ai_insights = text(json!([{"title": "ai"}]));
        let result = canonicalize(&history(), Some(&row)).unwrap();
        assert_eq!(result.structured_topic_insights, vec![json!({"title": "ai"})]);

        row.ai_generated_insights = text(json!([{"title": "generated"}]));
        let result = canonicalize(&history(), Some(&row)).unwrap();
        assert_eq!(
            result.structured_topic_insights,
            vec![json!({"title": "generated"})]
        );

        row.structured_topic_insights = text(json!([{"title": "topic"}]));
        let result = canonicalize(&history(), Some(&row)).unwrap();
        assert_eq!(result.structured_topic_insights, vec![json!({"title": "topic"})]);
        assert_eq!(insight_count(&row), 1);
    }

    #[test]
    fn test_structured_info_fields() {
        let mut row = row();
        row.structured_info = text(json!({
            "keywords": ["a", "b"],
            "topics": "not an array",
            "contentTypes": [{"type": "guide"}],
        }));
        let info = canonicalize(&history(), Some(&row)).unwrap().structured_info;
        assert_eq!(info.keywords, vec![json!("a"), json!("b")]);
        assert!(info.topics.is_empty());
        assert_eq!(info.content_types, vec![json!({"type": "guide"})]);
        assert!(info.trends.is_empty());
    }

    #[test]
    fn test_top_article_insights_defaults() {
        let long_content = "内".repeat(250);
        let articles = vec![
            json!({"title": "第一篇", "summary": "概要", "keyPoints": ["k"], "engagementLevel": "high"}),
            json!({"id": 99, "content": long_content, "highlights": "not array"}),
            json!("not an object"),
        ];
        let insights = derive_top_article_insights(&articles);
        assert_eq!(insights.len(), 3);

        assert_eq!(insights[0].article_id, "article_0");
        assert_eq!(insights[0].title, "第一篇");
        assert_eq!(insights[0].summary, "概要");
        assert_eq!(insights[0].key_points, vec![json!("k")]);
        assert_eq!(insights[0].engagement_level, "high");

        assert_eq!(insights[1].article_id, "99");
        assert_eq!(insights[1].title, UNKNOWN_TITLE);
        assert_eq!(insights[1].summary.chars().count(), 200);
        assert!(insights[1].highlights.is_empty());
        assert_eq!(insights[1].engagement_level, "medium");

        assert_eq!(insights[2].article_id, "article_2");
        assert_eq!(insights[2].summary, "");
    }

    #[test]
    fn test_top_article_insights_is_pure() {
        let articles = vec![
            json!({"title": "a", "content": "正文"}),
            json!({"articleId": "x1", "keywords": ["k1", "k2"]}),
        ];
        assert_eq!(
            derive_top_article_insights(&articles),
            derive_top_article_insights(&articles)
        );
    }

    #[test]
    fn test_serialized_shape_uses_camel_case() {
        let mut row = row();
        row.top_liked_articles = text(json!([{"title": "t"}]));
        let value = serde_json::to_value(canonicalize(&history(), Some(&row)).unwrap()).unwrap();
        assert!(value.get("topArticleInsights").is_some());
        assert!(value["basicStats"].get("avgInteraction").is_some());
        assert!(value["structuredInfo"].get("contentTypes").is_some());
        assert_eq!(value["metadata"]["modelUsed"], "unknown");
        assert_eq!(value["topArticleInsights"][0]["articleId"], "article_0");
    }
}
