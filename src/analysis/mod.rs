//! Read-side views over persisted analysis rows.
//!
//! Analysis payloads are stored as independently nullable JSON text columns,
//! several of them under more than one historical name. The functions here turn
//! a raw row into a fully populated view; they never fail and never panic on
//! malformed data.

mod canonical;
mod insight_detail;

pub use canonical::{
    canonicalize, derive_top_article_insights, insight_count, AnalysisField, AnalysisMetadata,
    BasicStats, CompleteAnalysisResult, StructuredInfo, TopArticleInsight,
    AI_INSIGHTS_PRECEDENCE, RULE_INSIGHTS_PRECEDENCE, STRUCTURED_TOPIC_PRECEDENCE,
};
pub use insight_detail::{collect_keywords, normalize_insights, InsightDetail};
