use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashSet;

pub const UNTITLED_INSIGHT: &str = "未命名洞察";
pub const NO_CORE_FINDING: &str = "暂无核心发现";
const DEFAULT_DIFFICULTY: &str = "medium";
const DEFAULT_CONFIDENCE: f64 = 0.8;
const LIST_FIELDS: [&str; 4] = [
    "recommendedTopics",
    "contentStrategy",
    "targetAudience",
    "dataSupport",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightDetail {
    pub insights: Vec<Value>,
    pub all_keywords: Vec<String>,
}

impl InsightDetail {
    pub fn build(raw: &[Value], timestamp_ms: i64) -> Self {
        let insights = normalize_insights(raw, timestamp_ms);
        let all_keywords = collect_keywords(&insights);
        InsightDetail {
            insights,
            all_keywords,
        }
    }
}

/// Fills every insight with the fields the detail view relies on.
///
/// Unknown keys are kept as they are. List fields holding anything other than
/// an array are replaced with `[]`.
pub fn normalize_insights(raw: &[Value], timestamp_ms: i64) -> Vec<Value> {
    raw.iter()
        .enumerate()
        .map(|(index, insight)| {
            let mut fields: Map<String, Value> = insight.as_object().cloned().unwrap_or_default();

            if !has_value(fields.get("id")) {
                fields.insert(
                    "id".to_string(),
                    json!(format!("insight_{}_{}", timestamp_ms, index)),
                );
            }
            default_text(&mut fields, "title", UNTITLED_INSIGHT);
            default_text(&mut fields, "coreFinding", NO_CORE_FINDING);
            default_text(&mut fields, "difficulty", DEFAULT_DIFFICULTY);
            if !fields.get("confidence").is_some_and(Value::is_number) {
                fields.insert("confidence".to_string(), json!(DEFAULT_CONFIDENCE));
            }
            for key in LIST_FIELDS {
                if !fields.get(key).is_some_and(Value::is_array) {
                    fields.insert(key.to_string(), json!([]));
                }
            }

            Value::Object(fields)
        })
        .collect()
}

/// Union of every insight's high-frequency and missing keywords, first-seen order.
pub fn collect_keywords(insights: &[Value]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut keywords = Vec::new();

    for insight in insights {
        let Some(analysis) = insight.get("keywordAnalysis") else {
            continue;
        };
        for key in ["highFrequency", "missingKeywords"] {
            let Some(items) = analysis.get(key).and_then(Value::as_array) else {
                continue;
            };
            for keyword in items.iter().filter_map(Value::as_str) {
                let keyword = keyword.trim();
                if !keyword.is_empty() && seen.insert(keyword.to_string()) {
                    keywords.push(keyword.to_string());
                }
            }
        }
    }

    keywords
}

fn has_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

fn default_text(fields: &mut Map<String, Value>, key: &str, default: &str) {
    let present = matches!(fields.get(key), Some(Value::String(s)) if !s.trim().is_empty());
    if !present {
        fields.insert(key.to_string(), json!(default));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_insights_get_defaults() {
        let raw = vec![json!({}), json!(null), json!({"id": null, "title": ""})];
        let insights = normalize_insights(&raw, 1700000000000);

        for (index, insight) in insights.iter().enumerate() {
            assert_eq!(
                insight["id"],
                json!(format!("insight_1700000000000_{}", index))
            );
            assert_eq!(insight["title"], UNTITLED_INSIGHT);
            assert_eq!(insight["coreFinding"], NO_CORE_FINDING);
            assert_eq!(insight["difficulty"], "medium");
            assert_eq!(insight["confidence"], json!(0.8));
            for key in LIST_FIELDS {
                assert_eq!(insight[key], json!([]));
            }
        }
    }

    #[test]
    fn test_existing_values_are_kept() {
        let raw = vec![json!({
            "id": "abc",
            "title": "爆款选题",
            "coreFinding": "短标题点击率更高",
            "difficulty": "hard",
            "confidence": 0.65,
            "recommendedTopics": ["选题一"],
            "extra": {"kept": true},
        })];
        let insight = &normalize_insights(&raw, 1)[0];
        assert_eq!(insight["id"], "abc");
        assert_eq!(insight["title"], "爆款选题");
        assert_eq!(insight["difficulty"], "hard");
        assert_eq!(insight["confidence"], json!(0.65));
        assert_eq!(insight["recommendedTopics"], json!(["选题一"]));
        assert_eq!(insight["extra"], json!({"kept": true}));
    }

    #[test]
    fn test_non_array_lists_are_discarded_not_wrapped() {
        let raw = vec![json!({
            "recommendedTopics": "single topic",
            "contentStrategy": {"a": 1},
            "targetAudience": 3,
            "dataSupport": null,
        })];
        let insight = &normalize_insights(&raw, 1)[0];
        assert_eq!(insight["recommendedTopics"], json!([]));
        assert_eq!(insight["contentStrategy"], json!([]));
        assert_eq!(insight["targetAudience"], json!([]));
        assert_eq!(insight["dataSupport"], json!([]));
    }

    #[test]
    fn test_numeric_id_is_kept() {
        let insight = &normalize_insights(&[json!({"id": 12})], 5)[0];
        assert_eq!(insight["id"], json!(12));
    }

    #[test]
    fn test_collect_keywords_dedupes_in_first_seen_order() {
        let insights = vec![
            json!({"keywordAnalysis": {"highFrequency": ["护肤", "早C晚A"], "missingKeywords": ["成分"]}}),
            json!({"keywordAnalysis": {"highFrequency": ["成分", " 护肤 ", 3], "missingKeywords": "bad"}}),
            json!({"title": "no analysis"}),
            json!({"keywordAnalysis": {"missingKeywords": ["平价", ""]}}),
        ];
        assert_eq!(
            collect_keywords(&insights),
            vec!["护肤", "早C晚A", "成分", "平价"]
        );
    }

    #[test]
    fn test_build_detail() {
        let detail = InsightDetail::build(
            &[json!({"keywordAnalysis": {"highFrequency": ["a"]}})],
            42,
        );
        assert_eq!(detail.insights.len(), 1);
        assert_eq!(detail.all_keywords, vec!["a"]);
        let value = serde_json::to_value(&detail).unwrap();
        assert!(value.get("allKeywords").is_some());
    }
}
