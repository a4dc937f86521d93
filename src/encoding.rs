//! Repair of text that was UTF-8 encoded, decoded as Windows-1252 and then
//! stored again as UTF-8.
//!
//! The table is a closed list covering the words and punctuation observed in
//! corrupted rows. It is not a general decoder: sequences that are not listed
//! pass through unchanged.

use serde_json::Value;

/// Mis-decoded sequence and the text it should have been.
///
/// Every replacement is CJK text or CJK/typographic punctuation, none of which
/// appears in any search pattern, so repairing twice equals repairing once.
const REPAIRS: &[(&str, &str)] = &[
    ("æµ‹è¯•", "测试"),
    ("å†…å®¹", "内容"),
    ("æ–‡ç«\u{a0}", "文章"),
    ("æ´žå¯Ÿ", "洞察"),
    ("å¾®ä¿¡", "微信"),
    ("æ\u{a0}‡é¢˜", "标题"),
    ("çƒ\u{ad}é—¨", "热门"),
    ("é˜…è¯»", "阅读"),
    ("ç‚¹èµž", "点赞"),
    ("ç”¨æˆ·", "用户"),
    ("ç\u{ad}–ç•¥", "策略"),
    ("å·¥åŽ‚", "工厂"),
    ("å›¾ç‰‡", "图片"),
    ("æ™ºèƒ½", "智能"),
    ("æ€»ç»“", "总结"),
    ("è¶‹åŠ¿", "趋势"),
    ("æ–¹æ³•", "方法"),
    ("æŠ€å·§", "技巧"),
    ("ï¼Œ", "，"),
    ("ã€‚", "。"),
    ("ï¼š", "："),
    ("ï¼Ÿ", "？"),
    ("ï¼ˆ", "（"),
    ("ï¼‰", "）"),
    ("ã€Š", "《"),
    ("ã€‹", "》"),
    ("â€œ", "\u{201c}"),
    ("â€˜", "\u{2018}"),
    ("â€™", "\u{2019}"),
    ("â€”", "\u{2014}"),
    ("â€¦", "\u{2026}"),
];

/// Rewrites known mis-decoded sequences in a single string.
pub fn repair_text(text: &str) -> String {
    // Every mis-decoded sequence begins with a character in U+00E0..=U+00EF.
    if !text.chars().any(|c| ('\u{e0}'..='\u{ef}').contains(&c)) {
        return text.to_string();
    }
    REPAIRS
        .iter()
        .fold(text.to_string(), |acc, (broken, fixed)| {
            if acc.contains(broken) {
                acc.replace(broken, fixed)
            } else {
                acc
            }
        })
}

/// Applies [`repair_text`] to every string leaf of a JSON value.
///
/// Object keys and non-string leaves are left untouched.
pub fn repair_value(value: &Value) -> Value {
    match value {
        Value::String(text) => Value::String(repair_text(text)),
        Value::Array(items) => Value::Array(items.iter().map(repair_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), repair_value(item)))
                .collect(),
        ),
        other => other.clone(),
    }
}
