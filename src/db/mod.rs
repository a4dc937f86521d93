mod article;
pub mod core;
mod history;
mod publish;
mod schema;

pub use self::article::{ArticleFilter, ArticleUpdate, NewArticle};
pub use self::core::Database;
pub use self::history::{HistoryFilter, HistoryListItem, NewAnalysis, NewSearchHistory};
pub use self::publish::NewPublishRecord;

/// Page of rows plus the total row count matching the filter.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

/// `LIKE` pattern matching `text` anywhere, with `%`, `_` and `\` taken literally.
/// Pair with `ESCAPE '\'`.
pub(crate) fn contains_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
