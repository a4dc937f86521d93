use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite};
use std::collections::HashMap;
use tracing::{debug, error, info, instrument};

use super::core::Database;
use super::{contains_pattern, Page};
use crate::types::{AnalysisResultRow, SearchHistory, SearchStatus, SearchType};
use crate::util::now_timestamp;
use crate::TARGET_DB;

pub struct NewSearchHistory {
    pub search_type: SearchType,
    pub keyword: String,
    pub article_count: i64,
    pub avg_read: f64,
    pub avg_like: f64,
    pub original_rate: f64,
    pub avg_interaction: f64,
    pub status: SearchStatus,
    pub error_message: Option<String>,
    pub duration: Option<i64>,
}

/// Analysis payload to persist. Values are serialized to JSON text on insert;
/// only the current field names are ever written.
#[derive(Default)]
pub struct NewAnalysis {
    pub word_cloud: Option<Value>,
    pub all_articles: Option<Value>,
    pub top_liked_articles: Option<Value>,
    pub top_interaction_articles: Option<Value>,
    pub ai_summaries: Option<Value>,
    pub structured_info: Option<Value>,
    pub ai_insights: Option<Value>,
    pub rule_based_insights: Option<Value>,
    pub structured_topic_insights: Option<Value>,
    pub analysis_version: Option<String>,
    pub ai_model_used: Option<String>,
    pub processing_time: Option<i64>,
    pub ai_analysis_status: Option<String>,
}

pub struct HistoryFilter {
    pub search_type: Option<SearchType>,
    pub keyword: Option<String>,
    pub page: i64,
    pub limit: i64,
}

/// A history row with its analysis, if any.
#[derive(Debug, Clone)]
pub struct HistoryListItem {
    pub history: SearchHistory,
    pub result: Option<AnalysisResultRow>,
}

impl Database {
    /// Inserts a search and its analysis in one transaction. Returns `(history_id, result_id)`.
    #[instrument(target = "db", level = "info", skip(self, history, analysis), fields(keyword = %history.keyword))]
    pub async fn save_analysis(
        &self,
        history: &NewSearchHistory,
        analysis: &NewAnalysis,
    ) -> Result<(i64, i64), sqlx::Error> {
        let now = now_timestamp();
        let mut tx = self.pool().begin().await?;

        let (history_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO search_history (type, keyword, search_time, article_count, avg_read, avg_like, original_rate, avg_interaction, status, error_message, duration)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            RETURNING id
            "#,
        )
        .bind(history.search_type.as_str())
        .bind(&history.keyword)
        .bind(&now)
        .bind(history.article_count)
        .bind(history.avg_read)
        .bind(history.avg_like)
        .bind(history.original_rate)
        .bind(history.avg_interaction)
        .bind(history.status.as_str())
        .bind(&history.error_message)
        .bind(history.duration)
        .fetch_one(&mut *tx)
        .await?;

        let (result_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO analysis_results (search_history_id, word_cloud, all_articles, top_liked_articles, top_interaction_articles, ai_summaries, structured_info, ai_insights, rule_based_insights, structured_topic_insights, analysis_version, ai_model_used, processing_time, ai_analysis_status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            RETURNING id
            "#,
        )
        .bind(history_id)
        .bind(to_json_text(&analysis.word_cloud))
        .bind(to_json_text(&analysis.all_articles))
        .bind(to_json_text(&analysis.top_liked_articles))
        .bind(to_json_text(&analysis.top_interaction_articles))
        .bind(to_json_text(&analysis.ai_summaries))
        .bind(to_json_text(&analysis.structured_info))
        .bind(to_json_text(&analysis.ai_insights))
        .bind(to_json_text(&analysis.rule_based_insights))
        .bind(to_json_text(&analysis.structured_topic_insights))
        .bind(&analysis.analysis_version)
        .bind(&analysis.ai_model_used)
        .bind(analysis.processing_time)
        .bind(&analysis.ai_analysis_status)
        .bind(&now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(target: TARGET_DB, "Saved search history {} with analysis {}", history_id, result_id);
        Ok((history_id, result_id))
    }

    #[instrument(target = "db", level = "info", skip(self, filter))]
    pub async fn list_history(
        &self,
        filter: &HistoryFilter,
    ) -> Result<Page<HistoryListItem>, sqlx::Error> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM search_history");
        push_history_filter(&mut count, filter);
        let (total,): (i64,) = count.build_query_as().fetch_one(self.pool()).await?;

        let mut select = QueryBuilder::<Sqlite>::new("SELECT * FROM search_history");
        push_history_filter(&mut select, filter);
        select
            .push(" ORDER BY search_time DESC, id DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind((filter.page - 1) * filter.limit);
        let histories: Vec<SearchHistory> =
            select.build_query_as().fetch_all(self.pool()).await?;

        let mut results = self.results_for(&histories).await?;
        let items = histories
            .into_iter()
            .map(|history| {
                let result = results.remove(&history.id);
                HistoryListItem { history, result }
            })
            .collect();

        debug!(target: TARGET_DB, "Listed history page {} ({} total)", filter.page, total);
        Ok(Page { items, total })
    }

    pub async fn get_history(&self, id: i64) -> Result<Option<SearchHistory>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM search_history WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.pool())
            .await
    }

    pub async fn get_analysis_for_history(
        &self,
        history_id: i64,
    ) -> Result<Option<AnalysisResultRow>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM analysis_results WHERE search_history_id = ?1")
            .bind(history_id)
            .fetch_optional(self.pool())
            .await
    }

    /// Deletes a search; its analysis goes with it. Returns false if nothing matched.
    #[instrument(target = "db", level = "info", skip(self))]
    pub async fn delete_history(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM search_history WHERE id = ?1")
            .bind(id)
            .execute(self.pool())
            .await;

        match result {
            Ok(done) => {
                debug!(target: TARGET_DB, "Deleted search history {}: {} rows", id, done.rows_affected());
                Ok(done.rows_affected() > 0)
            }
            Err(err) => {
                error!(target: TARGET_DB, "Failed to delete search history {}: {:?}", id, err);
                Err(err)
            }
        }
    }

    /// Completed searches since `since` (inclusive) that have an analysis, newest first.
    #[instrument(target = "db", level = "info", skip(self))]
    pub async fn recent_completed_analyses(
        &self,
        since: &str,
        search_type: Option<SearchType>,
    ) -> Result<Vec<(SearchHistory, AnalysisResultRow)>, sqlx::Error> {
        let mut select = QueryBuilder::<Sqlite>::new(
            "SELECT h.* FROM search_history h \
             WHERE EXISTS (SELECT 1 FROM analysis_results r WHERE r.search_history_id = h.id) \
             AND h.status = ",
        );
        select
            .push_bind(SearchStatus::Completed.as_str())
            .push(" AND h.search_time >= ")
            .push_bind(since);
        if let Some(search_type) = search_type {
            select.push(" AND h.type = ").push_bind(search_type.as_str());
        }
        select.push(" ORDER BY h.search_time DESC, h.id DESC");

        let histories: Vec<SearchHistory> =
            select.build_query_as().fetch_all(self.pool()).await?;
        let mut results = self.results_for(&histories).await?;

        Ok(histories
            .into_iter()
            .filter_map(|history| {
                let result = results.remove(&history.id)?;
                Some((history, result))
            })
            .collect())
    }

    /// Number of searches recorded at or after `since`.
    pub async fn count_history_since(&self, since: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM search_history WHERE search_time >= ?1")
            .bind(since)
            .fetch_one(self.pool())
            .await
    }

    async fn results_for(
        &self,
        histories: &[SearchHistory],
    ) -> Result<HashMap<i64, AnalysisResultRow>, sqlx::Error> {
        if histories.is_empty() {
            return Ok(HashMap::new());
        }

        let mut select = QueryBuilder::<Sqlite>::new(
            "SELECT * FROM analysis_results WHERE search_history_id IN (",
        );
        let mut ids = select.separated(", ");
        for history in histories {
            ids.push_bind(history.id);
        }
        ids.push_unseparated(")");

        let rows: Vec<AnalysisResultRow> = select.build_query_as().fetch_all(self.pool()).await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.search_history_id, row))
            .collect())
    }
}

fn push_history_filter<'a>(query: &mut QueryBuilder<'a, Sqlite>, filter: &'a HistoryFilter) {
    let mut joiner = " WHERE ";
    if let Some(search_type) = filter.search_type {
        query.push(joiner).push("type = ").push_bind(search_type.as_str());
        joiner = " AND ";
    }
    if let Some(keyword) = filter.keyword.as_deref() {
        query
            .push(joiner)
            .push("keyword LIKE ")
            .push_bind(contains_pattern(keyword))
            .push(r" ESCAPE '\'");
    }
}

fn to_json_text(value: &Option<Value>) -> Option<String> {
    value.as_ref().map(Value::to_string)
}
