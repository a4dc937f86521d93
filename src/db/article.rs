use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, info, instrument};

use super::core::Database;
use super::{contains_pattern, Page};
use crate::types::{Article, ArticleStatus};
use crate::util::{estimate_reading_time, now_timestamp, plain_text};
use crate::TARGET_DB;

pub struct NewArticle {
    pub title: String,
    pub content: String,
    pub html_content: Option<String>,
    pub summary: Option<String>,
    pub platform: String,
    pub style: String,
    pub length: Option<String>,
    pub target_platforms: Vec<String>,
    pub status: ArticleStatus,
    pub has_images: bool,
    pub image_config: Option<Value>,
    pub sections: Option<Value>,
    pub insight_id: Option<String>,
    pub custom_instructions: Option<String>,
}

/// Partial update; `None` leaves the column as it is.
#[derive(Debug, Default)]
pub struct ArticleUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub status: Option<ArticleStatus>,
    pub custom_instructions: Option<String>,
}

impl ArticleUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.status.is_none()
            && self.custom_instructions.is_none()
    }
}

pub struct ArticleFilter {
    pub search: Option<String>,
    pub status: Option<ArticleStatus>,
    pub platform: Option<String>,
    pub page: i64,
    pub limit: i64,
}

impl Database {
    #[instrument(target = "db", level = "info", skip(self, article), fields(title = %article.title))]
    pub async fn create_article(&self, article: &NewArticle) -> Result<Article, sqlx::Error> {
        let now = now_timestamp();
        let plain = plain_text(article.html_content.as_deref().unwrap_or(&article.content));
        let reading_time = estimate_reading_time(&plain);
        let target_platforms =
            serde_json::to_string(&article.target_platforms).unwrap_or_else(|_| "[]".to_string());

        let created: Article = sqlx::query_as(
            r#"
            INSERT INTO articles (title, content, html_content, plain_content, summary, platform, style, length, target_platforms, status, has_images, image_config, sections, estimated_reading_time, insight_id, custom_instructions, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?17)
            RETURNING *
            "#,
        )
        .bind(&article.title)
        .bind(&article.content)
        .bind(&article.html_content)
        .bind(&plain)
        .bind(&article.summary)
        .bind(&article.platform)
        .bind(&article.style)
        .bind(&article.length)
        .bind(target_platforms)
        .bind(article.status.as_str())
        .bind(article.has_images)
        .bind(article.image_config.as_ref().map(Value::to_string))
        .bind(article.sections.as_ref().map(Value::to_string))
        .bind(reading_time)
        .bind(&article.insight_id)
        .bind(&article.custom_instructions)
        .bind(&now)
        .fetch_one(self.pool())
        .await?;

        info!(target: TARGET_DB, "Created article {} with status {}", created.id, created.status);
        Ok(created)
    }

    pub async fn get_article(&self, id: i64) -> Result<Option<Article>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM articles WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.pool())
            .await
    }

    /// Applies only the fields present in `update`. New content re-derives the
    /// plain text and reading time. Returns `None` if the article does not exist.
    #[instrument(target = "db", level = "info", skip(self, update))]
    pub async fn update_article(
        &self,
        id: i64,
        update: &ArticleUpdate,
    ) -> Result<Option<Article>, sqlx::Error> {
        if update.is_empty() {
            return self.get_article(id).await;
        }

        let mut query = QueryBuilder::<Sqlite>::new("UPDATE articles SET updated_at = ");
        query.push_bind(now_timestamp());
        if let Some(title) = &update.title {
            query.push(", title = ").push_bind(title);
        }
        if let Some(content) = &update.content {
            // Derived columns follow the edited source; stored HTML is left as is.
            let plain = plain_text(content);
            let reading_time = estimate_reading_time(&plain);
            query
                .push(", content = ")
                .push_bind(content)
                .push(", plain_content = ")
                .push_bind(plain)
                .push(", estimated_reading_time = ")
                .push_bind(reading_time);
        }
        if let Some(status) = update.status {
            query.push(", status = ").push_bind(status.as_str());
        }
        if let Some(custom_instructions) = &update.custom_instructions {
            query
                .push(", custom_instructions = ")
                .push_bind(custom_instructions);
        }
        query.push(" WHERE id = ").push_bind(id).push(" RETURNING *");

        let updated: Option<Article> = query.build_query_as().fetch_optional(self.pool()).await?;
        debug!(target: TARGET_DB, "Updated article {}: found = {}", id, updated.is_some());
        Ok(updated)
    }

    /// Deletes an article and its publish records. Returns false if nothing matched.
    #[instrument(target = "db", level = "info", skip(self))]
    pub async fn delete_article(&self, id: i64) -> Result<bool, sqlx::Error> {
        let done = sqlx::query("DELETE FROM articles WHERE id = ?1")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(done.rows_affected() > 0)
    }

    #[instrument(target = "db", level = "info", skip(self, filter))]
    pub async fn list_articles(&self, filter: &ArticleFilter) -> Result<Page<Article>, sqlx::Error> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM articles");
        push_article_filter(&mut count, filter);
        let (total,): (i64,) = count.build_query_as().fetch_one(self.pool()).await?;

        let mut select = QueryBuilder::<Sqlite>::new("SELECT * FROM articles");
        push_article_filter(&mut select, filter);
        select
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind((filter.page - 1) * filter.limit);
        let items: Vec<Article> = select.build_query_as().fetch_all(self.pool()).await?;

        Ok(Page { items, total })
    }
}

fn push_article_filter<'a>(query: &mut QueryBuilder<'a, Sqlite>, filter: &'a ArticleFilter) {
    let mut joiner = " WHERE ";
    if let Some(search) = filter.search.as_deref() {
        query
            .push(joiner)
            .push("(title LIKE ")
            .push_bind(contains_pattern(search))
            .push(r" ESCAPE '\' OR plain_content LIKE ")
            .push_bind(contains_pattern(search))
            .push(r" ESCAPE '\')");
        joiner = " AND ";
    }
    if let Some(status) = filter.status {
        query.push(joiner).push("status = ").push_bind(status.as_str());
        joiner = " AND ";
    }
    if let Some(platform) = filter.platform.as_deref() {
        query.push(joiner).push("platform = ").push_bind(platform);
    }
}
