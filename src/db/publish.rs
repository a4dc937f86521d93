use serde_json::Value;
use tracing::{info, instrument, warn};

use super::core::Database;
use crate::types::{PublishRecord, PublishStatus};
use crate::util::now_timestamp;
use crate::TARGET_DB;

pub struct NewPublishRecord {
    pub article_id: i64,
    pub platform: String,
    pub platform_data: Option<Value>,
}

impl Database {
    #[instrument(target = "db", level = "info", skip(self, record), fields(article_id = record.article_id))]
    pub async fn create_publish_record(
        &self,
        record: &NewPublishRecord,
    ) -> Result<PublishRecord, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO publish_records (article_id, platform, status, platform_data, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING *
            "#,
        )
        .bind(record.article_id)
        .bind(&record.platform)
        .bind(PublishStatus::Pending.as_str())
        .bind(record.platform_data.as_ref().map(Value::to_string))
        .bind(now_timestamp())
        .fetch_one(self.pool())
        .await
    }

    pub async fn get_publish_record(&self, id: i64) -> Result<Option<PublishRecord>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM publish_records WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.pool())
            .await
    }

    pub async fn list_publish_records(
        &self,
        article_id: i64,
    ) -> Result<Vec<PublishRecord>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM publish_records WHERE article_id = ?1 ORDER BY created_at DESC, id DESC",
        )
        .bind(article_id)
        .fetch_all(self.pool())
        .await
    }

    /// pending/failed -> published. Returns `None` if the record is missing or
    /// already published or withdrawn.
    #[instrument(target = "db", level = "info", skip(self, platform_data))]
    pub async fn mark_published(
        &self,
        id: i64,
        published_url: Option<&str>,
        platform_data: Option<&Value>,
    ) -> Result<Option<PublishRecord>, sqlx::Error> {
        let record: Option<PublishRecord> = sqlx::query_as(
            r#"
            UPDATE publish_records
            SET status = ?1, published_url = ?2, published_at = ?3, error_message = NULL,
                platform_data = COALESCE(?4, platform_data)
            WHERE id = ?5 AND status IN (?6, ?7)
            RETURNING *
            "#,
        )
        .bind(PublishStatus::Published.as_str())
        .bind(published_url)
        .bind(now_timestamp())
        .bind(platform_data.map(Value::to_string))
        .bind(id)
        .bind(PublishStatus::Pending.as_str())
        .bind(PublishStatus::Failed.as_str())
        .fetch_optional(self.pool())
        .await?;

        if record.is_some() {
            info!(target: TARGET_DB, "Publish record {} marked published", id);
        }
        Ok(record)
    }

    /// pending/failed -> failed, counting the attempt. `retry_count` only grows.
    #[instrument(target = "db", level = "info", skip(self))]
    pub async fn mark_failed(
        &self,
        id: i64,
        error_message: &str,
    ) -> Result<Option<PublishRecord>, sqlx::Error> {
        let record: Option<PublishRecord> = sqlx::query_as(
            r#"
            UPDATE publish_records
            SET status = ?1, error_message = ?2, retry_count = retry_count + 1
            WHERE id = ?3 AND status IN (?4, ?1)
            RETURNING *
            "#,
        )
        .bind(PublishStatus::Failed.as_str())
        .bind(error_message)
        .bind(id)
        .bind(PublishStatus::Pending.as_str())
        .fetch_optional(self.pool())
        .await?;

        if record.is_some() {
            warn!(target: TARGET_DB, "Publish record {} failed: {}", id, error_message);
        }
        Ok(record)
    }

    /// published -> withdrawn. Any other starting state is refused with `None`.
    #[instrument(target = "db", level = "info", skip(self))]
    pub async fn withdraw_publish_record(
        &self,
        id: i64,
    ) -> Result<Option<PublishRecord>, sqlx::Error> {
        let record: Option<PublishRecord> = sqlx::query_as(
            r#"
            UPDATE publish_records
            SET status = ?1, withdrawn_at = ?2
            WHERE id = ?3 AND status = ?4
            RETURNING *
            "#,
        )
        .bind(PublishStatus::Withdrawn.as_str())
        .bind(now_timestamp())
        .bind(id)
        .bind(PublishStatus::Published.as_str())
        .fetch_optional(self.pool())
        .await?;

        if record.is_some() {
            info!(target: TARGET_DB, "Publish record {} withdrawn", id);
        }
        Ok(record)
    }
}
