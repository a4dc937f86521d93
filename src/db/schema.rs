use tracing::info;

use super::core::Database;
use crate::TARGET_DB;

impl Database {
    pub(crate) async fn initialize_schema(&self) -> Result<(), sqlx::Error> {
        let mut conn = self.pool().acquire().await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS search_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                type TEXT NOT NULL, -- wechat, xiaohongshu
                keyword TEXT NOT NULL,
                search_time TEXT NOT NULL,
                article_count INTEGER NOT NULL DEFAULT 0,
                avg_read REAL NOT NULL DEFAULT 0,
                avg_like REAL NOT NULL DEFAULT 0,
                original_rate REAL NOT NULL DEFAULT 0,
                avg_interaction REAL NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'pending', -- pending, completed, error
                error_message TEXT,
                duration INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_search_history_type_time ON search_history (type, search_time);
            CREATE INDEX IF NOT EXISTS idx_search_history_status_time ON search_history (status, search_time);

            -- At most one analysis per search, removed with it
            CREATE TABLE IF NOT EXISTS analysis_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                search_history_id INTEGER NOT NULL UNIQUE,
                word_cloud TEXT,
                all_articles TEXT,
                top_liked_articles TEXT,
                top_interaction_articles TEXT,
                ai_summaries TEXT,
                structured_info TEXT,
                ai_insights TEXT,
                ai_generated_insights TEXT, -- legacy name of ai_insights
                rule_based_insights TEXT,
                rule_insights TEXT, -- legacy name of rule_based_insights
                structured_topic_insights TEXT,
                analysis_version TEXT,
                ai_model_used TEXT,
                processing_time INTEGER,
                ai_analysis_status TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (search_history_id) REFERENCES search_history (id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                html_content TEXT,
                plain_content TEXT NOT NULL,
                summary TEXT,
                platform TEXT NOT NULL,
                style TEXT NOT NULL,
                length TEXT,
                target_platforms TEXT NOT NULL DEFAULT '[]',
                status TEXT NOT NULL DEFAULT 'pending', -- draft, pending, published, withdrawn
                has_images BOOLEAN NOT NULL DEFAULT FALSE,
                image_config TEXT,
                sections TEXT,
                estimated_reading_time INTEGER,
                insight_id TEXT, -- soft reference, not enforced
                custom_instructions TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_articles_status ON articles (status);
            CREATE INDEX IF NOT EXISTS idx_articles_platform ON articles (platform);

            CREATE TABLE IF NOT EXISTS publish_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                article_id INTEGER NOT NULL,
                platform TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending', -- pending, published, failed, withdrawn
                published_url TEXT,
                published_at TEXT,
                withdrawn_at TEXT,
                error_message TEXT,
                retry_count INTEGER NOT NULL DEFAULT 0,
                platform_data TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (article_id) REFERENCES articles (id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_publish_records_article_id ON publish_records (article_id);
            "#,
        )
        .execute(&mut *conn)
        .await?;
        info!(target: TARGET_DB, "Tables ensured to exist");

        Ok(())
    }
}
