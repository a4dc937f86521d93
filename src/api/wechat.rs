use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{ok, ApiResult, AppState};
use crate::db::NewPublishRecord;
use crate::types::PublishRecord;
use crate::wechat::{PublishRequest, WechatAccount};
use crate::TARGET_WEB_REQUEST;

const PLATFORM: &str = "wechat";

pub async fn accounts(State(state): State<AppState>) -> ApiResult<Vec<WechatAccount>> {
    ok(state.wechat.list_accounts().await?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishBody {
    /// Links the attempt to a stored article so it is recorded.
    pub article_id: Option<i64>,
    #[serde(flatten)]
    pub request: PublishRequest,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Published {
    pub published_url: Option<String>,
    pub data: Value,
    pub record: Option<PublishRecord>,
}

/// Forwards an article to the publishing service. When `articleId` names an
/// existing article the attempt is recorded as a publish record; otherwise
/// nothing is persisted.
pub async fn publish(
    State(state): State<AppState>,
    body: Result<Json<PublishBody>, JsonRejection>,
) -> ApiResult<Published> {
    let Json(body) = body?;
    body.request.validate()?;

    let article = match body.article_id {
        Some(article_id) => state.db.get_article(article_id).await?,
        None => None,
    };
    let record = match &article {
        Some(article) => Some(
            state
                .db
                .create_publish_record(&NewPublishRecord {
                    article_id: article.id,
                    platform: PLATFORM.to_string(),
                    platform_data: Some(json!({ "accountId": body.request.account_id })),
                })
                .await?,
        ),
        None => {
            warn!(
                target: TARGET_WEB_REQUEST,
                "Publishing '{}' without a stored article (articleId {:?}); no publish record kept",
                body.request.title,
                body.article_id
            );
            None
        }
    };

    match state.wechat.publish(&body.request).await {
        Ok(outcome) => {
            let record = match record {
                Some(record) => {
                    state
                        .db
                        .mark_published(record.id, outcome.published_url.as_deref(), Some(&outcome.data))
                        .await?
                }
                None => None,
            };
            info!(target: TARGET_WEB_REQUEST, "Published '{}' to WeChat", body.request.title);
            ok(Published {
                published_url: outcome.published_url,
                data: outcome.data,
                record,
            })
        }
        Err(err) => {
            if let Some(record) = record {
                state.db.mark_failed(record.id, &err.to_string()).await?;
            }
            Err(err.into())
        }
    }
}
