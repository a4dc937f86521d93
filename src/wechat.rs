use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::environment::WechatSettings;
use crate::TARGET_WEB_REQUEST;

pub const MAX_TITLE_CHARS: usize = 64;
pub const MAX_SUMMARY_CHARS: usize = 120;

#[derive(Debug, Error)]
pub enum WechatError {
    #[error("WeChat publishing service is not configured")]
    NotConfigured,
    #[error("{0}")]
    Validation(String),
    #[error("WeChat request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The service answered but refused; `status` is its HTTP status.
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("WeChat service returned an unreadable response")]
    InvalidResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WechatAccount {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub platform_app_id: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl WechatAccount {
    pub fn is_publishable(&self) -> bool {
        self.status == "active"
            && self
                .platform_app_id
                .as_deref()
                .is_some_and(|app_id| !app_id.trim().is_empty())
    }
}

/// Keeps the accounts that can actually receive articles.
pub fn filter_active_accounts(accounts: Vec<WechatAccount>) -> Vec<WechatAccount> {
    accounts.into_iter().filter(WechatAccount::is_publishable).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub account_id: String,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl PublishRequest {
    /// Limits are counted in characters, not bytes.
    pub fn validate(&self) -> Result<(), WechatError> {
        if self.account_id.trim().is_empty() {
            return Err(WechatError::Validation("缺少公众号账号".to_string()));
        }
        if self.title.trim().is_empty() {
            return Err(WechatError::Validation("标题不能为空".to_string()));
        }
        if self.content.trim().is_empty() {
            return Err(WechatError::Validation("内容不能为空".to_string()));
        }
        if self.title.chars().count() > MAX_TITLE_CHARS {
            return Err(WechatError::Validation(format!(
                "标题不能超过{}个字符",
                MAX_TITLE_CHARS
            )));
        }
        if let Some(summary) = &self.summary {
            if summary.chars().count() > MAX_SUMMARY_CHARS {
                return Err(WechatError::Validation(format!(
                    "摘要不能超过{}个字符",
                    MAX_SUMMARY_CHARS
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishOutcome {
    pub published_url: Option<String>,
    pub data: Value,
}

/// Response wrapper used by every endpoint of the publishing service.
#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

#[derive(Clone, Debug)]
pub struct WechatClient {
    client: Client,
    settings: WechatSettings,
}

impl WechatClient {
    pub fn new(client: Client, settings: WechatSettings) -> Self {
        WechatClient { client, settings }
    }

    pub fn is_configured(&self) -> bool {
        self.settings.base_url.is_some()
    }

    fn endpoint(&self, path: &str) -> Result<String, WechatError> {
        let base_url = self
            .settings
            .base_url
            .as_deref()
            .ok_or(WechatError::NotConfigured)?;
        Ok(format!("{}/{}", base_url.trim_end_matches('/'), path))
    }

    fn with_key(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.settings.api_key {
            Some(api_key) => request.header("X-API-Key", api_key),
            None => request,
        }
    }

    /// Active accounts with a bound platform app id.
    pub async fn list_accounts(&self) -> Result<Vec<WechatAccount>, WechatError> {
        let url = self.endpoint("accounts")?;
        debug!(target: TARGET_WEB_REQUEST, "Fetching WeChat accounts from {}", url);

        let response = self.with_key(self.client.get(&url)).send().await?;
        let accounts: Vec<WechatAccount> = read_envelope(response).await?.unwrap_or_default();
        let total = accounts.len();
        let active = filter_active_accounts(accounts);

        info!(target: TARGET_WEB_REQUEST, "WeChat accounts: {} of {} publishable", active.len(), total);
        Ok(active)
    }

    pub async fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome, WechatError> {
        request.validate()?;
        let url = self.endpoint("publish")?;
        info!(target: TARGET_WEB_REQUEST, "Publishing '{}' to WeChat account {}", request.title, request.account_id);

        let response = self
            .with_key(self.client.post(&url))
            .json(request)
            .send()
            .await?;
        let data: Value = read_envelope(response).await?.unwrap_or(Value::Null);

        let published_url = ["url", "publishedUrl", "articleUrl"]
            .iter()
            .find_map(|key| data.get(key).and_then(Value::as_str))
            .map(str::to_string);
        Ok(PublishOutcome { published_url, data })
    }
}

async fn read_envelope<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<Option<T>, WechatError> {
    let status = response.status();
    let body = response.text().await?;

    let envelope: Envelope<T> = match serde_json::from_str(&body) {
        Ok(envelope) => envelope,
        Err(err) => {
            error!(target: TARGET_WEB_REQUEST, "Unreadable WeChat response ({}): {}", status, err);
            if status.is_success() {
                return Err(WechatError::InvalidResponse);
            }
            return Err(WechatError::Rejected {
                status: status.as_u16(),
                message: format!("WeChat service returned HTTP {}", status.as_u16()),
            });
        }
    };

    if !status.is_success() || !envelope.success {
        let message = envelope
            .error
            .unwrap_or_else(|| format!("WeChat service returned HTTP {}", status.as_u16()));
        error!(target: TARGET_WEB_REQUEST, "WeChat service refused request: {}", message);
        return Err(WechatError::Rejected {
            status: status.as_u16(),
            message,
        });
    }
    Ok(envelope.data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(id: &str, status: &str, app_id: Option<&str>) -> WechatAccount {
        WechatAccount {
            id: id.to_string(),
            name: format!("账号{}", id),
            platform_app_id: app_id.map(str::to_string),
            status: status.to_string(),
            avatar: None,
        }
    }

    fn request(title: &str, summary: Option<String>) -> PublishRequest {
        PublishRequest {
            account_id: "acc-1".to_string(),
            title: title.to_string(),
            content: "<p>正文</p>".to_string(),
            summary,
            cover_image: None,
            author: None,
        }
    }

    #[test]
    fn test_filter_active_accounts() {
        let accounts = vec![
            account("1", "active", Some("wx123")),
            account("2", "inactive", Some("wx456")),
            account("3", "active", None),
            account("4", "active", Some("  ")),
        ];
        let active = filter_active_accounts(accounts);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "1");
    }

    #[test]
    fn test_account_deserializes_with_missing_fields() {
        let accounts: Vec<WechatAccount> = serde_json::from_str(
            r#"[{"id":"a","status":"active","platformAppId":"wx1"},{"id":"b"}]"#,
        )
        .unwrap();
        assert!(accounts[0].is_publishable());
        assert!(!accounts[1].is_publishable());
    }

    #[test]
    fn test_title_limit_counts_characters() {
        assert!(request(&"标".repeat(MAX_TITLE_CHARS), None).validate().is_ok());
        assert!(matches!(
            request(&"标".repeat(MAX_TITLE_CHARS + 1), None).validate(),
            Err(WechatError::Validation(_))
        ));
    }

    #[test]
    fn test_summary_limit_and_required_fields() {
        assert!(request("t", Some("摘".repeat(MAX_SUMMARY_CHARS))).validate().is_ok());
        assert!(request("t", Some("摘".repeat(MAX_SUMMARY_CHARS + 1)))
            .validate()
            .is_err());
        assert!(request(" ", None).validate().is_err());

        let mut empty_content = request("t", None);
        empty_content.content = String::new();
        assert!(empty_content.validate().is_err());
    }

    #[tokio::test]
    async fn test_unconfigured_client_refuses() {
        let client = WechatClient::new(
            Client::new(),
            WechatSettings {
                base_url: None,
                api_key: None,
            },
        );
        assert!(!client.is_configured());
        assert!(matches!(
            client.list_accounts().await,
            Err(WechatError::NotConfigured)
        ));
        assert!(matches!(
            client.publish(&request("t", None)).await,
            Err(WechatError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_validation_runs_before_any_request() {
        let client = WechatClient::new(
            Client::new(),
            WechatSettings {
                base_url: Some("http://127.0.0.1:9".to_string()),
                api_key: None,
            },
        );
        let result = client.publish(&request(&"x".repeat(65), None)).await;
        assert!(matches!(result, Err(WechatError::Validation(_))));

        let result = client.list_accounts().await;
        assert!(matches!(result, Err(WechatError::Request(_))));
    }
}
