use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::{create_router, AppState};
use crate::db::{Database, NewPublishRecord};
use crate::environment::Settings;
use crate::types::SearchType;

async fn app_with(settings: Settings) -> (Router, Database) {
    let db = Database::in_memory().await.unwrap();
    let state = AppState::new(db.clone(), settings).unwrap();
    (create_router(state), db)
}

async fn app() -> (Router, Database) {
    app_with(Settings::default()).await
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn save_analysis(app: &Router, body: Value) -> i64 {
    let (status, response) = send(app, "POST", "/analysis/save", Some(body)).await;
    assert_eq!(status, StatusCode::OK, "{}", response);
    response["data"]["searchHistoryId"].as_i64().unwrap()
}

fn article_body() -> Value {
    json!({
        "title": "夏日护肤指南",
        "content": "# 夏日护肤\n\n防晒是第一步。",
        "platform": "wechat",
        "style": "casual",
    })
}

#[tokio::test]
async fn test_saved_analysis_without_insights_reads_back_empty() {
    let (app, _db) = app().await;
    let id = save_analysis(
        &app,
        json!({"keyword": "测试", "articles": [{"title": "第一篇", "content": "正文"}]}),
    )
    .await;

    let (status, body) = send(&app, "GET", &format!("/history/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["keyword"], "测试");
    assert_eq!(body["data"]["type"], "wechat");
    let result = &body["data"]["result"];
    assert_eq!(result["aiInsights"], json!([]));
    assert_eq!(result["structuredTopicInsights"], json!([]));
    assert_eq!(result["processedArticles"], 1);
    assert_eq!(result["metadata"]["modelUsed"], "unknown");
    assert_eq!(result["structuredInfo"]["keywords"], json!([]));
}

#[tokio::test]
async fn test_save_repairs_mojibake() {
    let (app, db) = app().await;
    let id = save_analysis(
        &app,
        json!({
            "keyword": "æµ‹è¯•",
            "articles": [{"title": "å¾®ä¿¡å†…å®¹"}],
        }),
    )
    .await;

    let history = db.get_history(id).await.unwrap().unwrap();
    assert_eq!(history.keyword, "测试");
    let row = db.get_analysis_for_history(id).await.unwrap().unwrap();
    assert_eq!(row.all_articles.as_deref(), Some(r#"[{"title":"微信内容"}]"#));
}

#[tokio::test]
async fn test_current_names_win_over_legacy_names() {
    let (app, db) = app().await;
    let id = save_analysis(
        &app,
        json!({
            "keyword": "k",
            "type": "xiaohongshu",
            "platform": "wechat",
            "articles": [],
            "aiInsights": [{"title": "new"}],
            "aiGeneratedInsights": [{"title": "legacy"}],
            "ruleInsights": [{"title": "rule"}],
        }),
    )
    .await;

    let history = db.get_history(id).await.unwrap().unwrap();
    assert_eq!(history.search_type, SearchType::Xiaohongshu);
    let row = db.get_analysis_for_history(id).await.unwrap().unwrap();
    assert_eq!(row.ai_insights.as_deref(), Some(r#"[{"title":"new"}]"#));
    assert_eq!(row.rule_based_insights.as_deref(), Some(r#"[{"title":"rule"}]"#));

    let id = save_analysis(&app, json!({"keyword": "k", "platform": "xiaohongshu", "articles": []})).await;
    let history = db.get_history(id).await.unwrap().unwrap();
    assert_eq!(history.search_type, SearchType::Xiaohongshu);
}

#[tokio::test]
async fn test_keyword_filters_match_wildcards_literally() {
    let (app, _db) = app().await;
    save_analysis(&app, json!({"keyword": "abc", "articles": []})).await;
    save_analysis(&app, json!({"keyword": "100%纯天然", "articles": []})).await;

    let (status, body) = send(&app, "GET", "/history?keyword=%25", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["keyword"], "100%纯天然");
    let (_, body) = send(&app, "GET", "/history?keyword=_", None).await;
    assert_eq!(body["data"]["total"], 0);

    send(&app, "POST", "/content/save-to-publish", Some(article_body())).await;
    let (status, body) = send(&app, "GET", "/articles?search=_", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 0);
    let (_, body) = send(&app, "GET", "/articles?search=%E9%98%B2%E6%99%92", None).await;
    assert_eq!(body["data"]["total"], 1);
}

#[tokio::test]
async fn test_save_requires_keyword_and_articles() {
    let (app, _db) = app().await;
    let (status, body) = send(&app, "POST", "/analysis/save", Some(json!({"articles": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "MISSING_FIELDS");

    let (status, _) = send(
        &app,
        "POST",
        "/analysis/save",
        Some(json!({"keyword": "k", "articles": "not an array"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "POST", "/analysis/save", Some(json!({"keyword": "k"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_FIELDS");
}

#[tokio::test]
async fn test_daily_quota() {
    let settings = Settings {
        analysis_daily_quota: 1,
        ..Settings::default()
    };
    let (app, _db) = app_with(settings).await;
    save_analysis(&app, json!({"keyword": "a", "articles": []})).await;

    let (status, body) = send(
        &app,
        "POST",
        "/analysis/save",
        Some(json!({"keyword": "b", "articles": []})),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "QUOTA_EXCEEDED");

    let (status, body) = send(&app, "GET", "/analysis/quota", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"limit": 1, "used": 1, "remaining": 0}));
}

#[tokio::test]
async fn test_article_status_defaults_and_partial_update() {
    let (app, _db) = app().await;
    let (status, body) = send(&app, "POST", "/content/save-to-publish", Some(article_body())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["targetPlatforms"], json!(["wechat"]));
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/articles/{}", id),
        Some(json!({"status": "published"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "published");
    assert_eq!(body["data"]["title"], "夏日护肤指南");
    assert_eq!(body["data"]["content"], "# 夏日护肤\n\n防晒是第一步。");

    let (_, body) = send(&app, "GET", &format!("/articles/{}", id), None).await;
    assert_eq!(body["data"]["status"], "published");
    assert_eq!(body["data"]["title"], "夏日护肤指南");
}

#[tokio::test]
async fn test_save_to_publish_requires_fields() {
    let (app, _db) = app().await;
    let mut body = article_body();
    body["style"] = json!("");
    let (status, response) = send(&app, "POST", "/content/save-to-publish", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["code"], "MISSING_FIELDS");
}

#[tokio::test]
async fn test_missing_article_is_404() {
    let (app, _db) = app().await;
    let (status, body) = send(&app, "GET", "/articles/424242", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "文章不存在");

    let (status, _) = send(&app, "DELETE", "/articles/424242", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "PUT", "/articles/424242", Some(json!({"title": "x"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_history_type_rejected_before_query() {
    let (app, db) = app().await;
    // Any query against a closed pool fails with a 500, so a 400 here means none ran.
    db.pool().close().await;

    let (status, body) = send(&app, "GET", "/history?type=bogus", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "INVALID_TYPE");
}

#[tokio::test]
async fn test_history_list_and_delete() {
    let (app, _db) = app().await;
    let id = save_analysis(
        &app,
        json!({
            "keyword": "护肤",
            "type": "xiaohongshu",
            "articles": [],
            "aiGeneratedInsights": [{"title": "旧洞察"}],
        }),
    )
    .await;
    save_analysis(&app, json!({"keyword": "旅行", "articles": []})).await;

    let (status, body) = send(&app, "GET", "/history?type=xiaohongshu&limit=10", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["keyword"], "护肤");
    assert_eq!(body["data"]["items"][0]["result"]["insightCount"], 1);

    let (status, _) = send(&app, "GET", "/history?page=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, "GET", "/history?limit=101", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "DELETE", &format!("/history/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", &format!("/history/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "DELETE", &format!("/history/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_insight_history_and_detail() {
    let (app, _db) = app().await;
    let id = save_analysis(
        &app,
        json!({
            "keyword": "咖啡",
            "articles": [],
            "structuredTopicInsights": [
                {
                    "title": "手冲入门",
                    "recommendedTopics": "not a list",
                    "keywordAnalysis": {"highFrequency": ["手冲", "豆子"], "missingKeywords": ["磨豆机"]}
                },
                {"keywordAnalysis": {"highFrequency": ["豆子"]}}
            ],
        }),
    )
    .await;

    let (status, body) = send(&app, "GET", "/insights/history", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["insightCount"], 2);

    let (status, _) = send(&app, "GET", "/insights/history?hours=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, "GET", "/insights/history?platform=weibo", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "GET", &format!("/insights/detail/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    let insights = body["data"]["insights"].as_array().unwrap();
    assert_eq!(insights.len(), 2);
    assert_eq!(insights[0]["recommendedTopics"], json!([]));
    assert_eq!(insights[1]["title"], "未命名洞察");
    assert_eq!(insights[1]["coreFinding"], "暂无核心发现");
    assert!(insights[1]["id"].as_str().unwrap().ends_with("_1"));
    assert_eq!(body["data"]["allKeywords"], json!(["手冲", "豆子", "磨豆机"]));

    let (status, _) = send(&app, "GET", "/insights/detail/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_withdraw_only_published_records() {
    let (app, db) = app().await;
    let (_, body) = send(&app, "POST", "/content/save-to-publish", Some(article_body())).await;
    let article_id = body["data"]["id"].as_i64().unwrap();
    let record = db
        .create_publish_record(&NewPublishRecord {
            article_id,
            platform: "wechat".to_string(),
            platform_data: None,
        })
        .await
        .unwrap();

    let uri = format!("/publish-records/{}/withdraw", record.id);
    let (status, body) = send(&app, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    db.mark_published(record.id, Some("https://mp.weixin.qq.com/s/x"), None)
        .await
        .unwrap();
    let (status, body) = send(&app, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "withdrawn");

    let (_, body) = send(&app, "GET", &format!("/articles/{}/publish-records", article_id), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = send(&app, "POST", "/publish-records/999/withdraw", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_regenerate_image_falls_back() {
    let (app, _db) = app().await;
    let (status, _) = send(
        &app,
        "POST",
        "/content/regenerate-image",
        Some(json!({"imageId": "img-1"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "POST",
        "/content/regenerate-image",
        Some(json!({"imageId": "img-1", "description": "海边日落", "width": 640, "height": 360})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["source"], "fallback");
    assert_eq!(body["data"]["fallbackReason"], "not_configured");
    assert_eq!(body["data"]["url"], "https://picsum.photos/seed/img-1/640/360");
}

#[tokio::test]
async fn test_disabled_services() {
    let (app, _db) = app().await;
    let (status, body) = send(&app, "POST", "/content/generate", Some(json!({"topic": "咖啡"}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);

    let (status, _) = send(&app, "GET", "/wechat/accounts", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_wechat_publish_validates_before_forwarding() {
    let (app, _db) = app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/wechat/publish",
        Some(json!({"accountId": "acc-1", "title": "长".repeat(65), "content": "正文"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_failed_publish_is_recorded() {
    let settings = Settings {
        wechat: crate::environment::WechatSettings {
            base_url: Some("http://127.0.0.1:9".to_string()),
            api_key: None,
        },
        ..Settings::default()
    };
    let (app, db) = app_with(settings).await;
    let (_, body) = send(&app, "POST", "/content/save-to-publish", Some(article_body())).await;
    let article_id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        "POST",
        "/wechat/publish",
        Some(json!({"articleId": article_id, "accountId": "acc-1", "title": "标题", "content": "正文"})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "UPSTREAM_ERROR");

    let records = db.list_publish_records(article_id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].retry_count, 1);
    assert!(records[0].error_message.is_some());
}

#[tokio::test]
async fn test_health() {
    let (app, _db) = app().await;
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["aiEnabled"], false);
    assert_eq!(body["data"]["wechatEnabled"], false);
}
