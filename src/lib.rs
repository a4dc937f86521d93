pub mod analysis;
pub mod api;
pub mod db;
pub mod encoding;
pub mod environment;
pub mod image;
pub mod llm;
pub mod logging;
pub mod prompts;
pub mod types;
pub mod util;
pub mod wechat;

pub const TARGET_WEB_REQUEST: &str = "web_request";
pub const TARGET_LLM_REQUEST: &str = "llm_request";
pub const TARGET_DB: &str = "db_query";
pub const TARGET_ANALYSIS: &str = "analysis";
