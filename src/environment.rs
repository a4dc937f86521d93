use std::env;
use std::str::FromStr;

/// Process configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_path: String,
    pub port: u16,
    pub ai: AiSettings,
    pub analysis_daily_quota: i64,
    pub wechat: WechatSettings,
    pub image: ImageSettings,
    pub http_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct AiSettings {
    pub enabled: bool,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub temperature: f32,
}

#[derive(Debug, Clone)]
pub struct WechatSettings {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ImageSettings {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub default_style: String,
    pub default_quality: String,
}

impl Settings {
    pub fn from_env() -> Self {
        Settings {
            database_path: env_or("DATABASE_PATH", "content_factory.db"),
            port: env_parse("PORT", 8080),
            ai: AiSettings {
                enabled: env_flag("AI_ENABLED"),
                model: env_or("AI_MODEL", "gpt-4o-mini"),
                base_url: env_opt("AI_BASE_URL"),
                api_key: env_opt("AI_API_KEY"),
                temperature: env_parse("AI_TEMPERATURE", 0.7),
            },
            analysis_daily_quota: env_parse("ANALYSIS_DAILY_QUOTA", 100),
            wechat: WechatSettings {
                base_url: env_opt("WECHAT_API_BASE_URL"),
                api_key: env_opt("WECHAT_API_KEY"),
            },
            image: ImageSettings {
                base_url: env_opt("IMAGE_API_BASE_URL"),
                api_key: env_opt("IMAGE_API_KEY"),
                model: env_opt("IMAGE_MODEL"),
                default_style: env_or("IMAGE_DEFAULT_STYLE", "natural"),
                default_quality: env_or("IMAGE_DEFAULT_QUALITY", "standard"),
            },
            http_timeout_secs: env_parse("HTTP_TIMEOUT_SECS", 30),
        }
    }
}

impl Default for Settings {
    /// Everything external disabled; used by tests and `init-db`.
    fn default() -> Self {
        Settings {
            database_path: "content_factory.db".to_string(),
            port: 8080,
            ai: AiSettings {
                enabled: false,
                model: "gpt-4o-mini".to_string(),
                base_url: None,
                api_key: None,
                temperature: 0.7,
            },
            analysis_daily_quota: 100,
            wechat: WechatSettings {
                base_url: None,
                api_key: None,
            },
            image: ImageSettings {
                base_url: None,
                api_key: None,
                model: None,
                default_style: "natural".to_string(),
                default_quality: "standard".to_string(),
            },
            http_timeout_secs: 30,
        }
    }
}

/// Retrieves an environment variable, falling back to `default` when unset.
pub fn env_or(var: &str, default: &str) -> String {
    env::var(var).unwrap_or_else(|_| default.to_string())
}

/// Retrieves a non-empty environment variable.
pub fn env_opt(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parses an environment variable, falling back to `default` when unset or unparsable.
pub fn env_parse<T: FromStr>(var: &str, default: T) -> T {
    env::var(var)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Interprets `1`, `true`, `yes` and `on` (any case) as enabled.
pub fn env_flag(var: &str) -> bool {
    env::var(var)
        .map(|v| parse_flag(&v))
        .unwrap_or(false)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
