use std::io;
use tracing_appender::rolling;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Default stdout filter, `RUST_LOG` takes precedence when set.
const STDOUT_FILTER: &str = "info,llm_request=info,web_request=info,db_query=warn,analysis=info,sqlx=off";
const FILE_FILTER: &str = "info,llm_request=debug,web_request=debug,db_query=info,analysis=debug,sqlx=warn";

pub fn configure_logging() {
    let stdout_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(STDOUT_FILTER));

    let stdout_log = fmt::layer()
        .with_writer(io::stdout)
        .with_filter(stdout_filter);

    // Daily rolling file under ./logs, kept more verbose than stdout.
    let file_appender = rolling::daily("logs", "content_factory.log");
    let file_log = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_filter(EnvFilter::new(FILE_FILTER));

    tracing_subscriber::Registry::default()
        .with(stdout_log)
        .with(file_log)
        .init();
}
