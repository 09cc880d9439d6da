use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const QUIET_FILTER: &str = "tariff_pipeline=info,warn";
const VERBOSE_FILTER: &str = "tariff_pipeline=debug,info";

/// `RUST_LOG` wins over the built-in directives.
fn filter_or(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives))
}

pub fn init_cli_logger(verbose: bool) {
    let filter = filter_or(if verbose { VERBOSE_FILTER } else { QUIET_FILTER });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .without_time()
                .compact(),
        )
        .init();
}

/// 給部署環境使用的 JSON 日誌格式，每行一筆事件
pub fn init_json_logger() {
    tracing_subscriber::registry()
        .with(filter_or(QUIET_FILTER))
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .flatten_event(true),
        )
        .init();
}
