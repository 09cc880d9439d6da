use crate::config::{
    AppConfig, BatchSettings, ClassifierSettings, ExchangeRateSettings, QuotaSettings,
    ScheduleSettings,
};
use crate::utils::error::{Result, TariffError};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

impl AppConfig {
    /// 從環境變數建立配置，端點為必填，其餘使用預設值
    pub fn from_env() -> Result<Self> {
        let defaults = BatchSettings::default();
        let quota_defaults = QuotaSettings::default();

        let mut schedule = ScheduleSettings::new(required("TARIFF_API_URL")?);
        schedule.service_key = env::var("TARIFF_API_KEY").ok();
        if let Ok(field) = env::var("TARIFF_CODE_FIELD") {
            schedule.code_field = field;
        }
        schedule.per_page = parsed_or("TARIFF_PAGE_SIZE", schedule.per_page)?;

        Ok(Self {
            quota: QuotaSettings {
                enabled: env::var("RATE_LIMIT_ENABLED")
                    .map(|v| v == "true")
                    .unwrap_or(false),
                single_daily_limit: parsed_or(
                    "SINGLE_SEARCH_DAILY_LIMIT",
                    quota_defaults.single_daily_limit,
                )?,
                bulk_daily_limit: parsed_or(
                    "BULK_SEARCH_DAILY_LIMIT",
                    quota_defaults.bulk_daily_limit,
                )?,
                state_file: env::var_os("QUOTA_STATE_FILE").map(PathBuf::from),
            },
            classifier: ClassifierSettings {
                endpoint: required("HSCODE_CLASSIFIER_URL")?,
            },
            schedule,
            exchange_rate: ExchangeRateSettings {
                endpoint: required("FX_API_URL")?,
                api_key: env::var("FX_API_KEY").ok(),
            },
            batch: BatchSettings {
                max_products: parsed_or("BULK_MAX_PRODUCTS", defaults.max_products)?,
                concurrency: parsed_or("CONCURRENT_REQUESTS", defaults.concurrency)?,
                request_timeout_seconds: parsed_or(
                    "REQUEST_TIMEOUT_SECONDS",
                    defaults.request_timeout_seconds,
                )?,
            },
        })
    }
}

fn required(name: &str) -> Result<String> {
    env::var(name).map_err(|_| TariffError::MissingConfigError {
        field: name.to_string(),
    })
}

/// Unset means `default`; a set value that does not parse is an error.
fn parsed_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|e: T::Err| TariffError::InvalidConfigValueError {
                field: name.to_string(),
                value,
                reason: e.to_string(),
            }),
        Err(_) => Ok(default),
    }
}
