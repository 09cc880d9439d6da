#[cfg(feature = "cli")]
pub mod cli;
pub mod env;
pub mod toml_config;

use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[cfg(feature = "cli")]
pub use cli::CliConfig;

pub const DEFAULT_PAGE_SIZE: u32 = 5000;
pub const DEFAULT_RATE_LOOKUP_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_single_limit")]
    pub single_daily_limit: u32,
    #[serde(default = "default_bulk_limit")]
    pub bulk_daily_limit: u32,
    /// JSON file shared by every process; counters live in memory when unset.
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierSettings {
    pub endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSettings {
    pub endpoint: String,
    pub service_key: Option<String>,
    /// Column used in the `cond[<field>::EQ]` filter.
    #[serde(default = "default_code_field")]
    pub code_field: String,
    #[serde(default = "default_page_size")]
    pub per_page: u32,
    #[serde(default = "default_rate_lookup_page_size")]
    pub rate_lookup_per_page: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRateSettings {
    pub endpoint: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSettings {
    #[serde(default = "default_max_products")]
    pub max_products: usize,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

impl Default for QuotaSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            single_daily_limit: default_single_limit(),
            bulk_daily_limit: default_bulk_limit(),
            state_file: None,
        }
    }
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_products: default_max_products(),
            concurrency: default_concurrency(),
            request_timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl ScheduleSettings {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            service_key: None,
            code_field: default_code_field(),
            per_page: default_page_size(),
            rate_lookup_per_page: default_rate_lookup_page_size(),
        }
    }
}

fn default_single_limit() -> u32 {
    10
}

fn default_bulk_limit() -> u32 {
    50
}

fn default_code_field() -> String {
    "HS부호".to_string()
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_rate_lookup_page_size() -> u32 {
    DEFAULT_RATE_LOOKUP_PAGE_SIZE
}

fn default_max_products() -> usize {
    20
}

fn default_concurrency() -> usize {
    5
}

fn default_timeout_seconds() -> u64 {
    30
}

/// Full runtime configuration, whichever source it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub quota: QuotaSettings,
    pub classifier: ClassifierSettings,
    pub schedule: ScheduleSettings,
    pub exchange_rate: ExchangeRateSettings,
    #[serde(default)]
    pub batch: BatchSettings,
}

impl ConfigProvider for AppConfig {
    fn quota(&self) -> &QuotaSettings {
        &self.quota
    }

    fn classifier_endpoint(&self) -> &str {
        &self.classifier.endpoint
    }

    fn schedule(&self) -> &ScheduleSettings {
        &self.schedule
    }

    fn exchange_rate(&self) -> &ExchangeRateSettings {
        &self.exchange_rate
    }

    fn batch(&self) -> &BatchSettings {
        &self.batch
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("classifier.endpoint", &self.classifier.endpoint)?;
        validation::validate_url("schedule.endpoint", &self.schedule.endpoint)?;
        validation::validate_url("exchange_rate.endpoint", &self.exchange_rate.endpoint)?;
        validation::validate_non_empty_string("schedule.code_field", &self.schedule.code_field)?;

        validation::validate_range("schedule.per_page", self.schedule.per_page, 1, 10_000)?;
        validation::validate_range(
            "schedule.rate_lookup_per_page",
            self.schedule.rate_lookup_per_page,
            1,
            10_000,
        )?;

        validation::validate_positive_number("batch.max_products", self.batch.max_products, 1)?;
        validation::validate_range("batch.concurrency", self.batch.concurrency, 1, 50)?;
        validation::validate_range(
            "batch.request_timeout_seconds",
            self.batch.request_timeout_seconds,
            1,
            300,
        )?;

        if self.quota.enabled {
            validation::validate_positive_number(
                "quota.single_daily_limit",
                self.quota.single_daily_limit as usize,
                1,
            )?;
            validation::validate_positive_number(
                "quota.bulk_daily_limit",
                self.quota.bulk_daily_limit as usize,
                1,
            )?;
        }

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }
}
