use crate::config::{BatchSettings, ExchangeRateSettings, QuotaSettings, ScheduleSettings};
use crate::domain::codes::SearchType;
use crate::domain::model::{ProductQuery, QuotaRecord, ScheduleRecord};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// External HS classifier. Returns the raw code string, `None` when the
/// response carried no code at all.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, query: &ProductQuery) -> Result<Option<String>>;
}

/// One page of the external tariff schedule.
#[derive(Debug, Clone, Default)]
pub struct SchedulePage {
    pub rows: Vec<ScheduleRecord>,
    /// Rows the server matched for the unfiltered query.
    pub match_count: Option<u64>,
    /// Rows carried by this page.
    pub current_count: Option<u64>,
    pub total_count: Option<u64>,
}

#[async_trait]
pub trait TariffSchedule: Send + Sync {
    /// `page` is 1-indexed.
    async fn fetch_page(&self, code: &str, page: u32, per_page: u32) -> Result<SchedulePage>;
}

#[async_trait]
pub trait ExchangeRateSource: Send + Sync {
    /// KRW per USD published for `date`.
    async fn usd_rate(&self, date: NaiveDate) -> Result<Decimal>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaOutcome {
    Accepted(QuotaRecord),
    Rejected(QuotaRecord),
}

/// Per-client daily counters. Implementations own the atomicity of
/// [`QuotaStore::increment_if_below`] for a given key.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    async fn get(&self, client_key: &str) -> Result<Option<QuotaRecord>>;

    /// Starts a fresh period when the stored one began before `today`, then
    /// increments the `search_type` counter only if it is below `limit`.
    async fn increment_if_below(
        &self,
        client_key: &str,
        search_type: SearchType,
        limit: u32,
        today: NaiveDate,
    ) -> Result<QuotaOutcome>;

    async fn reset(&self, client_key: &str, today: NaiveDate) -> Result<()>;
}

pub trait ConfigProvider: Send + Sync {
    fn quota(&self) -> &QuotaSettings;
    fn classifier_endpoint(&self) -> &str;
    fn schedule(&self) -> &ScheduleSettings;
    fn exchange_rate(&self) -> &ExchangeRateSettings;
    fn batch(&self) -> &BatchSettings;
}
