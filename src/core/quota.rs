use crate::config::QuotaSettings;
use crate::domain::codes::SearchType;
use crate::domain::model::RemainingSearches;
use crate::domain::ports::{QuotaOutcome, QuotaStore};
use crate::utils::error::{Result, TariffError};
use chrono::{DateTime, Local, NaiveDate};

/// Bucket used when the request carries no forwarded address.
pub const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed,
    Denied(String),
}

impl QuotaDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, QuotaDecision::Allowed)
    }
}

/// Client identity: first token of `X-Forwarded-For`, else [`UNKNOWN_CLIENT`].
pub fn client_key_from_forwarded_for(header: Option<&str>) -> String {
    header
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

pub fn denial_message(search_type: SearchType) -> String {
    match search_type {
        SearchType::Single => "Daily limit for single searches exceeded (개별 검색 일일 한도를 초과했습니다).".to_string(),
        SearchType::Bulk => "Daily limit for bulk searches exceeded (벌크 검색 일일 한도를 초과했습니다).".to_string(),
    }
}

/// Daily per-client gate in front of every expensive lookup.
pub struct QuotaGuard<Q: QuotaStore> {
    settings: QuotaSettings,
    store: Q,
}

impl<Q: QuotaStore> QuotaGuard<Q> {
    pub fn new(settings: QuotaSettings, store: Q) -> Self {
        Self { settings, store }
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    fn limit_for(&self, search_type: SearchType) -> u32 {
        match search_type {
            SearchType::Single => self.settings.single_daily_limit,
            SearchType::Bulk => self.settings.bulk_daily_limit,
        }
    }

    pub async fn check_and_consume(
        &self,
        client_key: &str,
        search_type: SearchType,
    ) -> Result<QuotaDecision> {
        self.check_and_consume_at(client_key, search_type, Local::now())
            .await
    }

    /// Consumed slots are not refunded when the downstream work later fails.
    pub async fn check_and_consume_at(
        &self,
        client_key: &str,
        search_type: SearchType,
        now: DateTime<Local>,
    ) -> Result<QuotaDecision> {
        if !self.settings.enabled {
            return Ok(QuotaDecision::Allowed);
        }

        let limit = self.limit_for(search_type);
        let outcome = self
            .store
            .increment_if_below(client_key, search_type, limit, today(now))
            .await?;

        match outcome {
            QuotaOutcome::Accepted(record) => {
                tracing::debug!(
                    "Quota accepted for {} ({}): single={} bulk={}",
                    client_key,
                    search_type,
                    record.single_count,
                    record.bulk_count
                );
                Ok(QuotaDecision::Allowed)
            }
            QuotaOutcome::Rejected(_) => {
                tracing::warn!(
                    "🚫 Quota denied for {} ({} limit {})",
                    client_key,
                    search_type,
                    limit
                );
                Ok(QuotaDecision::Denied(denial_message(search_type)))
            }
        }
    }

    /// Like [`QuotaGuard::check_and_consume`] but turns a denial into
    /// [`TariffError::QuotaExceeded`].
    pub async fn consume(&self, client_key: &str, search_type: SearchType) -> Result<()> {
        self.consume_at(client_key, search_type, Local::now()).await
    }

    pub async fn consume_at(
        &self,
        client_key: &str,
        search_type: SearchType,
        now: DateTime<Local>,
    ) -> Result<()> {
        match self.check_and_consume_at(client_key, search_type, now).await? {
            QuotaDecision::Allowed => Ok(()),
            QuotaDecision::Denied(message) => Err(TariffError::QuotaExceeded {
                search_type: search_type.to_string(),
                message,
            }),
        }
    }

    pub async fn remaining(&self, client_key: &str) -> Result<RemainingSearches> {
        self.remaining_at(client_key, Local::now()).await
    }

    pub async fn remaining_at(
        &self,
        client_key: &str,
        now: DateTime<Local>,
    ) -> Result<RemainingSearches> {
        if !self.settings.enabled {
            return Ok(RemainingSearches::unlimited());
        }

        let single_limit = self.settings.single_daily_limit;
        let bulk_limit = self.settings.bulk_daily_limit;

        let remaining = match self.store.get(client_key).await? {
            Some(record) if record.period_start >= today(now) => RemainingSearches {
                single: single_limit.saturating_sub(record.single_count),
                bulk: bulk_limit.saturating_sub(record.bulk_count),
                is_limited: true,
            },
            _ => RemainingSearches {
                single: single_limit,
                bulk: bulk_limit,
                is_limited: true,
            },
        };

        Ok(remaining)
    }
}

fn today(now: DateTime<Local>) -> NaiveDate {
    now.date_naive()
}
