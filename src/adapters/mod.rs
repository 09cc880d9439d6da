// Adapters layer: concrete implementations of the domain ports (HTTP services, quota storage).

pub mod classifier;
pub mod exchange_rate;
pub mod quota_store;
pub mod schedule;

pub use classifier::HttpClassifier;
pub use exchange_rate::UnipassExchangeRates;
pub use quota_store::{ConfiguredQuotaStore, FileQuotaStore, MemoryQuotaStore};
pub use schedule::HttpTariffSchedule;

use crate::utils::error::{Result, TariffError, Upstream};
use std::time::Duration;

/// Every outbound call shares one fixed timeout; a timed-out call is a failure, never retried.
pub fn build_http_client(timeout_seconds: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()
        .map_err(|e| TariffError::ConfigError {
            message: format!("failed to build HTTP client: {}", e),
        })
}

pub(crate) fn transport_error(service: Upstream, err: reqwest::Error) -> TariffError {
    let message = if err.is_timeout() {
        format!("request timed out: {}", err)
    } else if err.is_decode() {
        format!("could not decode response: {}", err)
    } else {
        format!("request failed: {}", err)
    };
    TariffError::external(service, message)
}
