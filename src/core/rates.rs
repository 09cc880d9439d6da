use crate::core::expander::{pad_code, scan_pages};
use crate::domain::codes::{Country, RateType};
use crate::domain::model::{RateSelection, TariffEntry};
use crate::domain::ports::TariffSchedule;
use crate::utils::error::{Result, TariffError};
use std::collections::HashSet;
use std::sync::Arc;

/// Base rate types plus the origin country's agreement types.
pub fn allowed_rate_types(country: Option<Country>) -> HashSet<RateType> {
    let mut allowed: HashSet<RateType> = RateType::BASE.iter().copied().collect();
    if let Some(country) = country {
        allowed.extend(country.extra_rate_types().iter().copied());
    }
    allowed
}

/// Keeps allowed rows, `A` first in source order, the rest by ascending rate.
pub fn order_entries(entries: Vec<TariffEntry>, country: Option<Country>) -> Vec<TariffEntry> {
    let allowed = allowed_rate_types(country);

    let (mut basic, mut others): (Vec<TariffEntry>, Vec<TariffEntry>) = entries
        .into_iter()
        .filter(|e| e.rate_type.is_some_and(|t| allowed.contains(&t)))
        .partition(|e| e.rate_type == Some(RateType::A));

    // sort_by_key is stable, equal rates keep schedule order
    others.sort_by_key(|e| e.rate_percent());
    basic.append(&mut others);
    basic
}

/// Applicable duty rates for one 10-digit code.
pub struct RateSelector<S: TariffSchedule + ?Sized> {
    schedule: Arc<S>,
    per_page: u32,
}

impl<S: TariffSchedule + ?Sized> RateSelector<S> {
    pub fn new(schedule: Arc<S>, per_page: u32) -> Self {
        Self { schedule, per_page }
    }

    pub async fn select(
        &self,
        ten_digit_code: &str,
        country: Option<Country>,
    ) -> Result<RateSelection> {
        let digits: String = ten_digit_code.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() || digits.len() > 10 {
            return Err(TariffError::invalid_input(format!(
                "expected a 10-digit HS code, got {:?}",
                ten_digit_code
            )));
        }
        let code = pad_code(&digits);

        let scan = scan_pages(self.schedule.as_ref(), &code, self.per_page, |entry| {
            entry.ten_digit_code == code
        })
        .await?;

        if scan.entries.is_empty() {
            return Err(TariffError::NoMatchFound { code });
        }

        let published = scan.entries.len();
        let entries = order_entries(scan.entries, country);
        let country_label = country.map_or("ALL", Country::code);

        if entries.is_empty() {
            tracing::warn!(
                "No allowed rate type among {} rows for {} ({})",
                published,
                code,
                country_label
            );
            return Err(TariffError::NoApplicableRate {
                code,
                country: country_label.to_string(),
            });
        }

        tracing::info!(
            "💰 {} applicable rates for {} ({}), default {}",
            entries.len(),
            code,
            country_label,
            entries[0].rate_type_code
        );

        Ok(RateSelection {
            ten_digit_code: code,
            country,
            entries,
        })
    }
}
