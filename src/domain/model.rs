use crate::domain::codes::{Country, Incoterm, Material, RateType};
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Placeholder for description fields the schedule left empty.
pub const NOT_AVAILABLE: &str = "N/A";

/// One product to classify. Consumed once by the classification bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductQuery {
    pub description: String,
    pub material: Material,
    pub notes: String,
    pub category: Option<String>,
    pub usage: Option<String>,
    pub functions: Option<String>,
}

impl ProductQuery {
    pub fn new(description: impl Into<String>, material: Material) -> Self {
        Self {
            description: description.into(),
            material,
            notes: String::new(),
            category: None,
            usage: None,
            functions: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    pub fn with_functions(mut self, functions: impl Into<String>) -> Self {
        self.functions = Some(functions.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// A schedule row exactly as the provider sent it (Korean column names).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub data: HashMap<String, serde_json::Value>,
}

impl ScheduleRecord {
    /// First non-empty value among `keys`, numbers rendered as text.
    pub fn text(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| match self.data.get(*key)? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub six_digit_code: String,
}

/// A published schedule row. Identity is `ten_digit_code + rate_type_code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffEntry {
    pub ten_digit_code: String,
    pub korean_name: String,
    pub english_name: String,
    pub valid_from: String,
    pub valid_to: String,
    /// Raw 관세율구분 as published.
    pub rate_type_code: String,
    /// `None` when the schedule publishes a code outside [`RateType`].
    pub rate_type: Option<RateType>,
    pub rate_value: String,
    pub unit: String,
}

impl TariffEntry {
    pub fn rate_percent(&self) -> Decimal {
        numeric_rate(&self.rate_value)
    }
}

/// Numeric part of a formatted rate such as `"8%"` or `"13.5 %"`.
///
/// Every character other than digits and periods is dropped, then the longest
/// leading decimal number is parsed. Anything unparsable counts as zero.
pub fn numeric_rate(rate_value: &str) -> Decimal {
    let cleaned: String = rate_value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    let mut seen_period = false;
    let prefix: String = cleaned
        .chars()
        .take_while(|c| {
            if *c == '.' {
                if seen_period {
                    return false;
                }
                seen_period = true;
            }
            true
        })
        .collect();

    Decimal::from_str(prefix.trim_end_matches('.')).unwrap_or(Decimal::ZERO)
}

/// Ordered applicable rates for one 10-digit code: `A` first, the rest by
/// ascending numeric rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSelection {
    pub ten_digit_code: String,
    pub country: Option<Country>,
    pub entries: Vec<TariffEntry>,
}

impl RateSelection {
    pub fn basic(&self) -> Option<&TariffEntry> {
        self.find(RateType::A)
    }

    /// Cheapest non-basic row, if any.
    pub fn preferential(&self) -> Option<&TariffEntry> {
        self.entries
            .iter()
            .find(|e| e.rate_type != Some(RateType::A))
    }

    pub fn find(&self, rate_type: RateType) -> Option<&TariffEntry> {
        self.entries
            .iter()
            .find(|e| e.rate_type == Some(rate_type))
    }

    /// Row used for duty: the country's primary agreement rate when published,
    /// otherwise the basic rate.
    pub fn duty_entry(&self) -> Option<&TariffEntry> {
        self.country
            .and_then(|c| self.find(c.primary_rate_type()))
            .or_else(|| self.basic())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_usd: Decimal,
    pub rates: RateSelection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentCostInput {
    pub incoterm: Incoterm,
    pub invoice_usd: Decimal,
    pub other_costs_krw: Decimal,
    pub fx_rate: Decimal,
    pub line_items: Vec<LineItem>,
}

impl ShipmentCostInput {
    /// Sum of the line item amounts, `None` when it overflows.
    pub fn line_items_usd(&self) -> Option<Decimal> {
        self.line_items
            .iter()
            .try_fold(Decimal::ZERO, |acc, item| acc.checked_add(item.product_usd))
    }
}

/// Output of the ratio stage; duty computation only accepts one of these.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CifRatioResult {
    pub(crate) incoterm: Incoterm,
    pub(crate) invoice_usd: Decimal,
    pub(crate) fx_rate: Decimal,
    pub(crate) other_costs_krw: Decimal,
    pub(crate) adjusted_krw: Decimal,
    pub(crate) cif_krw: Decimal,
    pub(crate) cif_ratio: Decimal,
}

impl CifRatioResult {
    pub fn incoterm(&self) -> Incoterm {
        self.incoterm
    }

    pub fn invoice_usd(&self) -> Decimal {
        self.invoice_usd
    }

    pub fn fx_rate(&self) -> Decimal {
        self.fx_rate
    }

    pub fn other_costs_krw(&self) -> Decimal {
        self.other_costs_krw
    }

    pub fn adjusted_krw(&self) -> Decimal {
        self.adjusted_krw
    }

    pub fn cif_krw(&self) -> Decimal {
        self.cif_krw
    }

    pub fn cif_ratio(&self) -> Decimal {
        self.cif_ratio
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemDuty {
    pub ten_digit_code: String,
    pub product_usd: Decimal,
    pub cif_krw: Decimal,
    pub rate_type: Option<RateType>,
    pub rate_percent: Decimal,
    pub duty_krw: Decimal,
    pub unratable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostBasisResult {
    pub cif_ratio: Decimal,
    pub cif_krw: Decimal,
    pub items: Vec<ItemDuty>,
    pub total_duty: Decimal,
    pub total_vat: Decimal,
}

/// Whole-KRW figures for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostSummary {
    pub cif_krw: Decimal,
    pub item_duties: Vec<Decimal>,
    pub total_duty: Decimal,
    pub total_vat: Decimal,
    pub total_tax: Decimal,
    pub unratable_codes: Vec<String>,
}

pub fn round_krw(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

impl CostBasisResult {
    pub fn summary(&self) -> CostSummary {
        CostSummary {
            cif_krw: round_krw(self.cif_krw),
            item_duties: self.items.iter().map(|i| round_krw(i.duty_krw)).collect(),
            total_duty: round_krw(self.total_duty),
            total_vat: round_krw(self.total_vat),
            total_tax: round_krw(self.total_duty + self.total_vat),
            unratable_codes: self
                .items
                .iter()
                .filter(|i| i.unratable)
                .map(|i| i.ten_digit_code.clone())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRecord {
    pub client_key: String,
    pub single_count: u32,
    pub bulk_count: u32,
    pub period_start: NaiveDate,
}

impl QuotaRecord {
    pub fn new(client_key: impl Into<String>, period_start: NaiveDate) -> Self {
        Self {
            client_key: client_key.into(),
            single_count: 0,
            bulk_count: 0,
            period_start,
        }
    }
}

/// Reported count when quotas are disabled.
pub const UNLIMITED: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemainingSearches {
    pub single: u32,
    pub bulk: u32,
    #[serde(rename = "isLimited")]
    pub is_limited: bool,
}

impl RemainingSearches {
    pub fn unlimited() -> Self {
        Self {
            single: UNLIMITED,
            bulk: UNLIMITED,
            is_limited: false,
        }
    }
}
