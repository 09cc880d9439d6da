use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

/// 上游服務識別，讓錯誤能分辨是哪個外部 API 失敗
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    Classifier,
    TariffSchedule,
    ExchangeRate,
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Upstream::Classifier => "classifier",
            Upstream::TariffSchedule => "tariff schedule",
            Upstream::ExchangeRate => "exchange rate",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    RateLimit,
    Input,
    NotFound,
    Upstream,
    Configuration,
    System,
}

#[derive(Error, Debug)]
pub enum TariffError {
    #[error("Quota exceeded for {search_type} searches: {message}")]
    QuotaExceeded { search_type: String, message: String },

    #[error("Classifier returned an invalid HS code: {raw:?}")]
    InvalidClassification { raw: String },

    #[error("No tariff schedule rows match code {code}")]
    NoMatchFound { code: String },

    #[error("No applicable rate type published for code {code} (country: {country})")]
    NoApplicableRate { code: String, country: String },

    #[error("Line items sum to {line_items_usd} USD but the invoice total is {invoice_usd} USD")]
    LineItemMismatch {
        invoice_usd: Decimal,
        line_items_usd: Decimal,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Too many products: {count} submitted, at most {max} allowed")]
    TooManyProducts { count: usize, max: usize },

    #[error("{service} service error: {message}")]
    ExternalService { service: Upstream, message: String },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for {field}: {value:?} ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

impl TariffError {
    pub fn external(service: Upstream, message: impl Into<String>) -> Self {
        TariffError::ExternalService {
            service,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        TariffError::InvalidInput {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            TariffError::QuotaExceeded { .. } => ErrorCategory::RateLimit,
            TariffError::InvalidClassification { .. } | TariffError::ExternalService { .. } => {
                ErrorCategory::Upstream
            }
            TariffError::NoMatchFound { .. } | TariffError::NoApplicableRate { .. } => {
                ErrorCategory::NotFound
            }
            TariffError::LineItemMismatch { .. }
            | TariffError::InvalidInput { .. }
            | TariffError::TooManyProducts { .. }
            | TariffError::CsvError(_) => ErrorCategory::Input,
            TariffError::ConfigError { .. }
            | TariffError::InvalidConfigValueError { .. }
            | TariffError::MissingConfigError { .. } => ErrorCategory::Configuration,
            TariffError::IoError(_) | TariffError::SerializationError(_) => ErrorCategory::System,
        }
    }

    /// HTTP status an API surface should answer with for this error.
    pub fn http_status(&self) -> u16 {
        match self.category() {
            ErrorCategory::RateLimit => 429,
            ErrorCategory::Input => 400,
            ErrorCategory::NotFound => 404,
            ErrorCategory::Upstream => 502,
            ErrorCategory::Configuration | ErrorCategory::System => 500,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            TariffError::QuotaExceeded { message, .. } => message.clone(),
            TariffError::InvalidClassification { .. } => {
                "The classifier could not produce a valid 6-digit HS code for this product."
                    .to_string()
            }
            TariffError::NoMatchFound { code } => {
                format!("No 10-digit tariff codes were found for {}.", code)
            }
            TariffError::NoApplicableRate { code, .. } => {
                format!("Code {} exists but has no applicable duty rate.", code)
            }
            TariffError::ExternalService { service, .. } => {
                format!("The {} service is currently unavailable.", service)
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            TariffError::QuotaExceeded { .. } => "Wait until tomorrow for the daily quota to reset",
            TariffError::InvalidClassification { .. } => {
                "Describe the product in more detail (material, usage, function)"
            }
            TariffError::NoMatchFound { .. } => "Check the HS code or try a broader heading",
            TariffError::NoApplicableRate { .. } => "Try without a country or with another country",
            TariffError::LineItemMismatch { .. } => {
                "Make the per-product amounts add up to the invoice total"
            }
            TariffError::InvalidInput { .. } | TariffError::TooManyProducts { .. } => {
                "Correct the input and submit again"
            }
            TariffError::ExternalService { .. } => "Try again later",
            TariffError::ConfigError { .. }
            | TariffError::InvalidConfigValueError { .. }
            | TariffError::MissingConfigError { .. } => "Check the configuration file and environment",
            _ => "Check the logs for details",
        }
    }
}

pub type Result<T> = std::result::Result<T, TariffError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_quota_exceeded_maps_to_429() {
        let err = TariffError::QuotaExceeded {
            search_type: "single".to_string(),
            message: "limit".to_string(),
        };
        assert_eq!(err.http_status(), 429);
        assert_eq!(err.category(), ErrorCategory::RateLimit);
    }

    #[test]
    fn test_external_service_names_upstream() {
        let err = TariffError::external(Upstream::TariffSchedule, "timeout");
        assert_eq!(err.to_string(), "tariff schedule service error: timeout");
        assert_eq!(err.http_status(), 502);
    }

    #[test]
    fn test_line_item_mismatch_message_names_both_sums() {
        let err = TariffError::LineItemMismatch {
            invoice_usd: dec!(1000),
            line_items_usd: dec!(900),
        };
        let message = err.to_string();
        assert!(message.contains("900"));
        assert!(message.contains("1000"));
        assert_eq!(err.http_status(), 400);
    }
}
