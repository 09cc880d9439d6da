pub mod classification;
pub mod cost_basis;
pub mod expander;
pub mod pipeline;
pub mod quota;
pub mod rates;

pub use classification::ClassificationBridge;
pub use cost_basis::CostBasisCalculator;
pub use expander::ScheduleExpander;
pub use pipeline::{BatchReport, HttpTariffPipeline, ResolvedProduct, TariffPipeline};
pub use quota::{QuotaDecision, QuotaGuard};
pub use rates::RateSelector;
