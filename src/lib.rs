pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use config::AppConfig;
pub use self::core::{BatchReport, HttpTariffPipeline, ResolvedProduct, TariffPipeline};
pub use utils::error::{Result, TariffError};
