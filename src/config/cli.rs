use crate::config::AppConfig;
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Parser)]
#[command(name = "tariff-pipeline")]
#[command(about = "HS code classification, tariff lookup and duty estimation")]
pub struct CliConfig {
    /// TOML configuration file; environment variables are used when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Client identity for quota accounting (an X-Forwarded-For value)
    #[arg(long, global = true)]
    pub client: Option<String>,

    #[arg(long, global = true)]
    pub classifier_url: Option<String>,

    #[arg(long, global = true)]
    pub schedule_url: Option<String>,

    #[arg(long, global = true)]
    pub fx_url: Option<String>,

    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    #[arg(long, global = true)]
    pub timeout_seconds: Option<u64>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit JSON log lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Classify one product and expand its 10-digit codes
    Classify {
        /// Product name
        name: String,
        /// 재질코드 (P, R, C, G, T, L, M, PA, W, N)
        #[arg(short, long, default_value = "N")]
        material: String,
        #[arg(long, default_value = "")]
        notes: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        usage: Option<String>,
        #[arg(long)]
        functions: Option<String>,
    },
    /// Expand a 6-digit code into the national 10-digit codes
    Expand { code: String },
    /// Classify every product of a `제품명,재질코드,기타` CSV sheet
    Bulk { file: PathBuf },
    /// Applicable duty rates for a 10-digit code
    Rates {
        code: String,
        /// ISO3 origin country, `ALL` for none
        #[arg(long, default_value = "ALL")]
        country: String,
    },
    /// CIF basis, duty and VAT for a shipment
    Cost {
        /// EXW/FCA, FOB, CFR/CIF or DAP/DDP
        #[arg(long)]
        incoterm: String,
        #[arg(long)]
        invoice_usd: Decimal,
        #[arg(long, default_value = "0")]
        other_costs_krw: Decimal,
        /// KRW per USD; today's customs rate is fetched when omitted
        #[arg(long)]
        fx_rate: Option<Decimal>,
        #[arg(long, default_value = "ALL")]
        country: String,
        /// `<10-digit code>=<USD amount>`, repeatable
        #[arg(long = "item", required = true, value_parser = parse_line_item)]
        items: Vec<(String, Decimal)>,
    },
    /// Customs USD exchange rate
    Fx {
        /// YYYY-MM-DD, defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Remaining daily searches for the client
    Quota,
}

fn parse_line_item(raw: &str) -> std::result::Result<(String, Decimal), String> {
    let (code, amount) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected <code>=<usd>, got {:?}", raw))?;
    let amount = Decimal::from_str(amount.trim())
        .map_err(|e| format!("invalid USD amount {:?}: {}", amount, e))?;
    Ok((code.trim().to_string(), amount))
}

impl CliConfig {
    /// File or environment configuration with the command-line overrides applied.
    pub fn load_app_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => {
                tracing::info!("📁 Loading configuration from: {}", path.display());
                AppConfig::from_file(path)?
            }
            None => AppConfig::from_env()?,
        };
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(url) = &self.classifier_url {
            config.classifier.endpoint = url.clone();
        }
        if let Some(url) = &self.schedule_url {
            config.schedule.endpoint = url.clone();
        }
        if let Some(url) = &self.fx_url {
            config.exchange_rate.endpoint = url.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.batch.concurrency = concurrency;
        }
        if let Some(timeout) = self.timeout_seconds {
            config.batch.request_timeout_seconds = timeout;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_cost_command() {
        let cli = CliConfig::parse_from([
            "tariff-pipeline",
            "cost",
            "--incoterm",
            "DAP/DDP",
            "--invoice-usd",
            "1000",
            "--other-costs-krw",
            "50000",
            "--fx-rate",
            "1300",
            "--item",
            "3923900000=400",
            "--item",
            "4015190000=600",
        ]);

        match cli.command {
            Command::Cost {
                invoice_usd,
                fx_rate,
                items,
                ..
            } => {
                assert_eq!(invoice_usd, dec!(1000));
                assert_eq!(fx_rate, Some(dec!(1300)));
                assert_eq!(items[1], ("4015190000".to_string(), dec!(600)));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_line_item_rejects_missing_amount() {
        assert!(parse_line_item("3923900000").is_err());
        assert!(parse_line_item("3923900000=abc").is_err());
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let toml = r#"
[classifier]
endpoint = "https://classifier.example.com/hscode"

[schedule]
endpoint = "https://api.odcloud.kr/api/15049722/v1/uddi"

[exchange_rate]
endpoint = "https://unipass.customs.go.kr/fx"
"#;
        let mut config = AppConfig::from_toml_str(toml).unwrap();
        let cli = CliConfig::parse_from([
            "tariff-pipeline",
            "--concurrency",
            "2",
            "--schedule-url",
            "http://127.0.0.1:9000/schedule",
            "quota",
        ]);

        cli.apply_overrides(&mut config);

        assert_eq!(config.batch.concurrency, 2);
        assert_eq!(config.schedule.endpoint, "http://127.0.0.1:9000/schedule");
        assert!(config.validate().is_ok());
    }
}
