use chrono::Local;
use clap::Parser;
use tariff_pipeline::adapters::{build_http_client, UnipassExchangeRates};
use tariff_pipeline::config::cli::Command;
use tariff_pipeline::core::quota::client_key_from_forwarded_for;
use tariff_pipeline::domain::codes::{Country, Incoterm, Material};
use tariff_pipeline::domain::model::{LineItem, ProductQuery, ShipmentCostInput, TariffEntry};
use tariff_pipeline::domain::ports::{ConfigProvider, ExchangeRateSource};
use tariff_pipeline::utils::error::ErrorCategory;
use tariff_pipeline::utils::logger;
use tariff_pipeline::{AppConfig, CliConfig, HttpTariffPipeline, ResolvedProduct, TariffError};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("🚀 Starting tariff-pipeline");

    let config = match cli.load_app_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration failed: {}", e);
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&cli, &config).await {
        tracing::error!("❌ {} (category: {:?})", e, e.category());
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(exit_code(&e));
    }

    Ok(())
}

fn exit_code(err: &TariffError) -> i32 {
    match err.category() {
        ErrorCategory::Input | ErrorCategory::NotFound => 1,
        ErrorCategory::RateLimit => 2,
        ErrorCategory::Upstream => 3,
        ErrorCategory::Configuration | ErrorCategory::System => 4,
    }
}

async fn run(cli: &CliConfig, config: &AppConfig) -> tariff_pipeline::Result<()> {
    let pipeline = HttpTariffPipeline::from_config(config)?;
    let client_key = client_key_from_forwarded_for(cli.client.as_deref());

    match &cli.command {
        Command::Classify {
            name,
            material,
            notes,
            category,
            usage,
            functions,
        } => {
            let mut query = ProductQuery::new(name.clone(), Material::from_code(material))
                .with_notes(notes.clone());
            query.category = category.clone();
            query.usage = usage.clone();
            query.functions = functions.clone();

            let product = pipeline.resolve_single(&client_key, &query).await?;
            print_product(name, &product);
        }
        Command::Expand { code } => {
            let entries = pipeline.expand(code).await?;
            print_entries(&entries);
        }
        Command::Bulk { file } => {
            let products = tariff_pipeline::core::pipeline::load_products_from_csv(file)?;
            let report = pipeline.resolve_bulk(&client_key, products).await?;

            for (six_digit_code, codes) in report.by_six_digit_code() {
                println!("📂 {}", six_digit_code);
                for code in codes {
                    println!("   {}", code);
                }
            }
            for (outcome, err) in report.failures() {
                println!("⚠️  #{} {}: {}", outcome.index + 1, outcome.description, err);
            }
            println!("{}", report.summary());
        }
        Command::Rates { code, country } => {
            let country = Country::parse_optional(country)?;
            let selection = pipeline.select_rates(code, country).await?;

            if let Some(country) = country {
                println!("🌏 {} ({})", country.korean_name(), country);
            }
            for (i, entry) in selection.entries.iter().enumerate() {
                let marker = if i == 0 { "👉" } else { "  " };
                let description = entry
                    .rate_type
                    .map(|t| t.description().to_string())
                    .unwrap_or_else(|| entry.rate_type_code.clone());
                println!("{} {:<32} {}", marker, description, entry.rate_value);
            }
            if let Some(cheapest) = selection.preferential() {
                println!("🏷️  Lowest alternative: {} {}", cheapest.rate_type_code, cheapest.rate_value);
            }
            if let Some(duty) = selection.duty_entry() {
                println!("💰 Duty rate used for cost: {} {}", duty.rate_type_code, duty.rate_value);
            }
        }
        Command::Cost {
            incoterm,
            invoice_usd,
            other_costs_krw,
            fx_rate,
            country,
            items,
        } => {
            let incoterm: Incoterm = incoterm.parse()?;
            let country = Country::parse_optional(country)?;
            let fx_rate = match fx_rate {
                Some(rate) => *rate,
                None => fetch_fx_rate(config, Local::now().date_naive()).await?,
            };

            let mut line_items = Vec::with_capacity(items.len());
            for (code, product_usd) in items {
                line_items.push(LineItem {
                    product_usd: *product_usd,
                    rates: pipeline.select_rates(code, country).await?,
                });
            }

            let input = ShipmentCostInput {
                incoterm,
                invoice_usd: *invoice_usd,
                other_costs_krw: *other_costs_krw,
                fx_rate,
                line_items,
            };
            let result = pipeline.compute_cost(&input)?;
            let summary = result.summary();

            println!("📦 {} CIF: {} KRW (ratio {})", incoterm, summary.cif_krw, result.cif_ratio.round_dp(4));
            for (item, duty) in result.items.iter().zip(&summary.item_duties) {
                let rate = item.rate_type.map_or("-", |t| t.code());
                println!("   {} {:>6} {}% → {} KRW", item.ten_digit_code, rate, item.rate_percent, duty);
            }
            println!("🧾 Duty: {} KRW", summary.total_duty);
            println!("🧾 VAT:  {} KRW", summary.total_vat);
            println!("💰 Total: {} KRW", summary.total_tax);
            if !summary.unratable_codes.is_empty() {
                println!("⚠️  No applicable rate for: {}", summary.unratable_codes.join(", "));
            }
        }
        Command::Fx { date } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let rate = fetch_fx_rate(config, date).await?;
            println!("💱 {} USD/KRW: {}", date, rate);
        }
        Command::Quota => {
            let remaining = pipeline.quota().remaining(&client_key).await?;
            println!("{}", serde_json::to_string_pretty(&remaining)?);
        }
    }

    Ok(())
}

async fn fetch_fx_rate(
    config: &AppConfig,
    date: chrono::NaiveDate,
) -> tariff_pipeline::Result<rust_decimal::Decimal> {
    let client = build_http_client(config.batch().request_timeout_seconds)?;
    let source = UnipassExchangeRates::new(config.exchange_rate().clone(), client);
    let rate = source.usd_rate(date).await?;
    tracing::info!("💱 Customs USD rate for {}: {}", date, rate);
    Ok(rate)
}

fn print_product(name: &str, product: &ResolvedProduct) {
    println!("🏷️  {} → {}", name, product.classification.six_digit_code);
    print_entries(&product.entries);
}

fn print_entries(entries: &[TariffEntry]) {
    let mut seen = std::collections::HashSet::new();
    for entry in entries {
        if seen.insert(entry.ten_digit_code.as_str()) {
            println!("   {}  {}  {}", entry.ten_digit_code, entry.korean_name, entry.english_name);
        }
    }
    println!("✅ {} candidate codes", seen.len());
}
