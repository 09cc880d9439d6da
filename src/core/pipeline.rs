use crate::adapters::{build_http_client, ConfiguredQuotaStore, HttpClassifier, HttpTariffSchedule};
use crate::config::BatchSettings;
use crate::core::classification::ClassificationBridge;
use crate::core::cost_basis::CostBasisCalculator;
use crate::core::expander::{candidate_codes, ScheduleExpander};
use crate::core::quota::QuotaGuard;
use crate::core::rates::RateSelector;
use crate::domain::codes::{Country, Material, SearchType};
use crate::domain::model::{
    ClassificationResult, CostBasisResult, ProductQuery, RateSelection, ShipmentCostInput,
    TariffEntry,
};
use crate::domain::ports::{Classifier, ConfigProvider, QuotaStore, TariffSchedule};
use crate::utils::error::{Result, TariffError};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

/// 單一產品從分類到十位碼展開的結果
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedProduct {
    pub classification: ClassificationResult,
    pub entries: Vec<TariffEntry>,
}

impl ResolvedProduct {
    pub fn candidate_codes(&self) -> Vec<String> {
        candidate_codes(&self.entries)
    }
}

#[derive(Debug)]
pub struct ProductOutcome {
    /// Position in the submitted list.
    pub index: usize,
    pub description: String,
    pub result: Result<ResolvedProduct>,
}

/// Per-product results of a bulk search, in submission order.
#[derive(Debug)]
pub struct BatchReport {
    pub outcomes: Vec<ProductOutcome>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn resolved(&self) -> impl Iterator<Item = (&ProductOutcome, &ResolvedProduct)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|r| (o, r)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&ProductOutcome, &TariffError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o, e)))
    }

    pub fn resolved_count(&self) -> usize {
        self.resolved().count()
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    /// e.g. `18 of 20 products resolved; 2 failed: mug: ...; cap: ...`
    pub fn summary(&self) -> String {
        let failed = self.failed_count();
        let head = format!(
            "{} of {} products resolved; {} failed",
            self.resolved_count(),
            self.total(),
            failed
        );
        if failed == 0 {
            return head;
        }

        let reasons: Vec<String> = self
            .failures()
            .map(|(outcome, err)| format!("{}: {}", outcome.description, err))
            .collect();
        format!("{}: {}", head, reasons.join("; "))
    }

    /// 10-digit candidates grouped under their 6-digit code.
    pub fn by_six_digit_code(&self) -> BTreeMap<String, Vec<String>> {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (_, product) in self.resolved() {
            let codes = groups
                .entry(product.classification.six_digit_code.clone())
                .or_default();
            for code in product.candidate_codes() {
                if !codes.contains(&code) {
                    codes.push(code);
                }
            }
        }
        for codes in groups.values_mut() {
            codes.sort();
        }
        groups
    }
}

/// Wires the quota guard, classifier bridge, expander, rate selector and
/// cost calculator together.
pub struct TariffPipeline<C, S, Q>
where
    C: Classifier,
    S: TariffSchedule + ?Sized,
    Q: QuotaStore,
{
    quota: QuotaGuard<Q>,
    classification: ClassificationBridge<C>,
    expander: ScheduleExpander<S>,
    rates: RateSelector<S>,
    calculator: CostBasisCalculator,
    batch: BatchSettings,
}

pub type HttpTariffPipeline =
    TariffPipeline<HttpClassifier, HttpTariffSchedule, ConfiguredQuotaStore>;

impl HttpTariffPipeline {
    /// HTTP adapters sharing one client with the configured timeout. Quota
    /// counters go to `[quota] state_file` when it is set.
    pub fn from_config(config: &impl ConfigProvider) -> Result<Self> {
        let store = ConfiguredQuotaStore::from_settings(config.quota());
        Self::with_store(config, store)
    }

    pub fn with_store(config: &impl ConfigProvider, store: ConfiguredQuotaStore) -> Result<Self> {
        let client = build_http_client(config.batch().request_timeout_seconds)?;
        let classifier = HttpClassifier::new(config.classifier_endpoint(), client.clone());
        let schedule = Arc::new(HttpTariffSchedule::new(config.schedule().clone(), client));

        Ok(Self::new(config, classifier, schedule, store))
    }
}

impl<C, S, Q> TariffPipeline<C, S, Q>
where
    C: Classifier,
    S: TariffSchedule + ?Sized,
    Q: QuotaStore,
{
    pub fn new(config: &impl ConfigProvider, classifier: C, schedule: Arc<S>, store: Q) -> Self {
        let schedule_settings = config.schedule();
        Self {
            quota: QuotaGuard::new(config.quota().clone(), store),
            classification: ClassificationBridge::new(classifier),
            expander: ScheduleExpander::new(schedule.clone(), schedule_settings.per_page),
            rates: RateSelector::new(schedule, schedule_settings.rate_lookup_per_page),
            calculator: CostBasisCalculator::new(),
            batch: config.batch().clone(),
        }
    }

    pub fn quota(&self) -> &QuotaGuard<Q> {
        &self.quota
    }

    /// Classify then expand, without touching the quota.
    pub async fn resolve_product(&self, query: &ProductQuery) -> Result<ResolvedProduct> {
        let classification = self.classification.classify(query).await?;
        let entries = self.expander.expand(&classification.six_digit_code).await?;
        Ok(ResolvedProduct {
            classification,
            entries,
        })
    }

    pub async fn resolve_single(
        &self,
        client_key: &str,
        query: &ProductQuery,
    ) -> Result<ResolvedProduct> {
        self.quota.consume(client_key, SearchType::Single).await?;
        self.resolve_product(query).await
    }

    /// One bulk quota slot covers the whole list. A failing product is
    /// reported in its own outcome and never stops the others.
    pub async fn resolve_bulk(
        &self,
        client_key: &str,
        products: Vec<ProductQuery>,
    ) -> Result<BatchReport> {
        if products.is_empty() {
            return Err(TariffError::invalid_input("no products submitted"));
        }
        if products.len() > self.batch.max_products {
            return Err(TariffError::TooManyProducts {
                count: products.len(),
                max: self.batch.max_products,
            });
        }

        self.quota.consume(client_key, SearchType::Bulk).await?;

        tracing::info!(
            "📦 Bulk search for {}: {} products, concurrency {}",
            client_key,
            products.len(),
            self.batch.concurrency
        );

        let outcomes: Vec<ProductOutcome> = stream::iter(products.into_iter().enumerate())
            .map(|(index, query)| async move {
                let result = self.resolve_product(&query).await;
                if let Err(e) = &result {
                    tracing::warn!("❌ Product #{} {:?} failed: {}", index + 1, query.description, e);
                }
                ProductOutcome {
                    index,
                    description: query.description,
                    result,
                }
            })
            .buffered(self.batch.concurrency.max(1))
            .collect()
            .await;

        let report = BatchReport { outcomes };
        tracing::info!("{}", report.summary());
        Ok(report)
    }

    pub async fn expand(&self, six_digit_code: &str) -> Result<Vec<TariffEntry>> {
        self.expander.expand(six_digit_code).await
    }

    pub async fn select_rates(
        &self,
        ten_digit_code: &str,
        country: Option<Country>,
    ) -> Result<RateSelection> {
        self.rates.select(ten_digit_code, country).await
    }

    pub fn compute_cost(&self, input: &ShipmentCostInput) -> Result<CostBasisResult> {
        let ratio = self.calculator.compute_cif_ratio(input)?;
        self.calculator.compute_duty_and_vat(input, &ratio)
    }
}

#[derive(Debug, Deserialize)]
struct ProductRow {
    #[serde(rename = "제품명")]
    name: String,
    #[serde(rename = "재질코드", default)]
    material: String,
    #[serde(rename = "기타", default)]
    notes: String,
}

/// Reads a product sheet with the `제품명,재질코드,기타` header. Rows without a
/// name are skipped.
pub fn read_products<R: Read>(reader: R) -> Result<Vec<ProductQuery>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let mut products = Vec::new();
    for row in rdr.deserialize::<ProductRow>() {
        let row = row?;
        if row.name.is_empty() {
            continue;
        }
        products.push(
            ProductQuery::new(row.name, Material::from_code(&row.material)).with_notes(row.notes),
        );
    }
    Ok(products)
}

pub fn load_products_from_csv(path: impl AsRef<Path>) -> Result<Vec<ProductQuery>> {
    let path = path.as_ref();
    tracing::debug!("Loading products from {}", path.display());
    let file = std::fs::File::open(path)?;
    read_products(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryQuotaStore;
    use crate::config::{AppConfig, ClassifierSettings, ExchangeRateSettings, QuotaSettings, ScheduleSettings};
    use crate::domain::model::ScheduleRecord;
    use crate::domain::ports::SchedulePage;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Answers by product description.
    struct TableClassifier(HashMap<&'static str, &'static str>);

    #[async_trait]
    impl Classifier for TableClassifier {
        async fn classify(&self, query: &ProductQuery) -> Result<Option<String>> {
            Ok(self.0.get(query.description.as_str()).map(|c| c.to_string()))
        }
    }

    struct TableSchedule(Vec<&'static str>);

    #[async_trait]
    impl TariffSchedule for TableSchedule {
        async fn fetch_page(&self, code: &str, page: u32, _per_page: u32) -> Result<SchedulePage> {
            if page > 1 {
                return Ok(SchedulePage::default());
            }
            let rows: Vec<ScheduleRecord> = self
                .0
                .iter()
                .filter(|c| c.starts_with(code))
                .map(|c| {
                    let mut record = ScheduleRecord::default();
                    record.data.insert("HS부호".into(), serde_json::json!(c));
                    record
                })
                .collect();
            Ok(SchedulePage {
                match_count: Some(rows.len() as u64),
                current_count: Some(rows.len() as u64),
                rows,
                total_count: None,
            })
        }
    }

    fn config(max_products: usize) -> AppConfig {
        AppConfig {
            quota: QuotaSettings {
                enabled: true,
                single_daily_limit: 10,
                bulk_daily_limit: 1,
                state_file: None,
            },
            classifier: ClassifierSettings {
                endpoint: "http://localhost/classify".to_string(),
            },
            schedule: ScheduleSettings::new("http://localhost/schedule"),
            exchange_rate: ExchangeRateSettings {
                endpoint: "http://localhost/fx".to_string(),
                api_key: None,
            },
            batch: BatchSettings {
                max_products,
                concurrency: 3,
                request_timeout_seconds: 5,
            },
        }
    }

    fn pipeline(
        max_products: usize,
    ) -> TariffPipeline<TableClassifier, TableSchedule, MemoryQuotaStore> {
        let classifier = TableClassifier(HashMap::from([
            ("plastic water bottle", "392390"),
            ("rubber glove", "401519"),
            ("mystery", "unknown"),
            ("ghost", "999999"),
        ]));
        let schedule = TableSchedule(vec!["3923900000", "3923901000", "4015190000"]);
        TariffPipeline::new(
            &config(max_products),
            classifier,
            Arc::new(schedule),
            MemoryQuotaStore::new(),
        )
    }

    fn products(names: &[&str]) -> Vec<ProductQuery> {
        names
            .iter()
            .map(|n| ProductQuery::new(*n, Material::Unknown))
            .collect()
    }

    #[tokio::test]
    async fn test_bulk_reports_partial_failures_in_order() {
        let pipeline = pipeline(20);

        let report = pipeline
            .resolve_bulk(
                "10.0.0.1",
                products(&["plastic water bottle", "mystery", "rubber glove", "ghost"]),
            )
            .await
            .unwrap();

        assert_eq!(report.total(), 4);
        assert_eq!(report.resolved_count(), 2);
        let indexes: Vec<usize> = report.outcomes.iter().map(|o| o.index).collect();
        assert_eq!(indexes, vec![0, 1, 2, 3]);
        assert!(matches!(
            report.outcomes[1].result,
            Err(TariffError::InvalidClassification { .. })
        ));
        assert!(matches!(
            report.outcomes[3].result,
            Err(TariffError::NoMatchFound { .. })
        ));

        let summary = report.summary();
        assert!(summary.starts_with("2 of 4 products resolved; 2 failed: mystery: "));
        assert!(summary.contains("ghost: "));

        let groups = report.by_six_digit_code();
        assert_eq!(
            groups.get("392390").unwrap(),
            &vec!["3923900000".to_string(), "3923901000".to_string()]
        );
        assert_eq!(groups.get("401519").unwrap(), &vec!["4015190000".to_string()]);
    }

    #[tokio::test]
    async fn test_bulk_over_limit_is_rejected_before_quota() {
        let pipeline = pipeline(2);

        let err = pipeline
            .resolve_bulk("c", products(&["a", "b", "c"]))
            .await
            .unwrap_err();
        assert!(matches!(err, TariffError::TooManyProducts { count: 3, max: 2 }));

        // the rejected request did not spend the single bulk slot
        assert!(pipeline
            .resolve_bulk("c", products(&["rubber glove"]))
            .await
            .is_ok());
        assert!(matches!(
            pipeline.resolve_bulk("c", products(&["rubber glove"])).await,
            Err(TariffError::QuotaExceeded { .. })
        ));
    }

    #[tokio::test]
    async fn test_single_search_spends_quota_even_on_failure() {
        let pipeline = pipeline(20);
        let query = ProductQuery::new("mystery", Material::Unknown);

        assert!(pipeline.resolve_single("c", &query).await.is_err());

        let remaining = pipeline.quota().remaining("c").await.unwrap();
        assert_eq!(remaining.single, 9);
    }

    #[test]
    fn test_read_products_from_sheet() {
        let sheet = "제품명,재질코드,기타\n plastic water bottle ,P,500ml\nleather belt,L,\n,P,skipped\nvase,X,\n";

        let products = read_products(sheet.as_bytes()).unwrap();

        assert_eq!(products.len(), 3);
        assert_eq!(products[0].description, "plastic water bottle");
        assert_eq!(products[0].material, Material::Plastic);
        assert_eq!(products[0].notes, "500ml");
        assert_eq!(products[1].material, Material::Leather);
        assert_eq!(products[2].material, Material::Unknown);
    }

    #[test]
    fn test_load_products_from_csv_file() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "제품명,재질코드,기타").unwrap();
        writeln!(file, "glass cup,G,").unwrap();

        let products = load_products_from_csv(file.path()).unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].material, Material::Glass);
    }
}
