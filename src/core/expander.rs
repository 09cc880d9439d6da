use crate::domain::model::{ScheduleRecord, TariffEntry, NOT_AVAILABLE};
use crate::domain::ports::TariffSchedule;
use crate::utils::error::{Result, TariffError};
use std::collections::BTreeSet;
use std::sync::Arc;

const CODE_FIELDS: &[&str] = &["품목번호", "HS부호"];
const KOREAN_NAME_FIELDS: &[&str] = &["한글품목명", "품목명"];
const ENGLISH_NAME_FIELDS: &[&str] = &["영문품목명"];
const VALID_FROM_FIELDS: &[&str] = &["적용개시일자", "시작일자"];
const VALID_TO_FIELDS: &[&str] = &["적용종료일자", "종료일자"];
const RATE_TYPE_FIELDS: &[&str] = &["관세율구분"];
const RATE_VALUE_FIELDS: &[&str] = &["관세율"];
const UNIT_FIELDS: &[&str] = &["단위"];

/// Effective prefix for a 6-digit code.
///
/// A trailing `0` in the sixth position denotes the wider heading, so the
/// search drops to the first five digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPrefix {
    clean_code: String,
    search_code: String,
}

impl SearchPrefix {
    pub fn new(six_digit_code: &str) -> Result<Self> {
        let clean_code: String = six_digit_code.chars().filter(|c| c.is_ascii_digit()).collect();
        if clean_code.len() != 6 {
            return Err(TariffError::invalid_input(format!(
                "expected a 6-digit HS code, got {:?}",
                six_digit_code
            )));
        }

        let search_code = if clean_code.ends_with('0') {
            clean_code[..5].to_string()
        } else {
            clean_code.clone()
        };

        Ok(Self {
            clean_code,
            search_code,
        })
    }

    pub fn clean_code(&self) -> &str {
        &self.clean_code
    }

    /// Value sent to the schedule as the code condition.
    pub fn search_code(&self) -> &str {
        &self.search_code
    }

    pub fn matches(&self, ten_digit_code: &str) -> bool {
        if self.search_code.len() == 5 {
            ten_digit_code.get(..5) == Some(self.search_code.as_str())
        } else {
            ten_digit_code.get(..6) == Some(self.clean_code.as_str())
        }
    }
}

pub fn pad_code(code: &str) -> String {
    format!("{:0>10}", code.trim())
}

/// Turns a raw schedule row into a [`TariffEntry`]. Rows without a code are dropped.
pub fn normalize_record(record: &ScheduleRecord) -> Option<TariffEntry> {
    let code = record.text(CODE_FIELDS)?;
    let or_na = |fields: &[&str]| {
        record
            .text(fields)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    };
    let rate_type_code = record.text(RATE_TYPE_FIELDS).unwrap_or_default();

    Some(TariffEntry {
        ten_digit_code: pad_code(&code),
        korean_name: or_na(KOREAN_NAME_FIELDS),
        english_name: or_na(ENGLISH_NAME_FIELDS),
        valid_from: or_na(VALID_FROM_FIELDS),
        valid_to: or_na(VALID_TO_FIELDS),
        rate_type: rate_type_code.parse().ok(),
        rate_type_code,
        rate_value: or_na(RATE_VALUE_FIELDS),
        unit: or_na(UNIT_FIELDS),
    })
}

#[derive(Debug, Clone, Default)]
pub struct PageScan {
    pub entries: Vec<TariffEntry>,
    pub pages_fetched: u32,
    pub rows_scanned: u64,
    pub match_count: u64,
}

/// Fetches pages one at a time until a page comes back empty or the rows
/// scanned reach the server's match count for the unfiltered query. Keeps the
/// rows accepted by `keep`. Any page failure aborts the scan.
pub async fn scan_pages<S, F>(
    schedule: &S,
    query_code: &str,
    per_page: u32,
    mut keep: F,
) -> Result<PageScan>
where
    S: TariffSchedule + ?Sized,
    F: FnMut(&TariffEntry) -> bool,
{
    let mut scan = PageScan::default();
    let mut page_no: u32 = 1;

    loop {
        let page = match schedule.fetch_page(query_code, page_no, per_page).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(
                    "Schedule scan for {} aborted on page {} after {} matching rows: {}",
                    query_code,
                    page_no,
                    scan.entries.len(),
                    e
                );
                return Err(e);
            }
        };
        scan.pages_fetched = page_no;

        if page_no == 1 {
            scan.match_count = page.match_count.unwrap_or(0);
        }

        if page.rows.is_empty() {
            break;
        }

        scan.rows_scanned += page.rows.len() as u64;
        scan.entries.extend(
            page.rows
                .iter()
                .filter_map(normalize_record)
                .filter(|entry| keep(entry)),
        );

        tracing::debug!(
            "Schedule page {} for {}: scanned {}/{} rows, {} kept",
            page_no,
            query_code,
            scan.rows_scanned,
            scan.match_count,
            scan.entries.len()
        );

        if scan.rows_scanned >= scan.match_count {
            break;
        }
        page_no += 1;
    }

    Ok(scan)
}

/// Expands a 6-digit code into every matching 10-digit schedule row.
pub struct ScheduleExpander<S: TariffSchedule + ?Sized> {
    schedule: Arc<S>,
    per_page: u32,
}

impl<S: TariffSchedule + ?Sized> ScheduleExpander<S> {
    pub fn new(schedule: Arc<S>, per_page: u32) -> Self {
        Self { schedule, per_page }
    }

    pub async fn expand(&self, six_digit_code: &str) -> Result<Vec<TariffEntry>> {
        let prefix = SearchPrefix::new(six_digit_code)?;

        let scan = scan_pages(
            self.schedule.as_ref(),
            prefix.search_code(),
            self.per_page,
            |entry| prefix.matches(&entry.ten_digit_code),
        )
        .await?;

        if scan.entries.is_empty() {
            tracing::warn!(
                "No 10-digit rows for {} after {} pages",
                prefix.clean_code(),
                scan.pages_fetched
            );
            return Err(TariffError::NoMatchFound {
                code: prefix.clean_code().to_string(),
            });
        }

        tracing::info!(
            "🔎 Expanded {} (prefix {}) to {} rows over {} pages",
            prefix.clean_code(),
            prefix.search_code(),
            scan.entries.len(),
            scan.pages_fetched
        );
        Ok(scan.entries)
    }
}

/// Distinct 10-digit codes in ascending order.
pub fn candidate_codes(entries: &[TariffEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|e| e.ten_digit_code.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::codes::RateType;
    use crate::domain::ports::SchedulePage;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn record(code: serde_json::Value) -> ScheduleRecord {
        let mut data = HashMap::new();
        data.insert("HS부호".to_string(), code);
        data.insert("관세율구분".to_string(), serde_json::json!("A"));
        data.insert("관세율".to_string(), serde_json::json!("8%"));
        ScheduleRecord { data }
    }

    /// Serves fixed pages and counts requests.
    struct StubSchedule {
        pages: Vec<Vec<ScheduleRecord>>,
        match_count: u64,
        requests: AtomicU32,
        fail_on_page: Option<u32>,
    }

    impl StubSchedule {
        fn new(pages: Vec<Vec<ScheduleRecord>>, match_count: u64) -> Self {
            Self {
                pages,
                match_count,
                requests: AtomicU32::new(0),
                fail_on_page: None,
            }
        }
    }

    #[async_trait]
    impl TariffSchedule for StubSchedule {
        async fn fetch_page(&self, _code: &str, page: u32, _per_page: u32) -> Result<SchedulePage> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            if self.fail_on_page == Some(page) {
                return Err(TariffError::external(
                    crate::utils::error::Upstream::TariffSchedule,
                    "timeout",
                ));
            }
            let rows = self
                .pages
                .get(page as usize - 1)
                .cloned()
                .unwrap_or_default();
            Ok(SchedulePage {
                current_count: Some(rows.len() as u64),
                rows,
                match_count: Some(self.match_count),
                total_count: None,
            })
        }
    }

    fn filler(n: usize, code: &str) -> Vec<ScheduleRecord> {
        (0..n).map(|_| record(serde_json::json!(code))).collect()
    }

    #[test]
    fn test_trailing_zero_searches_five_digit_heading() {
        let prefix = SearchPrefix::new("841000").unwrap();
        assert_eq!(prefix.search_code(), "84100");
        assert!(prefix.matches("8410010000"));
        assert!(prefix.matches("8410020000"));
        assert!(!prefix.matches("8410990000"));
        assert!(!prefix.matches("8411000000"));
    }

    #[test]
    fn test_non_zero_sixth_digit_searches_full_code() {
        let prefix = SearchPrefix::new("841012").unwrap();
        assert_eq!(prefix.search_code(), "841012");
        assert!(prefix.matches("8410120000"));
        assert!(!prefix.matches("8410110000"));
        assert!(!prefix.matches("8410990000"));
    }

    #[test]
    fn test_prefix_strips_non_digits_and_rejects_bad_length() {
        assert_eq!(SearchPrefix::new("8410.12").unwrap().clean_code(), "841012");
        assert!(SearchPrefix::new("84101").is_err());
        assert!(SearchPrefix::new("8410120000").is_err());
    }

    #[test]
    fn test_normalize_pads_code_and_fills_placeholders() {
        let entry = normalize_record(&record(serde_json::json!(103000000u64))).unwrap();
        assert_eq!(entry.ten_digit_code, "0103000000");
        assert_eq!(entry.korean_name, NOT_AVAILABLE);
        assert_eq!(entry.english_name, NOT_AVAILABLE);
        assert_eq!(entry.rate_type, Some(RateType::A));

        let no_code = ScheduleRecord::default();
        assert!(normalize_record(&no_code).is_none());
    }

    #[test]
    fn test_unknown_rate_type_is_kept_raw() {
        let mut rec = record(serde_json::json!("3923900000"));
        rec.data
            .insert("관세율구분".to_string(), serde_json::json!("U"));
        let entry = normalize_record(&rec).unwrap();
        assert_eq!(entry.rate_type, None);
        assert_eq!(entry.rate_type_code, "U");
    }

    #[tokio::test]
    async fn test_stops_when_scanned_reaches_match_count() {
        let stub = Arc::new(StubSchedule::new(
            vec![
                filler(5000, "3923900000"),
                filler(5000, "3923100000"),
                filler(2000, "3923900000"),
                filler(10, "3923900000"),
            ],
            12000,
        ));
        let expander = ScheduleExpander::new(stub.clone(), 5000);

        let rows = expander.expand("392390").await.unwrap();

        assert_eq!(stub.requests.load(Ordering::SeqCst), 3);
        assert_eq!(rows.len(), 7000);
    }

    #[tokio::test]
    async fn test_stops_on_empty_page() {
        let stub = Arc::new(StubSchedule::new(vec![filler(3, "3923900000")], 50));
        let expander = ScheduleExpander::new(stub.clone(), 5000);

        let rows = expander.expand("392390").await.unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(stub.requests.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_matching_rows_is_no_match_found() {
        let stub = Arc::new(StubSchedule::new(vec![filler(4, "3924100000")], 4));
        let expander = ScheduleExpander::new(stub, 5000);

        let err = expander.expand("392390").await.unwrap_err();
        assert!(matches!(err, TariffError::NoMatchFound { code } if code == "392390"));
    }

    #[tokio::test]
    async fn test_page_failure_aborts_scan() {
        let mut stub = StubSchedule::new(
            vec![filler(5000, "3923900000"), filler(5000, "3923900000")],
            10000,
        );
        stub.fail_on_page = Some(2);
        let stub = Arc::new(stub);
        let expander = ScheduleExpander::new(stub.clone(), 5000);

        let err = expander.expand("392390").await.unwrap_err();

        assert!(matches!(err, TariffError::ExternalService { .. }));
        assert_eq!(stub.requests.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_candidate_codes_are_distinct_and_sorted() {
        let entries: Vec<TariffEntry> = ["3923900000", "3923100000", "3923900000"]
            .iter()
            .filter_map(|c| normalize_record(&record(serde_json::json!(c))))
            .collect();
        assert_eq!(candidate_codes(&entries), vec!["3923100000", "3923900000"]);
    }
}
