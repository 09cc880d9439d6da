use chrono::{Local, TimeZone};
use tariff_pipeline::adapters::MemoryQuotaStore;
use tariff_pipeline::config::QuotaSettings;
use tariff_pipeline::core::quota::{client_key_from_forwarded_for, QuotaGuard};
use tariff_pipeline::domain::codes::SearchType;
use tariff_pipeline::TariffError;

fn guard() -> QuotaGuard<MemoryQuotaStore> {
    QuotaGuard::new(
        QuotaSettings {
            enabled: true,
            single_daily_limit: 10,
            bulk_daily_limit: 3,
            state_file: None,
        },
        MemoryQuotaStore::new(),
    )
}

#[tokio::test]
async fn test_daily_single_limit_rolls_over() {
    let guard = guard();
    let client = client_key_from_forwarded_for(Some("203.0.113.9, 10.0.0.2"));
    let today = Local.with_ymd_and_hms(2026, 10, 16, 10, 0, 0).unwrap();
    let tomorrow = Local.with_ymd_and_hms(2026, 10, 17, 0, 5, 0).unwrap();

    for _ in 0..10 {
        guard
            .consume_at(&client, SearchType::Single, today)
            .await
            .unwrap();
    }

    let err = guard
        .consume_at(&client, SearchType::Single, today)
        .await
        .unwrap_err();
    assert!(matches!(err, TariffError::QuotaExceeded { .. }));
    assert_eq!(err.http_status(), 429);

    guard
        .consume_at(&client, SearchType::Single, tomorrow)
        .await
        .unwrap();
    let remaining = guard.remaining_at(&client, tomorrow).await.unwrap();
    assert_eq!(remaining.single, 9);
}

#[tokio::test]
async fn test_clients_have_independent_counters() {
    let guard = guard();
    let now = Local.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();

    for _ in 0..3 {
        guard.consume_at("a", SearchType::Bulk, now).await.unwrap();
    }
    assert!(guard.consume_at("a", SearchType::Bulk, now).await.is_err());
    assert!(guard.consume_at("b", SearchType::Bulk, now).await.is_ok());

    let unknown = client_key_from_forwarded_for(None);
    assert!(guard.consume_at(&unknown, SearchType::Bulk, now).await.is_ok());
}

#[tokio::test]
async fn test_remaining_serializes_with_is_limited_flag() {
    let guard = guard();
    let remaining = guard.remaining("fresh").await.unwrap();

    let json = serde_json::to_value(remaining).unwrap();
    assert_eq!(json["single"], 10);
    assert_eq!(json["bulk"], 3);
    assert_eq!(json["isLimited"], true);
}
