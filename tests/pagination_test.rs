use httpmock::prelude::*;
use serde_json::json;
use std::sync::Arc;
use tariff_pipeline::adapters::HttpTariffSchedule;
use tariff_pipeline::config::ScheduleSettings;
use tariff_pipeline::core::ScheduleExpander;
use tariff_pipeline::TariffError;

fn rows(count: usize, code: &str) -> Vec<serde_json::Value> {
    (0..count)
        .map(|_| json!({"HS부호": code, "관세율구분": "A", "관세율": "8%"}))
        .collect()
}

fn body(rows: Vec<serde_json::Value>, match_count: usize) -> serde_json::Value {
    json!({
        "currentCount": rows.len(),
        "matchCount": match_count,
        "totalCount": 12000,
        "data": rows,
    })
}

fn expander(server: &MockServer) -> ScheduleExpander<HttpTariffSchedule> {
    let schedule = HttpTariffSchedule::new(
        ScheduleSettings::new(server.url("/schedule")),
        reqwest::Client::new(),
    );
    ScheduleExpander::new(Arc::new(schedule), 5000)
}

#[tokio::test]
async fn test_match_count_of_12000_takes_exactly_three_pages() {
    let server = MockServer::start();

    let page_mocks: Vec<_> = [(1, 5000), (2, 5000), (3, 2000), (4, 100)]
        .into_iter()
        .map(|(page, count)| {
            let payload = body(rows(count, "8410110000"), 12000);
            server.mock(move |when, then| {
                when.method(GET)
                    .path("/schedule")
                    .query_param("page", page.to_string())
                    .query_param("perPage", "5000");
                then.status(200).json_body(payload);
            })
        })
        .collect();

    let entries = expander(&server).expand("841011").await.unwrap();

    assert_eq!(entries.len(), 12000);
    page_mocks[0].assert_hits(1);
    page_mocks[1].assert_hits(1);
    page_mocks[2].assert_hits(1);
    page_mocks[3].assert_hits(0);
}

#[tokio::test]
async fn test_trailing_zero_code_matches_five_digit_heading() {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(GET).path("/schedule").query_param("page", "1");
        then.status(200).json_body(body(
            vec![
                json!({"HS부호": "8410010000", "관세율구분": "A", "관세율": "8%"}),
                json!({"HS부호": "8410020000", "관세율구분": "A", "관세율": "8%"}),
                json!({"HS부호": "8410990000", "관세율구분": "A", "관세율": "8%"}),
                json!({"HS부호": "8411000000", "관세율구분": "A", "관세율": "8%"}),
            ],
            4,
        ));
    });

    let entries = expander(&server).expand("841000").await.unwrap();
    let codes: Vec<&str> = entries.iter().map(|e| e.ten_digit_code.as_str()).collect();
    assert_eq!(codes, vec!["8410010000", "8410020000"]);

    let narrow = expander(&server).expand("841012").await.unwrap_err();
    assert!(matches!(narrow, TariffError::NoMatchFound { code } if code == "841012"));
}

#[tokio::test]
async fn test_empty_page_ends_scan_before_match_count() {
    let server = MockServer::start();

    let first = server.mock(|when, then| {
        when.method(GET).path("/schedule").query_param("page", "1");
        then.status(200).json_body(body(rows(10, "3923900000"), 50));
    });
    let second = server.mock(|when, then| {
        when.method(GET).path("/schedule").query_param("page", "2");
        then.status(200).json_body(body(vec![], 50));
    });
    let third = server.mock(|when, then| {
        when.method(GET).path("/schedule").query_param("page", "3");
        then.status(200).json_body(body(rows(10, "3923900000"), 50));
    });

    let entries = expander(&server).expand("392390").await.unwrap();

    assert_eq!(entries.len(), 10);
    first.assert_hits(1);
    second.assert_hits(1);
    third.assert_hits(0);
}
