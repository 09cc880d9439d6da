use crate::adapters::transport_error;
use crate::config::ScheduleSettings;
use crate::domain::model::ScheduleRecord;
use crate::domain::ports::{SchedulePage, TariffSchedule};
use crate::utils::error::{Result, TariffError, Upstream};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleResponse {
    data: Option<Vec<HashMap<String, serde_json::Value>>>,
    match_count: Option<u64>,
    current_count: Option<u64>,
    total_count: Option<u64>,
}

/// Client for the public tariff schedule (odcloud style paging API).
pub struct HttpTariffSchedule {
    settings: ScheduleSettings,
    client: Client,
}

impl HttpTariffSchedule {
    pub fn new(settings: ScheduleSettings, client: Client) -> Self {
        Self { settings, client }
    }

    fn condition_key(&self) -> String {
        format!("cond[{}::EQ]", self.settings.code_field)
    }
}

#[async_trait]
impl TariffSchedule for HttpTariffSchedule {
    async fn fetch_page(&self, code: &str, page: u32, per_page: u32) -> Result<SchedulePage> {
        let mut request = self.client.get(&self.settings.endpoint).query(&[
            ("page", page.to_string()),
            ("perPage", per_page.to_string()),
            ("returnType", "JSON".to_string()),
            (self.condition_key().as_str(), code.to_string()),
        ]);

        if let Some(key) = &self.settings.service_key {
            request = request.query(&[("serviceKey", key)]);
        }

        tracing::debug!(
            "📡 Schedule request: code={} page={} perPage={}",
            code,
            page,
            per_page
        );

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(Upstream::TariffSchedule, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TariffError::external(
                Upstream::TariffSchedule,
                format!("HTTP {} on page {}", status, page),
            ));
        }

        let body: ScheduleResponse = response
            .json()
            .await
            .map_err(|e| transport_error(Upstream::TariffSchedule, e))?;

        let rows = body.data.ok_or_else(|| {
            TariffError::external(
                Upstream::TariffSchedule,
                format!("page {} carried no data array", page),
            )
        })?;

        Ok(SchedulePage {
            rows: rows.into_iter().map(|data| ScheduleRecord { data }).collect(),
            match_count: body.match_count,
            current_count: body.current_count,
            total_count: body.total_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn settings(endpoint: String) -> ScheduleSettings {
        let mut settings = ScheduleSettings::new(endpoint);
        settings.service_key = Some("test-key".to_string());
        settings
    }

    #[tokio::test]
    async fn test_fetch_page_sends_paging_and_condition() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/schedule")
                .query_param("page", "2")
                .query_param("perPage", "5000")
                .query_param("returnType", "JSON")
                .query_param("cond[HS부호::EQ]", "39239")
                .query_param("serviceKey", "test-key");
            then.status(200).json_body(serde_json::json!({
                "data": [{"HS부호": 3923900000u64, "관세율구분": "A", "관세율": "6.5%"}],
                "matchCount": 1,
                "currentCount": 1,
                "totalCount": 12000
            }));
        });

        let schedule = HttpTariffSchedule::new(settings(server.url("/schedule")), Client::new());
        let page = schedule.fetch_page("39239", 2, 5000).await.unwrap();

        api_mock.assert();
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.match_count, Some(1));
        assert_eq!(page.total_count, Some(12000));
        assert_eq!(
            page.rows[0].text(&["HS부호"]).as_deref(),
            Some("3923900000")
        );
    }

    #[tokio::test]
    async fn test_missing_data_array_is_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/schedule");
            then.status(200).json_body(serde_json::json!({"matchCount": 0}));
        });

        let schedule = HttpTariffSchedule::new(settings(server.url("/schedule")), Client::new());
        let err = schedule.fetch_page("39239", 1, 5000).await.unwrap_err();

        assert!(matches!(
            err,
            TariffError::ExternalService {
                service: Upstream::TariffSchedule,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/schedule");
            then.status(503);
        });

        let schedule = HttpTariffSchedule::new(settings(server.url("/schedule")), Client::new());
        let err = schedule.fetch_page("39239", 1, 5000).await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }
}
