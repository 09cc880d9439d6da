use crate::adapters::transport_error;
use crate::config::ExchangeRateSettings;
use crate::domain::ports::ExchangeRateSource;
use crate::utils::error::{Result, TariffError, Upstream};
use async_trait::async_trait;
use chrono::NaiveDate;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use rust_decimal::Decimal;
use std::str::FromStr;

const RATE_NODE: &str = "trifFxrtInfoQryRsltVo";
const COUNTRY_TAG: &str = "cntySgn";
const RATE_TAG: &str = "fxrt";
/// Import-side customs exchange rate.
const IMPORT_EXPORT_TYPE: &str = "2";

/// Customs (UNIPASS) weekly exchange-rate service.
pub struct UnipassExchangeRates {
    settings: ExchangeRateSettings,
    client: Client,
}

impl UnipassExchangeRates {
    pub fn new(settings: ExchangeRateSettings, client: Client) -> Self {
        Self { settings, client }
    }
}

#[async_trait]
impl ExchangeRateSource for UnipassExchangeRates {
    async fn usd_rate(&self, date: NaiveDate) -> Result<Decimal> {
        let query_date = date.format("%Y%m%d").to_string();
        let mut request = self.client.get(&self.settings.endpoint).query(&[
            ("qryYymmDd", query_date.as_str()),
            ("imexTp", IMPORT_EXPORT_TYPE),
        ]);
        if let Some(key) = &self.settings.api_key {
            request = request.query(&[("crkyCn", key)]);
        }

        tracing::debug!("Fetching customs exchange rates for {}", query_date);

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(Upstream::ExchangeRate, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TariffError::external(
                Upstream::ExchangeRate,
                format!("HTTP {}", status),
            ));
        }

        let xml = response
            .text()
            .await
            .map_err(|e| transport_error(Upstream::ExchangeRate, e))?;

        parse_usd_rate(&xml)
    }
}

/// Picks the USD-tagged `fxrt` out of the rate list document.
pub fn parse_usd_rate(xml: &str) -> Result<Decimal> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut country = String::new();
    let mut rate = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = std::str::from_utf8(e.name().as_ref())
                    .unwrap_or("")
                    .to_string();
                if name == RATE_NODE {
                    country.clear();
                    rate.clear();
                }
                path.push(name);
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                match path.last().map(String::as_str) {
                    Some(COUNTRY_TAG) => country.push_str(&text),
                    Some(RATE_TAG) => rate.push_str(&text),
                    _ => {}
                }
            }
            Ok(Event::End(_)) => {
                let ended = path.pop().unwrap_or_default();
                if ended == RATE_NODE && country.trim() == "US" {
                    return Decimal::from_str(rate.trim()).map_err(|e| {
                        TariffError::external(
                            Upstream::ExchangeRate,
                            format!("unparsable USD rate {:?}: {}", rate, e),
                        )
                    });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(TariffError::external(
                    Upstream::ExchangeRate,
                    format!("XML parse error: {}", e),
                ));
            }
            _ => {}
        }
    }

    Err(TariffError::external(
        Upstream::ExchangeRate,
        "no USD rate in response",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<trifFxrtInfoQryRtnVo>
  <tCnt>3</tCnt>
  <trifFxrtInfoQryRsltVo>
    <cntySgn>CN</cntySgn>
    <mtryUtNm>위안</mtryUtNm>
    <fxrt>189.12</fxrt>
    <currSgn>CNY</currSgn>
  </trifFxrtInfoQryRsltVo>
  <trifFxrtInfoQryRsltVo>
    <cntySgn>US</cntySgn>
    <mtryUtNm>달러</mtryUtNm>
    <fxrt>1385.5</fxrt>
    <currSgn>USD</currSgn>
  </trifFxrtInfoQryRsltVo>
  <trifFxrtInfoQryRsltVo>
    <cntySgn>JP</cntySgn>
    <fxrt>9.21</fxrt>
  </trifFxrtInfoQryRsltVo>
</trifFxrtInfoQryRtnVo>"#;

    #[test]
    fn test_parse_usd_rate_picks_us_node() {
        assert_eq!(parse_usd_rate(SAMPLE).unwrap(), dec!(1385.5));
    }

    #[test]
    fn test_parse_skips_other_codes_containing_us() {
        let xml = "<root>\
            <trifFxrtInfoQryRsltVo><cntySgn>AU</cntySgn><fxrt>1.00</fxrt></trifFxrtInfoQryRsltVo>\
            <trifFxrtInfoQryRsltVo><cntySgn>USN</cntySgn><fxrt>2.00</fxrt></trifFxrtInfoQryRsltVo>\
            <trifFxrtInfoQryRsltVo><cntySgn> US </cntySgn><fxrt>1388.5</fxrt></trifFxrtInfoQryRsltVo>\
            </root>";
        assert_eq!(parse_usd_rate(xml).unwrap(), dec!(1388.5));
    }

    #[test]
    fn test_parse_without_usd_node_fails() {
        let xml = "<root><trifFxrtInfoQryRsltVo><cntySgn>JP</cntySgn><fxrt>9.21</fxrt></trifFxrtInfoQryRsltVo></root>";
        assert!(parse_usd_rate(xml).is_err());
    }

    #[tokio::test]
    async fn test_usd_rate_queries_by_date() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/fx")
                .query_param("qryYymmDd", "20261016")
                .query_param("imexTp", "2")
                .query_param("crkyCn", "fx-key");
            then.status(200)
                .header("Content-Type", "application/xml")
                .body(SAMPLE);
        });

        let source = UnipassExchangeRates::new(
            ExchangeRateSettings {
                endpoint: server.url("/fx"),
                api_key: Some("fx-key".to_string()),
            },
            Client::new(),
        );
        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();

        let rate = source.usd_rate(date).await.unwrap();

        api_mock.assert();
        assert_eq!(rate, dec!(1385.5));
    }
}
