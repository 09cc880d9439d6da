use crate::adapters::transport_error;
use crate::domain::model::ProductQuery;
use crate::domain::ports::Classifier;
use crate::utils::error::{Result, TariffError, Upstream};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Request body understood by the classifier endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassifierRequest<'a> {
    category: &'a str,
    material: &'a str,
    name: &'a str,
    usage: &'a str,
    functions: &'a str,
    additional_description: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClassifierResponse {
    hs_code: Option<serde_json::Value>,
}

pub struct HttpClassifier {
    endpoint: String,
    client: Client,
}

impl HttpClassifier {
    pub fn new(endpoint: impl Into<String>, client: Client) -> Self {
        Self {
            endpoint: endpoint.into(),
            client,
        }
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, query: &ProductQuery) -> Result<Option<String>> {
        let body = ClassifierRequest {
            category: query.category.as_deref().unwrap_or(""),
            material: query.material.korean_name(),
            name: &query.description,
            usage: query.usage.as_deref().unwrap_or(""),
            functions: query.functions.as_deref().unwrap_or(""),
            additional_description: &query.notes,
        };

        tracing::debug!("Calling classifier at {} for {:?}", self.endpoint, query.description);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(Upstream::Classifier, e))?;

        let status = response.status();
        tracing::debug!("Classifier response status: {}", status);

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TariffError::external(
                Upstream::Classifier,
                format!("HTTP {}: {}", status, text),
            ));
        }

        let parsed: ClassifierResponse = response
            .json()
            .await
            .map_err(|e| transport_error(Upstream::Classifier, e))?;

        Ok(parsed.hs_code.and_then(|value| match value {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }))
    }
}
