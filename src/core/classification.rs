use crate::domain::model::{ClassificationResult, ProductQuery};
use crate::domain::ports::Classifier;
use crate::utils::error::{Result, TariffError};

/// Validates a raw classifier answer: whitespace is removed, the first six
/// characters must all be ASCII digits.
pub fn validate_six_digit_code(raw: &str) -> Result<ClassificationResult> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let head: String = compact.chars().take(6).collect();

    if head.len() == 6 && head.chars().all(|c| c.is_ascii_digit()) {
        Ok(ClassificationResult {
            six_digit_code: head,
        })
    } else {
        Err(TariffError::InvalidClassification {
            raw: raw.to_string(),
        })
    }
}

/// No retries and no caching: one outbound call per product.
pub struct ClassificationBridge<C: Classifier> {
    classifier: C,
}

impl<C: Classifier> ClassificationBridge<C> {
    pub fn new(classifier: C) -> Self {
        Self { classifier }
    }

    pub async fn classify(&self, query: &ProductQuery) -> Result<ClassificationResult> {
        let raw = self.classifier.classify(query).await?;

        let Some(raw) = raw else {
            tracing::warn!("Classifier returned no code for {:?}", query.description);
            return Err(TariffError::InvalidClassification { raw: String::new() });
        };

        let result = validate_six_digit_code(&raw)?;
        tracing::info!(
            "🏷️ Classified {:?} ({}) as {}",
            query.description,
            query.material.korean_name(),
            result.six_digit_code
        );
        Ok(result)
    }
}
