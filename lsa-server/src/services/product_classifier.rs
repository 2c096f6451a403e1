//! Product-name classification
//!
//! Decides which raw product names denote the same product. Deduplication
//! delegates this decision and only applies the result.
//!
//! Two implementations:
//! - [`HttpProductClassifier`] calls the configured AI classification endpoint
//! - [`SimilarityClassifier`] groups locally by normalized name tokens

use async_trait::async_trait;
use lsa_common::config::ClassifierConfig;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// One group of names the classifier considers the same product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameGroup {
    pub canonical_name: String,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClassifierError {
    #[error("Classifier request failed: {0}")]
    Network(String),

    #[error("Classifier returned error: {0}")]
    Api(String),

    #[error("Malformed classifier response: {0}")]
    Malformed(String),

    #[error("Classifier timed out after {0} ms")]
    Timeout(u64),
}

/// Groups raw product names into canonical products
///
/// Given the same input, an implementation must return the same grouping.
/// Names left out of every group stay ungrouped.
#[async_trait]
pub trait ProductClassifier: Send + Sync {
    async fn classify(&self, names: &[String]) -> Result<Vec<NameGroup>, ClassifierError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    names: &'a [String],
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    groups: Vec<NameGroup>,
}

/// Classifier backed by the external AI service
pub struct HttpProductClassifier {
    http_client: Client,
    endpoint: String,
}

impl HttpProductClassifier {
    pub fn new(endpoint: String, config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let mut headers = header::HeaderMap::new();
        if let Some(api_key) = &config.api_key {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| ClassifierError::Api(format!("Invalid API key header: {}", e)))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let http_client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .default_headers(headers)
            .build()
            .map_err(|e| ClassifierError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint,
        })
    }
}

#[async_trait]
impl ProductClassifier for HttpProductClassifier {
    async fn classify(&self, names: &[String]) -> Result<Vec<NameGroup>, ClassifierError> {
        let started = Instant::now();
        debug!(endpoint = %self.endpoint, names = names.len(), "Calling product classifier");

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&ClassifyRequest { names })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClassifierError::Timeout(started.elapsed().as_millis() as u64)
                } else {
                    ClassifierError::Network(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Api(format!("{}: {}", status, body)));
        }

        let parsed: ClassifyResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::Malformed(e.to_string()))?;

        debug!(
            groups = parsed.groups.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Product classifier responded"
        );

        Ok(parsed.groups)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Minimum normalized Levenshtein similarity for two names to be merged
const SIMILARITY_THRESHOLD: f64 = 0.9;

/// Local classifier used when no endpoint is configured
///
/// Names are compared on a normalized key: lowercase, common Portuguese
/// accents folded, tokens singularized, quantity suffixes dropped ("3pc" →
/// "3") and tokens sorted. A name joins the first group whose key is equal,
/// or within [`SIMILARITY_THRESHOLD`] with the same quantities. The first name
/// seen in a group becomes its canonical name.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimilarityClassifier;

impl SimilarityClassifier {
    pub fn group(names: &[String]) -> Vec<NameGroup> {
        let mut clusters: Vec<(String, NameGroup)> = Vec::new();

        for name in names {
            let key = normalize_name(name);
            if key.is_empty() {
                continue;
            }
            let existing = clusters
                .iter_mut()
                .find(|(cluster_key, _)| keys_match(cluster_key, &key));
            match existing {
                Some((_, group)) => {
                    if !group.names.contains(name) {
                        group.names.push(name.clone());
                    }
                }
                None => clusters.push((
                    key,
                    NameGroup {
                        canonical_name: name.clone(),
                        names: vec![name.clone()],
                    },
                )),
            }
        }

        clusters.into_iter().map(|(_, group)| group).collect()
    }
}

#[async_trait]
impl ProductClassifier for SimilarityClassifier {
    async fn classify(&self, names: &[String]) -> Result<Vec<NameGroup>, ClassifierError> {
        Ok(Self::group(names))
    }

    fn name(&self) -> &'static str {
        "similarity"
    }
}

/// Near-identical keys match only when their quantities agree
fn keys_match(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let quantities = |key: &str| -> Vec<String> {
        key.split(' ')
            .filter(|t| t.chars().all(|c| c.is_ascii_digit()))
            .map(str::to_string)
            .collect()
    };
    quantities(a) == quantities(b) && strsim::normalized_levenshtein(a, b) >= SIMILARITY_THRESHOLD
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}

fn normalize_token(token: &str) -> String {
    let digits: String = token.chars().take_while(|c| c.is_ascii_digit()).collect();
    if !digits.is_empty() {
        // "3pc", "3pcs", "2un" count the same as the bare number
        return digits;
    }
    if token.chars().count() > 3 && token.ends_with('s') {
        return token[..token.len() - 1].to_string();
    }
    token.to_string()
}

/// Comparison key for a product name
pub fn normalize_name(name: &str) -> String {
    let folded: String = name
        .to_lowercase()
        .chars()
        .map(fold_accent)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let mut tokens: Vec<String> = folded.split_whitespace().map(normalize_token).collect();
    tokens.sort();
    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_is_case_and_order_insensitive() {
        assert_eq!(normalize_name("Kit 3 Camisetas"), normalize_name("kit 3 camisetas"));
        assert_eq!(normalize_name("Kit 3 Camisetas"), normalize_name("Kit Camiseta 3pc"));
        assert_eq!(normalize_name("Boné Aba Reta"), "aba bone reta");
    }

    #[test]
    fn test_groups_cosmetic_variants() {
        let groups = SimilarityClassifier::group(&names(&[
            "Kit 3 Camisetas",
            "Calça Jeans",
            "kit 3 camisetas",
            "Kit Camiseta 3pc",
        ]));

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].canonical_name, "Kit 3 Camisetas");
        assert_eq!(groups[0].names, names(&["Kit 3 Camisetas", "kit 3 camisetas", "Kit Camiseta 3pc"]));
        assert_eq!(groups[1].names, names(&["Calça Jeans"]));
    }

    #[test]
    fn test_distinct_products_stay_apart() {
        let groups = SimilarityClassifier::group(&names(&["Kit 3 Camisetas", "Kit 5 Camisetas"]));
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_grouping_is_deterministic() {
        let input = names(&["Vestido Floral", "vestido floral ", "Saia Midi"]);
        assert_eq!(SimilarityClassifier::group(&input), SimilarityClassifier::group(&input));
    }
}
