use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::traits::{Translator, TranslatorInfo};
use crate::config::{Lang, TranslatorConfig};
use crate::error::{Error, Result};

/// Unofficial Google Translate web endpoint.
///
/// One call sends a whole batch as repeated `q` form fields. Each configured
/// host is tried in order while the failure is transient; a permanent
/// failure on one host is returned without trying the rest.
pub struct GoogleTranslator {
    client: Client,
    service_urls: Vec<String>,
}

impl GoogleTranslator {
    pub fn new(config: &TranslatorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("rtl-translator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::TranslationRequest(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            service_urls: config.service_urls.clone(),
        })
    }

    async fn request_host(
        &self,
        host: &str,
        texts: &[String],
        source: &Lang,
        target: &Lang,
    ) -> Result<Vec<String>> {
        let url = endpoint_url(host);
        let form: Vec<(&str, &str)> = texts.iter().map(|t| ("q", t.as_str())).collect();

        debug!("Sending {} text(s) to {}", texts.len(), url);

        let response = self
            .client
            .post(&url)
            .query(&[
                ("client", "gtx"),
                ("sl", source.as_str()),
                ("tl", target.as_str()),
            ])
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::TranslationTimeout
                } else {
                    Error::TranslationRequest(e.to_string())
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok());
            return Err(Error::TranslationRateLimited { retry_after });
        }
        if status.is_server_error() {
            return Err(Error::TranslationRequest(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::TranslationRejected {
                status: status.as_u16(),
                body: truncate(&body, 200),
            });
        }

        let body: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                Error::TranslationTimeout
            } else {
                Error::TranslationInvalidResponse(e.to_string())
            }
        })?;

        parse_batch_response(&body, texts.len())
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    fn info(&self) -> TranslatorInfo {
        TranslatorInfo {
            name: "Google Translate (web)",
            supports_auto_detect: true,
        }
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        source: &Lang,
        target: &Lang,
    ) -> Result<Vec<String>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut last_error = Error::TranslationRequest("no service URL configured".to_string());
        for host in &self.service_urls {
            match self.request_host(host, texts, source, target).await {
                Ok(translations) => return Ok(translations),
                Err(e) if e.is_transient() => {
                    warn!("Service {} failed: {}", host, e);
                    last_error = e;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error)
    }
}

/// Accepts bare hosts (`translate.googleapis.com`) as well as full base URLs.
fn endpoint_url(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{host}/translate_a/t")
    } else {
        format!("https://{host}/translate_a/t")
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Validate a loosely typed service payload into exactly `expected` strings.
///
/// Accepted shapes:
/// - `["t1", "t2", ...]`
/// - `[["t1", "en"], ["t2", "en"], ...]` (auto-detected source)
/// - for a single text: `"t1"` or `["t1", "en"]`
pub fn parse_batch_response(body: &Value, expected: usize) -> Result<Vec<String>> {
    let first_string = |item: &Value| -> Option<String> {
        match item {
            Value::String(s) => Some(s.clone()),
            Value::Array(parts) => parts.first().and_then(Value::as_str).map(str::to_string),
            _ => None,
        }
    };

    if expected == 1
        && let Some(text) = first_string(body)
    {
        return Ok(vec![text]);
    }

    let items = body.as_array().ok_or_else(|| {
        Error::TranslationInvalidResponse(format!("expected a JSON array, got {}", kind_of(body)))
    })?;

    if items.len() != expected {
        return Err(Error::TranslationInvalidResponse(format!(
            "expected {} translations, got {}",
            expected,
            items.len()
        )));
    }

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            first_string(item).ok_or_else(|| {
                Error::TranslationInvalidResponse(format!(
                    "item {} is {}, not a translation",
                    i,
                    kind_of(item)
                ))
            })
        })
        .collect()
}

const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_plain_string_array() {
        let parsed = parse_batch_response(&json!(["سلام", "دنیا"]), 2).unwrap();
        assert_eq!(parsed, vec!["سلام", "دنیا"]);
    }

    #[test]
    fn test_parse_detected_language_pairs() {
        let parsed = parse_batch_response(&json!([["سلام", "en"], ["دنیا", "en"]]), 2).unwrap();
        assert_eq!(parsed, vec!["سلام", "دنیا"]);
    }

    #[test]
    fn test_parse_single_text_shapes() {
        assert_eq!(parse_batch_response(&json!("سلام"), 1).unwrap(), vec!["سلام"]);
        assert_eq!(
            parse_batch_response(&json!(["سلام", "en"]), 1).unwrap(),
            vec!["سلام"]
        );
    }

    #[test]
    fn test_parse_rejects_count_mismatch() {
        let err = parse_batch_response(&json!(["only one"]), 2).unwrap_err();
        assert!(matches!(err, Error::TranslationInvalidResponse(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_parse_rejects_wrong_types() {
        assert!(parse_batch_response(&json!({"text": "x"}), 2).is_err());
        assert!(parse_batch_response(&json!([1, 2]), 2).is_err());
        assert!(parse_batch_response(&json!(null), 1).is_err());
    }

    #[test]
    fn test_endpoint_url() {
        assert_eq!(
            endpoint_url("translate.googleapis.com"),
            "https://translate.googleapis.com/translate_a/t"
        );
        assert_eq!(
            endpoint_url("http://127.0.0.1:9000/"),
            "http://127.0.0.1:9000/translate_a/t"
        );
    }
}
