//! DeepL translation gateway.
//!
//! The only network dependency of the service. Callers finish the fetch
//! before opening any database transaction.

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::retry::{with_retry_if, RetryConfig};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// DeepL `/v2/translate` request body
#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    text: Vec<&'a str>,
    target_lang: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_lang: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translations: Vec<TranslatedText>,
}

#[derive(Debug, Deserialize)]
struct TranslatedText {
    detected_source_language: String,
    text: String,
}

/// Result of a provider call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderTranslation {
    pub translated_text: String,
    pub detected_source_lang: String,
}

/// A language the provider can translate into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetLanguage {
    #[serde(rename(deserialize = "language"))]
    pub code: String,
    pub name: String,
}

/// A failed provider attempt, kept typed so the retry predicate can look at
/// the status code
#[derive(Debug)]
struct ProviderFailure {
    status: Option<StatusCode>,
    message: String,
}

impl ProviderFailure {
    fn transport(message: String) -> Self {
        Self {
            status: None,
            message,
        }
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "DeepL API error ({}): {}", status, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl From<ProviderFailure> for AppError {
    fn from(failure: ProviderFailure) -> Self {
        AppError::Provider(failure.to_string())
    }
}

/// Retry 429 (rate limit), 5xx and network errors; other 4xx are final
fn is_retryable(failure: &ProviderFailure) -> bool {
    match failure.status {
        Some(status) => status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error(),
        None => true,
    }
}

#[derive(Debug, Clone)]
pub struct DeeplClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    retry: RetryConfig,
}

impl DeeplClient {
    pub fn new(config: &Config) -> Self {
        Self::with_base_url(&config.deepl_api_url, &config.deepl_api_key)
    }

    pub fn with_base_url(api_url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            retry: RetryConfig::provider_call(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn auth_header(&self) -> String {
        format!("DeepL-Auth-Key {}", self.api_key)
    }

    /// Translate `text` into `target_lang`. Without `source_lang` the
    /// provider detects it.
    pub async fn translate(
        &self,
        text: &str,
        source_lang: Option<&str>,
        target_lang: &str,
    ) -> AppResult<ProviderTranslation> {
        let request = TranslateRequest {
            text: vec![text],
            target_lang,
            source_lang,
        };
        let url = format!("{}/v2/translate", self.api_url);

        let response: TranslateResponse = with_retry_if(
            &self.retry,
            &format!("Translation to {}", target_lang),
            || async {
                let response = self
                    .client
                    .post(&url)
                    .header("Authorization", self.auth_header())
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| {
                        ProviderFailure::transport(format!("Failed to reach DeepL: {}", e))
                    })?;

                let status = response.status();
                if !status.is_success() {
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
                    return Err(ProviderFailure {
                        status: Some(status),
                        message: body,
                    });
                }

                response.json::<TranslateResponse>().await.map_err(|e| {
                    ProviderFailure::transport(format!("Failed to parse DeepL response: {}", e))
                })
            },
            is_retryable,
        )
        .await?;

        let first = response
            .translations
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Provider("DeepL response contained no translations".into()))?;

        info!(
            "Translated {} chars {} -> {}",
            text.chars().count(),
            first.detected_source_language,
            target_lang
        );

        Ok(ProviderTranslation {
            translated_text: first.text,
            detected_source_lang: first.detected_source_language,
        })
    }

    /// Languages the provider can translate into
    pub async fn target_languages(&self) -> AppResult<Vec<TargetLanguage>> {
        let url = format!("{}/v2/languages", self.api_url);

        let languages = with_retry_if(
            &self.retry,
            "Fetch target languages",
            || async {
                let response = self
                    .client
                    .get(&url)
                    .header("Authorization", self.auth_header())
                    .query(&[("type", "target")])
                    .send()
                    .await
                    .map_err(|e| {
                        ProviderFailure::transport(format!("Failed to reach DeepL: {}", e))
                    })?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(ProviderFailure {
                        status: Some(status),
                        message: body,
                    });
                }

                response.json::<Vec<TargetLanguage>>().await.map_err(|e| {
                    ProviderFailure::transport(format!("Failed to parse DeepL languages: {}", e))
                })
            },
            is_retryable,
        )
        .await?;

        Ok(languages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::{
        matchers::{body_json, header, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn test_client(server: &MockServer) -> DeeplClient {
        DeeplClient::with_base_url(&server.uri(), "test-deepl-key")
            .with_retry(RetryConfig::new(3, Duration::from_millis(5)))
    }

    fn deepl_response(detected: &str, text: &str) -> serde_json::Value {
        serde_json::json!({
            "translations": [
                { "detected_source_language": detected, "text": text }
            ]
        })
    }

    #[tokio::test]
    async fn test_translate_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/translate"))
            .and(header("Authorization", "DeepL-Auth-Key test-deepl-key"))
            .and(body_json(serde_json::json!({
                "text": ["hello world!"],
                "target_lang": "ES",
                "source_lang": "EN"
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(deepl_response("EN", "¡Hola mundo!")),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = test_client(&mock_server)
            .translate("hello world!", Some("EN"), "ES")
            .await
            .expect("Should succeed");

        assert_eq!(result.translated_text, "¡Hola mundo!");
        assert_eq!(result.detected_source_lang, "EN");
    }

    #[tokio::test]
    async fn test_translate_without_source_lang_omits_field() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/translate"))
            .and(body_json(serde_json::json!({
                "text": ["Bonjour"],
                "target_lang": "EN-US"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(deepl_response("FR", "Hello")))
            .mount(&mock_server)
            .await;

        let result = test_client(&mock_server)
            .translate("Bonjour", None, "EN-US")
            .await
            .expect("Should succeed");

        assert_eq!(result.detected_source_lang, "FR");
    }

    #[tokio::test]
    async fn test_translate_retries_server_errors() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/translate"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
            .up_to_n_times(2)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/translate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(deepl_response("EN", "Hola")))
            .mount(&mock_server)
            .await;

        let result = test_client(&mock_server)
            .translate("Hello", Some("EN"), "ES")
            .await
            .expect("Should succeed after retries");

        assert_eq!(result.translated_text, "Hola");
    }

    #[tokio::test]
    async fn test_translate_quota_error_is_not_retried() {
        let mock_server = MockServer::start().await;

        // 456 is DeepL's "quota exceeded"
        Mock::given(method("POST"))
            .and(path("/v2/translate"))
            .respond_with(ResponseTemplate::new(456).set_body_string("Quota exceeded"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let err = test_client(&mock_server)
            .translate("Hello", Some("EN"), "ES")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Provider(_)));
        assert!(err.to_string().contains("456"));
    }

    #[tokio::test]
    async fn test_translate_exhausts_retries() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/translate"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .expect(3)
            .mount(&mock_server)
            .await;

        let err = test_client(&mock_server)
            .translate("Hello", Some("EN"), "ES")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Provider(_)));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_translate_empty_translations() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/translate"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "translations": [] })),
            )
            .mount(&mock_server)
            .await;

        let err = test_client(&mock_server)
            .translate("Hello", Some("EN"), "ES")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("no translations"));
    }

    #[tokio::test]
    async fn test_translate_connection_refused() {
        let client = DeeplClient::with_base_url("http://127.0.0.1:1", "key")
            .with_retry(RetryConfig::new(1, Duration::from_millis(1)));

        let err = client.translate("Hello", None, "ES").await.unwrap_err();
        assert!(matches!(err, AppError::Provider(_)));
    }

    #[tokio::test]
    async fn test_target_languages() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/languages"))
            .and(query_param("type", "target"))
            .and(header("Authorization", "DeepL-Auth-Key test-deepl-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "language": "ES", "name": "Spanish", "supports_formality": true },
                { "language": "NB", "name": "Norwegian (Bokmål)", "supports_formality": false }
            ])))
            .mount(&mock_server)
            .await;

        let languages = test_client(&mock_server)
            .target_languages()
            .await
            .expect("Should succeed");

        assert_eq!(
            languages,
            vec![
                TargetLanguage {
                    code: "ES".to_string(),
                    name: "Spanish".to_string()
                },
                TargetLanguage {
                    code: "NB".to_string(),
                    name: "Norwegian (Bokmål)".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_is_retryable() {
        let with_status = |code: u16| ProviderFailure {
            status: Some(StatusCode::from_u16(code).unwrap()),
            message: String::new(),
        };

        assert!(is_retryable(&with_status(429)));
        assert!(is_retryable(&with_status(500)));
        assert!(is_retryable(&with_status(503)));
        assert!(!is_retryable(&with_status(400)));
        assert!(!is_retryable(&with_status(403)));
        assert!(!is_retryable(&with_status(456)));
        assert!(is_retryable(&ProviderFailure::transport("timeout".into())));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = DeeplClient::with_base_url("https://api-free.deepl.com/", "key");
        assert_eq!(client.api_url, "https://api-free.deepl.com");
    }
}
