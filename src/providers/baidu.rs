/*!
 * Baidu machine translation client.
 *
 * Requests are signed with `md5(appid + q + salt + key)`. The API has no notion
 * of models, so this provider never takes part in model fallback.
 */

use async_trait::async_trait;
use log::error;
use md5::{Digest, Md5};
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::errors::ProviderError;

use super::{Provider, TranslateRequest};

/// Public endpoint of the general translation API
pub const BAIDU_ENDPOINT: &str = "https://fanyi-api.baidu.com/api/trans/vip/translate";

/// Baidu translation client
pub struct Baidu {
    client: Client,
    app_id: String,
    app_key: String,
    endpoint: String,
    /// Ask the API to apply the account's term base
    use_term_base: bool,
}

impl std::fmt::Debug for Baidu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Baidu")
            .field("app_id", &self.app_id)
            .field("endpoint", &self.endpoint)
            .field("use_term_base", &self.use_term_base)
            .finish()
    }
}

/// Raw API response
#[derive(Debug, Deserialize)]
pub struct BaiduResponse {
    #[serde(default)]
    pub trans_result: Option<Vec<BaiduTranslation>>,
    #[serde(default)]
    pub error_code: Option<serde_json::Value>,
    #[serde(default)]
    pub error_msg: Option<String>,
}

/// One translated line
#[derive(Debug, Deserialize)]
pub struct BaiduTranslation {
    pub src: String,
    pub dst: String,
}

/// Signature over the request parameters
pub fn sign(app_id: &str, text: &str, salt: &str, app_key: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(app_id.as_bytes());
    hasher.update(text.as_bytes());
    hasher.update(salt.as_bytes());
    hasher.update(app_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Map an `error_code` onto the provider error categories
pub fn error_from_code(code: &str, message: &str) -> ProviderError {
    let message = format!("Baidu API error {}: {}", code, message);
    match code {
        "52003" | "54001" | "58000" | "58002" => ProviderError::AuthenticationError(message),
        "54003" | "54005" => ProviderError::RateLimitExceeded(message),
        "52001" => ProviderError::ConnectionError(message),
        _ => ProviderError::RequestFailed(message),
    }
}

impl BaiduResponse {
    /// Join the translated lines, or turn the error envelope into a provider error
    pub fn into_text(self) -> Result<String, ProviderError> {
        if let Some(code) = self.error_code {
            let code = match code {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            if code != "52000" {
                return Err(error_from_code(&code, self.error_msg.as_deref().unwrap_or("")));
            }
        }
        let lines = self
            .trans_result
            .ok_or_else(|| ProviderError::ParseError("missing trans_result".to_string()))?;
        Ok(lines
            .into_iter()
            .map(|item| item.dst)
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

impl Baidu {
    pub fn new(
        app_id: impl Into<String>,
        app_key: impl Into<String>,
        use_term_base: bool,
        timeout_secs: u64,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs.max(1)))
                .build()
                .unwrap_or_default(),
            app_id: app_id.into(),
            app_key: app_key.into(),
            endpoint: BAIDU_ENDPOINT.to_string(),
            use_term_base,
        }
    }

    /// Query parameters of one signed request
    pub fn query_params(&self, text: &str, target_language: &str, salt: u32) -> Vec<(String, String)> {
        let salt = salt.to_string();
        let mut params = vec![
            ("q".to_string(), text.to_string()),
            ("from".to_string(), "auto".to_string()),
            ("to".to_string(), target_language.to_string()),
            ("appid".to_string(), self.app_id.clone()),
            ("sign".to_string(), sign(&self.app_id, text, &salt, &self.app_key)),
            ("salt".to_string(), salt),
        ];
        if self.use_term_base {
            params.push(("needIntervene".to_string(), "1".to_string()));
        }
        params
    }

    async fn request(&self, text: &str, target_language: &str) -> Result<String, ProviderError> {
        let salt: u32 = rand::rng().random_range(32768..=65536);
        let params = self.query_params(text, target_language, salt);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&params)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Baidu API error ({}): {}", status, error_text);
            return Err(ProviderError::from_status(status.as_u16(), error_text));
        }

        let body = response
            .json::<BaiduResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;
        body.into_text()
    }
}

#[async_trait]
impl Provider for Baidu {
    fn name(&self) -> &str {
        "baidu"
    }

    async fn translate(&self, request: &TranslateRequest) -> Result<String, ProviderError> {
        self.request(&request.text, &request.target_language).await
    }

    async fn test_connection(&self, _model: &str) -> Result<(), ProviderError> {
        self.request("hello", "zh").await.map(|_| ())
    }

    fn supports_fallback(&self) -> bool {
        false
    }
}
