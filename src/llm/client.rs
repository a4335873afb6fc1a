// Gemini クライアント
use async_trait::async_trait;
use log::debug;
use reqwest::header;
use std::time::Duration;

use super::schemas::gemini_request::GenerateContentRequest;
use super::schemas::gemini_response::{GenerateContentResponse, ModelInfo, ModelList};
use crate::error::ModelError;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const FALLBACK_MODEL: &str = "gemini-1.5-flash";

/// プロンプトを渡すと JSON テキストが返ってくる生成モデル
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// メタデータに記録するモデル名
    fn name(&self) -> &str;

    async fn complete_json(&self, prompt: &str, temperature: f32) -> Result<String, ModelError>;
}

#[derive(Clone, Debug)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, ModelError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(GeminiClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: FALLBACK_MODEL.to_string(),
            timeout,
        })
    }

    /// 使用するモデルを切り替えたクライアント
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.strip_prefix("models/").unwrap_or(model).to_string();
        self
    }

    /// 利用可能なモデル一覧 (ページングをすべてたどる)
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, ModelError> {
        let url = format!("{}/v1beta/models", self.base_url);
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(&url)
                .header("x-goog-api-key", &self.api_key)
                .timeout(Duration::from_secs(30));
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = request.send().await?;
            if !response.status().is_success() {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                return Err(ModelError::Api { status, body });
            }

            let page: ModelList = response.json().await?;
            models.extend(page.models);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(models)
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete_json(&self, prompt: &str, temperature: f32) -> Result<String, ModelError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = GenerateContentRequest::json_prompt(prompt, temperature);

        debug!("Gemini 呼び出し: {} (プロンプト {} 文字)", self.model, prompt.chars().count());

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api { status, body });
        }

        let parsed: GenerateContentResponse = response.json().await?;
        parsed
            .first_text()
            .map(str::to_string)
            .ok_or(ModelError::EmptyResponse)
    }
}
