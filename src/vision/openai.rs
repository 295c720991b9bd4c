//! OpenAI互換 chat/completions バックエンド
//!
//! mistral.rs / vLLM / Ollama などでホストしたVLMに、画像を data URL として送る。

use super::{ImagePreprocessor, InferenceResult, ServiceInfo, VisionQueryService};
use crate::config::Config;
use crate::error::{FuelVisionError, InferenceError, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use fuel_vision_common::{extract_answer, GenerationParams};
use reqwest::{header, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

pub struct OpenAiVisionService {
    client: reqwest::Client,
    url: Url,
    model: String,
    api_key: Option<String>,
    params: GenerationParams,
    preprocessor: ImagePreprocessor,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiVisionService {
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            url: completions_url(&config.endpoint)?,
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            params: config.generation,
            preprocessor: ImagePreprocessor::new(config.min_pixels, config.max_pixels),
        })
    }

    fn request_body(&self, png: &[u8], question: &str) -> Value {
        let data_url = format!("data:image/png;base64,{}", STANDARD.encode(png));

        let mut body = json!({
            "model": &self.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "image_url", "image_url": { "url": data_url } },
                    { "type": "text", "text": question }
                ]
            }],
            "max_tokens": self.params.max_output_length,
            "stream": false,
        });

        // サンプリング無効時はgreedy相当
        if self.params.sampling_enabled {
            body["temperature"] = json!(self.params.temperature);
            body["top_p"] = json!(self.params.top_p);
        } else {
            body["temperature"] = json!(0.0);
        }

        body
    }
}

#[async_trait]
impl VisionQueryService for OpenAiVisionService {
    async fn ask(&self, image: &[u8], question: &str) -> InferenceResult<String> {
        let png = self.preprocessor.prepare(image)?;
        let body = self.request_body(&png, question);

        tracing::debug!("POST {} ({} bytes png)", self.url, png.len());

        let mut request = self.client.post(self.url.clone()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| InferenceError::new(format!("バックエンドに接続できません: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(InferenceError::new(format!(
                "バックエンドがエラーを返しました ({}): {}",
                status, text
            )));
        }

        let payload: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::new(format!("レスポンスのパースに失敗: {}", e)))?;

        let content = payload
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        let answer = extract_answer(&content);
        if answer.is_empty() {
            return Err(InferenceError::new("モデルの回答が空です"));
        }

        Ok(answer.to_string())
    }

    fn info(&self) -> ServiceInfo {
        ServiceInfo {
            backend: "openai".into(),
            model: self.model.clone(),
        }
    }
}

/// `http://host/v1` でも `http://host/v1/` でも `.../v1/chat/completions` になるように結合
fn completions_url(endpoint: &str) -> Result<Url> {
    let base = if endpoint.ends_with('/') {
        endpoint.to_string()
    } else {
        format!("{}/", endpoint)
    };

    Url::parse(&base)
        .and_then(|u| u.join("chat/completions"))
        .map_err(|e| FuelVisionError::Config(format!("endpoint が不正です ({}): {}", endpoint, e)))
}
