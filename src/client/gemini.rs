use super::{ClientError, ModelBackend, ModelRequest};
use crate::config::ProviderConfig;
use crate::log_debug;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use reqwest::Client;
use serde_json::{Value, json};

/// Represents the Gemini `generateContent` API
pub struct GeminiBackend {
    config: ProviderConfig,
    client: Client,
}

impl GeminiBackend {
    /// Creates a new backend; fails when no API key is configured
    pub fn new(config: ProviderConfig) -> Result<Self, ClientError> {
        if config.api_key.is_empty() {
            return Err(ClientError::MissingApiKey);
        }
        Ok(Self {
            config,
            client: Client::new(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Build the request body for a model request
    pub fn request_body(&self, request: &ModelRequest) -> Value {
        let mut parts = vec![json!({ "text": request.prompt })];
        if let Some(image) = &request.image {
            parts.push(json!({
                "inline_data": {
                    "mime_type": image.mime_type,
                    "data": BASE64_STANDARD.encode(&image.data),
                }
            }));
        }

        let mut body = json!({
            "contents": [
                {
                    "role": "user",
                    "parts": parts
                }
            ],
            "generationConfig": {
                "temperature": self.config.temperature,
                "maxOutputTokens": self.config.max_output_tokens
            }
        });

        if request.json_output {
            body["generationConfig"]["responseMimeType"] = json!("application/json");
        }

        // Additional parameters from the configuration override the defaults
        for (key, value) in &self.config.additional_params {
            if let Ok(num_val) = value.parse::<f64>() {
                body["generationConfig"][key] = json!(num_val);
            } else {
                body["generationConfig"][key] = json!(value);
            }
        }

        body
    }
}

/// Concatenate the text parts of the first candidate
pub fn extract_reply_text(response_body: &Value) -> Option<String> {
    let parts = response_body["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|part| part["text"].as_str())
        .collect();
    if text.is_empty() { None } else { Some(text) }
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    async fn generate(&self, request: &ModelRequest) -> Result<String, ClientError> {
        log_debug!(
            "Sending request to model {} ({} prompt chars, image: {})",
            self.config.model,
            request.prompt.len(),
            request.image.is_some()
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.config.api_key)
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let response_body: Value = response
            .json()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        // The response format is:
        // { "candidates": [ { "content": { "parts": [ { "text": "..." } ] } } ] }
        let text = extract_reply_text(&response_body).ok_or(ClientError::EmptyReply)?;
        log_debug!("Received model reply - {} chars", text.len());
        Ok(text)
    }
}
