//! Image-generation client for quote backdrops.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose;
use serde::Deserialize;
use serde_json::json;

use super::{AiError, ImageGeneration, gemini_api_base, gemini_api_key, non_empty_env};
use crate::constants::{BACKDROP_ASPECT_RATIO, DEFAULT_IMAGE_MODEL};

/// Request body for POST `models/{model}:predict`. The response carries the
/// rendered image inline as base64 bytes.
#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    #[serde(default, rename = "bytesBase64Encoded")]
    bytes_base64_encoded: Option<String>,
    #[serde(default, rename = "mimeType")]
    mime_type: Option<String>,
}

fn data_uri(mime_type: &str, base64_data: &str) -> String {
    format!("data:{mime_type};base64,{base64_data}")
}

/// Client for the image-model `:predict` endpoint.
#[derive(Clone, Debug)]
pub struct ImageClient {
    http: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
}

impl ImageClient {
    /// Builds a client from the shared Gemini credential env vars and the
    /// `SOPHIA_IMAGE_MODEL` override.
    pub fn from_env() -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: gemini_api_base(),
            api_key: gemini_api_key(),
            model: non_empty_env("SOPHIA_IMAGE_MODEL")
                .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:predict", self.api_base, self.model)
    }
}

#[async_trait]
impl ImageGeneration for ImageClient {
    async fn generate_image(&self, description: &str) -> Result<String, AiError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(AiError::MissingApiKey("GEMINI_API_KEY"));
        };

        let body = json!({
            "instances": [{ "prompt": description }],
            "parameters": {
                "sampleCount": 1,
                "aspectRatio": BACKDROP_ASPECT_RATIO,
            },
        });

        let response = self
            .http
            .post(self.endpoint())
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(AiError::from_status(status.as_u16(), &text));
        }

        let parsed: PredictResponse = serde_json::from_str(&text)
            .map_err(|err| AiError::InvalidResponse(format!("predict JSON: {err}")))?;

        let (data, mime_type) = parsed
            .predictions
            .into_iter()
            .find_map(|prediction| {
                let mime_type = prediction
                    .mime_type
                    .unwrap_or_else(|| "image/png".to_string());
                prediction
                    .bytes_base64_encoded
                    .filter(|data| !data.is_empty())
                    .map(|data| (data, mime_type))
            })
            .ok_or(AiError::EmptyResponse("image model"))?;

        general_purpose::STANDARD
            .decode(data.as_bytes())
            .map_err(|err| AiError::InvalidResponse(format!("image payload base64: {err}")))?;

        Ok(data_uri(&mime_type, &data))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn predict_payload_yields_inline_bytes() {
        let raw = r#"{
            "predictions": [
                { "bytesBase64Encoded": "aGVsbG8=", "mimeType": "image/png" }
            ]
        }"#;
        let parsed: PredictResponse = serde_json::from_str(raw).unwrap();
        let prediction = parsed.predictions.into_iter().next().unwrap();
        assert_eq!(prediction.bytes_base64_encoded.as_deref(), Some("aGVsbG8="));
        assert_eq!(prediction.mime_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn empty_prediction_list_parses_cleanly() {
        let parsed: PredictResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.predictions.is_empty());
    }

    #[test]
    fn data_uri_embeds_mime_and_payload() {
        assert_eq!(
            data_uri("image/png", "aGVsbG8="),
            "data:image/png;base64,aGVsbG8="
        );
    }
}
