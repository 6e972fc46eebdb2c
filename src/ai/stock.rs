//! Stock-photo search client.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;

use super::{AiError, StockPhotoSearch, non_empty_env};
use crate::constants::PEXELS_API_BASE;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    photos: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    #[serde(default)]
    src: Option<PhotoSources>,
}

#[derive(Debug, Deserialize)]
struct PhotoSources {
    #[serde(default)]
    landscape: Option<String>,
    #[serde(default)]
    large2x: Option<String>,
    #[serde(default)]
    original: Option<String>,
}

/// Widest-first pick across the renditions of every returned photo.
fn best_photo_url(response: SearchResponse) -> Option<String> {
    response
        .photos
        .into_iter()
        .filter_map(|photo| photo.src)
        .find_map(|src| {
            [src.landscape, src.large2x, src.original]
                .into_iter()
                .flatten()
                .find(|url| !url.trim().is_empty())
        })
}

/// Client for the photo search API.
#[derive(Clone, Debug)]
pub struct StockClient {
    http: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
}

impl StockClient {
    /// Builds a client from `PEXELS_API_KEY`, with `PEXELS_API_BASE` as an
    /// override for tests and proxies.
    pub fn from_env() -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: non_empty_env("PEXELS_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or_else(|| PEXELS_API_BASE.to_string()),
            api_key: non_empty_env("PEXELS_API_KEY"),
        }
    }
}

#[async_trait]
impl StockPhotoSearch for StockClient {
    async fn search_photo(&self, keywords: &[String]) -> Result<Option<String>, AiError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(AiError::MissingApiKey("PEXELS_API_KEY"));
        };
        let query = keywords.join(" ");
        if query.trim().is_empty() {
            return Ok(None);
        }

        let response = self
            .http
            .get(format!("{}/search", self.api_base))
            .header(AUTHORIZATION, api_key)
            .query(&[
                ("query", query.as_str()),
                ("per_page", "3"),
                ("orientation", "landscape"),
            ])
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(AiError::from_status(status.as_u16(), &text));
        }

        let parsed: SearchResponse = serde_json::from_str(&text)
            .map_err(|err| AiError::InvalidResponse(format!("photo search JSON: {err}")))?;
        Ok(best_photo_url(parsed))
    }
}
