//! Clients for the generative-text, generative-image and stock-photo APIs,
//! plus the backdrop fallback chain that stitches them together.

pub mod image;
pub mod stock;
pub mod text;

pub use self::image::ImageClient;
pub use self::stock::StockClient;
pub use self::text::{Quote, TextClient};

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use tracing::{debug, warn};

use crate::constants::FALLBACK_IMAGES;
use crate::retry::{RetryPolicy, with_backoff};

/// Visual direction for a quote backdrop, derived from the quote text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageBrief {
    /// Scene description handed to the image model.
    pub visual_description: String,
    /// Search keywords handed to the stock-photo API.
    pub keywords: Vec<String>,
}

/// Errors from the generative and stock-photo clients.
#[derive(Debug)]
pub enum AiError {
    /// A required credential env var is not set.
    MissingApiKey(&'static str),
    /// The remote service rejected the configured credential.
    BadCredential(String),
    /// The service reported itself overloaded or unavailable.
    Overloaded(String),
    /// The account's quota is exhausted.
    QuotaExceeded(String),
    /// The request never produced a response.
    Transport(reqwest::Error),
    /// The service answered with a non-retryable error status.
    Api {
        /// HTTP status code of the response.
        status: u16,
        /// Truncated response body.
        message: String,
    },
    /// The response arrived but could not be interpreted.
    InvalidResponse(String),
    /// The response carried no usable payload.
    EmptyResponse(&'static str),
}

impl AiError {
    /// True for failures worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        match self {
            AiError::Overloaded(_) => true,
            AiError::Transport(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            _ => false,
        }
    }

    /// Classifies a non-success HTTP response, preferring the status code
    /// over body text.
    pub(crate) fn from_status(status: u16, body: &str) -> Self {
        let lower = body.to_ascii_lowercase();
        let message = truncate_message(body, 512);
        if status == 429 {
            if lower.contains("quota") {
                return AiError::QuotaExceeded(message);
            }
            return AiError::Overloaded(message);
        }
        if status == 503 || lower.contains("overloaded") || lower.contains("unavailable") {
            return AiError::Overloaded(message);
        }
        if lower.contains("api key") || lower.contains("permission") {
            return AiError::BadCredential(message);
        }
        AiError::Api { status, message }
    }
}

impl std::fmt::Display for AiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingApiKey(var) => write!(f, "missing API credential: {var} is not set"),
            Self::BadCredential(message) => write!(f, "credential rejected: {message}"),
            Self::Overloaded(message) => write!(f, "service overloaded: {message}"),
            Self::QuotaExceeded(message) => write!(f, "quota exhausted: {message}"),
            Self::Transport(err) => write!(f, "transport error: {err}"),
            Self::Api { status, message } => write!(f, "API error {status}: {message}"),
            Self::InvalidResponse(message) => write!(f, "invalid response: {message}"),
            Self::EmptyResponse(what) => write!(f, "empty response from {what}"),
        }
    }
}

impl std::error::Error for AiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        AiError::Transport(err)
    }
}

/// Caps an error body at `max_chars` so logs stay readable.
pub(crate) fn truncate_message(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

/// Reads an env var, treating blank values as unset.
pub(crate) fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Gemini credential lookup shared by the text and image clients.
pub(crate) fn gemini_api_key() -> Option<String> {
    non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY"))
}

/// Gemini API base, overridable for tests and proxies.
pub(crate) fn gemini_api_base() -> String {
    non_empty_env("GEMINI_API_BASE")
        .map(|value| value.trim_end_matches('/').to_string())
        .unwrap_or_else(|| crate::constants::GEMINI_API_BASE.to_string())
}

/// Source of themed quotes and per-quote image briefs.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Generates `count` quotes on `theme`.
    async fn themed_quotes(&self, theme: &str, count: usize) -> Result<Vec<Quote>, AiError>;
    /// Derives a backdrop brief from quote text.
    async fn image_brief(&self, quote_text: &str) -> Result<ImageBrief, AiError>;
}

/// Generates a backdrop image for a scene description.
#[async_trait]
pub trait ImageGeneration: Send + Sync {
    /// Returns a data URI for the rendered scene.
    async fn generate_image(&self, description: &str) -> Result<String, AiError>;
}

/// Searches a stock-photo catalogue.
#[async_trait]
pub trait StockPhotoSearch: Send + Sync {
    /// Returns the URL of the best match, if any.
    async fn search_photo(&self, keywords: &[String]) -> Result<Option<String>, AiError>;
}

/// Resolves a backdrop for a quote: generated image first, stock photo
/// second, then a random entry from the static fallback list. Never fails;
/// sources are consulted in that order until one yields a result.
pub async fn resolve_backdrop(
    policy: RetryPolicy,
    images: &dyn ImageGeneration,
    stock: &dyn StockPhotoSearch,
    brief: &ImageBrief,
) -> String {
    match with_backoff(policy, || images.generate_image(&brief.visual_description)).await {
        Ok(url) => return url,
        Err(err) => warn!("image generation failed, trying stock photos: {err}"),
    }

    match stock.search_photo(&brief.keywords).await {
        Ok(Some(url)) => return url,
        Ok(None) => debug!("no stock photo matched {:?}", brief.keywords),
        Err(err) => warn!("stock photo search failed: {err}"),
    }

    static_fallback()
}

/// Random pick from the bundled backdrop list.
pub fn static_fallback() -> String {
    FALLBACK_IMAGES
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(FALLBACK_IMAGES[0])
        .to_string()
}
