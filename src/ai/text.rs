//! Text-generation client: themed quotes and per-quote image briefs.

use async_trait::async_trait;
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{AiError, ImageBrief, QuoteSource, gemini_api_base, gemini_api_key, non_empty_env};
use crate::constants::{DEFAULT_TEXT_MODEL, QUOTE_ID_LENGTH};

/// A generated quote. `image_url` starts empty and is attached exactly once
/// when the backdrop chain resolves; the record is immutable afterward.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Quote {
    /// Opaque locally-generated identifier.
    pub id: String,
    /// The quote text.
    pub quote: String,
    /// Attributed author.
    pub author: String,
    /// Data URI or external URL of the backdrop; empty until resolved.
    pub image_url: String,
}

impl Quote {
    /// Attaches the resolved backdrop.
    pub fn with_image_url(mut self, image_url: String) -> Self {
        self.image_url = image_url;
        self
    }
}

fn mint_quote_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(QUOTE_ID_LENGTH)
        .map(char::from)
        .collect()
}

/// Strips Markdown code-fence markers the text model sometimes wraps around
/// JSON payloads. Returns the input unchanged when no fences are present.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    // language tag on the opening fence, e.g. ```json
    let inner = inner
        .strip_prefix("json")
        .or_else(|| inner.strip_prefix("JSON"))
        .unwrap_or(inner);
    inner.trim()
}

// -----------------------------
// generateContent wire format
// -----------------------------

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
}

/// Client for the `generateContent` endpoint.
#[derive(Clone, Debug)]
pub struct TextClient {
    http: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
}

impl TextClient {
    /// Builds a client from `GEMINI_API_KEY`/`GOOGLE_API_KEY` and the
    /// `SOPHIA_TEXT_MODEL` override. A missing key surfaces per call, not
    /// here, so the app still serves pages without credentials.
    pub fn from_env() -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: gemini_api_base(),
            api_key: gemini_api_key(),
            model: non_empty_env("SOPHIA_TEXT_MODEL")
                .unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string()),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }

    /// Sends `prompt` with a JSON response schema and returns the cleaned
    /// payload text.
    async fn generate_json(&self, prompt: &str, schema: Value) -> Result<String, AiError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(AiError::MissingApiKey("GEMINI_API_KEY"));
        };

        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema,
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

        let parsed: GenerateContentResponse = serde_json::from_str(&text)
            .map_err(|err| AiError::InvalidResponse(format!("generateContent JSON: {err}")))?;
        if let Some(error) = parsed.error {
            return Err(AiError::from_status(error.code, &error.message));
        }

        let output = parsed
            .candidates
            .into_iter()
            .flat_map(|candidate| {
                candidate
                    .content
                    .map(|content| content.parts)
                    .unwrap_or_default()
            })
            .find_map(|part| part.text.filter(|text| !text.trim().is_empty()))
            .ok_or(AiError::EmptyResponse("text model"))?;

        Ok(strip_code_fences(&output).to_string())
    }
}

#[derive(Debug, Deserialize)]
struct QuoteSeed {
    quote: String,
    author: String,
}

#[derive(Debug, Deserialize)]
struct BriefSeed {
    visual_description: String,
    #[serde(default)]
    keywords: Vec<String>,
}

fn quotes_prompt(theme: &str, count: usize) -> String {
    format!(
        "You are Sophia, a muse of philosophical wisdom. Generate {count} short, \
         profound quotes about \"{theme}\". Attribute each to a real philosopher, \
         writer, or thinker whose views genuinely fit the quote. Return JSON \
         matching the provided schema."
    )
}

fn quotes_schema(count: usize) -> Value {
    json!({
        "type": "ARRAY",
        "minItems": 1,
        "maxItems": count,
        "items": {
            "type": "OBJECT",
            "properties": {
                "quote": { "type": "STRING" },
                "author": { "type": "STRING" }
            },
            "required": ["quote", "author"]
        }
    })
}

fn brief_prompt(quote_text: &str) -> String {
    format!(
        "Describe a serene photographic background image matching the mood of \
         this quote: one or two sentences, no text in the scene, no people's \
         faces. Also give two to four stock-photo search keywords. Return JSON \
         matching the provided schema.\n\nQuote: \"{quote_text}\""
    )
}

fn brief_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "visual_description": { "type": "STRING" },
            "keywords": { "type": "ARRAY", "items": { "type": "STRING" } }
        },
        "required": ["visual_description", "keywords"]
    })
}

#[async_trait]
impl QuoteSource for TextClient {
    async fn themed_quotes(&self, theme: &str, count: usize) -> Result<Vec<Quote>, AiError> {
        let cleaned = self
            .generate_json(&quotes_prompt(theme, count), quotes_schema(count))
            .await?;
        let seeds: Vec<QuoteSeed> = serde_json::from_str(&cleaned)
            .map_err(|err| AiError::InvalidResponse(format!("quote list JSON: {err}")))?;
        if seeds.is_empty() {
            return Err(AiError::EmptyResponse("quote generation"));
        }
        Ok(seeds
            .into_iter()
            .map(|seed| Quote {
                id: mint_quote_id(),
                quote: seed.quote,
                author: seed.author,
                image_url: String::new(),
            })
            .collect())
    }

    async fn image_brief(&self, quote_text: &str) -> Result<ImageBrief, AiError> {
        let cleaned = self
            .generate_json(&brief_prompt(quote_text), brief_schema())
            .await?;
        let seed: BriefSeed = serde_json::from_str(&cleaned)
            .map_err(|err| AiError::InvalidResponse(format!("image brief JSON: {err}")))?;
        if seed.visual_description.trim().is_empty() {
            return Err(AiError::EmptyResponse("image brief"));
        }
        Ok(ImageBrief {
            visual_description: seed.visual_description,
            keywords: seed
                .keywords
                .into_iter()
                .map(|keyword| keyword.trim().to_string())
                .filter(|keyword| !keyword.is_empty())
                .collect(),
        })
    }
}
