//! Regenerate data/daily_quotes.json through the text API.

use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};
use sophia::ai::text::strip_code_fences;
use sophia::constants::{DEFAULT_TEXT_MODEL, GEMINI_API_BASE};
use sophia::daily::{DailyQuote, write_daily_quotes};
use std::path::PathBuf;

const POOL_SIZE: usize = 31;

fn api_key() -> Result<String> {
    for var in ["GEMINI_API_KEY", "GOOGLE_API_KEY"] {
        if let Ok(value) = std::env::var(var)
            && !value.trim().is_empty()
        {
            return Ok(value.trim().to_string());
        }
    }
    Err(anyhow!("GEMINI_API_KEY or GOOGLE_API_KEY not set"))
}

fn pool_prompt() -> String {
    format!(
        "Curate {POOL_SIZE} timeless public-domain philosophical quotes with \
         accurate attributions, spanning many traditions and eras. No two \
         quotes by the same author in a row. Return JSON matching the \
         provided schema."
    )
}

fn request_pool(api_key: &str) -> Result<Vec<DailyQuote>> {
    let model = std::env::var("SOPHIA_TEXT_MODEL")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string());
    let api_base = std::env::var("GEMINI_API_BASE")
        .ok()
        .map(|value| value.trim().trim_end_matches('/').to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| GEMINI_API_BASE.to_string());
    let url = format!("{api_base}/models/{model}:generateContent");

    let body = json!({
        "contents": [{ "role": "user", "parts": [{ "text": pool_prompt() }] }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "quote": { "type": "STRING" },
                        "author": { "type": "STRING" }
                    },
                    "required": ["quote", "author"]
                }
            }
        }
    });

    let mut response = ureq::post(&url)
        .query("key", api_key)
        .send_json(&body)
        .context("generateContent request failed")?;
    let raw = response
        .body_mut()
        .read_to_string()
        .context("reading generateContent body")?;

    let parsed: Value =
        serde_json::from_str(&raw).context("generateContent returned invalid JSON")?;
    let text = parsed
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("generateContent response missing text payload"))?;

    serde_json::from_str(strip_code_fences(text)).context("parsing quote pool JSON")
}

fn main() -> Result<()> {
    let key = api_key()?;
    let entries = request_pool(&key)?;
    if entries.is_empty() {
        anyhow::bail!("The model returned no quotes.");
    }

    let output_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("data")
        .join("daily_quotes.json");
    let entry_count = entries.len();
    write_daily_quotes(&output_path, &entries)?;

    println!("Wrote {} ({} entries).", output_path.display(), entry_count);
    Ok(())
}
