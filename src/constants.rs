//! Shared constants/setters for things
//!

use std::sync::LazyLock;
use std::time::Duration;

/// Backdrops used when both the image model and the stock search come up empty.
pub const FALLBACK_IMAGES: &[&str] = &[
    "https://images.pexels.com/photos/417074/pexels-photo-417074.jpeg?auto=compress&cs=tinysrgb&w=1600",
    "https://images.pexels.com/photos/36717/amazing-animal-beautiful-beautifull.jpg?auto=compress&cs=tinysrgb&w=1600",
    "https://images.pexels.com/photos/158163/clouds-cloudporn-weather-lookup-158163.jpeg?auto=compress&cs=tinysrgb&w=1600",
    "https://images.pexels.com/photos/462162/pexels-photo-462162.jpeg?auto=compress&cs=tinysrgb&w=1600",
    "https://images.pexels.com/photos/355465/pexels-photo-355465.jpeg?auto=compress&cs=tinysrgb&w=1600",
    "https://images.pexels.com/photos/1366919/pexels-photo-1366919.jpeg?auto=compress&cs=tinysrgb&w=1600",
];

/// Aspect ratio requested from the image model for quote backdrops.
pub const BACKDROP_ASPECT_RATIO: &str = "16:9";

/// How many quotes a single generate request asks the text model for.
pub const GENERATED_QUOTE_COUNT: usize = 4;

/// Upper bound on calls made for one operation, first attempt included.
pub const RETRY_MAX_ATTEMPTS: u32 = 3;

/// Backoff delay before the first retry; doubles on each subsequent one.
pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(750);

/// Length of the opaque ids minted for generated quotes.
pub const QUOTE_ID_LENGTH: usize = 12;

/// Default text model, overridable via `SOPHIA_TEXT_MODEL`.
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";

/// Default image model, overridable via `SOPHIA_IMAGE_MODEL`.
pub const DEFAULT_IMAGE_MODEL: &str = "imagen-3.0-generate-002";

/// Default Gemini API base, overridable via `GEMINI_API_BASE`.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Pexels search API base.
pub const PEXELS_API_BASE: &str = "https://api.pexels.com/v1";

/// Max age (in seconds) for favorite backdrop cache entries.
pub const IMAGE_CACHE_MAX_AGE_SECONDS: u64 = 60 * 60;

/// Shared cache max age (in seconds) for favorite backdrop cache entries.
pub const IMAGE_CACHE_S_MAXAGE_SECONDS: u64 = 60 * 60 * 24;

/// Stale-while-revalidate window (in seconds) for favorite backdrop cache entries.
pub const IMAGE_CACHE_STALE_WHILE_REVALIDATE_SECONDS: u64 = 60 * 60 * 24;

/// Cache-Control value for favorite backdrop responses.
pub static IMAGE_CACHE_CONTROL: LazyLock<String> = LazyLock::new(|| {
    format!(
        "public, max-age={}, s-maxage={}, stale-while-revalidate={}",
        IMAGE_CACHE_MAX_AGE_SECONDS,
        IMAGE_CACHE_S_MAXAGE_SECONDS,
        IMAGE_CACHE_STALE_WHILE_REVALIDATE_SECONDS
    )
});
