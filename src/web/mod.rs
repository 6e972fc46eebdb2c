//! Web layer: application state, router and handlers.

use std::collections::HashSet;
use std::num::NonZeroU16;

use axum::Router;
use axum::http::HeaderMap;
use tokio::task::JoinSet;
use tower_http::services::ServeDir;

use crate::ai::{self, ImageGeneration, Quote, QuoteSource, StockPhotoSearch};
use crate::constants::GENERATED_QUOTE_COUNT;
use crate::error::{categorize_ai, user_message};
use crate::retry::{RetryPolicy, with_backoff};

mod images;
mod prelude;
mod views;

use prelude::*;
use views::{DailyCard, FavoriteView, HomeTemplate, QuoteCard};

#[derive(Clone)]
pub(crate) struct AppState {
    db: DatabaseConnection,
    quotes: Arc<dyn QuoteSource>,
    images: Arc<dyn ImageGeneration>,
    stock: Arc<dyn StockPhotoSearch>,
    http: reqwest::Client,
    retry: RetryPolicy,
}

impl AppState {
    fn new(
        db: DatabaseConnection,
        quotes: Arc<dyn QuoteSource>,
        images: Arc<dyn ImageGeneration>,
        stock: Arc<dyn StockPhotoSearch>,
    ) -> Self {
        Self {
            db,
            quotes,
            images,
            stock,
            http: reqwest::Client::new(),
            retry: RetryPolicy::default(),
        }
    }
}

fn home_page(
    daily: DailyCard,
    theme: String,
    results: Vec<QuoteCard>,
    favorites: Vec<favorites::Model>,
    notice: Option<(&str, &str)>,
) -> HomeTemplate {
    let (notice_text, notice_class) = notice.unwrap_or(("", ""));
    HomeTemplate {
        daily,
        theme,
        results,
        favorites: favorites.into_iter().map(FavoriteView::from).collect(),
        has_notice: !notice_text.is_empty(),
        notice_text: notice_text.to_string(),
        notice_class: notice_class.to_string(),
    }
}

fn daily_card() -> Result<DailyCard, SophiaError> {
    let today = Utc::now().date_naive();
    let entry = crate::daily::quote_for(today)
        .map_err(|err| SophiaError::InternalServerError(err.to_string()))?;
    Ok(DailyCard::new(entry, crate::daily::backdrop_for(today)))
}

/// handles the / GET
async fn root_handler(State(state): State<AppState>) -> Result<HomeTemplate, SophiaError> {
    let favorites = favorites::all(&state.db).await?;
    Ok(home_page(
        daily_card()?,
        String::new(),
        Vec::new(),
        favorites,
        None,
    ))
}

#[derive(Deserialize)]
struct GenerateForm {
    theme: String,
}

/// Resolves a backdrop for every quote concurrently; order of completion is
/// irrelevant, cards are re-slotted by input index.
async fn attach_backdrops(state: &AppState, quotes: Vec<Quote>) -> Vec<Quote> {
    let count = quotes.len();
    let mut tasks = JoinSet::new();
    for (index, quote) in quotes.into_iter().enumerate() {
        let quote_source = state.quotes.clone();
        let images = state.images.clone();
        let stock = state.stock.clone();
        let retry = state.retry;
        tasks.spawn(async move {
            let image_url = match quote_source.image_brief(&quote.quote).await {
                Ok(brief) => {
                    ai::resolve_backdrop(retry, images.as_ref(), stock.as_ref(), &brief).await
                }
                Err(err) => {
                    warn!("image brief failed, using a static backdrop: {err}");
                    ai::static_fallback()
                }
            };
            (index, quote.with_image_url(image_url))
        });
    }

    let mut resolved: Vec<Option<Quote>> = (0..count).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, quote)) => {
                if let Some(slot) = resolved.get_mut(index) {
                    *slot = Some(quote);
                }
            }
            Err(err) => error!("backdrop task failed: {err}"),
        }
    }
    resolved.into_iter().flatten().collect()
}

/// handles the /generate POST
async fn generate_handler(
    State(state): State<AppState>,
    Form(form): Form<GenerateForm>,
) -> Result<HomeTemplate, SophiaError> {
    let theme = form.theme.trim().to_string();
    if theme.is_empty() {
        let favorites = favorites::all(&state.db).await?;
        return Ok(home_page(
            daily_card()?,
            String::new(),
            Vec::new(),
            favorites,
            Some(("Give the muse a theme first.", "warning")),
        ));
    }

    info!("generating quotes for theme {theme:?}");
    let generated = with_backoff(state.retry, || {
        state.quotes.themed_quotes(&theme, GENERATED_QUOTE_COUNT)
    })
    .await;

    let quotes = match generated {
        Ok(quotes) => quotes,
        Err(err) => {
            error!("quote generation failed: {err}");
            let favorites = favorites::all(&state.db).await?;
            return Ok(home_page(
                daily_card()?,
                theme,
                Vec::new(),
                favorites,
                Some((user_message(categorize_ai(&err)), "error")),
            ));
        }
    };

    let quotes = attach_backdrops(&state, quotes).await;
    let favorites = favorites::all(&state.db).await?;
    let results = {
        let favorite_texts: HashSet<&str> = favorites
            .iter()
            .map(|row| row.quote_text.as_str())
            .collect();
        quotes
            .iter()
            .map(|quote| QuoteCard {
                id: quote.id.clone(),
                quote: quote.quote.clone(),
                author: quote.author.clone(),
                image_url: quote.image_url.clone(),
                is_favorite: favorite_texts.contains(quote.quote.as_str()),
            })
            .collect()
    };

    Ok(home_page(daily_card()?, theme, results, favorites, None))
}

#[derive(Deserialize)]
struct FavoriteForm {
    quote: String,
    author: String,
    image_url: String,
}

/// handles the /favorites POST
async fn favorite_handler(
    State(state): State<AppState>,
    Form(form): Form<FavoriteForm>,
) -> Result<Redirect, SophiaError> {
    let quote_text = form.quote.trim();
    if quote_text.is_empty() {
        return Err(SophiaError::BadRequest);
    }

    let now_favorited = favorites::toggle(
        &state.db,
        quote_text,
        form.author.trim(),
        form.image_url.trim(),
    )
    .await?;
    info!(
        "favorite {} for {quote_text:?}",
        if now_favorited { "saved" } else { "removed" }
    );

    Ok(Redirect::to("/"))
}

/// handles the /favorites/{id}/image GET
async fn favorite_image_handler(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    headers: HeaderMap,
) -> Result<Response, SophiaError> {
    let favorite = favorites::by_id(&state.db, id)
        .await?
        .ok_or_else(|| SophiaError::NotFound(format!("/favorites/{id}/image")))?;

    match images::decode_data_uri(&favorite.image_url)? {
        Some(payload) => {
            let validators =
                images::CacheValidators::new(payload.bytes.len() as u64, favorite.created_at);
            if validators.request_is_fresh(&headers) {
                return validators.not_modified();
            }
            validators.payload_response(payload)
        }
        None => {
            // externally hosted backdrop
            url::Url::parse(&favorite.image_url)?;
            Ok(Redirect::temporary(&favorite.image_url).into_response())
        }
    }
}

#[derive(Deserialize)]
struct ExportForm {
    id: String,
    image_url: String,
}

fn export_filename(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(32)
        .collect();
    if cleaned.is_empty() {
        "sophia-card".to_string()
    } else {
        format!("sophia-{cleaned}")
    }
}

/// handles the /export POST
async fn export_handler(
    State(state): State<AppState>,
    Form(form): Form<ExportForm>,
) -> Result<Response, SophiaError> {
    let bytes = match images::decode_data_uri(&form.image_url)? {
        Some(payload) => payload.bytes,
        None => {
            let parsed = url::Url::parse(&form.image_url)?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(SophiaError::BadRequest);
            }
            let response = state
                .http
                .get(parsed)
                .send()
                .await
                .map_err(|err| SophiaError::InternalServerError(format!("fetch backdrop: {err}")))?;
            if !response.status().is_success() {
                return Err(SophiaError::InternalServerError(format!(
                    "fetch backdrop: HTTP {}",
                    response.status()
                )));
            }
            response
                .bytes()
                .await
                .map_err(|err| SophiaError::InternalServerError(format!("read backdrop: {err}")))?
                .to_vec()
        }
    };

    let png = images::encode_png(&bytes)?;
    images::png_download(&export_filename(&form.id), png)
}

fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", axum::routing::get(root_handler))
        .route("/generate", axum::routing::post(generate_handler))
        .route("/favorites", axum::routing::post(favorite_handler))
        .route(
            "/favorites/{id}/image",
            axum::routing::get(favorite_image_handler),
        )
        .route("/export", axum::routing::post(export_handler))
        .nest_service("/static", ServeDir::new("static"))
}

/// Builds the app and serves it until the listener dies.
pub async fn setup_server(
    listen_addr: &str,
    port: NonZeroU16,
    db: DatabaseConnection,
    quotes: Arc<dyn QuoteSource>,
    images: Arc<dyn ImageGeneration>,
    stock: Arc<dyn StockPhotoSearch>,
) -> Result<(), anyhow::Error> {
    let app = create_router().with_state(AppState::new(db, quotes, images, stock));

    let addr = format!("{}:{}", listen_addr, port);
    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    if let Err(err) = axum::serve(listener, app).await {
        error!("Server error: {}", err);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE, ETAG, IF_NONE_MATCH, LOCATION};
    use axum::http::Request;
    use base64::Engine;
    use base64::engine::general_purpose;
    use http_body_util::BodyExt;
    use sea_orm_migration::MigratorTrait;
    use tower::ServiceExt;

    use crate::ai::{AiError, ImageBrief};
    use crate::error::{ErrorCategory, user_message};

    struct ScriptedQuotes;

    #[async_trait]
    impl QuoteSource for ScriptedQuotes {
        async fn themed_quotes(&self, _theme: &str, _count: usize) -> Result<Vec<Quote>, AiError> {
            Ok(vec![
                Quote {
                    id: "q1aaaaaaaaaa".to_string(),
                    quote: "Stillness is a kind of motion.".to_string(),
                    author: "Laozi".to_string(),
                    image_url: String::new(),
                },
                Quote {
                    id: "q2bbbbbbbbbb".to_string(),
                    quote: "Rivers remember the mountain.".to_string(),
                    author: "Heraclitus".to_string(),
                    image_url: String::new(),
                },
            ])
        }

        async fn image_brief(&self, _quote_text: &str) -> Result<ImageBrief, AiError> {
            Ok(ImageBrief {
                visual_description: "mist over a mountain lake".to_string(),
                keywords: vec!["mist".to_string(), "lake".to_string()],
            })
        }
    }

    struct MissingKeyQuotes;

    #[async_trait]
    impl QuoteSource for MissingKeyQuotes {
        async fn themed_quotes(&self, _theme: &str, _count: usize) -> Result<Vec<Quote>, AiError> {
            Err(AiError::MissingApiKey("GEMINI_API_KEY"))
        }

        async fn image_brief(&self, _quote_text: &str) -> Result<ImageBrief, AiError> {
            Err(AiError::MissingApiKey("GEMINI_API_KEY"))
        }
    }

    struct BrokenImages;

    #[async_trait]
    impl ImageGeneration for BrokenImages {
        async fn generate_image(&self, _description: &str) -> Result<String, AiError> {
            Err(AiError::Api {
                status: 500,
                message: "no scenes today".to_string(),
            })
        }
    }

    struct ForestStock;

    #[async_trait]
    impl StockPhotoSearch for ForestStock {
        async fn search_photo(&self, _keywords: &[String]) -> Result<Option<String>, AiError> {
            Ok(Some("https://photos.example.com/forest.jpg".to_string()))
        }
    }

    async fn setup_state(
        quotes: Arc<dyn QuoteSource>,
        images: Arc<dyn ImageGeneration>,
        stock: Arc<dyn StockPhotoSearch>,
    ) -> AppState {
        let _ = crate::daily::init();
        let db = crate::db::connect_test_db().await.expect("connect test db");
        crate::db::migrations::Migrator::up(&db, None)
            .await
            .expect("run migrations");
        AppState::new(db, quotes, images, stock)
    }

    async fn default_state() -> AppState {
        setup_state(
            Arc::new(ScriptedQuotes),
            Arc::new(BrokenImages),
            Arc::new(ForestStock),
        )
        .await
    }

    async fn read_body(response: axum::response::Response) -> String {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        String::from_utf8_lossy(&bytes).to_string()
    }

    fn form_encode(value: &str) -> String {
        value
            .bytes()
            .map(|b| match b {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' => {
                    (b as char).to_string()
                }
                _ => format!("%{:02X}", b),
            })
            .collect()
    }

    fn form_request(uri: &str, body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    fn tiny_png_data_uri() -> String {
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([80, 90, 100, 255]));
        let mut out = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .expect("encode png");
        format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode(out.into_inner())
        )
    }

    #[tokio::test]
    async fn homepage_shows_the_daily_quote() {
        let state = default_state().await;
        let app = create_router().with_state(state);

        let request = Request::builder()
            .method("GET")
            .uri("/")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let expected = crate::daily::quote_for(Utc::now().date_naive())
            .expect("daily pool initialized")
            .clone();
        let body = read_body(response).await;
        assert!(body.contains("Sophia"));
        assert!(body.contains(&expected.author));
    }

    #[tokio::test]
    async fn generate_resolves_stock_backdrops_when_the_image_model_fails() {
        let state = default_state().await;
        let app = create_router().with_state(state);

        let response = app
            .oneshot(form_request("/generate", "theme=stillness".to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = read_body(response).await;
        assert!(body.contains("Stillness is a kind of motion."));
        assert!(body.contains("Rivers remember the mountain."));
        assert!(body.contains("https://photos.example.com/forest.jpg"));
    }

    #[tokio::test]
    async fn generate_without_credentials_shows_the_credential_notice() {
        let state = setup_state(
            Arc::new(MissingKeyQuotes),
            Arc::new(BrokenImages),
            Arc::new(ForestStock),
        )
        .await;
        let app = create_router().with_state(state);

        let response = app
            .oneshot(form_request("/generate", "theme=hope".to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = read_body(response).await;
        assert!(body.contains(user_message(ErrorCategory::MissingCredential)));
    }

    #[tokio::test]
    async fn toggling_a_favorite_twice_leaves_the_list_unchanged() {
        let state = default_state().await;
        let db = state.db.clone();
        let app = create_router().with_state(state);

        let body = format!(
            "quote={}&author={}&image_url={}",
            form_encode("Know thyself."),
            form_encode("Socrates"),
            form_encode("https://photos.example.com/delphi.jpg"),
        );

        let response = app
            .clone()
            .oneshot(form_request("/favorites", body.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(favorites::all(&db).await.unwrap().len(), 1);

        let response = app
            .oneshot(form_request("/favorites", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(favorites::all(&db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn favorite_backdrop_serves_with_cache_validators() {
        let state = default_state().await;
        let db = state.db.clone();
        let app = create_router().with_state(state);

        favorites::toggle(&db, "Know thyself.", "Socrates", &tiny_png_data_uri())
            .await
            .expect("save favorite");
        let saved = favorites::all(&db).await.unwrap().remove(0);

        let request = Request::builder()
            .method("GET")
            .uri(format!("/favorites/{}/image", saved.id))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "image/png"
        );
        let etag = response.headers().get(ETAG).expect("etag present").clone();

        let request = Request::builder()
            .method("GET")
            .uri(format!("/favorites/{}/image", saved.id))
            .header(IF_NONE_MATCH, etag)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    }

    #[tokio::test]
    async fn external_favorite_backdrop_redirects() {
        let state = default_state().await;
        let db = state.db.clone();
        let app = create_router().with_state(state);

        favorites::toggle(
            &db,
            "Hell is other people.",
            "Jean-Paul Sartre",
            "https://photos.example.com/doors.jpg",
        )
        .await
        .expect("save favorite");
        let saved = favorites::all(&db).await.unwrap().remove(0);

        let request = Request::builder()
            .method("GET")
            .uri(format!("/favorites/{}/image", saved.id))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers().get(LOCATION).unwrap(),
            "https://photos.example.com/doors.jpg"
        );
    }

    #[tokio::test]
    async fn export_returns_a_png_attachment() {
        let state = default_state().await;
        let app = create_router().with_state(state);

        let body = format!(
            "id={}&image_url={}",
            form_encode("q1aaaaaaaaaa"),
            form_encode(&tiny_png_data_uri()),
        );
        let response = app
            .oneshot(form_request("/export", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "image/png"
        );
        assert_eq!(
            response.headers().get(CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=\"sophia-q1aaaaaaaaaa.png\""
        );

        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[tokio::test]
    async fn empty_theme_asks_for_one() {
        let state = default_state().await;
        let app = create_router().with_state(state);

        let response = app
            .oneshot(form_request("/generate", "theme=".to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_body(response).await;
        assert!(body.contains("Give the muse a theme first."));
    }
}
