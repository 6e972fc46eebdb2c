use super::prelude::*;
use crate::daily::DailyQuote;

/// A generated quote ready for the results grid.
#[derive(Clone, Debug)]
pub(crate) struct QuoteCard {
    pub(crate) id: String,
    pub(crate) quote: String,
    pub(crate) author: String,
    pub(crate) image_url: String,
    pub(crate) is_favorite: bool,
}

/// A persisted favorite; the backdrop is served via its own route.
#[derive(Clone, Debug)]
pub(crate) struct FavoriteView {
    pub(crate) id: i32,
    pub(crate) quote: String,
    pub(crate) author: String,
    pub(crate) image_url: String,
}

impl From<favorites::Model> for FavoriteView {
    fn from(model: favorites::Model) -> Self {
        Self {
            id: model.id,
            quote: model.quote_text,
            author: model.author,
            image_url: model.image_url,
        }
    }
}

/// The quote-of-the-day card.
#[derive(Clone, Debug)]
pub(crate) struct DailyCard {
    pub(crate) quote: String,
    pub(crate) author: String,
    pub(crate) image_url: String,
}

impl DailyCard {
    pub(crate) fn new(entry: &DailyQuote, image_url: &str) -> Self {
        Self {
            quote: entry.quote.clone(),
            author: entry.author.clone(),
            image_url: image_url.to_string(),
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub(crate) struct HomeTemplate {
    pub(crate) daily: DailyCard,
    pub(crate) theme: String,
    pub(crate) results: Vec<QuoteCard>,
    pub(crate) favorites: Vec<FavoriteView>,
    pub(crate) has_notice: bool,
    pub(crate) notice_text: String,
    pub(crate) notice_class: String,
}
