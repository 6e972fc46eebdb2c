pub(crate) use crate::db::entities::favorites;
pub(crate) use crate::error::SophiaError;
pub(crate) use crate::web::AppState;
pub(crate) use askama::Template;
pub(crate) use askama_web::WebTemplate;
pub(crate) use axum::extract::{Form, Path, State};
pub(crate) use axum::http::StatusCode;
pub(crate) use axum::response::{IntoResponse, Redirect, Response};
pub(crate) use chrono::Utc;
pub(crate) use sea_orm::DatabaseConnection;
pub(crate) use serde::Deserialize;
pub(crate) use std::sync::Arc;
pub(crate) use tracing::{error, info, warn};
