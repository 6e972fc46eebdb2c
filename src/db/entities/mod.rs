//! Database entities
pub mod favorites;
