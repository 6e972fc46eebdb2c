//! DB storage for favorited quotes
use chrono::Utc;
use sea_orm::{ActiveValue::Set, QueryOrder, TransactionTrait, entity::prelude::*};

use crate::error::SophiaError;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "favorites")]
/// Favorited quotes, keyed by quote text
pub struct Model {
    #[sea_orm(primary_key)]
    /// db id
    pub id: i32,
    /// the quote text; favorites are keyed on this
    pub quote_text: String,
    /// attributed author
    pub author: String,
    /// data URI or external URL of the backdrop
    pub image_url: String,
    /// when the favorite was saved
    pub created_at: DateTime,
}

/// relations for favorites
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// All favorites, newest first.
pub async fn all(db: &DatabaseConnection) -> Result<Vec<Model>, DbErr> {
    Entity::find()
        .order_by_desc(Column::CreatedAt)
        .all(db)
        .await
}

/// Looks up one favorite by id.
pub async fn by_id(db: &DatabaseConnection, id: i32) -> Result<Option<Model>, DbErr> {
    Entity::find_by_id(id).one(db).await
}

/// Toggles a favorite keyed by quote text equality; returns true when the
/// quote is now favorited. Toggling twice leaves the list as it was.
pub async fn toggle(
    db: &DatabaseConnection,
    quote_text: &str,
    author: &str,
    image_url: &str,
) -> Result<bool, SophiaError> {
    let txn = db.begin().await?;

    let existing = Entity::find()
        .filter(Column::QuoteText.eq(quote_text))
        .one(&txn)
        .await?;

    let now_favorited = match existing {
        Some(model) => {
            model.delete(&txn).await?;
            false
        }
        None => {
            let active = ActiveModel {
                quote_text: Set(quote_text.to_string()),
                author: Set(author.to_string()),
                image_url: Set(image_url.to_string()),
                created_at: Set(Utc::now().naive_utc()),
                ..Default::default()
            };
            active.insert(&txn).await?;
            true
        }
    };
    txn.commit().await?;

    Ok(now_favorited)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use sea_orm_migration::MigratorTrait;

    async fn setup_db() -> DatabaseConnection {
        let db = crate::db::connect_test_db().await.expect("connect test db");
        crate::db::migrations::Migrator::up(&db, None)
            .await
            .expect("run migrations");
        db
    }

    #[tokio::test]
    async fn toggling_twice_restores_the_original_list() {
        let db = setup_db().await;

        let before = all(&db).await.unwrap();
        assert!(before.is_empty());

        let first = toggle(&db, "Know thyself.", "Socrates", "https://x.example/a.jpg")
            .await
            .unwrap();
        assert!(first);
        assert_eq!(all(&db).await.unwrap().len(), 1);

        let second = toggle(&db, "Know thyself.", "Socrates", "https://x.example/a.jpg")
            .await
            .unwrap();
        assert!(!second);
        assert_eq!(all(&db).await.unwrap(), before);
    }

    #[tokio::test]
    async fn toggle_keys_on_quote_text_not_author() {
        let db = setup_db().await;

        toggle(&db, "No man ever steps in the same river twice.", "Heraclitus", "")
            .await
            .unwrap();
        // Same text with different metadata still removes the entry.
        let now_favorited = toggle(
            &db,
            "No man ever steps in the same river twice.",
            "Unknown",
            "https://x.example/b.jpg",
        )
        .await
        .unwrap();
        assert!(!now_favorited);
        assert!(all(&db).await.unwrap().is_empty());
    }
}
