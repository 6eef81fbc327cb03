//! Favorites - renders a user saved for later.
//!
//! A room can be favorited at most once per user; the `(user_id, room_id)`
//! unique index enforces it and inserts use `ON CONFLICT DO NOTHING`.

use crate::{
    core::events::{self, EventKind},
    entities::{Favorite, FavoriteModel, favorite},
    errors::Result,
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::OnConflict};

/// A render to save
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFavorite {
    /// Room identifier
    pub room_id: String,
    /// Room label
    pub room_name: String,
    /// Render location
    pub image_url: String,
}

/// Saves a render to the user's favorites.
///
/// Returns `true` if it was newly added; re-adding is a no-op.
pub async fn add_favorite(db: &DatabaseConnection, user_id: &str, room: &NewFavorite) -> Result<bool> {
    let txn = db.begin().await?;
    let row = favorite::ActiveModel {
        user_id: Set(user_id.to_string()),
        room_id: Set(room.room_id.clone()),
        room_name: Set(room.room_name.clone()),
        image_url: Set(room.image_url.clone()),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    let inserted = Favorite::insert(row)
        .on_conflict(
            OnConflict::columns([favorite::Column::UserId, favorite::Column::RoomId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(&txn)
        .await?;

    if inserted > 0 {
        events::append_room_event(
            &txn,
            user_id,
            EventKind::Favorited,
            &room.room_id,
            &room.room_name,
            &room.image_url,
        )
        .await?;
    }
    txn.commit().await?;
    Ok(inserted > 0)
}

/// Removes a favorite. Returns `true` if one existed.
pub async fn remove_favorite(db: &DatabaseConnection, user_id: &str, room_id: &str) -> Result<bool> {
    let txn = db.begin().await?;
    let deleted = Favorite::delete_many()
        .filter(favorite::Column::UserId.eq(user_id))
        .filter(favorite::Column::RoomId.eq(room_id))
        .exec(&txn)
        .await?
        .rows_affected;

    if deleted > 0 {
        events::append_event(
            &txn,
            user_id,
            EventKind::Unfavorited,
            room_id,
            serde_json::Value::Null,
        )
        .await?;
    }
    txn.commit().await?;
    Ok(deleted > 0)
}

/// Adds the favorite if absent, removes it otherwise. Returns the new state.
pub async fn toggle_favorite(db: &DatabaseConnection, user_id: &str, room: &NewFavorite) -> Result<bool> {
    if remove_favorite(db, user_id, &room.room_id).await? {
        Ok(false)
    } else {
        add_favorite(db, user_id, room).await
    }
}

/// Whether `room_id` is in the user's favorites.
pub async fn is_favorite(db: &DatabaseConnection, user_id: &str, room_id: &str) -> Result<bool> {
    let found = Favorite::find()
        .filter(favorite::Column::UserId.eq(user_id))
        .filter(favorite::Column::RoomId.eq(room_id))
        .one(db)
        .await?;
    Ok(found.is_some())
}

/// The user's favorites, newest first.
pub async fn list_favorites(db: &DatabaseConnection, user_id: &str) -> Result<Vec<FavoriteModel>> {
    Favorite::find()
        .filter(favorite::Column::UserId.eq(user_id))
        .order_by_desc(favorite::Column::CreatedAt)
        .order_by_desc(favorite::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::replay;
    use crate::test_utils::*;

    fn room(id: &str) -> NewFavorite {
        NewFavorite {
            room_id: id.to_string(),
            room_name: format!("{id} (Modern)"),
            image_url: format!("data:image/png;base64,{id}"),
        }
    }

    #[tokio::test]
    async fn test_add_favorite_is_unique_per_room() -> Result<()> {
        let db = setup_test_db().await?;

        assert!(add_favorite(&db, "user1", &room("kitchen")).await?);
        assert!(!add_favorite(&db, "user1", &room("kitchen")).await?);
        // Another user may favorite the same room id
        assert!(add_favorite(&db, "user2", &room("kitchen")).await?);

        assert_eq!(list_favorites(&db, "user1").await?.len(), 1);
        assert!(is_favorite(&db, "user1", "kitchen").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_toggle_favorite() -> Result<()> {
        let db = setup_test_db().await?;

        assert!(toggle_favorite(&db, "user1", &room("bath")).await?);
        assert!(!toggle_favorite(&db, "user1", &room("bath")).await?);
        assert!(!is_favorite(&db, "user1", "bath").await?);
        assert!(!remove_favorite(&db, "user1", "bath").await?);

        // The projection sees the net effect
        let projection = replay(&db, "user1").await?;
        assert!(projection.favorites.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_list_favorites_newest_first() -> Result<()> {
        let db = setup_test_db().await?;
        add_favorite(&db, "user1", &room("a")).await?;
        add_favorite(&db, "user1", &room("b")).await?;

        let ids: Vec<_> = list_favorites(&db, "user1")
            .await?
            .into_iter()
            .map(|f| f.room_id)
            .collect();
        assert_eq!(ids, ["b", "a"]);
        Ok(())
    }
}
