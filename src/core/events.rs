//! Design events - append-only history of what a user did in the studio.
//!
//! Social and studio operations append one row per user-visible action. The
//! studio view (recent renders, favorite set, likes) is never stored directly;
//! [`replay`] folds the history into a [`StudioProjection`].

use crate::{
    entities::{DesignEvent, DesignEventModel, design_event},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

/// How many recent renders the studio view keeps
pub const MAX_RECENT_ROOMS: usize = 10;

/// Kind of recorded action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A room render was produced
    Generated,
    /// A render was saved to favorites
    Favorited,
    /// A favorite was removed
    Unfavorited,
    /// A render was published to the community feed
    Shared,
    /// The publisher withdrew a shared design
    Unshared,
    /// The user liked a feed design
    Liked,
    /// The user withdrew a like
    Unliked,
}

impl EventKind {
    /// Stored name of the kind
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Generated => "generated",
            Self::Favorited => "favorited",
            Self::Unfavorited => "unfavorited",
            Self::Shared => "shared",
            Self::Unshared => "unshared",
            Self::Liked => "liked",
            Self::Unliked => "unliked",
        }
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "generated" => Ok(Self::Generated),
            "favorited" => Ok(Self::Favorited),
            "unfavorited" => Ok(Self::Unfavorited),
            "shared" => Ok(Self::Shared),
            "unshared" => Ok(Self::Unshared),
            "liked" => Ok(Self::Liked),
            "unliked" => Ok(Self::Unliked),
            other => Err(Error::invalid_payload(format!("unknown event kind '{other}'"))),
        }
    }
}

/// Payload carried by room-level events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPayload {
    /// Room label, e.g. "Kitchen (Scandinavian)"
    pub room_name: String,
    /// Render location
    pub image_url: String,
}

/// Appends one event to the user's history.
pub async fn append_event<C>(
    db: &C,
    user_id: &str,
    kind: EventKind,
    subject_id: &str,
    payload: serde_json::Value,
) -> Result<DesignEventModel>
where
    C: ConnectionTrait,
{
    let event = design_event::ActiveModel {
        user_id: Set(user_id.to_string()),
        kind: Set(kind.as_str().to_string()),
        subject_id: Set(subject_id.to_string()),
        payload: Set(payload),
        occurred_at: Set(Utc::now()),
        ..Default::default()
    };
    let event = event.insert(db).await?;
    tracing::debug!(user_id, kind = kind.as_str(), subject_id, "Appended design event");
    Ok(event)
}

/// Appends a room-level event carrying a [`RoomPayload`].
pub async fn append_room_event<C>(
    db: &C,
    user_id: &str,
    kind: EventKind,
    room_id: &str,
    room_name: &str,
    image_url: &str,
) -> Result<DesignEventModel>
where
    C: ConnectionTrait,
{
    let payload = serde_json::to_value(RoomPayload {
        room_name: room_name.to_string(),
        image_url: image_url.to_string(),
    })
    .map_err(|e| Error::invalid_payload(e.to_string()))?;
    append_event(db, user_id, kind, room_id, payload).await
}

/// Full history of `user_id`, oldest first.
pub async fn events_for_user<C>(db: &C, user_id: &str) -> Result<Vec<DesignEventModel>>
where
    C: ConnectionTrait,
{
    DesignEvent::find()
        .filter(design_event::Column::UserId.eq(user_id))
        .order_by_asc(design_event::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// A render as the studio view shows it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedRoom {
    /// Room identifier
    pub room_id: String,
    /// Room label
    pub room_name: String,
    /// Render location
    pub image_url: String,
}

/// The studio view derived from a user's events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudioProjection {
    /// Recent renders, newest first
    pub recent_rooms: Vec<ProjectedRoom>,
    /// Room ids currently in favorites
    pub favorites: BTreeSet<String>,
    /// Feed designs the user published
    pub shared: Vec<String>,
    /// Feed designs the user currently likes
    pub liked: BTreeSet<String>,
}

impl StudioProjection {
    /// Folds one event into the view.
    ///
    /// Events with an unknown kind or an unreadable payload are skipped.
    pub fn apply(&mut self, event: &DesignEventModel) {
        let Ok(kind) = event.kind.parse::<EventKind>() else {
            tracing::warn!(id = event.id, kind = %event.kind, "Skipping unknown design event");
            return;
        };
        let subject = event.subject_id.clone();

        match kind {
            EventKind::Generated => {
                let Ok(payload) = serde_json::from_value::<RoomPayload>(event.payload.clone()) else {
                    tracing::warn!(id = event.id, "Skipping design event with bad payload");
                    return;
                };
                self.recent_rooms.retain(|room| room.room_id != subject);
                self.recent_rooms.insert(
                    0,
                    ProjectedRoom {
                        room_id: subject,
                        room_name: payload.room_name,
                        image_url: payload.image_url,
                    },
                );
                self.recent_rooms.truncate(MAX_RECENT_ROOMS);
            }
            EventKind::Favorited => {
                self.favorites.insert(subject);
            }
            EventKind::Unfavorited => {
                self.favorites.remove(&subject);
            }
            EventKind::Shared => {
                if !self.shared.contains(&subject) {
                    self.shared.push(subject);
                }
            }
            EventKind::Unshared => {
                self.shared.retain(|id| *id != subject);
                self.liked.remove(&subject);
            }
            EventKind::Liked => {
                self.liked.insert(subject);
            }
            EventKind::Unliked => {
                self.liked.remove(&subject);
            }
        }
    }
}

/// Rebuilds the studio view of `user_id` from its events.
pub async fn replay<C>(db: &C, user_id: &str) -> Result<StudioProjection>
where
    C: ConnectionTrait,
{
    let mut projection = StudioProjection::default();
    for event in events_for_user(db, user_id).await? {
        projection.apply(&event);
    }
    Ok(projection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_replay_builds_projection() -> Result<()> {
        let db = setup_test_db().await?;

        append_room_event(&db, "user1", EventKind::Generated, "r1", "Kitchen (Modern)", "img1").await?;
        append_room_event(&db, "user1", EventKind::Generated, "r2", "Bedroom (Boho)", "img2").await?;
        append_room_event(&db, "user1", EventKind::Favorited, "r1", "Kitchen (Modern)", "img1").await?;
        append_room_event(&db, "user1", EventKind::Favorited, "r2", "Bedroom (Boho)", "img2").await?;
        append_room_event(&db, "user1", EventKind::Unfavorited, "r2", "Bedroom (Boho)", "img2").await?;
        append_event(&db, "user1", EventKind::Liked, "d9", serde_json::Value::Null).await?;
        append_room_event(&db, "user1", EventKind::Shared, "d1", "Kitchen (Modern)", "img1").await?;
        append_room_event(&db, "user1", EventKind::Shared, "d2", "Kitchen (Modern)", "img1").await?;
        append_event(&db, "user1", EventKind::Unshared, "d1", serde_json::Value::Null).await?;
        // Other users' events stay out
        append_room_event(&db, "user2", EventKind::Generated, "r3", "Bath", "img3").await?;

        let projection = replay(&db, "user1").await?;
        let ids: Vec<_> = projection.recent_rooms.iter().map(|r| r.room_id.as_str()).collect();
        assert_eq!(ids, ["r2", "r1"]);
        assert_eq!(projection.favorites, BTreeSet::from(["r1".to_string()]));
        assert!(projection.liked.contains("d9"));
        assert_eq!(projection.shared, ["d2"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_recent_rooms_are_capped() -> Result<()> {
        let db = setup_test_db().await?;
        for i in 0..12 {
            let id = format!("r{i}");
            append_room_event(&db, "user1", EventKind::Generated, &id, "Room", "img").await?;
        }

        let projection = replay(&db, "user1").await?;
        assert_eq!(projection.recent_rooms.len(), MAX_RECENT_ROOMS);
        assert_eq!(projection.recent_rooms[0].room_id, "r11");
        Ok(())
    }

    #[test]
    fn test_unknown_kind_is_skipped() {
        let mut projection = StudioProjection::default();
        projection.apply(&DesignEventModel {
            id: 1,
            user_id: "user1".to_string(),
            kind: "exploded".to_string(),
            subject_id: "x".to_string(),
            payload: serde_json::Value::Null,
            occurred_at: Utc::now(),
        });
        assert_eq!(projection, StudioProjection::default());
    }
}
