//! Community feed - shared designs, likes and emoji reactions.
//!
//! Every write to the feed publishes a [`FeedChange`] on a broadcast channel.
//! Changes only say *that* something changed; subscribers re-fetch the list.
//! Like and reaction counters are adjusted with column expressions, never by
//! read-modify-write, and the like counter is floored at zero.

use crate::{
    core::events::{self, EventKind},
    entities::{
        DesignLike, DesignReaction, SharedDesign, SharedDesignModel, design_like, design_reaction,
        shared_design,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{
    QueryOrder, QuerySelect, Set, TransactionTrait,
    prelude::*,
    sea_query::{Expr, OnConflict},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::broadcast;
use tracing::{debug, info};

const FEED_CHANNEL_CAPACITY: usize = 64;
const MAX_EMOJI_LEN: usize = 16;

/// Notification that the feed changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedChange {
    /// A design was shared
    Inserted {
        /// Design id
        id: String,
    },
    /// Likes or reactions of a design changed
    Updated {
        /// Design id
        id: String,
    },
    /// A design was withdrawn
    Deleted {
        /// Design id
        id: String,
    },
    /// The subscriber fell behind and must reload everything
    Resync,
}

/// Fan-out of feed changes to live subscribers
#[derive(Debug, Clone)]
pub struct FeedNotifier {
    sender: broadcast::Sender<FeedChange>,
}

impl Default for FeedNotifier {
    fn default() -> Self {
        Self::new(FEED_CHANNEL_CAPACITY)
    }
}

impl FeedNotifier {
    /// Channel buffering up to `capacity` changes per slow subscriber
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// New receiver that sees every change published from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<FeedChange> {
        self.sender.subscribe()
    }

    /// Publishes `change`; having no subscribers is fine.
    pub fn publish(&self, change: FeedChange) {
        let receivers = self.sender.send(change).unwrap_or(0);
        debug!(receivers, "Published feed change");
    }
}

/// A render to publish
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSharedDesign {
    /// Room the render came from
    pub room_id: String,
    /// Room label
    pub room_name: String,
    /// Render location
    pub image_url: String,
}

/// A feed entry as a given viewer sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    /// Design id
    pub id: String,
    /// Publisher
    pub user_id: String,
    /// Room label
    pub room_name: String,
    /// Render location
    pub image_url: String,
    /// Like counter
    pub likes: i64,
    /// Emoji counters
    pub reactions: BTreeMap<String, i64>,
    /// Whether the viewer likes it
    pub liked_by_viewer: bool,
    /// Publication time
    pub created_at: DateTimeUtc,
}

/// Like state after a toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeState {
    /// Whether the user now likes the design
    pub liked: bool,
    /// Counter after the toggle
    pub likes: i64,
}

/// Publishes a render to the community feed.
pub async fn share_design(
    db: &DatabaseConnection,
    notifier: &FeedNotifier,
    user_id: &str,
    design: &NewSharedDesign,
) -> Result<SharedDesignModel> {
    let txn = db.begin().await?;
    let shared = shared_design::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        user_id: Set(user_id.to_string()),
        room_id: Set(design.room_id.clone()),
        room_name: Set(design.room_name.clone()),
        image_url: Set(design.image_url.clone()),
        likes: Set(0),
        created_at: Set(Utc::now()),
    }
    .insert(&txn)
    .await?;

    events::append_room_event(
        &txn,
        user_id,
        EventKind::Shared,
        &shared.id,
        &shared.room_name,
        &shared.image_url,
    )
    .await?;
    txn.commit().await?;

    info!(user_id, design_id = %shared.id, "Shared design");
    notifier.publish(FeedChange::Inserted {
        id: shared.id.clone(),
    });
    Ok(shared)
}

/// Looks up one shared design.
pub async fn get_design<C>(db: &C, design_id: &str) -> Result<SharedDesignModel>
where
    C: ConnectionTrait,
{
    SharedDesign::find_by_id(design_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::NotFound {
            entity: "shared design",
            key: design_id.to_string(),
        })
}

/// Shared designs, newest first, optionally limited.
pub async fn list_designs(db: &DatabaseConnection, limit: Option<u64>) -> Result<Vec<SharedDesignModel>> {
    SharedDesign::find()
        .order_by_desc(shared_design::Column::CreatedAt)
        .order_by_desc(shared_design::Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}

/// The feed with reaction counters and the viewer's likes attached.
pub async fn list_feed(
    db: &DatabaseConnection,
    viewer: Option<&str>,
    limit: Option<u64>,
) -> Result<Vec<FeedItem>> {
    let designs = list_designs(db, limit).await?;
    let ids: Vec<String> = designs.iter().map(|d| d.id.clone()).collect();

    let mut reactions: HashMap<String, BTreeMap<String, i64>> = HashMap::new();
    for reaction in DesignReaction::find()
        .filter(design_reaction::Column::DesignId.is_in(ids.clone()))
        .all(db)
        .await?
    {
        reactions
            .entry(reaction.design_id)
            .or_default()
            .insert(reaction.emoji, reaction.count);
    }

    let liked: HashSet<String> = match viewer {
        Some(user_id) => DesignLike::find()
            .filter(design_like::Column::UserId.eq(user_id))
            .filter(design_like::Column::DesignId.is_in(ids))
            .all(db)
            .await?
            .into_iter()
            .map(|like| like.design_id)
            .collect(),
        None => HashSet::new(),
    };

    Ok(designs
        .into_iter()
        .map(|design| FeedItem {
            reactions: reactions.remove(&design.id).unwrap_or_default(),
            liked_by_viewer: liked.contains(&design.id),
            id: design.id,
            user_id: design.user_id,
            room_name: design.room_name,
            image_url: design.image_url,
            likes: design.likes,
            created_at: design.created_at,
        })
        .collect())
}

/// Withdraws a design its publisher shared, with its likes and reactions.
///
/// Each withdrawn like is recorded as an `Unliked` event of its giver, so
/// replayed views drop the design too.
///
/// # Errors
/// `NotFound` if the design does not exist or belongs to someone else.
pub async fn unshare_design(
    db: &DatabaseConnection,
    notifier: &FeedNotifier,
    user_id: &str,
    design_id: &str,
) -> Result<()> {
    let txn = db.begin().await?;
    let design = get_design(&txn, design_id).await?;
    if design.user_id != user_id {
        return Err(Error::NotFound {
            entity: "shared design",
            key: design_id.to_string(),
        });
    }

    let likers = DesignLike::find()
        .filter(design_like::Column::DesignId.eq(design_id))
        .all(&txn)
        .await?;
    for like in &likers {
        events::append_event(&txn, &like.user_id, EventKind::Unliked, design_id, serde_json::Value::Null)
            .await?;
    }
    DesignLike::delete_many()
        .filter(design_like::Column::DesignId.eq(design_id))
        .exec(&txn)
        .await?;
    DesignReaction::delete_many()
        .filter(design_reaction::Column::DesignId.eq(design_id))
        .exec(&txn)
        .await?;
    SharedDesign::delete_by_id(design_id).exec(&txn).await?;
    events::append_event(&txn, user_id, EventKind::Unshared, design_id, serde_json::Value::Null)
        .await?;
    txn.commit().await?;

    info!(user_id, design_id, likes = likers.len(), "Unshared design");
    notifier.publish(FeedChange::Deleted {
        id: design_id.to_string(),
    });
    Ok(())
}

/// Likes the design, or withdraws the like if the user already gave one.
///
/// The `(user_id, design_id)` unique index makes a like count at most once.
pub async fn toggle_like(
    db: &DatabaseConnection,
    notifier: &FeedNotifier,
    user_id: &str,
    design_id: &str,
) -> Result<LikeState> {
    let txn = db.begin().await?;
    get_design(&txn, design_id).await?;

    let removed = DesignLike::delete_many()
        .filter(design_like::Column::UserId.eq(user_id))
        .filter(design_like::Column::DesignId.eq(design_id))
        .exec(&txn)
        .await?
        .rows_affected;

    let liked = if removed > 0 {
        SharedDesign::update_many()
            .col_expr(
                shared_design::Column::Likes,
                Expr::case(
                    Expr::col(shared_design::Column::Likes).gt(0),
                    Expr::col(shared_design::Column::Likes).sub(1),
                )
                .finally(0_i64)
                .into(),
            )
            .filter(shared_design::Column::Id.eq(design_id))
            .exec(&txn)
            .await?;
        events::append_event(&txn, user_id, EventKind::Unliked, design_id, serde_json::Value::Null)
            .await?;
        false
    } else {
        let like = design_like::ActiveModel {
            user_id: Set(user_id.to_string()),
            design_id: Set(design_id.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        let inserted = DesignLike::insert(like)
            .on_conflict(
                OnConflict::columns([design_like::Column::UserId, design_like::Column::DesignId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&txn)
            .await?;
        if inserted > 0 {
            SharedDesign::update_many()
                .col_expr(
                    shared_design::Column::Likes,
                    Expr::col(shared_design::Column::Likes).add(1),
                )
                .filter(shared_design::Column::Id.eq(design_id))
                .exec(&txn)
                .await?;
            events::append_event(&txn, user_id, EventKind::Liked, design_id, serde_json::Value::Null)
                .await?;
        }
        true
    };

    let likes = get_design(&txn, design_id).await?.likes;
    txn.commit().await?;

    notifier.publish(FeedChange::Updated {
        id: design_id.to_string(),
    });
    Ok(LikeState { liked, likes })
}

/// Adds one `emoji` reaction to a design and returns its new count.
pub async fn react(
    db: &DatabaseConnection,
    notifier: &FeedNotifier,
    design_id: &str,
    emoji: &str,
) -> Result<i64> {
    let emoji = emoji.trim();
    if emoji.is_empty() || emoji.chars().count() > MAX_EMOJI_LEN {
        return Err(Error::invalid_payload("reaction must be a short emoji"));
    }

    let txn = db.begin().await?;
    get_design(&txn, design_id).await?;

    let counter = design_reaction::ActiveModel {
        design_id: Set(design_id.to_string()),
        emoji: Set(emoji.to_string()),
        count: Set(0),
        ..Default::default()
    };
    DesignReaction::insert(counter)
        .on_conflict(
            OnConflict::columns([
                design_reaction::Column::DesignId,
                design_reaction::Column::Emoji,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(&txn)
        .await?;

    DesignReaction::update_many()
        .col_expr(
            design_reaction::Column::Count,
            Expr::col(design_reaction::Column::Count).add(1),
        )
        .filter(design_reaction::Column::DesignId.eq(design_id))
        .filter(design_reaction::Column::Emoji.eq(emoji))
        .exec(&txn)
        .await?;

    let count = DesignReaction::find()
        .filter(design_reaction::Column::DesignId.eq(design_id))
        .filter(design_reaction::Column::Emoji.eq(emoji))
        .one(&txn)
        .await?
        .map_or(0, |reaction| reaction.count);
    txn.commit().await?;

    notifier.publish(FeedChange::Updated {
        id: design_id.to_string(),
    });
    Ok(count)
}

/// Emoji counters of one design.
pub async fn reactions_for(db: &DatabaseConnection, design_id: &str) -> Result<BTreeMap<String, i64>> {
    Ok(DesignReaction::find()
        .filter(design_reaction::Column::DesignId.eq(design_id))
        .all(db)
        .await?
        .into_iter()
        .map(|reaction| (reaction.emoji, reaction.count))
        .collect())
}
