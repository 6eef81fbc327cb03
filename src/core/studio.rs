//! Studio - the paid feature flows of the designer.
//!
//! Every paid flow runs the same sequence: read the balance, stop with a
//! purchase prompt if it cannot cover the cost, spend with a conditional debit,
//! then call the generation gateway. Credits spent on a call that later fails are
//! not refunded.

use crate::{
    config::settings::{AppConfig, FeatureCosts},
    core::{
        entitlement::{self, Balance},
        events::{self, EventKind, StudioProjection},
        feed::{self, FeedNotifier, NewSharedDesign},
        product_links,
    },
    errors::{Error, Result},
    gateway::{Color, GenerationGateway, ImagePart, Product},
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const DEFAULT_STYLE: &str = "default";

/// Shown instead of running a feature the balance cannot cover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PurchasePrompt {
    /// Credits the feature costs
    pub cost: i64,
    /// Credits the user has
    pub balance: i64,
}

/// Result of a paid feature
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum FeatureOutcome<T> {
    /// The feature ran and was paid for
    Completed(T),
    /// Nothing was charged; the user needs more credits
    PurchaseRequired(PurchasePrompt),
}

impl<T> FeatureOutcome<T> {
    /// The artifact, if the feature ran
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::PurchaseRequired(_) => None,
        }
    }

    /// Converts the artifact, keeping a purchase prompt as is.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FeatureOutcome<U> {
        match self {
            Self::Completed(value) => FeatureOutcome::Completed(f(value)),
            Self::PurchaseRequired(prompt) => FeatureOutcome::PurchaseRequired(prompt),
        }
    }
}

/// Where floor plans are drawn from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FloorPlanSource {
    /// An uploaded sketch
    Sketch {
        /// The sketch image
        image: ImagePart,
    },
    /// A written description
    Text {
        /// The description
        prompt: String,
    },
}

/// One redesigned room
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedesignedRoom {
    /// Room identifier
    pub id: String,
    /// Label in the form "Room (Style)"
    pub room_name: String,
    /// Render as a data URL
    pub image_url: String,
    /// Feed entry the render was published as
    pub shared_design_id: String,
}

/// Outcome of a batch redesign
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedesignBatch {
    /// Rooms completed before any failure, in request order
    pub rooms: Vec<RedesignedRoom>,
    /// Why the batch stopped early, if it did
    pub failure: Option<String>,
}

/// A public link to the user's project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareLink {
    /// Short link id
    pub id: String,
    /// Full link
    pub url: String,
}

/// Label used for a render of `room` in `style`.
#[must_use]
pub fn styled_room_name(room: &str, style: &str) -> String {
    format!("{room} ({style})")
}

/// Style in parentheses of a "Room (Style)" label, or `"default"`.
#[must_use]
pub fn style_from_room_name(room_name: &str) -> &str {
    room_name
        .split_once('(')
        .and_then(|(_, rest)| rest.split_once(')'))
        .map(|(style, _)| style.trim())
        .filter(|style| !style.is_empty())
        .unwrap_or(DEFAULT_STYLE)
}

fn slug(text: &str) -> String {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Paid feature flows over the ledger, the gateway and the social store
#[derive(Clone)]
pub struct Studio {
    db: DatabaseConnection,
    gateway: Arc<dyn GenerationGateway>,
    notifier: FeedNotifier,
    costs: FeatureCosts,
    share_base_url: String,
}

impl Studio {
    /// Wires a studio from its collaborators.
    pub fn new(
        db: DatabaseConnection,
        gateway: Arc<dyn GenerationGateway>,
        notifier: FeedNotifier,
        config: &AppConfig,
    ) -> Self {
        Self {
            db,
            gateway,
            notifier,
            costs: config.costs,
            share_base_url: config.sharing.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Credit cost of each feature
    #[must_use]
    pub const fn costs(&self) -> &FeatureCosts {
        &self.costs
    }

    /// Spends `cost` credits, or returns the prompt to show instead.
    async fn charge(&self, user_id: &str, cost: i64) -> Result<Option<PurchasePrompt>> {
        if cost == 0 {
            return Ok(None);
        }

        let Balance { credits, .. } = entitlement::balance_or_default(&self.db, user_id).await?;
        if credits < cost {
            info!(user_id, cost, credits, "Feature blocked, purchase required");
            return Ok(Some(PurchasePrompt {
                cost,
                balance: credits,
            }));
        }

        match entitlement::try_debit(&self.db, user_id, cost).await {
            Ok(_) => Ok(None),
            // Another spender got there first
            Err(Error::InsufficientCredits { current, required }) => Ok(Some(PurchasePrompt {
                cost: required,
                balance: current,
            })),
            Err(Error::NotFound { .. }) => Ok(Some(PurchasePrompt { cost, balance: 0 })),
            Err(e) => Err(e),
        }
    }

    fn log_unrefunded(user_id: &str, cost: i64, error: &Error) {
        warn!(user_id, cost, "Generation failed after payment, credits not refunded: {error}");
    }

    /// Floor plan variations from a sketch or a description.
    pub async fn generate_floor_plans(
        &self,
        user_id: &str,
        source: &FloorPlanSource,
    ) -> Result<FeatureOutcome<Vec<ImagePart>>> {
        if let FloorPlanSource::Text { prompt } = source {
            if prompt.trim().is_empty() {
                return Err(Error::invalid_payload("describe the floor plan first"));
            }
        }

        let cost = self.costs.floor_plan;
        if let Some(prompt) = self.charge(user_id, cost).await? {
            return Ok(FeatureOutcome::PurchaseRequired(prompt));
        }

        let plans = match source {
            FloorPlanSource::Sketch { image } => self.gateway.generate_floor_plans(image).await,
            FloorPlanSource::Text { prompt } => {
                self.gateway.generate_floor_plans_from_text(prompt).await
            }
        }
        .inspect_err(|e| Self::log_unrefunded(user_id, cost, e))?;

        Ok(FeatureOutcome::Completed(plans))
    }

    /// Room names of a floor plan; free of charge.
    pub async fn extract_rooms(&self, floor_plan: &ImagePart) -> Result<Vec<String>> {
        self.gateway.extract_room_names(floor_plan).await
    }

    /// Redesigns each room in turn, publishing every render to the feed.
    ///
    /// The whole batch is paid up front. The first failed render stops the
    /// batch; rooms finished before it are kept and the failure is reported
    /// alongside them.
    pub async fn redesign_rooms(
        &self,
        user_id: &str,
        floor_plan: &ImagePart,
        rooms: &[String],
        style: &str,
    ) -> Result<FeatureOutcome<RedesignBatch>> {
        if rooms.is_empty() || style.trim().is_empty() {
            return Err(Error::invalid_payload("select at least one room and a style"));
        }

        let cost = i64::try_from(rooms.len())
            .ok()
            .and_then(|count| self.costs.room_redesign.checked_mul(count))
            .ok_or_else(|| Error::invalid_payload("too many rooms in one batch"))?;
        if let Some(prompt) = self.charge(user_id, cost).await? {
            return Ok(FeatureOutcome::PurchaseRequired(prompt));
        }

        let mut batch = RedesignBatch {
            rooms: Vec::with_capacity(rooms.len()),
            failure: None,
        };
        for (i, room) in rooms.iter().enumerate() {
            info!(user_id, room = %room, "Redesigning room {} of {}", i + 1, rooms.len());
            match self.redesign_one(user_id, floor_plan, room, style).await {
                Ok(redesigned) => batch.rooms.push(redesigned),
                Err(e) => {
                    Self::log_unrefunded(user_id, cost, &e);
                    batch.failure = Some(e.to_string());
                    break;
                }
            }
        }

        Ok(FeatureOutcome::Completed(batch))
    }

    /// Renders one room, records it and publishes it to the feed.
    async fn redesign_one(
        &self,
        user_id: &str,
        floor_plan: &ImagePart,
        room: &str,
        style: &str,
    ) -> Result<RedesignedRoom> {
        let render = self.gateway.redesign_room(floor_plan, room, style).await?;

        let id = format!("{}-{}-{}", slug(room), slug(style), Uuid::new_v4().simple());
        let room_name = styled_room_name(room, style);
        let image_url = render.to_data_url();

        events::append_room_event(&self.db, user_id, EventKind::Generated, &id, &room_name, &image_url)
            .await?;
        let shared = feed::share_design(
            &self.db,
            &self.notifier,
            user_id,
            &NewSharedDesign {
                room_id: id.clone(),
                room_name: room_name.clone(),
                image_url: image_url.clone(),
            },
        )
        .await?;

        Ok(RedesignedRoom {
            id,
            room_name,
            image_url,
            shared_design_id: shared.id,
        })
    }

    /// Products in a render, with the user's saved links applied.
    pub async fn find_products(
        &self,
        user_id: &str,
        room_id: &str,
        room_image: &ImagePart,
    ) -> Result<FeatureOutcome<Vec<Product>>> {
        let cost = self.costs.product_discovery;
        if let Some(prompt) = self.charge(user_id, cost).await? {
            return Ok(FeatureOutcome::PurchaseRequired(prompt));
        }

        let mut products = self
            .gateway
            .find_products(room_image)
            .await
            .inspect_err(|e| Self::log_unrefunded(user_id, cost, e))?;
        product_links::apply_custom_links(&self.db, user_id, room_id, &mut products).await?;
        Ok(FeatureOutcome::Completed(products))
    }

    /// Prominent colors of a render.
    pub async fn color_palette(
        &self,
        user_id: &str,
        room_image: &ImagePart,
    ) -> Result<FeatureOutcome<Vec<Color>>> {
        let cost = self.costs.color_palette;
        if let Some(prompt) = self.charge(user_id, cost).await? {
            return Ok(FeatureOutcome::PurchaseRequired(prompt));
        }

        let colors = self
            .gateway
            .generate_color_palette(room_image)
            .await
            .inspect_err(|e| Self::log_unrefunded(user_id, cost, e))?;
        Ok(FeatureOutcome::Completed(colors))
    }

    /// A house exterior in the style named by the render's "Room (Style)" label.
    pub async fn house_exterior(
        &self,
        user_id: &str,
        room_name: &str,
        room_image: &ImagePart,
    ) -> Result<FeatureOutcome<ImagePart>> {
        let cost = self.costs.house_exterior;
        if let Some(prompt) = self.charge(user_id, cost).await? {
            return Ok(FeatureOutcome::PurchaseRequired(prompt));
        }

        let house = self
            .gateway
            .generate_house_exterior(room_image, style_from_room_name(room_name))
            .await
            .inspect_err(|e| Self::log_unrefunded(user_id, cost, e))?;
        Ok(FeatureOutcome::Completed(house))
    }

    /// A public project link; paid plans only.
    ///
    /// # Errors
    /// `UpgradeRequired` on the Free plan.
    pub async fn create_share_link(&self, user_id: &str) -> Result<ShareLink> {
        let balance = entitlement::balance_or_default(&self.db, user_id).await?;
        if !balance.plan.allows_commercial_sharing() {
            return Err(Error::UpgradeRequired { plan: balance.plan });
        }

        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(8);
        let url = format!("{}/share/{id}", self.share_base_url);
        info!(user_id, %url, "Created share link");
        Ok(ShareLink { id, url })
    }

    /// The user's studio view rebuilt from recorded events.
    pub async fn projection(&self, user_id: &str) -> Result<StudioProjection> {
        events::replay(&self.db, user_id).await
    }
}
