//! Custom product links - a user's own purchase URL for a product in a render.
//!
//! Links are keyed by `(user_id, room_id, product_name)`; saving again replaces
//! the URL.

use crate::{
    entities::{CustomProductLink, CustomProductLinkModel, custom_product_link},
    errors::{Error, Result},
    gateway::Product,
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*, sea_query::OnConflict};
use std::collections::HashMap;
use url::Url;

/// Checks that `custom_url` is an absolute http(s) URL and returns it normalized.
pub fn validate_link(custom_url: &str) -> Result<String> {
    let url = Url::parse(custom_url.trim())
        .map_err(|e| Error::invalid_payload(format!("invalid link '{custom_url}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url.to_string()),
        other => Err(Error::invalid_payload(format!(
            "link must use http or https, not '{other}'"
        ))),
    }
}

/// Saves or replaces the user's link for a product.
pub async fn save_link(
    db: &DatabaseConnection,
    user_id: &str,
    room_id: &str,
    product_name: &str,
    custom_url: &str,
) -> Result<CustomProductLinkModel> {
    if product_name.trim().is_empty() {
        return Err(Error::invalid_payload("product name is required"));
    }
    let custom_url = validate_link(custom_url)?;

    let link = custom_product_link::ActiveModel {
        user_id: Set(user_id.to_string()),
        room_id: Set(room_id.to_string()),
        product_name: Set(product_name.to_string()),
        custom_url: Set(custom_url),
        updated_at: Set(Utc::now()),
        ..Default::default()
    };
    CustomProductLink::insert(link)
        .on_conflict(
            OnConflict::columns([
                custom_product_link::Column::UserId,
                custom_product_link::Column::RoomId,
                custom_product_link::Column::ProductName,
            ])
            .update_columns([
                custom_product_link::Column::CustomUrl,
                custom_product_link::Column::UpdatedAt,
            ])
            .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    find_link(db, user_id, room_id, product_name)
        .await?
        .ok_or_else(|| Error::NotFound {
            entity: "product link",
            key: format!("{room_id}/{product_name}"),
        })
}

/// The user's link for one product, if saved.
pub async fn find_link(
    db: &DatabaseConnection,
    user_id: &str,
    room_id: &str,
    product_name: &str,
) -> Result<Option<CustomProductLinkModel>> {
    CustomProductLink::find()
        .filter(custom_product_link::Column::UserId.eq(user_id))
        .filter(custom_product_link::Column::RoomId.eq(room_id))
        .filter(custom_product_link::Column::ProductName.eq(product_name))
        .one(db)
        .await
        .map_err(Into::into)
}

/// All of the user's links, optionally for one room only.
pub async fn list_links(
    db: &DatabaseConnection,
    user_id: &str,
    room_id: Option<&str>,
) -> Result<Vec<CustomProductLinkModel>> {
    let mut query = CustomProductLink::find().filter(custom_product_link::Column::UserId.eq(user_id));
    if let Some(room_id) = room_id {
        query = query.filter(custom_product_link::Column::RoomId.eq(room_id));
    }
    query
        .order_by_asc(custom_product_link::Column::RoomId)
        .order_by_asc(custom_product_link::Column::ProductName)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Fills `custom_purchase_url` on products the user saved a link for.
pub async fn apply_custom_links(
    db: &DatabaseConnection,
    user_id: &str,
    room_id: &str,
    products: &mut [Product],
) -> Result<()> {
    let links: HashMap<String, String> = list_links(db, user_id, Some(room_id))
        .await?
        .into_iter()
        .map(|link| (link.product_name, link.custom_url))
        .collect();

    for product in products.iter_mut() {
        if let Some(url) = links.get(&product.name) {
            product.custom_purchase_url = Some(url.clone());
        }
    }
    Ok(())
}
