//! Shared test utilities for Plantaia.
//!
//! Database setup, account fixtures and a scripted generation gateway so studio
//! flows can be tested without the network.

use crate::{
    core::{
        entitlement::{self, Balance},
        plan::Plan,
    },
    errors::{Error, Result},
    gateway::{Color, GenerationGateway, ImagePart, Product},
};
use async_trait::async_trait;
use sea_orm::{ConnectOptions, DatabaseConnection};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Creates an in-memory `SQLite` database with all tables initialized.
///
/// The pool holds a single connection: every connection to `sqlite::memory:`
/// would otherwise open its own empty database.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = sea_orm::Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates an account holding `credits` on `plan`.
pub async fn create_test_account(
    db: &DatabaseConnection,
    user_id: &str,
    credits: i64,
    plan: Plan,
) -> Result<Balance> {
    entitlement::ensure_account(db, user_id).await?;
    entitlement::credit(db, user_id, credits, Some(plan)).await
}

/// A tiny PNG-typed image
#[must_use]
pub fn sample_image() -> ImagePart {
    ImagePart::from_bytes(b"\x89PNG fake image", "image/png")
}

/// Generation gateway returning canned artifacts.
///
/// Every call is counted, including failed ones.
#[derive(Debug, Default)]
pub struct FakeGateway {
    /// Rooms whose redesign fails
    pub fail_rooms: Vec<String>,
    /// Rooms whose redesign loses the connection
    pub disconnect_rooms: Vec<String>,
    /// Fail every operation
    pub fail_all: bool,
    /// Number of gateway calls made
    pub calls: AtomicUsize,
}

impl FakeGateway {
    fn call(&self, what: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all {
            return Err(Error::GenerationFailed {
                reason: format!("{what} unavailable"),
            });
        }
        Ok(())
    }

    fn render(label: &str) -> ImagePart {
        ImagePart::from_bytes(label.as_bytes(), "image/png")
    }
}

#[async_trait]
impl GenerationGateway for FakeGateway {
    async fn generate_floor_plans(&self, _sketch: &ImagePart) -> Result<Vec<ImagePart>> {
        self.call("floor plans")?;
        Ok(vec![Self::render("plan a"), Self::render("plan b")])
    }

    async fn generate_floor_plans_from_text(&self, description: &str) -> Result<Vec<ImagePart>> {
        self.call("floor plans")?;
        Ok(vec![Self::render(description)])
    }

    async fn extract_room_names(&self, _floor_plan: &ImagePart) -> Result<Vec<String>> {
        self.call("room extraction")?;
        Ok(vec!["Kitchen".to_string(), "Living Room".to_string()])
    }

    async fn redesign_room(
        &self,
        _floor_plan: &ImagePart,
        room_name: &str,
        style: &str,
    ) -> Result<ImagePart> {
        self.call("redesign")?;
        if self.disconnect_rooms.iter().any(|room| room == room_name) {
            return Err(Error::Io(std::io::Error::other("connection reset")));
        }
        if self.fail_rooms.iter().any(|room| room == room_name) {
            return Err(Error::GenerationFailed {
                reason: format!("no render for {room_name}"),
            });
        }
        Ok(Self::render(&format!("{room_name} in {style}")))
    }

    async fn find_products(&self, _room_image: &ImagePart) -> Result<Vec<Product>> {
        self.call("product discovery")?;
        Ok(["Sofa", "Lamp"]
            .into_iter()
            .map(|name| Product {
                name: name.to_string(),
                description: format!("A {name}"),
                purchase_url: format!("https://www.google.com/search?q={name}"),
                image_url: String::new(),
                custom_purchase_url: None,
            })
            .collect())
    }

    async fn generate_color_palette(&self, _room_image: &ImagePart) -> Result<Vec<Color>> {
        self.call("palette")?;
        Ok(vec![
            Color {
                hex: "#F5F5DC".to_string(),
                name: "Beige".to_string(),
            },
            Color {
                hex: "#2F4F4F".to_string(),
                name: "Slate".to_string(),
            },
        ])
    }

    async fn generate_house_exterior(
        &self,
        _room_image: &ImagePart,
        style: &str,
    ) -> Result<ImagePart> {
        self.call("house exterior")?;
        Ok(Self::render(&format!("house in {style}")))
    }
}
