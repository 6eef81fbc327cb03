//! Generation gateway - the external image and vision service.
//!
//! Every operation is a single call that either returns its artifact or fails
//! with [`crate::errors::Error::GenerationFailed`]. No retries, caching or
//! streaming happen here; callers sequence calls and pay for them first.

pub mod gemini;
pub mod types;

pub use gemini::GeminiGateway;
pub use types::{Color, ImagePart, Product};

use crate::errors::Result;
use async_trait::async_trait;

/// Operations offered by the generation service
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    /// Floor plan variations drawn from a sketch
    async fn generate_floor_plans(&self, sketch: &ImagePart) -> Result<Vec<ImagePart>>;

    /// Floor plan variations from a text description
    async fn generate_floor_plans_from_text(&self, description: &str) -> Result<Vec<ImagePart>>;

    /// Names of the rooms in a floor plan
    async fn extract_room_names(&self, floor_plan: &ImagePart) -> Result<Vec<String>>;

    /// Photorealistic render of one room of the plan in `style`
    async fn redesign_room(
        &self,
        floor_plan: &ImagePart,
        room_name: &str,
        style: &str,
    ) -> Result<ImagePart>;

    /// Products visible in a render, each with a cut-out image when available
    async fn find_products(&self, room_image: &ImagePart) -> Result<Vec<Product>>;

    /// The most prominent colors of a render
    async fn generate_color_palette(&self, room_image: &ImagePart) -> Result<Vec<Color>>;

    /// A house exterior matching an interior's style
    async fn generate_house_exterior(&self, room_image: &ImagePart, style: &str)
    -> Result<ImagePart>;
}
