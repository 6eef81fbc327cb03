//! Gemini `generateContent` client.
//!
//! Each gateway operation is one POST carrying an optional inline image and an
//! instruction. Image operations read the inline-data parts of the first
//! candidate; structured operations request a JSON response and check it against
//! the expected shape before returning it.

use super::{
    GenerationGateway,
    types::{Color, ImagePart, Product},
};
use crate::errors::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use tracing::{debug, error};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const IMAGE_MODEL: &str = "gemini-2.5-flash-image";
const TEXT_MODEL: &str = "gemini-2.5-flash";

/// Client for the Gemini REST API
#[derive(Clone)]
pub struct GeminiGateway {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for GeminiGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiGateway")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<serde_json::Value>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<ImagePart>,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductDraft {
    name: String,
    description: String,
    purchase_url: String,
}

fn generation_failed(reason: impl Into<String>) -> Error {
    Error::GenerationFailed {
        reason: reason.into(),
    }
}

fn image_only() -> serde_json::Value {
    json!({ "responseModalities": ["IMAGE"] })
}

fn json_response(schema: Option<serde_json::Value>) -> serde_json::Value {
    let mut config = json!({ "responseMimeType": "application/json" });
    if let Some(schema) = schema {
        config["responseSchema"] = schema;
    }
    config
}

fn parts_of(response: &GenerateResponse) -> impl Iterator<Item = &Part> {
    response
        .candidates
        .first()
        .and_then(|candidate| candidate.content.as_ref())
        .into_iter()
        .flat_map(|content| content.parts.iter())
}

/// Inline images of the first candidate.
fn image_parts(response: &GenerateResponse) -> Vec<ImagePart> {
    parts_of(response)
        .filter_map(|part| part.inline_data.clone())
        .collect()
}

/// Concatenated text of the first candidate.
fn response_text(response: &GenerateResponse) -> String {
    parts_of(response)
        .filter_map(|part| part.text.as_deref())
        .collect::<String>()
}

/// Parses a JSON answer, tolerating a surrounding Markdown code fence.
fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|inner| inner.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();
    serde_json::from_str(body).map_err(|e| generation_failed(format!("malformed JSON response: {e}")))
}

fn is_hex_color(hex: &str) -> bool {
    hex.strip_prefix('#').is_some_and(|digits| {
        matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit())
    })
}

fn validate_palette(colors: Vec<Color>) -> Result<Vec<Color>> {
    if colors.is_empty() {
        return Err(generation_failed("empty color palette"));
    }
    if let Some(bad) = colors.iter().find(|color| !is_hex_color(&color.hex)) {
        return Err(generation_failed(format!("invalid hex color '{}'", bad.hex)));
    }
    Ok(colors)
}

impl GeminiGateway {
    /// Client against the public endpoint.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Client against another endpoint, e.g. a proxy.
    #[must_use]
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn generate(
        &self,
        model: &str,
        image: Option<&ImagePart>,
        instruction: String,
        generation_config: serde_json::Value,
    ) -> Result<GenerateResponse> {
        let mut parts = Vec::with_capacity(2);
        if let Some(image) = image {
            parts.push(Part {
                inline_data: Some(image.clone()),
                ..Default::default()
            });
        }
        parts.push(Part {
            text: Some(instruction),
            ..Default::default()
        });
        let request = GenerateRequest {
            contents: vec![Content { parts }],
            generation_config: Some(generation_config),
        };

        debug!(model, "Calling generateContent");
        let response = self
            .client
            .post(format!("{}/models/{model}:generateContent", self.base_url))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(model, "Generation request failed: {e}");
                generation_failed(format!("request failed: {e}"))
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| generation_failed(format!("unreadable response: {e}")))?;
        if !status.is_success() {
            error!(model, status = status.as_u16(), "Generation service error: {body}");
            return Err(generation_failed(format!("service returned {status}")));
        }

        serde_json::from_str(&body).map_err(|e| generation_failed(format!("invalid response: {e}")))
    }

    async fn generate_images(&self, image: Option<&ImagePart>, instruction: String) -> Result<Vec<ImagePart>> {
        let response = self.generate(IMAGE_MODEL, image, instruction, image_only()).await?;
        Ok(image_parts(&response))
    }

    async fn generate_json<T: DeserializeOwned>(
        &self,
        image: &ImagePart,
        instruction: String,
        schema: Option<serde_json::Value>,
    ) -> Result<T> {
        let response = self
            .generate(TEXT_MODEL, Some(image), instruction, json_response(schema))
            .await?;
        parse_json(&response_text(&response))
    }
}

#[async_trait]
impl GenerationGateway for GeminiGateway {
    async fn generate_floor_plans(&self, sketch: &ImagePart) -> Result<Vec<ImagePart>> {
        let plans = self
            .generate_images(
                Some(sketch),
                "Create 4 distinct architectural floor plan variations from this sketch. \
                 Present them as clean, black-and-white 2D architectural drawings without text or labels."
                    .to_string(),
            )
            .await?;
        if plans.is_empty() {
            return Err(generation_failed("no floor plan images returned"));
        }
        Ok(plans)
    }

    async fn generate_floor_plans_from_text(&self, description: &str) -> Result<Vec<ImagePart>> {
        let plans = self
            .generate_images(
                None,
                format!(
                    "Create 4 distinct architectural floor plan variations based on this description: \
                     \"{description}\". Present them as clean, black-and-white 2D architectural drawings \
                     without text or labels."
                ),
            )
            .await?;
        if plans.is_empty() {
            return Err(generation_failed("no floor plan images returned for the description"));
        }
        Ok(plans)
    }

    async fn extract_room_names(&self, floor_plan: &ImagePart) -> Result<Vec<String>> {
        self.generate_json(
            floor_plan,
            "Analyze this floor plan and list the names of all distinct rooms or areas \
             (e.g. 'Living Room', 'Kitchen', 'Bathroom 1'). Return only a JSON array of strings."
                .to_string(),
            None,
        )
        .await
    }

    async fn redesign_room(
        &self,
        floor_plan: &ImagePart,
        room_name: &str,
        style: &str,
    ) -> Result<ImagePart> {
        self.generate_images(
            Some(floor_plan),
            format!(
                "From this floor plan, generate a photorealistic interior design render of the \
                 '{room_name}' in the '{style}' style, seen from a perspective inside the room."
            ),
        )
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| generation_failed(format!("no render returned for {room_name}")))
    }

    async fn find_products(&self, room_image: &ImagePart) -> Result<Vec<Product>> {
        let schema = json!({
            "type": "ARRAY",
            "items": {
                "type": "OBJECT",
                "properties": {
                    "name": { "type": "STRING" },
                    "description": { "type": "STRING" },
                    "purchaseUrl": { "type": "STRING" }
                },
                "required": ["name", "description", "purchaseUrl"]
            }
        });
        let drafts: Vec<ProductDraft> = self
            .generate_json(
                room_image,
                "Identify the distinct furniture and decor items in this room. For each give its name, \
                 a brief description and a Google Shopping search URL for similar items."
                    .to_string(),
                Some(schema),
            )
            .await?;

        let mut products = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let cut_out = self
                .generate_images(
                    Some(room_image),
                    format!(
                        "From the provided room image, create an image of only the '{}' on a plain \
                         white background, isolated and cropped.",
                        draft.name
                    ),
                )
                .await?
                .into_iter()
                .next()
                .map(|image| image.to_data_url())
                .unwrap_or_default();
            products.push(Product {
                name: draft.name,
                description: draft.description,
                purchase_url: draft.purchase_url,
                image_url: cut_out,
                custom_purchase_url: None,
            });
        }
        Ok(products)
    }

    async fn generate_color_palette(&self, room_image: &ImagePart) -> Result<Vec<Color>> {
        let schema = json!({
            "type": "ARRAY",
            "items": {
                "type": "OBJECT",
                "properties": {
                    "name": { "type": "STRING" },
                    "hex": { "type": "STRING" }
                },
                "required": ["name", "hex"]
            }
        });
        let colors = self
            .generate_json(
                room_image,
                "Extract the 5 most prominent colors from this image, each with a common name and \
                 its hex code."
                    .to_string(),
                Some(schema),
            )
            .await?;
        validate_palette(colors)
    }

    async fn generate_house_exterior(&self, room_image: &ImagePart, style: &str) -> Result<ImagePart> {
        self.generate_images(
            Some(room_image),
            format!(
                "The provided image is an interior in the '{style}' style. Generate a photorealistic \
                 exterior of a complete house in the same '{style}' style that belongs with it."
            ),
        )
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| generation_failed(format!("no house exterior returned for {style}")))
    }
}
