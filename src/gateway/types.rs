//! Artifacts exchanged with the generation service.

use crate::errors::{Error, Result};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

/// An inline image: base64 payload plus MIME type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePart {
    /// Base64-encoded bytes
    pub data: String,
    /// MIME type such as `image/png`
    pub mime_type: String,
}

impl ImagePart {
    /// Wraps raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8], mime_type: &str) -> Self {
        Self {
            data: STANDARD.encode(bytes),
            mime_type: mime_type.to_string(),
        }
    }

    /// Parses `data:<mime>;base64,<payload>`.
    ///
    /// # Errors
    /// `InvalidPayload` if the URL is not a base64 image data URL.
    pub fn from_data_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| Error::invalid_payload("image must be a data: URL"))?;
        let (header, data) = rest
            .split_once(',')
            .ok_or_else(|| Error::invalid_payload("data URL has no payload"))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| Error::invalid_payload("data URL must be base64 encoded"))?;

        if !mime_type.starts_with("image/") {
            return Err(Error::invalid_payload(format!(
                "unsupported image type '{mime_type}'"
            )));
        }
        STANDARD
            .decode(data)
            .map_err(|e| Error::invalid_payload(format!("bad base64 image data: {e}")))?;

        Ok(Self {
            data: data.to_string(),
            mime_type: mime_type.to_string(),
        })
    }

    /// Renders the image as a `data:` URL.
    #[must_use]
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// A furniture or decor item found in a render
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Item name
    pub name: String,
    /// Short description
    pub description: String,
    /// Shopping search URL suggested by the service
    pub purchase_url: String,
    /// Isolated cut-out image as a data URL, empty when none was produced
    #[serde(default)]
    pub image_url: String,
    /// The user's own purchase link, when saved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_purchase_url: Option<String>,
}

impl Product {
    /// The link to show: the user's own if set, else the suggested one.
    #[must_use]
    pub fn effective_purchase_url(&self) -> &str {
        self.custom_purchase_url
            .as_deref()
            .unwrap_or(&self.purchase_url)
    }
}

/// One palette entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    /// Hex code, e.g. `#D8B4B4`
    pub hex: String,
    /// Common name, e.g. "Dusty Rose"
    pub name: String,
}
