//! Message types exchanged with the reasoning oracle.
//!
//! A decision request is a short conversation: one system instruction and one
//! user payload. In vision mode the user payload carries a rendered snapshot
//! of the page as an [`ImageAttachment`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The agent's payload (page state, question)
    User,
    /// The oracle's reply
    Assistant,
    /// Fixed instruction contract
    System,
}

/// An inline image sent alongside a user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAttachment {
    /// MIME type, e.g. `image/png`
    pub media_type: String,

    /// Base64-encoded image bytes (no data-URL prefix)
    pub data: String,
}

impl ImageAttachment {
    /// A PNG attachment from already-encoded base64 data.
    pub fn png(data: impl Into<String>) -> Self {
        Self {
            media_type: "image/png".into(),
            data: data.into(),
        }
    }

    /// Render as a `data:` URL (the OpenAI-compatible wire form).
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

/// A single message in an oracle exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Images attached to this message (vision mode only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<ImageAttachment>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            attachments: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Attach an image to this message.
    pub fn with_image(mut self, image: ImageAttachment) -> Self {
        self.attachments.push(image);
        self
    }

    /// Whether this message carries any image.
    pub fn has_images(&self) -> bool {
        !self.attachments.is_empty()
    }
}
