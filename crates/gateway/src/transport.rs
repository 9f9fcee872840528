//! Chat transport seam.
//!
//! The core only needs three capabilities from a chat platform: send a
//! message, edit a message it sent earlier, and download an attachment.
//! Rendering of buttons and formatting stays behind this trait.

use ho_domain::error::Result;
use ho_sessions::UserId;

/// How the transport should interpret message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Markdown-style markup. The transport may reject malformed input.
    Rich,
    /// Verbatim text. Must never fail for formatting reasons.
    Plain,
}

/// One inline button: a label and the action string it sends back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: String,
}

impl Button {
    pub fn new(label: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: action.into(),
        }
    }
}

/// Rows of inline buttons attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Menu {
    pub rows: Vec<Vec<Button>>,
}

impl Menu {
    pub fn new() -> Self {
        Self::default()
    }

    /// A menu with a single button.
    pub fn single(label: impl Into<String>, action: impl Into<String>) -> Self {
        Self::new().row(vec![Button::new(label, action)])
    }

    pub fn row(mut self, buttons: Vec<Button>) -> Self {
        if !buttons.is_empty() {
            self.rows.push(buttons);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every action reachable from this menu, row by row.
    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().flatten().map(|b| b.action.as_str())
    }
}

/// Identifies a message the transport sent, so it can be edited later.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageHandle {
    pub recipient: UserId,
    pub id: String,
}

/// Opaque reference to an attachment (file id, URL or local path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef(pub String);

#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_message(
        &self,
        recipient: &UserId,
        text: &str,
        format: Format,
        menu: Option<&Menu>,
    ) -> Result<MessageHandle>;

    async fn edit_message(
        &self,
        handle: &MessageHandle,
        text: &str,
        format: Format,
        menu: Option<&Menu>,
    ) -> Result<()>;

    async fn download_attachment(&self, attachment: &AttachmentRef) -> Result<Vec<u8>>;
}
