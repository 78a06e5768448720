//! Canonical message types for bridge communication.
//!
//! This module defines the single source of truth for message types
//! flowing between Signal and the game server.

use crate::common::types::{AttachmentKind, GameMessageKind};

/// A chat line polled from the game server's chat feed.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundGameMessage {
    /// Local timestamp reported by the game.
    pub local_timestamp: i64,
    /// Server timestamp; the ordering key for the watermark.
    pub server_timestamp: f64,
    /// Sender name (player name, or a label for system lines).
    pub sender: String,
    /// Message kind.
    pub kind: GameMessageKind,
    /// Raw message text (may contain `<PlayerName/>` and `:shortcodes:`).
    pub text: String,
}

/// A message received from Signal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InboundChatMessage {
    /// Display name (or number) of the sender.
    pub sender: String,
    /// Sender UUID, used for replies and read receipts.
    pub sender_id: Option<String>,
    /// Message text (mention placeholders unresolved).
    pub text: String,
    /// Platform-assigned timestamp; doubles as the message id.
    pub timestamp: i64,
    /// Internal group id if this is a group message.
    pub group_id: Option<String>,
    /// Whether this message was sent to a group.
    pub is_group: bool,
    /// Attachments carried by the message.
    pub attachments: Vec<Attachment>,
    /// Whether a sticker was included.
    pub has_sticker: bool,
    /// Mentions, indexed into `text` by UTF-16 code units.
    pub mentions: Vec<Mention>,
}

/// A Signal attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub content_type: String,
    pub filename: Option<String>,
    pub size: Option<u64>,
    pub id: Option<String>,
}

impl Attachment {
    /// Create an attachment with only a content type.
    #[cfg(test)]
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            filename: None,
            size: None,
            id: None,
        }
    }

    /// Set the filename.
    #[cfg(test)]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Display category derived from the content type.
    pub fn kind(&self) -> AttachmentKind {
        AttachmentKind::from_content_type(&self.content_type)
    }
}

/// A mention placeholder span inside a Signal message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    /// Start offset in UTF-16 code units.
    pub start: usize,
    /// Span length in UTF-16 code units.
    pub length: usize,
    /// Name to render after the `@`.
    pub name: String,
    pub uuid: Option<String>,
}

impl Mention {
    #[cfg(test)]
    pub fn new(start: usize, length: usize, name: impl Into<String>) -> Self {
        Self {
            start,
            length,
            name: name.into(),
            uuid: None,
        }
    }
}

/// One entry of the game server's online roster.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStatus {
    pub name: String,
    pub is_dead: bool,
}

impl PlayerStatus {
    #[cfg(test)]
    pub fn alive(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dead: false,
        }
    }

    #[cfg(test)]
    pub fn dead(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dead: true,
        }
    }
}
