//! Shared types used across the application.

/// Kind of a line in the game server's chat feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameMessageKind {
    #[default]
    Player,
    System,
    /// The in-game narrator (A.D.A.).
    Ada,
}

impl GameMessageKind {
    /// Parse the feed's `Type` field. Unknown values count as player chat.
    pub fn from_name(name: &str) -> Self {
        match name {
            "System" => Self::System,
            "Ada" => Self::Ada,
            _ => Self::Player,
        }
    }
}

/// Display category of a Signal attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    Gif,
    VoiceNote,
    Audio,
    Video,
    Pdf,
    Document,
    Spreadsheet,
    Presentation,
    Archive,
    TextFile,
    Csv,
    Json,
    Xml,
    File,
}

impl AttachmentKind {
    /// Map a MIME type to a category, falling back on the type prefix.
    pub fn from_content_type(content_type: &str) -> Self {
        match content_type {
            "image/jpeg" | "image/jpg" | "image/png" | "image/webp" | "image/bmp"
            | "image/svg+xml" => Self::Image,
            "image/gif" => Self::Gif,
            "audio/aac" | "audio/mp4" | "audio/ogg" | "audio/webm" => Self::VoiceNote,
            "audio/mpeg" | "audio/wav" | "audio/x-m4a" => Self::Audio,
            "video/mp4" | "video/webm" | "video/quicktime" | "video/3gpp" => Self::Video,
            "application/pdf" => Self::Pdf,
            "application/msword"
            | "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Self::Document
            }
            "application/vnd.ms-excel"
            | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
                Self::Spreadsheet
            }
            "application/vnd.ms-powerpoint"
            | "application/vnd.openxmlformats-officedocument.presentationml.presentation" => {
                Self::Presentation
            }
            "application/zip"
            | "application/x-rar-compressed"
            | "application/x-7z-compressed"
            | "application/gzip" => Self::Archive,
            "text/plain" => Self::TextFile,
            "text/csv" => Self::Csv,
            "application/json" => Self::Json,
            "application/xml" => Self::Xml,
            other if other.starts_with("image/") => Self::Image,
            other if other.starts_with("audio/") => Self::Audio,
            other if other.starts_with("video/") => Self::Video,
            other if other.starts_with("text/") => Self::TextFile,
            _ => Self::File,
        }
    }

    /// Human-readable label used in placeholders.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Image => "Image",
            Self::Gif => "GIF",
            Self::VoiceNote => "Voice Note",
            Self::Audio => "Audio",
            Self::Video => "Video",
            Self::Pdf => "PDF",
            Self::Document => "Document",
            Self::Spreadsheet => "Spreadsheet",
            Self::Presentation => "Presentation",
            Self::Archive => "Archive",
            Self::TextFile => "Text File",
            Self::Csv => "CSV",
            Self::Json => "JSON",
            Self::Xml => "XML",
            Self::File => "File",
        }
    }

    /// Categories whose filename is worth showing next to the label.
    pub fn shows_filename(&self) -> bool {
        !matches!(
            self,
            Self::Image | Self::Gif | Self::VoiceNote | Self::Audio | Self::Video
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_message_kind_from_name() {
        assert_eq!(GameMessageKind::from_name("System"), GameMessageKind::System);
        assert_eq!(GameMessageKind::from_name("Ada"), GameMessageKind::Ada);
        assert_eq!(GameMessageKind::from_name("Player"), GameMessageKind::Player);
        assert_eq!(GameMessageKind::from_name("Whatever"), GameMessageKind::Player);
    }

    #[test]
    fn test_attachment_kind_table() {
        assert_eq!(AttachmentKind::from_content_type("image/gif"), AttachmentKind::Gif);
        assert_eq!(
            AttachmentKind::from_content_type("audio/aac").name(),
            "Voice Note"
        );
        assert_eq!(AttachmentKind::from_content_type("application/pdf").name(), "PDF");
        assert_eq!(AttachmentKind::from_content_type("text/csv").name(), "CSV");
    }

    #[test]
    fn test_attachment_kind_prefix_fallback() {
        assert_eq!(AttachmentKind::from_content_type("image/heic"), AttachmentKind::Image);
        assert_eq!(AttachmentKind::from_content_type("audio/flac"), AttachmentKind::Audio);
        assert_eq!(AttachmentKind::from_content_type("video/x-matroska"), AttachmentKind::Video);
        assert_eq!(AttachmentKind::from_content_type("text/markdown"), AttachmentKind::TextFile);
        assert_eq!(
            AttachmentKind::from_content_type("application/octet-stream"),
            AttachmentKind::File
        );
    }
}
