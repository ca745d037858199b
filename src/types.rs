//! Shared data types used across the remote client seam and both storage
//! backends. Enums are persisted as their `as_str` form so the two backends
//! cannot drift.

use serde::{Deserialize, Serialize};

/// Conversation classification — the unit of filtering and sync scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Direct,
    Group,
    Channel,
}

impl ConversationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationKind::Direct => "direct",
            ConversationKind::Group => "group",
            ConversationKind::Channel => "channel",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "direct" => Some(ConversationKind::Direct),
            "group" => Some(ConversationKind::Group),
            "channel" => Some(ConversationKind::Channel),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
    Document,
    Audio,
    Voice,
    Sticker,
    Gif,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Document => "document",
            MediaKind::Audio => "audio",
            MediaKind::Voice => "voice",
            MediaKind::Sticker => "sticker",
            MediaKind::Gif => "gif",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "photo" => Some(MediaKind::Photo),
            "video" => Some(MediaKind::Video),
            "document" => Some(MediaKind::Document),
            "audio" => Some(MediaKind::Audio),
            "voice" => Some(MediaKind::Voice),
            "sticker" => Some(MediaKind::Sticker),
            "gif" => Some(MediaKind::Gif),
            _ => None,
        }
    }

    /// Fallback file extension when the remote reports no file name.
    pub fn extension(&self) -> &'static str {
        match self {
            MediaKind::Photo => "jpg",
            MediaKind::Video => "mp4",
            MediaKind::Document => "bin",
            MediaKind::Audio => "mp3",
            MediaKind::Voice => "ogg",
            MediaKind::Sticker => "webp",
            MediaKind::Gif => "gif",
        }
    }
}

/// Attachment download lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    Pending,
    Downloaded,
    SkippedTooLarge,
    SkippedByPolicy,
    Failed,
}

impl DownloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Pending => "pending",
            DownloadStatus::Downloaded => "downloaded",
            DownloadStatus::SkippedTooLarge => "skipped_too_large",
            DownloadStatus::SkippedByPolicy => "skipped_by_policy",
            DownloadStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DownloadStatus::Pending),
            "downloaded" => Some(DownloadStatus::Downloaded),
            "skipped_too_large" => Some(DownloadStatus::SkippedTooLarge),
            "skipped_by_policy" => Some(DownloadStatus::SkippedByPolicy),
            "failed" => Some(DownloadStatus::Failed),
            _ => None,
        }
    }
}

/// Aggregate count for one reaction symbol on one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionCount {
    pub emoji: String,
    pub count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        for kind in [
            ConversationKind::Direct,
            ConversationKind::Group,
            ConversationKind::Channel,
        ] {
            assert_eq!(ConversationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ConversationKind::parse("supergroup"), None);
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            DownloadStatus::Pending,
            DownloadStatus::Downloaded,
            DownloadStatus::SkippedTooLarge,
            DownloadStatus::SkippedByPolicy,
            DownloadStatus::Failed,
        ] {
            assert_eq!(DownloadStatus::parse(status.as_str()), Some(status));
        }
    }
}
