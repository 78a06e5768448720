//! Emoji, mention, and attachment resolution.
//!
//! Translates between Signal message content and the plain text the game
//! chat can display, in both directions.

use std::collections::HashMap;
use std::sync::LazyLock;

use fancy_regex::Regex;
use tracing::warn;

use crate::common::messages::{Attachment, Mention};
use crate::common::types::GameMessageKind;

/// Placeholder the game puts in system lines where the player name belongs.
const PLAYER_NAME_TAG: &str = "<PlayerName/>";

const VARIATION_SELECTOR: char = '\u{FE0F}';
const KEYCAP: char = '\u{20E3}';

/// Bijective emoji <-> shortcode table.
struct EmojiTable {
    to_shortcode: HashMap<String, String>,
    to_emoji: HashMap<String, String>,
    /// Longest emoji key, in chars.
    max_chars: usize,
}

static EMOJI_TABLE: LazyLock<EmojiTable> = LazyLock::new(EmojiTable::build);

fn is_shortcode(code: &str) -> bool {
    !code.is_empty()
        && code
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

impl EmojiTable {
    fn build() -> Self {
        // First emoji to claim a shortcode owns it.
        let mut to_emoji: HashMap<String, String> = HashMap::new();
        for emoji in emojis::iter() {
            for code in emoji.shortcodes().filter(|code| is_shortcode(code)) {
                to_emoji
                    .entry(code.to_string())
                    .or_insert_with(|| emoji.as_str().to_string());
            }
        }

        let mut to_shortcode: HashMap<String, String> = HashMap::new();
        for emoji in emojis::iter() {
            let Some(code) = emoji.shortcodes().find(|code| is_shortcode(code)) else {
                continue;
            };
            if to_emoji.get(code).map(String::as_str) != Some(emoji.as_str()) {
                continue;
            }

            to_shortcode.insert(emoji.as_str().to_string(), code.to_string());

            // Clients often drop the variation selector; accept both spellings.
            let bare: String = emoji
                .as_str()
                .chars()
                .filter(|&c| c != VARIATION_SELECTOR)
                .collect();
            if bare != emoji.as_str() && !bare.is_ascii() {
                to_shortcode.entry(bare).or_insert_with(|| code.to_string());
            }
        }

        let max_chars = to_shortcode
            .keys()
            .map(|key| key.chars().count())
            .max()
            .unwrap_or(1);

        Self {
            to_shortcode,
            to_emoji,
            max_chars,
        }
    }

    /// Longest table emoji at the start of `chars`, as (length, shortcode).
    fn longest_match(&self, chars: &[char]) -> Option<(usize, &str)> {
        let first = *chars.first()?;
        if first.is_ascii() {
            // Only keycaps (`1️⃣`, `#️⃣`) start with an ASCII char.
            match chars.get(1) {
                Some(&next) if next == VARIATION_SELECTOR || next == KEYCAP => {}
                _ => return None,
            }
        }

        let longest = self.max_chars.min(chars.len());
        (1..=longest).rev().find_map(|len| {
            let candidate: String = chars[..len].iter().collect();
            self.to_shortcode
                .get(&candidate)
                .map(|code| (len, code.as_str()))
        })
    }
}

/// Message resolver for Signal <-> game chat translation.
#[derive(Debug, Clone)]
pub struct MessageResolver {
    /// Pattern for `:shortcode:` tokens.
    shortcode_pattern: Regex,
}

impl Default for MessageResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageResolver {
    pub fn new() -> Self {
        Self {
            shortcode_pattern: Regex::new(r":([a-z0-9_]+):").unwrap(),
        }
    }

    /// Convert Unicode emojis to `:shortcode:` tokens (e.g., 😀 -> :grinning:).
    ///
    /// Emojis without a shortcode are kept as-is.
    pub fn emoji_to_shortcode(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let table = &*EMOJI_TABLE;
        let chars: Vec<char> = text.chars().collect();
        let mut result = String::with_capacity(text.len());
        let mut i = 0;

        while i < chars.len() {
            match table.longest_match(&chars[i..]) {
                Some((len, code)) => {
                    result.push(':');
                    result.push_str(code);
                    result.push(':');
                    i += len;
                }
                None => {
                    result.push(chars[i]);
                    i += 1;
                }
            }
        }

        result
    }

    /// Convert `:shortcode:` tokens back to Unicode emojis.
    ///
    /// Unknown shortcodes are left verbatim, and their closing colon may
    /// still open the next token (`10:30:smile:`).
    pub fn shortcode_to_emoji(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let table = &*EMOJI_TABLE;
        let mut result = String::with_capacity(text.len());
        let mut copied = 0;
        let mut pos = 0;

        while let Ok(Some(caps)) = self.shortcode_pattern.captures_from_pos(text, pos) {
            let (Some(whole), Some(code)) = (caps.get(0), caps.get(1)) else {
                break;
            };

            match table.to_emoji.get(code.as_str()) {
                Some(emoji) => {
                    result.push_str(&text[copied..whole.start()]);
                    result.push_str(emoji);
                    copied = whole.end();
                    pos = whole.end();
                }
                None => pos = whole.end() - 1,
            }
        }

        result.push_str(&text[copied..]);
        result
    }

    /// Replace mention placeholders with `@name`.
    ///
    /// Offsets are UTF-16 code units into the original text. Spans are
    /// applied from the end so earlier offsets stay valid. Spans that fall
    /// outside the text, overlap an already-applied span, or cut through a
    /// surrogate pair are skipped.
    pub fn replace_mentions(&self, text: &str, mentions: &[Mention]) -> String {
        if text.is_empty() || mentions.is_empty() {
            return text.to_string();
        }

        let mut units: Vec<u16> = text.encode_utf16().collect();
        let mut ordered: Vec<&Mention> = mentions.iter().collect();
        ordered.sort_by(|a, b| b.start.cmp(&a.start));

        let mut limit = units.len();
        for mention in ordered {
            let end = mention.start.saturating_add(mention.length);
            if end > limit {
                warn!(
                    start = mention.start,
                    length = mention.length,
                    name = %mention.name,
                    "Skipping mention outside message bounds"
                );
                continue;
            }
            if splits_surrogate_pair(&units, mention.start) || splits_surrogate_pair(&units, end) {
                warn!(
                    start = mention.start,
                    length = mention.length,
                    name = %mention.name,
                    "Skipping mention that splits a character"
                );
                continue;
            }

            let replacement: Vec<u16> = format!("@{}", mention.name).encode_utf16().collect();
            units.splice(mention.start..end, replacement);
            limit = mention.start;
        }

        String::from_utf16_lossy(&units)
    }

    /// Format a single attachment, e.g. `[Image]` or `[PDF: report.pdf]`.
    pub fn format_attachment(attachment: &Attachment) -> String {
        let kind = attachment.kind();
        match attachment.filename.as_deref().filter(|name| !name.is_empty()) {
            Some(name) if kind.shows_filename() => format!("[{}: {}]", kind.name(), name),
            _ => format!("[{}]", kind.name()),
        }
    }

    /// Build the game-chat text for a Signal message.
    ///
    /// Returns an empty string when there is nothing to send.
    pub fn compose_outbound_to_game(
        &self,
        text: &str,
        attachments: &[Attachment],
        has_sticker: bool,
        mentions: &[Mention],
    ) -> String {
        let mut parts = Vec::new();

        if !text.is_empty() {
            let resolved = self.replace_mentions(text, mentions);
            parts.push(self.emoji_to_shortcode(&resolved));
        }
        if has_sticker {
            parts.push("[Sticker]".to_string());
        }
        parts.extend(attachments.iter().map(Self::format_attachment));

        parts.join(" ")
    }

    /// Build the Signal text for a game chat line.
    pub fn compose_outbound_to_chat(
        &self,
        text: &str,
        sender: &str,
        kind: GameMessageKind,
    ) -> String {
        let body = self.shortcode_to_emoji(&text.replace(PLAYER_NAME_TAG, sender));

        match kind {
            GameMessageKind::System => format!("[System] {}", body),
            GameMessageKind::Ada => format!("[A.D.A.] {}", body),
            GameMessageKind::Player => format!("[{}] {}", sender, body),
        }
    }
}

/// True when offset `at` lands between the two halves of a surrogate pair.
fn splits_surrogate_pair(units: &[u16], at: usize) -> bool {
    at > 0
        && at < units.len()
        && (0xDC00..=0xDFFF).contains(&units[at])
        && (0xD800..=0xDBFF).contains(&units[at - 1])
}
