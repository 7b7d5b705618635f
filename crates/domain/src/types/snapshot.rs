//! Point-in-time reads of the target application's window
//!
//! A snapshot lives for one classification cycle: it is diffed against the
//! next one and then dropped. Text is held only for that diff.

use chrono::{DateTime, Utc};

use crate::impl_wire_name_conversions;

/// Author of a conversation turn as inferred from the UI tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnRole {
    User,
    Assistant,
    Unknown,
}

impl_wire_name_conversions!(TurnRole {
    User => "user",
    Assistant => "assistant",
    Unknown => "unknown",
});

/// One rendered message block in the conversation surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub text: String,
}

impl ConversationTurn {
    #[must_use]
    pub fn new(role: TurnRole, text: impl Into<String>) -> Self {
        Self { role, text: text.into() }
    }

    #[must_use]
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Window-level metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowMeta {
    pub title: Option<String>,
    /// Target is the frontmost application
    pub focused: bool,
}

/// Observable state of the target window at one instant
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub captured_at: DateTime<Utc>,
    /// `None` when no window could be resolved; such snapshots are malformed
    pub window: Option<WindowMeta>,
    pub turns: Vec<ConversationTurn>,
    pub composer_length: usize,
    /// Target is still streaming a reply
    pub generating: bool,
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.window == other.window
            && self.turns == other.turns
            && self.composer_length == other.composer_length
            && self.generating == other.generating
    }
}

impl Eq for Snapshot {}

impl Snapshot {
    /// Empty, focused window captured at `captured_at`.
    #[must_use]
    pub fn new(captured_at: DateTime<Utc>) -> Self {
        Self {
            captured_at,
            window: Some(WindowMeta { title: None, focused: true }),
            turns: Vec::new(),
            composer_length: 0,
            generating: false,
        }
    }

    /// Snapshot whose window could not be read.
    #[must_use]
    pub const fn unreadable(captured_at: DateTime<Utc>) -> Self {
        Self {
            captured_at,
            window: None,
            turns: Vec::new(),
            composer_length: 0,
            generating: false,
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        let window = self.window.get_or_insert_with(WindowMeta::default);
        window.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn with_focus(mut self, focused: bool) -> Self {
        let window = self.window.get_or_insert_with(WindowMeta::default);
        window.focused = focused;
        self
    }

    #[must_use]
    pub fn with_turn(mut self, role: TurnRole, text: impl Into<String>) -> Self {
        self.turns.push(ConversationTurn::new(role, text));
        self
    }

    #[must_use]
    pub const fn with_composer_length(mut self, length: usize) -> Self {
        self.composer_length = length;
        self
    }

    #[must_use]
    pub const fn with_generating(mut self, generating: bool) -> Self {
        self.generating = generating;
        self
    }

    #[must_use]
    pub const fn is_well_formed(&self) -> bool {
        self.window.is_some()
    }

    #[must_use]
    pub fn is_focused(&self) -> bool {
        self.window.as_ref().is_some_and(|w| w.focused)
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.window.as_ref().and_then(|w| w.title.as_deref())
    }

    /// Index and turn of the last turn authored by `role`.
    #[must_use]
    pub fn last_turn_of(&self, role: TurnRole) -> Option<(usize, &ConversationTurn)> {
        self.turns.iter().enumerate().rev().find(|(_, turn)| turn.role == role)
    }

    #[must_use]
    pub fn count_of(&self, role: TurnRole) -> usize {
        self.turns.iter().filter(|turn| turn.role == role).count()
    }

    /// Total characters rendered for `role`.
    #[must_use]
    pub fn text_len_of(&self, role: TurnRole) -> usize {
        self.turns.iter().filter(|turn| turn.role == role).map(ConversationTurn::char_len).sum()
    }
}
