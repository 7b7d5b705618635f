//! Structural comparison of two snapshots of the conversation surface

use jiffy_domain::{ConversationTurn, Snapshot, TurnRole};

/// What changed between two consecutive, well-formed snapshots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SnapshotDelta {
    /// Length of the user turn that was appended or extended
    pub user_growth: Option<usize>,
    /// Length of the assistant turn that was appended or extended
    pub assistant_growth: Option<usize>,
    /// Earlier turns were edited, removed or replaced
    pub history_rewritten: bool,
    pub focus_gained: bool,
    pub title_changed: bool,
    pub composer_changed: bool,
}

impl SnapshotDelta {
    /// Changes attributable to the user other than a submitted prompt.
    pub(crate) const fn has_user_interaction(&self) -> bool {
        self.history_rewritten || self.focus_gained || self.title_changed || self.composer_changed
    }
}

pub(crate) fn diff(previous: &Snapshot, current: &Snapshot) -> SnapshotDelta {
    let mut delta = SnapshotDelta {
        focus_gained: !previous.is_focused() && current.is_focused(),
        title_changed: previous.title() != current.title(),
        composer_changed: previous.composer_length != current.composer_length,
        ..SnapshotDelta::default()
    };

    if !is_continuation(&previous.turns, &current.turns) {
        delta.history_rewritten = previous.turns != current.turns;
        return delta;
    }

    let prev_len = previous.turns.len();
    let appended = &current.turns[prev_len..];

    // The last pre-existing turn may have been extended in place.
    if let Some(last_prev) = previous.turns.last() {
        let last_cur = &current.turns[prev_len - 1];
        if last_cur.char_len() > last_prev.char_len() {
            match last_prev.role {
                TurnRole::User if last_cur.text.starts_with(&last_prev.text) => {
                    delta.user_growth = Some(last_cur.char_len());
                }
                TurnRole::Assistant => delta.assistant_growth = Some(last_cur.char_len()),
                _ => delta.history_rewritten = true,
            }
        } else if last_cur != last_prev && last_prev.role != TurnRole::Assistant {
            // Replies may shrink while the target re-renders finished markdown.
            delta.history_rewritten = true;
        }
    }

    let appended_users: Vec<&ConversationTurn> =
        appended.iter().filter(|turn| turn.role == TurnRole::User).collect();
    match appended_users.as_slice() {
        [] => {}
        [single] if delta.user_growth.is_none() => delta.user_growth = Some(single.char_len()),
        // Several user turns at once is a conversation load, not a prompt.
        _ => {
            delta.user_growth = None;
            delta.history_rewritten = true;
        }
    }

    if delta.history_rewritten {
        delta.assistant_growth = None;
        return delta;
    }

    if let Some(reply) = appended
        .iter()
        .rev()
        .find(|turn| turn.role == TurnRole::Assistant && !turn.text.is_empty())
    {
        delta.assistant_growth = Some(reply.char_len());
    }

    delta
}

/// `current` keeps every earlier turn of `previous` and at most changes the
/// last one in place or appends after it.
fn is_continuation(previous: &[ConversationTurn], current: &[ConversationTurn]) -> bool {
    if current.len() < previous.len() {
        return false;
    }
    let Some((last_prev, earlier)) = previous.split_last() else {
        return true;
    };
    earlier.iter().zip(current).all(|(a, b)| a == b)
        && current[earlier.len()].role == last_prev.role
}
