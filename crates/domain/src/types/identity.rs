//! Authenticated identity attached to outbound deliveries

use std::fmt;

/// Bearer token and user id supplied by the auth collaborator
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub token: String,
    pub user_id: String,
}

impl Identity {
    #[must_use]
    pub fn new(token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self { token: token.into(), user_id: user_id.into() }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("token", &"<redacted>")
            .field("user_id", &self.user_id)
            .finish()
    }
}
