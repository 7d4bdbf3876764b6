use super::{message::Message, user::UserId};

/// Bearer token issued by OTP verification. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthToken([REDACTED])")
    }
}

/// Who is logged in. Passed explicitly wherever own and foreign messages differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub token: AuthToken,
    pub user_id: Option<UserId>,
}

impl SessionContext {
    pub fn new(token: AuthToken, user_id: Option<UserId>) -> Self {
        Self { token, user_id }
    }

    /// `None` while the current user id is still unknown.
    pub fn is_own(&self, message: &Message) -> Option<bool> {
        self.user_id.as_ref().map(|id| id == &message.sender_id)
    }

    /// Records the sender of a message the server confirmed as sent by us.
    /// Returns `true` when the user id was learned by this call.
    pub fn learn_from_confirmed_send(&mut self, message: &Message) -> bool {
        if self.user_id.is_some() {
            return false;
        }

        self.user_id = Some(message.sender_id.clone());
        true
    }
}
