use kiosk_core::domain::UserId;
use kiosk_core::session::state::InboundMessage;

/// Destination chat. For a direct message this is the user's own id; the
/// admin group has its own id from config.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub String);

impl From<&UserId> for ChatId {
    fn from(user: &UserId) -> Self {
        Self(user.0.clone())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateEnvelope {
    pub update_id: String,
    pub update: InboundUpdate,
}

/// One inbound transport event. Free text arrives as a message; the single
/// structured callback is an admin asking to attach a tracking code for a
/// buyer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundUpdate {
    Message(InboundMessage),
    TrackingRequest { admin: UserId, target: UserId },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub chat: ChatId,
    pub text: String,
    pub keyboard: Vec<Vec<String>>,
}

impl OutboundMessage {
    pub fn new(chat: ChatId, text: impl Into<String>) -> Self {
        Self { chat, text: text.into(), keyboard: Vec::new() }
    }

    pub fn with_keyboard(mut self, keyboard: Vec<Vec<String>>) -> Self {
        self.keyboard = keyboard;
        self
    }
}
