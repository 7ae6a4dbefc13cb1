use serde::{Deserialize, Serialize};

use crate::catalog::ProductId;
use crate::delivery::DeliveryMethod;
use crate::domain::order::{Cart, DraftOrder, Redemption};
use crate::domain::UserId;

/// The conversation position for one user. A tagged union: each variant
/// carries only the fields that are valid at that step, so a flow can never
/// act on stale data from an abandoned draft.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    MainMenu,
    Catalog {
        category: Option<String>,
    },
    SelectingQuantity {
        product_id: ProductId,
    },
    UsePoints {
        cart: Cart,
    },
    DeliveryMethod {
        cart: Cart,
        redemption: Redemption,
    },
    OrderComment {
        cart: Cart,
        redemption: Redemption,
        delivery: DeliveryMethod,
    },
    EnterUserData {
        cart: Cart,
        redemption: Redemption,
        delivery: DeliveryMethod,
        comment: Option<String>,
    },
    ConfirmOrder {
        draft: DraftOrder,
    },
}

/// Per-user session data. Ephemeral: created on first contact, reset on
/// explicit restart.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    pub state: SessionState,
}

/// One inbound chat event, already resolved to a user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub user: UserId,
    pub display_name: Option<String>,
    pub text: String,
}

impl InboundMessage {
    pub fn new(user: UserId, text: impl Into<String>) -> Self {
        Self { user, display_name: None, text: text.into() }
    }
}

/// One outbound message: text plus the quick-reply keyboard for the next
/// state. An empty keyboard means "keep whatever is showing".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Prompt {
    pub text: String,
    pub keyboard: Vec<Vec<String>>,
}

impl Prompt {
    pub fn new(text: impl Into<String>, keyboard: Vec<Vec<String>>) -> Self {
        Self { text: text.into(), keyboard }
    }

    pub fn bare(text: impl Into<String>) -> Self {
        Self { text: text.into(), keyboard: Vec::new() }
    }
}

/// Everything one state-machine turn sends back to the user.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Turn {
    pub messages: Vec<Prompt>,
}

impl Turn {
    pub fn single(prompt: Prompt) -> Self {
        Self { messages: vec![prompt] }
    }

    pub fn push(&mut self, prompt: Prompt) {
        self.messages.push(prompt);
    }
}
