pub mod engine;
pub mod prompts;
pub mod registry;
pub mod state;

pub use engine::ShopEngine;
pub use registry::SessionRegistry;
pub use state::{InboundMessage, Prompt, Session, SessionState, Turn};
