pub mod catalog;
pub mod config;
pub mod delivery;
pub mod domain;
pub mod errors;
pub mod notify;
pub mod pricing;
pub mod report;
pub mod session;
pub mod stores;

pub use catalog::{Catalog, CatalogError, Product, ProductId};
pub use delivery::{DeliveryMethod, FieldSpec};
pub use domain::loyalty::LoyaltyAccount;
pub use domain::order::{Cart, DraftOrder, Order, OrderId, OrderStatus, Redemption};
pub use domain::UserId;
pub use errors::ApplicationError;
pub use notify::{NoopOrderNotifier, NotifyError, OrderNotifier};
pub use session::engine::ShopEngine;
pub use session::registry::SessionRegistry;
pub use session::state::{InboundMessage, Prompt, Session, SessionState, Turn};
pub use stores::{InMemoryLedgerStore, InMemoryOrderStore, LedgerStore, OrderStore, StoreError};
