//! Telegram integration - the chat transport seam for the storefront.
//!
//! The wire protocol itself stays behind traits; this crate provides:
//! - **Events** (`events`) - inbound update and outbound message types
//! - **Dispatcher** (`handler`) - routes buyer messages into the
//!   conversation engine and admin actions into the tracking relay
//! - **Polling** (`poller`) - long-poll loop with reconnection logic
//! - **Notify** (`notify`) - admin order notifications, the tracking-code
//!   relay message, and broadcast fan-out
//!
//! # Architecture
//!
//! ```text
//! Updates → PollingRunner → UpdateDispatcher → ShopEngine → Stores
//!                                │                  │
//!                          TrackingRelay      AdminChannelNotifier
//!                                └────→ MessageGateway ←────┘
//! ```

pub mod events;
pub mod handler;
pub mod notify;
pub mod poller;
