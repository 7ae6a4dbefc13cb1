use async_trait::async_trait;
use thiserror::Error;

use crate::domain::order::Order;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("admin channel unreachable: {0}")]
    ChannelUnavailable(String),
}

/// The back-office notification bridge. Every committed order is handed over
/// here for human fulfilment; a failure before the buyer-facing
/// acknowledgment makes the commit retryable.
#[async_trait]
pub trait OrderNotifier: Send + Sync {
    async fn order_committed(&self, order: &Order) -> Result<(), NotifyError>;
}

#[derive(Default)]
pub struct NoopOrderNotifier;

#[async_trait]
impl OrderNotifier for NoopOrderNotifier {
    async fn order_committed(&self, _order: &Order) -> Result<(), NotifyError> {
        Ok(())
    }
}
