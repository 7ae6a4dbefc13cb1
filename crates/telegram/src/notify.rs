use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use kiosk_core::domain::order::Order;
use kiosk_core::notify::{NotifyError, OrderNotifier};
use kiosk_core::stores::{OrderStore, StoreError};

use crate::events::{ChatId, OutboundMessage};

pub const SEND_TRACKING_BUTTON: &str = "📤 Send tracking code";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The recipient has blocked the bot or is otherwise unreachable.
    /// Non-retryable; reported as a distinct outcome.
    #[error("recipient unreachable: {0}")]
    RecipientUnreachable(String),
    #[error("message delivery failed: {0}")]
    Delivery(String),
}

/// Outbound message delivery. The production implementation talks to the
/// chat platform; tests and offline runs use recording or noop gateways.
#[async_trait]
pub trait MessageGateway: Send + Sync {
    async fn send(&self, message: OutboundMessage) -> Result<(), SendError>;
}

#[derive(Default)]
pub struct NoopMessageGateway;

#[async_trait]
impl MessageGateway for NoopMessageGateway {
    async fn send(&self, _message: OutboundMessage) -> Result<(), SendError> {
        Ok(())
    }
}

/// Formats a committed order for the back-office channel.
pub fn format_order_notification(order: &Order) -> String {
    let mut text = format!(
        "🆕 NEW ORDER!\n\n📅 Date: {}\n👤 Buyer: {}\n🆔 ID: {}\n\n📦 Items:\n• {} x{} - {}\n\n\
         💰 Order total: {}\n\n🚚 Delivery: {}\n",
        order.created_at.format("%Y-%m-%d %H:%M:%S"),
        order.buyer_name.as_deref().unwrap_or("(no name)"),
        order.user_id,
        order.cart.product_name,
        order.cart.quantity,
        order.final_price,
        order.final_price,
        order.delivery.label(),
    );
    if order.redemption.points_used > 0 {
        text.push_str(&format!(
            "💎 Points used: {} (-{})\n",
            order.redemption.points_used, order.redemption.value
        ));
    }
    if let Some(comment) = &order.comment {
        text.push_str(&format!("💬 Comment: {comment}\n"));
    }
    text.push_str("\n📝 Delivery details:\n");
    for line in order.recipient.lines().filter(|line| !line.trim().is_empty()) {
        text.push_str(line);
        text.push('\n');
    }
    text
}

/// The delivery notice a buyer receives once the admin supplies a code.
pub fn tracking_message(tracking_code: &str) -> String {
    format!(
        "📦 Delivery update\n\n✨ Status: your order has shipped\n\n📤 Tracking code:\n• {tracking_code}\n\n\
         📍 How to track:\n• Open the postal service website\n• Enter the code in the tracking field\n\n\
         ❗️ Check the goods when the parcel arrives"
    )
}

/// Pushes every committed order to the single configured admin chat,
/// together with the tracking-request action.
pub struct AdminChannelNotifier {
    gateway: Arc<dyn MessageGateway>,
    admin_chat: ChatId,
}

impl AdminChannelNotifier {
    pub fn new(gateway: Arc<dyn MessageGateway>, admin_chat: ChatId) -> Self {
        Self { gateway, admin_chat }
    }
}

#[async_trait]
impl OrderNotifier for AdminChannelNotifier {
    async fn order_committed(&self, order: &Order) -> Result<(), NotifyError> {
        let message = OutboundMessage::new(self.admin_chat.clone(), format_order_notification(order))
            .with_keyboard(vec![vec![SEND_TRACKING_BUTTON.to_string()]]);

        self.gateway
            .send(message)
            .await
            .map_err(|error| NotifyError::ChannelUnavailable(error.to_string()))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: u32,
    pub unreachable: u32,
    pub failed: u32,
}

/// Announcement fan-out over every distinct buyer in the order store. One
/// unreachable recipient never aborts the batch.
pub struct Broadcaster<O> {
    orders: Arc<O>,
    gateway: Arc<dyn MessageGateway>,
}

impl<O> Broadcaster<O>
where
    O: OrderStore,
{
    pub fn new(orders: Arc<O>, gateway: Arc<dyn MessageGateway>) -> Self {
        Self { orders, gateway }
    }

    pub async fn broadcast(&self, text: &str) -> Result<BroadcastReport, StoreError> {
        let orders = self.orders.list_all().await?;
        let recipients: BTreeSet<String> =
            orders.into_iter().map(|order| order.user_id.0).collect();

        let mut report = BroadcastReport::default();
        for recipient in recipients {
            let message = OutboundMessage::new(ChatId(recipient.clone()), text);
            match self.gateway.send(message).await {
                Ok(()) => report.delivered += 1,
                Err(SendError::RecipientUnreachable(reason)) => {
                    report.unreachable += 1;
                    warn!(
                        event_name = "broadcast.recipient_unreachable",
                        user_id = %recipient,
                        reason = %reason,
                        "skipping unreachable broadcast recipient"
                    );
                }
                Err(error) => {
                    report.failed += 1;
                    warn!(
                        event_name = "broadcast.delivery_failed",
                        user_id = %recipient,
                        error = %error,
                        "broadcast delivery failed for one recipient"
                    );
                }
            }
        }

        info!(
            event_name = "broadcast.finished",
            delivered = report.delivered,
            unreachable = report.unreachable,
            failed = report.failed,
            "broadcast fan-out finished"
        );
        Ok(report)
    }
}
