use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

use kiosk_core::domain::order::{Order, OrderStatus};
use kiosk_core::domain::UserId;
use kiosk_core::notify::OrderNotifier;
use kiosk_core::session::engine::ShopEngine;
use kiosk_core::session::state::InboundMessage;
use kiosk_core::stores::{LedgerStore, OrderStore, StoreError};

use crate::events::{ChatId, InboundUpdate, OutboundMessage, UpdateEnvelope};
use crate::notify::{tracking_message, MessageGateway, SendError};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What one dispatched update amounted to. Useful for logs and tests; the
/// outbound messages have already been sent through the gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Handled {
    BuyerTurn { messages: usize },
    TrackingPrompted { target: UserId },
    TrackingRelayed { target: UserId },
    TrackingUnreachable { target: UserId },
    Ignored,
}

/// Admin identities from config: the operator allowed to drive the tracking
/// flow and the chat that receives order notifications.
#[derive(Clone, Debug)]
pub struct AdminIds {
    pub user_id: UserId,
    pub chat_id: ChatId,
}

/// The tracking relay runs parallel to the buyer flow: an admin taps the
/// tracking action on an order notification, then sends the code as free
/// text. One pending target per admin.
#[derive(Default)]
struct TrackingRelay {
    pending: RwLock<HashMap<String, UserId>>,
}

impl TrackingRelay {
    async fn begin(&self, admin: &UserId, target: UserId) {
        self.pending.write().await.insert(admin.0.clone(), target);
    }

    async fn take(&self, admin: &UserId) -> Option<UserId> {
        self.pending.write().await.remove(&admin.0)
    }

    async fn restore(&self, admin: &UserId, target: UserId) {
        self.pending.write().await.insert(admin.0.clone(), target);
    }
}

/// Routes inbound updates: buyer messages into the conversation engine,
/// admin actions into the tracking relay. Failures stay inside the update
/// that raised them; no error crosses into another user's session.
pub struct UpdateDispatcher<L, O, N> {
    engine: Arc<ShopEngine<L, O, N>>,
    orders: Arc<O>,
    gateway: Arc<dyn MessageGateway>,
    admin: AdminIds,
    relay: TrackingRelay,
}

impl<L, O, N> UpdateDispatcher<L, O, N>
where
    L: LedgerStore,
    O: OrderStore,
    N: OrderNotifier,
{
    pub fn new(
        engine: Arc<ShopEngine<L, O, N>>,
        orders: Arc<O>,
        gateway: Arc<dyn MessageGateway>,
        admin: AdminIds,
    ) -> Self {
        Self { engine, orders, gateway, admin, relay: TrackingRelay::default() }
    }

    pub async fn dispatch(&self, envelope: &UpdateEnvelope) -> Result<Handled, DispatchError> {
        match &envelope.update {
            InboundUpdate::TrackingRequest { admin, target } => {
                self.handle_tracking_request(admin, target).await
            }
            InboundUpdate::Message(message) => {
                if message.user == self.admin.user_id {
                    if let Some(target) = self.relay.take(&self.admin.user_id).await {
                        return self.relay_tracking_code(target, message.text.trim()).await;
                    }
                }
                self.handle_buyer_message(message).await
            }
        }
    }

    async fn handle_tracking_request(
        &self,
        admin: &UserId,
        target: &UserId,
    ) -> Result<Handled, DispatchError> {
        if admin != &self.admin.user_id {
            warn!(
                event_name = "tracking.request_rejected",
                user_id = %admin,
                "tracking request from a non-admin user ignored"
            );
            return Ok(Handled::Ignored);
        }

        self.relay.begin(admin, target.clone()).await;
        self.send_to_admin(format!("📝 Enter the tracking code for user {target}:")).await;
        Ok(Handled::TrackingPrompted { target: target.clone() })
    }

    async fn relay_tracking_code(
        &self,
        target: UserId,
        code: &str,
    ) -> Result<Handled, DispatchError> {
        // Attach the code to the buyer's most recent pending order first;
        // the committed record is the source of truth for the export.
        match self.latest_pending_order(&target).await {
            Ok(Some(mut order)) => {
                order.ship(code);
                if let Err(error) = self.orders.update(order).await {
                    warn!(
                        event_name = "tracking.order_update_failed",
                        user_id = %target,
                        error = %error,
                        "could not attach tracking code; keeping relay pending"
                    );
                    self.relay.restore(&self.admin.user_id, target.clone()).await;
                    self.send_to_admin(
                        "⚠️ Could not update the order record. Send the code again to retry."
                            .to_string(),
                    )
                    .await;
                    return Ok(Handled::TrackingPrompted { target });
                }
            }
            Ok(None) => {
                warn!(
                    event_name = "tracking.no_pending_order",
                    user_id = %target,
                    "no pending order for tracking code; relaying anyway"
                );
            }
            Err(error) => {
                warn!(
                    event_name = "tracking.order_lookup_failed",
                    user_id = %target,
                    error = %error,
                    "could not look up orders; keeping relay pending"
                );
                self.relay.restore(&self.admin.user_id, target.clone()).await;
                self.send_to_admin(
                    "⚠️ The order store is unavailable. Send the code again to retry.".to_string(),
                )
                .await;
                return Ok(Handled::TrackingPrompted { target });
            }
        }

        let notice = OutboundMessage::new(ChatId::from(&target), tracking_message(code));
        match self.gateway.send(notice).await {
            Ok(()) => {
                info!(
                    event_name = "tracking.relayed",
                    user_id = %target,
                    "tracking code relayed to the buyer"
                );
                self.send_to_admin(format!("✅ Tracking code sent to user {target}")).await;
                Ok(Handled::TrackingRelayed { target })
            }
            Err(SendError::RecipientUnreachable(reason)) => {
                // Distinct, non-retryable: the order record keeps the code.
                warn!(
                    event_name = "tracking.recipient_unreachable",
                    user_id = %target,
                    reason = %reason,
                    "buyer unreachable for tracking relay"
                );
                self.send_to_admin(
                    "❌ The buyer has blocked the bot; the tracking code is saved on the order."
                        .to_string(),
                )
                .await;
                Ok(Handled::TrackingUnreachable { target })
            }
            Err(error) => {
                warn!(
                    event_name = "tracking.relay_failed",
                    user_id = %target,
                    error = %error,
                    "tracking relay delivery failed"
                );
                self.send_to_admin("⚠️ Delivery failed. Send the code again to retry.".to_string())
                    .await;
                self.relay.restore(&self.admin.user_id, target.clone()).await;
                Ok(Handled::TrackingPrompted { target })
            }
        }
    }

    async fn latest_pending_order(&self, user: &UserId) -> Result<Option<Order>, StoreError> {
        let mut orders = self.orders.list_for_user(user).await?;
        orders.retain(|order| order.status == OrderStatus::Pending);
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders.into_iter().next())
    }

    async fn handle_buyer_message(
        &self,
        message: &InboundMessage,
    ) -> Result<Handled, DispatchError> {
        let turn = self.engine.handle(message.clone()).await;
        let chat = ChatId::from(&message.user);
        let count = turn.messages.len();

        for prompt in turn.messages {
            let outbound =
                OutboundMessage::new(chat.clone(), prompt.text).with_keyboard(prompt.keyboard);
            if let Err(error) = self.gateway.send(outbound).await {
                warn!(
                    event_name = "outbound.delivery_failed",
                    user_id = %message.user,
                    error = %error,
                    "outbound prompt delivery failed"
                );
            }
        }

        Ok(Handled::BuyerTurn { messages: count })
    }

    async fn send_to_admin(&self, text: String) {
        let message = OutboundMessage::new(self.admin.chat_id.clone(), text);
        if let Err(error) = self.gateway.send(message).await {
            warn!(
                event_name = "outbound.admin_delivery_failed",
                error = %error,
                "admin message delivery failed"
            );
        }
    }
}
