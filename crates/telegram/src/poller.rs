use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use kiosk_core::notify::OrderNotifier;
use kiosk_core::stores::{LedgerStore, OrderStore};

use crate::events::{InboundUpdate, UpdateEnvelope};
use crate::handler::UpdateDispatcher;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// The long-poll seam. The production implementation wraps the platform's
/// getUpdates endpoint; `acknowledge` commits the update offset.
#[async_trait]
pub trait UpdateTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_update(&self) -> Result<Option<UpdateEnvelope>, TransportError>;
    async fn acknowledge(&self, update_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopUpdateTransport;

#[async_trait]
impl UpdateTransport for NoopUpdateTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_update(&self) -> Result<Option<UpdateEnvelope>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _update_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

pub struct PollingRunner<L, O, N> {
    transport: Arc<dyn UpdateTransport>,
    dispatcher: Arc<UpdateDispatcher<L, O, N>>,
    reconnect_policy: ReconnectPolicy,
}

impl<L, O, N> PollingRunner<L, O, N>
where
    L: LedgerStore,
    O: OrderStore,
    N: OrderNotifier,
{
    pub fn new(
        transport: Arc<dyn UpdateTransport>,
        dispatcher: Arc<UpdateDispatcher<L, O, N>>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy }
    }

    pub async fn start(&self) -> Result<()> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "update transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "update transport retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, "opening update transport connection");
        self.transport.connect().await?;
        info!(attempt, "update transport connected");

        loop {
            let Some(envelope) = self.transport.next_update().await? else {
                info!(attempt, "update transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };
            let user_id = update_user(&envelope);

            info!(
                event_name = "ingress.update_received",
                update_id = %envelope.update_id,
                user_id = %user_id,
                "received inbound update"
            );

            if let Err(error) = self.transport.acknowledge(&envelope.update_id).await {
                warn!(
                    event_name = "ingress.ack_failed",
                    update_id = %envelope.update_id,
                    user_id = %user_id,
                    error = %error,
                    "failed to acknowledge update"
                );
            } else {
                debug!(
                    event_name = "ingress.ack_sent",
                    update_id = %envelope.update_id,
                    user_id = %user_id,
                    "acknowledged update"
                );
            }

            if let Err(error) = self.dispatcher.dispatch(&envelope).await {
                warn!(
                    event_name = "ingress.dispatch_failed",
                    update_id = %envelope.update_id,
                    user_id = %user_id,
                    error = %error,
                    "update dispatch failed; continuing poll loop"
                );
            }
        }
    }
}

fn update_user(envelope: &UpdateEnvelope) -> String {
    match &envelope.update {
        InboundUpdate::Message(message) => message.user.0.clone(),
        InboundUpdate::TrackingRequest { admin, .. } => admin.0.clone(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use kiosk_core::catalog::Catalog;
    use kiosk_core::domain::UserId;
    use kiosk_core::notify::NoopOrderNotifier;
    use kiosk_core::session::engine::ShopEngine;
    use kiosk_core::session::state::InboundMessage;
    use kiosk_core::stores::{InMemoryLedgerStore, InMemoryOrderStore};

    use crate::events::{ChatId, InboundUpdate, UpdateEnvelope};
    use crate::handler::{AdminIds, UpdateDispatcher};
    use crate::notify::test_support::RecordingGateway;

    use super::{NoopUpdateTransport, PollingRunner, ReconnectPolicy, TransportError, UpdateTransport};

    #[derive(Default)]
    struct ScriptedTransport {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        connect_results: VecDeque<Result<(), TransportError>>,
        updates: VecDeque<Result<Option<UpdateEnvelope>, TransportError>>,
        connect_attempts: usize,
        acknowledgements: Vec<String>,
    }

    impl ScriptedTransport {
        fn with_script(
            connect_results: Vec<Result<(), TransportError>>,
            updates: Vec<Result<Option<UpdateEnvelope>, TransportError>>,
        ) -> Self {
            Self {
                state: Mutex::new(ScriptedState {
                    connect_results: connect_results.into(),
                    updates: updates.into(),
                    connect_attempts: 0,
                    acknowledgements: Vec::new(),
                }),
            }
        }

        async fn connect_attempts(&self) -> usize {
            self.state.lock().await.connect_attempts
        }

        async fn acknowledgements(&self) -> Vec<String> {
            self.state.lock().await.acknowledgements.clone()
        }
    }

    #[async_trait]
    impl UpdateTransport for ScriptedTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.connect_attempts += 1;
            state.connect_results.pop_front().unwrap_or(Ok(()))
        }

        async fn next_update(&self) -> Result<Option<UpdateEnvelope>, TransportError> {
            let mut state = self.state.lock().await;
            state.updates.pop_front().unwrap_or(Ok(None))
        }

        async fn acknowledge(&self, update_id: &str) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.acknowledgements.push(update_id.to_owned());
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn dispatcher(
        gateway: Arc<RecordingGateway>,
    ) -> Arc<UpdateDispatcher<InMemoryLedgerStore, InMemoryOrderStore, NoopOrderNotifier>> {
        let orders = Arc::new(InMemoryOrderStore::default());
        let engine = Arc::new(ShopEngine::new(
            Catalog::builtin(),
            Arc::new(InMemoryLedgerStore::default()),
            orders.clone(),
            Arc::new(NoopOrderNotifier),
        ));
        Arc::new(UpdateDispatcher::new(
            engine,
            orders,
            gateway,
            AdminIds {
                user_id: UserId("admin-7".to_string()),
                chat_id: ChatId("-1001".to_string()),
            },
        ))
    }

    fn envelope(id: &str, user: &str, text: &str) -> UpdateEnvelope {
        UpdateEnvelope {
            update_id: id.to_string(),
            update: InboundUpdate::Message(InboundMessage::new(UserId(user.to_string()), text)),
        }
    }

    #[tokio::test]
    async fn reconnects_after_initial_connect_failure() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Err(TransportError::Connect("network down".to_owned())), Ok(())],
            vec![Ok(Some(envelope("upd-1", "buyer-1", "hello"))), Ok(None)],
        ));
        let gateway = Arc::new(RecordingGateway::default());

        let runner = PollingRunner::new(
            transport.clone(),
            dispatcher(gateway.clone()),
            ReconnectPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 },
        );

        runner.start().await.expect("runner should not fail");

        assert_eq!(transport.connect_attempts().await, 2);
        assert_eq!(transport.acknowledgements().await, vec!["upd-1"]);
        // The buyer got the main-menu re-prompt for unrecognized input.
        assert_eq!(gateway.sent_to("buyer-1").await.len(), 1);
    }

    #[tokio::test]
    async fn exhausts_retries_without_crashing() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![
                Err(TransportError::Connect("fail-1".to_owned())),
                Err(TransportError::Connect("fail-2".to_owned())),
                Err(TransportError::Connect("fail-3".to_owned())),
            ],
            vec![],
        ));

        let runner = PollingRunner::new(
            transport.clone(),
            dispatcher(Arc::new(RecordingGateway::default())),
            ReconnectPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 },
        );

        runner.start().await.expect("runner should degrade gracefully");
        assert_eq!(transport.connect_attempts().await, 3);
    }

    #[tokio::test]
    async fn noop_transport_drains_immediately() {
        let runner = PollingRunner::new(
            Arc::new(NoopUpdateTransport),
            dispatcher(Arc::new(RecordingGateway::default())),
            ReconnectPolicy::default(),
        );

        runner.start().await.expect("noop transport should close cleanly");
    }

    #[tokio::test]
    async fn receive_error_mid_stream_triggers_reconnect() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(()), Ok(())],
            vec![
                Ok(Some(envelope("upd-1", "buyer-1", "hello"))),
                Err(TransportError::Receive("poll timed out".to_owned())),
                Ok(None),
            ],
        ));

        let runner = PollingRunner::new(
            transport.clone(),
            dispatcher(Arc::new(RecordingGateway::default())),
            ReconnectPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 },
        );

        runner.start().await.expect("runner should survive mid-stream errors");
        assert_eq!(transport.connect_attempts().await, 2);
    }
}
