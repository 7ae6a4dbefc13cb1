use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::catalog::{Catalog, ProductId};
use crate::delivery::{self, DeliveryMethod};
use crate::domain::order::{Cart, DraftOrder, Order, OrderId, Redemption};
use crate::domain::UserId;
use crate::errors::ApplicationError;
use crate::notify::OrderNotifier;
use crate::pricing;
use crate::session::prompts::{self, vocab};
use crate::session::registry::SessionRegistry;
use crate::session::state::{InboundMessage, Prompt, SessionState, Turn};
use crate::stores::{LedgerStore, OrderStore};

/// The conversation state machine. Holds one linear flow per active user,
/// validates input at each step, and produces the next state plus the
/// outbound prompts. The ledger and order stores are touched only at
/// quantity selection, points redemption, and order commit.
pub struct ShopEngine<L, O, N> {
    catalog: Catalog,
    ledger: Arc<L>,
    orders: Arc<O>,
    notifier: Arc<N>,
    sessions: SessionRegistry,
}

impl<L, O, N> ShopEngine<L, O, N>
where
    L: LedgerStore,
    O: OrderStore,
    N: OrderNotifier,
{
    pub fn new(catalog: Catalog, ledger: Arc<L>, orders: Arc<O>, notifier: Arc<N>) -> Self {
        Self { catalog, ledger, orders, notifier, sessions: SessionRegistry::default() }
    }

    /// Processes one inbound event for one user. The per-user session lock
    /// guarantees turns for the same user serialize in arrival order.
    pub async fn handle(&self, message: InboundMessage) -> Turn {
        let session = self.sessions.session(&message.user).await;
        let mut session = session.lock().await;

        let (next, turn) = self.step(session.state.clone(), &message).await;
        session.state = next;
        turn
    }

    /// Number of sessions currently held in the registry.
    pub async fn active_sessions(&self) -> usize {
        self.sessions.active_count().await
    }

    /// The state a user's session currently sits in.
    pub async fn current_state(&self, user: &UserId) -> SessionState {
        let session = self.sessions.session(user).await;
        let session = session.lock().await;
        session.state.clone()
    }

    async fn step(&self, state: SessionState, message: &InboundMessage) -> (SessionState, Turn) {
        let text = message.text.trim();
        match state {
            SessionState::MainMenu => self.main_menu(text, message).await,
            SessionState::Catalog { category } => self.catalog_step(category, text),
            SessionState::SelectingQuantity { product_id } => {
                self.quantity_step(product_id, text, message).await
            }
            SessionState::UsePoints { cart } => self.points_step(cart, text, message).await,
            SessionState::DeliveryMethod { cart, redemption } => {
                self.delivery_step(cart, redemption, text)
            }
            SessionState::OrderComment { cart, redemption, delivery } => {
                self.comment_step(cart, redemption, delivery, text)
            }
            SessionState::EnterUserData { cart, redemption, delivery, comment } => {
                self.user_data_step(cart, redemption, delivery, comment, text)
            }
            SessionState::ConfirmOrder { draft } => self.confirm_step(draft, message).await,
        }
    }

    async fn main_menu(&self, text: &str, message: &InboundMessage) -> (SessionState, Turn) {
        match text {
            vocab::CATALOG => (
                SessionState::Catalog { category: None },
                Turn::single(Prompt::new(
                    prompts::choose_category(),
                    prompts::categories_keyboard(&self.catalog.categories()),
                )),
            ),
            vocab::LOYALTY => {
                let prompt = match self.ledger.load_account(&message.user).await {
                    Ok(account) => Prompt::new(
                        prompts::loyalty_view(&account),
                        prompts::back_to_main_keyboard(),
                    ),
                    Err(error) => {
                        warn!(
                            event_name = "ledger.load_failed",
                            user_id = %message.user,
                            error = %error,
                            "loyalty view degraded to apology"
                        );
                        Prompt::new(
                            ApplicationError::from(error).user_message(),
                            prompts::main_menu_keyboard(),
                        )
                    }
                };
                (SessionState::MainMenu, Turn::single(prompt))
            }
            vocab::MY_ORDERS => {
                let prompt = match self.orders.list_for_user(&message.user).await {
                    Ok(mut orders) => {
                        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                        Prompt::new(prompts::orders_view(&orders), prompts::back_to_main_keyboard())
                    }
                    Err(error) => {
                        warn!(
                            event_name = "orders.list_failed",
                            user_id = %message.user,
                            error = %error,
                            "orders view degraded to apology"
                        );
                        Prompt::new(
                            ApplicationError::from(error).user_message(),
                            prompts::main_menu_keyboard(),
                        )
                    }
                };
                (SessionState::MainMenu, Turn::single(prompt))
            }
            vocab::FAQ => (
                SessionState::MainMenu,
                Turn::single(Prompt::new(prompts::faq_view(), prompts::back_to_main_keyboard())),
            ),
            vocab::DELIVERY_INFO => (
                SessionState::MainMenu,
                Turn::single(Prompt::new(
                    prompts::delivery_info_view(),
                    prompts::back_to_main_keyboard(),
                )),
            ),
            vocab::RESTART => (
                SessionState::MainMenu,
                Turn::single(Prompt::new(prompts::welcome(true), prompts::main_menu_keyboard())),
            ),
            vocab::MAIN_MENU => (
                SessionState::MainMenu,
                Turn::single(Prompt::new(prompts::welcome(false), prompts::main_menu_keyboard())),
            ),
            _ => (
                SessionState::MainMenu,
                Turn::single(Prompt::new(prompts::use_the_menu(), prompts::main_menu_keyboard())),
            ),
        }
    }

    fn catalog_step(&self, category: Option<String>, text: &str) -> (SessionState, Turn) {
        if text == vocab::MAIN_MENU {
            return (
                SessionState::MainMenu,
                Turn::single(Prompt::new(prompts::welcome(false), prompts::main_menu_keyboard())),
            );
        }
        if text == vocab::BACK {
            return self.list_categories();
        }

        if let Some(category) = &category {
            if let Some(product) = self.catalog.find_in_category(category, text) {
                return (
                    SessionState::SelectingQuantity { product_id: product.id.clone() },
                    Turn::single(Prompt::new(
                        prompts::choose_quantity(product),
                        prompts::quantity_keyboard(),
                    )),
                );
            }
        }

        if let Some(chosen) = text.strip_prefix("📁 ") {
            if self.catalog.categories().contains(&chosen) {
                return self.list_products(chosen);
            }
        }

        (
            SessionState::Catalog { category },
            Turn::single(Prompt::new(
                prompts::choose_category(),
                prompts::categories_keyboard(&self.catalog.categories()),
            )),
        )
    }

    fn list_categories(&self) -> (SessionState, Turn) {
        (
            SessionState::Catalog { category: None },
            Turn::single(Prompt::new(
                prompts::choose_category(),
                prompts::categories_keyboard(&self.catalog.categories()),
            )),
        )
    }

    fn list_products(&self, category: &str) -> (SessionState, Turn) {
        let products = self.catalog.products_in(category);
        if products.is_empty() {
            return (
                SessionState::Catalog { category: None },
                Turn::single(Prompt::new(
                    prompts::empty_category(),
                    prompts::categories_keyboard(&self.catalog.categories()),
                )),
            );
        }

        (
            SessionState::Catalog { category: Some(category.to_string()) },
            Turn::single(Prompt::new(
                prompts::category_listing(category, &products),
                prompts::products_keyboard(&products),
            )),
        )
    }

    async fn quantity_step(
        &self,
        product_id: ProductId,
        text: &str,
        message: &InboundMessage,
    ) -> (SessionState, Turn) {
        if text == vocab::BACK {
            return match self.catalog.get(&product_id) {
                Some(product) => self.list_products(&product.category.clone()),
                None => self.list_categories(),
            };
        }

        let quantity = match text.parse::<u8>() {
            Ok(quantity)
                if (pricing::MIN_QUANTITY..=pricing::MAX_QUANTITY).contains(&quantity) =>
            {
                quantity
            }
            _ => {
                // Recoverable validation failure: re-prompt, same state.
                return (
                    SessionState::SelectingQuantity { product_id },
                    Turn::single(Prompt::new(
                        prompts::quantity_reprompt(),
                        prompts::quantity_keyboard(),
                    )),
                );
            }
        };

        let Some(product) = self.catalog.get(&product_id) else {
            return self.list_categories();
        };

        let base_total = pricing::line_total(product.unit_price(), quantity);
        let cart = Cart {
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            quantity,
            base_total,
        };

        let account = match self.ledger.load_account(&message.user).await {
            Ok(account) => account,
            Err(error) => {
                warn!(
                    event_name = "ledger.load_failed",
                    user_id = %message.user,
                    error = %error,
                    "quantity step degraded to apology"
                );
                return (
                    SessionState::SelectingQuantity { product_id },
                    Turn::single(Prompt::new(
                        ApplicationError::from(error).user_message(),
                        prompts::quantity_keyboard(),
                    )),
                );
            }
        };

        let summary = prompts::cart_summary(product, quantity, base_total);
        if account.points > 0 {
            let ceiling = pricing::redeemable_discount(account.points, base_total);
            let text = format!(
                "{summary}\n\n{}",
                prompts::points_offer(account.points, ceiling.value)
            );
            (
                SessionState::UsePoints { cart },
                Turn::single(Prompt::new(text, prompts::points_keyboard())),
            )
        } else {
            let text = format!(
                "{summary}\n\n{}\n{}",
                prompts::no_points_hint(),
                prompts::choose_delivery()
            );
            (
                SessionState::DeliveryMethod { cart, redemption: Redemption::default() },
                Turn::single(Prompt::new(text, prompts::delivery_keyboard())),
            )
        }
    }

    async fn points_step(
        &self,
        cart: Cart,
        text: &str,
        message: &InboundMessage,
    ) -> (SessionState, Turn) {
        match text {
            vocab::BACK => {
                // Recompute fresh on re-entry; any prior redemption choice is
                // discarded with this state.
                let prompt = match self.catalog.get(&cart.product_id) {
                    Some(product) => {
                        Prompt::new(prompts::choose_quantity(product), prompts::quantity_keyboard())
                    }
                    None => {
                        Prompt::new(prompts::quantity_reprompt(), prompts::quantity_keyboard())
                    }
                };
                (
                    SessionState::SelectingQuantity { product_id: cart.product_id },
                    Turn::single(prompt),
                )
            }
            vocab::USE_POINTS => {
                let account = match self.ledger.load_account(&message.user).await {
                    Ok(account) => account,
                    Err(error) => {
                        warn!(
                            event_name = "ledger.load_failed",
                            user_id = %message.user,
                            error = %error,
                            "points step degraded to apology"
                        );
                        return (
                            SessionState::UsePoints { cart },
                            Turn::single(Prompt::new(
                                ApplicationError::from(error).user_message(),
                                prompts::points_keyboard(),
                            )),
                        );
                    }
                };

                // The debit itself is deferred to the commit; the draft only
                // records what the balance can cover right now.
                let redemption = pricing::redeemable_discount(account.points, cart.base_total);
                let final_price = cart.base_total - redemption.value;
                let text = format!(
                    "{}\n\n{}",
                    prompts::redemption_applied(
                        cart.base_total,
                        redemption.value,
                        redemption.points_used,
                        final_price
                    ),
                    prompts::choose_delivery()
                );
                (
                    SessionState::DeliveryMethod { cart, redemption },
                    Turn::single(Prompt::new(text, prompts::delivery_keyboard())),
                )
            }
            vocab::SKIP_POINTS => (
                SessionState::DeliveryMethod { cart, redemption: Redemption::default() },
                Turn::single(Prompt::new(
                    prompts::choose_delivery(),
                    prompts::delivery_keyboard(),
                )),
            ),
            _ => (
                SessionState::UsePoints { cart },
                Turn::single(Prompt::new(prompts::use_the_menu(), prompts::points_keyboard())),
            ),
        }
    }

    fn delivery_step(
        &self,
        cart: Cart,
        redemption: Redemption,
        text: &str,
    ) -> (SessionState, Turn) {
        if text == vocab::BACK {
            let prompt = match self.catalog.get(&cart.product_id) {
                Some(product) => {
                    Prompt::new(prompts::choose_quantity(product), prompts::quantity_keyboard())
                }
                None => Prompt::new(prompts::quantity_reprompt(), prompts::quantity_keyboard()),
            };
            return (
                SessionState::SelectingQuantity { product_id: cart.product_id },
                Turn::single(prompt),
            );
        }

        match DeliveryMethod::from_label(text) {
            Some(delivery) => (
                SessionState::OrderComment { cart, redemption, delivery },
                Turn::single(Prompt::new(prompts::comment_prompt(), prompts::comment_keyboard())),
            ),
            None => (
                SessionState::DeliveryMethod { cart, redemption },
                Turn::single(Prompt::new(
                    prompts::delivery_reprompt(),
                    prompts::delivery_keyboard(),
                )),
            ),
        }
    }

    fn comment_step(
        &self,
        cart: Cart,
        redemption: Redemption,
        delivery: DeliveryMethod,
        text: &str,
    ) -> (SessionState, Turn) {
        if text == vocab::BACK {
            return (
                SessionState::DeliveryMethod { cart, redemption },
                Turn::single(Prompt::new(
                    prompts::choose_delivery(),
                    prompts::delivery_keyboard(),
                )),
            );
        }

        let comment =
            if text == vocab::SKIP_COMMENT { None } else { Some(text.to_string()) };
        (
            SessionState::EnterUserData { cart, redemption, delivery, comment },
            Turn::single(Prompt::new(
                prompts::data_entry_prompt(delivery),
                prompts::user_data_keyboard(),
            )),
        )
    }

    fn user_data_step(
        &self,
        cart: Cart,
        redemption: Redemption,
        delivery: DeliveryMethod,
        comment: Option<String>,
        text: &str,
    ) -> (SessionState, Turn) {
        if text == vocab::BACK {
            return (
                SessionState::DeliveryMethod { cart, redemption },
                Turn::single(Prompt::new(
                    prompts::choose_delivery(),
                    prompts::delivery_keyboard(),
                )),
            );
        }

        let missing = delivery::missing_fields(delivery, text);
        if !missing.is_empty() {
            return (
                SessionState::EnterUserData { cart, redemption, delivery, comment },
                Turn::single(Prompt::new(
                    prompts::missing_fields_message(&missing),
                    prompts::user_data_keyboard(),
                )),
            );
        }

        // The order id is fixed here so a retried commit stays idempotent.
        let draft = DraftOrder {
            order_id: OrderId::generate(),
            cart,
            redemption,
            delivery,
            comment,
            recipient: text.to_string(),
        };
        let summary = prompts::confirmation_summary(&draft);
        (
            SessionState::ConfirmOrder { draft },
            Turn::single(Prompt::new(summary, prompts::confirm_keyboard())),
        )
    }

    async fn confirm_step(
        &self,
        draft: DraftOrder,
        message: &InboundMessage,
    ) -> (SessionState, Turn) {
        match message.text.trim() {
            vocab::BACK => {
                let prompt = Prompt::new(
                    prompts::data_entry_prompt(draft.delivery),
                    prompts::user_data_keyboard(),
                );
                (
                    SessionState::EnterUserData {
                        cart: draft.cart,
                        redemption: draft.redemption,
                        delivery: draft.delivery,
                        comment: draft.comment,
                    },
                    Turn::single(prompt),
                )
            }
            vocab::CANCEL => {
                // The draft is discarded; no points were debited yet, so the
                // ledger is untouched.
                info!(
                    event_name = "order.cancelled",
                    user_id = %message.user,
                    order_id = %draft.order_id.0,
                    "draft discarded at confirmation"
                );
                (
                    SessionState::MainMenu,
                    Turn::single(Prompt::new(prompts::cancelled(), prompts::main_menu_keyboard())),
                )
            }
            vocab::CONFIRM => self.commit(draft, message).await,
            _ => (
                SessionState::ConfirmOrder { draft },
                Turn::single(Prompt::new(
                    prompts::confirm_reprompt(),
                    prompts::confirm_keyboard(),
                )),
            ),
        }
    }

    async fn commit(&self, draft: DraftOrder, message: &InboundMessage) -> (SessionState, Turn) {
        let order = Order::from_draft(
            draft.clone(),
            message.user.clone(),
            message.display_name.clone(),
            Utc::now(),
        );

        if let Err(error) = self.orders.append(order.clone()).await {
            warn!(
                event_name = "order.commit.store_failed",
                user_id = %message.user,
                order_id = %order.id.0,
                error = %error,
                "order persistence failed; draft kept for retry"
            );
            return (
                SessionState::ConfirmOrder { draft },
                Turn::single(Prompt::new(prompts::commit_retry(), prompts::confirm_keyboard())),
            );
        }

        if let Err(error) = self.notifier.order_committed(&order).await {
            warn!(
                event_name = "order.commit.notify_failed",
                user_id = %message.user,
                order_id = %order.id.0,
                error = %error,
                "admin notification failed before acknowledgment; draft kept for retry"
            );
            return (
                SessionState::ConfirmOrder { draft },
                Turn::single(Prompt::new(prompts::commit_retry(), prompts::confirm_keyboard())),
            );
        }

        info!(
            event_name = "order.committed",
            user_id = %message.user,
            order_id = %order.id.0,
            final_price = %order.final_price,
            points_used = order.redemption.points_used,
            "order committed and handed to the admin channel"
        );

        let mut turn =
            Turn::single(Prompt::new(prompts::order_ack(&order), prompts::main_menu_keyboard()));

        // The ledger transaction: debit the redeemed points (clamped), credit
        // the earned points, bump spend and order count. The acknowledgment
        // above already stands, so a failure here is an operational alert,
        // not a user-facing one.
        match self.ledger.load_account(&message.user).await {
            Ok(mut account) => {
                account.debit(order.redemption.points_used);
                let earned = pricing::points_earned(order.final_price);
                account.credit(earned);
                account.record_order(order.final_price);

                match self.ledger.save_account(&message.user, account.clone()).await {
                    Ok(()) => turn.push(Prompt::bare(prompts::points_awarded(earned, &account))),
                    Err(error) => warn!(
                        event_name = "order.commit.ledger_save_failed",
                        user_id = %message.user,
                        order_id = %order.id.0,
                        error = %error,
                        "points accrual failed after acknowledgment; order stands"
                    ),
                }
            }
            Err(error) => warn!(
                event_name = "order.commit.ledger_load_failed",
                user_id = %message.user,
                order_id = %order.id.0,
                error = %error,
                "points accrual skipped after acknowledgment; order stands"
            ),
        }

        (SessionState::MainMenu, turn)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use tokio::sync::Mutex;

    use crate::catalog::Catalog;
    use crate::domain::loyalty::LoyaltyAccount;
    use crate::domain::order::Order;
    use crate::domain::UserId;
    use crate::notify::{NotifyError, OrderNotifier};
    use crate::session::prompts::vocab;
    use crate::session::state::{InboundMessage, SessionState, Turn};
    use crate::stores::{
        InMemoryLedgerStore, InMemoryOrderStore, LedgerStore, OrderStore, StoreError,
    };

    use super::ShopEngine;

    #[derive(Default)]
    struct RecordingNotifier {
        orders: Mutex<Vec<Order>>,
        fail_next: AtomicBool,
    }

    impl RecordingNotifier {
        async fn notified(&self) -> Vec<Order> {
            self.orders.lock().await.clone()
        }
    }

    #[async_trait]
    impl OrderNotifier for RecordingNotifier {
        async fn order_committed(&self, order: &Order) -> Result<(), NotifyError> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(NotifyError::ChannelUnavailable("admin chat gone".to_string()));
            }
            self.orders.lock().await.push(order.clone());
            Ok(())
        }
    }

    struct FailingLedger;

    #[async_trait]
    impl LedgerStore for FailingLedger {
        async fn load_account(&self, _user: &UserId) -> Result<LoyaltyAccount, StoreError> {
            Err(StoreError::Unavailable("ledger file unreadable".to_string()))
        }

        async fn save_account(
            &self,
            _user: &UserId,
            _account: LoyaltyAccount,
        ) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("ledger file unwritable".to_string()))
        }
    }

    struct Harness {
        engine: ShopEngine<InMemoryLedgerStore, InMemoryOrderStore, RecordingNotifier>,
        ledger: Arc<InMemoryLedgerStore>,
        orders: Arc<InMemoryOrderStore>,
        notifier: Arc<RecordingNotifier>,
        user: UserId,
    }

    fn harness() -> Harness {
        let ledger = Arc::new(InMemoryLedgerStore::default());
        let orders = Arc::new(InMemoryOrderStore::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = ShopEngine::new(
            Catalog::builtin(),
            ledger.clone(),
            orders.clone(),
            notifier.clone(),
        );
        Harness { engine, ledger, orders, notifier, user: UserId("buyer-1".to_string()) }
    }

    impl Harness {
        async fn send(&self, text: &str) -> Turn {
            self.engine.handle(InboundMessage::new(self.user.clone(), text)).await
        }

        async fn state(&self) -> SessionState {
            self.engine.current_state(&self.user).await
        }

        async fn seed_points(&self, points: i64) {
            self.ledger
                .save_account(
                    &self.user,
                    LoyaltyAccount { points, ..LoyaltyAccount::default() },
                )
                .await
                .expect("seed account");
        }

        async fn balance(&self) -> i64 {
            self.ledger.load_account(&self.user).await.expect("load account").points
        }

        /// Walks the flow up to the confirmation summary for one AirPods Pro 2.
        async fn walk_to_confirm(&self) {
            self.send(vocab::CATALOG).await;
            self.send("📁 Earbuds").await;
            self.send("AirPods Pro 2").await;
            self.send("1").await;
            if matches!(self.state().await, SessionState::UsePoints { .. }) {
                self.send(vocab::USE_POINTS).await;
            }
            self.send(DELIVERY_PICKUP).await;
            self.send(vocab::SKIP_COMMENT).await;
            self.send(PICKUP_DETAILS).await;
        }
    }

    const DELIVERY_PICKUP: &str = "🏃 Pickup";
    const PICKUP_DETAILS: &str = "Name: Ivan\nPhone: +375291234567\nPreferred time: 16:30";

    #[tokio::test]
    async fn unrecognized_main_menu_input_reprompts_without_error() {
        let h = harness();

        let turn = h.send("hello?").await;

        assert_eq!(h.state().await, SessionState::MainMenu);
        assert!(turn.messages[0].text.contains("menu buttons"));
    }

    #[tokio::test]
    async fn catalog_flow_reaches_quantity_selection() {
        let h = harness();

        h.send(vocab::CATALOG).await;
        assert_eq!(h.state().await, SessionState::Catalog { category: None });

        h.send("📁 Earbuds").await;
        assert_eq!(
            h.state().await,
            SessionState::Catalog { category: Some("Earbuds".to_string()) }
        );

        let turn = h.send("AirPods Pro 2").await;
        assert!(matches!(h.state().await, SessionState::SelectingQuantity { .. }));
        assert!(turn.messages[0].text.contains("quantity"));
    }

    #[tokio::test]
    async fn product_names_do_not_resolve_before_a_category_is_chosen() {
        let h = harness();

        h.send(vocab::CATALOG).await;
        h.send("AirPods Pro 2").await;

        assert_eq!(h.state().await, SessionState::Catalog { category: None });
    }

    #[tokio::test]
    async fn invalid_quantity_keeps_the_state() {
        let h = harness();
        h.send(vocab::CATALOG).await;
        h.send("📁 Earbuds").await;
        h.send("AirPods Pro 2").await;

        for bad in ["0", "10", "abc", "-1", "2.5"] {
            let turn = h.send(bad).await;
            assert!(
                matches!(h.state().await, SessionState::SelectingQuantity { .. }),
                "input `{bad}` should stay in quantity selection"
            );
            assert!(turn.messages[0].text.contains("1 to 9"));
        }
    }

    #[tokio::test]
    async fn zero_balance_skips_the_points_step() {
        // Scenario A: balance=0, price=65, qty=1.
        let h = harness();
        h.send(vocab::CATALOG).await;
        h.send("📁 Earbuds").await;
        h.send("AirPods Pro 2").await;

        let turn = h.send("1").await;

        match h.state().await {
            SessionState::DeliveryMethod { cart, redemption } => {
                assert_eq!(cart.base_total, Decimal::from(65));
                assert_eq!(redemption.points_used, 0);
            }
            state => panic!("expected DeliveryMethod, got {state:?}"),
        }
        assert!(turn.messages[0].text.contains("no loyalty points"));
    }

    #[tokio::test]
    async fn positive_balance_offers_the_points_step() {
        let h = harness();
        h.seed_points(1000).await;
        h.send(vocab::CATALOG).await;
        h.send("📁 Earbuds").await;
        h.send("AirPods Pro 2").await;

        let turn = h.send("1").await;

        assert!(matches!(h.state().await, SessionState::UsePoints { .. }));
        assert!(turn.messages[0].text.contains("1000 loyalty points"));
    }

    #[tokio::test]
    async fn redemption_covers_the_whole_cart_when_the_balance_allows() {
        // Scenario B: 1000 points cap at 100; cart total 65 → discount 65,
        // 650 points, final price 0.
        let h = harness();
        h.seed_points(1000).await;
        h.send(vocab::CATALOG).await;
        h.send("📁 Earbuds").await;
        h.send("AirPods Pro 2").await;
        h.send("1").await;

        h.send(vocab::USE_POINTS).await;

        match h.state().await {
            SessionState::DeliveryMethod { redemption, cart } => {
                assert_eq!(redemption.value, Decimal::from(65));
                assert_eq!(redemption.points_used, 650);
                assert_eq!(cart.base_total - redemption.value, Decimal::ZERO);
            }
            state => panic!("expected DeliveryMethod, got {state:?}"),
        }
        // Debit is deferred to commit.
        assert_eq!(h.balance().await, 1000);
    }

    #[tokio::test]
    async fn reentering_the_points_step_recomputes_from_the_live_balance() {
        let h = harness();
        h.seed_points(1000).await;
        h.send(vocab::CATALOG).await;
        h.send("📁 Earbuds").await;
        h.send("AirPods Pro 2").await;
        h.send("1").await;
        h.send(vocab::USE_POINTS).await;

        // back to quantity, forward again, redeem again
        h.send(vocab::BACK).await;
        h.send("1").await;
        h.send(vocab::USE_POINTS).await;

        match h.state().await {
            SessionState::DeliveryMethod { redemption, .. } => {
                assert_eq!(redemption.points_used, 650);
            }
            state => panic!("expected DeliveryMethod, got {state:?}"),
        }
        assert_eq!(h.balance().await, 1000);
    }

    #[tokio::test]
    async fn unknown_delivery_method_reprompts_with_the_valid_set() {
        let h = harness();
        h.send(vocab::CATALOG).await;
        h.send("📁 Earbuds").await;
        h.send("AirPods Pro 2").await;
        h.send("1").await;

        let turn = h.send("carrier pigeon").await;

        assert!(matches!(h.state().await, SessionState::DeliveryMethod { .. }));
        assert!(turn.messages[0].keyboard.iter().flatten().any(|b| b == DELIVERY_PICKUP));
    }

    #[tokio::test]
    async fn missing_postal_phone_lists_exactly_that_field() {
        // Scenario C.
        let h = harness();
        h.send(vocab::CATALOG).await;
        h.send("📁 Earbuds").await;
        h.send("AirPods Pro 2").await;
        h.send("1").await;
        h.send("📮 EuroPost").await;
        h.send(vocab::SKIP_COMMENT).await;

        let turn = h
            .send("Full name: Ivan Ivanov\nPhone:\nAddress: 5 Pushkin St\nPostal index: 220000\nBranch: #15")
            .await;

        assert!(matches!(h.state().await, SessionState::EnterUserData { .. }));
        assert!(turn.messages[0].text.contains("Phone:"));
        assert!(!turn.messages[0].text.contains("Address:"));
    }

    #[tokio::test]
    async fn free_text_comment_is_carried_into_the_draft() {
        let h = harness();
        h.send(vocab::CATALOG).await;
        h.send("📁 Earbuds").await;
        h.send("AirPods Pro 2").await;
        h.send("1").await;
        h.send(DELIVERY_PICKUP).await;
        h.send("please gift-wrap it").await;
        h.send(PICKUP_DETAILS).await;

        match h.state().await {
            SessionState::ConfirmOrder { draft } => {
                assert_eq!(draft.comment.as_deref(), Some("please gift-wrap it"));
            }
            state => panic!("expected ConfirmOrder, got {state:?}"),
        }
    }

    #[tokio::test]
    async fn cancel_discards_the_draft_and_leaves_the_ledger_alone() {
        // Scenario D: the balance stays whatever it was after the redemption
        // step: redemption never touched it.
        let h = harness();
        h.seed_points(1000).await;
        h.walk_to_confirm().await;

        let turn = h.send(vocab::CANCEL).await;

        assert_eq!(h.state().await, SessionState::MainMenu);
        assert!(turn.messages[0].text.contains("cancelled"));
        assert_eq!(h.balance().await, 1000);
        assert!(h.orders.list_all().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn commit_persists_notifies_and_settles_the_ledger() {
        // Scenario B + E combined: full redemption, then accrual on the final
        // price (0 here → 0 points earned).
        let h = harness();
        h.seed_points(1000).await;
        h.walk_to_confirm().await;

        let turn = h.send(vocab::CONFIRM).await;

        assert_eq!(h.state().await, SessionState::MainMenu);
        assert!(turn.messages[0].text.contains("Order placed"));

        let stored = h.orders.list_for_user(&h.user).await.expect("list");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].final_price, Decimal::ZERO);
        assert_eq!(stored[0].redemption.points_used, 650);
        assert_eq!(stored[0].cart.quantity, 1);

        let notified = h.notifier.notified().await;
        assert_eq!(notified.len(), 1);
        assert_eq!(notified[0].id, stored[0].id);

        let account = h.ledger.load_account(&h.user).await.expect("load");
        assert_eq!(account.points, 350);
        assert_eq!(account.orders, 1);
        assert_eq!(account.total_spent, Decimal::ZERO);
    }

    #[tokio::test]
    async fn accrual_credits_five_percent_of_the_final_price() {
        // Scenario E: final price 200 → +10 points, orders +1, spend +200.
        let h = harness();
        h.send(vocab::CATALOG).await;
        h.send("📁 Watches").await;
        h.send("Apple Watch 9").await;
        h.send("2").await;
        h.send(DELIVERY_PICKUP).await;
        h.send(vocab::SKIP_COMMENT).await;
        h.send(PICKUP_DETAILS).await;

        let turn = h.send(vocab::CONFIRM).await;

        let account = h.ledger.load_account(&h.user).await.expect("load");
        assert_eq!(account.points, 10);
        assert_eq!(account.orders, 1);
        assert_eq!(account.total_spent, Decimal::from(200));
        assert!(turn.messages.iter().any(|m| m.text.contains("+10 points")));
    }

    #[tokio::test]
    async fn committed_orders_round_trip_through_the_listing() {
        let h = harness();
        h.walk_to_confirm().await;
        h.send(vocab::CONFIRM).await;

        let turn = h.send(vocab::MY_ORDERS).await;

        let stored = h.orders.list_for_user(&h.user).await.expect("list");
        assert_eq!(stored[0].cart.product_name, "AirPods Pro 2");
        assert_eq!(stored[0].final_price, Decimal::from(65));
        assert!(turn.messages[0].text.contains(&stored[0].id.0));
    }

    #[tokio::test]
    async fn notification_failure_keeps_the_draft_retryable_without_duplicates() {
        let h = harness();
        h.walk_to_confirm().await;
        h.notifier.fail_next.store(true, Ordering::SeqCst);

        let failed = h.send(vocab::CONFIRM).await;
        assert!(matches!(h.state().await, SessionState::ConfirmOrder { .. }));
        assert!(failed.messages[0].text.contains("try"));
        assert!(h.notifier.notified().await.is_empty());

        let retried = h.send(vocab::CONFIRM).await;
        assert_eq!(h.state().await, SessionState::MainMenu);
        assert!(retried.messages[0].text.contains("Order placed"));

        // The first attempt persisted the order; the retry upserted the same
        // id, so exactly one record exists.
        assert_eq!(h.orders.list_all().await.expect("list").len(), 1);
        assert_eq!(h.notifier.notified().await.len(), 1);
    }

    #[tokio::test]
    async fn store_outage_degrades_to_an_apology_in_place() {
        let engine = ShopEngine::new(
            Catalog::builtin(),
            Arc::new(FailingLedger),
            Arc::new(InMemoryOrderStore::default()),
            Arc::new(RecordingNotifier::default()),
        );
        let user = UserId("buyer-2".to_string());

        engine.handle(InboundMessage::new(user.clone(), vocab::CATALOG)).await;
        engine.handle(InboundMessage::new(user.clone(), "📁 Earbuds")).await;
        engine.handle(InboundMessage::new(user.clone(), "AirPods Pro 2")).await;
        let turn = engine.handle(InboundMessage::new(user.clone(), "1")).await;

        assert!(matches!(
            engine.current_state(&user).await,
            SessionState::SelectingQuantity { .. }
        ));
        assert!(turn.messages[0].text.contains("temporarily unavailable"));
    }

    #[tokio::test]
    async fn back_from_confirmation_returns_to_data_entry() {
        let h = harness();
        h.walk_to_confirm().await;

        h.send(vocab::BACK).await;

        assert!(matches!(h.state().await, SessionState::EnterUserData { .. }));
    }

    #[tokio::test]
    async fn restart_resets_to_a_fresh_welcome() {
        let h = harness();
        h.send(vocab::CATALOG).await;
        h.send(vocab::MAIN_MENU).await;

        let turn = h.send(vocab::RESTART).await;

        assert_eq!(h.state().await, SessionState::MainMenu);
        assert!(turn.messages[0].text.contains("Fresh start"));
    }

    #[tokio::test]
    async fn turns_for_different_users_are_independent() {
        let h = harness();
        let other = UserId("buyer-2".to_string());

        h.send(vocab::CATALOG).await;
        h.engine.handle(InboundMessage::new(other.clone(), "hello")).await;

        assert_eq!(h.state().await, SessionState::Catalog { category: None });
        assert_eq!(h.engine.current_state(&other).await, SessionState::MainMenu);
    }
}
