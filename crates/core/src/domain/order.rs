use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::ProductId;
use crate::delivery::DeliveryMethod;
use crate::domain::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// A priced cart line: the selected product at a quantity in 1..=9.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u8,
    pub base_total: Decimal,
}

/// A loyalty redemption recorded against a draft. The account itself is only
/// debited at commit time; until then this is a quote against the balance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    pub points_used: i64,
    pub value: Decimal,
}

/// An order under construction. The id is assigned when the draft reaches
/// confirmation so a retried commit stays idempotent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftOrder {
    pub order_id: OrderId,
    pub cart: Cart,
    pub redemption: Redemption,
    pub delivery: DeliveryMethod,
    pub comment: Option<String>,
    pub recipient: String,
}

impl DraftOrder {
    pub fn final_price(&self) -> Decimal {
        (self.cart.base_total - self.redemption.value).max(Decimal::ZERO)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Shipped,
    Delivered,
}

impl OrderStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "🚚 In transit",
            Self::Shipped => "📤 Shipped",
            Self::Delivered => "✅ Delivered",
        }
    }
}

/// A committed, persisted order. Immutable except for the status and tracking
/// fields, which the admin bridge sets. Never deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub buyer_name: Option<String>,
    pub cart: Cart,
    pub redemption: Redemption,
    pub final_price: Decimal,
    pub delivery: DeliveryMethod,
    pub comment: Option<String>,
    pub recipient: String,
    pub status: OrderStatus,
    pub tracking_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn from_draft(
        draft: DraftOrder,
        user_id: UserId,
        buyer_name: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let final_price = draft.final_price();
        Self {
            id: draft.order_id,
            user_id,
            buyer_name,
            cart: draft.cart,
            redemption: draft.redemption,
            final_price,
            delivery: draft.delivery,
            comment: draft.comment,
            recipient: draft.recipient,
            status: OrderStatus::Pending,
            tracking_code: None,
            created_at,
        }
    }

    pub fn ship(&mut self, tracking_code: impl Into<String>) {
        self.status = OrderStatus::Shipped;
        self.tracking_code = Some(tracking_code.into());
    }

    pub fn mark_delivered(&mut self) {
        self.status = OrderStatus::Delivered;
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::catalog::ProductId;
    use crate::delivery::DeliveryMethod;
    use crate::domain::UserId;

    use super::{Cart, DraftOrder, Order, OrderId, OrderStatus, Redemption};

    fn draft(base_total: i64, redemption_value: i64, points: i64) -> DraftOrder {
        DraftOrder {
            order_id: OrderId("ord-1".to_string()),
            cart: Cart {
                product_id: ProductId("airpods_pro_2".to_string()),
                product_name: "AirPods Pro 2".to_string(),
                quantity: 1,
                base_total: Decimal::from(base_total),
            },
            redemption: Redemption {
                points_used: points,
                value: Decimal::from(redemption_value),
            },
            delivery: DeliveryMethod::Pickup,
            comment: None,
            recipient: "Name: Ivan\nPhone: +375291234567\nPreferred time: 16:30".to_string(),
        }
    }

    #[test]
    fn final_price_subtracts_redemption_value() {
        assert_eq!(draft(65, 6, 60).final_price(), Decimal::from(59));
    }

    #[test]
    fn final_price_never_goes_negative() {
        assert_eq!(draft(65, 65, 650).final_price(), Decimal::ZERO);
    }

    #[test]
    fn committed_order_snapshots_the_draft() {
        let created_at = Utc::now();
        let order =
            Order::from_draft(draft(65, 65, 650), UserId("u-1".to_string()), None, created_at);

        assert_eq!(order.id, OrderId("ord-1".to_string()));
        assert_eq!(order.final_price, Decimal::ZERO);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.tracking_code, None);
        assert_eq!(order.created_at, created_at);
    }

    #[test]
    fn shipping_attaches_the_tracking_code() {
        let mut order = Order::from_draft(draft(65, 0, 0), UserId("u-1".to_string()), None, Utc::now());

        order.ship("BY123456789");

        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(order.tracking_code.as_deref(), Some("BY123456789"));
    }
}
