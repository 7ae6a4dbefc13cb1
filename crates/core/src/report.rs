use crate::domain::order::{Order, OrderStatus};

/// Tabular export over the order store: one row per order, newest first.

pub const REPORT_COLUMNS: [&str; 11] = [
    "id",
    "date",
    "buyer",
    "product",
    "quantity",
    "amount",
    "delivery",
    "status",
    "tracking",
    "points_used",
    "comment",
];

pub fn report_rows(orders: &[Order]) -> Vec<Vec<String>> {
    let mut sorted: Vec<&Order> = orders.iter().collect();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    sorted
        .into_iter()
        .map(|order| {
            vec![
                order.id.0.clone(),
                order.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                order.buyer_name.clone().unwrap_or_else(|| order.user_id.0.clone()),
                order.cart.product_name.clone(),
                order.cart.quantity.to_string(),
                order.final_price.to_string(),
                order.delivery.label().to_string(),
                status_cell(order),
                order.tracking_code.clone().unwrap_or_default(),
                order.redemption.points_used.to_string(),
                order.comment.clone().unwrap_or_default(),
            ]
        })
        .collect()
}

fn status_cell(order: &Order) -> String {
    match order.status {
        OrderStatus::Pending => "pending".to_string(),
        OrderStatus::Shipped => "shipped".to_string(),
        OrderStatus::Delivered => "delivered".to_string(),
    }
}

/// Renders the report as tab-separated text with a header row.
pub fn render_table(orders: &[Order]) -> String {
    let mut lines = vec![REPORT_COLUMNS.join("\t")];
    for row in report_rows(orders) {
        lines.push(row.join("\t"));
    }
    lines.join("\n")
}
