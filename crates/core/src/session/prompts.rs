//! Message and keyboard builders for every conversation state. The
//! quick-reply vocabulary is fixed per state; free text is only expected at
//! quantity selection, the order comment, and delivery-detail entry.

use rust_decimal::Decimal;

use crate::catalog::Product;
use crate::delivery::{self, DeliveryMethod, ALL_METHODS};
use crate::domain::loyalty::LoyaltyAccount;
use crate::domain::order::{DraftOrder, Order};
use crate::pricing::{MAX_QUANTITY, MIN_QUANTITY};

pub mod vocab {
    pub const CATALOG: &str = "🛍 Catalog";
    pub const LOYALTY: &str = "🎁 Loyalty program";
    pub const MY_ORDERS: &str = "📦 My orders";
    pub const FAQ: &str = "❓ FAQ";
    pub const DELIVERY_INFO: &str = "🚚 Delivery";
    pub const RESTART: &str = "🔄 Restart";
    pub const BACK: &str = "◀️ Back";
    pub const MAIN_MENU: &str = "◀️ Main menu";
    pub const USE_POINTS: &str = "✅ Use points";
    pub const SKIP_POINTS: &str = "❌ Keep points";
    pub const SKIP_COMMENT: &str = "Skip";
    pub const CONFIRM: &str = "✅ Place order";
    pub const CANCEL: &str = "❌ Cancel";
}

const DIVIDER: &str = "━━━━━━━━━━━━━━━";

pub fn main_menu_keyboard() -> Vec<Vec<String>> {
    vec![
        vec![vocab::CATALOG.to_string()],
        vec![vocab::LOYALTY.to_string(), vocab::MY_ORDERS.to_string()],
        vec![vocab::FAQ.to_string(), vocab::DELIVERY_INFO.to_string()],
        vec![vocab::RESTART.to_string()],
    ]
}

pub fn categories_keyboard(categories: &[&str]) -> Vec<Vec<String>> {
    let mut keyboard: Vec<Vec<String>> =
        categories.iter().map(|category| vec![format!("📁 {category}")]).collect();
    keyboard.push(vec![vocab::MAIN_MENU.to_string()]);
    keyboard
}

pub fn products_keyboard(products: &[&Product]) -> Vec<Vec<String>> {
    let mut keyboard: Vec<Vec<String>> =
        products.iter().map(|product| vec![product.name.clone()]).collect();
    keyboard.push(vec![vocab::BACK.to_string()]);
    keyboard.push(vec![vocab::MAIN_MENU.to_string()]);
    keyboard
}

pub fn quantity_keyboard() -> Vec<Vec<String>> {
    let mut keyboard: Vec<Vec<String>> = (MIN_QUANTITY..=MAX_QUANTITY)
        .collect::<Vec<_>>()
        .chunks(3)
        .map(|row| row.iter().map(u8::to_string).collect())
        .collect();
    keyboard.push(vec![vocab::BACK.to_string()]);
    keyboard
}

pub fn points_keyboard() -> Vec<Vec<String>> {
    vec![
        vec![vocab::USE_POINTS.to_string(), vocab::SKIP_POINTS.to_string()],
        vec![vocab::BACK.to_string()],
    ]
}

pub fn delivery_keyboard() -> Vec<Vec<String>> {
    let mut keyboard: Vec<Vec<String>> =
        ALL_METHODS.iter().map(|method| vec![method.label().to_string()]).collect();
    keyboard.push(vec![vocab::BACK.to_string()]);
    keyboard
}

pub fn comment_keyboard() -> Vec<Vec<String>> {
    vec![vec![vocab::SKIP_COMMENT.to_string()], vec![vocab::BACK.to_string()]]
}

pub fn user_data_keyboard() -> Vec<Vec<String>> {
    vec![vec![vocab::BACK.to_string()]]
}

pub fn confirm_keyboard() -> Vec<Vec<String>> {
    vec![
        vec![vocab::CONFIRM.to_string()],
        vec![vocab::CANCEL.to_string(), vocab::BACK.to_string()],
    ]
}

pub fn back_to_main_keyboard() -> Vec<Vec<String>> {
    vec![vec![vocab::MAIN_MENU.to_string()]]
}

pub fn welcome(restarted: bool) -> String {
    let heading = if restarted { "🔄 Fresh start!\n\n" } else { "Hi there 👋\n\n" };
    format!(
        "{heading}🌐 We are a retail storefront, online 24/7.\n\n\
         • Solid quality\n\
         • Nationwide shipping\n\
         • Same-day dispatch\n\
         • Payment on receipt\n\n\
         Pick an option from the menu below."
    )
}

pub fn use_the_menu() -> String {
    "Please use the menu buttons".to_string()
}

pub fn choose_category() -> String {
    "Choose a product category:".to_string()
}

pub fn format_product(product: &Product) -> String {
    let mut text = format!("📱 {}\n💰 Price: {}", product.name, product.price);
    if let Some(old_price) = product.old_price {
        text.push_str(&format!(" (was {old_price})"));
    }
    if let Some(description) = &product.description {
        text.push_str(&format!("\n\n{description}"));
    }
    if let Some(bonus) = &product.bonus {
        text.push_str(&format!("\n{bonus}"));
    }
    text
}

pub fn category_listing(category: &str, products: &[&Product]) -> String {
    let body: Vec<String> = products.iter().map(|product| format_product(product)).collect();
    format!("📁 Category: {category}\n\n{}", body.join("\n\n"))
}

pub fn empty_category() -> String {
    "No products in this category yet".to_string()
}

pub fn choose_quantity(product: &Product) -> String {
    format!("Choose a quantity for {}:", product.name)
}

pub fn quantity_reprompt() -> String {
    format!("🔢 Please choose a quantity from {MIN_QUANTITY} to {MAX_QUANTITY}:")
}

pub fn cart_summary(product: &Product, quantity: u8, base_total: Decimal) -> String {
    format!(
        "🛍 Your order:\n{DIVIDER}\n📱 Product: {}\n📦 Quantity: {quantity}\n💰 Total: {base_total}\n{DIVIDER}",
        product.name
    )
}

pub fn points_offer(points: i64, value: Decimal) -> String {
    format!(
        "🎁 You have {points} loyalty points!\n💫 They cover up to {value} of this order.\n\
         Would you like to spend them?"
    )
}

pub fn no_points_hint() -> String {
    "ℹ️ You have no loyalty points yet.".to_string()
}

pub fn redemption_applied(base_total: Decimal, value: Decimal, points_used: i64, final_price: Decimal) -> String {
    format!(
        "💫 Points applied!\n\nOriginal total: {base_total}\nPoints discount: {value}\n\
         Points spent: {points_used}\nFinal total: {final_price}"
    )
}

pub fn choose_delivery() -> String {
    "✨ Choose a delivery method:".to_string()
}

pub fn delivery_reprompt() -> String {
    "❌ Please pick one of the listed delivery methods:".to_string()
}

pub fn comment_prompt() -> String {
    format!("📝 Add a comment to the order, or press {}.", vocab::SKIP_COMMENT)
}

pub fn data_entry_prompt(method: DeliveryMethod) -> String {
    format!(
        "📋 Please provide your details in this format:\n\n{}\n\n\
         📝 Example:\n{DIVIDER}\n{}\n{DIVIDER}\n\n\
         ✨ Copy the format above and fill in your own details",
        delivery::entry_template(method),
        method.example()
    )
}

pub fn missing_fields_message(missing: &[&str]) -> String {
    let listing: Vec<String> = missing.iter().map(|label| format!("{label}:")).collect();
    format!(
        "❌ Some required details are missing or empty:\n\n{}\n\n\
         ✨ Copy the format from above and fill in every field",
        listing.join("\n")
    )
}

pub fn confirmation_summary(draft: &DraftOrder) -> String {
    let comment = match &draft.comment {
        Some(comment) => format!("💬 Comment: {comment}\n"),
        None => String::new(),
    };
    format!(
        "📋 Order confirmation:\n{DIVIDER}\n📱 Product: {}\n📦 Quantity: {}\n\
         🚚 Delivery: {}\n{comment}💰 Final total: {}\n\n\
         👤 Recipient details:\n{}\n{DIVIDER}\n\n✅ Please confirm the order",
        draft.cart.product_name,
        draft.cart.quantity,
        draft.delivery.label(),
        draft.final_price(),
        draft.recipient
    )
}

pub fn confirm_reprompt() -> String {
    "❌ Please confirm or cancel the order".to_string()
}

pub fn cancelled() -> String {
    "❌ Order cancelled. Back to the main menu.".to_string()
}

pub fn order_ack(order: &Order) -> String {
    format!(
        "✅ Order placed!\n{DIVIDER}\n\n📋 Order details:\n• Product: {}\n• Quantity: {}\n\
         • Total: {}\n\n🚚 Status:\n• Accepted for processing\n\n👤 What happens next:\n\
         • Our manager will review the order\n• You will be contacted to confirm\n\
         • Payment details follow\n\n💫 Thank you for your purchase!\n{DIVIDER}",
        order.cart.product_name, order.cart.quantity, order.final_price
    )
}

pub fn points_awarded(earned: i64, account: &LoyaltyAccount) -> String {
    let value = Decimal::from(account.points) * Decimal::new(1, 1);
    format!(
        "🎁 Loyalty points awarded!\n{DIVIDER}\n\n✨ For this order: +{earned} points\n\
         💎 Balance: {} points\n💵 Worth: {value}\n\n💫 Spend them on your next order!\n{DIVIDER}",
        account.points
    )
}

pub fn loyalty_view(account: &LoyaltyAccount) -> String {
    let value = Decimal::from(account.points) * Decimal::new(1, 1);
    format!(
        "🎁 Loyalty program\n{DIVIDER}\n\n💎 Your points: {}\n💵 Worth: {value}\n\
         💰 Lifetime spend: {}\n📦 Orders placed: {}\n\n📋 How it works:\n\
         • 5% of every purchase comes back as points\n• 1 point = 0.1 of discount\n\
         • Points apply to any order, up to 100% of the total\n{DIVIDER}",
        account.points, account.total_spent, account.orders
    )
}

pub fn orders_view(orders: &[Order]) -> String {
    if orders.is_empty() {
        return "You have no orders yet.".to_string();
    }

    let mut text = "📦 Your orders:\n\n".to_string();
    for order in orders {
        text.push_str(&format!(
            "🆔 Order: {}\n📅 Date: {}\n💰 Total: {}\n📦 Status: {}\n",
            order.id.0,
            order.created_at.format("%Y-%m-%d %H:%M:%S"),
            order.final_price,
            order.status.label()
        ));
        if let Some(code) = &order.tracking_code {
            text.push_str(&format!("📤 Tracking code: {code}\n"));
        }
        text.push('\n');
    }
    text
}

pub fn faq_view() -> String {
    "❓ Frequently asked questions\n\n\
     1️⃣ How do I reach a manager?\n• Message the shop contact\n\n\
     2️⃣ Which delivery methods are available?\n• EuroPost\n• BelPost\n• Shuttle\n• Pickup\n\n\
     3️⃣ How does the loyalty program work?\n• Every purchase earns points\n\
     • 1 point = 0.1 of discount\n• Points apply at checkout\n\n\
     4️⃣ Is there a warranty?\n• Yes, on every product\n• Defective items are replaced\n\
     • Inspect the goods on receipt\n\n\
     5️⃣ Which payment methods?\n• Cash on delivery\n• Card transfer\n• Cash on receipt"
        .to_string()
}

pub fn delivery_info_view() -> String {
    let mut text = "🚚 Delivery methods\n\n".to_string();
    for method in ALL_METHODS {
        text.push_str(&format!("{}\n{}\n\n", method.label(), method.details()));
    }
    text.push_str(
        "ℹ️ Good to know:\n• Every parcel ships with payment on receipt\n\
         • Inspect the goods when they arrive\n• Defective items are replaced\n\
         • Parcels are trackable by code",
    );
    text
}

pub fn commit_retry() -> String {
    "⚠️ We could not place the order just now. Your draft is saved, please try confirming again in a moment."
        .to_string()
}
