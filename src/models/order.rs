use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use mongodb::bson::oid::ObjectId;
use mongodb::bson;
use uuid::Uuid;

use crate::models::cart::Cart;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ObjectId,
    pub name: String,
    pub unit_price: f64,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub postal_code: Option<String>,
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub order_number: String,
    pub customer_id: ObjectId,
    pub customer_email: String,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub subtotal: f64,
    pub shipping_cost: f64,
    pub total: f64,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_receipt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Snapshot the cart into an immutable order document.
    pub fn from_cart(
        cart: &Cart,
        customer_email: String,
        shipping_address: ShippingAddress,
        shipping_cost: f64,
    ) -> Self {
        let items: Vec<OrderItem> = cart
            .items
            .iter()
            .map(|item| OrderItem {
                product_id: item.product_id,
                name: item.name.clone(),
                unit_price: item.unit_price,
                quantity: item.quantity,
            })
            .collect();

        let subtotal = cart.subtotal();

        Order {
            id: None,
            order_number: generate_order_number(),
            customer_id: cart.customer_id,
            customer_email,
            items,
            shipping_address,
            subtotal,
            shipping_cost,
            total: subtotal + shipping_cost,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            payment_receipt: None,
            paid_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    pub fn can_cancel(&self) -> bool {
        self.status == OrderStatus::Pending && !self.is_paid()
    }
}

fn generate_order_number() -> String {
    let tail = Uuid::new_v4().simple().to_string();
    format!("ORD-{}", tail[..8].to_uppercase())
}

#[derive(Debug, Deserialize)]
pub struct CreateOrder {
    pub shipping_address: ShippingAddress,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::cart::CartItem;

    fn cart_with_items() -> Cart {
        let mut cart = Cart::new(ObjectId::new());
        cart.items.push(CartItem {
            product_id: ObjectId::new(),
            name: "Blood pressure monitor".to_string(),
            unit_price: 4500.0,
            quantity: 1,
        });
        cart.items.push(CartItem {
            product_id: ObjectId::new(),
            name: "Test strips".to_string(),
            unit_price: 300.0,
            quantity: 3,
        });
        cart
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            line1: "Moi Avenue".to_string(),
            line2: None,
            city: "Nairobi".to_string(),
            postal_code: Some("00100".to_string()),
            country: "KE".to_string(),
        }
    }

    #[test]
    fn order_snapshots_cart_totals() {
        let cart = cart_with_items();
        let order = Order::from_cart(&cart, "buyer@example.com".to_string(), address(), 250.0);

        assert_eq!(order.subtotal, 5400.0);
        assert_eq!(order.total, 5650.0);
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Unpaid);
        assert!(order.order_number.starts_with("ORD-"));
        assert_eq!(order.order_number.len(), 12);
    }

    #[test]
    fn pending_unpaid_order_can_cancel() {
        let cart = cart_with_items();
        let mut order = Order::from_cart(&cart, "buyer@example.com".to_string(), address(), 0.0);
        assert!(order.can_cancel());

        order.payment_status = PaymentStatus::Paid;
        assert!(!order.can_cancel());

        order.payment_status = PaymentStatus::Unpaid;
        order.status = OrderStatus::Cancelled;
        assert!(!order.can_cancel());
    }
}
