use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use mongodb::bson::oid::ObjectId;
use mongodb::bson;

/// One open cart per customer; lines embed a price snapshot so the cart
/// keeps displaying what the buyer saw even if the catalog changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub customer_id: ObjectId,
    #[serde(default)]
    pub items: Vec<CartItem>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ObjectId,
    pub name: String,
    pub unit_price: f64,
    pub quantity: i64,
}

impl Cart {
    pub fn new(customer_id: ObjectId) -> Self {
        Cart {
            id: None,
            customer_id,
            items: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub fn subtotal(&self) -> f64 {
        self.items
            .iter()
            .map(|item| item.unit_price * item.quantity as f64)
            .sum()
    }

    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Deserialize)]
pub struct AddCartItem {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCartItem {
    pub quantity: i64,
}

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub items: Vec<CartItem>,
    pub item_count: i64,
    pub subtotal: f64,
}

impl From<&Cart> for CartResponse {
    fn from(cart: &Cart) -> Self {
        CartResponse {
            items: cart.items.clone(),
            item_count: cart.item_count(),
            subtotal: cart.subtotal(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtotal_sums_line_totals() {
        let mut cart = Cart::new(ObjectId::new());
        cart.items.push(CartItem {
            product_id: ObjectId::new(),
            name: "Thermometer".to_string(),
            unit_price: 850.0,
            quantity: 2,
        });
        cart.items.push(CartItem {
            product_id: ObjectId::new(),
            name: "Nitrile gloves".to_string(),
            unit_price: 1200.0,
            quantity: 1,
        });

        assert_eq!(cart.subtotal(), 2900.0);
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn empty_cart() {
        let cart = Cart::new(ObjectId::new());
        assert!(cart.is_empty());
        assert_eq!(cart.subtotal(), 0.0);
    }
}
