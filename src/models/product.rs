use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use mongodb::bson::oid::ObjectId;
use mongodb::bson;
use validator::Validate;

/// A medical device or consumable in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub category: String,
    pub sku: String,
    pub price: f64,
    #[serde(default)]
    pub discounted_price: Option<f64>,
    pub stock: i64,
    #[serde(default)]
    pub requires_prescription: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub specifications: HashMap<String, String>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl Product {
    /// Price a buyer actually pays, after any discount.
    pub fn effective_price(&self) -> f64 {
        match self.discounted_price {
            Some(p) if p > 0.0 && p < self.price => p,
            _ => self.price,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProduct {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub slug: String,
    pub description: String,
    #[validate(length(min = 1))]
    pub category: String,
    #[validate(length(min = 1))]
    pub sku: String,
    #[validate(range(min = 0.0))]
    pub price: f64,
    pub discounted_price: Option<f64>,
    #[validate(range(min = 0))]
    pub stock: i64,
    #[serde(default)]
    pub requires_prescription: bool,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub specifications: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub discounted_price: Option<f64>,
    pub stock: Option<i64>,
    pub requires_prescription: Option<bool>,
    pub is_active: Option<bool>,
    pub images: Option<Vec<String>>,
    pub specifications: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(price: f64, discounted: Option<f64>) -> Product {
        Product {
            id: None,
            name: "Pulse Oximeter".to_string(),
            slug: "pulse-oximeter".to_string(),
            description: "Fingertip pulse oximeter".to_string(),
            category: "diagnostics".to_string(),
            sku: "OXI-100".to_string(),
            price,
            discounted_price: discounted,
            stock: 10,
            requires_prescription: false,
            is_active: true,
            images: vec![],
            specifications: HashMap::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn effective_price_uses_discount_when_lower() {
        assert_eq!(product(2500.0, Some(1999.0)).effective_price(), 1999.0);
    }

    #[test]
    fn effective_price_ignores_bogus_discount() {
        assert_eq!(product(2500.0, Some(0.0)).effective_price(), 2500.0);
        assert_eq!(product(2500.0, Some(3000.0)).effective_price(), 2500.0);
        assert_eq!(product(2500.0, None).effective_price(), 2500.0);
    }
}
