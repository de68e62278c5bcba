use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use chrono::Utc;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Collection;
use tracing::error;

use crate::errors::{AppError, Result};
use crate::models::cart::Cart;
use crate::models::order::{CreateOrder, Order};
use crate::models::product::Product;
use crate::models::user::Claims;
use crate::state::AppState;

const SHIPPING_FLAT: f64 = 250.0;
const FREE_SHIPPING_THRESHOLD: f64 = 10_000.0;

fn orders(state: &AppState) -> Collection<Order> {
    state.db.collection("orders")
}

fn shipping_cost(subtotal: f64) -> f64 {
    if subtotal >= FREE_SHIPPING_THRESHOLD {
        0.0
    } else {
        SHIPPING_FLAT
    }
}

pub async fn create_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateOrder>,
) -> Result<Json<Order>> {
    let customer_id = ObjectId::parse_str(&claims.sub)?;

    let cart = state
        .db
        .collection::<Cart>("carts")
        .find_one(doc! { "customer_id": customer_id })
        .await?
        .ok_or(AppError::validation("Cart is empty"))?;

    if cart.is_empty() {
        return Err(AppError::validation("Cart is empty"));
    }

    let products: Collection<Product> = state.db.collection("products");
    for item in &cart.items {
        let product = products
            .find_one(doc! { "_id": item.product_id, "is_active": true })
            .await?
            .ok_or(AppError::NotFound("Product"))?;
        if item.quantity > product.stock {
            return Err(AppError::validation(format!(
                "Only {} units of {} in stock",
                product.stock, product.name
            )));
        }
    }

    let mut order = Order::from_cart(
        &cart,
        claims.email.clone(),
        payload.shipping_address,
        shipping_cost(cart.subtotal()),
    );

    let insert_result = orders(&state).insert_one(&order).await?;
    order.id = insert_result.inserted_id.as_object_id();

    for item in &cart.items {
        products
            .update_one(
                doc! { "_id": item.product_id },
                doc! { "$inc": { "stock": -item.quantity } },
            )
            .await?;
    }

    state
        .db
        .collection::<Cart>("carts")
        .delete_one(doc! { "customer_id": customer_id })
        .await?;

    if let Err(e) = state.email.send_order_confirmation(&order).await {
        error!("Order confirmation mail failed for {}: {}", order.order_number, e);
    }

    Ok(Json(order))
}

pub async fn list_orders(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Order>>> {
    let customer_id = ObjectId::parse_str(&claims.sub)?;

    let cursor = orders(&state)
        .find(doc! { "customer_id": customer_id })
        .sort(doc! { "created_at": -1 })
        .await?;
    let results: Vec<Order> = cursor.try_collect().await?;

    Ok(Json(results))
}

pub async fn get_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(order_number): Path<String>,
) -> Result<Json<Order>> {
    let order = orders(&state)
        .find_one(doc! { "order_number": order_number.as_str() })
        .await?
        .ok_or(AppError::NotFound("Order"))?;

    if order.customer_id.to_hex() != claims.sub && !claims.is_admin() {
        return Err(AppError::Forbidden);
    }

    Ok(Json(order))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(order_number): Path<String>,
) -> Result<Json<Order>> {
    let order = orders(&state)
        .find_one(doc! { "order_number": order_number.as_str() })
        .await?
        .ok_or(AppError::NotFound("Order"))?;

    if order.customer_id.to_hex() != claims.sub && !claims.is_admin() {
        return Err(AppError::Forbidden);
    }
    if !order.can_cancel() {
        return Err(AppError::validation("Order can no longer be cancelled"));
    }

    let updated = orders(&state)
        .find_one_and_update(
            // Same guard as the read so a concurrent payment can't be
            // cancelled out from under the reconciler.
            doc! {
                "order_number": order_number.as_str(),
                "status": "pending",
                "payment_status": "unpaid",
            },
            doc! { "$set": {
                "status": "cancelled",
                "updated_at": mongodb::bson::DateTime::from_chrono(Utc::now()),
            } },
        )
        .return_document(mongodb::options::ReturnDocument::After)
        .await?
        .ok_or(AppError::validation("Order can no longer be cancelled"))?;

    let products: Collection<Product> = state.db.collection("products");
    for item in &updated.items {
        products
            .update_one(
                doc! { "_id": item.product_id },
                doc! { "$inc": { "stock": item.quantity } },
            )
            .await?;
    }

    Ok(Json(updated))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipping_is_free_above_threshold() {
        assert_eq!(shipping_cost(9_999.0), SHIPPING_FLAT);
        assert_eq!(shipping_cost(10_000.0), 0.0);
        assert_eq!(shipping_cost(45_000.0), 0.0);
    }
}
