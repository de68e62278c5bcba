use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use chrono::Utc;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Collection;
use serde_json::{json, Value};

use crate::errors::{AppError, Result};
use crate::models::cart::{AddCartItem, Cart, CartItem, CartResponse, UpdateCartItem};
use crate::models::product::Product;
use crate::models::user::Claims;
use crate::state::AppState;

fn carts(state: &AppState) -> Collection<Cart> {
    state.db.collection("carts")
}

async fn load_cart(state: &AppState, claims: &Claims) -> Result<Cart> {
    let customer_id = ObjectId::parse_str(&claims.sub)?;
    let cart = carts(state)
        .find_one(doc! { "customer_id": customer_id })
        .await?
        .unwrap_or_else(|| Cart::new(customer_id));
    Ok(cart)
}

async fn save_cart(state: &AppState, cart: &mut Cart) -> Result<()> {
    cart.updated_at = Utc::now();
    carts(state)
        .replace_one(doc! { "customer_id": cart.customer_id }, &*cart)
        .upsert(true)
        .await?;
    Ok(())
}

async fn active_product(state: &AppState, product_id: &str) -> Result<Product> {
    let object_id = ObjectId::parse_str(product_id)?;
    state
        .db
        .collection::<Product>("products")
        .find_one(doc! { "_id": object_id, "is_active": true })
        .await?
        .ok_or(AppError::NotFound("Product"))
}

pub async fn get_cart(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<CartResponse>> {
    let cart = load_cart(&state, &claims).await?;
    Ok(Json(CartResponse::from(&cart)))
}

pub async fn add_item(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<AddCartItem>,
) -> Result<Json<CartResponse>> {
    if payload.quantity < 1 {
        return Err(AppError::validation("Quantity must be at least 1"));
    }

    let product = active_product(&state, &payload.product_id).await?;
    let product_id = product.id.ok_or(AppError::NotFound("Product"))?;

    let mut cart = load_cart(&state, &claims).await?;

    let requested = payload.quantity
        + cart
            .items
            .iter()
            .find(|item| item.product_id == product_id)
            .map(|item| item.quantity)
            .unwrap_or(0);
    if requested > product.stock {
        return Err(AppError::validation(format!(
            "Only {} units of {} in stock",
            product.stock, product.name
        )));
    }

    match cart
        .items
        .iter_mut()
        .find(|item| item.product_id == product_id)
    {
        Some(item) => item.quantity = requested,
        None => cart.items.push(CartItem {
            product_id,
            name: product.name.clone(),
            unit_price: product.effective_price(),
            quantity: payload.quantity,
        }),
    }

    save_cart(&state, &mut cart).await?;
    Ok(Json(CartResponse::from(&cart)))
}

pub async fn update_item(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(product_id): Path<String>,
    Json(payload): Json<UpdateCartItem>,
) -> Result<Json<CartResponse>> {
    if payload.quantity < 1 {
        return Err(AppError::validation("Quantity must be at least 1"));
    }

    let product = active_product(&state, &product_id).await?;
    if payload.quantity > product.stock {
        return Err(AppError::validation(format!(
            "Only {} units of {} in stock",
            product.stock, product.name
        )));
    }

    let object_id = ObjectId::parse_str(&product_id)?;
    let mut cart = load_cart(&state, &claims).await?;

    let item = cart
        .items
        .iter_mut()
        .find(|item| item.product_id == object_id)
        .ok_or(AppError::NotFound("Cart item"))?;
    item.quantity = payload.quantity;

    save_cart(&state, &mut cart).await?;
    Ok(Json(CartResponse::from(&cart)))
}

pub async fn remove_item(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(product_id): Path<String>,
) -> Result<Json<CartResponse>> {
    let object_id = ObjectId::parse_str(&product_id)?;
    let mut cart = load_cart(&state, &claims).await?;

    let before = cart.items.len();
    cart.items.retain(|item| item.product_id != object_id);
    if cart.items.len() == before {
        return Err(AppError::NotFound("Cart item"));
    }

    save_cart(&state, &mut cart).await?;
    Ok(Json(CartResponse::from(&cart)))
}

pub async fn clear_cart(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Value>> {
    let customer_id = ObjectId::parse_str(&claims.sub)?;
    carts(&state)
        .delete_one(doc! { "customer_id": customer_id })
        .await?;
    Ok(Json(json!({ "success": true })))
}
