use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use chrono::Utc;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::options::ReturnDocument;
use mongodb::Collection;
use serde_json::{json, Value};
use validator::Validate;

use crate::database::is_duplicate_key;
use crate::errors::{AppError, Result};
use crate::models::product::{CreateProduct, Product, ProductQuery, UpdateProduct};
use crate::models::user::Claims;
use crate::state::AppState;

const DEFAULT_PER_PAGE: i64 = 20;
const MAX_PER_PAGE: i64 = 100;

fn products(state: &AppState) -> Collection<Product> {
    state.db.collection("products")
}

fn require_admin(claims: &Claims) -> Result<()> {
    if claims.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Value>> {
    let mut filter = doc! { "is_active": true };
    if let Some(category) = &query.category {
        filter.insert("category", category.as_str());
    }
    if let Some(search) = &query.search {
        filter.insert("name", doc! { "$regex": search.as_str(), "$options": "i" });
    }

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query
        .per_page
        .unwrap_or(DEFAULT_PER_PAGE)
        .clamp(1, MAX_PER_PAGE);

    let cursor = products(&state)
        .find(filter)
        .sort(doc! { "created_at": -1 })
        .skip((page - 1) * per_page as u64)
        .limit(per_page)
        .await?;
    let items: Vec<Product> = cursor.try_collect().await?;

    Ok(Json(json!({
        "products": items,
        "count": items.len(),
        "page": page,
        "per_page": per_page,
    })))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Product>> {
    let product = products(&state)
        .find_one(doc! { "slug": slug, "is_active": true })
        .await?
        .ok_or(AppError::NotFound("Product"))?;

    Ok(Json(product))
}

pub async fn create_product(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateProduct>,
) -> Result<Json<Product>> {
    require_admin(&claims)?;
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let mut product = Product {
        id: None,
        name: payload.name,
        slug: payload.slug,
        description: payload.description,
        category: payload.category,
        sku: payload.sku,
        price: payload.price,
        discounted_price: payload.discounted_price,
        stock: payload.stock,
        requires_prescription: payload.requires_prescription,
        is_active: true,
        images: payload.images,
        specifications: payload.specifications,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    let insert_result = products(&state).insert_one(&product).await.map_err(|e| {
        if is_duplicate_key(&e) {
            AppError::DuplicateKey
        } else {
            AppError::MongoDB(e)
        }
    })?;
    product.id = insert_result.inserted_id.as_object_id();

    Ok(Json(product))
}

pub async fn update_product(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateProduct>,
) -> Result<Json<Product>> {
    require_admin(&claims)?;

    let object_id = ObjectId::parse_str(&id)?;

    let mut set: Document = doc! { "updated_at": mongodb::bson::DateTime::from_chrono(Utc::now()) };
    if let Some(name) = payload.name {
        set.insert("name", name);
    }
    if let Some(description) = payload.description {
        set.insert("description", description);
    }
    if let Some(category) = payload.category {
        set.insert("category", category);
    }
    if let Some(price) = payload.price {
        set.insert("price", price);
    }
    if let Some(discounted_price) = payload.discounted_price {
        set.insert("discounted_price", discounted_price);
    }
    if let Some(stock) = payload.stock {
        set.insert("stock", stock);
    }
    if let Some(requires_prescription) = payload.requires_prescription {
        set.insert("requires_prescription", requires_prescription);
    }
    if let Some(is_active) = payload.is_active {
        set.insert("is_active", is_active);
    }
    if let Some(images) = payload.images {
        set.insert(
            "images",
            mongodb::bson::to_bson(&images).map_err(|e| AppError::validation(e.to_string()))?,
        );
    }
    if let Some(specifications) = payload.specifications {
        set.insert(
            "specifications",
            mongodb::bson::to_bson(&specifications)
                .map_err(|e| AppError::validation(e.to_string()))?,
        );
    }

    let product = products(&state)
        .find_one_and_update(doc! { "_id": object_id }, doc! { "$set": set })
        .return_document(ReturnDocument::After)
        .await?
        .ok_or(AppError::NotFound("Product"))?;

    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    require_admin(&claims)?;

    let object_id = ObjectId::parse_str(&id)?;

    // Soft delete; order history keeps referencing the document.
    let result = products(&state)
        .update_one(
            doc! { "_id": object_id },
            doc! { "$set": {
                "is_active": false,
                "updated_at": mongodb::bson::DateTime::from_chrono(Utc::now()),
            } },
        )
        .await?;

    if result.matched_count == 0 {
        return Err(AppError::NotFound("Product"));
    }

    Ok(Json(json!({ "success": true })))
}
