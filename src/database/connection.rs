use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Client, Database, IndexModel};
use tracing::info;

use crate::models::order::Order;
use crate::models::product::Product;
use crate::models::transaction::MpesaTransaction;
use crate::models::user::User;

pub async fn get_db_client(database_url: &str, database_name: &str) -> Database {
    let client = Client::with_uri_str(database_url)
        .await
        .expect("Failed to connect to MongoDB");

    let db = client.database(database_name);

    ensure_indexes(&db).await;
    info!("Connected to database: {}", database_name);

    db
}

/// Unique indexes back the invariants the application relies on: one
/// account per email, one catalog entry per slug/sku, one order per
/// number, and one transaction per provider checkout id.
async fn ensure_indexes(db: &Database) {
    let unique = || IndexOptions::builder().unique(true).build();

    db.collection::<User>("users")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(unique())
                .build(),
        )
        .await
        .expect("Failed to create users index");

    db.collection::<Product>("products")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "slug": 1 })
                .options(unique())
                .build(),
        )
        .await
        .expect("Failed to create products slug index");

    db.collection::<Product>("products")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "sku": 1 })
                .options(unique())
                .build(),
        )
        .await
        .expect("Failed to create products sku index");

    db.collection::<Order>("orders")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "order_number": 1 })
                .options(unique())
                .build(),
        )
        .await
        .expect("Failed to create orders index");

    db.collection::<MpesaTransaction>("mpesa_transactions")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "checkout_request_id": 1 })
                .options(unique())
                .build(),
        )
        .await
        .expect("Failed to create transactions index");
}
