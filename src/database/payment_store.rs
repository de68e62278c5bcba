use async_trait::async_trait;
use chrono::Utc;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, Bson, DateTime as BsonDateTime};
use mongodb::options::ReturnDocument;
use mongodb::{Collection, Database};

use crate::database::is_duplicate_key;
use crate::errors::{AppError, Result};
use crate::models::order::Order;
use crate::models::transaction::{MpesaTransaction, TransactionStatus, TransitionUpdate};
use crate::services::payment_service::{OrderStore, TransactionStore};

pub struct MongoTransactionStore {
    collection: Collection<MpesaTransaction>,
}

impl MongoTransactionStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("mpesa_transactions"),
        }
    }
}

#[async_trait]
impl TransactionStore for MongoTransactionStore {
    async fn create(&self, tx: &MpesaTransaction) -> Result<()> {
        self.collection.insert_one(tx).await.map_err(|e| {
            if is_duplicate_key(&e) {
                AppError::DuplicateKey
            } else {
                AppError::MongoDB(e)
            }
        })?;
        Ok(())
    }

    async fn find_by_checkout_id(
        &self,
        checkout_request_id: &str,
    ) -> Result<Option<MpesaTransaction>> {
        let tx = self
            .collection
            .find_one(doc! { "checkout_request_id": checkout_request_id })
            .await?;
        Ok(tx)
    }

    async fn find_by_id(
        &self,
        id: &mongodb::bson::oid::ObjectId,
    ) -> Result<Option<MpesaTransaction>> {
        let tx = self.collection.find_one(doc! { "_id": *id }).await?;
        Ok(tx)
    }

    async fn transition(
        &self,
        checkout_request_id: &str,
        update: &TransitionUpdate,
    ) -> Result<Option<MpesaTransaction>> {
        // Single compare-and-set against the store; the status filter is
        // what makes concurrent callback/query reconciliation safe.
        let filter = doc! {
            "checkout_request_id": checkout_request_id,
            "status": TransactionStatus::Pending.as_str(),
        };

        let mut set = doc! {
            "status": update.status.as_str(),
            "result_code": update.result_code,
            "result_desc": update.result_desc.as_str(),
            "updated_at": BsonDateTime::from_chrono(Utc::now()),
        };
        if let Some(receipt) = &update.receipt_number {
            set.insert("receipt_number", receipt.as_str());
        }
        if let Some(date) = update.transaction_date {
            set.insert("transaction_date", Bson::String(date.to_rfc3339()));
        }

        let updated = self
            .collection
            .find_one_and_update(filter, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await?;

        Ok(updated)
    }

    async fn find_by_order(&self, order_number: &str) -> Result<Vec<MpesaTransaction>> {
        let cursor = self
            .collection
            .find(doc! { "order_number": order_number })
            .sort(doc! { "created_at": -1 })
            .await?;
        let transactions = cursor.try_collect().await?;
        Ok(transactions)
    }
}

pub struct MongoOrderStore {
    collection: Collection<Order>,
}

impl MongoOrderStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("orders"),
        }
    }
}

#[async_trait]
impl OrderStore for MongoOrderStore {
    async fn get(&self, order_number: &str) -> Result<Option<Order>> {
        let order = self
            .collection
            .find_one(doc! { "order_number": order_number })
            .await?;
        Ok(order)
    }

    async fn mark_paid(&self, order_number: &str, receipt: Option<&str>) -> Result<()> {
        let now = Utc::now();
        let mut set = doc! {
            "payment_status": "paid",
            "status": "confirmed",
            "paid_at": Bson::String(now.to_rfc3339()),
            "updated_at": BsonDateTime::from_chrono(now),
        };
        if let Some(receipt) = receipt {
            set.insert("payment_receipt", receipt);
        }

        self.collection
            .update_one(doc! { "order_number": order_number }, doc! { "$set": set })
            .await?;
        Ok(())
    }
}
