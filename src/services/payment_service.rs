// services/payment_service.rs
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::models::order::{Order, OrderStatus};
use crate::models::transaction::{
    MpesaTransaction, StkCallback, TransactionStatus, TransitionUpdate,
};
use crate::services::mpesa_service::PaymentGateway;

/// Persistent home of payment transactions. The conditional `transition`
/// is the only mutation; it must be atomic against the backing store.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn create(&self, tx: &MpesaTransaction) -> Result<()>;

    async fn find_by_checkout_id(
        &self,
        checkout_request_id: &str,
    ) -> Result<Option<MpesaTransaction>>;

    async fn find_by_id(
        &self,
        id: &mongodb::bson::oid::ObjectId,
    ) -> Result<Option<MpesaTransaction>>;

    /// Apply `update` only if the row is still `pending`. Returns the
    /// updated row iff this call performed the transition.
    async fn transition(
        &self,
        checkout_request_id: &str,
        update: &TransitionUpdate,
    ) -> Result<Option<MpesaTransaction>>;

    async fn find_by_order(&self, order_number: &str) -> Result<Vec<MpesaTransaction>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get(&self, order_number: &str) -> Result<Option<Order>>;

    async fn mark_paid(&self, order_number: &str, receipt: Option<&str>) -> Result<()>;
}

/// What a reconciliation attempt did with the referenced transaction.
#[derive(Debug)]
pub enum ReconcileOutcome {
    /// This call performed the pending -> terminal transition.
    Transitioned(MpesaTransaction),
    /// A callback or query got there first; nothing was changed.
    AlreadyTerminal(MpesaTransaction),
    /// No transaction carries that checkout id.
    Unknown,
    /// The provider sent a result code outside the known table; the
    /// transaction stays pending.
    Unmapped(i64),
}

pub struct InitiatedPayment {
    pub transaction: MpesaTransaction,
    pub customer_message: String,
}

pub struct PaymentService {
    gateway: Arc<dyn PaymentGateway>,
    transactions: Arc<dyn TransactionStore>,
    orders: Arc<dyn OrderStore>,
    min_amount: u64,
    max_amount: u64,
}

impl PaymentService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        transactions: Arc<dyn TransactionStore>,
        orders: Arc<dyn OrderStore>,
        config: &AppConfig,
    ) -> Self {
        PaymentService {
            gateway,
            transactions,
            orders,
            min_amount: config.mpesa_min_amount,
            max_amount: config.mpesa_max_amount,
        }
    }

    /// Push a payment prompt for an order. Input is validated before any
    /// network traffic; a provider rejection leaves no transaction row.
    pub async fn initiate(
        &self,
        order_number: &str,
        customer_id: &str,
        phone: &str,
    ) -> Result<InitiatedPayment> {
        let phone = normalize_phone(phone)?;

        let order = self
            .orders
            .get(order_number)
            .await?
            .ok_or(AppError::NotFound("Order"))?;

        if order.customer_id.to_hex() != customer_id {
            return Err(AppError::Forbidden);
        }
        if order.is_paid() {
            return Err(AppError::validation("Order is already paid"));
        }
        if !matches!(order.status, OrderStatus::Pending) {
            return Err(AppError::validation("Order is not payable"));
        }

        let amount = order.total.round() as u64;
        if amount < self.min_amount || amount > self.max_amount {
            return Err(AppError::validation(format!(
                "Amount must be between {} and {} KES",
                self.min_amount, self.max_amount
            )));
        }

        let description = format!("Payment for order {}", order.order_number);
        let ack = self
            .gateway
            .stk_push(&phone, amount, &order.order_number, &description)
            .await?;

        let tx = MpesaTransaction::pending(
            ack.checkout_request_id,
            ack.merchant_request_id,
            order.order_number.clone(),
            phone,
            amount,
        );
        self.transactions.create(&tx).await?;

        info!(
            "Payment initiated for order {}: {}",
            order.order_number, tx.checkout_request_id
        );

        Ok(InitiatedPayment {
            transaction: tx,
            customer_message: ack.customer_message,
        })
    }

    /// Reconcile an inbound provider callback. Conflicts are recorded,
    /// never raised; the HTTP layer acknowledges regardless.
    pub async fn handle_callback(&self, callback: &StkCallback) -> Result<ReconcileOutcome> {
        let Some(status) = TransactionStatus::from_result_code(callback.result_code) else {
            warn!(
                "Unrecognized result code {} on callback for {}",
                callback.result_code, callback.checkout_request_id
            );
            return Ok(ReconcileOutcome::Unmapped(callback.result_code));
        };

        let update = TransitionUpdate {
            status,
            result_code: callback.result_code,
            result_desc: callback.result_desc.clone(),
            receipt_number: callback.receipt_number(),
            transaction_date: callback.transaction_date(),
        };

        self.apply_transition(&callback.checkout_request_id, update)
            .await
    }

    /// Resolve a transaction the callback has not reached yet. Terminal
    /// rows answer from the store; pending rows ask the provider and run
    /// through the same transition as the callback path. `identifier` is
    /// the provider's checkout id, or the internal id as a fallback for
    /// operator tooling.
    pub async fn query_status(&self, identifier: &str) -> Result<MpesaTransaction> {
        let tx = self.lookup(identifier).await?.ok_or_else(|| {
            warn!("Status query for unknown transaction {}", identifier);
            AppError::ReconciliationConflict(format!("no transaction for {}", identifier))
        })?;

        if tx.status.is_terminal() {
            return Ok(tx);
        }

        let checkout_request_id = tx.checkout_request_id.clone();
        let query = self.gateway.stk_query(&checkout_request_id).await?;
        let result_code = query.result_code_num()?;

        let Some(status) = TransactionStatus::from_result_code(result_code) else {
            return Err(AppError::upstream(format!(
                "unrecognized result code {}",
                result_code
            )));
        };

        let update = TransitionUpdate {
            status,
            result_code,
            result_desc: query.result_desc.clone(),
            receipt_number: None,
            transaction_date: None,
        };

        match self.apply_transition(&checkout_request_id, update).await? {
            ReconcileOutcome::Transitioned(tx) | ReconcileOutcome::AlreadyTerminal(tx) => Ok(tx),
            ReconcileOutcome::Unknown => Err(AppError::ReconciliationConflict(format!(
                "transaction vanished for checkout id {}",
                checkout_request_id
            ))),
            ReconcileOutcome::Unmapped(_) => unreachable!("code mapped above"),
        }
    }

    pub async fn transactions_for_order(&self, order_number: &str) -> Result<Vec<MpesaTransaction>> {
        self.transactions.find_by_order(order_number).await
    }

    async fn lookup(&self, identifier: &str) -> Result<Option<MpesaTransaction>> {
        if let Some(tx) = self.transactions.find_by_checkout_id(identifier).await? {
            return Ok(Some(tx));
        }
        if let Ok(id) = mongodb::bson::oid::ObjectId::parse_str(identifier) {
            return self.transactions.find_by_id(&id).await;
        }
        Ok(None)
    }

    /// The single pending -> terminal step shared by callbacks and status
    /// queries. The store's conditional update decides the winner; order
    /// side effects fire only for the call that actually transitioned.
    async fn apply_transition(
        &self,
        checkout_request_id: &str,
        update: TransitionUpdate,
    ) -> Result<ReconcileOutcome> {
        if let Some(tx) = self
            .transactions
            .transition(checkout_request_id, &update)
            .await?
        {
            info!(
                "Transaction {} -> {}",
                checkout_request_id,
                update.status.as_str()
            );
            if update.status == TransactionStatus::Completed {
                self.orders
                    .mark_paid(&tx.order_number, update.receipt_number.as_deref())
                    .await?;
            }
            return Ok(ReconcileOutcome::Transitioned(tx));
        }

        match self
            .transactions
            .find_by_checkout_id(checkout_request_id)
            .await?
        {
            Some(tx) => {
                info!(
                    "Transaction {} already {}, ignoring",
                    checkout_request_id,
                    tx.status.as_str()
                );
                Ok(ReconcileOutcome::AlreadyTerminal(tx))
            }
            None => {
                warn!(
                    "Reconciliation for unknown checkout id {}",
                    checkout_request_id
                );
                Ok(ReconcileOutcome::Unknown)
            }
        }
    }
}

/// Normalize a Kenyan MSISDN to the provider's 2547XX/2541XX wire format.
pub fn normalize_phone(raw: &str) -> Result<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    let phone = if digits.len() == 10 && digits.starts_with('0') {
        format!("254{}", &digits[1..])
    } else if digits.len() == 9 && (digits.starts_with('7') || digits.starts_with('1')) {
        format!("254{}", digits)
    } else {
        digits
    };

    let valid = phone.len() == 12
        && (phone.starts_with("2547") || phone.starts_with("2541"));
    if !valid {
        return Err(AppError::validation(
            "Phone number must be a valid Kenyan number",
        ));
    }

    Ok(phone)
}
