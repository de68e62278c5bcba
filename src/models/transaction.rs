use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use mongodb::bson::oid::ObjectId;
use mongodb::bson;

/// Lifecycle of a push-payment transaction. `Pending` is the only
/// non-terminal state; a row makes exactly one transition out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn is_terminal(self) -> bool {
        self != TransactionStatus::Pending
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    /// Map a Daraja STK result code to a terminal status. Codes outside
    /// the known table return `None`; callers treat that as an upstream
    /// problem rather than guessing a terminal state.
    ///
    /// 0     success
    /// 1032  request cancelled by user
    /// 1037  DS timeout, user unreachable
    /// 1     insufficient balance
    /// 2001  wrong PIN / authentication error
    /// 1001  subscriber busy with another transaction
    /// 1019  transaction expired
    /// 1025  system error while sending the push
    pub fn from_result_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(TransactionStatus::Completed),
            1032 => Some(TransactionStatus::Cancelled),
            1 | 1001 | 1019 | 1025 | 1037 | 2001 => Some(TransactionStatus::Failed),
            _ => None,
        }
    }
}

/// A push-payment attempt against an order. Never deleted; the provider's
/// `CheckoutRequestID` is the sole correlation key for callbacks and
/// status queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MpesaTransaction {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub checkout_request_id: String,
    pub merchant_request_id: String,
    pub order_number: String,
    pub phone_number: String,
    pub amount: u64,
    pub status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_code: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_desc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_date: Option<DateTime<Utc>>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl MpesaTransaction {
    pub fn pending(
        checkout_request_id: String,
        merchant_request_id: String,
        order_number: String,
        phone_number: String,
        amount: u64,
    ) -> Self {
        MpesaTransaction {
            id: None,
            checkout_request_id,
            merchant_request_id,
            order_number,
            phone_number,
            amount,
            status: TransactionStatus::Pending,
            result_code: None,
            result_desc: None,
            receipt_number: None,
            transaction_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

/// Fields written by the single pending -> terminal transition.
#[derive(Debug, Clone)]
pub struct TransitionUpdate {
    pub status: TransactionStatus,
    pub result_code: i64,
    pub result_desc: String,
    pub receipt_number: Option<String>,
    pub transaction_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub checkout_request_id: String,
    pub order_number: String,
    pub phone_number: String,
    pub amount: u64,
    pub status: TransactionStatus,
    pub receipt_number: Option<String>,
    pub result_desc: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&MpesaTransaction> for TransactionResponse {
    fn from(tx: &MpesaTransaction) -> Self {
        TransactionResponse {
            checkout_request_id: tx.checkout_request_id.clone(),
            order_number: tx.order_number.clone(),
            phone_number: tx.phone_number.clone(),
            amount: tx.amount,
            status: tx.status,
            receipt_number: tx.receipt_number.clone(),
            result_desc: tx.result_desc.clone(),
            created_at: tx.created_at,
        }
    }
}

// ---- Daraja callback payload ----

#[derive(Debug, Deserialize)]
pub struct MpesaCallback {
    #[serde(rename = "Body")]
    pub body: CallbackBody,
}

#[derive(Debug, Deserialize)]
pub struct CallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,

    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,

    #[serde(rename = "ResultCode")]
    pub result_code: i64,

    #[serde(rename = "ResultDesc")]
    pub result_desc: String,

    #[serde(rename = "CallbackMetadata", default)]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item")]
    pub items: Vec<CallbackItem>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackItem {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Value", default)]
    pub value: Option<serde_json::Value>,
}

impl StkCallback {
    fn metadata_value(&self, name: &str) -> Option<&serde_json::Value> {
        self.callback_metadata
            .as_ref()?
            .items
            .iter()
            .find(|item| item.name == name)?
            .value
            .as_ref()
    }

    /// `MpesaReceiptNumber` from the callback metadata, present on success.
    pub fn receipt_number(&self) -> Option<String> {
        self.metadata_value("MpesaReceiptNumber")
            .and_then(|v| v.as_str().map(|s| s.to_string()))
    }

    /// `TransactionDate` comes as a numeric YYYYMMDDHHMMSS.
    pub fn transaction_date(&self) -> Option<DateTime<Utc>> {
        let raw = self.metadata_value("TransactionDate")?;
        let digits = match raw {
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::String(s) => s.clone(),
            _ => return None,
        };
        chrono::NaiveDateTime::parse_from_str(&digits, "%Y%m%d%H%M%S")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_is_the_only_non_terminal_state() {
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(TransactionStatus::Completed.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
        assert!(TransactionStatus::Cancelled.is_terminal());
    }

    #[test]
    fn result_code_mapping() {
        assert_eq!(
            TransactionStatus::from_result_code(0),
            Some(TransactionStatus::Completed)
        );
        assert_eq!(
            TransactionStatus::from_result_code(1032),
            Some(TransactionStatus::Cancelled)
        );
        for code in [1, 1001, 1019, 1025, 1037, 2001] {
            assert_eq!(
                TransactionStatus::from_result_code(code),
                Some(TransactionStatus::Failed),
                "code {}",
                code
            );
        }
        // Undocumented codes must not silently default to failed.
        assert_eq!(TransactionStatus::from_result_code(9999), None);
        assert_eq!(TransactionStatus::from_result_code(-1), None);
    }

    #[test]
    fn callback_metadata_extraction() {
        let raw = serde_json::json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "ws_CO_191220191020363925",
                    "ResultCode": 0,
                    "ResultDesc": "The service request is processed successfully.",
                    "CallbackMetadata": {
                        "Item": [
                            { "Name": "Amount", "Value": 10.0 },
                            { "Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV" },
                            { "Name": "TransactionDate", "Value": 20191219102115u64 },
                            { "Name": "PhoneNumber", "Value": 254708374149u64 }
                        ]
                    }
                }
            }
        });

        let callback: MpesaCallback = serde_json::from_value(raw).unwrap();
        let stk = callback.body.stk_callback;
        assert_eq!(stk.receipt_number().as_deref(), Some("NLJ7RT61SV"));
        let date = stk.transaction_date().unwrap();
        assert_eq!(date.format("%Y-%m-%d %H:%M:%S").to_string(), "2019-12-19 10:21:15");
    }

    #[test]
    fn failed_callback_has_no_metadata() {
        let raw = serde_json::json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "ws_CO_191220191020363925",
                    "ResultCode": 1032,
                    "ResultDesc": "Request cancelled by user"
                }
            }
        });

        let callback: MpesaCallback = serde_json::from_value(raw).unwrap();
        let stk = callback.body.stk_callback;
        assert_eq!(stk.receipt_number(), None);
        assert_eq!(stk.transaction_date(), None);
    }
}
