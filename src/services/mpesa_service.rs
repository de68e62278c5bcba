// services/mpesa_service.rs
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as base64, Engine as _};
use chrono::Utc;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::errors::{AppError, Result};

/// Outbound seam to the push-payment provider. `MpesaService` is the
/// production implementation; tests script their own.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Ask the provider to prompt the payer's device. Returns the
    /// provider's acknowledgement, including the checkout request id.
    async fn stk_push(
        &self,
        phone_number: &str,
        amount: u64,
        account_reference: &str,
        description: &str,
    ) -> Result<StkPushResponse>;

    /// Look up the current result of a previously initiated push.
    async fn stk_query(&self, checkout_request_id: &str) -> Result<StkQueryResponse>;
}

#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub expires_in: String,
}

#[derive(Debug, Serialize)]
struct StkPushApiRequest {
    #[serde(rename = "BusinessShortCode")]
    business_short_code: String,
    #[serde(rename = "Password")]
    password: String,
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "TransactionType")]
    transaction_type: String,
    #[serde(rename = "Amount")]
    amount: u64,
    #[serde(rename = "PartyA")]
    party_a: String,
    #[serde(rename = "PartyB")]
    party_b: String,
    #[serde(rename = "PhoneNumber")]
    phone_number: String,
    #[serde(rename = "CallBackURL")]
    callback_url: String,
    #[serde(rename = "AccountReference")]
    account_reference: String,
    #[serde(rename = "TransactionDesc")]
    transaction_desc: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResponseCode")]
    pub response_code: String,
    #[serde(rename = "ResponseDescription")]
    pub response_description: String,
    #[serde(rename = "CustomerMessage")]
    pub customer_message: String,
}

#[derive(Debug, Serialize)]
struct StkQueryApiRequest {
    #[serde(rename = "BusinessShortCode")]
    business_short_code: String,
    #[serde(rename = "Password")]
    password: String,
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: String,
}

/// Daraja reports the query outcome with a string `ResultCode`.
#[derive(Debug, Clone, Deserialize)]
pub struct StkQueryResponse {
    #[serde(rename = "ResponseCode")]
    pub response_code: String,
    #[serde(rename = "ResultCode")]
    pub result_code: String,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
}

impl StkQueryResponse {
    pub fn result_code_num(&self) -> Result<i64> {
        self.result_code.parse().map_err(|_| {
            AppError::upstream(format!("unparseable ResultCode: {}", self.result_code))
        })
    }
}

#[derive(Clone)]
pub struct MpesaService {
    config: AppConfig,
    client: Client,
    cached_token: Arc<RwLock<Option<(String, chrono::DateTime<Utc>)>>>,
}

impl MpesaService {
    pub fn new(config: AppConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        MpesaService {
            config,
            client,
            cached_token: Arc::new(RwLock::new(None)),
        }
    }

    fn generate_password(&self, timestamp: &str) -> String {
        let password_string = format!(
            "{}{}{}",
            self.config.mpesa_short_code, self.config.mpesa_passkey, timestamp
        );
        base64.encode(password_string)
    }

    fn invalidate_token(&self) {
        let mut cached = self.cached_token.write().unwrap();
        *cached = None;
    }

    pub async fn access_token(&self) -> Result<String> {
        {
            let cached = self.cached_token.read().unwrap();
            if let Some((token, expiry)) = cached.as_ref() {
                if *expiry > Utc::now() + chrono::Duration::minutes(5) {
                    return Ok(token.clone());
                }
            }
        }

        info!("Requesting new M-Pesa access token");
        let auth_string = format!(
            "{}:{}",
            self.config.mpesa_consumer_key, self.config.mpesa_consumer_secret
        );
        let encoded_auth = base64.encode(auth_string);

        let auth_url = format!(
            "{}/oauth/v1/generate?grant_type=client_credentials",
            self.config.mpesa_base_url()
        );

        let response = self
            .client
            .get(&auth_url)
            .header(header::AUTHORIZATION, format!("Basic {}", encoded_auth))
            .send()
            .await
            .map_err(|e| AppError::upstream(format!("token fetch failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("M-Pesa auth failed: {} - {}", status, body);
            self.invalidate_token();
            if status.is_client_error() {
                return Err(AppError::UpstreamAuth(format!(
                    "provider rejected credentials: {}",
                    status
                )));
            }
            return Err(AppError::upstream(format!("token endpoint error: {}", status)));
        }

        let auth_response: AuthResponse = response
            .json()
            .await
            .map_err(|e| AppError::upstream(format!("bad token response: {}", e)))?;

        let ttl_secs: i64 = auth_response.expires_in.parse().unwrap_or(3600);
        {
            let expiry = Utc::now() + chrono::Duration::seconds(ttl_secs);
            let mut cached = self.cached_token.write().unwrap();
            *cached = Some((auth_response.access_token.clone(), expiry));
        }

        Ok(auth_response.access_token)
    }

    /// Shared non-success handling for the authenticated STK endpoints. A
    /// 401 means the cached token went stale or credentials are bad, so
    /// the cache is dropped before the error surfaces.
    async fn stk_error(&self, endpoint: &str, response: reqwest::Response) -> AppError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        error!("{} failed: {} - {}", endpoint, status, body);
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.invalidate_token();
            return AppError::UpstreamAuth(format!("{} unauthorized", endpoint));
        }
        AppError::upstream(format!("{} error: {}", endpoint, status))
    }
}

#[async_trait]
impl PaymentGateway for MpesaService {
    async fn stk_push(
        &self,
        phone_number: &str,
        amount: u64,
        account_reference: &str,
        description: &str,
    ) -> Result<StkPushResponse> {
        info!("STK push for {} - KSh {}", phone_number, amount);

        let access_token = self.access_token().await?;
        let timestamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
        let password = self.generate_password(&timestamp);

        let stk_url = format!(
            "{}/mpesa/stkpush/v1/processrequest",
            self.config.mpesa_base_url()
        );

        let stk_request = StkPushApiRequest {
            business_short_code: self.config.mpesa_short_code.clone(),
            password,
            timestamp,
            transaction_type: "CustomerPayBillOnline".to_string(),
            amount,
            party_a: phone_number.to_string(),
            party_b: self.config.mpesa_short_code.clone(),
            phone_number: phone_number.to_string(),
            callback_url: self.config.mpesa_callback_url.clone(),
            account_reference: account_reference.to_string(),
            transaction_desc: description.to_string(),
        };

        let response = self
            .client
            .post(&stk_url)
            .header(header::AUTHORIZATION, format!("Bearer {}", access_token))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&stk_request)
            .send()
            .await
            .map_err(|e| AppError::upstream(format!("STK push failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(self.stk_error("STK push", response).await);
        }

        let stk_response: StkPushResponse = response
            .json()
            .await
            .map_err(|e| AppError::upstream(format!("bad STK push response: {}", e)))?;

        if stk_response.response_code != "0" {
            warn!(
                "STK push rejected: {} - {}",
                stk_response.response_code, stk_response.response_description
            );
            return Err(AppError::upstream(format!(
                "STK push rejected with code {}",
                stk_response.response_code
            )));
        }

        info!("STK push accepted: {}", stk_response.checkout_request_id);
        Ok(stk_response)
    }

    async fn stk_query(&self, checkout_request_id: &str) -> Result<StkQueryResponse> {
        let access_token = self.access_token().await?;
        let timestamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
        let password = self.generate_password(&timestamp);

        let query_url = format!(
            "{}/mpesa/stkpushquery/v1/query",
            self.config.mpesa_base_url()
        );

        let query_request = StkQueryApiRequest {
            business_short_code: self.config.mpesa_short_code.clone(),
            password,
            timestamp,
            checkout_request_id: checkout_request_id.to_string(),
        };

        let response = self
            .client
            .post(&query_url)
            .header(header::AUTHORIZATION, format!("Bearer {}", access_token))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&query_request)
            .send()
            .await
            .map_err(|e| AppError::upstream(format!("STK query failed: {}", e)))?;

        if !response.status().is_success() {
            // Daraja answers 500 with a retryable body while the push is
            // still in flight; either way the transaction stays pending.
            return Err(self.stk_error("STK query", response).await);
        }

        let query_response: StkQueryResponse = response
            .json()
            .await
            .map_err(|e| AppError::upstream(format!("bad STK query response: {}", e)))?;

        Ok(query_response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig {
            mpesa_consumer_key: "key".to_string(),
            mpesa_consumer_secret: "secret".to_string(),
            mpesa_short_code: "174379".to_string(),
            mpesa_passkey: "passkey".to_string(),
            mpesa_callback_url: "https://example.com/api/payments/callback".to_string(),
            mpesa_environment: "sandbox".to_string(),
            mpesa_min_amount: 1,
            mpesa_max_amount: 70000,
            mail_api_url: "https://mail.example".to_string(),
            mail_api_key: String::new(),
            mail_from: "orders@mediquip.example".to_string(),
            mail_from_name: "MediQuip".to_string(),
            jwt_secret: "test-secret".to_string(),
            database_url: "mongodb://localhost".to_string(),
            database_name: "test".to_string(),
            port: 3000,
            host: "127.0.0.1".to_string(),
        }
    }

    #[test]
    fn password_is_base64_of_shortcode_passkey_timestamp() {
        let service = MpesaService::new(test_config());
        let password = service.generate_password("20240101120000");
        let decoded = base64.decode(password).unwrap();
        assert_eq!(
            String::from_utf8(decoded).unwrap(),
            "174379passkey20240101120000"
        );
    }

    #[test]
    fn sandbox_and_production_base_urls() {
        let sandbox = test_config();
        assert_eq!(sandbox.mpesa_base_url(), "https://sandbox.safaricom.co.ke");

        let mut production = test_config();
        production.mpesa_environment = "production".to_string();
        assert_eq!(production.mpesa_base_url(), "https://api.safaricom.co.ke");
    }

    #[test]
    fn query_result_code_parses() {
        let response = StkQueryResponse {
            response_code: "0".to_string(),
            result_code: "1032".to_string(),
            result_desc: "Request cancelled by user".to_string(),
        };
        assert_eq!(response.result_code_num().unwrap(), 1032);

        let garbage = StkQueryResponse {
            response_code: "0".to_string(),
            result_code: "not-a-code".to_string(),
            result_desc: String::new(),
        };
        assert!(matches!(
            garbage.result_code_num(),
            Err(AppError::UpstreamRequest(_))
        ));
    }
}
