use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

use crate::errors::{AppError, Result};
use crate::models::order::Order;

/// Transactional mail over an HTTP relay API. Failures are the caller's
/// problem only insofar as they choose to log them; order and payment
/// flows never fail on mail.
#[derive(Clone)]
pub struct EmailService {
    api_url: String,
    api_key: String,
    from: String,
    from_name: String,
    client: Client,
}

impl EmailService {
    pub fn new(api_url: String, api_key: String, from: String, from_name: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            api_url,
            api_key,
            from,
            from_name,
            client,
        }
    }

    async fn send(&self, to: &str, subject: &str, html: String) -> Result<()> {
        if self.api_key.is_empty() {
            warn!("Mail API key not configured, skipping '{}'", subject);
            return Ok(());
        }

        let payload = json!({
            "from": { "email": self.from, "name": self.from_name },
            "to": [{ "email": to }],
            "subject": subject,
            "html": html,
        });

        let response = self
            .client
            .post(format!("{}/email", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Mail(format!("mail API error: {}", e)))?;

        if response.status().is_success() {
            info!("Sent '{}' to {}", subject, to);
            Ok(())
        } else {
            Err(AppError::Mail(format!(
                "mail sending failed with status: {}",
                response.status()
            )))
        }
    }

    pub async fn send_order_confirmation(&self, order: &Order) -> Result<()> {
        let lines: String = order
            .items
            .iter()
            .map(|item| {
                format!(
                    "<li>{} &times; {} @ KSh {:.2}</li>",
                    item.name, item.quantity, item.unit_price
                )
            })
            .collect();

        let html = format!(
            "<h2>Order {} received</h2>\
             <p>Thank you for your order. We will notify you once payment is confirmed.</p>\
             <ul>{}</ul>\
             <p><strong>Total: KSh {:.2}</strong></p>",
            order.order_number, lines, order.total
        );

        self.send(
            &order.customer_email,
            &format!("Order confirmation - {}", order.order_number),
            html,
        )
        .await
    }

    pub async fn send_payment_received(&self, order: &Order, receipt: Option<&str>) -> Result<()> {
        let receipt_line = receipt
            .map(|r| format!("<p>M-Pesa receipt: <strong>{}</strong></p>", r))
            .unwrap_or_default();

        let html = format!(
            "<h2>Payment received for order {}</h2>\
             <p>We have received KSh {:.2}. Your order is now being prepared.</p>{}",
            order.order_number, order.total, receipt_line
        );

        self.send(
            &order.customer_email,
            &format!("Payment received - {}", order.order_number),
            html,
        )
        .await
    }
}
