use std::sync::Arc;

use mongodb::Database;

use crate::services::email_service::EmailService;
use crate::services::payment_service::PaymentService;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub jwt_secret: String,
    pub payments: Arc<PaymentService>,
    pub email: Arc<EmailService>,
}

impl AppState {
    pub fn new(
        db: Database,
        jwt_secret: String,
        payments: Arc<PaymentService>,
        email: Arc<EmailService>,
    ) -> Self {
        AppState {
            db,
            jwt_secret,
            payments,
            email,
        }
    }
}
