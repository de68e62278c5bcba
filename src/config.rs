// src/config.rs
use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mpesa_consumer_key: String,
    pub mpesa_consumer_secret: String,
    pub mpesa_short_code: String,
    pub mpesa_passkey: String,
    pub mpesa_callback_url: String,
    pub mpesa_environment: String,
    pub mpesa_min_amount: u64,
    pub mpesa_max_amount: u64,
    pub mail_api_url: String,
    pub mail_api_key: String,
    pub mail_from: String,
    pub mail_from_name: String,
    pub jwt_secret: String,
    pub database_url: String,
    pub database_name: String,
    pub port: u16,
    pub host: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mpesa_environment =
            env::var("MPESA_ENVIRONMENT").unwrap_or_else(|_| "sandbox".to_string());

        AppConfig {
            mpesa_consumer_key: env::var("MPESA_CONSUMER_KEY")
                .expect("MPESA_CONSUMER_KEY must be set"),
            mpesa_consumer_secret: env::var("MPESA_CONSUMER_SECRET")
                .expect("MPESA_CONSUMER_SECRET must be set"),
            mpesa_short_code: env::var("MPESA_SHORT_CODE")
                .expect("MPESA_SHORT_CODE must be set"),
            mpesa_passkey: env::var("MPESA_PASSKEY")
                .expect("MPESA_PASSKEY must be set"),
            mpesa_callback_url: env::var("MPESA_CALLBACK_URL")
                .expect("MPESA_CALLBACK_URL must be set"),
            mpesa_environment,
            mpesa_min_amount: env::var("MPESA_MIN_AMOUNT")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .expect("MPESA_MIN_AMOUNT must be a number"),
            mpesa_max_amount: env::var("MPESA_MAX_AMOUNT")
                .unwrap_or_else(|_| "70000".to_string())
                .parse()
                .expect("MPESA_MAX_AMOUNT must be a number"),
            mail_api_url: env::var("MAIL_API_URL")
                .unwrap_or_else(|_| "https://api.mailersend.com/v1".to_string()),
            mail_api_key: env::var("MAIL_API_KEY").unwrap_or_default(),
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "orders@mediquip.example".to_string()),
            mail_from_name: env::var("MAIL_FROM_NAME")
                .unwrap_or_else(|_| "MediQuip".to_string()),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            database_name: env::var("DATABASE_NAME")
                .unwrap_or_else(|_| "mediquip".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("PORT must be a number"),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
        }
    }

    pub fn mpesa_base_url(&self) -> &'static str {
        if self.mpesa_environment == "production" {
            "https://api.safaricom.co.ke"
        } else {
            "https://sandbox.safaricom.co.ke"
        }
    }

    pub fn is_production(&self) -> bool {
        self.mpesa_environment == "production"
    }
}
