use std::time::Duration;

use comanda_common::{helpers::env_or_default, Secret};
use log::*;

pub const DEFAULT_API_URL: &str = "https://api.stripe.com/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_WEBHOOK_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub api_url: String,
    pub secret_key: Secret<String>,
    pub webhook_secret: Secret<String>,
    /// Every API call is abandoned after this long
    pub timeout: Duration,
    /// The maximum age, in seconds, of a webhook signature timestamp
    pub webhook_tolerance: i64,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            secret_key: Secret::default(),
            webhook_secret: Secret::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            webhook_tolerance: DEFAULT_WEBHOOK_TOLERANCE_SECS,
        }
    }
}

impl StripeConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_url = std::env::var("COMANDA_STRIPE_API_URL").unwrap_or_else(|_| {
            debug!("🪛️ COMANDA_STRIPE_API_URL not set, using {DEFAULT_API_URL}");
            DEFAULT_API_URL.to_string()
        });
        let secret_key = Secret::new(std::env::var("COMANDA_STRIPE_SECRET_KEY").unwrap_or_else(|_| {
            error!("🪛️ COMANDA_STRIPE_SECRET_KEY is not set. Card payments will fail until it is configured.");
            String::default()
        }));
        let webhook_secret = Secret::new(std::env::var("COMANDA_STRIPE_WEBHOOK_SECRET").unwrap_or_else(|_| {
            error!("🪛️ COMANDA_STRIPE_WEBHOOK_SECRET is not set. Every webhook delivery will be rejected.");
            String::default()
        }));
        let timeout = Duration::from_secs(env_or_default("COMANDA_STRIPE_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS));
        let webhook_tolerance = env_or_default("COMANDA_WEBHOOK_TOLERANCE_SECS", DEFAULT_WEBHOOK_TOLERANCE_SECS);
        Self { api_url: api_url.trim_end_matches('/').to_string(), secret_key, webhook_secret, timeout, webhook_tolerance }
    }
}
