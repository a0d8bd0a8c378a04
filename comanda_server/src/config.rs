use std::{env, time::Duration as StdDuration};

use chrono::Duration;
use comanda_common::{
    helpers::{env_or_default, parse_boolean_flag},
    Money,
    Secret,
};
use comanda_engine::{
    config::{DEFAULT_AMOUNT_TOLERANCE, DEFAULT_CURRENCY, DEFAULT_MINIMUM_CHARGE, DEFAULT_REWARD_RATE},
    OrderFlowConfig,
};
use log::*;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use stripe_tools::StripeConfig;

use crate::errors::ServerError;

const DEFAULT_COMANDA_HOST: &str = "127.0.0.1";
const DEFAULT_COMANDA_PORT: u16 = 8470;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/comanda.db";
const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 300;
const DEFAULT_STALE_PAYMENT_AGE_MINS: i64 = 30;
const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    /// Reward rate, minimum charge, amount tolerance and currency
    pub order_flow: OrderFlowConfig,
    pub stripe: StripeConfig,
    /// How often the reconciliation worker runs
    pub reconcile_interval: StdDuration,
    /// Pending payments older than this are re-polled by the reconciliation worker
    pub stale_payment_age: Duration,
    pub disable_reconcile_worker: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_COMANDA_HOST.to_string(),
            port: DEFAULT_COMANDA_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            auth: AuthConfig::default(),
            order_flow: OrderFlowConfig::default(),
            stripe: StripeConfig::default(),
            reconcile_interval: StdDuration::from_secs(DEFAULT_RECONCILE_INTERVAL_SECS),
            stale_payment_age: Duration::minutes(DEFAULT_STALE_PAYMENT_AGE_MINS),
            disable_reconcile_worker: false,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("COMANDA_HOST").ok().unwrap_or_else(|| DEFAULT_COMANDA_HOST.into());
        let port = env_or_default("COMANDA_PORT", DEFAULT_COMANDA_PORT);
        let database_url = env::var("COMANDA_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ COMANDA_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!("🪛️ Could not load the authentication configuration. {e}. Reverting to the default configuration.");
            AuthConfig::default()
        });
        let order_flow = order_flow_config_from_env();
        let stripe = StripeConfig::new_from_env_or_default();
        let reconcile_interval = StdDuration::from_secs(
            env_or_default("COMANDA_RECONCILE_INTERVAL_SECS", DEFAULT_RECONCILE_INTERVAL_SECS).max(1),
        );
        let stale_payment_age =
            Duration::minutes(env_or_default("COMANDA_STALE_PAYMENT_AGE_MINS", DEFAULT_STALE_PAYMENT_AGE_MINS).max(0));
        let disable_reconcile_worker =
            parse_boolean_flag(env::var("COMANDA_DISABLE_RECONCILE_WORKER").ok(), false);
        if disable_reconcile_worker {
            info!("🪛️ The payment reconciliation worker is disabled.");
        }
        Self {
            host,
            port,
            database_url,
            auth,
            order_flow,
            stripe,
            reconcile_interval,
            stale_payment_age,
            disable_reconcile_worker,
        }
    }
}

fn order_flow_config_from_env() -> OrderFlowConfig {
    let positive_or_default = |name: &str, default: Money| {
        let value = env_or_default(name, default);
        if value.is_positive() {
            value
        } else {
            warn!("🪛️ {name} must be positive. Using the default, {default}, instead.");
            default
        }
    };
    let reward_rate = positive_or_default("COMANDA_POINTS_REWARD_RATE", DEFAULT_REWARD_RATE);
    let minimum_charge = positive_or_default("COMANDA_MINIMUM_CHARGE", DEFAULT_MINIMUM_CHARGE);
    let amount_tolerance = env_or_default("COMANDA_AMOUNT_TOLERANCE", DEFAULT_AMOUNT_TOLERANCE).max(Money::default());
    let currency = env::var("COMANDA_CURRENCY")
        .map(|s| s.trim().to_lowercase())
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
    info!(
        "🪛️ One loyalty point per {reward_rate}. Minimum charge {minimum_charge} {currency}. Amount tolerance \
         {amount_tolerance}."
    );
    OrderFlowConfig { reward_rate, minimum_charge, amount_tolerance, currency }
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HS256 secret that bearer tokens are signed with.
    pub jwt_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The JWT secret has not been set. I'm using a random value for this session. Every token issued \
             before a restart will be rejected. DO NOT operate on production like this. 🚨️🚨️🚨️"
        );
        let secret = thread_rng().sample_iter(&Alphanumeric).take(64).map(char::from).collect::<String>();
        Self { jwt_secret: Secret::new(secret) }
    }
}

impl AuthConfig {
    pub fn new(secret: &str) -> Self {
        Self { jwt_secret: Secret::new(secret.to_string()) }
    }

    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret = env::var("COMANDA_JWT_SECRET")
            .map_err(|e| ServerError::ConfigurationError(format!("{e} [COMANDA_JWT_SECRET]")))?;
        if secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ServerError::ConfigurationError(format!(
                "COMANDA_JWT_SECRET must be at least {MIN_JWT_SECRET_LENGTH} characters long"
            )));
        }
        Ok(Self::new(&secret))
    }
}
