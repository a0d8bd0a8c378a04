use std::sync::Arc;

use log::*;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;

use crate::{
    config::StripeConfig,
    data_objects::{NewIntent, PaymentIntent, Refund},
    helpers::{error_message, metadata_params},
    StripeApiError,
};

#[derive(Clone)]
pub struct StripeApi {
    config: StripeConfig,
    client: Arc<Client>,
}

impl StripeApi {
    pub fn new(config: StripeConfig) -> Result<Self, StripeApiError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StripeApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url)
    }

    /// Sends a form-encoded request. Stripe does not accept JSON request bodies.
    pub async fn rest_query<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
    ) -> Result<T, StripeApiError> {
        let url = self.url(path);
        trace!("💳️ Sending {method} {url}");
        let mut req = self.client.request(method.clone(), url).bearer_auth(self.config.secret_key.reveal());
        if !params.is_empty() {
            req = if method == Method::GET { req.query(params) } else { req.form(params) };
        }
        let response = req.send().await?;
        let status = response.status();
        if status.is_success() {
            trace!("💳️ Stripe request successful. {status}");
            response.json::<T>().await.map_err(|e| StripeApiError::JsonError(e.to_string()))
        } else {
            let body = response.text().await.map_err(|e| StripeApiError::RestResponseError(e.to_string()))?;
            let message = error_message(&body);
            debug!("💳️ Stripe request failed. {status}. {message}");
            Err(StripeApiError::QueryError { status: status.as_u16(), message })
        }
    }

    pub async fn create_payment_intent(&self, intent: NewIntent) -> Result<PaymentIntent, StripeApiError> {
        let mut params = vec![
            ("amount".to_string(), intent.amount.to_string()),
            ("currency".to_string(), intent.currency),
            ("description".to_string(), intent.description),
            ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
        ];
        params.extend(metadata_params(&intent.metadata));
        debug!("💳️ Creating payment intent for {} minor units", intent.amount);
        let result = self.rest_query::<PaymentIntent>(Method::POST, "/payment_intents", &params).await?;
        info!("💳️ Created payment intent {}", result.id);
        Ok(result)
    }

    /// Fetches the intent with its latest charge expanded, so that the card details are available.
    pub async fn retrieve_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent, StripeApiError> {
        let path = format!("/payment_intents/{intent_id}");
        let params = [("expand[]".to_string(), "latest_charge".to_string())];
        debug!("💳️ Fetching payment intent {intent_id}");
        self.rest_query::<PaymentIntent>(Method::GET, &path, &params).await
    }

    /// Refunds a charge, or the intent's charge if no charge id is given. `amount` is `None` for a full refund.
    pub async fn create_refund(
        &self,
        intent_id: &str,
        charge_id: Option<&str>,
        amount: Option<i64>,
    ) -> Result<Refund, StripeApiError> {
        let mut params = match charge_id {
            Some(charge) => vec![("charge".to_string(), charge.to_string())],
            None => vec![("payment_intent".to_string(), intent_id.to_string())],
        };
        if let Some(amount) = amount {
            params.push(("amount".to_string(), amount.to_string()));
        }
        debug!("💳️ Requesting refund for {intent_id}");
        let result = self.rest_query::<Refund>(Method::POST, "/refunds", &params).await?;
        info!("💳️ Refund {} issued for {intent_id}. Amount: {}", result.id, result.amount);
        Ok(result)
    }
}
