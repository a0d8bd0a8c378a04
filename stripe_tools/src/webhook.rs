//! Verification of Stripe webhook deliveries.
//!
//! Stripe signs each delivery with the endpoint's signing secret. The `Stripe-Signature` header looks like
//! `t=1492774577,v1=5257a869...,v0=6ffbb59b...`. The signed payload is `"{t}.{raw body}"`, and each `v1` entry is the
//! hex-encoded HMAC-SHA256 of that payload. More than one `v1` entry is present while a secret is being rolled.
use hmac::{Hmac, Mac};
use log::*;
use sha2::Sha256;

use crate::{data_objects::WebhookEvent, StripeApiError};

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

type HmacSha256 = Hmac<Sha256>;

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

fn parse_header(header: &str) -> Result<SignatureHeader, StripeApiError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                let t = value
                    .parse::<i64>()
                    .map_err(|e| StripeApiError::InvalidSignature(format!("Invalid timestamp '{value}'. {e}")))?;
                timestamp = Some(t);
            },
            // Malformed entries are skipped. They can never match.
            "v1" => {
                if let Ok(sig) = hex::decode(value) {
                    signatures.push(sig);
                }
            },
            _ => {},
        }
    }
    let timestamp = timestamp.ok_or_else(|| StripeApiError::InvalidSignature("No timestamp in header".into()))?;
    if signatures.is_empty() {
        return Err(StripeApiError::InvalidSignature("No v1 signatures in header".into()));
    }
    Ok(SignatureHeader { timestamp, signatures })
}

/// Computes the hex-encoded `v1` signature for a payload.
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, StripeApiError> {
    let mac = signed_payload_mac(secret, timestamp, payload)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn signed_payload_mac(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, StripeApiError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| StripeApiError::InvalidSignature(format!("Unusable signing secret. {e}")))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Checks the signature header against the raw request body.
///
/// `now` is the current unix time in seconds. Signatures older than `tolerance` seconds are rejected.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance: i64,
    now: i64,
) -> Result<(), StripeApiError> {
    if secret.is_empty() {
        return Err(StripeApiError::InvalidSignature("No webhook signing secret is configured".into()));
    }
    let header = parse_header(header)?;
    let mac = signed_payload_mac(secret, header.timestamp, payload)?;
    let matched = header.signatures.iter().any(|sig| mac.clone().verify_slice(sig).is_ok());
    if !matched {
        return Err(StripeApiError::InvalidSignature("No signature matches the payload".into()));
    }
    let age = now - header.timestamp;
    if age > tolerance {
        warn!("🔐️ Webhook signature is {age}s old, which exceeds the {tolerance}s tolerance");
        return Err(StripeApiError::InvalidSignature(format!("Timestamp is outside the {tolerance}s tolerance")));
    }
    Ok(())
}

/// Verifies the signature and parses the event envelope.
pub fn construct_event(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance: i64,
    now: i64,
) -> Result<WebhookEvent, StripeApiError> {
    verify_signature(payload, header, secret, tolerance, now)?;
    serde_json::from_slice(payload).map_err(|e| StripeApiError::InvalidEvent(e.to_string()))
}
