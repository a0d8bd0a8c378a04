use std::collections::HashMap;

/// Flattens metadata into Stripe's bracketed form-encoding, e.g. `metadata[orderId]=42`. Keys are sorted so that
/// requests are reproducible.
pub fn metadata_params(metadata: &HashMap<String, String>) -> Vec<(String, String)> {
    let mut params = metadata.iter().map(|(k, v)| (format!("metadata[{k}]"), v.clone())).collect::<Vec<_>>();
    params.sort();
    params
}

/// Stripe responds to errors with `{"error": {"message": "..."}}`. Fall back to the raw body when it doesn't.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.to_string())
}
