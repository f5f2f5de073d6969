use axum::{extract::State, http::HeaderMap, http::StatusCode, response::IntoResponse};
use bytes::Bytes;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use std::sync::Arc;
use tracing::{info, warn};

use crate::services::payments::extract_webhook_refs;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// POST /api/v1/webhooks/payments
///
/// Provider callbacks are always answered 200 so the gateway does not retry
/// into a broken flow; unverifiable or malformed events are dropped after
/// logging. Without a configured secret there is nothing to verify against,
/// so every event is dropped.
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let Some(secret) = state.config.payment_webhook_secret.as_deref() else {
        warn!("payment_webhook_secret is not configured; dropping webhook event");
        return (StatusCode::OK, "ok");
    };
    let tolerance = state.config.payment_webhook_tolerance_secs;
    if !verify_signature(&headers, &body, secret, tolerance) {
        warn!("payment webhook signature verification failed");
        return (StatusCode::OK, "ok");
    }

    let json: Value = match serde_json::from_slice(&body) {
        Ok(json) => json,
        Err(e) => {
            warn!("payment webhook carried invalid json: {}", e);
            return (StatusCode::OK, "ok");
        }
    };

    let Some((payment_id, transaction_id)) = extract_webhook_refs(&json) else {
        warn!("payment webhook missing payment correlation key");
        return (StatusCode::OK, "ok");
    };

    let event_type = json.get("type").and_then(|v| v.as_str()).unwrap_or("");
    let result = match event_type {
        "payment.failed" | "charge.failed" => {
            state
                .services
                .payments
                .mark_failed(payment_id, Some(json.clone()))
                .await
                .map(|_| ())
        }
        _ => state
            .services
            .payments
            .mark_successful(payment_id, Some(transaction_id), Some(json.clone()))
            .await
            .map(|_| ()),
    };

    match result {
        Ok(()) => info!(%payment_id, event_type, "payment webhook processed"),
        Err(e) => warn!(%payment_id, "payment webhook processing failed: {}", e),
    }
    (StatusCode::OK, "ok")
}

/// Generic HMAC (`x-timestamp`/`x-signature`) or Stripe-style
/// (`Stripe-Signature: t=..,v1=..`) verification over `"{timestamp}.{body}"`.
pub(crate) fn verify_signature(
    headers: &HeaderMap,
    payload: &Bytes,
    secret: &str,
    tolerance_secs: i64,
) -> bool {
    if let (Some(ts), Some(sig)) = (headers.get("x-timestamp"), headers.get("x-signature")) {
        if let (Ok(ts), Ok(sig)) = (ts.to_str(), sig.to_str()) {
            let Ok(ts_i) = ts.parse::<i64>() else {
                return false;
            };
            let now = chrono::Utc::now().timestamp();
            if (now - ts_i).unsigned_abs() > tolerance_secs.unsigned_abs() {
                return false;
            }
            return check_hmac(ts, payload, secret, sig);
        }
    }

    if let Some(sig) = headers.get("Stripe-Signature").and_then(|h| h.to_str().ok()) {
        let mut ts = "";
        let mut v1 = "";
        for part in sig.split(',') {
            let mut it = part.split('=');
            match (it.next(), it.next()) {
                (Some("t"), Some(val)) => ts = val,
                (Some("v1"), Some(val)) => v1 = val,
                _ => {}
            }
        }
        if !ts.is_empty() && !v1.is_empty() {
            return check_hmac(ts, payload, secret, v1);
        }
    }
    false
}

fn check_hmac(timestamp: &str, payload: &Bytes, secret: &str, signature: &str) -> bool {
    let signed = format!(
        "{}.{}",
        timestamp,
        std::str::from_utf8(payload).unwrap_or("")
    );
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(signed.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());
    constant_time_eq(&expected, signature)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}
