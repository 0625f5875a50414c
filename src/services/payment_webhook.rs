//! Подпись и разбор событий платёжного провайдера.

use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;

use crate::errors::AppError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "Payment-Signature";
/// Допустимый возраст подписи, секунды
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

fn parse_header(header: &str) -> Result<SignatureHeader, AppError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| AppError::Unauthorized("Signature header has no timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(AppError::Unauthorized(
            "Signature header has no v1 signature".to_string(),
        ));
    }
    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

/// Подпись `hex(hmac_sha256(secret, "<t>.<body>"))`
pub fn sign(secret: &str, timestamp: i64, body: &[u8]) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn verify_signature(secret: &str, header: &str, body: &[u8], now: i64) -> Result<(), AppError> {
    let parsed = parse_header(header)?;
    if now.abs_diff(parsed.timestamp) > SIGNATURE_TOLERANCE_SECS.unsigned_abs() {
        return Err(AppError::Unauthorized(
            "Signature timestamp is outside the tolerance window".to_string(),
        ));
    }

    for candidate in &parsed.signatures {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| AppError::Internal)?;
        mac.update(parsed.timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        // сравнение за постоянное время
        if mac.verify_slice(candidate).is_ok() {
            return Ok(());
        }
    }

    Err(AppError::Unauthorized("Signature mismatch".to_string()))
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created: Option<i64>,
    pub data: EventData,
}

#[derive(Debug, Deserialize)]
pub struct EventData {
    pub object: EventObject,
}

#[derive(Debug, Deserialize)]
pub struct EventObject {
    pub id: String,
    #[serde(default)]
    pub amount_received: Option<i64>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Платёж, который нужно записать по событию
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorPayment {
    pub external_id: String,
    pub organization_id: i64,
    pub invoice_id: i64,
    pub amount: Decimal,
    pub created: Option<i64>,
}

fn metadata_id(metadata: &HashMap<String, serde_json::Value>, key: &str) -> Result<i64, AppError> {
    let value = metadata
        .get(key)
        .ok_or_else(|| AppError::InvalidInput(format!("Event metadata has no `{}`", key)))?;
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| AppError::InvalidInput(format!("Event metadata `{}` is not an id", key)))
}

/// Разбирает тело события. `None` - тип события нас не интересует.
pub fn parse_event(body: &[u8]) -> Result<Option<ProcessorPayment>, AppError> {
    let event: WebhookEvent = serde_json::from_slice(body)?;
    let object = event.data.object;

    let (external_id, cents) = match event.event_type.as_str() {
        "payment_intent.succeeded" => (
            object.id.clone(),
            object.amount_received.or(object.amount),
        ),
        "checkout.session.completed" => (
            // одна оплата может прийти обоими событиями, ключ - payment_intent
            object.payment_intent.clone().unwrap_or_else(|| object.id.clone()),
            object.amount_total,
        ),
        other => {
            log::debug!("Ignoring payment event {} of type {}", event.id, other);
            return Ok(None);
        }
    };

    let cents = cents
        .ok_or_else(|| AppError::InvalidInput("Payment event has no amount".to_string()))?;
    if cents <= 0 {
        return Err(AppError::InvalidInput(
            "Payment event amount must be positive".to_string(),
        ));
    }

    Ok(Some(ProcessorPayment {
        external_id,
        organization_id: metadata_id(&object.metadata, "organization_id")?,
        invoice_id: metadata_id(&object.metadata, "invoice_id")?,
        amount: Decimal::new(cents, 2),
        created: event.created,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SECRET: &str = "whsec_test";

    fn body(event_type: &str) -> Vec<u8> {
        serde_json::json!({
            "id": "evt_1",
            "type": event_type,
            "created": 1_767_225_600,
            "data": { "object": {
                "id": "pi_123",
                "amount_received": 41264,
                "amount_total": 41264,
                "payment_intent": "pi_123",
                "metadata": { "organization_id": "1", "invoice_id": 11 }
            }}
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn accepts_valid_signature() {
        let payload = body("payment_intent.succeeded");
        let signature = sign(SECRET, 1_000, &payload).unwrap();
        let header = format!("t=1000,v1={}", signature);
        assert!(verify_signature(SECRET, &header, &payload, 1_100).is_ok());
    }

    #[test]
    fn rejects_tampered_body_and_stale_timestamp() {
        let payload = body("payment_intent.succeeded");
        let signature = sign(SECRET, 1_000, &payload).unwrap();
        let header = format!("t=1000,v1={}", signature);

        let err = verify_signature(SECRET, &header, b"{}", 1_000).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let err = verify_signature(SECRET, &header, &payload, 1_000 + 301).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let err = verify_signature("other", &header, &payload, 1_000).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn rejects_malformed_header() {
        for header in ["", "v1=abcd", "t=1000", "t=abc,v1=zz"] {
            assert!(verify_signature(SECRET, header, b"{}", 1_000).is_err(), "{}", header);
        }
    }

    #[test]
    fn extreme_timestamps_are_out_of_window() {
        let header = format!("t={},v1=00", i64::MIN);
        let err = verify_signature(SECRET, &header, b"{}", 1_000).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let header = format!("t={},v1=00", i64::MAX);
        let err = verify_signature(SECRET, &header, b"{}", -1_000).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn parses_succeeded_intent_in_cents() {
        let payment = parse_event(&body("payment_intent.succeeded")).unwrap().unwrap();
        assert_eq!(payment.external_id, "pi_123");
        assert_eq!(payment.organization_id, 1);
        assert_eq!(payment.invoice_id, 11);
        assert_eq!(payment.amount, dec!(412.64));
    }

    #[test]
    fn checkout_session_is_keyed_by_payment_intent() {
        let payment = parse_event(&body("checkout.session.completed")).unwrap().unwrap();
        assert_eq!(payment.external_id, "pi_123");
    }

    #[test]
    fn other_events_are_ignored() {
        assert!(parse_event(&body("customer.created")).unwrap().is_none());
    }
}
