use actix_web::{HttpRequest, HttpResponse, post, web};
use chrono::Utc;

use crate::{
    app_state::AppState,
    errors::AppError,
    services::payment_webhook::{self as webhook_service, SIGNATURE_HEADER},
};

use super::functions::apply_processor_payment;
use super::structures::WebhookOutcome;

/// Уведомления платёжного процессора. Тело проверяется по HMAC-подписи.
#[utoipa::path(
    post,
    path = "/api/webhooks/payments",
    tag = "Webhooks",
    params(("Payment-Signature" = String, Header, description = "t=<unix>,v1=<hex hmac-sha256>")),
    request_body(content = Object, description = "Processor event", content_type = "application/json"),
    responses(
        (status = 200, description = "Event processed", body = WebhookOutcome),
        (status = 401, description = "Missing or invalid signature"),
        (status = 404, description = "Invoice not found"),
        (status = 409, description = "Invoice cannot receive payments")
    )
)]
#[post("/payments")]
pub async fn payment_webhook(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let secret = app_state
        .config
        .payment_webhook_secret
        .as_deref()
        .ok_or_else(|| {
            log::error!("Payment webhook called but PAYMENT_WEBHOOK_SECRET is not set");
            AppError::Unauthorized("Payment webhooks are not enabled".to_string())
        })?;

    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized(format!("Missing {} header", SIGNATURE_HEADER)))?;

    webhook_service::verify_signature(secret, signature, &body, Utc::now().timestamp())?;

    let outcome = match webhook_service::parse_event(&body)? {
        Some(event) => {
            apply_processor_payment(&app_state.db, event, app_state.config.today()).await?
        }
        None => {
            log::debug!("Payment webhook event ignored");
            WebhookOutcome::Ignored
        }
    };

    Ok(HttpResponse::Ok().json(outcome))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/webhooks").service(payment_webhook));
}
