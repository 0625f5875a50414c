use chrono::{DateTime, NaiveDate};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, TransactionTrait};

use crate::{
    api::invoices::find_invoice,
    database::models::payments,
    database::types::PaymentMethod,
    errors::AppError,
    services::{
        invoice_status::{record_payment, NewPayment},
        payment_webhook::ProcessorPayment,
    },
};

use super::structures::WebhookOutcome;

/// Дата оплаты из времени события, иначе сегодняшняя
pub fn payment_date(created: Option<i64>, today: NaiveDate) -> NaiveDate {
    created
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.date_naive())
        .unwrap_or(today)
}

/// Записывает оплату от процессора. Повторная доставка того же события ничего не меняет.
pub async fn apply_processor_payment(
    db: &DatabaseConnection,
    event: ProcessorPayment,
    today: NaiveDate,
) -> Result<WebhookOutcome, AppError> {
    let txn = db.begin().await?;

    let already = payments::Entity::find()
        .filter(payments::Column::ExternalId.eq(event.external_id.as_str()))
        .one(&txn)
        .await?;
    if already.is_some() {
        log::info!("Payment event {} already recorded, skipping", event.external_id);
        return Ok(WebhookOutcome::Duplicate {
            external_id: event.external_id,
        });
    }

    let invoice = find_invoice(&txn, event.organization_id, event.invoice_id).await?;
    let (payment, invoice) = record_payment(
        &txn,
        invoice,
        NewPayment {
            amount: event.amount,
            method: PaymentMethod::Card,
            paid_at: payment_date(event.created, today),
            reference: Some(event.external_id.clone()),
            external_id: Some(event.external_id),
        },
        today,
    )
    .await?;
    txn.commit().await?;

    log::info!(
        "Processor payment of {} recorded on {} (now {})",
        payment.amount,
        invoice.number,
        invoice.status
    );
    Ok(WebhookOutcome::Recorded { payment, invoice })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn recorded_payment() -> payments::Model {
        payments::Model {
            id: 5,
            organization_id: 1,
            invoice_id: 11,
            amount: dec!(412.64),
            method: PaymentMethod::Card.as_str().to_string(),
            paid_at: NaiveDate::from_ymd_opt(2026, 3, 15).unwrap(),
            reference: Some("pi_123".to_string()),
            external_id: Some("pi_123".to_string()),
            created_at: Utc.with_ymd_and_hms(2026, 3, 15, 10, 0, 0).unwrap(),
        }
    }

    #[actix_web::test]
    async fn repeated_event_is_reported_as_duplicate() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![recorded_payment()]])
            .into_connection();
        let event = ProcessorPayment {
            external_id: "pi_123".to_string(),
            organization_id: 1,
            invoice_id: 11,
            amount: dec!(412.64),
            created: None,
        };
        let today = NaiveDate::from_ymd_opt(2026, 3, 20).unwrap();

        let outcome = apply_processor_payment(&db, event, today).await.unwrap();
        match outcome {
            WebhookOutcome::Duplicate { external_id } => assert_eq!(external_id, "pi_123"),
            other => panic!("unexpected outcome {:?}", other),
        }

        let inserts = db
            .into_transaction_log()
            .iter()
            .flat_map(|t| t.statements().to_vec())
            .filter(|stmt| stmt.sql.trim_start().to_uppercase().starts_with("INSERT"))
            .count();
        assert_eq!(inserts, 0);
    }

    #[test]
    fn payment_date_prefers_event_time() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 20).unwrap();
        // 2026-03-15T10:00:00Z
        assert_eq!(
            payment_date(Some(1_773_568_800), today),
            NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
        );
        assert_eq!(payment_date(None, today), today);
    }
}
