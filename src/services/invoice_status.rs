//! Статус счёта после оплат и просрочки.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter,
    QuerySelect, Set,
};

use crate::database::models::{invoices, payments};
use crate::database::types::{InvoiceStatus, PaymentMethod};
use crate::errors::AppError;
use crate::services::invoice_totals::round_money;

/// Статус выставленного счёта по сумме оплат
pub fn status_for_payments(
    current: InvoiceStatus,
    paid: Decimal,
    total_ttc: Decimal,
    due_date: NaiveDate,
    today: NaiveDate,
) -> InvoiceStatus {
    if current == InvoiceStatus::Draft {
        return current;
    }
    if paid >= total_ttc {
        InvoiceStatus::Paid
    } else if paid > Decimal::ZERO {
        InvoiceStatus::PartiallyPaid
    } else if due_date < today {
        InvoiceStatus::Overdue
    } else {
        InvoiceStatus::Sent
    }
}

pub async fn paid_total<C: ConnectionTrait>(db: &C, invoice_id: i64) -> Result<Decimal, AppError> {
    let amounts: Vec<Decimal> = payments::Entity::find()
        .select_only()
        .column(payments::Column::Amount)
        .filter(payments::Column::InvoiceId.eq(invoice_id))
        .into_tuple()
        .all(db)
        .await?;
    Ok(amounts.into_iter().sum())
}

/// Пересчитывает статус по оплатам и сохраняет счёт, если что-то изменилось
pub async fn refresh_payment_status<C: ConnectionTrait>(
    db: &C,
    invoice: invoices::Model,
    today: NaiveDate,
) -> Result<invoices::Model, AppError> {
    let current: InvoiceStatus = invoice.status.parse()?;
    let paid = paid_total(db, invoice.id).await?;
    let next = status_for_payments(current, paid, invoice.total_ttc, invoice.due_date, today);

    if next == current {
        return Ok(invoice);
    }

    log::info!(
        "Invoice {} status {} -> {} (paid {} of {})",
        invoice.number,
        current,
        next,
        paid,
        invoice.total_ttc
    );

    let mut active = invoice.into_active_model();
    active.status = Set(next.as_str().to_string());
    active.paid_at = Set(if next == InvoiceStatus::Paid {
        Some(Utc::now())
    } else {
        None
    });
    active.updated_at = Set(Some(Utc::now()));
    Ok(active.update(db).await?)
}

pub struct NewPayment {
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub paid_at: NaiveDate,
    pub reference: Option<String>,
    pub external_id: Option<String>,
}

/// Записывает оплату и обновляет статус счёта. Вызывать внутри транзакции.
pub async fn record_payment<C: ConnectionTrait>(
    db: &C,
    invoice: invoices::Model,
    payment: NewPayment,
    today: NaiveDate,
) -> Result<(payments::Model, invoices::Model), AppError> {
    let status: InvoiceStatus = invoice.status.parse()?;
    if status == InvoiceStatus::Draft {
        return Err(AppError::Conflict(format!(
            "Invoice {} is a draft and cannot receive payments",
            invoice.number
        )));
    }
    if payment.amount <= Decimal::ZERO {
        return Err(AppError::InvalidInput(
            "Payment amount must be positive".to_string(),
        ));
    }

    let saved = payments::ActiveModel {
        organization_id: Set(invoice.organization_id),
        invoice_id: Set(invoice.id),
        amount: Set(round_money(payment.amount)),
        method: Set(payment.method.as_str().to_string()),
        paid_at: Set(payment.paid_at),
        reference: Set(payment.reference),
        external_id: Set(payment.external_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let invoice = refresh_payment_status(db, invoice, today).await?;
    Ok((saved, invoice))
}

/// Переводит просроченные `sent` счета в `overdue`. `None` - по всем организациям.
pub async fn mark_overdue<C: ConnectionTrait>(
    db: &C,
    organization_id: Option<i64>,
    today: NaiveDate,
) -> Result<u64, AppError> {
    let mut update = invoices::Entity::update_many()
        .col_expr(
            invoices::Column::Status,
            Expr::value(InvoiceStatus::Overdue.as_str()),
        )
        .col_expr(invoices::Column::UpdatedAt, Expr::value(Some(Utc::now())))
        .filter(invoices::Column::Status.eq(InvoiceStatus::Sent.as_str()))
        .filter(invoices::Column::DueDate.lt(today));
    if let Some(org_id) = organization_id {
        update = update.filter(invoices::Column::OrganizationId.eq(org_id));
    }

    let result = update.exec(db).await?;
    if result.rows_affected > 0 {
        log::info!("Marked {} invoices as overdue", result.rows_affected);
    }
    Ok(result.rows_affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use chrono::TimeZone;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};
    use std::collections::BTreeMap;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn full_payment_marks_paid() {
        let status = status_for_payments(
            InvoiceStatus::Sent,
            dec!(412.64),
            dec!(412.64),
            date(31),
            date(10),
        );
        assert_eq!(status, InvoiceStatus::Paid);

        let overpaid =
            status_for_payments(InvoiceStatus::Overdue, dec!(500), dec!(412.64), date(1), date(10));
        assert_eq!(overpaid, InvoiceStatus::Paid);
    }

    #[test]
    fn partial_payment_stays_partial_even_when_late() {
        let status =
            status_for_payments(InvoiceStatus::Overdue, dec!(100), dec!(412.64), date(1), date(10));
        assert_eq!(status, InvoiceStatus::PartiallyPaid);
    }

    #[test]
    fn removing_all_payments_goes_back_to_sent_or_overdue() {
        let on_time =
            status_for_payments(InvoiceStatus::Paid, dec!(0), dec!(412.64), date(31), date(10));
        assert_eq!(on_time, InvoiceStatus::Sent);
        let late = status_for_payments(InvoiceStatus::Paid, dec!(0), dec!(412.64), date(5), date(10));
        assert_eq!(late, InvoiceStatus::Overdue);
    }

    #[test]
    fn drafts_are_left_alone() {
        let status =
            status_for_payments(InvoiceStatus::Draft, dec!(412.64), dec!(412.64), date(31), date(10));
        assert_eq!(status, InvoiceStatus::Draft);
    }

    #[actix_web::test]
    async fn overdue_sweep_reports_affected_rows() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 3,
            }])
            .into_connection();

        let affected = mark_overdue(&db, Some(1), date(10)).await.unwrap();
        assert_eq!(affected, 3);
    }

    #[actix_web::test]
    async fn payment_amount_is_rounded_half_away_from_zero() {
        let invoice = invoices::Model {
            id: 11,
            organization_id: 1,
            customer_id: 7,
            number: "FAC-0011".to_string(),
            status: InvoiceStatus::PartiallyPaid.as_str().to_string(),
            issue_date: date(1),
            due_date: date(31),
            total_ht: dec!(100.00),
            total_vat: dec!(20.00),
            total_ttc: dec!(120.00),
            notes: None,
            sent_at: None,
            paid_at: None,
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            updated_at: None,
        };
        let stored = payments::Model {
            id: 3,
            organization_id: 1,
            invoice_id: 11,
            amount: dec!(10.13),
            method: PaymentMethod::Transfer.as_str().to_string(),
            paid_at: date(10),
            reference: None,
            external_id: None,
            created_at: Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap(),
        };
        let paid_rows = vec![BTreeMap::from([(
            "amount".to_string(),
            Value::Decimal(Some(Box::new(dec!(30.13)))),
        )])];
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![stored]])
            .append_query_results([paid_rows])
            .into_connection();

        let payment = NewPayment {
            amount: dec!(10.125),
            method: PaymentMethod::Transfer,
            paid_at: date(10),
            reference: None,
            external_id: None,
        };
        let (_, invoice) = record_payment(&db, invoice, payment, date(10)).await.unwrap();
        assert_eq!(invoice.status, InvoiceStatus::PartiallyPaid.as_str());

        let insert = db
            .into_transaction_log()
            .iter()
            .flat_map(|t| t.statements().to_vec())
            .find(|stmt| stmt.sql.starts_with("INSERT"))
            .unwrap();
        let values = insert.values.unwrap().0;
        assert!(values.contains(&Value::Decimal(Some(Box::new(dec!(10.13))))));
    }
}
