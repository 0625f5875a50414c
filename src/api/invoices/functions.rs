use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use serde_json::json;

use crate::{
    api::{customers::find_customer, validation},
    app_state::AppState,
    database::models::{customers, invoice_items, invoices, organizations},
    database::types::InvoiceStatus,
    errors::AppError,
    services::{
        email_templates::EmailKind,
        invoice_numbering::next_invoice_number,
        invoice_status::paid_total,
        invoice_totals::{self, format_eur},
        mailer::Attachment,
        pdf::{invoice::format_date_fr, render_invoice, InvoiceDocument},
    },
};

use super::structures::{InvoiceDetails, InvoiceDto, InvoiceItemDto};

pub async fn find_invoice<C: ConnectionTrait>(
    db: &C,
    organization_id: i64,
    invoice_id: i64,
) -> Result<invoices::Model, AppError> {
    invoices::Entity::find_by_id(invoice_id)
        .filter(invoices::Column::OrganizationId.eq(organization_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Invoice with id {} not found", invoice_id)))
}

pub async fn load_items<C: ConnectionTrait>(
    db: &C,
    invoice_id: i64,
) -> Result<Vec<invoice_items::Model>, AppError> {
    Ok(invoice_items::Entity::find()
        .filter(invoice_items::Column::InvoiceId.eq(invoice_id))
        .order_by_asc(invoice_items::Column::Position)
        .all(db)
        .await?)
}

/// Черновик или 409
pub fn ensure_editable(invoice: &invoices::Model) -> Result<InvoiceStatus, AppError> {
    let status: InvoiceStatus = invoice.status.parse()?;
    if !status.is_editable() {
        return Err(AppError::Conflict(format!(
            "Invoice {} is {} and can no longer be modified",
            invoice.number, status
        )));
    }
    Ok(status)
}

pub fn validate_items(items: &[InvoiceItemDto]) -> Result<(), AppError> {
    if items.is_empty() {
        return Err(AppError::InvalidInput(
            "An invoice needs at least one item".to_string(),
        ));
    }
    for (idx, item) in items.iter().enumerate() {
        validation::required_text(&format!("items[{}].label", idx), &item.label, 255)?;
        invoice_totals::validate_line(idx, item)?;
    }
    Ok(())
}

/// Дата выставления по умолчанию сегодня, срок по умолчанию из настроек организации
pub fn resolve_dates(
    organization: &organizations::Model,
    issue_date: Option<NaiveDate>,
    due_date: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), AppError> {
    let issue = issue_date.unwrap_or(today);
    let due = due_date
        .unwrap_or_else(|| issue + Duration::days(i64::from(organization.payment_terms_days)));
    if due < issue {
        return Err(AppError::InvalidInput(
            "`due_date` must not be before `issue_date`".to_string(),
        ));
    }
    Ok((issue, due))
}

fn unique_violation(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => {
            log::warn!("Invoice number collision: {}", detail);
            AppError::Conflict("Invoice number already taken, please retry".to_string())
        }
        _ => AppError::DbError(err),
    }
}

async fn insert_items<C: ConnectionTrait>(
    db: &C,
    invoice_id: i64,
    items: &[InvoiceItemDto],
) -> Result<(), AppError> {
    let models = items.iter().enumerate().map(|(idx, item)| invoice_items::ActiveModel {
        invoice_id: Set(invoice_id),
        position: Set(idx as i32 + 1),
        label: Set(item.label.trim().to_string()),
        quantity: Set(item.quantity),
        unit_price: Set(item.unit_price),
        vat_rate: Set(item.vat_rate),
        ..Default::default()
    });
    invoice_items::Entity::insert_many(models).exec(db).await?;
    Ok(())
}

pub async fn create_invoice(
    db: &DatabaseConnection,
    organization: &organizations::Model,
    dto: &InvoiceDto,
    today: NaiveDate,
) -> Result<invoices::Model, AppError> {
    validate_items(&dto.items)?;
    let (issue_date, due_date) = resolve_dates(organization, dto.issue_date, dto.due_date, today)?;
    let notes = validation::optional_text("notes", dto.notes.as_deref(), 2000)?;
    let totals = invoice_totals::compute_totals(&dto.items);

    let txn = db.begin().await?;
    find_customer(&txn, organization.id, dto.customer_id).await?;

    let number = next_invoice_number(&txn, organization.id, &organization.invoice_prefix).await?;
    let invoice = invoices::ActiveModel {
        organization_id: Set(organization.id),
        customer_id: Set(dto.customer_id),
        number: Set(number),
        status: Set(InvoiceStatus::Draft.as_str().to_string()),
        issue_date: Set(issue_date),
        due_date: Set(due_date),
        total_ht: Set(totals.total_ht),
        total_vat: Set(totals.total_vat),
        total_ttc: Set(totals.total_ttc),
        notes: Set(notes),
        sent_at: Set(None),
        paid_at: Set(None),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(unique_violation)?;

    insert_items(&txn, invoice.id, &dto.items).await?;
    txn.commit().await?;

    log::info!(
        "Invoice {} created for organization {} ({} TTC)",
        invoice.number,
        organization.id,
        invoice.total_ttc
    );
    Ok(invoice)
}

/// Полная замена черновика: клиент, даты, заметки и строки
pub async fn update_invoice(
    db: &DatabaseConnection,
    organization: &organizations::Model,
    invoice: invoices::Model,
    dto: &InvoiceDto,
    today: NaiveDate,
) -> Result<invoices::Model, AppError> {
    ensure_editable(&invoice)?;
    validate_items(&dto.items)?;
    let (issue_date, due_date) = resolve_dates(
        organization,
        dto.issue_date.or(Some(invoice.issue_date)),
        dto.due_date,
        today,
    )?;
    let notes = validation::optional_text("notes", dto.notes.as_deref(), 2000)?;
    let totals = invoice_totals::compute_totals(&dto.items);

    let txn = db.begin().await?;
    find_customer(&txn, organization.id, dto.customer_id).await?;

    invoice_items::Entity::delete_many()
        .filter(invoice_items::Column::InvoiceId.eq(invoice.id))
        .exec(&txn)
        .await?;
    insert_items(&txn, invoice.id, &dto.items).await?;

    let mut active = invoice.into_active_model();
    active.customer_id = Set(dto.customer_id);
    active.issue_date = Set(issue_date);
    active.due_date = Set(due_date);
    active.notes = Set(notes);
    active.total_ht = Set(totals.total_ht);
    active.total_vat = Set(totals.total_vat);
    active.total_ttc = Set(totals.total_ttc);
    active.updated_at = Set(Some(Utc::now()));
    let updated = active.update(&txn).await?;

    txn.commit().await?;
    Ok(updated)
}

pub async fn delete_invoice(db: &DatabaseConnection, invoice: invoices::Model) -> Result<(), AppError> {
    ensure_editable(&invoice)?;

    let txn = db.begin().await?;
    invoice_items::Entity::delete_many()
        .filter(invoice_items::Column::InvoiceId.eq(invoice.id))
        .exec(&txn)
        .await?;
    let number = invoice.number.clone();
    invoice.into_active_model().delete(&txn).await?;
    txn.commit().await?;

    log::info!("Draft invoice {} deleted", number);
    Ok(())
}

pub async fn invoice_details<C: ConnectionTrait>(
    db: &C,
    invoice: invoices::Model,
) -> Result<InvoiceDetails, AppError> {
    let customer = customers::Entity::find_by_id(invoice.customer_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Customer with id {} not found", invoice.customer_id)))?;
    let items = load_items(db, invoice.id).await?;
    let paid_amount = paid_total(db, invoice.id).await?;
    let amount_due = (invoice.total_ttc - paid_amount).max(Decimal::ZERO);

    Ok(InvoiceDetails {
        vat_breakdown: invoice_totals::vat_breakdown(&items),
        invoice,
        customer,
        items,
        paid_amount,
        amount_due,
    })
}

pub fn render_details_pdf(
    organization: &organizations::Model,
    details: &InvoiceDetails,
) -> Result<Vec<u8>, AppError> {
    render_invoice(&InvoiceDocument {
        organization,
        customer: &details.customer,
        invoice: &details.invoice,
        items: &details.items,
    })
}

pub fn pdf_file_name(invoice: &invoices::Model) -> String {
    format!("{}.pdf", crate::api::helpers::safe_file_name(&invoice.number))
}

/// Отправляет счёт клиенту с PDF во вложении. Черновик становится `sent`.
pub async fn send_invoice(
    app_state: &AppState,
    organization: &organizations::Model,
    invoice: invoices::Model,
) -> Result<(invoices::Model, String), AppError> {
    let details = invoice_details(&app_state.db, invoice).await?;
    let pdf = render_details_pdf(organization, &details)?;

    let rendered = app_state.templates.render(
        EmailKind::InvoiceSent,
        &json!({
            "customer_name": details.customer.name,
            "invoice_number": details.invoice.number,
            "organization_name": organization.name,
            "total_ttc": format_eur(details.invoice.total_ttc),
            "due_date": format_date_fr(details.invoice.due_date),
            "iban": organization.iban,
        }),
    )?;
    let recipient = details.customer.email.clone();
    let email = app_state.mailer.compose(
        recipient.clone(),
        rendered,
        vec![Attachment::pdf(pdf_file_name(&details.invoice), &pdf)],
    );
    app_state.mailer.send(&email).await?;

    let invoice = details.invoice;
    let status: InvoiceStatus = invoice.status.parse()?;
    if status != InvoiceStatus::Draft {
        log::info!("Invoice {} re-sent to {}", invoice.number, recipient);
        return Ok((invoice, recipient));
    }

    let mut active = invoice.into_active_model();
    active.status = Set(InvoiceStatus::Sent.as_str().to_string());
    active.sent_at = Set(Some(Utc::now()));
    active.updated_at = Set(Some(Utc::now()));
    let updated = active.update(&app_state.db).await?;
    log::info!("Invoice {} sent to {}", updated.number, recipient);
    Ok((updated, recipient))
}

/// Напоминание об оплате для выставленного и не оплаченного полностью счёта
pub async fn remind_invoice(
    app_state: &AppState,
    organization: &organizations::Model,
    invoice: invoices::Model,
) -> Result<(invoices::Model, String), AppError> {
    let status: InvoiceStatus = invoice.status.parse()?;
    if !status.awaits_payment() {
        return Err(AppError::Conflict(format!(
            "Invoice {} is {}, no reminder to send",
            invoice.number, status
        )));
    }

    let details = invoice_details(&app_state.db, invoice).await?;
    let rendered = app_state.templates.render(
        EmailKind::PaymentReminder,
        &json!({
            "customer_name": details.customer.name,
            "invoice_number": details.invoice.number,
            "organization_name": organization.name,
            "due_date": format_date_fr(details.invoice.due_date),
            "amount_due": format_eur(details.amount_due),
        }),
    )?;
    let recipient = details.customer.email.clone();
    let email = app_state.mailer.compose(recipient.clone(), rendered, Vec::new());
    app_state.mailer.send(&email).await?;

    log::info!("Payment reminder for {} sent to {}", details.invoice.number, recipient);
    Ok((details.invoice, recipient))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::pdf::invoice::fixtures;
    use rust_decimal_macros::dec;
    use sea_orm::{DatabaseBackend, MockDatabase, Value};
    use std::collections::BTreeMap;

    fn item(label: &str, quantity: Decimal, price: Decimal, rate: Decimal) -> InvoiceItemDto {
        InvoiceItemDto {
            label: label.to_string(),
            quantity,
            unit_price: price,
            vat_rate: rate,
        }
    }

    #[test]
    fn requires_at_least_one_valid_item() {
        assert!(validate_items(&[]).is_err());
        assert!(validate_items(&[item(" ", dec!(1), dec!(10), dec!(20))]).is_err());
        assert!(validate_items(&[item("Audit", dec!(0), dec!(10), dec!(20))]).is_err());
        assert!(validate_items(&[item("Audit", dec!(1), dec!(10), dec!(120))]).is_err());
        assert!(validate_items(&[item("Audit", dec!(1.5), dec!(0), dec!(0))]).is_ok());
    }

    #[test]
    fn due_date_defaults_to_payment_terms() {
        let org = fixtures::organization();
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let (issue, due) = resolve_dates(&org, None, None, today).unwrap();
        assert_eq!(issue, today);
        assert_eq!(due, NaiveDate::from_ymd_opt(2026, 3, 31).unwrap());

        let early = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        assert!(resolve_dates(&org, Some(today), Some(early), today).is_err());
    }

    #[test]
    fn only_drafts_pass_the_edit_guard() {
        assert!(ensure_editable(&fixtures::invoice("draft")).is_ok());
        for status in ["sent", "paid", "overdue", "partially_paid"] {
            let err = ensure_editable(&fixtures::invoice(status)).unwrap_err();
            assert!(matches!(err, AppError::Conflict(_)), "{}", status);
        }
    }

    #[actix_web::test]
    async fn new_invoice_gets_next_number_and_server_totals() {
        let taken = ["FAC-0001", "FAC-0002"].map(|n| {
            BTreeMap::from([("number".to_string(), Value::String(Some(Box::new(n.to_string()))))])
        });
        let item_ids = vec![BTreeMap::from([("id".to_string(), Value::BigInt(Some(2)))])];
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![fixtures::customer()]])
            .append_query_results([taken.to_vec()])
            .append_query_results([vec![fixtures::invoice("draft")]])
            .append_query_results([item_ids])
            .into_connection();

        let dto = InvoiceDto {
            customer_id: 7,
            issue_date: None,
            due_date: None,
            notes: None,
            items: vec![
                item("Réparation vitrine réfrigérée", dec!(2), dec!(150.00), dec!(20)),
                item("Guide d'entretien", dec!(1), dec!(49.90), dec!(5.5)),
            ],
        };
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        create_invoice(&db, &fixtures::organization(), &dto, today).await.unwrap();

        let insert = db
            .into_transaction_log()
            .iter()
            .flat_map(|t| t.statements().to_vec())
            .find(|stmt| stmt.sql.starts_with(r#"INSERT INTO "invoices""#))
            .unwrap();
        let values = insert.values.unwrap().0;
        assert!(values.contains(&Value::String(Some(Box::new("FAC-0003".to_string())))));
        assert!(values.contains(&Value::String(Some(Box::new("draft".to_string())))));
        for total in [dec!(349.90), dec!(62.74), dec!(412.64)] {
            assert!(values.contains(&Value::Decimal(Some(Box::new(total)))), "{}", total);
        }
    }
}
