use actix_web::{HttpRequest, HttpResponse, delete, web};
use sea_orm::{ColumnTrait, EntityTrait, ModelTrait, QueryFilter, TransactionTrait};

use crate::{
    api::{context::resolve_tenant_context, invoices::find_invoice},
    app_state::AppState,
    database::models::{invoices, payments},
    errors::AppError,
    services::invoice_status,
};

/// Удаление оплаты, статус счёта пересчитывается
#[utoipa::path(
    delete,
    path = "/api/payments/{id}",
    tag = "Payments",
    params(
        ("id" = i64, Path, description = "Payment ID"),
        ("X-Organization-Id" = i64, Header, description = "Tenant id")
    ),
    responses(
        (status = 200, description = "Payment deleted, updated invoice returned", body = invoices::Model),
        (status = 404, description = "Payment not found")
    )
)]
#[delete("/{id}")]
pub async fn delete_payment(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;
    let payment_id = path.into_inner();

    let txn = app_state.db.begin().await?;
    let payment = payments::Entity::find_by_id(payment_id)
        .filter(payments::Column::OrganizationId.eq(ctx.organization_id()))
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Payment with id {} not found", payment_id)))?;

    let invoice = find_invoice(&txn, ctx.organization_id(), payment.invoice_id).await?;
    let amount = payment.amount;
    payment.delete(&txn).await?;
    let invoice = invoice_status::refresh_payment_status(&txn, invoice, app_state.config.today()).await?;
    txn.commit().await?;

    log::info!(
        "Payment {} of {} removed from {} by {}",
        payment_id,
        amount,
        invoice.number,
        ctx.actor()
    );
    Ok(HttpResponse::Ok().json(invoice))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/payments").service(delete_payment));
}
