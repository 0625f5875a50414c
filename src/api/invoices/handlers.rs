use actix_web::{HttpRequest, HttpResponse, delete, get, post, put, web};
use sea_orm::{
    ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
};

use crate::{
    api::{context::resolve_tenant_context, helpers, validation},
    app_state::AppState,
    database::models::{invoices, payments},
    database::types::InvoiceStatus,
    errors::AppError,
    services::{
        facturx,
        invoice_status::{self, NewPayment},
    },
};

use super::functions::{
    create_invoice as create_invoice_record, delete_invoice as delete_invoice_record, find_invoice,
    invoice_details, pdf_file_name, remind_invoice as remind_invoice_record, render_details_pdf,
    send_invoice as send_invoice_record, update_invoice as update_invoice_record,
};
use super::structures::{
    InvoiceDetails, InvoiceDto, InvoiceEmailResponse, InvoiceListResponse, InvoiceQuery,
    MarkOverdueResponse, PaymentDto, PaymentRecorded,
};

/// Список счетов организации
#[utoipa::path(
    get,
    path = "/api/invoices",
    tag = "Invoices",
    params(InvoiceQuery, ("X-Organization-Id" = i64, Header, description = "Tenant id")),
    responses(
        (status = 200, description = "Invoices", body = InvoiceListResponse),
        (status = 400, description = "Invalid filters")
    )
)]
#[get("")]
pub async fn list_invoices(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    query: web::Query<InvoiceQuery>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;
    let (page, limit) = helpers::page_params(query.page, query.limit)?;

    let mut select = invoices::Entity::find()
        .filter(invoices::Column::OrganizationId.eq(ctx.organization_id()));
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        let status: InvoiceStatus = status.parse()?;
        select = select.filter(invoices::Column::Status.eq(status.as_str()));
    }
    if let Some(customer_id) = query.customer_id {
        select = select.filter(invoices::Column::CustomerId.eq(customer_id));
    }

    let paginator = select
        .order_by_desc(invoices::Column::IssueDate)
        .order_by_desc(invoices::Column::Id)
        .paginate(&app_state.db, limit);
    let total = paginator.num_items().await?;
    let invoices = paginator.fetch_page(page - 1).await?;

    Ok(HttpResponse::Ok().json(InvoiceListResponse {
        invoices,
        total,
        page,
        limit,
    }))
}

/// Создание черновика с номером и итогами
#[utoipa::path(
    post,
    path = "/api/invoices",
    tag = "Invoices",
    params(("X-Organization-Id" = i64, Header, description = "Tenant id")),
    request_body = InvoiceDto,
    responses(
        (status = 201, description = "Draft invoice created", body = InvoiceDetails),
        (status = 400, description = "Invalid items or dates"),
        (status = 404, description = "Customer not found"),
        (status = 409, description = "Invoice number collision")
    )
)]
#[post("")]
pub async fn create_invoice(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    dto: web::Json<InvoiceDto>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;
    let today = app_state.config.today();

    let invoice = create_invoice_record(&app_state.db, &ctx.organization, &dto, today).await?;
    let details = invoice_details(&app_state.db, invoice).await?;
    Ok(HttpResponse::Created().json(details))
}

/// Перевод просроченных счетов в `overdue`
#[utoipa::path(
    post,
    path = "/api/invoices/mark-overdue",
    tag = "Invoices",
    params(("X-Organization-Id" = i64, Header, description = "Tenant id")),
    responses((status = 200, description = "Sweep done", body = MarkOverdueResponse))
)]
#[post("/mark-overdue")]
pub async fn mark_overdue(
    req: HttpRequest,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;
    let updated = invoice_status::mark_overdue(
        &app_state.db,
        Some(ctx.organization_id()),
        app_state.config.today(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(MarkOverdueResponse { updated }))
}

#[utoipa::path(
    get,
    path = "/api/invoices/{id}",
    tag = "Invoices",
    params(
        ("id" = i64, Path, description = "Invoice ID"),
        ("X-Organization-Id" = i64, Header, description = "Tenant id")
    ),
    responses(
        (status = 200, description = "Invoice with items, totals and paid amount", body = InvoiceDetails),
        (status = 404, description = "Invoice not found")
    )
)]
#[get("/{id}")]
pub async fn get_invoice(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;
    let invoice = find_invoice(&app_state.db, ctx.organization_id(), path.into_inner()).await?;
    let details = invoice_details(&app_state.db, invoice).await?;
    Ok(HttpResponse::Ok().json(details))
}

/// Редактирование, только для черновиков
#[utoipa::path(
    put,
    path = "/api/invoices/{id}",
    tag = "Invoices",
    params(
        ("id" = i64, Path, description = "Invoice ID"),
        ("X-Organization-Id" = i64, Header, description = "Tenant id")
    ),
    request_body = InvoiceDto,
    responses(
        (status = 200, description = "Invoice updated", body = InvoiceDetails),
        (status = 400, description = "Invalid items or dates"),
        (status = 404, description = "Invoice not found"),
        (status = 409, description = "Invoice is no longer a draft")
    )
)]
#[put("/{id}")]
pub async fn update_invoice(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i64>,
    dto: web::Json<InvoiceDto>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;
    let invoice = find_invoice(&app_state.db, ctx.organization_id(), path.into_inner()).await?;

    let updated = update_invoice_record(
        &app_state.db,
        &ctx.organization,
        invoice,
        &dto,
        app_state.config.today(),
    )
    .await?;
    let details = invoice_details(&app_state.db, updated).await?;
    Ok(HttpResponse::Ok().json(details))
}

#[utoipa::path(
    delete,
    path = "/api/invoices/{id}",
    tag = "Invoices",
    params(
        ("id" = i64, Path, description = "Invoice ID"),
        ("X-Organization-Id" = i64, Header, description = "Tenant id")
    ),
    responses(
        (status = 204, description = "Draft deleted"),
        (status = 404, description = "Invoice not found"),
        (status = 409, description = "Invoice is no longer a draft")
    )
)]
#[delete("/{id}")]
pub async fn delete_invoice(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;
    let invoice = find_invoice(&app_state.db, ctx.organization_id(), path.into_inner()).await?;
    delete_invoice_record(&app_state.db, invoice).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Отправка счёта клиенту по email с PDF
#[utoipa::path(
    post,
    path = "/api/invoices/{id}/send",
    tag = "Invoices",
    params(
        ("id" = i64, Path, description = "Invoice ID"),
        ("X-Organization-Id" = i64, Header, description = "Tenant id")
    ),
    responses(
        (status = 200, description = "Invoice emailed", body = InvoiceEmailResponse),
        (status = 404, description = "Invoice not found"),
        (status = 502, description = "Mail API failure")
    )
)]
#[post("/{id}/send")]
pub async fn send_invoice(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;
    let invoice = find_invoice(&app_state.db, ctx.organization_id(), path.into_inner()).await?;
    let (invoice, recipient) = send_invoice_record(&app_state, &ctx.organization, invoice).await?;
    Ok(HttpResponse::Ok().json(InvoiceEmailResponse { invoice, recipient }))
}

#[utoipa::path(
    post,
    path = "/api/invoices/{id}/remind",
    tag = "Invoices",
    params(
        ("id" = i64, Path, description = "Invoice ID"),
        ("X-Organization-Id" = i64, Header, description = "Tenant id")
    ),
    responses(
        (status = 200, description = "Reminder emailed", body = InvoiceEmailResponse),
        (status = 404, description = "Invoice not found"),
        (status = 409, description = "Invoice does not await payment")
    )
)]
#[post("/{id}/remind")]
pub async fn remind_invoice(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;
    let invoice = find_invoice(&app_state.db, ctx.organization_id(), path.into_inner()).await?;
    let (invoice, recipient) = remind_invoice_record(&app_state, &ctx.organization, invoice).await?;
    Ok(HttpResponse::Ok().json(InvoiceEmailResponse { invoice, recipient }))
}

#[utoipa::path(
    get,
    path = "/api/invoices/{id}/pdf",
    tag = "Invoices",
    params(
        ("id" = i64, Path, description = "Invoice ID"),
        ("X-Organization-Id" = i64, Header, description = "Tenant id")
    ),
    responses(
        (status = 200, description = "Invoice PDF", content_type = "application/pdf"),
        (status = 404, description = "Invoice not found")
    )
)]
#[get("/{id}/pdf")]
pub async fn invoice_pdf(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;
    let invoice = find_invoice(&app_state.db, ctx.organization_id(), path.into_inner()).await?;
    let details = invoice_details(&app_state.db, invoice).await?;
    let pdf = render_details_pdf(&ctx.organization, &details)?;
    Ok(helpers::attachment(
        "application/pdf",
        &pdf_file_name(&details.invoice),
        pdf,
    ))
}

/// XML CrossIndustryInvoice (Factur-X BASIC, без валидации схемой)
#[utoipa::path(
    get,
    path = "/api/invoices/{id}/facturx",
    tag = "Invoices",
    params(
        ("id" = i64, Path, description = "Invoice ID"),
        ("X-Organization-Id" = i64, Header, description = "Tenant id")
    ),
    responses(
        (status = 200, description = "Factur-X XML", content_type = "application/xml"),
        (status = 404, description = "Invoice not found")
    )
)]
#[get("/{id}/facturx")]
pub async fn invoice_facturx(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;
    let invoice = find_invoice(&app_state.db, ctx.organization_id(), path.into_inner()).await?;
    let details = invoice_details(&app_state.db, invoice).await?;
    let xml = facturx::build_facturx_xml(
        &ctx.organization,
        &details.customer,
        &details.invoice,
        &details.items,
    )?;
    let file_name = format!(
        "{}-facturx.xml",
        helpers::safe_file_name(&details.invoice.number)
    );
    Ok(helpers::attachment("application/xml", &file_name, xml))
}

#[utoipa::path(
    get,
    path = "/api/invoices/{id}/payments",
    tag = "Payments",
    params(
        ("id" = i64, Path, description = "Invoice ID"),
        ("X-Organization-Id" = i64, Header, description = "Tenant id")
    ),
    responses(
        (status = 200, description = "Payments of the invoice", body = [payments::Model]),
        (status = 404, description = "Invoice not found")
    )
)]
#[get("/{id}/payments")]
pub async fn list_payments(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;
    let invoice = find_invoice(&app_state.db, ctx.organization_id(), path.into_inner()).await?;
    let payments = payments::Entity::find()
        .filter(payments::Column::InvoiceId.eq(invoice.id))
        .order_by_asc(payments::Column::PaidAt)
        .all(&app_state.db)
        .await?;
    Ok(HttpResponse::Ok().json(payments))
}

/// Ручная запись оплаты, статус счёта пересчитывается
#[utoipa::path(
    post,
    path = "/api/invoices/{id}/payments",
    tag = "Payments",
    params(
        ("id" = i64, Path, description = "Invoice ID"),
        ("X-Organization-Id" = i64, Header, description = "Tenant id")
    ),
    request_body = PaymentDto,
    responses(
        (status = 201, description = "Payment recorded", body = PaymentRecorded),
        (status = 400, description = "Invalid amount"),
        (status = 404, description = "Invoice not found"),
        (status = 409, description = "Invoice is a draft")
    )
)]
#[post("/{id}/payments")]
pub async fn create_payment(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i64>,
    dto: web::Json<PaymentDto>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;
    let today = app_state.config.today();
    let dto = dto.into_inner();
    let reference = validation::optional_text("reference", dto.reference.as_deref(), 120)?;

    let txn = app_state.db.begin().await?;
    let invoice = find_invoice(&txn, ctx.organization_id(), path.into_inner()).await?;
    let (payment, invoice) = invoice_status::record_payment(
        &txn,
        invoice,
        NewPayment {
            amount: dto.amount,
            method: dto.method,
            paid_at: dto.paid_at.unwrap_or(today),
            reference,
            external_id: None,
        },
        today,
    )
    .await?;
    txn.commit().await?;

    log::info!(
        "Payment of {} recorded on {} by {}",
        payment.amount,
        invoice.number,
        ctx.actor()
    );
    Ok(HttpResponse::Created().json(PaymentRecorded { payment, invoice }))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/invoices")
            .service(list_invoices)
            .service(create_invoice)
            .service(mark_overdue)
            .service(get_invoice)
            .service(update_invoice)
            .service(delete_invoice)
            .service(send_invoice)
            .service(remind_invoice)
            .service(invoice_pdf)
            .service(invoice_facturx)
            .service(list_payments)
            .service(create_payment),
    );
}
