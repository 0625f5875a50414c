use actix_web::{HttpRequest, HttpResponse, delete, get, post, put, web};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::{context::resolve_tenant_context, helpers, validation},
    app_state::AppState,
    database::models::{customers, invoices},
    errors::AppError,
};

// --- DTOs ---

#[derive(Deserialize, ToSchema, Clone)]
pub struct CustomerDto {
    pub name: String,
    pub email: String,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub siret: Option<String>,
    pub vat_number: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct CustomerQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// Поиск по имени или email
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct CustomerListResponse {
    pub customers: Vec<customers::Model>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

fn apply_dto(dto: &CustomerDto, model: &mut customers::ActiveModel) -> Result<(), AppError> {
    model.name = Set(validation::required_text("name", &dto.name, 200)?);
    model.email = Set(validation::required_email("email", &dto.email)?);
    model.address = Set(validation::optional_text("address", dto.address.as_deref(), 255)?);
    model.postal_code = Set(validation::optional_text("postal_code", dto.postal_code.as_deref(), 10)?);
    model.city = Set(validation::optional_text("city", dto.city.as_deref(), 120)?);
    model.siret = Set(validation::optional_siret(dto.siret.as_deref())?);
    model.vat_number = Set(validation::optional_vat_number(dto.vat_number.as_deref())?);
    Ok(())
}

/// Клиент организации или 404
pub async fn find_customer<C: ConnectionTrait>(
    db: &C,
    organization_id: i64,
    customer_id: i64,
) -> Result<customers::Model, AppError> {
    customers::Entity::find_by_id(customer_id)
        .filter(customers::Column::OrganizationId.eq(organization_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Customer with id {} not found", customer_id)))
}

// --- Route Handlers ---

#[utoipa::path(
    get,
    path = "/api/customers",
    tag = "Customers",
    params(CustomerQuery, ("X-Organization-Id" = i64, Header, description = "Tenant id")),
    responses(
        (status = 200, description = "Customers of the organization", body = CustomerListResponse),
        (status = 400, description = "Invalid pagination parameters")
    )
)]
#[get("")]
pub async fn list_customers(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    query: web::Query<CustomerQuery>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;
    let (page, limit) = helpers::page_params(query.page, query.limit)?;

    let mut select = customers::Entity::find()
        .filter(customers::Column::OrganizationId.eq(ctx.organization_id()));
    if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        select = select.filter(
            Condition::any()
                .add(customers::Column::Name.contains(term))
                .add(customers::Column::Email.contains(term)),
        );
    }

    let paginator = select
        .order_by_asc(customers::Column::Name)
        .paginate(&app_state.db, limit);
    let total = paginator.num_items().await?;
    let customers = paginator.fetch_page(page - 1).await?;

    Ok(HttpResponse::Ok().json(CustomerListResponse {
        customers,
        total,
        page,
        limit,
    }))
}

#[utoipa::path(
    post,
    path = "/api/customers",
    tag = "Customers",
    params(("X-Organization-Id" = i64, Header, description = "Tenant id")),
    request_body = CustomerDto,
    responses(
        (status = 201, description = "Customer created", body = customers::Model),
        (status = 400, description = "Invalid input")
    )
)]
#[post("")]
pub async fn create_customer(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    dto: web::Json<CustomerDto>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;

    let mut model = customers::ActiveModel {
        organization_id: Set(ctx.organization_id()),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    apply_dto(&dto, &mut model)?;

    let created = model.insert(&app_state.db).await?;
    Ok(HttpResponse::Created().json(created))
}

#[utoipa::path(
    get,
    path = "/api/customers/{id}",
    tag = "Customers",
    params(
        ("id" = i64, Path, description = "Customer ID"),
        ("X-Organization-Id" = i64, Header, description = "Tenant id")
    ),
    responses(
        (status = 200, description = "Customer found", body = customers::Model),
        (status = 404, description = "Customer not found")
    )
)]
#[get("/{id}")]
pub async fn get_customer(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;
    let customer = find_customer(&app_state.db, ctx.organization_id(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(customer))
}

#[utoipa::path(
    put,
    path = "/api/customers/{id}",
    tag = "Customers",
    params(
        ("id" = i64, Path, description = "Customer ID"),
        ("X-Organization-Id" = i64, Header, description = "Tenant id")
    ),
    request_body = CustomerDto,
    responses(
        (status = 200, description = "Customer updated", body = customers::Model),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Customer not found")
    )
)]
#[put("/{id}")]
pub async fn update_customer(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i64>,
    dto: web::Json<CustomerDto>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;
    let customer = find_customer(&app_state.db, ctx.organization_id(), path.into_inner()).await?;

    let mut model = customer.into_active_model();
    apply_dto(&dto, &mut model)?;
    let updated = model.update(&app_state.db).await?;

    Ok(HttpResponse::Ok().json(updated))
}

#[utoipa::path(
    delete,
    path = "/api/customers/{id}",
    tag = "Customers",
    params(
        ("id" = i64, Path, description = "Customer ID"),
        ("X-Organization-Id" = i64, Header, description = "Tenant id")
    ),
    responses(
        (status = 204, description = "Customer deleted"),
        (status = 404, description = "Customer not found"),
        (status = 409, description = "Customer still has invoices")
    )
)]
#[delete("/{id}")]
pub async fn delete_customer(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;
    let customer = find_customer(&app_state.db, ctx.organization_id(), path.into_inner()).await?;

    let invoice_count = invoices::Entity::find()
        .filter(invoices::Column::CustomerId.eq(customer.id))
        .count(&app_state.db)
        .await?;
    if invoice_count > 0 {
        return Err(AppError::Conflict(format!(
            "Customer {} has {} invoices and cannot be deleted",
            customer.id, invoice_count
        )));
    }

    customer.into_active_model().delete(&app_state.db).await?;
    log::info!("Customer deleted by {}", ctx.actor());
    Ok(HttpResponse::NoContent().finish())
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/customers")
            .service(list_customers)
            .service(create_customer)
            .service(get_customer)
            .service(update_customer)
            .service(delete_customer),
    );
}
