use actix_web::{HttpRequest, HttpResponse, delete, get, post, put, web};
use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::{context::resolve_tenant_context, helpers, validation},
    app_state::AppState,
    database::models::{absences, employees, leave_requests},
    errors::AppError,
};

#[derive(Deserialize, ToSchema, Clone)]
pub struct EmployeeDto {
    /// Табельный номер (matricule)
    pub registration_number: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub job_title: Option<String>,
    pub hire_date: NaiveDate,
    pub manager_email: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct EmployeeQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub employees: Vec<employees::Model>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

pub async fn find_employee<C: ConnectionTrait>(
    db: &C,
    organization_id: i64,
    employee_id: i64,
) -> Result<employees::Model, AppError> {
    employees::Entity::find_by_id(employee_id)
        .filter(employees::Column::OrganizationId.eq(organization_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Employee with id {} not found", employee_id)))
}

/// Табельный номер уникален в пределах организации
async fn ensure_unique_registration<C: ConnectionTrait>(
    db: &C,
    organization_id: i64,
    registration_number: &str,
    except_id: Option<i64>,
) -> Result<(), AppError> {
    let mut select = employees::Entity::find()
        .filter(employees::Column::OrganizationId.eq(organization_id))
        .filter(employees::Column::RegistrationNumber.eq(registration_number));
    if let Some(id) = except_id {
        select = select.filter(employees::Column::Id.ne(id));
    }
    if select.count(db).await? > 0 {
        return Err(AppError::Conflict(format!(
            "Registration number {} is already used",
            registration_number
        )));
    }
    Ok(())
}

fn apply_dto(dto: &EmployeeDto, model: &mut employees::ActiveModel) -> Result<String, AppError> {
    let registration_number =
        validation::required_text("registration_number", &dto.registration_number, 30)?;
    model.registration_number = Set(registration_number.clone());
    model.first_name = Set(validation::required_text("first_name", &dto.first_name, 100)?);
    model.last_name = Set(validation::required_text("last_name", &dto.last_name, 100)?);
    model.email = Set(validation::required_email("email", &dto.email)?);
    model.job_title = Set(validation::optional_text("job_title", dto.job_title.as_deref(), 120)?);
    model.hire_date = Set(dto.hire_date);
    model.manager_email = Set(validation::optional_email("manager_email", dto.manager_email.as_deref())?);
    Ok(registration_number)
}

#[utoipa::path(
    get,
    path = "/api/employees",
    tag = "Employees",
    params(EmployeeQuery, ("X-Organization-Id" = i64, Header, description = "Tenant id")),
    responses((status = 200, description = "Employees", body = EmployeeListResponse))
)]
#[get("")]
pub async fn list_employees(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    query: web::Query<EmployeeQuery>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;
    let (page, limit) = helpers::page_params(query.page, query.limit)?;

    let mut select = employees::Entity::find()
        .filter(employees::Column::OrganizationId.eq(ctx.organization_id()));
    if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        select = select.filter(
            Condition::any()
                .add(employees::Column::LastName.contains(term))
                .add(employees::Column::FirstName.contains(term))
                .add(employees::Column::Email.contains(term))
                .add(employees::Column::RegistrationNumber.contains(term)),
        );
    }

    let paginator = select
        .order_by_asc(employees::Column::LastName)
        .order_by_asc(employees::Column::FirstName)
        .paginate(&app_state.db, limit);
    let total = paginator.num_items().await?;
    let employees = paginator.fetch_page(page - 1).await?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        employees,
        total,
        page,
        limit,
    }))
}

#[utoipa::path(
    post,
    path = "/api/employees",
    tag = "Employees",
    params(("X-Organization-Id" = i64, Header, description = "Tenant id")),
    request_body = EmployeeDto,
    responses(
        (status = 201, description = "Employee created", body = employees::Model),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Registration number already used")
    )
)]
#[post("")]
pub async fn create_employee(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    dto: web::Json<EmployeeDto>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;

    let mut model = employees::ActiveModel {
        organization_id: Set(ctx.organization_id()),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    let registration_number = apply_dto(&dto, &mut model)?;
    ensure_unique_registration(&app_state.db, ctx.organization_id(), &registration_number, None)
        .await?;

    let created = model.insert(&app_state.db).await?;
    log::info!(
        "Employee {} ({}) created by {}",
        created.id,
        created.registration_number,
        ctx.actor()
    );
    Ok(HttpResponse::Created().json(created))
}

#[utoipa::path(
    get,
    path = "/api/employees/{id}",
    tag = "Employees",
    params(
        ("id" = i64, Path, description = "Employee ID"),
        ("X-Organization-Id" = i64, Header, description = "Tenant id")
    ),
    responses(
        (status = 200, description = "Employee found", body = employees::Model),
        (status = 404, description = "Employee not found")
    )
)]
#[get("/{id}")]
pub async fn get_employee(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;
    let employee = find_employee(&app_state.db, ctx.organization_id(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(employee))
}

#[utoipa::path(
    put,
    path = "/api/employees/{id}",
    tag = "Employees",
    params(
        ("id" = i64, Path, description = "Employee ID"),
        ("X-Organization-Id" = i64, Header, description = "Tenant id")
    ),
    request_body = EmployeeDto,
    responses(
        (status = 200, description = "Employee updated", body = employees::Model),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Registration number already used")
    )
)]
#[put("/{id}")]
pub async fn update_employee(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i64>,
    dto: web::Json<EmployeeDto>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;
    let employee = find_employee(&app_state.db, ctx.organization_id(), path.into_inner()).await?;
    let employee_id = employee.id;

    let mut model = employee.into_active_model();
    let registration_number = apply_dto(&dto, &mut model)?;
    ensure_unique_registration(
        &app_state.db,
        ctx.organization_id(),
        &registration_number,
        Some(employee_id),
    )
    .await?;

    let updated = model.update(&app_state.db).await?;
    Ok(HttpResponse::Ok().json(updated))
}

/// Удаление сотрудника вместе с его отсутствиями и заявками
#[utoipa::path(
    delete,
    path = "/api/employees/{id}",
    tag = "Employees",
    params(
        ("id" = i64, Path, description = "Employee ID"),
        ("X-Organization-Id" = i64, Header, description = "Tenant id")
    ),
    responses(
        (status = 204, description = "Employee deleted"),
        (status = 404, description = "Employee not found")
    )
)]
#[delete("/{id}")]
pub async fn delete_employee(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;

    let txn = app_state.db.begin().await?;
    let employee = find_employee(&txn, ctx.organization_id(), path.into_inner()).await?;
    absences::Entity::delete_many()
        .filter(absences::Column::EmployeeId.eq(employee.id))
        .exec(&txn)
        .await?;
    leave_requests::Entity::delete_many()
        .filter(leave_requests::Column::EmployeeId.eq(employee.id))
        .exec(&txn)
        .await?;
    let registration_number = employee.registration_number.clone();
    employee.into_active_model().delete(&txn).await?;
    txn.commit().await?;

    log::info!("Employee {} deleted by {}", registration_number, ctx.actor());
    Ok(HttpResponse::NoContent().finish())
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/employees")
            .service(list_employees)
            .service(create_employee)
            .service(get_employee)
            .service(update_employee)
            .service(delete_employee),
    );
}
