use actix_web::{HttpRequest, HttpResponse, delete, get, patch, post, web};
use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::{context::resolve_tenant_context, employees::find_employee, validation},
    app_state::AppState,
    database::models::absences,
    database::types::{AbsenceKind, ApprovalStatus},
    errors::AppError,
};

#[derive(Deserialize, ToSchema, Clone)]
pub struct AbsenceDto {
    pub employee_id: i64,
    pub kind: AbsenceKind,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// По умолчанию `pending`
    pub status: Option<ApprovalStatus>,
    pub comment: Option<String>,
}

#[derive(Deserialize, ToSchema, Clone)]
pub struct AbsenceStatusDto {
    pub status: ApprovalStatus,
}

#[derive(Deserialize, IntoParams)]
pub struct AbsenceQuery {
    pub employee_id: Option<i64>,
    /// Отсутствия, заканчивающиеся не раньше этой даты
    pub from: Option<NaiveDate>,
    /// Отсутствия, начинающиеся не позже этой даты
    pub to: Option<NaiveDate>,
    pub status: Option<ApprovalStatus>,
}

pub fn ensure_date_range(start: NaiveDate, end: NaiveDate) -> Result<(), AppError> {
    if end < start {
        return Err(AppError::InvalidInput(
            "`end_date` must not be before `start_date`".to_string(),
        ));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/absences",
    tag = "Absences",
    params(AbsenceQuery, ("X-Organization-Id" = i64, Header, description = "Tenant id")),
    responses((status = 200, description = "Absences", body = [absences::Model]))
)]
#[get("")]
pub async fn list_absences(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    query: web::Query<AbsenceQuery>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;

    let mut select = absences::Entity::find()
        .filter(absences::Column::OrganizationId.eq(ctx.organization_id()));
    if let Some(employee_id) = query.employee_id {
        select = select.filter(absences::Column::EmployeeId.eq(employee_id));
    }
    if let Some(from) = query.from {
        select = select.filter(absences::Column::EndDate.gte(from));
    }
    if let Some(to) = query.to {
        select = select.filter(absences::Column::StartDate.lte(to));
    }
    if let Some(status) = query.status {
        select = select.filter(absences::Column::Status.eq(status.as_str()));
    }

    let absences = select
        .order_by_desc(absences::Column::StartDate)
        .all(&app_state.db)
        .await?;
    Ok(HttpResponse::Ok().json(absences))
}

#[utoipa::path(
    post,
    path = "/api/absences",
    tag = "Absences",
    params(("X-Organization-Id" = i64, Header, description = "Tenant id")),
    request_body = AbsenceDto,
    responses(
        (status = 201, description = "Absence created", body = absences::Model),
        (status = 400, description = "Invalid dates"),
        (status = 404, description = "Employee not found")
    )
)]
#[post("")]
pub async fn create_absence(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    dto: web::Json<AbsenceDto>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;
    ensure_date_range(dto.start_date, dto.end_date)?;
    let comment = validation::optional_text("comment", dto.comment.as_deref(), 1000)?;
    let employee = find_employee(&app_state.db, ctx.organization_id(), dto.employee_id).await?;

    let created = absences::ActiveModel {
        organization_id: Set(ctx.organization_id()),
        employee_id: Set(employee.id),
        kind: Set(dto.kind.as_str().to_string()),
        start_date: Set(dto.start_date),
        end_date: Set(dto.end_date),
        status: Set(dto.status.unwrap_or(ApprovalStatus::Pending).as_str().to_string()),
        comment: Set(comment),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&app_state.db)
    .await?;

    Ok(HttpResponse::Created().json(created))
}

#[utoipa::path(
    patch,
    path = "/api/absences/{id}/status",
    tag = "Absences",
    params(
        ("id" = i64, Path, description = "Absence ID"),
        ("X-Organization-Id" = i64, Header, description = "Tenant id")
    ),
    request_body = AbsenceStatusDto,
    responses(
        (status = 200, description = "Status updated", body = absences::Model),
        (status = 404, description = "Absence not found")
    )
)]
#[patch("/{id}/status")]
pub async fn update_absence_status(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i64>,
    dto: web::Json<AbsenceStatusDto>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;
    let absence_id = path.into_inner();
    let absence = absences::Entity::find_by_id(absence_id)
        .filter(absences::Column::OrganizationId.eq(ctx.organization_id()))
        .one(&app_state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Absence with id {} not found", absence_id)))?;

    let mut active = absence.into_active_model();
    active.status = Set(dto.status.as_str().to_string());
    let updated = active.update(&app_state.db).await?;

    log::info!("Absence {} set to {} by {}", updated.id, dto.status, ctx.actor());
    Ok(HttpResponse::Ok().json(updated))
}

#[utoipa::path(
    delete,
    path = "/api/absences/{id}",
    tag = "Absences",
    params(
        ("id" = i64, Path, description = "Absence ID"),
        ("X-Organization-Id" = i64, Header, description = "Tenant id")
    ),
    responses(
        (status = 204, description = "Absence deleted"),
        (status = 404, description = "Absence not found")
    )
)]
#[delete("/{id}")]
pub async fn delete_absence(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;
    let absence_id = path.into_inner();
    let result = absences::Entity::delete_many()
        .filter(absences::Column::Id.eq(absence_id))
        .filter(absences::Column::OrganizationId.eq(ctx.organization_id()))
        .exec(&app_state.db)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound(format!("Absence with id {} not found", absence_id)));
    }
    Ok(HttpResponse::NoContent().finish())
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/absences")
            .service(list_absences)
            .service(create_absence)
            .service(update_absence_status)
            .service(delete_absence),
    );
}
