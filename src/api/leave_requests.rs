use actix_web::{HttpRequest, HttpResponse, get, patch, post, web};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::{
        absences::ensure_date_range, context::resolve_tenant_context, employees::find_employee,
        validation,
    },
    app_state::AppState,
    database::models::{absences, employees, leave_requests, organizations},
    database::types::{AbsenceKind, ApprovalStatus},
    errors::AppError,
    services::{email_templates::EmailKind, pdf::invoice::format_date_fr},
};

#[derive(Deserialize, ToSchema, Clone)]
pub struct LeaveRequestDto {
    pub employee_id: i64,
    pub kind: AbsenceKind,
    pub start_date: chrono::NaiveDate,
    pub end_date: chrono::NaiveDate,
    pub reason: Option<String>,
}

#[derive(Deserialize, ToSchema, Clone)]
pub struct LeaveDecisionDto {
    /// `approved` или `rejected`
    pub decision: ApprovalStatus,
}

#[derive(Deserialize, IntoParams)]
pub struct LeaveRequestQuery {
    pub employee_id: Option<i64>,
    pub status: Option<ApprovalStatus>,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveDecisionResponse {
    pub leave_request: leave_requests::Model,
    /// Созданное отсутствие, если заявка одобрена
    pub absence: Option<absences::Model>,
}

fn decision_label(status: ApprovalStatus) -> &'static str {
    match status {
        ApprovalStatus::Approved => "acceptée",
        ApprovalStatus::Rejected => "refusée",
        ApprovalStatus::Pending => "mise en attente",
    }
}

fn kind_label(kind: &str) -> String {
    kind.parse::<AbsenceKind>()
        .map(|k| k.label_fr().to_string())
        .unwrap_or_else(|_| kind.to_string())
}

/// Письмо руководителю (или на адрес организации) о новой заявке
async fn notify_submitted(
    app_state: &AppState,
    organization: &organizations::Model,
    employee: &employees::Model,
    request: &leave_requests::Model,
) -> Result<(), AppError> {
    let recipient = employee
        .manager_email
        .clone()
        .unwrap_or_else(|| organization.email.clone());
    let rendered = app_state.templates.render(
        EmailKind::LeaveRequestSubmitted,
        &json!({
            "employee_name": employee.full_name(),
            "kind": kind_label(&request.kind),
            "start_date": format_date_fr(request.start_date),
            "end_date": format_date_fr(request.end_date),
            "reason": request.reason,
        }),
    )?;
    let email = app_state.mailer.compose(recipient, rendered, Vec::new());
    app_state.mailer.send(&email).await
}

async fn notify_decision(
    app_state: &AppState,
    organization: &organizations::Model,
    employee: &employees::Model,
    request: &leave_requests::Model,
    decision: ApprovalStatus,
) -> Result<(), AppError> {
    let rendered = app_state.templates.render(
        EmailKind::LeaveRequestDecision,
        &json!({
            "employee_first_name": employee.first_name,
            "kind": kind_label(&request.kind),
            "start_date": format_date_fr(request.start_date),
            "end_date": format_date_fr(request.end_date),
            "decision": decision_label(decision),
            "organization_name": organization.name,
        }),
    )?;
    let email = app_state.mailer.compose(employee.email.clone(), rendered, Vec::new());
    app_state.mailer.send(&email).await
}

/// Меняет статус заявки и при одобрении создаёт отсутствие, всё в одной транзакции
pub async fn apply_decision(
    db: &DatabaseConnection,
    organization_id: i64,
    request_id: i64,
    decision: ApprovalStatus,
) -> Result<(leave_requests::Model, Option<absences::Model>, employees::Model), AppError> {
    let txn = db.begin().await?;
    let request = leave_requests::Entity::find_by_id(request_id)
        .filter(leave_requests::Column::OrganizationId.eq(organization_id))
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Leave request with id {} not found", request_id)))?;

    let current: ApprovalStatus = request.status.parse()?;
    if current != ApprovalStatus::Pending {
        return Err(AppError::Conflict(format!(
            "Leave request {} is already {}",
            request.id, current
        )));
    }

    let employee = find_employee(&txn, organization_id, request.employee_id).await?;

    let mut active = request.into_active_model();
    active.status = Set(decision.as_str().to_string());
    active.decided_at = Set(Some(Utc::now()));
    let request = active.update(&txn).await?;

    let absence = if decision == ApprovalStatus::Approved {
        let absence = absences::ActiveModel {
            organization_id: Set(request.organization_id),
            employee_id: Set(request.employee_id),
            kind: Set(request.kind.clone()),
            start_date: Set(request.start_date),
            end_date: Set(request.end_date),
            status: Set(ApprovalStatus::Approved.as_str().to_string()),
            comment: Set(request.reason.clone()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        Some(absence)
    } else {
        None
    };
    txn.commit().await?;
    Ok((request, absence, employee))
}

#[utoipa::path(
    get,
    path = "/api/leave-requests",
    tag = "Leave requests",
    params(LeaveRequestQuery, ("X-Organization-Id" = i64, Header, description = "Tenant id")),
    responses((status = 200, description = "Leave requests", body = [leave_requests::Model]))
)]
#[get("")]
pub async fn list_leave_requests(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    query: web::Query<LeaveRequestQuery>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;

    let mut select = leave_requests::Entity::find()
        .filter(leave_requests::Column::OrganizationId.eq(ctx.organization_id()));
    if let Some(employee_id) = query.employee_id {
        select = select.filter(leave_requests::Column::EmployeeId.eq(employee_id));
    }
    if let Some(status) = query.status {
        select = select.filter(leave_requests::Column::Status.eq(status.as_str()));
    }

    let requests = select
        .order_by_desc(leave_requests::Column::CreatedAt)
        .all(&app_state.db)
        .await?;
    Ok(HttpResponse::Ok().json(requests))
}

/// Подача заявки, руководитель получает письмо
#[utoipa::path(
    post,
    path = "/api/leave-requests",
    tag = "Leave requests",
    params(("X-Organization-Id" = i64, Header, description = "Tenant id")),
    request_body = LeaveRequestDto,
    responses(
        (status = 201, description = "Leave request submitted", body = leave_requests::Model),
        (status = 400, description = "Invalid dates"),
        (status = 404, description = "Employee not found")
    )
)]
#[post("")]
pub async fn create_leave_request(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    dto: web::Json<LeaveRequestDto>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;
    ensure_date_range(dto.start_date, dto.end_date)?;
    let reason = validation::optional_text("reason", dto.reason.as_deref(), 1000)?;
    let employee = find_employee(&app_state.db, ctx.organization_id(), dto.employee_id).await?;

    let created = leave_requests::ActiveModel {
        organization_id: Set(ctx.organization_id()),
        employee_id: Set(employee.id),
        kind: Set(dto.kind.as_str().to_string()),
        start_date: Set(dto.start_date),
        end_date: Set(dto.end_date),
        reason: Set(reason),
        status: Set(ApprovalStatus::Pending.as_str().to_string()),
        decided_at: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&app_state.db)
    .await?;

    if let Err(err) = notify_submitted(&app_state, &ctx.organization, &employee, &created).await {
        log::warn!("Leave request {} saved but notification failed: {}", created.id, err);
    }

    Ok(HttpResponse::Created().json(created))
}

/// Решение по заявке. Одобрение создаёт отсутствие с теми же датами.
#[utoipa::path(
    patch,
    path = "/api/leave-requests/{id}/decision",
    tag = "Leave requests",
    params(
        ("id" = i64, Path, description = "Leave request ID"),
        ("X-Organization-Id" = i64, Header, description = "Tenant id")
    ),
    request_body = LeaveDecisionDto,
    responses(
        (status = 200, description = "Decision recorded", body = LeaveDecisionResponse),
        (status = 400, description = "Decision must be approved or rejected"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request already decided")
    )
)]
#[patch("/{id}/decision")]
pub async fn decide_leave_request(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i64>,
    dto: web::Json<LeaveDecisionDto>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;
    let decision = dto.decision;
    if decision == ApprovalStatus::Pending {
        return Err(AppError::InvalidInput(
            "Decision must be `approved` or `rejected`".to_string(),
        ));
    }
    let (request, absence, employee) =
        apply_decision(&app_state.db, ctx.organization_id(), path.into_inner(), decision).await?;

    log::info!(
        "Leave request {} {} by {}",
        request.id,
        decision,
        ctx.actor()
    );
    if let Err(err) =
        notify_decision(&app_state, &ctx.organization, &employee, &request, decision).await
    {
        log::warn!("Decision on leave request {} not emailed: {}", request.id, err);
    }

    Ok(HttpResponse::Ok().json(LeaveDecisionResponse {
        leave_request: request,
        absence,
    }))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/leave-requests")
            .service(list_leave_requests)
            .service(create_leave_request)
            .service(decide_leave_request),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, d).unwrap()
    }

    fn leave_request(status: ApprovalStatus) -> leave_requests::Model {
        leave_requests::Model {
            id: 4,
            organization_id: 1,
            employee_id: 2,
            kind: AbsenceKind::PaidLeave.as_str().to_string(),
            start_date: date(13),
            end_date: date(17),
            reason: Some("Vacances de printemps".to_string()),
            status: status.as_str().to_string(),
            decided_at: None,
            created_at: Utc.with_ymd_and_hms(2026, 3, 20, 8, 0, 0).unwrap(),
        }
    }

    fn employee() -> employees::Model {
        employees::Model {
            id: 2,
            organization_id: 1,
            registration_number: "M-002".to_string(),
            first_name: "Claire".to_string(),
            last_name: "Moreau".to_string(),
            email: "claire.moreau@atelier-dupont.fr".to_string(),
            job_title: None,
            hire_date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
            manager_email: None,
            created_at: Utc.with_ymd_and_hms(2024, 9, 1, 8, 0, 0).unwrap(),
        }
    }

    #[actix_web::test]
    async fn approval_writes_absence_in_the_same_transaction() {
        let mut approved = leave_request(ApprovalStatus::Approved);
        approved.decided_at = Some(Utc.with_ymd_and_hms(2026, 3, 21, 9, 0, 0).unwrap());
        let absence = absences::Model {
            id: 30,
            organization_id: 1,
            employee_id: 2,
            kind: approved.kind.clone(),
            start_date: date(13),
            end_date: date(17),
            status: ApprovalStatus::Approved.as_str().to_string(),
            comment: approved.reason.clone(),
            created_at: Utc.with_ymd_and_hms(2026, 3, 21, 9, 0, 0).unwrap(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![leave_request(ApprovalStatus::Pending)]])
            .append_query_results([vec![employee()]])
            .append_query_results([vec![approved]])
            .append_query_results([vec![absence]])
            .into_connection();

        let (request, absence, _) = apply_decision(&db, 1, 4, ApprovalStatus::Approved)
            .await
            .unwrap();
        assert_eq!(request.status, "approved");
        let absence = absence.unwrap();
        assert_eq!((absence.start_date, absence.end_date), (date(13), date(17)));

        let log = db.into_transaction_log();
        let decided = log
            .iter()
            .find(|t| {
                t.statements()
                    .iter()
                    .any(|s| s.sql.starts_with(r#"UPDATE "leave_requests""#))
            })
            .unwrap();
        assert!(decided
            .statements()
            .iter()
            .any(|s| s.sql.starts_with(r#"INSERT INTO "absences""#)));
    }

    #[actix_web::test]
    async fn rejection_creates_no_absence() {
        let rejected = leave_request(ApprovalStatus::Rejected);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![leave_request(ApprovalStatus::Pending)]])
            .append_query_results([vec![employee()]])
            .append_query_results([vec![rejected]])
            .into_connection();

        let (request, absence, _) = apply_decision(&db, 1, 4, ApprovalStatus::Rejected)
            .await
            .unwrap();
        assert_eq!(request.status, "rejected");
        assert!(absence.is_none());
    }
}
