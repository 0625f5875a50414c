use actix_web::{HttpRequest, HttpResponse, get, web};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    api::{context::resolve_tenant_context, helpers},
    app_state::AppState,
    errors::AppError,
    services::payroll_export::{self, PayrollDialect, PayrollPeriod},
};

#[derive(Deserialize, IntoParams)]
pub struct PayrollExportQuery {
    /// `silae` или `payfit`
    pub dialect: String,
    /// Месяц в формате `YYYY-MM`
    pub month: String,
}

/// CSV с одобренными отсутствиями за месяц
#[utoipa::path(
    get,
    path = "/api/payroll/export",
    tag = "Payroll",
    params(PayrollExportQuery, ("X-Organization-Id" = i64, Header, description = "Tenant id")),
    responses(
        (status = 200, description = "CSV attachment", content_type = "text/csv"),
        (status = 400, description = "Unknown dialect or bad month")
    )
)]
#[get("/export")]
pub async fn export_payroll(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    query: web::Query<PayrollExportQuery>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;
    let dialect: PayrollDialect = query.dialect.parse()?;
    let period = PayrollPeriod::parse_month(&query.month)?;

    let csv = payroll_export::export(&app_state.db, ctx.organization_id(), dialect, &period).await?;
    log::info!(
        "Payroll export {:?} {} for organization {} by {}",
        dialect,
        period.label(),
        ctx.organization_id(),
        ctx.actor()
    );

    Ok(helpers::attachment(
        "text/csv; charset=utf-8",
        &dialect.file_name(&period),
        csv,
    ))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/payroll").service(export_payroll));
}
