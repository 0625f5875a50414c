use actix_web::{HttpRequest, HttpResponse, get, post, put, web};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, IntoActiveModel, Set};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    api::{context::resolve_tenant_context, validation},
    app_state::AppState,
    database::models::organizations,
    errors::AppError,
    services::invoice_numbering::{DEFAULT_PREFIX, normalize_prefix},
};

/// Срок оплаты между профессионалами ограничен 60 днями
const MAX_PAYMENT_TERMS_DAYS: i32 = 60;
const DEFAULT_PAYMENT_TERMS_DAYS: i32 = 30;

#[derive(Deserialize, ToSchema, Clone)]
pub struct OrganizationDto {
    pub name: String,
    pub legal_form: Option<String>,
    pub siret: Option<String>,
    pub vat_number: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub iban: Option<String>,
    pub invoice_prefix: Option<String>,
    pub payment_terms_days: Option<i32>,
}

fn normalize_iban(value: Option<&str>) -> Result<Option<String>, AppError> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();
    let valid = (15..=34).contains(&compact.len())
        && compact[..2].chars().all(|c| c.is_ascii_alphabetic())
        && compact.chars().all(|c| c.is_ascii_alphanumeric());
    if !valid {
        return Err(AppError::InvalidInput("`iban` is not a valid IBAN".into()));
    }
    Ok(Some(compact))
}

fn apply_dto(dto: &OrganizationDto, model: &mut organizations::ActiveModel) -> Result<(), AppError> {
    let terms = dto.payment_terms_days.unwrap_or(DEFAULT_PAYMENT_TERMS_DAYS);
    if !(0..=MAX_PAYMENT_TERMS_DAYS).contains(&terms) {
        return Err(AppError::InvalidInput(format!(
            "`payment_terms_days` must be between 0 and {}",
            MAX_PAYMENT_TERMS_DAYS
        )));
    }

    model.name = Set(validation::required_text("name", &dto.name, 200)?);
    model.legal_form = Set(validation::optional_text("legal_form", dto.legal_form.as_deref(), 120)?);
    model.siret = Set(validation::optional_siret(dto.siret.as_deref())?);
    model.vat_number = Set(validation::optional_vat_number(dto.vat_number.as_deref())?);
    model.address = Set(validation::optional_text("address", dto.address.as_deref(), 255)?);
    model.postal_code = Set(validation::optional_text("postal_code", dto.postal_code.as_deref(), 10)?);
    model.city = Set(validation::optional_text("city", dto.city.as_deref(), 120)?);
    model.email = Set(validation::required_email("email", &dto.email)?);
    model.phone = Set(validation::optional_phone(dto.phone.as_deref())?);
    model.iban = Set(normalize_iban(dto.iban.as_deref())?);
    model.invoice_prefix = Set(normalize_prefix(
        dto.invoice_prefix.as_deref().unwrap_or(DEFAULT_PREFIX),
    )?);
    model.payment_terms_days = Set(terms);
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/organizations",
    tag = "Organizations",
    request_body = OrganizationDto,
    responses(
        (status = 201, description = "Organization created", body = organizations::Model),
        (status = 400, description = "Invalid input")
    )
)]
#[post("")]
pub async fn create_organization(
    app_state: web::Data<AppState>,
    dto: web::Json<OrganizationDto>,
) -> Result<HttpResponse, AppError> {
    let mut model = organizations::ActiveModel {
        created_at: Set(Utc::now()),
        updated_at: Set(None),
        ..Default::default()
    };
    apply_dto(&dto, &mut model)?;

    let created = model.insert(&app_state.db).await?;
    log::info!("Organization {} created: {}", created.id, created.name);
    Ok(HttpResponse::Created().json(created))
}

#[utoipa::path(
    get,
    path = "/api/organizations/current",
    tag = "Organizations",
    params(("X-Organization-Id" = i64, Header, description = "Tenant id")),
    responses(
        (status = 200, description = "Current organization", body = organizations::Model),
        (status = 401, description = "Missing or unknown organization")
    )
)]
#[get("/current")]
pub async fn get_current_organization(
    req: HttpRequest,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;
    Ok(HttpResponse::Ok().json(ctx.organization))
}

#[utoipa::path(
    put,
    path = "/api/organizations/current",
    tag = "Organizations",
    params(("X-Organization-Id" = i64, Header, description = "Tenant id")),
    request_body = OrganizationDto,
    responses(
        (status = 200, description = "Organization updated", body = organizations::Model),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Missing or unknown organization")
    )
)]
#[put("/current")]
pub async fn update_current_organization(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    dto: web::Json<OrganizationDto>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;
    let actor = ctx.actor().to_string();

    let mut model = ctx.organization.into_active_model();
    apply_dto(&dto, &mut model)?;
    model.updated_at = Set(Some(Utc::now()));

    let updated = model.update(&app_state.db).await?;
    log::info!("Organization {} settings updated by {}", updated.id, actor);
    Ok(HttpResponse::Ok().json(updated))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/organizations")
            .service(create_organization)
            .service(get_current_organization)
            .service(update_current_organization),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dto() -> OrganizationDto {
        OrganizationDto {
            name: "Atelier Dupont".into(),
            legal_form: None,
            siret: Some("73282932000074".into()),
            vat_number: None,
            address: None,
            postal_code: None,
            city: None,
            email: "contact@atelier.fr".into(),
            phone: None,
            iban: Some("fr76 3000 6000 0112 3456 7890 189".into()),
            invoice_prefix: None,
            payment_terms_days: None,
        }
    }

    #[test]
    fn applies_defaults_and_normalizes() {
        let mut model = <organizations::ActiveModel as Default>::default();
        apply_dto(&dto(), &mut model).unwrap();
        assert_eq!(model.invoice_prefix.unwrap(), "FAC");
        assert_eq!(model.payment_terms_days.unwrap(), 30);
        assert_eq!(model.iban.unwrap().as_deref(), Some("FR7630006000011234567890189"));
    }

    #[test]
    fn rejects_long_payment_terms() {
        let mut bad = dto();
        bad.payment_terms_days = Some(90);
        let mut model = <organizations::ActiveModel as Default>::default();
        assert!(apply_dto(&bad, &mut model).is_err());
    }

    #[test]
    fn rejects_bad_iban() {
        assert!(normalize_iban(Some("12345")).is_err());
        assert_eq!(normalize_iban(Some("  ")).unwrap(), None);
    }
}
