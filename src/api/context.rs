use actix_web::{HttpRequest, web};
use sea_orm::EntityTrait;

use crate::{app_state::AppState, database::models::organizations, errors::AppError};

/// Заголовок с организацией, проставляется шлюзом авторизации
pub const ORGANIZATION_HEADER: &str = "X-Organization-Id";
/// Необязательный заголовок, только для логов
pub const USER_EMAIL_HEADER: &str = "X-User-Email";

#[derive(Clone)]
pub struct TenantContext {
    pub organization: organizations::Model,
    pub user_email: Option<String>,
}

impl TenantContext {
    pub fn organization_id(&self) -> i64 {
        self.organization.id
    }

    /// Кто выполняет действие, для журналов
    pub fn actor(&self) -> &str {
        self.user_email.as_deref().unwrap_or("anonymous")
    }
}

fn header_value<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub fn parse_organization_id(req: &HttpRequest) -> Result<i64, AppError> {
    let raw = header_value(req, ORGANIZATION_HEADER)
        .ok_or_else(|| AppError::Unauthorized(format!("Missing `{}` header", ORGANIZATION_HEADER)))?;

    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::Unauthorized(format!("Invalid `{}` header", ORGANIZATION_HEADER)))
}

pub async fn resolve_tenant_context(
    req: &HttpRequest,
    app_state: &web::Data<AppState>,
) -> Result<TenantContext, AppError> {
    let organization_id = parse_organization_id(req)?;

    let organization = organizations::Entity::find_by_id(organization_id)
        .one(&app_state.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Organization not found".to_string()))?;

    let user_email = header_value(req, USER_EMAIL_HEADER).map(str::to_string);

    log::debug!(
        "organization_id={} user={}",
        organization.id,
        user_email.as_deref().unwrap_or("-")
    );

    Ok(TenantContext {
        organization,
        user_email,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn reads_organization_header() {
        let req = TestRequest::default()
            .insert_header((ORGANIZATION_HEADER, " 42 "))
            .to_http_request();
        assert_eq!(parse_organization_id(&req).unwrap(), 42);
    }

    #[test]
    fn missing_or_bad_header_is_unauthorized() {
        let req = TestRequest::default().to_http_request();
        assert!(matches!(
            parse_organization_id(&req),
            Err(AppError::Unauthorized(_))
        ));

        for bad in ["abc", "-3", "0"] {
            let req = TestRequest::default()
                .insert_header((ORGANIZATION_HEADER, bad))
                .to_http_request();
            assert!(parse_organization_id(&req).is_err(), "{}", bad);
        }
    }
}
