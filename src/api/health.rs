use actix_web::{HttpResponse, get, web};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{app_state::AppState, database};

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: bool,
}

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service and database are up", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    )
)]
#[get("/health")]
pub async fn health(app_state: web::Data<AppState>) -> HttpResponse {
    let database = match database::ping(&app_state.db).await {
        Ok(()) => true,
        Err(err) => {
            log::error!("Health check: database ping failed: {}", err);
            false
        }
    };
    let body = HealthResponse {
        status: if database { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
    };
    if database {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health);
}
