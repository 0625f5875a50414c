use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use dotenvy::dotenv;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use simplrh::api::{self, middleware::RequestId, openapi::ApiDoc};
use simplrh::app_state::AppState;
use simplrh::config::Config;
use simplrh::database;
use simplrh::errors::AppError;

fn build_cors(origins: &[String]) -> Cors {
    if origins.iter().any(|o| o == "*") {
        return Cors::permissive();
    }
    let mut cors = Cors::default()
        .allow_any_method()
        .allow_any_header()
        .expose_headers(vec![api::middleware::REQUEST_ID_HEADER])
        .max_age(3600);
    for origin in origins {
        cors = cors.allowed_origin(origin);
    }
    cors
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env()
        .map_err(|e| std::io::Error::other(format!("Failed to load configuration: {}", e)))?;
    let db = database::connect().await?;

    let app_state = AppState::new(db, config.clone())
        .map_err(|e| std::io::Error::other(format!("Failed to compile email templates: {}", e)))?;
    let app_state = web::Data::new(app_state);
    tokio::fs::create_dir_all(config.storage_path()).await?;

    let host = config.host.clone();
    let port = config.port;
    let json_limit = config.effective_max_body_bytes();
    let origins = config.cors_origins();
    let openapi = ApiDoc::openapi();

    log::info!("Starting server at http://{}:{}", host, port);
    log::info!("Swagger UI available at http://{}:{}/swagger-ui/", host, port);
    if origins.is_empty() {
        log::warn!("ALLOWED_ORIGINS is empty, cross-origin requests will be rejected");
    }

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::NormalizePath::trim())
            .wrap(middleware::Logger::default())
            .wrap(RequestId)
            .wrap(build_cors(&origins))
            .app_data(app_state.clone())
            .app_data(web::JsonConfig::default().limit(json_limit).error_handler(|err, _req| {
                AppError::InvalidInput(err.to_string()).into()
            }))
            .app_data(web::PayloadConfig::new(json_limit))
            .service(web::scope("/api").configure(api::configure))
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone()),
            )
    })
    .workers(num_cpus::get())
    .bind((host, port))?
    .run()
    .await
}
