use actix_files::NamedFile;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{HttpRequest, HttpResponse, get, post, web};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};

use crate::{
    api::{context::resolve_tenant_context, helpers::safe_file_name},
    app_state::AppState,
    database::models::{doc_files, doc_requests, doc_templates},
    errors::AppError,
};

use super::functions::{self, find_template, view};
use super::structures::{DocRequestDto, DocRequestView};

/// Доступные шаблоны юридических документов
#[utoipa::path(
    get,
    path = "/api/documents/templates",
    tag = "Documents",
    responses((status = 200, description = "Templates", body = [doc_templates::Model]))
)]
#[get("/templates")]
pub async fn list_templates(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let templates = doc_templates::Entity::find()
        .order_by_asc(doc_templates::Column::Key)
        .all(&app_state.db)
        .await?;
    Ok(HttpResponse::Ok().json(templates))
}

#[utoipa::path(
    get,
    path = "/api/documents/templates/{key}",
    tag = "Documents",
    params(("key" = String, Path, description = "Template key")),
    responses(
        (status = 200, description = "Template with its JSON schema", body = doc_templates::Model),
        (status = 404, description = "Template not found")
    )
)]
#[get("/templates/{key}")]
pub async fn get_template(
    app_state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let template = find_template(&app_state.db, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(template))
}

#[utoipa::path(
    get,
    path = "/api/documents/requests",
    tag = "Documents",
    params(("X-Organization-Id" = i64, Header, description = "Tenant id")),
    responses((status = 200, description = "Document requests of the organization", body = [DocRequestView]))
)]
#[get("/requests")]
pub async fn list_requests(
    req: HttpRequest,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;
    let rows = doc_requests::Entity::find()
        .filter(doc_requests::Column::OrganizationId.eq(ctx.organization_id()))
        .order_by_desc(doc_requests::Column::CreatedAt)
        .find_also_related(doc_files::Entity)
        .all(&app_state.db)
        .await?;

    let views: Vec<DocRequestView> = rows
        .into_iter()
        .map(|(request, file)| view(&app_state.config, request, file))
        .collect();
    Ok(HttpResponse::Ok().json(views))
}

/// Заполнение шаблона и генерация PDF
#[utoipa::path(
    post,
    path = "/api/documents/requests",
    tag = "Documents",
    params(("X-Organization-Id" = i64, Header, description = "Tenant id")),
    request_body = DocRequestDto,
    responses(
        (status = 201, description = "Request stored, `status` tells whether the PDF was generated", body = DocRequestView),
        (status = 400, description = "Payload does not match the template schema"),
        (status = 404, description = "Unknown template")
    )
)]
#[post("/requests")]
pub async fn create_request(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    dto: web::Json<DocRequestDto>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;
    let created = functions::submit_request(&app_state, &ctx, dto.into_inner()).await?;
    log::info!(
        "Document request {} ({}) is {} for organization {} by {}",
        created.request.id,
        created.request.template_key,
        created.request.status,
        ctx.organization_id(),
        ctx.actor()
    );
    Ok(HttpResponse::Created().json(created))
}

#[utoipa::path(
    get,
    path = "/api/documents/files/{id}",
    tag = "Documents",
    params(
        ("id" = i64, Path, description = "File ID"),
        ("X-Organization-Id" = i64, Header, description = "Tenant id")
    ),
    responses(
        (status = 200, description = "PDF file", content_type = "application/pdf"),
        (status = 404, description = "File not found")
    )
)]
#[get("/files/{id}")]
pub async fn download_file(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_tenant_context(&req, &app_state).await?;
    let file_id = path.into_inner();
    let file = doc_files::Entity::find_by_id(file_id)
        .filter(doc_files::Column::OrganizationId.eq(ctx.organization_id()))
        .one(&app_state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("File with id {} not found", file_id)))?;

    let named = NamedFile::open_async(&file.storage_path)
        .await
        .map_err(|e| {
            log::error!("Stored file {} is unreadable: {}", file.storage_path, e);
            AppError::NotFound(format!("File with id {} is no longer available", file_id))
        })?
        .set_content_disposition(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(safe_file_name(&file.file_name))],
        });

    Ok(named.into_response(&req))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/documents")
            .service(list_templates)
            .service(get_template)
            .service(list_requests)
            .service(create_request)
            .service(download_file),
    );
}
