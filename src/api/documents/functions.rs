use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter, Set};
use serde_json::json;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::{
    api::context::TenantContext,
    app_state::AppState,
    config::Config,
    database::models::{doc_files, doc_requests, doc_templates},
    database::types::DocRequestStatus,
    errors::AppError,
    services::{
        documents::{validate_payload, DocKind},
        email_templates::EmailKind,
    },
};

use super::structures::{DocRequestDto, DocRequestView};

pub async fn find_template<C: ConnectionTrait>(
    db: &C,
    key: &str,
) -> Result<doc_templates::Model, AppError> {
    doc_templates::Entity::find()
        .filter(doc_templates::Column::Key.eq(key))
        .one(db)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "Document template `{}` not found, run `admin-cli templates sync`",
                key
            ))
        })
}

pub fn download_url(config: &Config, file_id: i64) -> String {
    let path = format!("/api/documents/files/{}", file_id);
    match config.public_url.as_deref() {
        Some(base) => format!("{}{}", base.trim_end_matches('/'), path),
        None => path,
    }
}

/// Путь файла: `{storage}/{organization_id}/{uuid}.pdf`
pub fn storage_location(root: &Path, organization_id: i64) -> PathBuf {
    root.join(organization_id.to_string())
        .join(format!("{}.pdf", Uuid::new_v4()))
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), AppError> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

pub fn view(
    config: &Config,
    request: doc_requests::Model,
    file: Option<doc_files::Model>,
) -> DocRequestView {
    let download_url = file.as_ref().map(|f| download_url(config, f.id));
    DocRequestView {
        request,
        file,
        download_url,
    }
}

/// Генерация PDF и сохранение файла для созданной заявки
async fn produce_file(
    app_state: &AppState,
    kind: DocKind,
    request: &doc_requests::Model,
) -> Result<doc_files::Model, AppError> {
    let bytes = kind.render(&request.payload)?;
    let path = storage_location(&app_state.config.storage_path(), request.organization_id);
    write_file(&path, &bytes).await?;

    let file = doc_files::ActiveModel {
        organization_id: Set(request.organization_id),
        request_id: Set(request.id),
        file_name: Set(format!("{}-{}.pdf", kind.file_stem(), request.id)),
        storage_path: Set(path.to_string_lossy().into_owned()),
        mime_type: Set("application/pdf".to_string()),
        size_bytes: Set(bytes.len() as i64),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&app_state.db)
    .await?;
    Ok(file)
}

/// Принимает форму, сохраняет заявку и генерирует документ.
/// Ошибка генерации фиксируется в заявке со статусом `failed`.
pub async fn submit_request(
    app_state: &AppState,
    ctx: &TenantContext,
    dto: DocRequestDto,
) -> Result<DocRequestView, AppError> {
    let kind: DocKind = dto.template_key.parse()?;
    let template = find_template(&app_state.db, kind.key()).await?;
    validate_payload(&template.schema, &dto.payload)?;

    let request = doc_requests::ActiveModel {
        organization_id: Set(ctx.organization_id()),
        template_key: Set(template.key.clone()),
        template_version: Set(template.version),
        payload: Set(dto.payload),
        status: Set(DocRequestStatus::Pending.as_str().to_string()),
        error: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&app_state.db)
    .await?;

    let (status, error, file) = match produce_file(app_state, kind, &request).await {
        Ok(file) => (DocRequestStatus::Generated, None, Some(file)),
        Err(err) => {
            log::error!("Document request {} failed: {}", request.id, err);
            (DocRequestStatus::Failed, Some(err.to_string()), None)
        }
    };

    let mut active = request.into_active_model();
    active.status = Set(status.as_str().to_string());
    active.error = Set(error);
    let request = active.update(&app_state.db).await?;

    if let (Some(file), Some(recipient)) = (file.as_ref(), ctx.user_email.as_deref()) {
        let rendered = app_state.templates.render(
            EmailKind::DocumentReady,
            &json!({
                "document_title": template.title,
                "download_url": download_url(&app_state.config, file.id),
                "organization_name": ctx.organization.name,
            }),
        )?;
        let email = app_state.mailer.compose(recipient, rendered, Vec::new());
        if let Err(err) = app_state.mailer.send(&email).await {
            log::warn!("Document {} ready but email failed: {}", file.id, err);
        }
    }

    Ok(view(&app_state.config, request, file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_storage_paths_per_organization() {
        let path = storage_location(Path::new("/var/simplrh"), 12);
        assert!(path.starts_with("/var/simplrh/12"));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("pdf"));
    }

    #[test]
    fn download_url_uses_public_url_when_set() {
        let mut config = Config::default();
        assert_eq!(download_url(&config, 5), "/api/documents/files/5");
        config.public_url = Some("https://app.simplrh.fr/".to_string());
        assert_eq!(download_url(&config, 5), "https://app.simplrh.fr/api/documents/files/5");
    }
}
