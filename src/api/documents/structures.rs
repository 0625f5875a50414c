use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::database::models::{doc_files, doc_requests};

#[derive(Deserialize, ToSchema, Clone, Debug)]
pub struct DocRequestDto {
    /// Ключ шаблона: `employment_contract`, `cgv`, `mise_en_demeure`
    pub template_key: String,
    /// Данные формы, проверяются по схеме шаблона
    #[schema(value_type = Object)]
    pub payload: Value,
}

#[derive(Serialize, ToSchema)]
pub struct DocRequestView {
    pub request: doc_requests::Model,
    pub file: Option<doc_files::Model>,
    /// Ссылка на скачивание, если файл сгенерирован
    pub download_url: Option<String>,
}
