use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use sea_orm::DbErr;
use thiserror::Error;
use serde::Serialize;

/// Унифицированная структура ответа об ошибке
#[derive(Serialize)]
pub struct ErrorResponse<'a> {
    pub code: &'a str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DbError(#[from] DbErr),

    #[error("Reqwest error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("PDF error: {0}")]
    PdfError(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("XML error: {0}")]
    XmlError(String),

    #[error("Template error: {0}")]
    TemplateError(#[from] handlebars::RenderError),

    #[error("External API error: {0}")]
    ExternalApiError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::DbError(_)
            | AppError::ReqwestError(_)
            | AppError::JsonError(_)
            | AppError::IoError(_)
            | AppError::PdfError(_)
            | AppError::CsvError(_)
            | AppError::XmlError(_)
            | AppError::TemplateError(_)
            | AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ExternalApiError(_) => StatusCode::BAD_GATEWAY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code().is_server_error() {
            log::error!("{}: {}", self.code(), self);
        }
        self.to_response(None)
    }
}

impl AppError {
    /// Тело ошибки; trace_id подставляет middleware RequestId
    pub fn to_response(&self, trace_id: Option<String>) -> HttpResponse {
        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
            details: None,
            trace_id,
        };
        HttpResponse::build(self.status_code()).json(body)
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::DbError(_) => "DB_ERROR",
            AppError::ReqwestError(_) => "HTTP_ERROR",
            AppError::JsonError(_) => "JSON_ERROR",
            AppError::IoError(_) => "IO_ERROR",
            AppError::PdfError(_) => "PDF_ERROR",
            AppError::CsvError(_) => "CSV_ERROR",
            AppError::XmlError(_) => "XML_ERROR",
            AppError::TemplateError(_) => "TEMPLATE_ERROR",
            AppError::ExternalApiError(_) => "EXTERNAL_API_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Internal => "INTERNAL",
        }
    }
}

impl From<lopdf::Error> for AppError {
    fn from(err: lopdf::Error) -> Self {
        AppError::PdfError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_variants_to_status_codes() {
        assert_eq!(
            AppError::Conflict("locked".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::ExternalApiError("down".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(AppError::Internal.code(), "INTERNAL");
    }
}
