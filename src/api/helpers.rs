use actix_web::HttpResponse;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};

use crate::errors::AppError;

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 200;

/// Проверяет параметры пагинации, страницы считаются с 1
pub fn page_params(page: Option<u64>, limit: Option<u64>) -> Result<(u64, u64), AppError> {
    let page = page.unwrap_or(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if page == 0 || limit == 0 || limit > MAX_PAGE_SIZE {
        return Err(AppError::InvalidInput("Invalid pagination parameters".into()));
    }
    Ok((page, limit))
}

/// Ответ-вложение (PDF, CSV, XML)
pub fn attachment(content_type: &str, file_name: &str, bytes: Vec<u8>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(content_type)
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(file_name.to_string())],
        })
        .body(bytes)
}

/// Имя файла без символов, которые ломают заголовок или путь
pub fn safe_file_name(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_pagination() {
        assert_eq!(page_params(None, None).unwrap(), (1, DEFAULT_PAGE_SIZE));
        assert_eq!(page_params(Some(3), Some(50)).unwrap(), (3, 50));
        assert!(page_params(Some(0), None).is_err());
        assert!(page_params(None, Some(0)).is_err());
        assert!(page_params(None, Some(MAX_PAGE_SIZE + 1)).is_err());
    }

    #[test]
    fn sanitizes_file_names() {
        assert_eq!(safe_file_name("FAC-0001.pdf"), "FAC-0001.pdf");
        assert_eq!(safe_file_name("../etc/pass wd"), ".._etc_pass_wd");
    }

    #[test]
    fn attachment_sets_disposition() {
        let resp = attachment("text/csv", "export.csv", b"a;b".to_vec());
        let disposition = resp
            .headers()
            .get("content-disposition")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(disposition.starts_with("attachment"));
        assert!(disposition.contains("export.csv"));
    }
}
