//! Простые функции валидации для входных DTO.
//! Позволяет раннее отбрасывание некорректных данных.

use regex::Regex;

use crate::errors::AppError;

lazy_static::lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap();
    static ref PHONE_RE: Regex = Regex::new(r"^[0-9+]{6,20}$").unwrap();
    static ref VAT_FR_RE: Regex = Regex::new(r"^FR[0-9A-Z]{2}[0-9]{9}$").unwrap();
}

pub fn validate_email_opt(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn sanitize_phone(phone: &str) -> Option<String> {
    let digits: String = phone
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();
    if PHONE_RE.is_match(&digits) {
        Some(digits)
    } else {
        None
    }
}

pub fn ensure_max_len(value: &str, max: usize) -> bool {
    value.chars().count() <= max
}

/// Обязательное текстовое поле: обрезает пробелы, проверяет длину
pub fn required_text(field: &str, value: &str, max: usize) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput(format!("`{}` is required", field)));
    }
    if !ensure_max_len(trimmed, max) {
        return Err(AppError::InvalidInput(format!(
            "`{}` must be at most {} characters",
            field, max
        )));
    }
    Ok(trimmed.to_string())
}

/// Необязательное поле: пустая строка превращается в `None`
pub fn optional_text(field: &str, value: Option<&str>, max: usize) -> Result<Option<String>, AppError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => required_text(field, v, max).map(Some),
        None => Ok(None),
    }
}

pub fn required_email(field: &str, value: &str) -> Result<String, AppError> {
    let email = value.trim().to_ascii_lowercase();
    if !validate_email_opt(&email) {
        return Err(AppError::InvalidInput(format!("`{}` is not a valid email", field)));
    }
    Ok(email)
}

pub fn optional_email(field: &str, value: Option<&str>) -> Result<Option<String>, AppError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => required_email(field, v).map(Some),
        None => Ok(None),
    }
}

pub fn optional_phone(value: Option<&str>) -> Result<Option<String>, AppError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => sanitize_phone(v)
            .map(Some)
            .ok_or_else(|| AppError::InvalidInput("`phone` is not a valid phone number".into())),
        None => Ok(None),
    }
}

/// SIRET: 14 цифр и контрольная сумма Луна
pub fn is_valid_siret(value: &str) -> bool {
    if value.len() != 14 || !value.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let sum: u32 = value
        .bytes()
        .rev()
        .enumerate()
        .map(|(idx, b)| {
            let digit = u32::from(b - b'0');
            if idx % 2 == 1 {
                let doubled = digit * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                digit
            }
        })
        .sum();
    sum % 10 == 0
}

pub fn optional_siret(value: Option<&str>) -> Result<Option<String>, AppError> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if !is_valid_siret(&compact) {
        return Err(AppError::InvalidInput("`siret` is not a valid SIRET number".into()));
    }
    Ok(Some(compact))
}

pub fn optional_vat_number(value: Option<&str>) -> Result<Option<String>, AppError> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();
    // иностранные номера принимаем как есть, французские проверяем по формату
    if compact.starts_with("FR") && !VAT_FR_RE.is_match(&compact) {
        return Err(AppError::InvalidInput("`vat_number` is not a valid French VAT number".into()));
    }
    if !ensure_max_len(&compact, 20) {
        return Err(AppError::InvalidInput("`vat_number` is too long".into()));
    }
    Ok(Some(compact))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checks_siret_luhn() {
        assert!(is_valid_siret("73282932000074"));
        assert!(!is_valid_siret("73282932000075"));
        assert!(!is_valid_siret("7328293200007"));
        assert!(!is_valid_siret("7328293200007A"));
        assert_eq!(
            optional_siret(Some("732 829 320 00074")).unwrap().as_deref(),
            Some("73282932000074")
        );
    }

    #[test]
    fn trims_and_requires_text() {
        assert_eq!(required_text("name", "  Dupont ", 50).unwrap(), "Dupont");
        assert!(required_text("name", "   ", 50).is_err());
        assert!(required_text("name", "abcdef", 3).is_err());
        assert_eq!(optional_text("notes", Some(""), 10).unwrap(), None);
    }

    #[test]
    fn normalizes_emails_and_vat() {
        assert_eq!(required_email("email", " Compta@Example.FR ").unwrap(), "compta@example.fr");
        assert!(required_email("email", "not-an-email").is_err());
        assert_eq!(
            optional_vat_number(Some("fr 44 732829320")).unwrap().as_deref(),
            Some("FR44732829320")
        );
        assert!(optional_vat_number(Some("FR12")).is_err());
        assert_eq!(optional_vat_number(Some("DE123456789")).unwrap().as_deref(), Some("DE123456789"));
    }
}
