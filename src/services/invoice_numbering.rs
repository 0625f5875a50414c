use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect};
use std::collections::HashSet;

use crate::database::models::invoices;
use crate::errors::AppError;

pub const DEFAULT_PREFIX: &str = "FAC";

/// `FAC-0007`; ширина растёт после 9999
pub fn format_invoice_number(prefix: &str, sequence: u64) -> String {
    format!("{}-{:04}", prefix, sequence)
}

/// Следующий номер: количество счетов + 1, с пропуском уже занятых номеров
pub fn pick_next_number(prefix: &str, existing: &HashSet<String>) -> String {
    let mut sequence = existing.len() as u64 + 1;
    loop {
        let candidate = format_invoice_number(prefix, sequence);
        if !existing.contains(&candidate) {
            return candidate;
        }
        sequence += 1;
    }
}

pub fn normalize_prefix(raw: &str) -> Result<String, AppError> {
    let prefix = raw.trim().to_ascii_uppercase();
    if prefix.is_empty() || prefix.len() > 10 || !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::InvalidInput(
            "Invoice prefix must be 1-10 alphanumeric characters".to_string(),
        ));
    }
    Ok(prefix)
}

/// Генерирует номер для нового счёта организации.
/// Вызывать внутри транзакции, в которой счёт будет вставлен.
pub async fn next_invoice_number<C: ConnectionTrait>(
    db: &C,
    organization_id: i64,
    prefix: &str,
) -> Result<String, AppError> {
    let numbers: Vec<String> = invoices::Entity::find()
        .select_only()
        .column(invoices::Column::Number)
        .filter(invoices::Column::OrganizationId.eq(organization_id))
        .into_tuple()
        .all(db)
        .await?;

    let existing: HashSet<String> = numbers.into_iter().collect();
    let number = pick_next_number(prefix, &existing);
    log::debug!(
        "Allocated invoice number {} for organization {}",
        number,
        organization_id
    );
    Ok(number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_to_four_digits() {
        assert_eq!(format_invoice_number("FAC", 1), "FAC-0001");
        assert_eq!(format_invoice_number("FAC", 42), "FAC-0042");
        assert_eq!(format_invoice_number("INV", 12345), "INV-12345");
    }

    #[test]
    fn serial_creation_is_sequential_and_unique() {
        let mut existing = HashSet::new();
        for expected in 1..=25u64 {
            let number = pick_next_number("FAC", &existing);
            assert_eq!(number, format_invoice_number("FAC", expected));
            assert!(existing.insert(number));
        }
    }

    #[test]
    fn skips_numbers_left_by_deleted_drafts() {
        // FAC-0002 удалён, счётчик указывает на занятый FAC-0003
        let existing: HashSet<String> = ["FAC-0001", "FAC-0003"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(pick_next_number("FAC", &existing), "FAC-0004");
    }

    #[test]
    fn validates_prefix() {
        assert_eq!(normalize_prefix(" fac ").unwrap(), "FAC");
        assert!(normalize_prefix("").is_err());
        assert!(normalize_prefix("FA-C").is_err());
    }
}
