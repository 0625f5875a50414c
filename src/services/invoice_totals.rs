//! Расчёт сумм счёта: HT (без налога), TVA (НДС) и TTC (с налогом).
//!
//! Вся арифметика ведётся в `Decimal`. Итоги округляются до центов один раз,
//! TTC получается сложением уже округлённых HT и TVA, поэтому
//! `total_ttc == total_ht + total_vat` выполняется точно.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::database::models::invoice_items;
use crate::errors::AppError;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Строка счёта, пригодная для расчёта налогов
pub trait TaxableLine {
    fn quantity(&self) -> Decimal;
    fn unit_price(&self) -> Decimal;
    fn vat_rate(&self) -> Decimal;

    fn line_ht(&self) -> Decimal {
        self.quantity() * self.unit_price()
    }

    fn line_vat(&self) -> Decimal {
        self.line_ht() * self.vat_rate() / HUNDRED
    }
}

impl TaxableLine for invoice_items::Model {
    fn quantity(&self) -> Decimal {
        self.quantity
    }
    fn unit_price(&self) -> Decimal {
        self.unit_price
    }
    fn vat_rate(&self) -> Decimal {
        self.vat_rate
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct InvoiceTotals {
    pub total_ht: Decimal,
    pub total_vat: Decimal,
    pub total_ttc: Decimal,
}

/// Разбивка НДС по ставкам (нужна для PDF и Factur-X)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct VatBreakdown {
    pub rate: Decimal,
    pub base_ht: Decimal,
    pub vat: Decimal,
}

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn compute_totals<L: TaxableLine>(lines: &[L]) -> InvoiceTotals {
    let (ht, vat) = lines.iter().fold((Decimal::ZERO, Decimal::ZERO), |(ht, vat), line| {
        (ht + line.line_ht(), vat + line.line_vat())
    });

    let total_ht = round_money(ht);
    let total_vat = round_money(vat);
    InvoiceTotals {
        total_ht,
        total_vat,
        total_ttc: total_ht + total_vat,
    }
}

pub fn vat_breakdown<L: TaxableLine>(lines: &[L]) -> Vec<VatBreakdown> {
    let mut by_rate: BTreeMap<Decimal, (Decimal, Decimal)> = BTreeMap::new();
    for line in lines {
        let entry = by_rate
            .entry(line.vat_rate().normalize())
            .or_insert((Decimal::ZERO, Decimal::ZERO));
        entry.0 += line.line_ht();
        entry.1 += line.line_vat();
    }

    by_rate
        .into_iter()
        .map(|(rate, (base_ht, vat))| VatBreakdown {
            rate,
            base_ht: round_money(base_ht),
            vat: round_money(vat),
        })
        .collect()
}

/// Проверка строки перед сохранением
pub fn validate_line<L: TaxableLine>(position: usize, line: &L) -> Result<(), AppError> {
    if line.quantity() <= Decimal::ZERO {
        return Err(AppError::InvalidInput(format!(
            "Item #{}: quantity must be greater than zero",
            position + 1
        )));
    }
    if line.unit_price() < Decimal::ZERO {
        return Err(AppError::InvalidInput(format!(
            "Item #{}: unit price must not be negative",
            position + 1
        )));
    }
    if line.vat_rate() < Decimal::ZERO || line.vat_rate() > HUNDRED {
        return Err(AppError::InvalidInput(format!(
            "Item #{}: VAT rate must be between 0 and 100",
            position + 1
        )));
    }
    Ok(())
}

/// Формат суммы для документов: `1 234,50 €`
pub fn format_eur(amount: Decimal) -> String {
    let rounded = round_money(amount);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let raw = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = raw.split_once('.').unwrap_or((raw.as_str(), "00"));

    let mut grouped = String::new();
    for (idx, ch) in int_part.chars().enumerate() {
        if idx > 0 && (int_part.len() - idx) % 3 == 0 {
            grouped.push('\u{a0}');
        }
        grouped.push(ch);
    }

    format!(
        "{}{},{}\u{a0}€",
        if negative { "-" } else { "" },
        grouped,
        frac_part
    )
}

/// Ставка в процентах без лишних нулей: `20`, `5,5`
pub fn format_rate(rate: Decimal) -> String {
    rate.normalize().to_string().replace('.', ",")
}
