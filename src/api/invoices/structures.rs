use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::database::models::{customers, invoice_items, invoices, payments};
use crate::database::types::PaymentMethod;
use crate::services::invoice_totals::{TaxableLine, VatBreakdown};

#[derive(Deserialize, ToSchema, Clone, Debug)]
pub struct InvoiceItemDto {
    pub label: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Ставка НДС в процентах, например 20 или 5.5
    pub vat_rate: Decimal,
}

impl TaxableLine for InvoiceItemDto {
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

/// Тело создания и редактирования счёта. Итоги всегда считаются на сервере.
#[derive(Deserialize, ToSchema, Clone, Debug)]
pub struct InvoiceDto {
    pub customer_id: i64,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub items: Vec<InvoiceItemDto>,
}

#[derive(Deserialize, IntoParams)]
pub struct InvoiceQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<String>,
    pub customer_id: Option<i64>,
}

#[derive(Serialize, ToSchema)]
pub struct InvoiceListResponse {
    pub invoices: Vec<invoices::Model>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

#[derive(Serialize, ToSchema)]
pub struct InvoiceDetails {
    pub invoice: invoices::Model,
    pub customer: customers::Model,
    pub items: Vec<invoice_items::Model>,
    pub vat_breakdown: Vec<VatBreakdown>,
    pub paid_amount: Decimal,
    pub amount_due: Decimal,
}

#[derive(Deserialize, ToSchema, Clone, Debug)]
pub struct PaymentDto {
    pub amount: Decimal,
    pub method: PaymentMethod,
    /// По умолчанию сегодня
    pub paid_at: Option<NaiveDate>,
    pub reference: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct PaymentRecorded {
    pub payment: payments::Model,
    pub invoice: invoices::Model,
}

#[derive(Serialize, ToSchema)]
pub struct InvoiceEmailResponse {
    pub invoice: invoices::Model,
    pub recipient: String,
}

#[derive(Serialize, ToSchema)]
pub struct MarkOverdueResponse {
    pub updated: u64,
}
