use serde::Serialize;
use utoipa::ToSchema;

use crate::database::models::{invoices, payments};

#[derive(Serialize, ToSchema, Clone, Debug)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// Оплата записана, статус счёта обновлён
    Recorded {
        payment: payments::Model,
        invoice: invoices::Model,
    },
    /// Событие с этим `external_id` уже обработано
    Duplicate { external_id: String },
    /// Тип события не касается оплат
    Ignored,
}
