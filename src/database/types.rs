use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

use crate::errors::AppError;

/// Статусы хранятся в БД строками, перечисления ниже задают допустимые значения.
macro_rules! string_enum {
    ($name:ident, $label:literal { $($variant:ident => $value:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($value => Ok($name::$variant),)+
                    other => Err(AppError::InvalidInput(format!(
                        "Unknown {} `{}`",
                        $label, other
                    ))),
                }
            }
        }
    };
}

// --- Invoice Status ---
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    PartiallyPaid,
}

string_enum!(InvoiceStatus, "invoice status" {
    Draft => "draft",
    Sent => "sent",
    Paid => "paid",
    Overdue => "overdue",
    PartiallyPaid => "partially_paid",
});

impl InvoiceStatus {
    /// Редактировать и удалять можно только черновик
    pub fn is_editable(&self) -> bool {
        matches!(self, InvoiceStatus::Draft)
    }

    /// Счёт выставлен клиенту и ожидает оплаты
    pub fn awaits_payment(&self) -> bool {
        matches!(
            self,
            InvoiceStatus::Sent | InvoiceStatus::Overdue | InvoiceStatus::PartiallyPaid
        )
    }
}

// --- Payment Method ---
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Transfer,
    Card,
    Cheque,
    Cash,
    Other,
}

string_enum!(PaymentMethod, "payment method" {
    Transfer => "transfer",
    Card => "card",
    Cheque => "cheque",
    Cash => "cash",
    Other => "other",
});

// --- Absence Kind ---
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AbsenceKind {
    PaidLeave,
    Rtt,
    SickLeave,
    UnpaidLeave,
    Other,
}

string_enum!(AbsenceKind, "absence kind" {
    PaidLeave => "paid_leave",
    Rtt => "rtt",
    SickLeave => "sick_leave",
    UnpaidLeave => "unpaid_leave",
    Other => "other",
});

impl AbsenceKind {
    /// Подпись для писем и документов
    pub fn label_fr(&self) -> &'static str {
        match self {
            AbsenceKind::PaidLeave => "Congés payés",
            AbsenceKind::Rtt => "RTT",
            AbsenceKind::SickLeave => "Arrêt maladie",
            AbsenceKind::UnpaidLeave => "Congé sans solde",
            AbsenceKind::Other => "Autre absence",
        }
    }
}

// --- Approval Status (absences, leave requests) ---
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

string_enum!(ApprovalStatus, "approval status" {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

// --- Document Request Status ---
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DocRequestStatus {
    Pending,
    Generated,
    Failed,
}

string_enum!(DocRequestStatus, "document request status" {
    Pending => "pending",
    Generated => "generated",
    Failed => "failed",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoice_status_round_trips_through_strings() {
        for status in InvoiceStatus::ALL {
            assert_eq!(status.as_str().parse::<InvoiceStatus>().unwrap(), *status);
        }
        assert_eq!(InvoiceStatus::PartiallyPaid.to_string(), "partially_paid");
    }

    #[test]
    fn unknown_status_is_invalid_input() {
        let err = "archived".parse::<InvoiceStatus>().unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn only_drafts_are_editable() {
        assert!(InvoiceStatus::Draft.is_editable());
        for locked in [
            InvoiceStatus::Sent,
            InvoiceStatus::Paid,
            InvoiceStatus::Overdue,
            InvoiceStatus::PartiallyPaid,
        ] {
            assert!(!locked.is_editable(), "{} must be locked", locked);
        }
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&AbsenceKind::SickLeave).unwrap();
        assert_eq!(json, "\"sick_leave\"");
        let kind: AbsenceKind = serde_json::from_str("\"paid_leave\"").unwrap();
        assert_eq!(kind, AbsenceKind::PaidLeave);
    }
}
