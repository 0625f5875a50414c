pub mod documents;
pub mod email_templates;
pub mod facturx;
pub mod invoice_numbering;
pub mod invoice_status;
pub mod invoice_totals;
pub mod mailer;
pub mod payment_webhook;
pub mod payroll_export;
pub mod pdf;
