pub mod functions;
pub mod handlers;
pub mod structures;

pub use handlers::{
    __path_create_invoice, __path_create_payment, __path_delete_invoice, __path_get_invoice,
    __path_invoice_facturx, __path_invoice_pdf, __path_list_invoices, __path_list_payments,
    __path_mark_overdue, __path_remind_invoice, __path_send_invoice, __path_update_invoice,
    create_invoice, create_payment, delete_invoice, get_invoice, init_routes, invoice_facturx,
    invoice_pdf, list_invoices, list_payments, mark_overdue, remind_invoice, send_invoice,
    update_invoice,
};

pub use structures::{
    InvoiceDetails, InvoiceDto, InvoiceEmailResponse, InvoiceItemDto, InvoiceListResponse,
    InvoiceQuery, MarkOverdueResponse, PaymentDto, PaymentRecorded,
};

pub use functions::find_invoice;
