use utoipa::OpenApi;

use crate::api::{
    absences, customers, documents, employees, health, invoices, leave_requests, organizations,
    payments, payroll, webhooks,
};
use crate::database::models;
use crate::database::types::{
    AbsenceKind, ApprovalStatus, DocRequestStatus, InvoiceStatus, PaymentMethod,
};
use crate::services::{
    invoice_totals::{InvoiceTotals, VatBreakdown},
    payroll_export::{PayrollDialect, PayrollRow},
};

#[derive(OpenApi)]
#[openapi(
    info(title = "SimplRH API", description = "Facturation, RH et documents légaux pour TPE/PME"),
    paths(
        // Health
        health::health,
        // Organizations
        organizations::create_organization,
        organizations::get_current_organization,
        organizations::update_current_organization,
        // Customers
        customers::list_customers,
        customers::create_customer,
        customers::get_customer,
        customers::update_customer,
        customers::delete_customer,
        // Invoices
        invoices::list_invoices,
        invoices::create_invoice,
        invoices::mark_overdue,
        invoices::get_invoice,
        invoices::update_invoice,
        invoices::delete_invoice,
        invoices::send_invoice,
        invoices::remind_invoice,
        invoices::invoice_pdf,
        invoices::invoice_facturx,
        invoices::list_payments,
        invoices::create_payment,
        payments::delete_payment,
        // HR
        employees::list_employees,
        employees::create_employee,
        employees::get_employee,
        employees::update_employee,
        employees::delete_employee,
        absences::list_absences,
        absences::create_absence,
        absences::update_absence_status,
        absences::delete_absence,
        leave_requests::list_leave_requests,
        leave_requests::create_leave_request,
        leave_requests::decide_leave_request,
        payroll::export_payroll,
        // Documents
        documents::list_templates,
        documents::get_template,
        documents::list_requests,
        documents::create_request,
        documents::download_file,
        // Webhooks
        webhooks::payment_webhook,
    ),
    components(
        schemas(
            // --- Models ---
            models::organizations::Model,
            models::customers::Model,
            models::invoices::Model,
            models::invoice_items::Model,
            models::payments::Model,
            models::employees::Model,
            models::absences::Model,
            models::leave_requests::Model,
            models::doc_templates::Model,
            models::doc_requests::Model,
            models::doc_files::Model,

            // --- Enums ---
            InvoiceStatus,
            PaymentMethod,
            AbsenceKind,
            ApprovalStatus,
            DocRequestStatus,
            PayrollDialect,

            // --- DTOs & API Structs ---
            health::HealthResponse,
            organizations::OrganizationDto,
            customers::CustomerDto,
            customers::CustomerListResponse,
            invoices::InvoiceItemDto,
            invoices::InvoiceDto,
            invoices::InvoiceListResponse,
            invoices::InvoiceDetails,
            invoices::PaymentDto,
            invoices::PaymentRecorded,
            invoices::InvoiceEmailResponse,
            invoices::MarkOverdueResponse,
            InvoiceTotals,
            VatBreakdown,
            employees::EmployeeDto,
            employees::EmployeeListResponse,
            absences::AbsenceDto,
            absences::AbsenceStatusDto,
            leave_requests::LeaveRequestDto,
            leave_requests::LeaveDecisionDto,
            leave_requests::LeaveDecisionResponse,
            PayrollRow,
            documents::DocRequestDto,
            documents::DocRequestView,
            webhooks::WebhookOutcome,
        )
    ),
    tags(
        (name = "Health", description = "Liveness and database check"),
        (name = "Organizations", description = "Tenant profile: legal identity, bank details, invoice settings"),
        (name = "Customers", description = "Customers billed by the organization"),
        (name = "Invoices", description = "Invoices, PDF and Factur-X output, payments"),
        (name = "Payments", description = "Payment corrections"),
        (name = "Employees", description = "Employee register"),
        (name = "Absences", description = "Absences and their approval"),
        (name = "Leave requests", description = "Leave requests submitted by employees"),
        (name = "Payroll", description = "Payroll CSV export for Silae and PayFit"),
        (name = "Documents", description = "Legal document templates and generated PDFs"),
        (name = "Webhooks", description = "Payment processor notifications")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_public_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/health",
            "/api/organizations/current",
            "/api/invoices/{id}/facturx",
            "/api/invoices/{id}/payments",
            "/api/payroll/export",
            "/api/documents/requests",
            "/api/webhooks/payments",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
        let schemas = doc.components.expect("components").schemas;
        assert!(schemas.contains_key("Invoice"));
        assert!(schemas.contains_key("LeaveRequest"));
    }
}
