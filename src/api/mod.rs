pub mod absences;
pub mod context;
pub mod customers;
pub mod documents;
pub mod employees;
pub mod health;
pub mod helpers;
pub mod invoices;
pub mod leave_requests;
pub mod middleware;
pub mod openapi;
pub mod organizations;
pub mod payments;
pub mod payroll;
pub mod validation;
pub mod webhooks;

use actix_web::web;

/// Все маршруты под `/api`
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(health::init_routes)
        .configure(organizations::init_routes)
        .configure(customers::init_routes)
        .configure(invoices::init_routes)
        .configure(payments::init_routes)
        .configure(employees::init_routes)
        .configure(absences::init_routes)
        .configure(leave_requests::init_routes)
        .configure(payroll::init_routes)
        .configure(documents::init_routes)
        .configure(webhooks::init_routes);
}
