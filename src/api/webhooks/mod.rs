pub mod functions;
pub mod handlers;
pub mod structures;

pub use handlers::{__path_payment_webhook, init_routes, payment_webhook};

pub use structures::WebhookOutcome;
