pub mod invoice;
pub mod legal;
pub mod writer;

pub use invoice::{render_invoice, InvoiceDocument};
pub use writer::PdfWriter;
