use chrono::NaiveDate;

use crate::database::models::{customers, invoice_items, invoices, organizations};
use crate::errors::AppError;
use crate::services::invoice_totals::{self, format_eur, format_rate, TaxableLine};

use super::writer::{Align, PdfWriter, TableColumn};

/// Всё, что нужно для печати счёта
pub struct InvoiceDocument<'a> {
    pub organization: &'a organizations::Model,
    pub customer: &'a customers::Model,
    pub invoice: &'a invoices::Model,
    pub items: &'a [invoice_items::Model],
}

pub fn format_date_fr(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

fn party_lines(
    name: &str,
    address: String,
    siret: Option<&str>,
    vat_number: Option<&str>,
    email: Option<&str>,
) -> Vec<String> {
    let mut lines = vec![name.to_string()];
    if !address.is_empty() {
        lines.push(address);
    }
    if let Some(siret) = siret.filter(|s| !s.is_empty()) {
        lines.push(format!("SIRET : {}", siret));
    }
    if let Some(vat) = vat_number.filter(|s| !s.is_empty()) {
        lines.push(format!("TVA intracom. : {}", vat));
    }
    if let Some(email) = email.filter(|s| !s.is_empty()) {
        lines.push(email.to_string());
    }
    lines
}

pub fn render_invoice(doc: &InvoiceDocument<'_>) -> Result<Vec<u8>, AppError> {
    let invoice = doc.invoice;
    let org = doc.organization;
    let customer = doc.customer;

    let mut writer = PdfWriter::new(&format!("Facture {}", invoice.number));
    writer.header(
        &format!("Facture {}", invoice.number),
        Some(&format!(
            "Émise le {} - échéance le {}",
            format_date_fr(invoice.issue_date),
            format_date_fr(invoice.due_date)
        )),
    );

    let mut seller = party_lines(
        &org.name,
        org.full_address(),
        org.siret.as_deref(),
        org.vat_number.as_deref(),
        Some(&org.email),
    );
    if let Some(form) = org.legal_form.as_deref().filter(|f| !f.is_empty()) {
        seller.insert(1, form.to_string());
    }
    let mut buyer = vec!["Facturé à".to_string()];
    buyer.extend(party_lines(
        &customer.name,
        customer.full_address(),
        customer.siret.as_deref(),
        customer.vat_number.as_deref(),
        Some(&customer.email),
    ));
    // первая строка каждого блока печатается жирным
    let mut seller_block = vec!["Émetteur".to_string()];
    seller_block.extend(seller);
    writer.two_columns(&seller_block, &buyer);

    let columns = [
        TableColumn::new("Désignation", 0.44, Align::Left),
        TableColumn::new("Qté", 0.10, Align::Right),
        TableColumn::new("PU HT", 0.16, Align::Right),
        TableColumn::new("TVA", 0.10, Align::Right),
        TableColumn::new("Total HT", 0.20, Align::Right),
    ];
    let rows: Vec<Vec<String>> = doc
        .items
        .iter()
        .map(|item| {
            vec![
                item.label.clone(),
                item.quantity.normalize().to_string().replace('.', ","),
                format_eur(item.unit_price),
                format!("{} %", format_rate(item.vat_rate)),
                format_eur(item.line_ht()),
            ]
        })
        .collect();
    writer.table(&columns, &rows);

    let breakdown = invoice_totals::vat_breakdown(doc.items);
    let mut totals_rows: Vec<(String, String, bool)> =
        vec![("Total HT".to_string(), format_eur(invoice.total_ht), false)];
    for entry in &breakdown {
        totals_rows.push((
            format!("TVA {} %", format_rate(entry.rate)),
            format_eur(entry.vat),
            false,
        ));
    }
    totals_rows.push(("Total TTC".to_string(), format_eur(invoice.total_ttc), true));
    let borrowed: Vec<(&str, String, bool)> = totals_rows
        .iter()
        .map(|(label, value, strong)| (label.as_str(), value.clone(), *strong))
        .collect();
    writer.totals(&borrowed);

    if invoice.total_vat.is_zero() {
        writer.paragraph("TVA non applicable, art. 293 B du CGI.");
    }

    writer.section("Conditions de paiement");
    let mut payment = vec![("Échéance", format_date_fr(invoice.due_date))];
    if let Some(iban) = org.iban.as_deref().filter(|s| !s.is_empty()) {
        payment.push(("IBAN", iban.to_string()));
    }
    payment.push(("Référence", invoice.number.clone()));
    writer.key_values(&payment);

    writer.paragraph(
        "En cas de retard de paiement, une pénalité égale à trois fois le taux d'intérêt légal \
         sera exigible, ainsi qu'une indemnité forfaitaire pour frais de recouvrement de 40 € \
         (articles L441-10 et D441-5 du Code de commerce). Pas d'escompte pour paiement anticipé.",
    );

    if let Some(notes) = invoice.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        writer.section("Notes");
        writer.paragraph(notes);
    }

    writer.finish()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;

    use crate::database::models::{customers, invoice_items, invoices, organizations};

    pub fn organization() -> organizations::Model {
        organizations::Model {
            id: 1,
            name: "Atelier Dupont SARL".to_string(),
            legal_form: Some("SARL au capital de 10 000 €".to_string()),
            siret: Some("73282932000074".to_string()),
            vat_number: Some("FR44732829320".to_string()),
            address: Some("12 rue de la République".to_string()),
            postal_code: Some("69002".to_string()),
            city: Some("Lyon".to_string()),
            email: "contact@atelier-dupont.fr".to_string(),
            phone: None,
            iban: Some("FR76 3000 6000 0112 3456 7890 189".to_string()),
            invoice_prefix: "FAC".to_string(),
            payment_terms_days: 30,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            updated_at: None,
        }
    }

    pub fn customer() -> customers::Model {
        customers::Model {
            id: 7,
            organization_id: 1,
            name: "Boulangerie Martin".to_string(),
            email: "compta@boulangerie-martin.fr".to_string(),
            address: Some("3 place Bellecour".to_string()),
            postal_code: Some("69002".to_string()),
            city: Some("Lyon".to_string()),
            siret: None,
            vat_number: None,
            created_at: Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap(),
        }
    }

    pub fn invoice(status: &str) -> invoices::Model {
        invoices::Model {
            id: 11,
            organization_id: 1,
            customer_id: 7,
            number: "FAC-0011".to_string(),
            status: status.to_string(),
            issue_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
            total_ht: dec!(349.90),
            total_vat: dec!(62.74),
            total_ttc: dec!(412.64),
            notes: Some("Merci pour votre confiance.".to_string()),
            sent_at: None,
            paid_at: None,
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            updated_at: None,
        }
    }

    pub fn items() -> Vec<invoice_items::Model> {
        vec![
            invoice_items::Model {
                id: 1,
                invoice_id: 11,
                position: 1,
                label: "Réparation vitrine réfrigérée".to_string(),
                quantity: dec!(2),
                unit_price: dec!(150.00),
                vat_rate: dec!(20),
            },
            invoice_items::Model {
                id: 2,
                invoice_id: 11,
                position: 2,
                label: "Guide d'entretien".to_string(),
                quantity: dec!(1),
                unit_price: dec!(49.90),
                vat_rate: dec!(5.5),
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_invoice_pdf() {
        let org = fixtures::organization();
        let customer = fixtures::customer();
        let invoice = fixtures::invoice("draft");
        let items = fixtures::items();

        let bytes = render_invoice(&InvoiceDocument {
            organization: &org,
            customer: &customer,
            invoice: &invoice,
            items: &items,
        })
        .unwrap();

        assert!(bytes.starts_with(b"%PDF"));
        let parsed = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(parsed.get_pages().len(), 1);
    }

    #[test]
    fn long_invoices_span_several_pages() {
        let org = fixtures::organization();
        let customer = fixtures::customer();
        let invoice = fixtures::invoice("sent");
        let template = fixtures::items();
        let items: Vec<_> = (0..80)
            .map(|idx| {
                let mut item = template[idx % 2].clone();
                item.id = idx as i64;
                item.position = idx as i32;
                item
            })
            .collect();

        let bytes = render_invoice(&InvoiceDocument {
            organization: &org,
            customer: &customer,
            invoice: &invoice,
            items: &items,
        })
        .unwrap();
        let parsed = lopdf::Document::load_mem(&bytes).unwrap();
        assert!(parsed.get_pages().len() >= 2);
    }

    #[test]
    fn formats_dates_day_first() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 5).unwrap();
        assert_eq!(format_date_fr(date), "05/02/2026");
    }
}
