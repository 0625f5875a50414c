//! Упрощённый XML в духе Factur-X (CrossIndustryInvoice, профиль BASIC).
//! Схемой не валидируется.

use chrono::NaiveDate;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use rust_decimal::Decimal;

use crate::database::models::{customers, invoice_items, invoices, organizations};
use crate::errors::AppError;
use crate::services::invoice_totals::{self, round_money, TaxableLine};

pub const PROFILE_BASIC: &str = "urn:factur-x.eu:1p0:basic";
const CURRENCY: &str = "EUR";

struct XmlBuilder {
    writer: Writer<Vec<u8>>,
}

impl XmlBuilder {
    fn new() -> Self {
        Self {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn write(&mut self, event: Event<'_>) -> Result<(), AppError> {
        self.writer
            .write_event(event)
            .map_err(|e| AppError::XmlError(e.to_string()))
    }

    fn declaration(&mut self) -> Result<(), AppError> {
        self.write(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
    }

    fn open(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), AppError> {
        let mut start = BytesStart::new(name);
        for attr in attrs {
            start.push_attribute(*attr);
        }
        self.write(Event::Start(start))
    }

    fn close(&mut self, name: &str) -> Result<(), AppError> {
        self.write(Event::End(BytesEnd::new(name)))
    }

    fn leaf(&mut self, name: &str, attrs: &[(&str, &str)], text: &str) -> Result<(), AppError> {
        self.open(name, attrs)?;
        self.write(Event::Text(BytesText::new(text)))?;
        self.close(name)
    }

    fn finish(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}

fn amount(value: Decimal) -> String {
    format!("{:.2}", round_money(value))
}

fn date_102(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Код категории НДС: S для стандартной ставки, E для освобождения
fn vat_category(rate: Decimal) -> &'static str {
    if rate.is_zero() { "E" } else { "S" }
}

fn trade_party(
    x: &mut XmlBuilder,
    tag: &str,
    name: &str,
    siret: Option<&str>,
    postal_code: Option<&str>,
    address: Option<&str>,
    city: Option<&str>,
    vat_number: Option<&str>,
) -> Result<(), AppError> {
    x.open(tag, &[])?;
    x.leaf("ram:Name", &[], name)?;
    if let Some(siret) = siret.filter(|s| s.len() >= 9) {
        // SIREN: первые 9 цифр SIRET, схема 0002
        x.open("ram:SpecifiedLegalOrganization", &[])?;
        x.leaf("ram:ID", &[("schemeID", "0002")], &siret[..9])?;
        x.close("ram:SpecifiedLegalOrganization")?;
    }
    x.open("ram:PostalTradeAddress", &[])?;
    if let Some(code) = postal_code {
        x.leaf("ram:PostcodeCode", &[], code)?;
    }
    if let Some(line) = address {
        x.leaf("ram:LineOne", &[], line)?;
    }
    if let Some(city) = city {
        x.leaf("ram:CityName", &[], city)?;
    }
    x.leaf("ram:CountryID", &[], "FR")?;
    x.close("ram:PostalTradeAddress")?;
    if let Some(vat) = vat_number.filter(|v| !v.is_empty()) {
        x.open("ram:SpecifiedTaxRegistration", &[])?;
        x.leaf("ram:ID", &[("schemeID", "VA")], vat)?;
        x.close("ram:SpecifiedTaxRegistration")?;
    }
    x.close(tag)
}

pub fn build_facturx_xml(
    organization: &organizations::Model,
    customer: &customers::Model,
    invoice: &invoices::Model,
    items: &[invoice_items::Model],
) -> Result<Vec<u8>, AppError> {
    let mut x = XmlBuilder::new();
    x.declaration()?;
    x.open(
        "rsm:CrossIndustryInvoice",
        &[
            ("xmlns:rsm", "urn:un:unece:uncefact:data:standard:CrossIndustryInvoice:100"),
            ("xmlns:ram", "urn:un:unece:uncefact:data:standard:ReusableAggregateBusinessInformationEntity:100"),
            ("xmlns:udt", "urn:un:unece:uncefact:data:standard:UnqualifiedDataType:100"),
        ],
    )?;

    x.open("rsm:ExchangedDocumentContext", &[])?;
    x.open("ram:GuidelineSpecifiedDocumentContextParameter", &[])?;
    x.leaf("ram:ID", &[], PROFILE_BASIC)?;
    x.close("ram:GuidelineSpecifiedDocumentContextParameter")?;
    x.close("rsm:ExchangedDocumentContext")?;

    x.open("rsm:ExchangedDocument", &[])?;
    x.leaf("ram:ID", &[], &invoice.number)?;
    x.leaf("ram:TypeCode", &[], "380")?;
    x.open("ram:IssueDateTime", &[])?;
    x.leaf("udt:DateTimeString", &[("format", "102")], &date_102(invoice.issue_date))?;
    x.close("ram:IssueDateTime")?;
    x.close("rsm:ExchangedDocument")?;

    x.open("rsm:SupplyChainTradeTransaction", &[])?;

    for (idx, item) in items.iter().enumerate() {
        let line_id = (idx + 1).to_string();
        x.open("ram:IncludedSupplyChainTradeLineItem", &[])?;
        x.open("ram:AssociatedDocumentLineDocument", &[])?;
        x.leaf("ram:LineID", &[], &line_id)?;
        x.close("ram:AssociatedDocumentLineDocument")?;
        x.open("ram:SpecifiedTradeProduct", &[])?;
        x.leaf("ram:Name", &[], &item.label)?;
        x.close("ram:SpecifiedTradeProduct")?;
        x.open("ram:SpecifiedLineTradeAgreement", &[])?;
        x.open("ram:NetPriceProductTradePrice", &[])?;
        x.leaf("ram:ChargeAmount", &[], &amount(item.unit_price))?;
        x.close("ram:NetPriceProductTradePrice")?;
        x.close("ram:SpecifiedLineTradeAgreement")?;
        x.open("ram:SpecifiedLineTradeDelivery", &[])?;
        x.leaf(
            "ram:BilledQuantity",
            &[("unitCode", "C62")],
            &item.quantity.normalize().to_string(),
        )?;
        x.close("ram:SpecifiedLineTradeDelivery")?;
        x.open("ram:SpecifiedLineTradeSettlement", &[])?;
        x.open("ram:ApplicableTradeTax", &[])?;
        x.leaf("ram:TypeCode", &[], "VAT")?;
        x.leaf("ram:CategoryCode", &[], vat_category(item.vat_rate))?;
        x.leaf("ram:RateApplicablePercent", &[], &item.vat_rate.normalize().to_string())?;
        x.close("ram:ApplicableTradeTax")?;
        x.open("ram:SpecifiedTradeSettlementLineMonetarySummation", &[])?;
        x.leaf("ram:LineTotalAmount", &[], &amount(item.line_ht()))?;
        x.close("ram:SpecifiedTradeSettlementLineMonetarySummation")?;
        x.close("ram:SpecifiedLineTradeSettlement")?;
        x.close("ram:IncludedSupplyChainTradeLineItem")?;
    }

    x.open("ram:ApplicableHeaderTradeAgreement", &[])?;
    trade_party(
        &mut x,
        "ram:SellerTradeParty",
        &organization.name,
        organization.siret.as_deref(),
        organization.postal_code.as_deref(),
        organization.address.as_deref(),
        organization.city.as_deref(),
        organization.vat_number.as_deref(),
    )?;
    trade_party(
        &mut x,
        "ram:BuyerTradeParty",
        &customer.name,
        customer.siret.as_deref(),
        customer.postal_code.as_deref(),
        customer.address.as_deref(),
        customer.city.as_deref(),
        customer.vat_number.as_deref(),
    )?;
    x.close("ram:ApplicableHeaderTradeAgreement")?;

    x.open("ram:ApplicableHeaderTradeDelivery", &[])?;
    x.close("ram:ApplicableHeaderTradeDelivery")?;

    x.open("ram:ApplicableHeaderTradeSettlement", &[])?;
    x.leaf("ram:PaymentReference", &[], &invoice.number)?;
    x.leaf("ram:InvoiceCurrencyCode", &[], CURRENCY)?;
    if let Some(iban) = organization.iban.as_deref().filter(|i| !i.is_empty()) {
        x.open("ram:SpecifiedTradeSettlementPaymentMeans", &[])?;
        x.leaf("ram:TypeCode", &[], "58")?;
        x.open("ram:PayeePartyCreditorFinancialAccount", &[])?;
        x.leaf("ram:IBANID", &[], &iban.replace(' ', ""))?;
        x.close("ram:PayeePartyCreditorFinancialAccount")?;
        x.close("ram:SpecifiedTradeSettlementPaymentMeans")?;
    }

    for entry in invoice_totals::vat_breakdown(items) {
        x.open("ram:ApplicableTradeTax", &[])?;
        x.leaf("ram:CalculatedAmount", &[], &amount(entry.vat))?;
        x.leaf("ram:TypeCode", &[], "VAT")?;
        if entry.rate.is_zero() {
            x.leaf("ram:ExemptionReason", &[], "TVA non applicable, art. 293 B du CGI")?;
        }
        x.leaf("ram:BasisAmount", &[], &amount(entry.base_ht))?;
        x.leaf("ram:CategoryCode", &[], vat_category(entry.rate))?;
        x.leaf("ram:RateApplicablePercent", &[], &entry.rate.normalize().to_string())?;
        x.close("ram:ApplicableTradeTax")?;
    }

    x.open("ram:SpecifiedTradePaymentTerms", &[])?;
    x.open("ram:DueDateDateTime", &[])?;
    x.leaf("udt:DateTimeString", &[("format", "102")], &date_102(invoice.due_date))?;
    x.close("ram:DueDateDateTime")?;
    x.close("ram:SpecifiedTradePaymentTerms")?;

    x.open("ram:SpecifiedTradeSettlementHeaderMonetarySummation", &[])?;
    x.leaf("ram:LineTotalAmount", &[], &amount(invoice.total_ht))?;
    x.leaf("ram:TaxBasisTotalAmount", &[], &amount(invoice.total_ht))?;
    x.leaf("ram:TaxTotalAmount", &[("currencyID", CURRENCY)], &amount(invoice.total_vat))?;
    x.leaf("ram:GrandTotalAmount", &[], &amount(invoice.total_ttc))?;
    x.leaf("ram:DuePayableAmount", &[], &amount(invoice.total_ttc))?;
    x.close("ram:SpecifiedTradeSettlementHeaderMonetarySummation")?;
    x.close("ram:ApplicableHeaderTradeSettlement")?;

    x.close("rsm:SupplyChainTradeTransaction")?;
    x.close("rsm:CrossIndustryInvoice")?;

    Ok(x.finish())
}
