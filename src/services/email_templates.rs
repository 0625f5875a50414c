use handlebars::Handlebars;
use serde::Serialize;

use crate::errors::AppError;

/// Виды транзакционных писем
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmailKind {
    InvoiceSent,
    PaymentReminder,
    LeaveRequestSubmitted,
    LeaveRequestDecision,
    DocumentReady,
}

impl EmailKind {
    pub const ALL: [EmailKind; 5] = [
        EmailKind::InvoiceSent,
        EmailKind::PaymentReminder,
        EmailKind::LeaveRequestSubmitted,
        EmailKind::LeaveRequestDecision,
        EmailKind::DocumentReady,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EmailKind::InvoiceSent => "invoice_sent",
            EmailKind::PaymentReminder => "payment_reminder",
            EmailKind::LeaveRequestSubmitted => "leave_request_submitted",
            EmailKind::LeaveRequestDecision => "leave_request_decision",
            EmailKind::DocumentReady => "document_ready",
        }
    }

    fn subject(&self) -> &'static str {
        match self {
            EmailKind::InvoiceSent => "Facture {{invoice_number}} - {{organization_name}}",
            EmailKind::PaymentReminder => {
                "Relance : facture {{invoice_number}} en attente de règlement"
            }
            EmailKind::LeaveRequestSubmitted => {
                "Demande d'absence de {{employee_name}} ({{start_date}} - {{end_date}})"
            }
            EmailKind::LeaveRequestDecision => "Votre demande d'absence a été {{decision}}",
            EmailKind::DocumentReady => "Votre document « {{document_title}} » est prêt",
        }
    }

    fn body(&self) -> &'static str {
        match self {
            EmailKind::InvoiceSent => INVOICE_SENT,
            EmailKind::PaymentReminder => PAYMENT_REMINDER,
            EmailKind::LeaveRequestSubmitted => LEAVE_REQUEST_SUBMITTED,
            EmailKind::LeaveRequestDecision => LEAVE_REQUEST_DECISION,
            EmailKind::DocumentReady => DOCUMENT_READY,
        }
    }
}

const INVOICE_SENT: &str = r#"<p>Bonjour {{customer_name}},</p>
<p>Veuillez trouver ci-joint la facture <strong>{{invoice_number}}</strong> d'un montant de
<strong>{{total_ttc}}</strong> TTC, à régler avant le {{due_date}}.</p>
{{#if iban}}<p>Règlement par virement : IBAN {{iban}}, référence {{invoice_number}}.</p>{{/if}}
<p>Cordialement,<br>{{organization_name}}</p>"#;

const PAYMENT_REMINDER: &str = r#"<p>Bonjour {{customer_name}},</p>
<p>Sauf erreur de notre part, la facture <strong>{{invoice_number}}</strong> échue le {{due_date}}
reste à régler pour un montant de <strong>{{amount_due}}</strong>.</p>
<p>Merci de procéder au règlement dans les meilleurs délais. Si celui-ci a déjà été effectué,
veuillez ne pas tenir compte de ce message.</p>
<p>Cordialement,<br>{{organization_name}}</p>"#;

const LEAVE_REQUEST_SUBMITTED: &str = r#"<p>Bonjour,</p>
<p>{{employee_name}} a déposé une demande de <strong>{{kind}}</strong>
du {{start_date}} au {{end_date}}.</p>
{{#if reason}}<p>Motif : {{reason}}</p>{{/if}}
<p>Vous pouvez l'approuver ou la refuser depuis SimplRH.</p>"#;

const LEAVE_REQUEST_DECISION: &str = r#"<p>Bonjour {{employee_first_name}},</p>
<p>Votre demande de <strong>{{kind}}</strong> du {{start_date}} au {{end_date}}
a été <strong>{{decision}}</strong>.</p>
<p>Cordialement,<br>{{organization_name}}</p>"#;

const DOCUMENT_READY: &str = r#"<p>Bonjour,</p>
<p>Le document « {{document_title}} » a été généré.</p>
<p><a href="{{download_url}}">Télécharger le document</a></p>
<p>{{organization_name}}</p>"#;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

/// Реестр шаблонов, собирается один раз при старте
pub struct EmailTemplates {
    bodies: Handlebars<'static>,
    // тема письма - обычный текст, HTML-экранирование не нужно
    subjects: Handlebars<'static>,
}

impl EmailTemplates {
    pub fn new() -> Result<Self, handlebars::TemplateError> {
        let mut bodies = Handlebars::new();
        let mut subjects = Handlebars::new();
        // отсутствующая переменная - ошибка рендера, а не пустая строка
        bodies.set_strict_mode(true);
        subjects.set_strict_mode(true);
        subjects.register_escape_fn(handlebars::no_escape);
        for kind in EmailKind::ALL {
            subjects.register_template_string(kind.name(), kind.subject())?;
            bodies.register_template_string(kind.name(), kind.body())?;
        }
        Ok(Self { bodies, subjects })
    }

    pub fn render<T: Serialize>(&self, kind: EmailKind, data: &T) -> Result<RenderedEmail, AppError> {
        Ok(RenderedEmail {
            subject: self.subjects.render(kind.name(), data)?,
            html: self.bodies.render(kind.name(), data)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_invoice_email() {
        let templates = EmailTemplates::new().unwrap();
        let email = templates
            .render(
                EmailKind::InvoiceSent,
                &json!({
                    "customer_name": "Boulangerie Martin",
                    "invoice_number": "FAC-0011",
                    "organization_name": "Atelier Dupont",
                    "total_ttc": "412,64 €",
                    "due_date": "31/03/2026",
                    "iban": "FR76 3000 6000 0112 3456 7890 189",
                }),
            )
            .unwrap();

        assert_eq!(email.subject, "Facture FAC-0011 - Atelier Dupont");
        assert!(email.html.contains("<strong>FAC-0011</strong>"));
        assert!(email.html.contains("IBAN FR76"));
    }

    #[test]
    fn escapes_html_in_body_but_not_in_subject() {
        let templates = EmailTemplates::new().unwrap();
        let email = templates
            .render(
                EmailKind::DocumentReady,
                &json!({
                    "document_title": "CGV <Dupont & Fils>",
                    "download_url": "https://app.simplrh.fr/api/documents/files/3",
                    "organization_name": "Dupont & Fils",
                }),
            )
            .unwrap();

        assert!(email.html.contains("CGV &lt;Dupont &amp; Fils&gt;"));
        assert_eq!(email.subject, "Votre document « CGV <Dupont & Fils> » est prêt");
    }

    #[test]
    fn subject_keeps_quotes_and_equals_verbatim() {
        let templates = EmailTemplates::new().unwrap();
        let email = templates
            .render(
                EmailKind::InvoiceSent,
                &json!({
                    "customer_name": "Chez l'Ami",
                    "invoice_number": "FAC-0012",
                    "organization_name": "L'Atelier \"A=B\" `&` Cie",
                    "total_ttc": "10,00 €",
                    "due_date": "31/03/2026",
                    "iban": null,
                }),
            )
            .unwrap();
        assert_eq!(email.subject, "Facture FAC-0012 - L'Atelier \"A=B\" `&` Cie");
        assert!(email.html.contains("L&#x27;Atelier"));
    }

    #[test]
    fn missing_variables_fail_to_render() {
        let templates = EmailTemplates::new().unwrap();
        let err = templates
            .render(EmailKind::PaymentReminder, &json!({ "customer_name": "X" }))
            .unwrap_err();
        assert!(matches!(err, AppError::TemplateError(_)));
    }

    #[test]
    fn optional_blocks_are_skipped() {
        let templates = EmailTemplates::new().unwrap();
        let email = templates
            .render(
                EmailKind::LeaveRequestSubmitted,
                &json!({
                    "employee_name": "Alice Bernard",
                    "kind": "Congés payés",
                    "start_date": "02/03/2026",
                    "end_date": "06/03/2026",
                    "reason": null,
                }),
            )
            .unwrap();
        assert!(!email.html.contains("Motif"));
    }
}
