//! Юридические документы: трудовой договор, CGV и mise en demeure.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::errors::AppError;
use crate::services::invoice_totals::format_eur;

use super::invoice::format_date_fr;
use super::writer::{Font, PdfWriter};

#[derive(Debug, Clone, Deserialize)]
pub struct EmploymentContract {
    pub employer_name: String,
    pub employer_siret: String,
    pub employer_address: String,
    pub employer_representative: String,
    pub employee_first_name: String,
    pub employee_last_name: String,
    pub employee_address: String,
    pub job_title: String,
    pub contract_type: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub weekly_hours: Decimal,
    pub gross_monthly_salary: Decimal,
    pub trial_period_months: u32,
    pub workplace: String,
    pub collective_agreement: Option<String>,
    pub signing_city: String,
    pub signing_date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralTermsOfSale {
    pub company_name: String,
    pub company_siret: String,
    pub company_address: String,
    pub activity_description: String,
    pub payment_terms_days: u32,
    pub late_penalty_rate: Option<Decimal>,
    pub delivery_terms: Option<String>,
    pub warranty_terms: Option<String>,
    pub mediator: Option<String>,
    pub jurisdiction_city: String,
    pub effective_date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormalNotice {
    pub creditor_name: String,
    pub creditor_address: String,
    pub debtor_name: String,
    pub debtor_address: String,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub original_due_date: NaiveDate,
    pub amount_due: Decimal,
    pub deadline_days: u32,
    pub city: String,
    pub date: NaiveDate,
    pub signatory: String,
}

pub fn render_employment_contract(c: &EmploymentContract) -> Result<Vec<u8>, AppError> {
    let is_fixed_term = c.contract_type.eq_ignore_ascii_case("CDD");
    let title = if is_fixed_term {
        "Contrat de travail à durée déterminée"
    } else {
        "Contrat de travail à durée indéterminée"
    };
    let employee = format!("{} {}", c.employee_first_name, c.employee_last_name);

    let mut writer = PdfWriter::new(title);
    writer.header(title, Some(&format!("{} / {}", c.employer_name, employee)));

    writer.section("Entre les soussignés");
    writer.paragraph(&format!(
        "La société {}, immatriculée sous le numéro SIRET {}, dont le siège est situé {}, \
         représentée par {}, ci-après « l'Employeur »,",
        c.employer_name, c.employer_siret, c.employer_address, c.employer_representative
    ));
    writer.paragraph(&format!(
        "et {}, demeurant {}, ci-après « le Salarié ».",
        employee, c.employee_address
    ));

    writer.section("Article 1 - Engagement");
    let mut engagement = format!(
        "Le Salarié est engagé en qualité de {} à compter du {}.",
        c.job_title,
        format_date_fr(c.start_date)
    );
    if is_fixed_term {
        match c.end_date {
            Some(end) => engagement.push_str(&format!(
                " Le présent contrat prendra fin le {}.",
                format_date_fr(end)
            )),
            None => {
                return Err(AppError::InvalidInput(
                    "end_date is required for a fixed-term contract".to_string(),
                ));
            }
        }
    }
    if let Some(agreement) = c.collective_agreement.as_deref().filter(|a| !a.is_empty()) {
        engagement.push_str(&format!(
            " Le contrat est régi par la convention collective {}.",
            agreement
        ));
    }
    writer.paragraph(&engagement);

    writer.section("Article 2 - Période d'essai");
    if c.trial_period_months == 0 {
        writer.paragraph("Le présent contrat ne comporte pas de période d'essai.");
    } else {
        writer.paragraph(&format!(
            "Le contrat ne deviendra définitif qu'à l'issue d'une période d'essai de {} mois, \
             pendant laquelle chacune des parties pourra y mettre fin dans le respect du délai \
             de prévenance légal.",
            c.trial_period_months
        ));
    }

    writer.section("Article 3 - Lieu et durée du travail");
    writer.paragraph(&format!(
        "Le Salarié exercera ses fonctions à {}. La durée hebdomadaire de travail est fixée à {} heures.",
        c.workplace,
        c.weekly_hours.normalize()
    ));

    writer.section("Article 4 - Rémunération");
    writer.paragraph(&format!(
        "En contrepartie de son travail, le Salarié percevra une rémunération mensuelle brute de {}.",
        format_eur(c.gross_monthly_salary)
    ));

    writer.section("Article 5 - Congés payés");
    writer.paragraph(
        "Le Salarié bénéficiera des congés payés prévus par les dispositions légales et \
         conventionnelles en vigueur, soit 2,5 jours ouvrables par mois de travail effectif.",
    );

    writer.spacer(10.0);
    writer.paragraph_with(
        &format!(
            "Fait à {}, le {}, en deux exemplaires originaux.",
            c.signing_city,
            format_date_fr(c.signing_date)
        ),
        Font::Italic,
        10.0,
    );
    writer.signature_block("L'Employeur", "Le Salarié");
    writer.finish()
}

pub fn render_general_terms(t: &GeneralTermsOfSale) -> Result<Vec<u8>, AppError> {
    let title = "Conditions générales de vente";
    let mut writer = PdfWriter::new(title);
    writer.header(
        title,
        Some(&format!(
            "{} - en vigueur au {}",
            t.company_name,
            format_date_fr(t.effective_date)
        )),
    );

    writer.section("Article 1 - Objet");
    writer.paragraph(&format!(
        "Les présentes conditions générales de vente régissent les relations contractuelles entre \
         la société {} (SIRET {}, {}) et ses clients, dans le cadre de l'activité suivante : {}.",
        t.company_name, t.company_siret, t.company_address, t.activity_description
    ));

    writer.section("Article 2 - Commandes");
    writer.paragraph(
        "Toute commande implique l'acceptation sans réserve des présentes conditions. \
         La commande n'est définitive qu'après confirmation écrite du vendeur.",
    );

    writer.section("Article 3 - Prix et paiement");
    let penalty = t
        .late_penalty_rate
        .map(|rate| format!("{} %", rate.normalize().to_string().replace('.', ",")))
        .unwrap_or_else(|| "trois fois le taux d'intérêt légal".to_string());
    writer.paragraph(&format!(
        "Les prix sont exprimés en euros hors taxes. Les factures sont payables à {} jours \
         à compter de leur date d'émission. Tout retard de paiement entraîne l'application de \
         pénalités au taux de {} ainsi qu'une indemnité forfaitaire pour frais de recouvrement \
         de 40 €.",
        t.payment_terms_days, penalty
    ));

    if let Some(delivery) = t.delivery_terms.as_deref().filter(|d| !d.is_empty()) {
        writer.section("Article 4 - Livraison");
        writer.paragraph(delivery);
    }

    writer.section("Garanties");
    writer.paragraph(t.warranty_terms.as_deref().filter(|w| !w.is_empty()).unwrap_or(
        "Les produits bénéficient de la garantie légale de conformité et de la garantie \
         contre les vices cachés dans les conditions prévues par la loi.",
    ));

    if let Some(mediator) = t.mediator.as_deref().filter(|m| !m.is_empty()) {
        writer.section("Médiation");
        writer.paragraph(&format!(
            "En cas de litige, le client peut recourir gratuitement au médiateur suivant : {}.",
            mediator
        ));
    }

    writer.section("Litiges");
    writer.paragraph(&format!(
        "Les présentes conditions sont soumises au droit français. À défaut d'accord amiable, \
         tout litige relèvera de la compétence des tribunaux de {}.",
        t.jurisdiction_city
    ));

    writer.finish()
}

pub fn render_formal_notice(n: &FormalNotice) -> Result<Vec<u8>, AppError> {
    let title = "Mise en demeure de payer";
    let mut writer = PdfWriter::new(title);

    writer.two_columns(
        &[n.creditor_name.clone(), n.creditor_address.clone()],
        &[n.debtor_name.clone(), n.debtor_address.clone()],
    );
    writer.line(
        &format!("{}, le {}", n.city, format_date_fr(n.date)),
        Font::Regular,
        10.0,
    );
    writer.spacer(10.0);
    writer.header(title, Some("Lettre recommandée avec accusé de réception"));

    writer.paragraph(&format!(
        "Objet : facture n° {} du {}",
        n.invoice_number,
        format_date_fr(n.invoice_date)
    ));
    writer.paragraph("Madame, Monsieur,");
    writer.paragraph(&format!(
        "Sauf erreur de notre part, la facture n° {} d'un montant de {}, arrivée à échéance le {}, \
         demeure impayée à ce jour malgré nos précédentes relances.",
        n.invoice_number,
        format_eur(n.amount_due),
        format_date_fr(n.original_due_date)
    ));
    writer.paragraph(&format!(
        "Par la présente, nous vous mettons en demeure de nous régler la somme de {} dans un délai \
         de {} jours à compter de la réception de ce courrier.",
        format_eur(n.amount_due),
        n.deadline_days
    ));
    writer.paragraph(
        "À défaut de paiement dans ce délai, nous nous réservons le droit d'engager toute procédure \
         judiciaire utile au recouvrement de notre créance, majorée des pénalités de retard et de \
         l'indemnité forfaitaire de 40 € prévue par l'article D441-5 du Code de commerce.",
    );
    writer.paragraph(
        "Nous vous prions d'agréer, Madame, Monsieur, l'expression de nos salutations distinguées.",
    );
    writer.spacer(20.0);
    writer.line(&n.signatory, Font::Bold, 10.0);

    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn contract(kind: &str) -> EmploymentContract {
        EmploymentContract {
            employer_name: "Atelier Dupont".to_string(),
            employer_siret: "73282932000074".to_string(),
            employer_address: "12 rue de la République, 69002 Lyon".to_string(),
            employer_representative: "Claire Dupont, gérante".to_string(),
            employee_first_name: "Julien".to_string(),
            employee_last_name: "Moreau".to_string(),
            employee_address: "5 quai Saint-Antoine, 69002 Lyon".to_string(),
            job_title: "Technicien frigoriste".to_string(),
            contract_type: kind.to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            end_date: None,
            weekly_hours: dec!(35),
            gross_monthly_salary: dec!(2450),
            trial_period_months: 2,
            workplace: "Lyon".to_string(),
            collective_agreement: None,
            signing_city: "Lyon".to_string(),
            signing_date: NaiveDate::from_ymd_opt(2026, 3, 20).unwrap(),
        }
    }

    #[test]
    fn renders_permanent_contract() {
        let bytes = render_employment_contract(&contract("CDI")).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn fixed_term_contract_requires_end_date() {
        let err = render_employment_contract(&contract("CDD")).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let mut with_end = contract("CDD");
        with_end.end_date = NaiveDate::from_ymd_opt(2026, 9, 30);
        assert!(render_employment_contract(&with_end).is_ok());
    }

    #[test]
    fn renders_terms_and_notice() {
        let terms = GeneralTermsOfSale {
            company_name: "Atelier Dupont".to_string(),
            company_siret: "73282932000074".to_string(),
            company_address: "Lyon".to_string(),
            activity_description: "maintenance d'équipements frigorifiques".to_string(),
            payment_terms_days: 30,
            late_penalty_rate: Some(dec!(12.5)),
            delivery_terms: None,
            warranty_terms: None,
            mediator: Some("CM2C".to_string()),
            jurisdiction_city: "Lyon".to_string(),
            effective_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        };
        assert!(!render_general_terms(&terms).unwrap().is_empty());

        let notice = FormalNotice {
            creditor_name: "Atelier Dupont".to_string(),
            creditor_address: "Lyon".to_string(),
            debtor_name: "Boulangerie Martin".to_string(),
            debtor_address: "Lyon".to_string(),
            invoice_number: "FAC-0011".to_string(),
            invoice_date: NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
            original_due_date: NaiveDate::from_ymd_opt(2026, 2, 9).unwrap(),
            amount_due: dec!(412.64),
            deadline_days: 8,
            city: "Lyon".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 3, 15).unwrap(),
            signatory: "Claire Dupont".to_string(),
        };
        assert!(!render_formal_notice(&notice).unwrap().is_empty());
    }
}
