//! Встроенные шаблоны документов и проверка данных формы по их схеме.
//!
//! Схема задаётся подмножеством JSON Schema: `required`, `properties.*.type`
//! (`string | number | integer | boolean`), `enum`, `format: date` и
//! `additionalProperties: false`.

use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter, Set,
};
use serde_json::{json, Map, Value};
use std::str::FromStr;

use crate::database::models::doc_templates;
use crate::errors::AppError;
use crate::services::pdf::legal;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocKind {
    EmploymentContract,
    GeneralTerms,
    FormalNotice,
}

impl DocKind {
    pub const ALL: [DocKind; 3] = [
        DocKind::EmploymentContract,
        DocKind::GeneralTerms,
        DocKind::FormalNotice,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            DocKind::EmploymentContract => "employment_contract",
            DocKind::GeneralTerms => "cgv",
            DocKind::FormalNotice => "mise_en_demeure",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            DocKind::EmploymentContract => "Contrat de travail",
            DocKind::GeneralTerms => "Conditions générales de vente",
            DocKind::FormalNotice => "Mise en demeure de payer",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DocKind::EmploymentContract => "Contrat CDI ou CDD entre l'entreprise et un salarié",
            DocKind::GeneralTerms => "CGV à annexer aux devis et factures",
            DocKind::FormalNotice => "Lettre de relance formelle pour une facture impayée",
        }
    }

    pub fn file_stem(&self) -> &'static str {
        match self {
            DocKind::EmploymentContract => "contrat-de-travail",
            DocKind::GeneralTerms => "cgv",
            DocKind::FormalNotice => "mise-en-demeure",
        }
    }

    pub fn schema(&self) -> Value {
        match self {
            DocKind::EmploymentContract => object_schema(
                &[
                    ("employer_name", string_field("Raison sociale de l'employeur")),
                    ("employer_siret", string_field("SIRET de l'employeur")),
                    ("employer_address", string_field("Adresse du siège")),
                    ("employer_representative", string_field("Représentant légal")),
                    ("employee_first_name", string_field("Prénom du salarié")),
                    ("employee_last_name", string_field("Nom du salarié")),
                    ("employee_address", string_field("Adresse du salarié")),
                    ("job_title", string_field("Poste")),
                    ("contract_type", json!({"type": "string", "title": "Type de contrat", "enum": ["CDI", "CDD"]})),
                    ("start_date", date_field("Date d'embauche")),
                    ("end_date", date_field("Date de fin (CDD)")),
                    ("weekly_hours", number_field("Durée hebdomadaire (heures)")),
                    ("gross_monthly_salary", number_field("Salaire mensuel brut (€)")),
                    ("trial_period_months", integer_field("Période d'essai (mois)")),
                    ("workplace", string_field("Lieu de travail")),
                    ("collective_agreement", string_field("Convention collective")),
                    ("signing_city", string_field("Fait à")),
                    ("signing_date", date_field("Date de signature")),
                ],
                &[
                    "employer_name",
                    "employer_siret",
                    "employer_address",
                    "employer_representative",
                    "employee_first_name",
                    "employee_last_name",
                    "employee_address",
                    "job_title",
                    "contract_type",
                    "start_date",
                    "weekly_hours",
                    "gross_monthly_salary",
                    "trial_period_months",
                    "workplace",
                    "signing_city",
                    "signing_date",
                ],
            ),
            DocKind::GeneralTerms => object_schema(
                &[
                    ("company_name", string_field("Raison sociale")),
                    ("company_siret", string_field("SIRET")),
                    ("company_address", string_field("Adresse")),
                    ("activity_description", string_field("Activité")),
                    ("payment_terms_days", integer_field("Délai de paiement (jours)")),
                    ("late_penalty_rate", number_field("Taux des pénalités de retard (%)")),
                    ("delivery_terms", string_field("Conditions de livraison")),
                    ("warranty_terms", string_field("Garanties")),
                    ("mediator", string_field("Médiateur de la consommation")),
                    ("jurisdiction_city", string_field("Tribunal compétent")),
                    ("effective_date", date_field("Date d'entrée en vigueur")),
                ],
                &[
                    "company_name",
                    "company_siret",
                    "company_address",
                    "activity_description",
                    "payment_terms_days",
                    "jurisdiction_city",
                    "effective_date",
                ],
            ),
            DocKind::FormalNotice => object_schema(
                &[
                    ("creditor_name", string_field("Créancier")),
                    ("creditor_address", string_field("Adresse du créancier")),
                    ("debtor_name", string_field("Débiteur")),
                    ("debtor_address", string_field("Adresse du débiteur")),
                    ("invoice_number", string_field("Numéro de facture")),
                    ("invoice_date", date_field("Date de facture")),
                    ("original_due_date", date_field("Date d'échéance")),
                    ("amount_due", number_field("Montant dû (€)")),
                    ("deadline_days", integer_field("Délai accordé (jours)")),
                    ("city", string_field("Ville")),
                    ("date", date_field("Date du courrier")),
                    ("signatory", string_field("Signataire")),
                ],
                &[
                    "creditor_name",
                    "creditor_address",
                    "debtor_name",
                    "debtor_address",
                    "invoice_number",
                    "invoice_date",
                    "original_due_date",
                    "amount_due",
                    "deadline_days",
                    "city",
                    "date",
                    "signatory",
                ],
            ),
        }
    }

    /// Проверяет данные и рендерит PDF
    pub fn render(&self, payload: &Value) -> Result<Vec<u8>, AppError> {
        validate_payload(&self.schema(), payload)?;
        match self {
            DocKind::EmploymentContract => {
                let data: legal::EmploymentContract = serde_json::from_value(payload.clone())?;
                legal::render_employment_contract(&data)
            }
            DocKind::GeneralTerms => {
                let data: legal::GeneralTermsOfSale = serde_json::from_value(payload.clone())?;
                legal::render_general_terms(&data)
            }
            DocKind::FormalNotice => {
                let data: legal::FormalNotice = serde_json::from_value(payload.clone())?;
                legal::render_formal_notice(&data)
            }
        }
    }
}

impl FromStr for DocKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocKind::ALL
            .into_iter()
            .find(|kind| kind.key() == s.trim())
            .ok_or_else(|| AppError::NotFound(format!("Unknown document template `{}`", s)))
    }
}

fn string_field(title: &str) -> Value {
    json!({ "type": "string", "title": title })
}

fn number_field(title: &str) -> Value {
    json!({ "type": "number", "title": title })
}

fn integer_field(title: &str) -> Value {
    json!({ "type": "integer", "title": title, "minimum": 0 })
}

fn date_field(title: &str) -> Value {
    json!({ "type": "string", "format": "date", "title": title })
}

fn object_schema(properties: &[(&str, Value)], required: &[&str]) -> Value {
    let props: Map<String, Value> = properties
        .iter()
        .map(|(name, schema)| (name.to_string(), schema.clone()))
        .collect();
    json!({
        "type": "object",
        "properties": props,
        "required": required,
        "additionalProperties": false,
    })
}

/// Проверка данных формы; ошибки собираются в одно сообщение
pub fn validate_payload(schema: &Value, payload: &Value) -> Result<(), AppError> {
    let object = payload
        .as_object()
        .ok_or_else(|| AppError::InvalidInput("Document payload must be a JSON object".to_string()))?;
    let empty = Map::new();
    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let mut errors: Vec<String> = Vec::new();

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            match object.get(name) {
                None | Some(Value::Null) => errors.push(format!("`{}` is required", name)),
                Some(Value::String(s)) if s.trim().is_empty() => {
                    errors.push(format!("`{}` must not be empty", name))
                }
                _ => {}
            }
        }
    }

    let closed = schema.get("additionalProperties") == Some(&Value::Bool(false));

    for (name, value) in object {
        let Some(field) = properties.get(name) else {
            if closed {
                errors.push(format!("`{}` is not an allowed field", name));
            }
            continue;
        };
        if value.is_null() {
            continue;
        }
        if let Some(message) = check_field(name, field, value) {
            errors.push(message);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::InvalidInput(errors.join("; ")))
    }
}

fn check_field(name: &str, field: &Value, value: &Value) -> Option<String> {
    let expected = field.get("type").and_then(Value::as_str).unwrap_or("string");
    let type_ok = match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        _ => true,
    };
    if !type_ok {
        return Some(format!("`{}` must be of type {}", name, expected));
    }

    if let Some(allowed) = field.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            return Some(format!("`{}` has an unsupported value", name));
        }
    }

    if field.get("format").and_then(Value::as_str) == Some("date") {
        let raw = value.as_str().unwrap_or_default();
        if NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_err() {
            return Some(format!("`{}` must be a date (YYYY-MM-DD)", name));
        }
    }

    if let Some(minimum) = field.get("minimum").and_then(Value::as_f64) {
        if value.as_f64().is_some_and(|v| v < minimum) {
            return Some(format!("`{}` must be at least {}", name, minimum));
        }
    }

    None
}

/// Результат синхронизации одного шаблона
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Created,
    Updated { version: i32 },
    Unchanged { version: i32 },
}

/// Записывает встроенные шаблоны в `doc_templates`.
/// Версия растёт только при изменении схемы.
pub async fn sync_templates<C: ConnectionTrait>(
    db: &C,
) -> Result<Vec<(DocKind, SyncOutcome)>, AppError> {
    let mut report = Vec::with_capacity(DocKind::ALL.len());
    for kind in DocKind::ALL {
        let schema = kind.schema();
        let existing = doc_templates::Entity::find()
            .filter(doc_templates::Column::Key.eq(kind.key()))
            .one(db)
            .await?;

        let outcome = match existing {
            None => {
                doc_templates::ActiveModel {
                    key: Set(kind.key().to_string()),
                    title: Set(kind.title().to_string()),
                    description: Set(Some(kind.description().to_string())),
                    schema: Set(schema),
                    version: Set(1),
                    updated_at: Set(Utc::now()),
                    ..Default::default()
                }
                .insert(db)
                .await?;
                SyncOutcome::Created
            }
            Some(template) => {
                let schema_changed = template.schema != schema;
                let text_changed = template.title != kind.title()
                    || template.description.as_deref() != Some(kind.description());
                if !schema_changed && !text_changed {
                    SyncOutcome::Unchanged {
                        version: template.version,
                    }
                } else {
                    let version = if schema_changed {
                        template.version + 1
                    } else {
                        template.version
                    };
                    let mut active = template.into_active_model();
                    active.title = Set(kind.title().to_string());
                    active.description = Set(Some(kind.description().to_string()));
                    active.schema = Set(schema);
                    active.version = Set(version);
                    active.updated_at = Set(Utc::now());
                    active.update(db).await?;
                    SyncOutcome::Updated { version }
                }
            }
        };
        log::info!("Template {}: {:?}", kind.key(), outcome);
        report.push((kind, outcome));
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notice_payload() -> Value {
        json!({
            "creditor_name": "Atelier Dupont",
            "creditor_address": "12 rue de la République, 69002 Lyon",
            "debtor_name": "Boulangerie Martin",
            "debtor_address": "3 place Bellecour, 69002 Lyon",
            "invoice_number": "FAC-0011",
            "invoice_date": "2026-01-10",
            "original_due_date": "2026-02-09",
            "amount_due": 412.64,
            "deadline_days": 8,
            "city": "Lyon",
            "date": "2026-03-15",
            "signatory": "Claire Dupont"
        })
    }

    #[test]
    fn resolves_template_keys() {
        assert_eq!("cgv".parse::<DocKind>().unwrap(), DocKind::GeneralTerms);
        assert_eq!(
            "mise_en_demeure".parse::<DocKind>().unwrap(),
            DocKind::FormalNotice
        );
        assert!(matches!(
            "bail".parse::<DocKind>(),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn every_required_field_is_a_declared_property() {
        for kind in DocKind::ALL {
            let schema = kind.schema();
            let properties = schema["properties"].as_object().unwrap();
            for name in schema["required"].as_array().unwrap() {
                assert!(properties.contains_key(name.as_str().unwrap()), "{:?}", kind);
            }
        }
    }

    #[test]
    fn accepts_valid_payload_and_renders() {
        let bytes = DocKind::FormalNotice.render(&notice_payload()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn reports_missing_and_mistyped_fields() {
        let mut payload = notice_payload();
        payload.as_object_mut().unwrap().remove("debtor_name");
        payload["deadline_days"] = json!("eight");
        payload["invoice_date"] = json!("10/01/2026");

        let err = validate_payload(&DocKind::FormalNotice.schema(), &payload).unwrap_err();
        let AppError::InvalidInput(message) = err else {
            panic!("expected invalid input");
        };
        assert!(message.contains("`debtor_name` is required"));
        assert!(message.contains("`deadline_days` must be of type integer"));
        assert!(message.contains("`invoice_date` must be a date"));
    }

    #[test]
    fn rejects_unknown_fields_and_enum_values() {
        let schema = DocKind::EmploymentContract.schema();
        let payload = json!({ "contract_type": "Interim", "salary_bonus": 100 });
        let AppError::InvalidInput(message) = validate_payload(&schema, &payload).unwrap_err() else {
            panic!("expected invalid input");
        };
        assert!(message.contains("`contract_type` has an unsupported value"));
        assert!(message.contains("`salary_bonus` is not an allowed field"));
    }
}
