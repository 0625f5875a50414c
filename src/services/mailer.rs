use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::config::Config;
use crate::errors::AppError;
use crate::services::email_templates::RenderedEmail;

const DEFAULT_FROM: &str = "SimplRH <no-reply@simplrh.fr>";

#[derive(Clone, Debug, Serialize)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    /// Содержимое в base64
    pub content: String,
}

impl Attachment {
    pub fn pdf(filename: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            filename: filename.into(),
            content_type: "application/pdf".to_string(),
            content: STANDARD.encode(bytes),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

/// Клиент HTTP API транзакционной почты. Без настроек письма только логируются.
#[derive(Clone)]
pub struct Mailer {
    client: Client,
    api_url: Option<String>,
    api_key: Option<String>,
    from: String,
}

impl Mailer {
    pub fn new(api_url: Option<String>, api_key: Option<String>, from: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.filter(|u| !u.trim().is_empty()),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            from: from.unwrap_or_else(|| DEFAULT_FROM.to_string()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.mail_api_url.clone(),
            config.mail_api_key.clone(),
            config.mail_from.clone(),
        )
    }

    pub fn is_configured(&self) -> bool {
        self.api_url.is_some()
    }

    pub fn compose(
        &self,
        to: impl Into<String>,
        rendered: RenderedEmail,
        attachments: Vec<Attachment>,
    ) -> OutgoingEmail {
        OutgoingEmail {
            from: self.from.clone(),
            to: vec![to.into()],
            subject: rendered.subject,
            html: rendered.html,
            attachments,
        }
    }

    pub async fn send(&self, email: &OutgoingEmail) -> Result<(), AppError> {
        let Some(url) = self.api_url.as_deref() else {
            log::info!(
                "Mail API is not configured, email to {:?} logged instead: {} ({} attachments)",
                email.to,
                email.subject,
                email.attachments.len()
            );
            log::debug!("Email body:\n{}", email.html);
            return Ok(());
        };

        let mut request = self
            .client
            .post(url)
            .json(email)
            .timeout(Duration::from_secs(30));
        if let Some(key) = self.api_key.as_deref() {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Mail API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error reading response body".to_string());
            log::error!("Mail API error: {} - {}", status, error_text);
            return Err(AppError::ExternalApiError(format!(
                "Mail API returned status {}: {}",
                status, error_text
            )));
        }

        log::info!("Email sent to {:?}: {}", email.to, email.subject);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered() -> RenderedEmail {
        RenderedEmail {
            subject: "Facture FAC-0001".to_string(),
            html: "<p>Bonjour</p>".to_string(),
        }
    }

    #[test]
    fn blank_settings_mean_console_fallback() {
        let mailer = Mailer::new(Some("  ".to_string()), None, None);
        assert!(!mailer.is_configured());
    }

    #[test]
    fn serializes_payload_with_base64_attachment() {
        let mailer = Mailer::new(None, None, Some("Atelier <facturation@atelier.fr>".to_string()));
        let email = mailer.compose(
            "client@example.fr",
            rendered(),
            vec![Attachment::pdf("FAC-0001.pdf", b"%PDF-1.5")],
        );
        let json = serde_json::to_value(&email).unwrap();

        assert_eq!(json["from"], "Atelier <facturation@atelier.fr>");
        assert_eq!(json["to"][0], "client@example.fr");
        assert_eq!(json["attachments"][0]["content"], "JVBERi0xLjU=");
        assert_eq!(json["attachments"][0]["content_type"], "application/pdf");
    }

    #[test]
    fn attachments_are_omitted_when_empty() {
        let mailer = Mailer::new(None, None, None);
        let json = serde_json::to_value(mailer.compose("a@b.fr", rendered(), vec![])).unwrap();
        assert!(json.get("attachments").is_none());
        assert_eq!(json["from"], DEFAULT_FROM);
    }

    #[actix_web::test]
    async fn unconfigured_mailer_logs_and_succeeds() {
        let mailer = Mailer::new(None, None, None);
        let email = mailer.compose("a@b.fr", rendered(), vec![]);
        assert!(mailer.send(&email).await.is_ok());
    }
}
