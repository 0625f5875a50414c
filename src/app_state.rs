use std::sync::Arc;

use crate::config::Config;
use crate::services::email_templates::EmailTemplates;
use crate::services::mailer::Mailer;
use sea_orm::DatabaseConnection;

pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Config,
    pub mailer: Mailer,
    pub templates: Arc<EmailTemplates>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: Config) -> Result<Self, handlebars::TemplateError> {
        let mailer = Mailer::from_config(&config);
        if !mailer.is_configured() {
            log::warn!("MAIL_API_URL is not set, outgoing emails will only be logged");
        }
        Ok(Self {
            db,
            mailer,
            templates: Arc::new(EmailTemplates::new()?),
            config,
        })
    }
}
