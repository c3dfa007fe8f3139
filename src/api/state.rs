use std::sync::Arc;

use sqlx::{Pool, Sqlite};

use crate::config::Config;
use crate::crypto::{Argon2Hasher, PasswordHasher};
use crate::files::FileStore;
use crate::service::{
    AccountRegistry, AuthenticationGateway, HttpMailSender, LogMailSender, MailSender,
    MessageDirectory, NotificationDispatcher,
};

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Sqlite>,
    pub config: Arc<Config>,
    pub registry: AccountRegistry,
    pub gateway: AuthenticationGateway,
    pub directory: MessageDirectory,
    pub files: FileStore,
}

impl AppState {
    /// Wire every service from `config`, choosing the mail sender by whether
    /// a relay is configured.
    pub fn new(db: Pool<Sqlite>, config: Arc<Config>) -> Self {
        let sender: Arc<dyn MailSender> = match &config.mail_relay_url {
            Some(url) => Arc::new(HttpMailSender::new(url.clone(), config.mail_from.clone())),
            None => Arc::new(LogMailSender),
        };
        Self::with_mail_sender(db, config, sender)
    }

    pub fn with_mail_sender(
        db: Pool<Sqlite>,
        config: Arc<Config>,
        sender: Arc<dyn MailSender>,
    ) -> Self {
        let hasher: Arc<dyn PasswordHasher> = match &config.password_pepper {
            Some(pepper) => Arc::new(Argon2Hasher::with_pepper(pepper.as_bytes().to_vec())),
            None => Arc::new(Argon2Hasher::new()),
        };
        let notifier = NotificationDispatcher::new(sender, config.activation_base_url.clone());

        Self {
            registry: AccountRegistry::new(db.clone(), hasher.clone(), notifier),
            gateway: AuthenticationGateway::new(db.clone(), hasher, config.session_expiry_hours),
            directory: MessageDirectory::new(db.clone()),
            files: FileStore::new(config.upload_path.clone()),
            db,
            config,
        }
    }
}
