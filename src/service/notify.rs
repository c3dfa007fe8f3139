use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::db::User;
use crate::error::AppError;

/// Outbound mail capability.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError>;
}

/// Writes mail to the log instead of delivering it.
#[derive(Debug, Default, Clone)]
pub struct LogMailSender;

#[async_trait]
impl MailSender for LogMailSender {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError> {
        tracing::info!(to = %to, subject = %subject, "📧 Mail (not delivered)\n{}", body);
        Ok(())
    }
}

#[derive(Serialize)]
struct RelayMail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Hands mail to an HTTP relay as JSON.
pub struct HttpMailSender {
    client: reqwest::Client,
    relay_url: String,
    from: String,
}

impl HttpMailSender {
    pub fn new(relay_url: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            relay_url: relay_url.into(),
            from: from.into(),
        }
    }
}

#[async_trait]
impl MailSender for HttpMailSender {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError> {
        let response = self
            .client
            .post(&self.relay_url)
            .json(&RelayMail {
                from: &self.from,
                to,
                subject,
                body,
            })
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Mail relay unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Internal(format!(
                "Mail relay returned status: {}",
                response.status()
            )));
        }

        Ok(())
    }
}

/// Sends activation links. Delivery is best effort.
#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: Arc<dyn MailSender>,
    base_url: String,
}

impl NotificationDispatcher {
    pub fn new(sender: Arc<dyn MailSender>, base_url: impl Into<String>) -> Self {
        Self {
            sender,
            base_url: base_url.into(),
        }
    }

    pub fn activation_link(&self, code: &str) -> String {
        format!("{}/activate/{}", self.base_url, code)
    }

    /// Mail the user's activation link. No-op without an email or code;
    /// delivery failures are logged and swallowed.
    pub async fn send_activation(&self, user: &User) {
        let code = match (&user.activation_code, user.email.trim().is_empty()) {
            (Some(code), false) => code,
            _ => return,
        };

        let body = format!(
            "Hello, {}!\nWelcome to Sweeter. Please, visit next link: {}",
            user.username,
            self.activation_link(code)
        );

        if let Err(e) = self.sender.send(&user.email, "Activation code", &body).await {
            tracing::warn!(user_id = user.id, error = %e, "Activation mail was not delivered");
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SentMail {
        pub to: String,
        pub subject: String,
        pub body: String,
    }

    /// Keeps every mail in memory; optionally fails every send.
    #[derive(Default)]
    pub struct RecordingMailSender {
        pub sent: Mutex<Vec<SentMail>>,
        pub fail: bool,
    }

    impl RecordingMailSender {
        pub fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        pub fn sent(&self) -> Vec<SentMail> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MailSender for RecordingMailSender {
        async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError> {
            if self.fail {
                return Err(AppError::Internal("smtp down".to_string()));
            }
            self.sent.lock().unwrap().push(SentMail {
                to: to.to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
            });
            Ok(())
        }
    }
}
