//! Outbound email over a transactional mail HTTP API.
//!
//! Notifications ride on business operations that must not fail because an
//! email did, so every send error is logged and swallowed. An unconfigured
//! mailer (no endpoint or key) drops messages silently, which keeps local
//! development quiet.

use crate::templates::EmailContent;
use keur_config::MailConfig;
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct Mailer {
    client: reqwest::Client,
    endpoint: Option<String>,
    api_key: Option<String>,
    from: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

impl Mailer {
    pub fn new(config: &MailConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            from: config.from.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some() && self.api_key.is_some()
    }

    /// Send an email, logging failures instead of surfacing them.
    pub async fn send(&self, to: &str, content: &EmailContent) {
        let (Some(endpoint), Some(api_key)) = (&self.endpoint, &self.api_key) else {
            debug!(to = to, subject = %content.subject, "mailer not configured, dropping email");
            return;
        };

        let request = SendRequest {
            from: &self.from,
            to,
            subject: &content.subject,
            html: &content.html,
        };

        let result = self
            .client
            .post(endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!(to = to, subject = %content.subject, "email sent");
            }
            Ok(response) => {
                warn!(
                    to = to,
                    status = %response.status(),
                    "mail api refused the email"
                );
            }
            Err(e) => {
                warn!(to = to, "failed to reach mail api: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::rent_receipt;

    fn unconfigured() -> Mailer {
        Mailer::new(&MailConfig {
            endpoint: None,
            api_key: None,
            from: "no-reply@keurimmo.sn".to_string(),
        })
    }

    #[test]
    fn test_configured_detection() {
        assert!(!unconfigured().is_configured());

        let configured = Mailer::new(&MailConfig {
            endpoint: Some("https://mail.example/send".to_string()),
            api_key: Some("key".to_string()),
            from: "no-reply@keurimmo.sn".to_string(),
        });
        assert!(configured.is_configured());
    }

    #[tokio::test]
    async fn test_unconfigured_send_is_a_noop() {
        let mailer = unconfigured();
        // Must return without error and without network access.
        mailer
            .send("awa@example.sn", &rent_receipt("Awa", 250_000, 1, 2025))
            .await;
    }
}
