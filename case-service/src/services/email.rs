use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, Message,
    SmtpTransport, Transport,
};
use std::time::Duration;

use super::ServiceError;
use crate::config::SmtpConfig;

/// Outbound mail seam. Registration refuses to proceed when the provider
/// reports itself disabled, and case-status notifications silently skip.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Whether a real transport is configured.
    fn is_enabled(&self) -> bool;

    async fn send_verification_email(
        &self,
        to_email: &str,
        verification_token: &str,
        base_url: &str,
    ) -> Result<(), ServiceError>;

    async fn send_case_status_email(
        &self,
        to_email: &str,
        case_id: &str,
        status: &str,
        message: Option<&str>,
    ) -> Result<(), ServiceError>;
}

/// SMTP-backed provider.
#[derive(Clone)]
pub struct SmtpEmailService {
    mailer: SmtpTransport,
    from_email: String,
}

impl SmtpEmailService {
    pub fn new(config: &SmtpConfig) -> Result<Self, ServiceError> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());

        let mailer = SmtpTransport::relay(&config.host)
            .map_err(|e| ServiceError::EmailError(e.to_string()))?
            .credentials(creds)
            .port(config.port)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(host = %config.host, "email service initialized");

        Ok(Self {
            mailer,
            from_email: config.from_address.clone(),
        })
    }

    async fn send(&self, to_email: &str, subject: &str, body: String) -> Result<(), ServiceError> {
        let email = Message::builder()
            .from(
                self.from_email
                    .parse()
                    .map_err(|e: lettre::address::AddressError| {
                        ServiceError::EmailError(e.to_string())
                    })?,
            )
            .to(to_email
                .parse()
                .map_err(|e: lettre::address::AddressError| {
                    ServiceError::EmailError(e.to_string())
                })?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| ServiceError::EmailError(e.to_string()))?;

        // SmtpTransport is blocking; keep it off the async runtime.
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| ServiceError::EmailError(e.to_string()))?;

        match result {
            Ok(_) => {
                tracing::info!(to = %to_email, subject = %subject, "email sent");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, to = %to_email, "failed to send email");
                Err(ServiceError::EmailError(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl EmailProvider for SmtpEmailService {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn send_verification_email(
        &self,
        to_email: &str,
        verification_token: &str,
        base_url: &str,
    ) -> Result<(), ServiceError> {
        let link = format!("{}/verify?token={}", base_url, verification_token);
        let body = format!(
            "We need to verify your email address to activate your account.\n\n\
             Verify here: {link}\n\n\
             The link expires in 24 hours. If you did not request this \
             registration, ignore this message."
        );
        self.send(to_email, "Verify your email address", body).await
    }

    async fn send_case_status_email(
        &self,
        to_email: &str,
        case_id: &str,
        status: &str,
        message: Option<&str>,
    ) -> Result<(), ServiceError> {
        let mut body = format!("Current status: {status}\n");
        if let Some(msg) = message {
            body.push_str(&format!("Message: {msg}\n"));
        }
        body.push_str(&format!("Case ID: {case_id}\n"));
        self.send(to_email, &format!("Update on your claim: {status}"), body)
            .await
    }
}

/// Provider used when no SMTP transport is configured: reports disabled
/// and refuses to send.
pub struct DisabledEmailService;

#[async_trait]
impl EmailProvider for DisabledEmailService {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn send_verification_email(
        &self,
        _to_email: &str,
        _verification_token: &str,
        _base_url: &str,
    ) -> Result<(), ServiceError> {
        Err(ServiceError::EmailNotConfigured)
    }

    async fn send_case_status_email(
        &self,
        to_email: &str,
        case_id: &str,
        status: &str,
        _message: Option<&str>,
    ) -> Result<(), ServiceError> {
        tracing::debug!(
            to = %to_email,
            case_id = %case_id,
            status = %status,
            "email disabled; dropping case status notification"
        );
        Ok(())
    }
}

/// Test double that records every send.
#[derive(Default)]
pub struct MockEmailService {
    pub sent: std::sync::Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl EmailProvider for MockEmailService {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn send_verification_email(
        &self,
        to_email: &str,
        verification_token: &str,
        _base_url: &str,
    ) -> Result<(), ServiceError> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((to_email.to_string(), verification_token.to_string()));
        Ok(())
    }

    async fn send_case_status_email(
        &self,
        to_email: &str,
        _case_id: &str,
        status: &str,
        _message: Option<&str>,
    ) -> Result<(), ServiceError> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((to_email.to_string(), format!("status:{status}")));
        Ok(())
    }
}
