use async_trait::async_trait;
use lettre::{
	message::{header::ContentType, Mailbox},
	transport::smtp::authentication::Credentials,
	AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpConfig;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
	#[error("invalid address {0}: {1}")]
	Address(String, lettre::address::AddressError),
	#[error("failed to build message: {0}")]
	Message(#[from] lettre::error::Error),
	#[error("smtp error: {0}")]
	Smtp(#[from] lettre::transport::smtp::Error),
}

/// A plain-text email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
	pub to: String,
	pub subject: String,
	pub body: String,
}

impl Email {
	/// The message asking a newly registered user to confirm their address.
	pub fn verification(to: &str, username: &str, link: &str) -> Self {
		Self {
			to: to.to_string(),
			subject: "Confirm your email address".into(),
			body: format!(
				"Hello {username},\n\n\
				Please confirm your email address by opening the link below:\n\n\
				{link}\n\n\
				The link expires in 24 hours."
			),
		}
	}
}

#[async_trait]
pub trait Mailer: Send + Sync {
	async fn send(&self, email: Email) -> Result<(), MailError>;
}

/// Delivers email through an SMTP relay.
pub struct SmtpMailer {
	transport: AsyncSmtpTransport<Tokio1Executor>,
	from: Mailbox,
}

impl SmtpMailer {
	pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
		let from = config
			.from
			.parse::<Mailbox>()
			.map_err(|e| MailError::Address(config.from.clone(), e))?;

		let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
			.port(config.port)
			.credentials(Credentials::new(
				config.username.clone(),
				config.password.clone(),
			))
			.build();

		Ok(Self { transport, from })
	}
}

#[async_trait]
impl Mailer for SmtpMailer {
	async fn send(&self, email: Email) -> Result<(), MailError> {
		let to = email
			.to
			.parse::<Mailbox>()
			.map_err(|e| MailError::Address(email.to.clone(), e))?;

		let message = Message::builder()
			.from(self.from.clone())
			.to(to)
			.subject(email.subject)
			.header(ContentType::TEXT_PLAIN)
			.body(email.body)?;

		self.transport.send(message).await?;
		tracing::debug!(to = %email.to, "email sent");

		Ok(())
	}
}

/// Writes emails to the log instead of sending them.
///
/// Used when no SMTP relay is configured, which is the usual setup in development.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
	async fn send(&self, email: Email) -> Result<(), MailError> {
		tracing::info!(to = %email.to, subject = %email.subject, body = %email.body, "email not sent, no smtp relay configured");

		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_verification_email_contains_link() {
		let email = Email::verification("a@b.fr", "alice", "http://x/user/verify/123");

		assert_eq!(email.to, "a@b.fr");
		assert!(email.body.contains("http://x/user/verify/123"));
		assert!(email.body.contains("alice"));
	}

	#[tokio::test]
	async fn test_log_mailer_accepts_everything() {
		let result = LogMailer
			.send(Email::verification("a@b.fr", "alice", "link"))
			.await;

		assert!(result.is_ok());
	}
}
